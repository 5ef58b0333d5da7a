//! Instruction offset → source line tables.
//!
//! A [`DebugLineTable`] is the compiled form's native record of which line
//! produced which instruction: a starting line plus `(offset_delta,
//! line_delta)` pairs. Both deltas are unsigned, so the table always
//! describes a non-decreasing step function. The line of instruction `pc` is
//! the line of the last checkpoint whose offset is `<= pc`.

use std::fmt;

/// An absolute `(offset, line)` point of a decoded table.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Checkpoint {
    pub offset: u32,
    pub line: u32,
}

impl Checkpoint {
    pub const fn new(offset: u32, line: u32) -> Self {
        Checkpoint { offset, line }
    }
}

/// Delta-encoded line table.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct DebugLineTable {
    first_line: u32,
    deltas: Vec<(u32, u32)>,
}

impl DebugLineTable {
    /// Build from raw parts; callers guarantee nothing since deltas are unsigned.
    pub fn from_parts(first_line: u32, deltas: Vec<(u32, u32)>) -> Self {
        DebugLineTable { first_line, deltas }
    }

    /// Line the table starts at (the checkpoint at offset 0).
    pub fn first_line(&self) -> u32 {
        self.first_line
    }

    /// The encoded `(offset_delta, line_delta)` pairs.
    pub fn deltas(&self) -> &[(u32, u32)] {
        &self.deltas
    }

    /// Decode into absolute checkpoints, starting with `(0, first_line)`.
    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        let mut current = Checkpoint::new(0, self.first_line);
        let mut out = Vec::with_capacity(self.deltas.len() + 1);
        out.push(current);
        for &(offset_delta, line_delta) in &self.deltas {
            current = Checkpoint::new(
                current.offset.saturating_add(offset_delta),
                current.line.saturating_add(line_delta),
            );
            out.push(current);
        }
        out
    }

    /// Line of the instruction at `offset`.
    pub fn line_for(&self, offset: u32) -> u32 {
        let mut line = self.first_line;
        let mut at = 0u32;
        for &(offset_delta, line_delta) in &self.deltas {
            at = at.saturating_add(offset_delta);
            if at > offset {
                break;
            }
            line = line.saturating_add(line_delta);
        }
        line
    }
}

impl fmt::Display for DebugLineTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cp) in self.checkpoints().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}@{}", cp.line, cp.offset)?;
        }
        Ok(())
    }
}

/// Incremental encoder for [`DebugLineTable`].
///
/// Checkpoints must arrive in non-decreasing offset and line order; a
/// checkpoint that would move backwards in either is rejected and the table
/// is left unchanged.
#[derive(Clone, Debug)]
pub struct LineTableBuilder {
    first_line: u32,
    last: Checkpoint,
    deltas: Vec<(u32, u32)>,
}

impl LineTableBuilder {
    pub fn new(first_line: u32) -> Self {
        LineTableBuilder {
            first_line,
            last: Checkpoint::new(0, first_line),
            deltas: Vec::new(),
        }
    }

    /// Line of the most recent checkpoint.
    pub fn current_line(&self) -> u32 {
        self.last.line
    }

    /// Record that instructions from `offset` on belong to `line`.
    ///
    /// Returns `false` if the checkpoint was rejected for moving backwards.
    pub fn mark(&mut self, offset: u32, line: u32) -> bool {
        if offset < self.last.offset || line < self.last.line {
            return false;
        }
        if line == self.last.line {
            return true;
        }
        self.deltas
            .push((offset - self.last.offset, line - self.last.line));
        self.last = Checkpoint::new(offset, line);
        true
    }

    pub fn finish(self) -> DebugLineTable {
        DebugLineTable {
            first_line: self.first_line,
            deltas: self.deltas,
        }
    }
}
