//! Executable form of a template.

use std::fmt;
use std::sync::Arc;

use kiln_ir::{DebugLineTable, Expr, LineMap, Mode, Param, MAIN_FUNCTION};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::translate::translate;

/// One VM instruction. Jump targets are instruction indices within the
/// owning function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instr {
    /// Write already-escaped markup.
    Text(Box<str>),
    /// Write a value through the escaper.
    Emit(Expr),
    /// Write a mapping through `render_attrs`.
    EmitAttrs(Expr),
    /// Call a block and write its markup.
    CallBlock(Expr),
    /// Start capturing output for an attribute.
    BeginCollect,
    /// Stop capturing and write the captured parts as attribute `name`.
    EndCollect(Box<str>),
    JumpIfNot { test: Expr, target: u32 },
    Jump(u32),
    /// Evaluate an iterable and push an iterator for the next `IterNext`.
    IterStart(Expr),
    /// Bind the next item to `targets`, or pop the iterator and jump to
    /// `exit`.
    IterNext {
        targets: SmallVec<[String; 2]>,
        exit: u32,
    },
    PushSwitch(Expr),
    PopSwitch,
    /// Fall through if `value` matches the active switch (`None` always
    /// matches), otherwise jump to `target`.
    Case { value: Option<Expr>, target: u32 },
    PushWith(Vec<String>),
    Assign { name: String, value: Expr },
    PopWith,
    /// Bind an imported template instance; `None` derives the alias.
    Import { alias: Option<String>, href: Expr },
    /// Hand rendering over to the parent template.
    Extend(Expr),
}

/// Index of a function in its [`CompiledTemplate`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct FuncId(u32);

impl FuncId {
    pub const MAIN: FuncId = FuncId(0);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A compiled `def` section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateFunction {
    pub name: String,
    pub params: Vec<Param>,
    pub code: Vec<Instr>,
    /// Instruction → listing line, as assembled.
    pub generated_lines: DebugLineTable,
    /// Instruction → template line; equal to `generated_lines` until a line
    /// map is applied.
    pub lines: DebugLineTable,
}

impl TemplateFunction {
    /// Template line of the instruction at `pc`, `0` if unknown.
    pub fn line_for(&self, pc: usize) -> u32 {
        self.lines.line_for(u32::try_from(pc).unwrap_or(u32::MAX))
    }
}

/// A template ready to render. Immutable once built and shared as
/// `Arc<CompiledTemplate>`.
#[derive(Clone, Debug)]
pub struct CompiledTemplate {
    filename: Arc<str>,
    mode: Mode,
    generated: String,
    functions: Vec<TemplateFunction>,
    by_name: FxHashMap<String, FuncId>,
}

impl CompiledTemplate {
    /// `functions[0]` must be `__main__`.
    pub(crate) fn new(
        filename: &str,
        mode: Mode,
        generated: String,
        functions: Vec<TemplateFunction>,
    ) -> Self {
        let by_name = (0u32..)
            .zip(&functions)
            .map(|(i, f)| (f.name.clone(), FuncId(i)))
            .collect();
        CompiledTemplate {
            filename: Arc::from(filename),
            mode,
            generated,
            functions,
            by_name,
        }
    }

    pub fn filename(&self) -> &Arc<str> {
        &self.filename
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The generated listing this template was assembled from.
    pub fn generated_source(&self) -> &str {
        &self.generated
    }

    pub fn main(&self) -> &TemplateFunction {
        &self.functions[FuncId::MAIN.index()]
    }

    pub fn function(&self, id: FuncId) -> &TemplateFunction {
        &self.functions[id.index()]
    }

    pub fn lookup(&self, name: &str) -> Option<FuncId> {
        self.by_name.get(name).copied()
    }

    /// Every function except `__main__`, in listing order.
    pub fn blocks(&self) -> impl Iterator<Item = (FuncId, &TemplateFunction)> {
        (0u32..)
            .map(FuncId)
            .zip(&self.functions)
            .filter(|(_, f)| f.name != MAIN_FUNCTION)
    }

    /// Rewrite every function's line table from listing lines to template
    /// lines.
    pub fn apply_line_map(&mut self, map: &LineMap) {
        for function in &mut self.functions {
            function.lines = translate(&function.generated_lines, map);
        }
    }
}

impl fmt::Display for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "template {} ({})", self.filename, self.mode)?;
        for function in &self.functions {
            writeln!(f, "  {} [{}]", function.name, function.lines)?;
        }
        Ok(())
    }
}
