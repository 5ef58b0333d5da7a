//! Listing-line tables → template-line tables.

use kiln_ir::{DebugLineTable, LineMap, LineTableBuilder};
use tracing::warn;

/// Rewrite `table` (instruction → listing line) through `map` into a table
/// of instruction → template line.
///
/// Checkpoints whose listing line has no template origin map to `0`, and
/// any checkpoint whose translated line would be lower than its
/// predecessor's is dropped, so its instructions report the previous line.
/// The result is always a valid non-decreasing table.
pub fn translate(table: &DebugLineTable, map: &LineMap) -> DebugLineTable {
    let lookup = |generated: u32| {
        map.get(generated).unwrap_or_else(|| {
            warn!(generated, "listing line has no template origin");
            0
        })
    };
    let mut checkpoints = table.checkpoints().into_iter();
    let first_line = checkpoints.next().map_or(0, |cp| lookup(cp.line));
    let mut builder = LineTableBuilder::new(first_line);
    for cp in checkpoints {
        builder.mark(cp.offset, lookup(cp.line));
    }
    builder.finish()
}
