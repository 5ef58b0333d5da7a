//! Stack growth for recursive template passes.
//!
//! Markup nesting, expression nesting and block calls all recurse on the
//! native stack. Each of those recursion points runs through
//! [`ensure_sufficient_stack`].
//!
//! On native targets the guard grows the stack through `stacker`; on
//! `wasm32` it calls the closure directly.

/// Remaining stack below which a new segment is allocated (128KB).
const MIN_REMAINING: usize = 128 * 1024;

/// Size of each freshly allocated stack segment (2MB).
const SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Run `f`, first growing the stack if fewer than [`MIN_REMAINING`] bytes
/// are left.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(MIN_REMAINING, SEGMENT_SIZE, f)
}

/// Run `f` directly; the wasm runtime owns its stack.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
