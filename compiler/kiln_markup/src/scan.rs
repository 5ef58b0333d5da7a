//! Byte-level helpers shared by the markup cursor and the interpolation
//! splitter.

/// Given `bytes[start..]` beginning with `${`, return the index one past the
/// matching `}`.
///
/// Braces nest, and braces or quotes inside string literals are ignored.
pub(crate) fn interpolation_end(bytes: &[u8], start: usize) -> Option<usize> {
    debug_assert!(bytes[start..].starts_with(b"${"));
    let mut depth = 0usize;
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            quote @ (b'"' | b'\'') => i = string_end(bytes, i, quote)?,
            _ => {}
        }
        i += 1;
    }
    None
}

/// Index of the closing quote of the string literal opened at `open`.
fn string_end(bytes: &[u8], open: usize, quote: u8) -> Option<usize> {
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b if b == quote => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

#[inline]
pub(crate) fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b':' || b >= 0x80
}

#[inline]
pub(crate) fn is_name_continue(b: u8) -> bool {
    is_name_start(b) || b.is_ascii_digit() || b == b'-' || b == b'.'
}
