//! Position-tracking cursor over template text.
//!
//! Tracks the current line incrementally: every advance counts the newlines
//! it skips with `memchr`, so `line()` is O(1) and `column()` only scans the
//! current line.

use memchr::{memchr_iter, memmem, memrchr};

use crate::scan::{interpolation_end, is_name_continue, is_name_start};

pub(crate) struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
    line_start: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Cursor {
            src,
            pos: 0,
            line: 1,
            line_start: 0,
        }
    }

    #[inline]
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub(crate) fn is_eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    #[inline]
    pub(crate) fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    #[inline]
    pub(crate) fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    #[inline]
    pub(crate) fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    /// 1-based line of the current position.
    #[inline]
    pub(crate) fn line(&self) -> u32 {
        self.line
    }

    /// 1-based column (in characters) of the current position.
    pub(crate) fn column(&self) -> u32 {
        let chars = self.src[self.line_start..self.pos].chars().count();
        u32::try_from(chars).unwrap_or(u32::MAX - 1) + 1
    }

    pub(crate) fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.src[start..end]
    }

    /// Move to absolute byte position `to` (never backwards).
    pub(crate) fn advance_to(&mut self, to: usize) {
        let to = to.min(self.src.len());
        if to <= self.pos {
            return;
        }
        let skipped = &self.src.as_bytes()[self.pos..to];
        let newlines = memchr_iter(b'\n', skipped).count();
        if newlines > 0 {
            self.line += u32::try_from(newlines).unwrap_or(u32::MAX);
            if let Some(last) = memrchr(b'\n', skipped) {
                self.line_start = self.pos + last + 1;
            }
        }
        self.pos = to;
    }

    #[inline]
    pub(crate) fn advance(&mut self, n: usize) {
        self.advance_to(self.pos + n);
    }

    /// Byte position of the next occurrence of `needle`, if any.
    pub(crate) fn find(&self, needle: &str) -> Option<usize> {
        memmem::find(self.rest().as_bytes(), needle.as_bytes()).map(|i| self.pos + i)
    }

    pub(crate) fn skip_whitespace(&mut self) {
        let n = self
            .rest()
            .bytes()
            .take_while(u8::is_ascii_whitespace)
            .count();
        self.advance(n);
    }

    /// Read a markup name, or `None` if the cursor is not at one.
    pub(crate) fn read_name(&mut self) -> Option<&'a str> {
        let bytes = self.rest().as_bytes();
        if !bytes.first().copied().is_some_and(is_name_start) {
            return None;
        }
        let len = bytes.iter().take_while(|&&b| is_name_continue(b)).count();
        let start = self.pos;
        self.advance(len);
        Some(self.slice(start, start + len))
    }

    /// Advance to the first byte in `stops` that is not inside a `${...}`
    /// region. Returns `false` if an interpolation is left unterminated, with
    /// the cursor at its `$`.
    pub(crate) fn advance_until(&mut self, stops: &[u8]) -> bool {
        let bytes = self.src.as_bytes();
        let mut i = self.pos;
        while i < bytes.len() {
            let b = bytes[i];
            if stops.contains(&b) {
                break;
            }
            if b == b'$' && bytes.get(i + 1) == Some(&b'{') {
                match interpolation_end(bytes, i) {
                    Some(end) => {
                        i = end;
                        continue;
                    }
                    None => {
                        self.advance_to(i);
                        return false;
                    }
                }
            }
            i += 1;
        }
        self.advance_to(i);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_lines_and_columns() {
        let mut c = Cursor::new("ab\ncd\n\nef");
        c.advance(4);
        assert_eq!((c.line(), c.column()), (2, 2));
        c.advance(3);
        assert_eq!((c.line(), c.column()), (4, 1));
    }

    #[test]
    fn advance_until_skips_interpolations() {
        let mut c = Cursor::new("a ${ x < 1 } < b");
        assert!(c.advance_until(b"<"));
        assert_eq!(c.pos(), 13);
    }

    #[test]
    fn advance_until_reports_unterminated() {
        let mut c = Cursor::new("ab ${x");
        assert!(!c.advance_until(b"<"));
        assert_eq!(c.pos(), 3);
    }

    #[test]
    fn reads_prefixed_names() {
        let mut c = Cursor::new("py:for-each=");
        assert_eq!(c.read_name(), Some("py:for-each"));
        assert_eq!(c.peek(), Some(b'='));
    }
}
