//! Generated line → template line mapping.

/// Ordered map from generated-listing line to template line.
///
/// Built one entry per generated line while the code generator writes the
/// listing. Monotonic in the generated line but not in the template line:
/// loop and block bodies reorder and revisit template lines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineMap {
    /// `lines[i]` is the template line of generated line `i + 1`; `0` marks
    /// synthetic lines with no template origin.
    lines: Vec<u32>,
}

impl LineMap {
    pub fn new() -> Self {
        LineMap { lines: Vec::new() }
    }

    /// Record the next generated line, returning its 1-based number.
    pub fn push(&mut self, original: Option<u32>) -> u32 {
        self.lines.push(original.unwrap_or(0));
        u32::try_from(self.lines.len()).unwrap_or(u32::MAX)
    }

    /// Template line for a generated line, `None` when unmapped.
    pub fn get(&self, generated: u32) -> Option<u32> {
        let index = usize::try_from(generated).ok()?.checked_sub(1)?;
        match self.lines.get(index) {
            Some(0) | None => None,
            Some(&line) => Some(line),
        }
    }

    /// Number of generated lines recorded.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// `(generated, original)` pairs for every mapped line.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (1u32..)
            .zip(self.lines.iter().copied())
            .filter(|&(_, original)| original != 0)
    }
}

impl FromIterator<Option<u32>> for LineMap {
    fn from_iter<I: IntoIterator<Item = Option<u32>>>(iter: I) -> Self {
        let mut map = LineMap::new();
        for line in iter {
            map.push(line);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_generated_lines_from_one() {
        let mut map = LineMap::new();
        assert_eq!(map.push(Some(4)), 1);
        assert_eq!(map.push(None), 2);
        assert_eq!(map.push(Some(2)), 3);

        assert_eq!(map.get(1), Some(4));
        assert_eq!(map.get(2), None);
        assert_eq!(map.get(3), Some(2));
        assert_eq!(map.get(0), None);
        assert_eq!(map.get(9), None);
    }

    #[test]
    fn iter_skips_synthetic_lines() {
        let map: LineMap = [Some(1), None, Some(7)].into_iter().collect();
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![(1, 1), (3, 7)]);
        assert_eq!(map.len(), 3);
    }
}
