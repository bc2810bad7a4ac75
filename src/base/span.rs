//! Text ranges of path segments inside an attribute value.

pub use text_size::TextRange;
pub use text_size::TextSize;

/// Byte ranges of the `/`-separated segments of a path expression.
///
/// Offsets are relative to the start of `path`. Empty segments (a leading
/// `/`, doubled or trailing separators) are kept so that indices line up
/// with a plain `split('/')`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SegmentRanges {
    ranges: Vec<TextRange>,
}

impl SegmentRanges {
    /// Compute the segment ranges of `path`.
    pub fn new(path: &str) -> Self {
        let mut ranges = Vec::new();
        let mut start = 0u32;
        for segment in path.split('/') {
            let len = segment.len() as u32;
            ranges.push(TextRange::at(TextSize::from(start), TextSize::from(len)));
            start += len + 1;
        }
        Self { ranges }
    }

    /// Ranges of the non-empty segments only, in order.
    ///
    /// This is the indexing used by path resolution, which ignores empty
    /// segments.
    pub fn non_empty(path: &str) -> Self {
        let all = Self::new(path);
        let ranges = all.ranges.into_iter().filter(|r| !r.is_empty()).collect();
        Self { ranges }
    }

    /// Range of segment `index`.
    pub fn get(&self, index: usize) -> Option<TextRange> {
        self.ranges.get(index).copied()
    }

    /// Range from the start of segment `index` to the end of the path.
    pub fn from_segment(&self, index: usize) -> Option<TextRange> {
        let first = self.ranges.get(index)?;
        let last = self.ranges.last()?;
        Some(TextRange::new(first.start(), last.end()))
    }

    /// Shift all ranges by `offset`, e.g. the position of the attribute value.
    pub fn shifted(mut self, offset: TextSize) -> Self {
        for range in &mut self.ranges {
            *range += offset;
        }
        self
    }

    /// Get the number of segments.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Check if there are no segments.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
