//! Source positions for tree nodes.

use std::fmt;
use std::ops::Range;

use rowan::{TextRange, TextSize};

/// Index of an input source inside a [`SourceMap`](crate::SourceMap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u32);

/// Where a node came from: an input source and a byte range inside it.
///
/// Nodes synthesized by the middle-end either inherit the position of the
/// node they replace or carry no position at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceInfo {
    pub source: SourceId,
    pub range: TextRange,
}

impl SourceInfo {
    pub fn new(source: SourceId, start: u32, end: u32) -> Self {
        Self {
            source,
            range: TextRange::new(TextSize::from(start), TextSize::from(end)),
        }
    }

    /// The byte range as a `Range<usize>`, the form ariadne expects.
    pub fn byte_range(&self) -> Range<usize> {
        let start: usize = self.range.start().into();
        let end: usize = self.range.end().into();
        start..end
    }

    /// Smallest position covering both `self` and `other`.
    ///
    /// Positions from different sources cannot be merged; `self` wins.
    pub fn cover(self, other: SourceInfo) -> SourceInfo {
        if self.source != other.source {
            return self;
        }
        SourceInfo {
            source: self.source,
            range: self.range.cover(other.range),
        }
    }
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let range = self.byte_range();
        write!(f, "#{}:{}..{}", self.source.0, range.start, range.end)
    }
}
