//! Byte-range bookkeeping for one cache entry.
//!
//! An entry's bytes live in non-overlapping segments keyed by their start
//! offset. Segments are never rewritten; a write only fills the gaps between
//! existing segments, so every segment file is immutable once published.

use std::collections::BTreeMap;
use std::ops::Range;

/// A slice of one segment needed to satisfy a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSlice {
    /// Start offset of the segment within the resource.
    pub segment_start: u64,
    /// Offset of the slice within the segment file.
    pub offset_in_segment: u64,
    pub length: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentMap {
    /// start -> length
    segments: BTreeMap<u64, u64>,
    total: u64,
}

impl SegmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Total bytes held across all segments.
    pub fn total_bytes(&self) -> u64 {
        self.total
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.segments.iter().map(|(start, len)| (*start, *len))
    }

    /// Record a segment. Callers only insert ranges returned by
    /// [`SegmentMap::gaps`]; overlapping or empty inserts are rejected.
    pub fn insert(&mut self, start: u64, length: u64) -> bool {
        if length == 0 || !self.is_uncovered(start, start + length) {
            return false;
        }
        self.segments.insert(start, length);
        self.total += length;
        true
    }

    fn is_uncovered(&self, start: u64, end: u64) -> bool {
        self.overlapping(start, end).next().is_none()
    }

    /// Segments intersecting `[start, end)`, in offset order.
    fn overlapping(&self, start: u64, end: u64) -> impl Iterator<Item = (u64, u64)> + '_ {
        let first = self
            .segments
            .range(..=start)
            .next_back()
            .filter(|(s, l)| **s + **l > start)
            .map(|(s, _)| *s)
            .unwrap_or(start);
        self.segments
            .range(first..end)
            .map(|(s, l)| (*s, *l))
            .filter(move |(s, l)| s + l > start)
    }

    /// Sub-ranges of `[start, end)` not held by any segment.
    pub fn gaps(&self, start: u64, end: u64) -> Vec<Range<u64>> {
        let mut gaps = Vec::new();
        let mut cursor = start;
        for (seg_start, seg_len) in self.overlapping(start, end) {
            if seg_start > cursor {
                gaps.push(cursor..seg_start.min(end));
            }
            cursor = cursor.max(seg_start + seg_len);
            if cursor >= end {
                break;
            }
        }
        if cursor < end {
            gaps.push(cursor..end);
        }
        gaps
    }

    /// `true` when every byte of `[start, end)` is held.
    pub fn covers(&self, start: u64, end: u64) -> bool {
        start >= end || self.gaps(start, end).is_empty()
    }

    /// Bytes held within `[0, limit)`.
    pub fn covered_within(&self, limit: u64) -> u64 {
        self.segments
            .range(..limit)
            .map(|(start, len)| (start + len).min(limit) - start)
            .sum()
    }

    /// First offset at or after `from` that is not held, following adjacent
    /// segments.
    pub fn contiguous_end(&self, from: u64) -> u64 {
        let mut cursor = from;
        while let Some((start, len)) = self.segments.range(..=cursor).next_back() {
            let end = start + len;
            if end <= cursor {
                break;
            }
            cursor = end;
        }
        cursor
    }

    /// Segment slices that together cover `[start, end)`, or `None` if any
    /// byte is missing.
    pub fn slices(&self, start: u64, end: u64) -> Option<Vec<SegmentSlice>> {
        if !self.covers(start, end) {
            return None;
        }
        let slices = self
            .overlapping(start, end)
            .map(|(seg_start, seg_len)| {
                let from = start.max(seg_start);
                let to = end.min(seg_start + seg_len);
                SegmentSlice {
                    segment_start: seg_start,
                    offset_in_segment: from - seg_start,
                    length: to - from,
                }
            })
            .collect();
        Some(slices)
    }
}
