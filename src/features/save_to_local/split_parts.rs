//! # Split Parts
//!
//! Splits a resource into contiguous byte ranges fetched in parallel.

use crate::shared::network::ByteRange;

/// One independently fetched byte range of the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    pub range: ByteRange,
}

impl Segment {
    /// Part file holding this segment: `<output>-<index>`.
    pub fn part_name(&self, output_name: &str) -> String {
        format!("{output_name}-{}", self.index)
    }

    pub fn len(&self) -> u64 {
        self.range.len().unwrap_or(0)
    }
}

/// Splits `file_size_bytes` into `max_concurrent_part` segments.
///
/// Every segment gets `file_size_bytes / parts` bytes and the last one also
/// takes the remainder, so the ranges cover `[0, file_size_bytes - 1]` exactly.
/// The part count is at least 1 and never exceeds the byte count, which keeps
/// every segment non-empty. An empty resource yields no segments.
pub fn split_parts(file_size_bytes: u64, max_concurrent_part: usize) -> Vec<Segment> {
    if file_size_bytes == 0 {
        return vec![];
    }
    let num_parts = (max_concurrent_part.max(1) as u64).min(file_size_bytes);
    let chunk_bytes = file_size_bytes / num_parts;
    let remaining_chunk = file_size_bytes - chunk_bytes * num_parts;

    (0..num_parts)
        .map(|i| {
            let start = chunk_bytes * i;
            let mut end = chunk_bytes * (i + 1) - 1;
            if i == num_parts - 1 {
                end += remaining_chunk; // the last segment absorbs the leftover
            }
            Segment { index: i as usize, range: ByteRange::new(start, end) }
        })
        .collect()
}
