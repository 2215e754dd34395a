//! Deterministic row partitioning
//!
//! Splits the grid's rows into contiguous segments, one per worker, and
//! computes each segment's halo rows with toroidal wraparound.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GolError, Result};

/// Half-open row range `[top, bottom)` owned by one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub top: usize,
    pub bottom: usize,
}

impl Segment {
    pub fn new(top: usize, bottom: usize) -> Self {
        Self { top, bottom }
    }

    /// Number of rows in the segment
    pub fn len(&self) -> usize {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.bottom == self.top
    }

    pub fn contains(&self, row: usize) -> bool {
        row >= self.top && row < self.bottom
    }

    /// Halo rows of this segment in a grid of `height` rows
    pub fn boundaries(&self, height: usize) -> Boundaries {
        Boundaries {
            top: (self.top + height - 1) % height,
            bottom: self.bottom % height,
        }
    }
}

/// Row indices of a segment's two halo rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundaries {
    pub top: usize,
    pub bottom: usize,
}

/// Partition `height` rows among `workers` segments.
///
/// The first `height % workers` segments get one extra row.
pub fn partition_rows(height: usize, workers: usize) -> Result<Vec<Segment>> {
    if workers == 0 || workers > height {
        return Err(GolError::InvalidPartition { height, workers });
    }

    let base = height / workers;
    let remainder = height % workers;

    let mut segments = Vec::with_capacity(workers);
    let mut top = 0;
    for idx in 0..workers {
        let rows = if idx < remainder { base + 1 } else { base };
        segments.push(Segment::new(top, top + rows));
        top += rows;
    }

    debug!("Partitioned {} rows into {} segments", height, workers);
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uneven_partition() {
        let segments = partition_rows(10, 4).unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::new(0, 3),
                Segment::new(3, 6),
                Segment::new(6, 8),
                Segment::new(8, 10),
            ]
        );
    }

    #[test]
    fn test_wraparound_boundaries() {
        let segments = partition_rows(8, 4).unwrap();
        let first = segments[0].boundaries(8);
        let last = segments[3].boundaries(8);

        assert_eq!(first.top, 7);
        assert_eq!(first.bottom, 2);
        assert_eq!(last.top, 5);
        assert_eq!(last.bottom, 0);
    }

    #[test]
    fn test_single_segment_wraps_onto_itself() {
        let segments = partition_rows(5, 1).unwrap();
        let bounds = segments[0].boundaries(5);
        assert_eq!(bounds, Boundaries { top: 4, bottom: 0 });
    }

    #[test]
    fn test_rejects_bad_worker_counts() {
        assert!(partition_rows(4, 0).is_err());
        assert!(partition_rows(4, 5).is_err());
    }
}
