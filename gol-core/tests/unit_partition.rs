//! Unit tests for row partitioning
//!
//! Tests coverage, balance, and halo boundaries across grid sizes.

use gol_core::coordinator::{partition_rows, Segment};
use gol_core::GolError;

#[test]
fn test_segments_cover_every_row_once() {
    for height in 1..=40 {
        for workers in 1..=height {
            let segments = partition_rows(height, workers).unwrap();
            assert_eq!(segments.len(), workers);

            let mut next = 0;
            for segment in &segments {
                assert_eq!(segment.top, next, "Gap or overlap at h={} n={}", height, workers);
                assert!(!segment.is_empty(), "Empty segment at h={} n={}", height, workers);
                next = segment.bottom;
            }
            assert_eq!(next, height);
        }
    }
}

#[test]
fn test_segments_are_balanced() {
    for height in 1..=40 {
        for workers in 1..=height {
            let lens: Vec<usize> = partition_rows(height, workers)
                .unwrap()
                .iter()
                .map(Segment::len)
                .collect();
            let max = *lens.iter().max().unwrap();
            let min = *lens.iter().min().unwrap();
            assert!(max - min <= 1, "Unbalanced {:?} at h={} n={}", lens, height, workers);

            // Larger segments come first
            assert!(lens.windows(2).all(|pair| pair[0] >= pair[1]));
        }
    }
}

#[test]
fn test_boundaries_wrap() {
    let segments = partition_rows(16, 4).unwrap();

    let first = segments[0].boundaries(16);
    assert_eq!((first.top, first.bottom), (15, 4));

    let last = segments[3].boundaries(16);
    assert_eq!((last.top, last.bottom), (11, 0));
}

#[test]
fn test_neighbouring_halos_meet() {
    let height = 13;
    let segments = partition_rows(height, 5).unwrap();

    for (idx, segment) in segments.iter().enumerate() {
        let next = segments[(idx + 1) % segments.len()];
        let bounds = segment.boundaries(height);
        // Bottom halo is the next segment's first row
        assert_eq!(bounds.bottom, next.top);
        // and that segment's top halo is our last row
        assert_eq!(next.boundaries(height).top, segment.bottom - 1);
    }
}

#[test]
fn test_single_row_grid() {
    let segments = partition_rows(1, 1).unwrap();
    let bounds = segments[0].boundaries(1);
    assert_eq!((bounds.top, bounds.bottom), (0, 0));
}

#[test]
fn test_invalid_worker_counts() {
    assert!(matches!(
        partition_rows(8, 0),
        Err(GolError::InvalidPartition { height: 8, workers: 0 })
    ));
    assert!(matches!(
        partition_rows(8, 9),
        Err(GolError::InvalidPartition { height: 8, workers: 9 })
    ));
}

#[test]
fn test_halos_lie_outside_own_rows() {
    for height in 2..=40 {
        for workers in 2..=height {
            for segment in partition_rows(height, workers).unwrap() {
                let bounds = segment.boundaries(height);
                assert!(!segment.contains(bounds.top), "h={} n={} {:?}", height, workers, segment);
                assert!(!segment.contains(bounds.bottom), "h={} n={} {:?}", height, workers, segment);
            }
        }
    }
}
