//! Game of Life rule engine
//!
//! Computes one generation for a row segment. The segment is presented as a
//! window of `rows + 2` rows: the top halo row, the segment's own rows, then
//! the bottom halo row. Columns wrap around; the halo rows already carry the
//! vertical wrap of the whole grid, so the window edges are never wrapped.

use crate::grid::{Cell, Grid};

/// Result of advancing a segment by one generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// New contents of the segment's own rows, row-major
    pub rows: Vec<bool>,
    /// Live cells of the new rows in absolute grid coordinates
    pub live_cells: Vec<Cell>,
}

/// Standard B3/S23 rule
#[inline]
pub fn next_state(alive: bool, neighbours: u8) -> bool {
    matches!((alive, neighbours), (true, 2) | (true, 3) | (false, 3))
}

/// Advance the own rows of `window` by one generation.
///
/// `top` is the absolute index of the first own row and is only used to
/// report live cells in grid coordinates.
pub fn next_generation(window: &[bool], width: usize, top: usize) -> Generation {
    debug_assert!(width > 0 && window.len() % width == 0);
    let own_rows = (window.len() / width).saturating_sub(2);

    let mut rows = vec![false; own_rows * width];
    let mut live_cells = Vec::new();

    for row in 0..own_rows {
        let wy = row + 1;
        for x in 0..width {
            let alive = window[wy * width + x];
            let neighbours = count_neighbours(window, width, wy, x);
            if next_state(alive, neighbours) {
                rows[row * width + x] = true;
                live_cells.push(Cell::new(x, top + row));
            }
        }
    }

    Generation { rows, live_cells }
}

fn count_neighbours(window: &[bool], width: usize, wy: usize, x: usize) -> u8 {
    let mut count = 0;
    for oy in 0..3 {
        let y = wy + oy - 1;
        for ox in 0..3 {
            if oy == 1 && ox == 1 {
                continue;
            }
            let nx = (x + width + ox - 1) % width;
            count += window[y * width + nx] as u8;
        }
    }
    count
}

/// Assemble the window for rows `[top, bottom)` of `grid`, halo rows included
pub fn window_for(grid: &Grid, top: usize, bottom: usize) -> Vec<bool> {
    let height = grid.height();
    let mut window = Vec::with_capacity((bottom - top + 2) * grid.width());
    window.extend_from_slice(grid.row((top + height - 1) % height));
    window.extend_from_slice(grid.rows(top, bottom));
    window.extend_from_slice(grid.row(bottom % height));
    window
}

/// Advance the whole grid by one generation without partitioning
pub fn step_grid(grid: &Grid) -> Grid {
    let window = window_for(grid, 0, grid.height());
    let generation = next_generation(&window, grid.width(), 0);
    let mut next = Grid::new(grid.width(), grid.height());
    for cell in &generation.live_cells {
        next.set(cell.x, cell.y, true);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(width: usize, height: usize, cells: &[(usize, usize)]) -> Grid {
        let cells: Vec<Cell> = cells.iter().map(|&(x, y)| Cell::new(x, y)).collect();
        Grid::from_live_cells(width, height, &cells).unwrap()
    }

    #[test]
    fn test_rule_table() {
        assert!(!next_state(true, 1));
        assert!(next_state(true, 2));
        assert!(next_state(true, 3));
        assert!(!next_state(true, 4));
        assert!(next_state(false, 3));
        assert!(!next_state(false, 2));
    }

    #[test]
    fn test_block_is_still() {
        let block = grid(6, 6, &[(2, 2), (3, 2), (2, 3), (3, 3)]);
        assert_eq!(step_grid(&block), block);
    }

    #[test]
    fn test_blinker_oscillates() {
        let horizontal = grid(5, 5, &[(1, 2), (2, 2), (3, 2)]);
        let vertical = grid(5, 5, &[(2, 1), (2, 2), (2, 3)]);
        assert_eq!(step_grid(&horizontal), vertical);
        assert_eq!(step_grid(&vertical), horizontal);
    }

    #[test]
    fn test_wraps_across_edges() {
        // Blinker split over the left/right edge
        let split = grid(6, 6, &[(5, 3), (0, 3), (1, 3)]);
        let expected = grid(6, 6, &[(0, 2), (0, 3), (0, 4)]);
        assert_eq!(step_grid(&split), expected);

        // Blinker split over the top/bottom edge
        let split = grid(6, 6, &[(2, 5), (2, 0), (2, 1)]);
        let expected = grid(6, 6, &[(1, 0), (2, 0), (3, 0)]);
        assert_eq!(step_grid(&split), expected);
    }

    #[test]
    fn test_segment_uses_halo_rows() {
        let full = grid(5, 6, &[(1, 2), (2, 2), (3, 2)]);
        let window = window_for(&full, 3, 5);
        let generation = next_generation(&window, 5, 3);

        // Only row 3 of the segment sees the blinker in its halo
        assert_eq!(generation.live_cells, vec![Cell::new(2, 3)]);
        assert_eq!(generation.rows.len(), 10);
    }

    #[test]
    fn test_deterministic() {
        let soup = grid(7, 7, &[(0, 0), (1, 0), (2, 1), (4, 4), (5, 4), (6, 5), (3, 6)]);
        let window = window_for(&soup, 2, 5);
        assert_eq!(next_generation(&window, 7, 2), next_generation(&window, 7, 2));
    }
}
