//! Toroidal grid representation
//!
//! A grid is stored densely, row-major, and converts losslessly to and from
//! a list of live cells. On the wire it always travels as its live cells.

use serde::{Deserialize, Serialize};

use crate::error::{GolError, Result};
use crate::protocol::codec::MAX_FRAME_LEN;

/// Largest grid accepted from the wire, in cells
pub const MAX_CELLS: usize = MAX_FRAME_LEN;

/// Coordinates of a single cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
}

impl Cell {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Dense `height × width` grid of alive/dead cells
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "GridSnapshot", try_from = "GridSnapshot")]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl Grid {
    /// Create an all-dead grid from dimensions already known to be valid.
    /// Untrusted dimensions go through [`Grid::try_new`].
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width * height],
        }
    }

    /// Create an all-dead grid, rejecting empty or oversized dimensions
    pub fn try_new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(GolError::InvalidMessage {
                reason: format!("empty {}x{} grid", width, height),
            });
        }
        match width.checked_mul(height) {
            Some(cells) if cells <= MAX_CELLS => Ok(Self::new(width, height)),
            _ => Err(GolError::InvalidMessage {
                reason: format!("{}x{} grid exceeds {} cells", width, height, MAX_CELLS),
            }),
        }
    }

    /// Build a grid from its live cells
    pub fn from_live_cells(width: usize, height: usize, live_cells: &[Cell]) -> Result<Self> {
        let mut grid = Self::try_new(width, height)?;
        for cell in live_cells {
            if cell.x >= width || cell.y >= height {
                return Err(GolError::InvalidMessage {
                    reason: format!(
                        "cell ({}, {}) outside {}x{} grid",
                        cell.x, cell.y, width, height
                    ),
                });
            }
            grid.set(cell.x, cell.y, true);
        }
        Ok(grid)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Cell state at `(x, y)`
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.cells[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, alive: bool) {
        self.cells[y * self.width + x] = alive;
    }

    /// Borrow row `y`
    pub fn row(&self, y: usize) -> &[bool] {
        &self.cells[y * self.width..(y + 1) * self.width]
    }

    /// Borrow the rows `[top, bottom)` as one contiguous slice
    pub fn rows(&self, top: usize, bottom: usize) -> &[bool] {
        &self.cells[top * self.width..bottom * self.width]
    }

    /// All live cells in row-major order
    pub fn live_cells(&self) -> Vec<Cell> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(idx, _)| Cell::new(idx % self.width, idx / self.width))
            .collect()
    }

    /// Number of live cells
    pub fn live_count(&self) -> usize {
        self.cells.iter().filter(|alive| **alive).count()
    }

    /// Input file name used by the image adapter, `"<width>x<height>"`
    pub fn input_name(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Snapshot file name used by the image adapter, `"<width>x<height>x<turn>"`
    pub fn snapshot_name(&self, turn: u64) -> String {
        format!("{}x{}x{}", self.width, self.height, turn)
    }
}

/// Wire form of a grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub width: usize,
    pub height: usize,
    pub live_cells: Vec<Cell>,
}

impl From<Grid> for GridSnapshot {
    fn from(grid: Grid) -> Self {
        Self {
            width: grid.width,
            height: grid.height,
            live_cells: grid.live_cells(),
        }
    }
}

impl TryFrom<GridSnapshot> for Grid {
    type Error = GolError;

    fn try_from(snapshot: GridSnapshot) -> Result<Self> {
        Grid::from_live_cells(snapshot.width, snapshot.height, &snapshot.live_cells)
    }
}

/// Completed turn count together with the live cells after that turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    pub turn: u64,
    pub live_cells: Vec<Cell>,
}

impl TurnState {
    pub fn summary(&self) -> TurnSummary {
        TurnSummary {
            turn: self.turn,
            live_cells: self.live_cells.len(),
        }
    }
}

/// Turn count with the number of live cells, as reported by telemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSummary {
    pub turn: u64,
    pub live_cells: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_cell_conversion() {
        let cells = vec![Cell::new(1, 0), Cell::new(3, 2), Cell::new(0, 4)];
        let grid = Grid::from_live_cells(5, 5, &cells).unwrap();

        assert!(grid.get(3, 2));
        assert!(!grid.get(2, 3));
        assert_eq!(grid.live_count(), 3);
        assert_eq!(grid.live_cells(), cells);
    }

    #[test]
    fn test_out_of_range_cell_rejected() {
        let err = Grid::from_live_cells(4, 4, &[Cell::new(4, 0)]).unwrap_err();
        assert!(matches!(err, GolError::InvalidMessage { .. }));
    }

    #[test]
    fn test_rows() {
        let grid = Grid::from_live_cells(3, 3, &[Cell::new(0, 1), Cell::new(2, 2)]).unwrap();
        assert_eq!(grid.row(1), &[true, false, false]);
        assert_eq!(grid.rows(1, 3).len(), 6);
    }

    #[test]
    fn test_snapshot_wire_form() {
        let grid = Grid::from_live_cells(8, 4, &[Cell::new(7, 3)]).unwrap();
        let json = serde_json::to_string(&grid).unwrap();
        assert!(json.contains("\"live_cells\""));

        let decoded: Grid = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, grid);

        let bad = r#"{"width":2,"height":2,"live_cells":[{"x":0,"y":2}]}"#;
        assert!(serde_json::from_str::<Grid>(bad).is_err());
    }

    #[test]
    fn test_bad_dimensions_rejected_at_decode() {
        let overflowing = format!(
            r#"{{"width":{},"height":3,"live_cells":[]}}"#,
            usize::MAX / 2
        );
        assert!(serde_json::from_str::<Grid>(&overflowing).is_err());

        let huge = r#"{"width":100000,"height":100000,"live_cells":[]}"#;
        assert!(serde_json::from_str::<Grid>(huge).is_err());

        let empty = r#"{"width":0,"height":5,"live_cells":[]}"#;
        assert!(serde_json::from_str::<Grid>(empty).is_err());
        assert!(Grid::try_new(5, 0).is_err());
        assert!(Grid::try_new(MAX_CELLS + 1, 1).is_err());
        assert!(Grid::try_new(3, 3).is_ok());
    }

    #[test]
    fn test_file_names() {
        let grid = Grid::new(512, 256);
        assert_eq!(grid.input_name(), "512x256");
        assert_eq!(grid.snapshot_name(100), "512x256x100");
    }
}
