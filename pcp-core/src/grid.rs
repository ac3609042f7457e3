use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::bounds::Bounds;
use crate::error::ConfigurationError;

/// Raster value written for cells with no contributing points.
pub const NODATA: f64 = -9999.0;

/// Aggregation operators. All of them are associative and commutative, so
/// the order in which partial grids are reduced does not affect the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOp {
    Max,
    Min,
    Mean,
    Count,
}

impl FromStr for AggregateOp {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "max" => Ok(AggregateOp::Max),
            "min" => Ok(AggregateOp::Min),
            "mean" | "avg" => Ok(AggregateOp::Mean),
            "count" => Ok(AggregateOp::Count),
            other => Err(ConfigurationError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateOp::Max => "max",
            AggregateOp::Min => "min",
            AggregateOp::Mean => "mean",
            AggregateOp::Count => "count",
        };
        write!(f, "{}", name)
    }
}

/// Mosaic extent snapped outward to resolution multiples.
///
/// Convention: the origin is the top-left corner `(min_x, max_y)`. Columns
/// run left to right (+x), rows run top to bottom (-y), and cells are
/// addressed row-major as `row * cols + col`. A point maps to the cell
/// containing it under half-open cell intervals, so results are
/// bit-reproducible for identical input and configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GridExtent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub resolution: f64,
    pub cols: usize,
    pub rows: usize,
}

impl GridExtent {
    pub fn from_bounds(bounds: &Bounds, resolution: f64) -> Self {
        let min_x = (bounds.min_x / resolution).floor() * resolution;
        let min_y = (bounds.min_y / resolution).floor() * resolution;
        let cols = (((bounds.max_x - min_x) / resolution).ceil() as usize).max(1);
        let rows = (((bounds.max_y - min_y) / resolution).ceil() as usize).max(1);
        let max_x = min_x + cols as f64 * resolution;
        let max_y = min_y + rows as f64 * resolution;
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            resolution,
            cols,
            rows,
        }
    }

    pub fn cell_count(&self) -> usize {
        self.cols * self.rows
    }

    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.min_x + (col as f64 + 0.5) * self.resolution,
            self.max_y - (row as f64 + 0.5) * self.resolution,
        )
    }

    /// Cells whose center lies within the square window (side `window`)
    /// centered on `(x, y)`: inclusive `(col_lo..=col_hi, row_lo..=row_hi)`.
    ///
    /// Membership is half-open (a center at exactly `x - window/2` counts,
    /// one at `x + window/2` does not), so `window == resolution` assigns a
    /// point to exactly one cell, and growing the window never shrinks the
    /// range on either axis.
    pub fn window_cells(&self, x: f64, y: f64, window: f64) -> (usize, usize, usize, usize) {
        let h = window / (2.0 * self.resolution);
        let u = (x - self.min_x) / self.resolution;
        let v = (self.max_y - y) / self.resolution;

        let col_lo = (((u - h - 0.5).floor() as i64) + 1).clamp(0, self.cols as i64 - 1) as usize;
        let col_hi = ((u + h - 0.5).floor() as i64).clamp(0, self.cols as i64 - 1) as usize;
        let row_lo = (((v - h - 0.5).floor() as i64) + 1).clamp(0, self.rows as i64 - 1) as usize;
        let row_hi = ((v + h - 0.5).floor() as i64).clamp(0, self.rows as i64 - 1) as usize;

        (col_lo, col_hi, row_lo, row_hi)
    }
}

/// Per-cell accumulator. Tracks every reduction at once so merge stays a
/// single associative, commutative fold regardless of the configured
/// operator.
#[derive(Debug, Clone, Copy)]
pub struct CellAccumulator {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for CellAccumulator {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl CellAccumulator {
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn merge(&mut self, other: &CellAccumulator) {
        self.count += other.count;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn finalize(&self, operator: AggregateOp) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(match operator {
            AggregateOp::Max => self.max,
            AggregateOp::Min => self.min,
            AggregateOp::Mean => self.sum / self.count as f64,
            AggregateOp::Count => self.count as f64,
        })
    }
}

/// Sparse, unit-local accumulation over the shared extent. Workers build
/// these independently; a single-threaded reduction folds them into the
/// mosaic Grid.
#[derive(Debug, Clone)]
pub struct PartialGrid {
    pub extent: GridExtent,
    pub cells: HashMap<usize, CellAccumulator>,
}

impl PartialGrid {
    pub fn new(extent: GridExtent) -> Self {
        Self {
            extent,
            cells: HashMap::new(),
        }
    }

    pub fn add(&mut self, x: f64, y: f64, value: f64, window: f64) {
        let (col_lo, col_hi, row_lo, row_hi) = self.extent.window_cells(x, y, window);
        for row in row_lo..=row_hi {
            for col in col_lo..=col_hi {
                let index = row * self.extent.cols + col;
                self.cells.entry(index).or_default().add(value);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Dense mosaic accumulation at the full output extent. Allocated once per
/// run; mutated only by the single-threaded reduction pass.
#[derive(Debug, Clone)]
pub struct Grid {
    pub extent: GridExtent,
    cells: Vec<CellAccumulator>,
}

impl Grid {
    pub fn new(extent: GridExtent) -> Self {
        let cells = vec![CellAccumulator::default(); extent.cell_count()];
        Self { extent, cells }
    }

    pub fn merge(&mut self, partial: &PartialGrid) {
        debug_assert_eq!(self.extent, partial.extent);
        for (&index, accumulator) in &partial.cells {
            self.cells[index].merge(accumulator);
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellAccumulator {
        &self.cells[row * self.extent.cols + col]
    }

    pub fn finalize(&self, operator: AggregateOp) -> Raster {
        let values = self
            .cells
            .iter()
            .map(|acc| acc.finalize(operator).unwrap_or(NODATA))
            .collect();
        Raster {
            extent: self.extent.clone(),
            nodata: NODATA,
            values,
        }
    }
}

/// Finalized raster in row-major order from the top-left origin.
#[derive(Debug, Clone)]
pub struct Raster {
    pub extent: GridExtent,
    pub nodata: f64,
    pub values: Vec<f64>,
}

impl Raster {
    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.extent.cols + col]
    }
}
