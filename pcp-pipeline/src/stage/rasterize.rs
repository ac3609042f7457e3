use std::path::PathBuf;

use pcp_core::grid::PartialGrid;
use pcp_core::point::PointBatch;

/// Bins a unit's batch into its unit-local partial grid. Withheld points
/// (source-flagged or marked by the normalizer) never reach an
/// accumulator.
pub struct RasterizeStage {
    pub output: PathBuf,
}

impl RasterizeStage {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
        }
    }

    pub fn rasterize(&self, batch: &PointBatch, partial: &mut PartialGrid, window: f64) {
        for point in batch.iter() {
            if point.withheld {
                continue;
            }
            partial.add(point.x, point.y, point.z, window);
        }
    }
}
