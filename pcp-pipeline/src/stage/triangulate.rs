use pcp_core::error::GeometryError;
use pcp_core::point::{PointBatch, PointRecord};
use pcp_core::predicate::Predicate;

use crate::dtm::Dtm;

/// Builds the unit-local DTM from the subset of the batch matching the
/// ground predicate. The batch itself passes through unchanged.
pub struct TriangulateStage {
    pub ground: Predicate,
}

impl TriangulateStage {
    pub fn new(ground: Predicate) -> Self {
        Self { ground }
    }

    pub fn select_ground(&self, batch: &PointBatch) -> Vec<PointRecord> {
        batch
            .iter()
            .filter(|point| self.ground.matches(point))
            .cloned()
            .collect()
    }

    pub fn build(&self, batch: &PointBatch) -> Result<(Dtm, usize), GeometryError> {
        let ground = self.select_ground(batch);
        let dtm = Dtm::from_ground_points(&ground)?;
        Ok((dtm, ground.len()))
    }
}
