use pcp_core::point::PointBatch;
use pcp_core::predicate::Predicate;

/// Drops points matching the predicate. Removal only affects the working
/// batch; survivor order is preserved.
pub struct FilterStage {
    pub label: String,
    pub predicate: Predicate,
}

impl FilterStage {
    pub fn new(label: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            label: label.into(),
            predicate,
        }
    }

    pub fn apply(&self, mut batch: PointBatch) -> (PointBatch, u64) {
        let before = batch.len();
        batch.retain(|point| !self.predicate.matches(point));
        let removed = (before - batch.len()) as u64;
        (batch, removed)
    }
}
