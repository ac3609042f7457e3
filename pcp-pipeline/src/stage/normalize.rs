use pcp_core::config::NotCoveredPolicy;
use pcp_core::point::PointBatch;

use crate::dtm::Dtm;

/// Re-expresses each point's elevation relative to the triangulated ground
/// surface. Points the DTM does not cover are dropped or flagged withheld
/// according to the configured policy; they are never silently retained
/// with a raw elevation.
pub struct NormalizeStage;

impl NormalizeStage {
    pub fn apply(
        &self,
        batch: PointBatch,
        dtm: &Dtm,
        policy: NotCoveredPolicy,
    ) -> (PointBatch, u64, u64) {
        let mut dropped = 0u64;
        let mut flagged = 0u64;
        let mut normalized = Vec::with_capacity(batch.len());

        for mut point in batch.points {
            match dtm.height_at(point.x, point.y) {
                Some(ground) => {
                    point.z -= ground;
                    normalized.push(point);
                }
                None => match policy {
                    NotCoveredPolicy::Drop => dropped += 1,
                    NotCoveredPolicy::Flag => {
                        point.withheld = true;
                        flagged += 1;
                        normalized.push(point);
                    }
                },
            }
        }

        (PointBatch::from_points(normalized), dropped, flagged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcp_core::point::{Classification, PointRecord};

    fn flat_dtm() -> Dtm {
        Dtm::from_ground_points(&[
            PointRecord::new(0.0, 0.0, 2.0, Classification::Ground),
            PointRecord::new(10.0, 0.0, 2.0, Classification::Ground),
            PointRecord::new(0.0, 10.0, 2.0, Classification::Ground),
            PointRecord::new(10.0, 10.0, 2.0, Classification::Ground),
        ])
        .unwrap()
    }

    #[test]
    fn test_normalize_subtracts_ground() {
        let dtm = flat_dtm();
        let batch = PointBatch::from_points(vec![PointRecord::new(
            5.0,
            5.0,
            12.5,
            Classification::HighVegetation,
        )]);
        let (normalized, dropped, flagged) =
            NormalizeStage.apply(batch, &dtm, NotCoveredPolicy::Drop);
        assert_eq!((dropped, flagged), (0, 0));
        assert!((normalized.points[0].z - 10.5).abs() < 1e-12);
    }

    #[test]
    fn test_uncovered_point_dropped() {
        let dtm = flat_dtm();
        let batch = PointBatch::from_points(vec![PointRecord::new(
            50.0,
            50.0,
            12.5,
            Classification::HighVegetation,
        )]);
        let (normalized, dropped, flagged) =
            NormalizeStage.apply(batch, &dtm, NotCoveredPolicy::Drop);
        assert!(normalized.is_empty());
        assert_eq!((dropped, flagged), (1, 0));
    }

    #[test]
    fn test_uncovered_point_flagged_keeps_raw_elevation() {
        let dtm = flat_dtm();
        let batch = PointBatch::from_points(vec![PointRecord::new(
            50.0,
            50.0,
            12.5,
            Classification::HighVegetation,
        )]);
        let (normalized, dropped, flagged) =
            NormalizeStage.apply(batch, &dtm, NotCoveredPolicy::Flag);
        assert_eq!((dropped, flagged), (0, 1));
        assert_eq!(normalized.len(), 1);
        assert!(normalized.points[0].withheld);
        assert_eq!(normalized.points[0].z, 12.5);
    }
}
