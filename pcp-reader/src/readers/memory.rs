use std::path::PathBuf;

use pcp_core::bounds::Bounds;
use pcp_core::error::UnitError;
use pcp_core::point::{PointBatch, PointRecord};
use pcp_core::unit::SpatialUnit;

use super::{Enumeration, UnitSource};

/// In-memory source for tests and embedding. Each named batch becomes one
/// spatial unit.
#[derive(Debug, Default)]
pub struct MemorySource {
    units: Vec<(String, Vec<PointRecord>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_unit(mut self, name: impl Into<String>, points: Vec<PointRecord>) -> Self {
        self.units.push((name.into(), points));
        self
    }
}

impl UnitSource for MemorySource {
    fn enumerate_units(&self) -> Result<Enumeration, UnitError> {
        let mut enumeration = Enumeration::default();
        for (index, (name, points)) in self.units.iter().enumerate() {
            let unit = SpatialUnit::new(index, PathBuf::from(name));
            match Bounds::of_points(points) {
                Some(bounds) => enumeration.units.push(unit.with_bounds(bounds)),
                None => enumeration.failures.push((
                    unit.key,
                    UnitError::Data(format!("{}: unit contains no points", name)),
                )),
            }
        }
        Ok(enumeration)
    }

    fn load(&self, unit: &SpatialUnit) -> Result<PointBatch, UnitError> {
        let (_, points) = self
            .units
            .get(unit.index)
            .ok_or_else(|| UnitError::Data(format!("{}: unknown unit", unit.key)))?;
        Ok(PointBatch::from_points(points.clone()))
    }
}
