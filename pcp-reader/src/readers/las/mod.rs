use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use las::Reader;

use pcp_core::bounds::Bounds;
use pcp_core::error::UnitError;
use pcp_core::point::{Classification, PointBatch, PointRecord};
use pcp_core::unit::SpatialUnit;

use super::{Enumeration, UnitSource};

/// LAS/LAZ source. Bounds come from the file header at enumeration time;
/// points are decoded only when a unit is loaded.
pub struct LasSource {
    pub paths: Vec<PathBuf>,
}

impl LasSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    fn open(path: &Path) -> Result<Reader, UnitError> {
        let file = File::open(path)?;
        Reader::new(BufReader::new(file))
            .map_err(|e| UnitError::Data(format!("{}: {}", path.display(), e)))
    }

    fn header_bounds(path: &Path) -> Result<Bounds, UnitError> {
        let reader = Self::open(path)?;
        let las_bounds = reader.header().bounds();
        let mut bounds = Bounds::new();
        bounds.update(las_bounds.min.x, las_bounds.min.y, las_bounds.min.z);
        bounds.update(las_bounds.max.x, las_bounds.max.y, las_bounds.max.z);
        if !bounds.is_valid() {
            return Err(UnitError::Data(format!(
                "{}: header carries no usable bounds",
                path.display()
            )));
        }
        Ok(bounds)
    }
}

impl UnitSource for LasSource {
    fn enumerate_units(&self) -> Result<Enumeration, UnitError> {
        let mut enumeration = Enumeration::default();
        for (index, path) in self.paths.iter().enumerate() {
            let unit = SpatialUnit::new(index, path.clone());
            match Self::header_bounds(path) {
                Ok(bounds) => enumeration.units.push(unit.with_bounds(bounds)),
                Err(error) => enumeration.failures.push((unit.key, error)),
            }
        }
        Ok(enumeration)
    }

    fn load(&self, unit: &SpatialUnit) -> Result<PointBatch, UnitError> {
        let mut reader = Self::open(&unit.path)?;
        let mut batch = PointBatch::new();
        for las_point in reader.points() {
            let las_point =
                las_point.map_err(|e| UnitError::Data(format!("{}: {}", unit.key, e)))?;

            let mut record = PointRecord::new(
                las_point.x,
                las_point.y,
                las_point.z,
                Classification::from_code(u8::from(las_point.classification)),
            );
            record.intensity = Some(las_point.intensity);
            record.return_number = Some(las_point.return_number);
            record.withheld = las_point.is_withheld;

            if !record.is_finite() {
                return Err(UnitError::Data(format!(
                    "{}: non-finite coordinate in point record",
                    unit.key
                )));
            }
            batch.points.push(record);
        }
        Ok(batch)
    }
}
