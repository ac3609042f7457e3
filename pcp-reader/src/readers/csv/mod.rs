use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};

use pcp_core::bounds::Bounds;
use pcp_core::error::UnitError;
use pcp_core::point::{Classification, PointBatch, PointRecord};
use pcp_core::unit::SpatialUnit;

use super::{Enumeration, UnitSource};

/// Delimited text source with `x,y,z[,classification[,intensity
/// [,return_number]]]` columns. A header row is detected by attempting to
/// parse the first record's coordinates; named columns may appear in any
/// order.
pub struct CsvSource {
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
struct FieldMapping {
    x: usize,
    y: usize,
    z: usize,
    classification: Option<usize>,
    intensity: Option<usize>,
    return_number: Option<usize>,
}

impl FieldMapping {
    fn positional() -> Self {
        Self {
            x: 0,
            y: 1,
            z: 2,
            classification: Some(3),
            intensity: Some(4),
            return_number: Some(5),
        }
    }

    fn from_headers(headers: &StringRecord, key: &str) -> Result<Self, UnitError> {
        let mut x = None;
        let mut y = None;
        let mut z = None;
        let mut classification = None;
        let mut intensity = None;
        let mut return_number = None;

        for (index, name) in headers.iter().enumerate() {
            match name.trim().to_ascii_lowercase().as_str() {
                "x" => x = Some(index),
                "y" => y = Some(index),
                "z" | "elevation" => z = Some(index),
                "classification" | "class" => classification = Some(index),
                "intensity" => intensity = Some(index),
                "return_number" | "returnnumber" => return_number = Some(index),
                _ => {}
            }
        }

        match (x, y, z) {
            (Some(x), Some(y), Some(z)) => Ok(Self {
                x,
                y,
                z,
                classification,
                intensity,
                return_number,
            }),
            _ => Err(UnitError::Data(format!(
                "{}: header must name x, y and z columns",
                key
            ))),
        }
    }
}

impl CsvSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    fn parse_field<T: std::str::FromStr>(
        record: &StringRecord,
        index: usize,
        line: u64,
        name: &str,
        key: &str,
    ) -> Result<T, UnitError> {
        record
            .get(index)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| {
                UnitError::Data(format!("{}: record {}: bad `{}` field", key, line, name))
            })
    }

    fn load_path(path: &Path, key: &str) -> Result<PointBatch, UnitError> {
        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut batch = PointBatch::new();
        let mut mapping = FieldMapping::positional();
        let mut line: u64 = 0;

        for record in reader.records() {
            let record = record.map_err(|e| UnitError::Data(format!("{}: {}", key, e)))?;
            line += 1;

            if line == 1 {
                let first_is_numeric = record
                    .get(0)
                    .map(|v| v.trim().parse::<f64>().is_ok())
                    .unwrap_or(false);
                if !first_is_numeric {
                    mapping = FieldMapping::from_headers(&record, key)?;
                    continue;
                }
            }

            let x: f64 = Self::parse_field(&record, mapping.x, line, "x", key)?;
            let y: f64 = Self::parse_field(&record, mapping.y, line, "y", key)?;
            let z: f64 = Self::parse_field(&record, mapping.z, line, "z", key)?;

            // Classification defaults to Unclassified when the column is absent.
            let classification = match mapping.classification {
                Some(index) if record.get(index).is_some_and(|v| !v.trim().is_empty()) => {
                    let code: u8 = Self::parse_field(&record, index, line, "classification", key)?;
                    Classification::from_code(code)
                }
                _ => Classification::Unclassified,
            };

            let mut point = PointRecord::new(x, y, z, classification);
            if !point.is_finite() {
                return Err(UnitError::Data(format!(
                    "{}: record {}: non-finite coordinate",
                    key, line
                )));
            }

            if let Some(index) = mapping.intensity {
                if record.get(index).is_some_and(|v| !v.trim().is_empty()) {
                    point.intensity =
                        Some(Self::parse_field(&record, index, line, "intensity", key)?);
                }
            }
            if let Some(index) = mapping.return_number {
                if record.get(index).is_some_and(|v| !v.trim().is_empty()) {
                    point.return_number =
                        Some(Self::parse_field(&record, index, line, "return_number", key)?);
                }
            }

            batch.points.push(point);
        }

        Ok(batch)
    }
}

impl UnitSource for CsvSource {
    fn enumerate_units(&self) -> Result<Enumeration, UnitError> {
        let mut enumeration = Enumeration::default();
        for (index, path) in self.paths.iter().enumerate() {
            let unit = SpatialUnit::new(index, path.clone());
            // Text sources carry no header bounds; a full scan is required.
            match Self::load_path(path, &unit.key)
                .and_then(|batch| {
                    Bounds::of_points(&batch.points).ok_or_else(|| {
                        UnitError::Data(format!("{}: file contains no points", unit.key))
                    })
                }) {
                Ok(bounds) => enumeration.units.push(unit.with_bounds(bounds)),
                Err(error) => enumeration.failures.push((unit.key, error)),
            }
        }
        Ok(enumeration)
    }

    fn load(&self, unit: &SpatialUnit) -> Result<PointBatch, UnitError> {
        Self::load_path(&unit.path, &unit.key)
    }
}
