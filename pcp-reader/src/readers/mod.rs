use pcp_core::error::UnitError;
use pcp_core::point::PointBatch;
use pcp_core::unit::SpatialUnit;

pub mod csv;
pub mod las;
pub mod memory;

/// Result of unit discovery. Units that could not be enumerated (unreadable
/// header, unknown bounds) are listed as per-unit failures instead of
/// failing the whole source.
#[derive(Debug, Default)]
pub struct Enumeration {
    pub units: Vec<SpatialUnit>,
    pub failures: Vec<(String, UnitError)>,
}

/// External reader collaborator: discovers spatial units and loads their
/// point batches. Both operations are fallible; load errors surface as
/// per-unit failures in the run report.
pub trait UnitSource: Send + Sync {
    fn enumerate_units(&self) -> Result<Enumeration, UnitError>;

    fn load(&self, unit: &SpatialUnit) -> Result<PointBatch, UnitError>;
}
