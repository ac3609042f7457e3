use thiserror::Error;

/// Raised before any unit is processed. Always fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("invalid predicate `{expression}`: {reason}")]
    Predicate { expression: String, reason: String },

    #[error("incompatible stage chain: {0}")]
    StageChain(String),

    #[error("invalid resolution {0}: must be finite and positive")]
    InvalidResolution(f64),

    #[error("invalid window {window}: must be finite and at least the resolution {resolution}")]
    InvalidWindow { window: f64, resolution: f64 },

    #[error("unknown aggregation operator `{0}`")]
    UnknownOperator(String),

    #[error("invalid concurrency degree {0}: must be at least 1")]
    InvalidConcurrency(usize),

    #[error("unsupported raster format `{0}`: expected .asc or .bin")]
    UnsupportedRasterFormat(String),
}

/// Per-unit geometric failure, recovered according to the configured
/// ground-policy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("insufficient ground points: found {found}, need at least 3")]
    InsufficientGroundPoints { found: usize },

    #[error("degenerate ground mesh: {0}")]
    DegenerateMesh(String),
}

/// Per-unit failure. Collected into the run report, never swallowed.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed data: {0}")]
    Data(String),

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

impl UnitError {
    pub fn kind(&self) -> crate::report::FailureKind {
        match self {
            UnitError::Io(_) => crate::report::FailureKind::Io,
            UnitError::Data(_) => crate::report::FailureKind::Data,
            UnitError::Geometry(_) => crate::report::FailureKind::Geometry,
        }
    }
}
