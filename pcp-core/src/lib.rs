pub mod bounds;
pub mod config;
pub mod error;
pub mod grid;
pub mod point;
pub mod predicate;
pub mod report;
pub mod unit;

pub use config::PipelineConfig;
pub use error::{ConfigurationError, GeometryError, UnitError};
pub use report::Report;
