use std::ffi::OsStr;
use std::io;
use std::path::Path;

use pcp_core::error::ConfigurationError;
use pcp_core::grid::Raster;

pub mod asc;
pub mod envi;

pub use asc::AsciiGridWriter;
pub use envi::EnviWriter;

/// Serializes a finalized raster to disk. Resolution, origin and the
/// NoData value are recorded in the file's header or sidecar.
pub trait RasterWriter: Send + Sync {
    fn write(&self, raster: &Raster, path: &Path) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    AsciiGrid,
    Envi,
}

/// Picks the output format from the path extension. Unknown extensions are
/// a configuration error, raised at pipeline construction.
pub fn format_for_path(path: &Path) -> Result<RasterFormat, ConfigurationError> {
    match path.extension().and_then(OsStr::to_str) {
        Some(ext) if ext.eq_ignore_ascii_case("asc") => Ok(RasterFormat::AsciiGrid),
        Some(ext) if ext.eq_ignore_ascii_case("bin") || ext.eq_ignore_ascii_case("bsq") => {
            Ok(RasterFormat::Envi)
        }
        _ => Err(ConfigurationError::UnsupportedRasterFormat(
            path.display().to_string(),
        )),
    }
}

pub fn writer_for(format: RasterFormat) -> Box<dyn RasterWriter> {
    match format {
        RasterFormat::AsciiGrid => Box::new(AsciiGridWriter),
        RasterFormat::Envi => Box::new(EnviWriter),
    }
}
