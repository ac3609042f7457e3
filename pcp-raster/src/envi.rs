use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use pcp_core::grid::Raster;

use crate::RasterWriter;

/// Flat binary raster (single band, row-major f64 little-endian) with an
/// ENVI `.hdr` text sidecar carrying dimensions, map info and the NoData
/// value.
pub struct EnviWriter;

impl RasterWriter for EnviWriter {
    fn write(&self, raster: &Raster, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        for value in &raster.values {
            writer.write_f64::<LittleEndian>(*value)?;
        }
        writer.flush()?;

        let header_path = path.with_extension("hdr");
        let extent = &raster.extent;
        let mut header = BufWriter::new(File::create(header_path)?);
        writeln!(header, "ENVI")?;
        writeln!(header, "samples = {}", extent.cols)?;
        writeln!(header, "lines = {}", extent.rows)?;
        writeln!(header, "bands = 1")?;
        writeln!(header, "header offset = 0")?;
        writeln!(header, "file type = ENVI Standard")?;
        writeln!(header, "data type = 5")?;
        writeln!(header, "interleave = bsq")?;
        writeln!(header, "byte order = 0")?;
        writeln!(
            header,
            "map info = {{Arbitrary, 1, 1, {}, {}, {}, {}}}",
            extent.min_x, extent.max_y, extent.resolution, extent.resolution
        )?;
        writeln!(header, "data ignore value = {}", raster.nodata)?;
        header.flush()
    }
}
