use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use pcp_core::grid::Raster;

use crate::RasterWriter;

/// ESRI ASCII grid writer. Header records the grid dimensions, the
/// lower-left corner, the cell size and the NoData value; data rows follow
/// in row-major order from the top row down.
pub struct AsciiGridWriter;

impl RasterWriter for AsciiGridWriter {
    fn write(&self, raster: &Raster, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let extent = &raster.extent;
        writeln!(writer, "ncols {}", extent.cols)?;
        writeln!(writer, "nrows {}", extent.rows)?;
        writeln!(writer, "xllcorner {}", extent.min_x)?;
        writeln!(writer, "yllcorner {}", extent.min_y)?;
        writeln!(writer, "cellsize {}", extent.resolution)?;
        writeln!(writer, "NODATA_value {}", raster.nodata)?;

        for row in 0..extent.rows {
            for col in 0..extent.cols {
                if col > 0 {
                    write!(writer, " ")?;
                }
                write!(writer, "{}", raster.value(row, col))?;
            }
            writeln!(writer)?;
        }

        writer.flush()
    }
}
