use std::path::PathBuf;

use crate::bounds::Bounds;

/// One schedulable chunk of input, typically a single file. Discovered at
/// pipeline start and consumed exactly once by the execution strategy.
#[derive(Debug, Clone)]
pub struct SpatialUnit {
    /// Stable enumeration position; partial grids are reduced in this order.
    pub index: usize,
    pub key: String,
    pub path: PathBuf,
    pub bounds: Option<Bounds>,
}

impl SpatialUnit {
    pub fn new(index: usize, path: PathBuf) -> Self {
        let key = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            index,
            key,
            path,
            bounds: None,
        }
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }
}
