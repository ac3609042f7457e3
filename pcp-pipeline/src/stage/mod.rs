pub mod filter;
pub mod normalize;
pub mod rasterize;
pub mod triangulate;

pub use filter::FilterStage;
pub use normalize::NormalizeStage;
pub use rasterize::RasterizeStage;
pub use triangulate::TriangulateStage;

/// One composable pipeline stage. The builder validates ordering before a
/// Pipeline is produced, so execution never sees an incompatible chain.
pub enum Stage {
    Filter(FilterStage),
    Triangulate(TriangulateStage),
    Normalize(NormalizeStage),
    Rasterize(RasterizeStage),
}

impl Stage {
    pub fn label(&self) -> &str {
        match self {
            Stage::Filter(stage) => &stage.label,
            Stage::Triangulate(_) => "triangulate",
            Stage::Normalize(_) => "normalize",
            Stage::Rasterize(_) => "rasterize",
        }
    }
}
