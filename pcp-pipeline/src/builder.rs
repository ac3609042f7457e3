use std::path::PathBuf;

use pcp_core::config::PipelineConfig;
use pcp_core::error::ConfigurationError;
use pcp_core::predicate::Predicate;

use crate::pipeline::Pipeline;
use crate::stage::{FilterStage, NormalizeStage, RasterizeStage, Stage, TriangulateStage};

/// Builds a validated Pipeline from an ordered list of stage descriptors.
/// All composition failures surface here, before any unit is processed.
pub struct PipelineBuilder {
    config: PipelineConfig,
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            stages: Vec::new(),
        }
    }

    pub fn filter(mut self, label: impl Into<String>, predicate: Predicate) -> Self {
        self.stages
            .push(Stage::Filter(FilterStage::new(label, predicate)));
        self
    }

    /// Filter stage from the textual predicate form, e.g.
    /// `"Classification == 7"`. Malformed expressions fail fast.
    pub fn filter_expr(
        self,
        label: impl Into<String>,
        expression: &str,
    ) -> Result<Self, ConfigurationError> {
        let predicate = Predicate::parse(expression)?;
        Ok(self.filter(label, predicate))
    }

    pub fn triangulate(mut self, ground: Predicate) -> Self {
        self.stages
            .push(Stage::Triangulate(TriangulateStage::new(ground)));
        self
    }

    pub fn normalize(mut self) -> Self {
        self.stages.push(Stage::Normalize(NormalizeStage));
        self
    }

    pub fn rasterize(mut self, output: impl Into<PathBuf>) -> Self {
        self.stages
            .push(Stage::Rasterize(RasterizeStage::new(output)));
        self
    }

    pub fn build(self) -> Result<Pipeline, ConfigurationError> {
        self.config.validate()?;
        Self::validate_chain(&self.stages)?;
        Ok(Pipeline::new(self.stages, self.config))
    }

    fn validate_chain(stages: &[Stage]) -> Result<(), ConfigurationError> {
        let chain_error = |reason: &str| ConfigurationError::StageChain(reason.to_string());

        if stages.is_empty() {
            return Err(chain_error("pipeline contains no stages"));
        }

        let mut triangulate_at = None;
        let mut normalize_at = None;
        let mut rasterize_at = None;

        for (position, stage) in stages.iter().enumerate() {
            match stage {
                Stage::Filter(_) => {}
                Stage::Triangulate(_) => {
                    if triangulate_at.is_some() {
                        return Err(chain_error("more than one triangulate stage"));
                    }
                    triangulate_at = Some(position);
                }
                Stage::Normalize(_) => {
                    if normalize_at.is_some() {
                        return Err(chain_error("more than one normalize stage"));
                    }
                    normalize_at = Some(position);
                }
                Stage::Rasterize(stage) => {
                    if rasterize_at.is_some() {
                        return Err(chain_error("more than one rasterize stage"));
                    }
                    rasterize_at = Some(position);
                    pcp_raster::format_for_path(&stage.output)?;
                }
            }
        }

        let rasterize_at = rasterize_at.ok_or_else(|| chain_error("missing rasterize stage"))?;
        if rasterize_at != stages.len() - 1 {
            return Err(chain_error("rasterize must be the terminal stage"));
        }

        match (triangulate_at, normalize_at) {
            (None, Some(_)) => {
                return Err(chain_error("normalize requires a preceding triangulate"));
            }
            (Some(t), Some(n)) if t > n => {
                return Err(chain_error("normalize requires a preceding triangulate"));
            }
            _ => {}
        }

        Ok(())
    }
}
