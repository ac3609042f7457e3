use pcp_core::config::PipelineConfig;
use pcp_core::report::Report;
use pcp_reader::UnitSource;

use crate::executor;
use crate::stage::Stage;

/// How spatial units are scheduled. Sequential is the single-worker case
/// and produces byte-identical raster output to the concurrent strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Sequential,
    ConcurrentPerFile(usize),
}

/// Whether the run executes the full chain or only loads and filters,
/// reporting statistics without building terrain or writing a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Full,
    DryRun,
}

/// A validated, immutable chain of stages plus its execution settings.
/// Produced by the PipelineBuilder; executing it never mutates the chain.
pub struct Pipeline {
    stages: Vec<Stage>,
    config: PipelineConfig,
    strategy: ExecutionStrategy,
    mode: RunMode,
}

impl Pipeline {
    pub(crate) fn new(stages: Vec<Stage>, config: PipelineConfig) -> Self {
        Self {
            stages,
            config,
            strategy: ExecutionStrategy::Sequential,
            mode: RunMode::Full,
        }
    }

    pub fn set_strategy(&mut self, strategy: ExecutionStrategy) {
        self.strategy = strategy;
    }

    pub fn set_mode(&mut self, mode: RunMode) {
        self.mode = mode;
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.config.verbose = verbose;
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Runs the chain over every unit the source enumerates and returns
    /// the aggregated report. Per-unit failures are collected into the
    /// report, never raised.
    pub fn execute(&self, source: &dyn UnitSource) -> Report {
        executor::execute(self, source)
    }
}
