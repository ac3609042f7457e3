use std::str::FromStr;

use crate::error::ConfigurationError;
use crate::grid::AggregateOp;

/// What to do with a unit whose ground subset cannot be triangulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundPolicy {
    /// Record the unit as failed with its geometry cause and continue.
    SkipUnit,
    /// Fail the whole run at the first geometry failure.
    AbortRun,
}

impl FromStr for GroundPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" | "skip-unit" => Ok(GroundPolicy::SkipUnit),
            "abort" | "abort-run" => Ok(GroundPolicy::AbortRun),
            other => Err(format!("unknown ground policy `{}`", other)),
        }
    }
}

/// What to do with points outside the DTM's convex hull during
/// normalization. Uncovered points are never silently retained with a raw
/// elevation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotCoveredPolicy {
    Drop,
    /// Keep the point with its raw elevation but mark it withheld, which
    /// excludes it from raster aggregation.
    Flag,
}

impl FromStr for NotCoveredPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(NotCoveredPolicy::Drop),
            "flag" => Ok(NotCoveredPolicy::Flag),
            other => Err(format!("unknown not-covered policy `{}`", other)),
        }
    }
}

/// How many counted per-unit failures the run tolerates before it is
/// reported as failed overall. Geometry failures under
/// `GroundPolicy::SkipUnit` are itemized but not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    FailOnAny,
    Tolerate(usize),
}

impl FailurePolicy {
    pub fn allows(&self, counted_failures: usize) -> bool {
        match self {
            FailurePolicy::FailOnAny => counted_failures == 0,
            FailurePolicy::Tolerate(limit) => counted_failures <= *limit,
        }
    }
}

/// Immutable configuration snapshot, built once before execution and
/// read-only during it.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub resolution: f64,
    pub window: f64,
    pub operator: AggregateOp,
    pub concurrency: usize,
    pub verbose: bool,
    pub failure_policy: FailurePolicy,
    pub ground_policy: GroundPolicy,
    pub not_covered: NotCoveredPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            window: 1.0,
            operator: AggregateOp::Max,
            concurrency: num_cpus::get(),
            verbose: false,
            failure_policy: FailurePolicy::FailOnAny,
            ground_policy: GroundPolicy::SkipUnit,
            not_covered: NotCoveredPolicy::Drop,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.resolution.is_finite() || self.resolution <= 0.0 {
            return Err(ConfigurationError::InvalidResolution(self.resolution));
        }
        if !self.window.is_finite() || self.window < self.resolution {
            return Err(ConfigurationError::InvalidWindow {
                window: self.window,
                resolution: self.resolution,
            });
        }
        if self.concurrency == 0 {
            return Err(ConfigurationError::InvalidConcurrency(self.concurrency));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_window_below_resolution_is_rejected() {
        let config = PipelineConfig {
            resolution: 4.0,
            window: 2.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn test_nonpositive_resolution_is_rejected() {
        let config = PipelineConfig {
            resolution: 0.0,
            window: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidResolution(_))
        ));
    }

    #[test]
    fn test_failure_policy() {
        assert!(FailurePolicy::FailOnAny.allows(0));
        assert!(!FailurePolicy::FailOnAny.allows(1));
        assert!(FailurePolicy::Tolerate(2).allows(2));
        assert!(!FailurePolicy::Tolerate(2).allows(3));
    }
}
