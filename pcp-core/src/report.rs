use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Io,
    Data,
    Geometry,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitFailure {
    pub unit: String,
    pub kind: FailureKind,
    pub cause: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitStats {
    pub unit: String,
    pub points_read: u64,
    pub points_kept: u64,
    pub ground_points: u64,
    pub points_dropped_uncovered: u64,
    pub points_flagged_uncovered: u64,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportData {
    pub total_points: u64,
    pub total_points_removed: u64,
    /// Points removed per filter stage, keyed by stage label.
    pub points_removed: BTreeMap<String, u64>,
    pub units: Vec<UnitStats>,
    pub units_failed: Vec<UnitFailure>,
}

/// Structured outcome of one pipeline run. Built once, returned to the
/// caller, not mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub success: bool,
    pub message: String,
    pub data: ReportData,
}

impl Report {
    pub fn failure(message: impl Into<String>, data: ReportData) -> Self {
        Self {
            success: false,
            message: message.into(),
            data,
        }
    }
}
