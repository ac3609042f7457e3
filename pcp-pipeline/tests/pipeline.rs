use std::path::Path;

use pcp_core::config::{FailurePolicy, GroundPolicy, NotCoveredPolicy, PipelineConfig};
use pcp_core::point::{Classification, PointRecord};
use pcp_core::predicate::Predicate;
use pcp_core::report::FailureKind;
use pcp_pipeline::{ExecutionStrategy, Pipeline, PipelineBuilder, RunMode};
use pcp_reader::readers::memory::MemorySource;

fn ground(x: f64, y: f64, z: f64) -> PointRecord {
    PointRecord::new(x, y, z, Classification::Ground)
}

fn canopy(x: f64, y: f64, z: f64) -> PointRecord {
    PointRecord::new(x, y, z, Classification::HighVegetation)
}

/// 10x10 grid of ground points with a constant elevation.
fn ground_plane(z: f64) -> Vec<PointRecord> {
    let mut points = Vec::new();
    for i in 0..10 {
        for j in 0..10 {
            points.push(ground(i as f64, j as f64, z));
        }
    }
    points
}

fn build_pipeline(config: PipelineConfig, output: &Path) -> Pipeline {
    PipelineBuilder::new(config)
        .filter_expr("low noise", "Classification == 7")
        .unwrap()
        .filter_expr("high noise", "Classification == 18")
        .unwrap()
        .filter_expr("above threshold", "Z > 50")
        .unwrap()
        .triangulate(Predicate::class_eq(Classification::Ground))
        .normalize()
        .rasterize(output)
        .build()
        .unwrap()
}

fn raster_values(path: &Path) -> Vec<f64> {
    let content = std::fs::read_to_string(path).unwrap();
    content
        .lines()
        .skip(6)
        .flat_map(|line| line.split_whitespace().map(|v| v.parse().unwrap()))
        .collect()
}

#[test]
fn test_sequential_and_concurrent_rasters_are_identical() {
    // two overlapping units with different canopy heights, mean operator
    // so that reduction order would show up in the output if it leaked
    let unit_a: Vec<PointRecord> = ground_plane(0.0)
        .into_iter()
        .chain([canopy(2.2, 2.2, 11.0), canopy(5.5, 5.5, 8.0)])
        .collect();
    let unit_b: Vec<PointRecord> = ground_plane(1.0)
        .into_iter()
        .chain([canopy(2.4, 2.4, 17.0), canopy(7.5, 7.5, 4.0)])
        .collect();

    let config = PipelineConfig {
        resolution: 1.0,
        window: 2.0,
        operator: "mean".parse().unwrap(),
        ..Default::default()
    };

    let dir = tempfile::tempdir().unwrap();
    let sequential_path = dir.path().join("sequential.asc");
    let concurrent_path = dir.path().join("concurrent.asc");

    let source = MemorySource::new()
        .add_unit("a.las", unit_a)
        .add_unit("b.las", unit_b);

    let mut pipeline = build_pipeline(config.clone(), &sequential_path);
    pipeline.set_strategy(ExecutionStrategy::Sequential);
    assert!(pipeline.execute(&source).success);

    let mut pipeline = build_pipeline(config, &concurrent_path);
    pipeline.set_strategy(ExecutionStrategy::ConcurrentPerFile(4));
    assert!(pipeline.execute(&source).success);

    let sequential = std::fs::read(&sequential_path).unwrap();
    let concurrent = std::fs::read(&concurrent_path).unwrap();
    assert_eq!(sequential, concurrent);
}

#[test]
fn test_flat_plane_preserves_raw_canopy_heights() {
    // ground at z=0 everywhere, so normalization must leave canopy
    // elevations unchanged
    let points: Vec<PointRecord> = ground_plane(0.0)
        .into_iter()
        .chain([canopy(3.3, 3.3, 7.5), canopy(6.1, 6.1, 12.25)])
        .collect();

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("chm.asc");
    let source = MemorySource::new().add_unit("flat.las", points);

    let pipeline = build_pipeline(PipelineConfig::default(), &output);
    let report = pipeline.execute(&source);
    assert!(report.success);

    let values = raster_values(&output);
    assert!(values.contains(&7.5));
    assert!(values.contains(&12.25));
    // ground-only cells normalize to zero
    assert!(values.contains(&0.0));
}

#[test]
fn test_unit_without_ground_is_skipped_and_itemized() {
    let unit_a: Vec<PointRecord> = ground_plane(0.0)
        .into_iter()
        .chain((0..50).map(|i| canopy(0.5 + (i % 9) as f64, 0.5 + (i / 9) as f64, 6.0)))
        .collect();
    // unit B carries canopy only; its points must not reach the raster
    let unit_b: Vec<PointRecord> = (0..10)
        .map(|i| canopy(20.0 + i as f64 * 0.4, 1.0 + i as f64 * 0.4, 47.0))
        .collect();

    let config = PipelineConfig {
        ground_policy: GroundPolicy::SkipUnit,
        failure_policy: FailurePolicy::FailOnAny,
        ..Default::default()
    };

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("chm.asc");
    let source = MemorySource::new()
        .add_unit("a.las", unit_a)
        .add_unit("b.las", unit_b);

    let report = build_pipeline(config, &output).execute(&source);

    // skipped geometry failures leave the run a partial success
    assert!(report.success);
    assert_eq!(report.data.units_failed.len(), 1);
    let failure = &report.data.units_failed[0];
    assert_eq!(failure.unit, "b.las");
    assert_eq!(failure.kind, FailureKind::Geometry);
    assert!(failure.cause.contains("insufficient ground points"));
    assert_eq!(report.data.units.len(), 1);

    let values = raster_values(&output);
    assert!(values.contains(&6.0));
    assert!(!values.contains(&47.0));
}

#[test]
fn test_abort_run_policy_fails_the_run() {
    let unit_a: Vec<PointRecord> = (0..5).map(|i| canopy(i as f64, 0.5, 9.0)).collect();
    let unit_b: Vec<PointRecord> = ground_plane(0.0);

    let config = PipelineConfig {
        ground_policy: GroundPolicy::AbortRun,
        ..Default::default()
    };

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("chm.asc");
    let source = MemorySource::new()
        .add_unit("a.las", unit_a)
        .add_unit("b.las", unit_b);

    let mut pipeline = build_pipeline(config, &output);
    pipeline.set_strategy(ExecutionStrategy::Sequential);
    let report = pipeline.execute(&source);

    assert!(!report.success);
    assert!(report.message.contains("aborted"));
    assert_eq!(report.data.units_failed.len(), 1);
    assert_eq!(report.data.units_failed[0].kind, FailureKind::Geometry);
    // the raster is not written for an aborted run
    assert!(!output.exists());
}

#[test]
fn test_failure_threshold_tolerates_bad_units() {
    let good = ground_plane(0.0);

    let strict_source = MemorySource::new()
        .add_unit("good.las", good.clone())
        .add_unit("empty.las", Vec::new());

    let dir = tempfile::tempdir().unwrap();

    let report = build_pipeline(PipelineConfig::default(), &dir.path().join("strict.asc"))
        .execute(&strict_source);
    assert!(!report.success);
    assert_eq!(report.data.units_failed.len(), 1);
    assert_eq!(report.data.units_failed[0].kind, FailureKind::Data);

    let tolerant_config = PipelineConfig {
        failure_policy: FailurePolicy::Tolerate(1),
        ..Default::default()
    };
    let report = build_pipeline(tolerant_config, &dir.path().join("tolerant.asc"))
        .execute(&strict_source);
    assert!(report.success);
    assert_eq!(report.data.units_failed.len(), 1);
}

#[test]
fn test_filter_stages_report_removed_counts() {
    let points: Vec<PointRecord> = ground_plane(0.0)
        .into_iter()
        .chain([
            PointRecord::new(1.5, 1.5, 3.0, Classification::LowNoise),
            PointRecord::new(2.5, 2.5, 3.0, Classification::HighNoise),
            PointRecord::new(3.5, 3.5, 3.0, Classification::HighNoise),
            canopy(4.5, 4.5, 99.0),
        ])
        .collect();

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("chm.asc");
    let source = MemorySource::new().add_unit("survey.las", points);

    let report = build_pipeline(PipelineConfig::default(), &output).execute(&source);
    assert!(report.success);
    assert_eq!(report.data.total_points, 104);
    assert_eq!(report.data.points_removed["low noise"], 1);
    assert_eq!(report.data.points_removed["high noise"], 2);
    assert_eq!(report.data.points_removed["above threshold"], 1);
    assert_eq!(report.data.total_points_removed, 4);
}

#[test]
fn test_dry_run_reports_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("chm.asc");
    let source = MemorySource::new().add_unit("a.las", ground_plane(0.0));

    let mut pipeline = build_pipeline(PipelineConfig::default(), &output);
    pipeline.set_mode(RunMode::DryRun);
    let report = pipeline.execute(&source);

    assert!(report.success);
    assert_eq!(report.data.total_points, 100);
    assert_eq!(report.data.units.len(), 1);
    assert!(!output.exists());
}

#[test]
fn test_flagged_uncovered_points_do_not_reach_the_raster() {
    // canopy point outside the ground hull, flag policy keeps it in the
    // batch but withheld
    let points: Vec<PointRecord> = ground_plane(0.0)
        .into_iter()
        .chain([canopy(30.0, 30.0, 55.0)])
        .collect();

    let config = PipelineConfig {
        not_covered: NotCoveredPolicy::Flag,
        ..Default::default()
    };

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("chm.asc");
    let source = MemorySource::new().add_unit("a.las", points);

    let report = build_pipeline(config, &output).execute(&source);
    assert!(report.success);
    assert_eq!(report.data.units[0].points_flagged_uncovered, 1);
    assert_eq!(report.data.units[0].points_dropped_uncovered, 0);

    let values = raster_values(&output);
    assert!(!values.contains(&55.0));
}
