use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crossbeam::channel;
use itertools::Itertools as _;
use rayon::iter::{IntoParallelRefIterator as _, ParallelIterator as _};

use pcp_core::bounds::Bounds;
use pcp_core::config::GroundPolicy;
use pcp_core::error::UnitError;
use pcp_core::grid::{Grid, GridExtent, PartialGrid};
use pcp_core::report::{FailureKind, Report, ReportData, UnitFailure, UnitStats};
use pcp_core::unit::SpatialUnit;
use pcp_reader::UnitSource;

use crate::dtm::Dtm;
use crate::pipeline::{ExecutionStrategy, Pipeline, RunMode};
use crate::stage::{RasterizeStage, Stage};

struct UnitSuccess {
    stats: UnitStats,
    removed: Vec<(String, u64)>,
    partial: Option<PartialGrid>,
}

enum UnitOutcome {
    Completed(UnitSuccess),
    Failed { unit: String, error: UnitError },
    /// Not started because an abort was already signalled.
    Skipped,
}

pub(crate) fn execute(pipeline: &Pipeline, source: &dyn UnitSource) -> Report {
    let config = pipeline.config();
    let mut data = ReportData::default();

    log::debug!(
        "stage chain: {}",
        pipeline
            .stages()
            .iter()
            .map(Stage::label)
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    let enumeration = match source.enumerate_units() {
        Ok(enumeration) => enumeration,
        Err(error) => {
            return Report::failure(format!("unit enumeration failed: {}", error), data);
        }
    };

    for (unit, error) in &enumeration.failures {
        data.units_failed.push(UnitFailure {
            unit: unit.clone(),
            kind: error.kind(),
            cause: error.to_string(),
        });
    }

    let mut units = Vec::new();
    for unit in enumeration.units {
        if unit.bounds.is_some() {
            units.push(unit);
        } else {
            data.units_failed.push(UnitFailure {
                unit: unit.key.clone(),
                kind: FailureKind::Data,
                cause: "unit bounds are unknown".to_string(),
            });
        }
    }

    // The mosaic extent is fixed before any unit is processed; every
    // partial grid indexes into the same cell space.
    let extent = mosaic_extent(&units, config.resolution);
    if let Some(extent) = &extent {
        log::debug!(
            "mosaic extent: {} x {} cells at resolution {}",
            extent.cols,
            extent.rows,
            extent.resolution
        );
    }

    let abort = AtomicBool::new(false);
    let (progress_tx, progress_rx) = channel::unbounded::<String>();
    let total_units = units.len();
    let verbose = config.verbose;
    let progress_thread = std::thread::spawn(move || {
        let mut done = 0usize;
        while let Ok(key) = progress_rx.recv() {
            done += 1;
            if verbose {
                log::info!("processed {}/{} units ({})", done, total_units, key);
            } else {
                log::debug!("processed {}/{} units ({})", done, total_units, key);
            }
        }
    });

    let abort_flag = &abort;
    let extent_ref = extent.as_ref();
    let ground_policy = config.ground_policy;
    let progress = progress_tx.clone();
    let run_unit = move |unit: &SpatialUnit| -> (usize, UnitOutcome) {
        if abort_flag.load(Ordering::SeqCst) {
            return (unit.index, UnitOutcome::Skipped);
        }
        let outcome = match process_unit(pipeline, source, unit, extent_ref) {
            Ok(success) => UnitOutcome::Completed(success),
            Err(error) => {
                if matches!(error, UnitError::Geometry(_))
                    && ground_policy == GroundPolicy::AbortRun
                {
                    abort_flag.store(true, Ordering::SeqCst);
                }
                UnitOutcome::Failed {
                    unit: unit.key.clone(),
                    error,
                }
            }
        };
        let _ = progress.send(unit.key.clone());
        (unit.index, outcome)
    };

    let outcomes: Vec<(usize, UnitOutcome)> = match pipeline.strategy() {
        ExecutionStrategy::Sequential => units.iter().map(run_unit).collect(),
        ExecutionStrategy::ConcurrentPerFile(workers) => {
            let workers = workers.max(1);
            match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => pool.install(|| units.par_iter().map(run_unit).collect()),
                Err(error) => {
                    log::warn!("falling back to sequential execution: {}", error);
                    units.iter().map(run_unit).collect()
                }
            }
        }
    };
    drop(progress_tx);
    let _ = progress_thread.join();

    // Single-threaded reduction in unit-index order. The operators are
    // associative and commutative, so this matches any schedule's output.
    let mut grid = match (&extent, pipeline.mode()) {
        (Some(extent), RunMode::Full) => Some(Grid::new(extent.clone())),
        _ => None,
    };
    let mut skipped = 0usize;

    for (_, outcome) in outcomes.into_iter().sorted_by_key(|(index, _)| *index) {
        match outcome {
            UnitOutcome::Completed(success) => {
                data.total_points += success.stats.points_read;
                for (label, count) in success.removed {
                    *data.points_removed.entry(label).or_insert(0) += count;
                    data.total_points_removed += count;
                }
                if let (Some(grid), Some(partial)) = (grid.as_mut(), success.partial.as_ref()) {
                    if !partial.is_empty() {
                        grid.merge(partial);
                    }
                }
                data.units.push(success.stats);
            }
            UnitOutcome::Failed { unit, error } => {
                log::warn!("unit {} failed: {}", unit, error);
                data.units_failed.push(UnitFailure {
                    unit,
                    kind: error.kind(),
                    cause: error.to_string(),
                });
            }
            UnitOutcome::Skipped => skipped += 1,
        }
    }

    let aborted = abort.load(Ordering::SeqCst);
    let mut write_error = None;
    if !aborted {
        if let (Some(grid), Some(stage)) = (&grid, rasterize_stage(pipeline)) {
            let raster = grid.finalize(config.operator);
            let result = pcp_raster::format_for_path(&stage.output)
                .map_err(|e| std::io::Error::other(e.to_string()))
                .and_then(|format| pcp_raster::writer_for(format).write(&raster, &stage.output));
            match result {
                Ok(()) => log::debug!("wrote raster {}", stage.output.display()),
                Err(error) => write_error = Some(error.to_string()),
            }
        }
    }

    let counted_failures = data
        .units_failed
        .iter()
        .filter(|failure| {
            !(failure.kind == FailureKind::Geometry
                && config.ground_policy == GroundPolicy::SkipUnit)
        })
        .count();

    let success = !aborted && write_error.is_none() && config.failure_policy.allows(counted_failures);

    let message = if aborted {
        format!(
            "run aborted on geometry failure; {} units were not started",
            skipped
        )
    } else if let Some(error) = write_error {
        format!("failed to write raster: {}", error)
    } else if data.units_failed.is_empty() {
        format!("processed {} units", data.units.len())
    } else {
        format!(
            "processed {} units, {} failed",
            data.units.len(),
            data.units_failed.len()
        )
    };

    Report {
        success,
        message,
        data,
    }
}

fn mosaic_extent(units: &[SpatialUnit], resolution: f64) -> Option<GridExtent> {
    let mut bounds: Option<Bounds> = None;
    for unit in units {
        if let Some(unit_bounds) = &unit.bounds {
            bounds = Some(match bounds {
                Some(acc) => acc.union(unit_bounds),
                None => *unit_bounds,
            });
        }
    }
    bounds.map(|bounds| GridExtent::from_bounds(&bounds, resolution))
}

fn rasterize_stage(pipeline: &Pipeline) -> Option<&RasterizeStage> {
    pipeline.stages().iter().find_map(|stage| match stage {
        Stage::Rasterize(stage) => Some(stage),
        _ => None,
    })
}

/// Runs the full chain for one unit. The unit's batch, terrain model and
/// partial grid are all local to this call; nothing is shared with other
/// units.
fn process_unit(
    pipeline: &Pipeline,
    source: &dyn UnitSource,
    unit: &SpatialUnit,
    extent: Option<&GridExtent>,
) -> Result<UnitSuccess, UnitError> {
    let start = Instant::now();
    let dry_run = pipeline.mode() == RunMode::DryRun;

    let mut batch = source.load(unit)?;
    let points_read = batch.len() as u64;

    let mut removed = Vec::new();
    let mut dtm: Option<Dtm> = None;
    let mut ground_points = 0u64;
    let mut dropped = 0u64;
    let mut flagged = 0u64;
    let mut partial: Option<PartialGrid> = None;

    for stage in pipeline.stages() {
        match stage {
            Stage::Filter(filter) => {
                let (next, count) = filter.apply(batch);
                batch = next;
                removed.push((filter.label.clone(), count));
            }
            Stage::Triangulate(triangulate) if !dry_run => {
                let (built, count) = triangulate.build(&batch)?;
                ground_points = count as u64;
                dtm = Some(built);
            }
            Stage::Normalize(normalize) if !dry_run => {
                let surface = dtm.as_ref().ok_or_else(|| {
                    UnitError::Data("normalize reached without a terrain model".to_string())
                })?;
                let (next, d, f) = normalize.apply(batch, surface, pipeline.config().not_covered);
                batch = next;
                dropped = d;
                flagged = f;
            }
            Stage::Rasterize(rasterize) if !dry_run => {
                if let Some(extent) = extent {
                    let mut unit_grid = PartialGrid::new(extent.clone());
                    rasterize.rasterize(&batch, &mut unit_grid, pipeline.config().window);
                    partial = Some(unit_grid);
                }
            }
            _ => {}
        }
    }

    let stats = UnitStats {
        unit: unit.key.clone(),
        points_read,
        points_kept: batch.len() as u64,
        ground_points,
        points_dropped_uncovered: dropped,
        points_flagged_uncovered: flagged,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };

    Ok(UnitSuccess {
        stats,
        removed,
        partial,
    })
}
