use std::ffi::OsStr;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;
use clap::Parser;
use env_logger::Builder;
use glob::glob;
use log::LevelFilter;

use pcp_core::config::{FailurePolicy, GroundPolicy, NotCoveredPolicy, PipelineConfig};
use pcp_core::grid::AggregateOp;
use pcp_core::point::Classification;
use pcp_core::predicate::{Attr, CmpOp, Predicate};
use pcp_pipeline::{ExecutionStrategy, PipelineBuilder, RunMode};
use pcp_reader::readers::csv::CsvSource;
use pcp_reader::readers::las::LasSource;
use pcp_reader::UnitSource;

#[derive(Parser, Debug)]
#[command(
    name = "chmgen",
    about = "Builds canopy height model rasters from airborne LiDAR point clouds",
    version = "0.0.1"
)]
struct Cli {
    /// Input files, glob patterns or directories
    #[arg(short, long, required = true, num_args = 1.., value_name = "FILE")]
    input: Vec<String>,

    /// Output raster path (.asc or .bin)
    #[arg(short, long, required = true, value_name = "FILE")]
    output: String,

    /// Worker count; 1 selects the sequential strategy
    #[arg(short, long)]
    cores: Option<usize>,

    #[arg(long, default_value_t = 1.0)]
    resolution: f64,

    /// Aggregation window size; defaults to the resolution
    #[arg(long)]
    window: Option<f64>,

    /// Aggregation operator: max, min, mean or count
    #[arg(long, default_value = "max")]
    operator: String,

    /// Classification codes used as triangulation input
    #[arg(long = "ground-class", default_values_t = [2u8])]
    ground_class: Vec<u8>,

    /// Classification codes removed before triangulation
    #[arg(long = "noise-class", default_values_t = [7u8, 18u8])]
    noise_class: Vec<u8>,

    /// Points above this elevation are removed as outliers
    #[arg(long, default_value_t = 50.0)]
    max_elevation: f64,

    /// Policy for units with too few ground points: skip-unit or abort-run
    #[arg(long, default_value = "skip-unit")]
    ground_policy: String,

    /// Policy for points outside the terrain model: drop or flag
    #[arg(long, default_value = "drop")]
    not_covered: String,

    /// Tolerate up to this many failed units; default fails on any
    #[arg(long)]
    max_failures: Option<usize>,

    /// Load and filter only; report statistics without writing a raster
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn expand_inputs(input_patterns: Vec<String>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for pattern in input_patterns {
        let as_path = PathBuf::from(&pattern);
        if as_path.is_dir() {
            match fs::read_dir(&as_path) {
                Ok(entries) => {
                    paths.extend(entries.filter_map(Result::ok).map(|e| e.path()).filter(
                        |path| {
                            matches!(
                                path.extension().and_then(OsStr::to_str),
                                Some("las") | Some("laz") | Some("csv") | Some("txt")
                            )
                        },
                    ));
                }
                Err(e) => eprintln!("Error reading directory {}: {}", as_path.display(), e),
            }
        } else if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            match glob(&pattern) {
                Ok(entries) => {
                    for entry in entries {
                        match entry {
                            Ok(path) => paths.push(path),
                            Err(e) => eprintln!("Error: {:?}", e),
                        }
                    }
                }
                Err(e) => eprintln!("Bad glob pattern {}: {}", pattern, e),
            }
        } else {
            paths.push(as_path);
        }
    }
    // stable unit enumeration order regardless of filesystem order
    paths.sort();
    paths.dedup();
    paths
}

fn source_for(paths: Vec<PathBuf>) -> Result<Box<dyn UnitSource>, String> {
    let mut extensions: Vec<String> = paths
        .iter()
        .map(|path| {
            path.extension()
                .and_then(OsStr::to_str)
                .map(str::to_ascii_lowercase)
                .ok_or_else(|| format!("{}: file extension is not found", path.display()))
        })
        .collect::<Result<_, _>>()?;
    extensions.sort();
    extensions.dedup();

    match extensions.as_slice() {
        [] => Err("no input files found".to_string()),
        [ext] => match ext.as_str() {
            "las" | "laz" => Ok(Box::new(LasSource::new(paths))),
            "csv" | "txt" => Ok(Box::new(CsvSource::new(paths))),
            other => Err(format!("unsupported input extension `{}`", other)),
        },
        _ => Err("multiple input extensions are not supported".to_string()),
    }
}

fn main() {
    let args = Cli::parse();

    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(
            None,
            if args.verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            },
        )
        .init();

    let cores = args.cores.unwrap_or_else(num_cpus::get).max(1);
    let window = args.window.unwrap_or(args.resolution);

    log::info!("input files: {:?}", args.input);
    log::info!("output raster: {}", args.output);
    log::info!("resolution: {}, window: {}", args.resolution, window);
    log::info!("cores: {}", cores);

    let input_files = expand_inputs(args.input);
    if input_files.is_empty() {
        log::error!("no input files found");
        std::process::exit(2);
    }
    log::info!("expanded input files: {}", input_files.len());

    let source = match source_for(input_files) {
        Ok(source) => source,
        Err(message) => {
            log::error!("{}", message);
            std::process::exit(2);
        }
    };

    let operator: AggregateOp = match args.operator.parse() {
        Ok(operator) => operator,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(2);
        }
    };
    let ground_policy: GroundPolicy = match args.ground_policy.parse() {
        Ok(policy) => policy,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(2);
        }
    };
    let not_covered: NotCoveredPolicy = match args.not_covered.parse() {
        Ok(policy) => policy,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(2);
        }
    };

    let config = PipelineConfig {
        resolution: args.resolution,
        window,
        operator,
        concurrency: cores,
        verbose: args.verbose,
        failure_policy: match args.max_failures {
            Some(limit) => FailurePolicy::Tolerate(limit),
            None => FailurePolicy::FailOnAny,
        },
        ground_policy,
        not_covered,
    };

    let mut builder = PipelineBuilder::new(config);
    for code in &args.noise_class {
        builder = builder.filter(
            format!("noise class {}", code),
            Predicate::class_eq(Classification::from_code(*code)),
        );
    }
    builder = builder
        .filter(
            "above threshold",
            Predicate::Compare {
                attr: Attr::Z,
                op: CmpOp::Gt,
                value: args.max_elevation,
            },
        )
        .triangulate(Predicate::class_in(
            args.ground_class
                .iter()
                .map(|code| Classification::from_code(*code)),
        ))
        .normalize()
        .rasterize(&args.output);

    let mut pipeline = match builder.build() {
        Ok(pipeline) => pipeline,
        Err(e) => {
            log::error!("configuration error: {}", e);
            std::process::exit(2);
        }
    };

    pipeline.set_strategy(if cores == 1 {
        ExecutionStrategy::Sequential
    } else {
        ExecutionStrategy::ConcurrentPerFile(cores)
    });
    if args.dry_run {
        pipeline.set_mode(RunMode::DryRun);
    }

    if let Some(parent) = PathBuf::from(&args.output).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(parent) {
                log::error!("cannot create output directory: {}", e);
                std::process::exit(2);
            }
        }
    }

    log::info!("start processing...");
    let start = std::time::Instant::now();
    let report = pipeline.execute(source.as_ref());
    log::info!("finished in {:?}", start.elapsed());

    if report.success {
        log::info!("CHM processing successful: {}", report.message);
    } else {
        log::error!("CHM processing failed: {}", report.message);
    }
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => log::warn!("cannot serialize report: {}", e),
    }

    std::process::exit(if report.success { 0 } else { 1 });
}
