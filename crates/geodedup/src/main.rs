//! geodedup CLI - removes near-duplicate cities from OpenWeatherMap city lists.

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use geodedup::{
    read_cities, write_cities, DedupConfig, Deduplicator, DistanceMetric, InputFormat,
    WindowStrategy, DEFAULT_MIN_DISTANCE_M,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Machine-readable run summary printed with `--json`.
#[derive(Serialize)]
struct JsonOutput {
    input: String,
    output: Option<String>,
    total_cities: usize,
    unique_cities: usize,
    duplicates: usize,
    duplicate_ratio: f64,
    min_distance_m: f64,
    metric: &'static str,
    candidate_pairs: usize,
    elapsed_secs: f64,
    throughput_cities_s: f64,
}

/// Output file layout.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum Format {
    /// Pick from the output file extension
    Auto,
    /// One JSON object per line
    Jsonl,
    /// A single JSON array
    Json,
}

/// Window derivation for the spatial pre-filter.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum WindowArg {
    /// Derive half-widths from the minimum distance and latitude
    Derived,
    /// Use --dlat/--dlon as fixed half-widths
    Fixed,
}

/// Distance used for the final decision.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum MetricArg {
    /// WGS-84 ellipsoidal distance
    Ellipsoidal,
    /// Spherical haversine distance
    Haversine,
}

impl From<MetricArg> for DistanceMetric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Ellipsoidal => DistanceMetric::Ellipsoidal,
            MetricArg::Haversine => DistanceMetric::Haversine,
        }
    }
}

/// Geospatial deduplication for city lists.
///
/// Drops every city that has another city within the minimum distance later in
/// the list, so that all remaining cities are farther apart than the threshold.
/// Reads line-delimited or array JSON, optionally zstd-compressed (.zst).
#[derive(Parser, Debug)]
#[command(name = "geodedup")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input city list (JSON lines or JSON array, optionally .zst).
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output file path (.zst suffix compresses).
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Output layout (auto-detect from file extension by default).
    #[arg(long, value_enum, default_value = "auto")]
    format: Format,

    /// Minimum distance in meters between retained cities.
    #[arg(short = 'd', long, default_value_t = DEFAULT_MIN_DISTANCE_M)]
    min_distance: f64,

    /// How the pre-filter window is sized.
    #[arg(long, value_enum, default_value = "derived")]
    window: WindowArg,

    /// Fixed latitude half-width in degrees (with --window fixed).
    #[arg(long)]
    dlat: Option<f64>,

    /// Fixed longitude half-width in degrees (with --window fixed).
    #[arg(long)]
    dlon: Option<f64>,

    /// Distance used for the accept/reject decision.
    #[arg(long, value_enum, default_value = "ellipsoidal")]
    metric: MetricArg,

    /// Settle clearly distant pairs with the cheaper haversine distance first.
    #[arg(long)]
    precheck: bool,

    /// Check neighborhoods on a single thread.
    #[arg(long)]
    no_parallel: bool,

    /// Report what would be removed without writing anything.
    #[arg(long)]
    stats_only: bool,

    /// Print the summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Show a progress bar while filtering.
    #[arg(long)]
    progress: bool,

    /// Log configuration and timings (sets RUST_LOG=geodedup=debug unless given).
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a shell completion script
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn city_progress_bar(len: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{wide_bar:.green/white}] {pos}/{len} cities ({per_sec}, {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_message(msg.to_string());
    pb
}

/// Determine the output layout for a path.
fn detect_format(path: &Path, explicit_format: Format) -> Result<InputFormat, String> {
    match explicit_format {
        Format::Auto => InputFormat::from_path(path).ok_or_else(|| {
            format!(
                "Cannot detect format from file extension: {}",
                path.display()
            )
        }),
        Format::Jsonl => Ok(InputFormat::Jsonl),
        Format::Json => Ok(InputFormat::Json),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "geodedup=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

/// Build the dedup configuration from arguments, exiting on invalid values.
fn build_config(args: &Cli) -> DedupConfig {
    if !(args.min_distance.is_finite() && args.min_distance > 0.0) {
        fail("min distance must be > 0");
    }

    let window = match args.window {
        WindowArg::Derived if args.dlat.is_some() || args.dlon.is_some() => {
            fail("--dlat and --dlon are only used with --window fixed")
        }
        WindowArg::Derived => WindowStrategy::Derived,
        WindowArg::Fixed => match (args.dlat, args.dlon) {
            (Some(dlat), Some(dlon)) if dlat > 0.0 && dlon > 0.0 => {
                WindowStrategy::Fixed { dlat, dlon }
            }
            _ => fail("--window fixed requires positive --dlat and --dlon"),
        },
    };

    DedupConfig::with_min_distance(args.min_distance)
        .window(window)
        .metric(args.metric.into())
        .haversine_precheck(args.precheck)
        .parallel(!args.no_parallel)
        .report_interval(1_000)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    if let Some(Commands::Completions { shell }) = args.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "geodedup", &mut io::stdout());
        return Ok(());
    }

    init_logging(args.verbose);

    let input = args.input.clone().ok_or("Input file is required")?;

    let config = build_config(&args);

    if !args.stats_only && args.output.is_none() {
        fail("output file required (use -o/--output or --stats-only)");
    }

    let output_format = match (&args.output, args.stats_only) {
        (Some(path), false) => Some(detect_format(path, args.format).unwrap_or_else(|e| fail(&e))),
        _ => None,
    };

    if args.verbose && !args.json {
        eprintln!("Settings:");
        eprintln!("  Input: {}", input.display());
        if let Some(ref output) = args.output {
            eprintln!("  Output: {}", output.display());
        }
        eprintln!("  Min distance: {} m", config.min_distance_m);
        eprintln!("  Window: {:?}", config.window);
        eprintln!("  Metric: {}", config.metric.name());
        eprintln!("  Haversine pre-check: {}", config.haversine_precheck);
        eprintln!("  Parallel: {}", config.parallel);
        eprintln!();
    }

    let start = Instant::now();

    if args.verbose && !args.json {
        eprintln!("Loading {}...", input.display());
    }

    let cities = read_cities(&input).unwrap_or_else(|e| fail(&e.to_string()));
    let read_time = start.elapsed();

    if args.verbose && !args.json {
        eprintln!(
            "Read {} cities in {:.2}s",
            cities.len(),
            read_time.as_secs_f64()
        );
    }

    if cities.is_empty() && !args.json {
        eprintln!("Warning: No cities found in input file");
    }

    let pb = if args.progress && !args.json {
        Some(city_progress_bar(cities.len() as u64, "Filtering cities"))
    } else {
        None
    };

    let dedup = Deduplicator::new(config);
    let cancel = AtomicBool::new(false);
    let result = dedup.deduplicate_with(&cities, &cancel, |done, _| {
        if let Some(ref pb) = pb {
            pb.set_position(done as u64);
        }
    })?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let stats = &result.stats;
    let config = dedup.config();

    if args.json {
        let output = JsonOutput {
            input: input.display().to_string(),
            output: if args.stats_only {
                None
            } else {
                args.output.as_ref().map(|p| p.display().to_string())
            },
            total_cities: stats.total_records,
            unique_cities: stats.unique_records,
            duplicates: stats.duplicate_count,
            duplicate_ratio: stats.duplicate_ratio,
            min_distance_m: config.min_distance_m,
            metric: config.metric.name(),
            candidate_pairs: stats.candidate_count,
            elapsed_secs: stats.elapsed_secs,
            throughput_cities_s: stats.throughput(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        eprintln!();
        eprintln!("Cities:");
        eprintln!("  Total cities:      {}", stats.total_records);
        eprintln!("  Unique cities:     {}", stats.unique_records);
        eprintln!("  Duplicates found:  {}", stats.duplicate_count);
        eprintln!("  Duplicate ratio:   {:.2}%", stats.duplicate_ratio * 100.0);
        eprintln!(
            "  Removed {} redundant cities, {:.1}% remaining.",
            stats.duplicate_count,
            100.0 - stats.duplicate_ratio * 100.0
        );
        eprintln!();
        eprintln!("Search:");
        eprintln!("  Candidate pairs:   {}", stats.candidate_count);
        if config.haversine_precheck {
            eprintln!("  Pre-check skips:   {}", stats.precheck_skips);
        }
        eprintln!("  Processing time:   {:.3}s", stats.elapsed_secs);
        eprintln!("  Throughput:        {:.0} cities/sec", stats.throughput());
    }

    if let (Some(output_path), Some(format)) = (&args.output, output_format) {
        if args.verbose && !args.json {
            eprintln!();
            eprintln!("Saving survivors...");
        }

        let survivors = result.survivors(&cities);
        write_cities(output_path, &survivors, format)?;

        if args.verbose && !args.json {
            eprintln!(
                "Wrote {} cities to {} ({:?})",
                survivors.len(),
                output_path.display(),
                format
            );
        }
    }

    if !args.json {
        eprintln!();
        eprintln!("Total time: {:.3}s", start.elapsed().as_secs_f64());
        if args.stats_only {
            eprintln!("Nothing written (--stats-only).");
        }
    }

    Ok(())
}
