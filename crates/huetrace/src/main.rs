//! huetrace: convert a raster image into a color-separated SVG.
//!
//! Reads an image file, runs the quantize-and-trace pipeline, and writes
//! one filled `<path>` per traced region. Optionally prints per-stage
//! diagnostics to stderr.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin huetrace -- --input logo.png --output logo.svg [OPTIONS]
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use huetrace_pipeline::diagnostics::Clock;
use huetrace_pipeline::{Color, PipelineConfig, ProcessResult};

/// Convert a raster image into filled SVG polygons, one color per region.
#[derive(Parser)]
#[command(name = "huetrace", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    #[arg(long)]
    input: PathBuf,

    /// Path of the SVG file to write. Missing parent directories are created.
    #[arg(long)]
    output: PathBuf,

    /// Number of color clusters (values below 2 are raised to 2).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_COLORS)]
    colors: usize,

    /// Polygon simplification tolerance in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SIMPLIFY_TOLERANCE)]
    tolerance: f64,

    /// Minimum connected-region area in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_AREA_THRESHOLD)]
    area_threshold: u32,

    /// Background color for transparent pixels, as "R,G,B" or "#rrggbb".
    #[arg(long, default_value = "255,255,255")]
    bg: Color,

    /// Seed for k-means initialisation.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SEED)]
    seed: u64,

    /// Number of k-means attempts; the best one is kept.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_ATTEMPTS, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    attempts: usize,

    /// How the area threshold is applied to each color mask.
    #[arg(long, value_enum, default_value_t = Filter::WholeMask)]
    region_filter: Filter,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Print per-stage timing and count diagnostics to stderr.
    #[arg(long)]
    diagnostics: bool,

    /// Print diagnostics as JSON instead of a human-readable report.
    #[arg(long, requires = "diagnostics")]
    json: bool,
}

/// Region filter selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Filter {
    /// Keep or drop each color's mask as a whole.
    WholeMask,
    /// Drop individual small components from each color's mask.
    Components,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.  Otherwise, a config is
/// assembled from the individual flags. Either way the result is
/// validated before it is returned.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        PipelineConfig {
            colors: cli.colors,
            simplify_tolerance: cli.tolerance,
            area_threshold: cli.area_threshold,
            background: cli.bg,
            seed: cli.seed,
            attempts: cli.attempts,
            region_filter: match cli.region_filter {
                Filter::WholeMask => huetrace_pipeline::RegionFilter::WholeMask,
                Filter::Components => huetrace_pipeline::RegionFilter::Components,
            },
            ..PipelineConfig::default()
        }
    };

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.input.display());
            return ExitCode::FAILURE;
        }
    };

    let result = match run_pipeline(&cli, &image_bytes, &config) {
        Ok(result) => result,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let title = cli
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("huetrace");
    let config_json = serde_json::to_string(&config).ok();
    let metadata = huetrace_export::SvgMetadata {
        title: Some(title),
        description: None,
        config_json: config_json.as_deref(),
    };
    let svg = huetrace_export::to_svg(&result.regions, result.dimensions, &metadata);

    if let Err(e) = write_atomic(&cli.output, svg.as_bytes()) {
        eprintln!("Error writing SVG to {}: {e}", cli.output.display());
        return ExitCode::FAILURE;
    }

    println!("Saved SVG to: {}", cli.output.display());
    ExitCode::SUCCESS
}

/// Run the pipeline, reporting diagnostics on stderr when requested.
fn run_pipeline(
    cli: &Cli,
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<ProcessResult, String> {
    if !cli.diagnostics {
        return huetrace_pipeline::process(image_bytes, config)
            .map_err(|e| format!("Pipeline error: {e}"));
    }

    eprintln!(
        "Image: {} ({} bytes)",
        cli.input.display(),
        image_bytes.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!();

    let (staged, diagnostics) = huetrace_pipeline::diagnostics::process_staged_with_diagnostics(
        image_bytes,
        config,
        &StdClock,
    )
    .map_err(|e| format!("Pipeline error: {e}"))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&diagnostics)
            .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
        eprintln!("{json}");
    } else {
        eprintln!("{}", diagnostics.report());
    }

    Ok(staged.into_result())
}

/// Write `contents` to `path` through a temporary sibling file.
///
/// Parent directories are created first. The temporary file is renamed
/// over `path` only after a complete write, and removed on failure, so
/// `path` never holds partial output.
fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = temp_sibling(path);
    let written = std::fs::write(&tmp, contents).and_then(|()| std::fs::rename(&tmp, path));
    if written.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    written
}

/// `dir/.name.tmp-<pid>` next to `path`.
fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_else(|| OsStr::new("output")));
    name.push(format!(".tmp-{}", std::process::id()));
    path.with_file_name(name)
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
