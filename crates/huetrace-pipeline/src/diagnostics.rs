//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter tuning. [`process_staged_with_diagnostics`] is the single
//! staged pipeline: [`crate::process_staged`] runs it with [`NoClock`]
//! and discards the diagnostics.
//!
//! Time is read through the [`Clock`] trait so this crate stays free of
//! platform time sources; binaries supply an `Instant`-backed clock.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::decode;
use crate::quantize::{self, KmeansParams};
use crate::region;
use crate::types::{Dimensions, PipelineConfig, PipelineError, Polygon, StagedResult};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A [`Clock`] that never advances; every stage reports zero duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl Clock for NoClock {
    type Instant = ();

    fn now(&self) -> Self::Instant {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 0: image decoding.
    pub decode: StageDiagnostics,
    /// Stage 1: alpha compositing over the background.
    pub composite: StageDiagnostics,
    /// Stage 2: k-means color quantization.
    pub quantize: StageDiagnostics,
    /// Stage 3: per-cluster mask building and area filtering.
    pub region_filter: StageDiagnostics,
    /// Stage 4: contour tracing.
    pub contour_tracing: StageDiagnostics,
    /// Stage 5: Douglas-Peucker polygon simplification.
    pub simplification: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Whether the source carried an alpha channel.
        has_alpha: bool,
    },
    /// Alpha compositing metrics.
    Composite {
        /// Background color as `#rrggbb`.
        background: String,
        /// Pixels with alpha below 255 (zero for images without alpha).
        translucent_pixel_count: u64,
    },
    /// k-means metrics.
    Quantize {
        /// Cluster count used (after clamping).
        k: usize,
        /// Attempts run.
        attempts: usize,
        /// Iterations of the winning attempt.
        iterations: usize,
        /// Distinct input colors.
        distinct_colors: usize,
        /// Total within-cluster squared distance of the winning attempt.
        distortion: f64,
    },
    /// Area filtering metrics, summed over clusters.
    RegionFilter {
        /// Strategy name.
        strategy: String,
        /// Minimum significant area in pixels.
        area_threshold: u32,
        /// Clusters with a non-empty mask.
        clusters_traced: usize,
        /// 8-connected components across all masks.
        component_count: usize,
        /// Components at or above the threshold.
        significant_count: usize,
        /// Clusters where nothing reached the threshold and the full mask was kept.
        fallback_count: usize,
    },
    /// Contour tracing metrics.
    ContourTracing {
        /// Number of contours found.
        contour_count: usize,
        /// Total number of points across all contours.
        total_point_count: usize,
        /// Minimum points in any single contour.
        min_contour_points: usize,
        /// Maximum points in any single contour.
        max_contour_points: usize,
        /// Mean points per contour.
        mean_contour_points: f64,
    },
    /// Polygon simplification metrics.
    Simplification {
        /// Douglas-Peucker tolerance in pixels.
        tolerance: f64,
        /// Polygons kept after simplification.
        polygon_count: usize,
        /// Contours that degenerated below 3 vertices and were dropped.
        dropped_count: usize,
        /// Total vertices before simplification.
        points_before: usize,
        /// Total vertices after simplification.
        points_after: usize,
        /// Reduction ratio: `1.0 - (after / before)`.
        reduction_ratio: f64,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Cluster count (K).
    pub colors: usize,
    /// Clusters that produced at least one polygon.
    pub colors_used: usize,
    /// Polygons in the output.
    pub polygon_count: usize,
    /// Vertices across all output polygons.
    pub vertex_count: usize,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        let stages = [
            ("Decode", &self.decode),
            ("Composite", &self.composite),
            ("Quantize", &self.quantize),
            ("Region Filter", &self.region_filter),
            ("Contour Tracing", &self.contour_tracing),
            ("Simplification", &self.simplification),
        ];

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Colors: {}/{} used  |  Polygons: {}  |  Vertices: {}",
            self.summary.colors_used,
            self.summary.colors,
            self.summary.polygon_count,
            self.summary.vertex_count,
        ));

        lines.join("\n")
    }
}

/// Run the pipeline, preserving intermediates and recording per-stage
/// diagnostics.
///
/// Produces the same [`StagedResult`] as [`crate::process_staged`].
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// validation or asks for more colors than the image has pixels, and
/// the errors of [`decode::decode`] otherwise.
pub fn process_staged_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    config.validate()?;
    let started = clock.now();

    // 0. Decode.
    let t = clock.now();
    let decoded = decode::decode(image_bytes)?;
    let has_alpha = decoded.color().has_alpha();
    let original = decoded.to_rgba8();
    let dimensions = Dimensions {
        width: original.width(),
        height: original.height(),
    };
    config.check_colors_fit(dimensions)?;
    let decode_diag = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Decode {
            input_bytes: image_bytes.len(),
            width: dimensions.width,
            height: dimensions.height,
            has_alpha,
        },
    };

    // 1. Composite.
    let t = clock.now();
    let composited = decode::composite_over(&decoded, config.background);
    let translucent_pixel_count: u64 = if has_alpha {
        original.pixels().map(|p| u64::from(p.0[3] < 255)).sum()
    } else {
        0
    };
    let composite_diag = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Composite {
            background: config.background.to_hex(),
            translucent_pixel_count,
        },
    };

    // 2. Quantize.
    let t = clock.now();
    let params = KmeansParams::from_config(config);
    let quantization = quantize::quantize(&composited, &params);
    let quantize_diag = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Quantize {
            k: quantization.k(),
            attempts: params.attempts,
            iterations: quantization.iterations,
            distinct_colors: quantization.distinct_colors,
            distortion: quantization.distortion,
        },
    };

    // 3-5. Per cluster: filter, trace, simplify.
    let (regions, trace) = region::trace_regions_timed(&quantization, config, clock);

    let region_filter_diag = StageDiagnostics {
        duration: trace.filter_time,
        metrics: StageMetrics::RegionFilter {
            strategy: format!("{:?}", config.region_filter),
            area_threshold: config.area_threshold,
            clusters_traced: trace.clusters_traced,
            component_count: trace.component_count,
            significant_count: trace.significant_count,
            fallback_count: trace.fallback_count,
        },
    };

    let stats = contour_stats(&trace.contour_lengths);
    let contour_diag = StageDiagnostics {
        duration: trace.trace_time,
        metrics: StageMetrics::ContourTracing {
            contour_count: trace.contour_lengths.len(),
            total_point_count: stats.total,
            min_contour_points: stats.min,
            max_contour_points: stats.max,
            mean_contour_points: stats.mean,
        },
    };

    let polygon_count: usize = regions.iter().map(|r| r.polygons.len()).sum();
    let vertex_count: usize = regions
        .iter()
        .map(|r| total_points(&r.polygons))
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let reduction_ratio = if stats.total > 0 {
        1.0 - (vertex_count as f64 / stats.total as f64)
    } else {
        0.0
    };
    let simplification_diag = StageDiagnostics {
        duration: trace.simplify_time,
        metrics: StageMetrics::Simplification {
            tolerance: config.simplify_tolerance,
            polygon_count,
            dropped_count: trace.contour_lengths.len().saturating_sub(polygon_count),
            points_before: stats.total,
            points_after: vertex_count,
            reduction_ratio,
        },
    };

    let summary = PipelineSummary {
        image_width: dimensions.width,
        image_height: dimensions.height,
        pixel_count: dimensions.pixel_count(),
        colors: quantization.k(),
        colors_used: regions.iter().filter(|r| !r.polygons.is_empty()).count(),
        polygon_count,
        vertex_count,
    };

    let diagnostics = PipelineDiagnostics {
        decode: decode_diag,
        composite: composite_diag,
        quantize: quantize_diag,
        region_filter: region_filter_diag,
        contour_tracing: contour_diag,
        simplification: simplification_diag,
        total_duration: clock.elapsed(&started),
        summary,
    };

    let staged = StagedResult {
        original,
        composited,
        quantization,
        regions,
        dimensions,
    };

    Ok((staged, diagnostics))
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            has_alpha,
        } => {
            let alpha = if *has_alpha { " (alpha)" } else { "" };
            format!("{input_bytes} bytes -> {width}x{height}{alpha}")
        }
        StageMetrics::Composite {
            background,
            translucent_pixel_count,
        } => format!("bg={background} translucent={translucent_pixel_count}"),
        StageMetrics::Quantize {
            k,
            attempts,
            iterations,
            distinct_colors,
            distortion,
        } => format!(
            "k={k} attempts={attempts} iters={iterations} distinct={distinct_colors} distortion={distortion:.0}",
        ),
        StageMetrics::RegionFilter {
            strategy,
            area_threshold,
            clusters_traced,
            component_count,
            significant_count,
            fallback_count,
        } => format!(
            "{strategy} min_area={area_threshold} clusters={clusters_traced} components={component_count} significant={significant_count} fallbacks={fallback_count}",
        ),
        StageMetrics::ContourTracing {
            contour_count,
            total_point_count,
            min_contour_points,
            max_contour_points,
            mean_contour_points,
        } => {
            format!(
                "{contour_count} contours, {total_point_count} pts (min={min_contour_points} max={max_contour_points} mean={mean_contour_points:.1})",
            )
        }
        StageMetrics::Simplification {
            tolerance,
            polygon_count,
            dropped_count,
            points_before,
            points_after,
            reduction_ratio,
        } => {
            format!(
                "tol={tolerance:.2} {points_before}->{points_after} pts ({:.1}% reduction) polys={polygon_count} dropped={dropped_count}",
                reduction_ratio * 100.0,
            )
        }
    }
}

/// Statistics for a set of contours.
struct ContourStats {
    /// Total number of points across all contours.
    total: usize,
    /// Minimum number of points in any single contour.
    min: usize,
    /// Maximum number of points in any single contour.
    max: usize,
    /// Mean number of points per contour.
    mean: f64,
}

/// Compute contour statistics from per-contour vertex counts.
fn contour_stats(lengths: &[usize]) -> ContourStats {
    let total: usize = lengths.iter().sum();
    let min = lengths.iter().copied().min().unwrap_or(0);
    let max = lengths.iter().copied().max().unwrap_or(0);
    #[allow(clippy::cast_precision_loss)]
    let mean = if lengths.is_empty() {
        0.0
    } else {
        total as f64 / lengths.len() as f64
    };
    ContourStats {
        total,
        min,
        max,
        mean,
    }
}

/// Total points across a slice of polygons.
fn total_points(polygons: &[Polygon]) -> usize {
    polygons.iter().map(Polygon::len).sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::types::Color;

    /// Deterministic clock that advances one millisecond per reading.
    struct StepClock(Cell<u64>);

    impl Clock for StepClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.0.get().saturating_sub(*since))
        }
    }

    fn halves_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            }
        });
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn contour_stats_empty() {
        let stats = contour_stats(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.min, 0);
        assert_eq!(stats.max, 0);
        assert!((stats.mean - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn contour_stats_computes() {
        let stats = contour_stats(&[2, 4]);
        assert_eq!(stats.total, 6);
        assert_eq!(stats.min, 2);
        assert_eq!(stats.max, 4);
        assert!((stats.mean - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn matches_undiagnosed_pipeline() {
        let png = halves_png(40, 20);
        let config = PipelineConfig {
            colors: 2,
            ..PipelineConfig::default()
        };
        let clock = StepClock(Cell::new(0));
        let (staged, _) = process_staged_with_diagnostics(&png, &config, &clock).unwrap();
        let plain = crate::process(&png, &config).unwrap();
        assert_eq!(staged.into_result(), plain);
    }

    #[test]
    fn diagnostics_record_counts_and_durations() {
        let png = halves_png(40, 20);
        let config = PipelineConfig {
            colors: 2,
            ..PipelineConfig::default()
        };
        let clock = StepClock(Cell::new(0));
        let (_, diag) = process_staged_with_diagnostics(&png, &config, &clock).unwrap();

        assert_eq!(diag.summary.image_width, 40);
        assert_eq!(diag.summary.colors, 2);
        assert_eq!(diag.summary.colors_used, 2);
        assert_eq!(diag.summary.polygon_count, 2);
        assert_eq!(diag.summary.vertex_count, 8);
        assert!(diag.total_duration > Duration::ZERO);
        assert!(matches!(
            diag.composite.metrics,
            StageMetrics::Composite {
                translucent_pixel_count: 0,
                ..
            }
        ));

        let report = diag.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("Quantize"));
        assert!(report.contains("WholeMask"));
    }

    #[test]
    fn no_clock_reports_zero_durations() {
        let png = halves_png(20, 20);
        let config = PipelineConfig {
            colors: 2,
            ..PipelineConfig::default()
        };
        let (_, diag) = process_staged_with_diagnostics(&png, &config, &NoClock).unwrap();
        assert_eq!(diag.total_duration, Duration::ZERO);
        assert_eq!(diag.contour_tracing.duration, Duration::ZERO);
        assert_eq!(diag.summary.polygon_count, 2);
    }

    #[test]
    fn too_many_colors_fails_after_decoding() {
        let png = halves_png(4, 4);
        let config = PipelineConfig {
            colors: 17,
            ..PipelineConfig::default()
        };
        let result = process_staged_with_diagnostics(&png, &config, &NoClock);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn invalid_config_fails_before_decoding() {
        let config = PipelineConfig {
            attempts: 0,
            ..PipelineConfig::default()
        };
        let clock = StepClock(Cell::new(0));
        let result = process_staged_with_diagnostics(&[], &config, &clock);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let png = halves_png(10, 10);
        let config = PipelineConfig {
            colors: 2,
            background: Color::new(0, 0, 0),
            ..PipelineConfig::default()
        };
        let clock = StepClock(Cell::new(0));
        let (_, diag) = process_staged_with_diagnostics(&png, &config, &clock).unwrap();
        let json = serde_json::to_value(&diag).unwrap();
        assert!(json["total_duration"].is_f64());
        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        let drift = back.total_duration.abs_diff(diag.total_duration);
        assert!(drift < Duration::from_micros(1));
    }
}
