//! Region tracing: turn each color cluster into filled polygons.
//!
//! For every cluster the label grid is cut into a binary mask, the mask
//! is area-filtered, its external contours are traced and each contour
//! is simplified into a polygon.

use std::time::Duration;

use image::GrayImage;

use crate::contour::ContourTracer;
use crate::diagnostics::{Clock, NoClock};
use crate::quantize::Quantization;
use crate::simplify;
use crate::types::{ColorRegion, PipelineConfig, Polygon};

/// Counts and per-step durations gathered while tracing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceReport {
    /// Time spent labelling components and filtering masks.
    pub filter_time: Duration,
    /// Time spent in contour tracing.
    pub trace_time: Duration,
    /// Time spent simplifying contours.
    pub simplify_time: Duration,
    /// Clusters with a non-empty mask.
    pub clusters_traced: usize,
    /// 8-connected components across all masks.
    pub component_count: usize,
    /// Components at or above the area threshold.
    pub significant_count: usize,
    /// Masks where nothing reached the threshold and the full mask was kept.
    pub fallback_count: usize,
    /// Vertex count of every traced contour, before simplification.
    pub contour_lengths: Vec<usize>,
}

/// Trace the simplified outer-boundary polygons of one binary mask.
///
/// Deterministic: the same mask and configuration always yield the same
/// polygons. An empty mask yields none.
#[must_use = "returns the traced polygons"]
pub fn trace_mask(mask: &GrayImage, config: &PipelineConfig) -> Vec<Polygon> {
    trace_mask_timed(mask, config, &NoClock, &mut TraceReport::default())
}

/// [`trace_mask`], adding its counts and timings to `report`.
pub fn trace_mask_timed<C: Clock>(
    mask: &GrayImage,
    config: &PipelineConfig,
    clock: &C,
    report: &mut TraceReport,
) -> Vec<Polygon> {
    let t = clock.now();
    let filtered = config.region_filter.apply(mask, config.area_threshold);
    report.filter_time += clock.elapsed(&t);

    if filtered.is_empty() {
        return Vec::new();
    }
    report.clusters_traced += 1;
    report.component_count += filtered.component_count;
    report.significant_count += filtered.significant_count;
    report.fallback_count += usize::from(filtered.fell_back);

    let t = clock.now();
    let contours = config.contour_tracer.trace(&filtered.mask);
    report.trace_time += clock.elapsed(&t);
    report
        .contour_lengths
        .extend(contours.iter().map(Polygon::len));

    let t = clock.now();
    let polygons = simplify::simplify_polygons(&contours, config.simplify_tolerance);
    report.simplify_time += clock.elapsed(&t);

    polygons
}

/// Trace every cluster of a quantization, in cluster-index order.
///
/// The returned list always has one entry per centroid; clusters that
/// are absent from the image or trace to nothing carry an empty polygon
/// list.
#[must_use = "returns the traced regions"]
pub fn trace_regions(quantization: &Quantization, config: &PipelineConfig) -> Vec<ColorRegion> {
    trace_regions_timed(quantization, config, &NoClock).0
}

/// [`trace_regions`], also returning the accumulated [`TraceReport`].
///
/// Clusters without pixels are skipped before any mask is built.
pub fn trace_regions_timed<C: Clock>(
    quantization: &Quantization,
    config: &PipelineConfig,
    clock: &C,
) -> (Vec<ColorRegion>, TraceReport) {
    let sizes = quantization.labels.cluster_sizes(quantization.k());
    let mut report = TraceReport::default();

    let regions = quantization
        .centroids
        .iter()
        .zip(&sizes)
        .zip(0_u32..)
        .map(|((&color, &size), cluster)| {
            let polygons = if size == 0 {
                Vec::new()
            } else {
                let mask = quantization.labels.mask(cluster);
                trace_mask_timed(&mask, config, clock, &mut report)
            };
            ColorRegion { color, polygons }
        })
        .collect();

    (regions, report)
}
