//! huetrace-pipeline: Pure color-quantization and region-tracing pipeline (sans-IO).
//!
//! Converts raster images into filled polygons grouped by color through:
//! decode -> composite -> quantize (k-means) -> per-cluster mask ->
//! area filter -> contour tracing -> simplification.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and returns structured data. Filesystem interaction lives
//! in the `huetrace` binary and SVG serialization in `huetrace-export`.

pub mod contour;
pub mod decode;
pub mod diagnostics;
pub mod mask;
pub mod quantize;
pub mod region;
pub mod simplify;
pub mod types;

pub use contour::{ContourTracer, ContourTracerKind};
pub use mask::RegionFilter;
pub use quantize::{KmeansParams, LabelGrid, Quantization};
pub use types::{
    Color, ColorRegion, Dimensions, ParseColorError, PipelineConfig, PipelineError, Point,
    Polygon, ProcessResult, StagedResult,
};

/// Run the full image processing pipeline.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and a configuration,
/// then produces a [`ProcessResult`] containing one [`ColorRegion`] per
/// color cluster and the source image dimensions. The dimensions are
/// needed by export serializers to size the canvas.
///
/// # Pipeline steps
///
/// 1. Decode image
/// 2. Composite transparent pixels over `config.background`
/// 3. k-means quantization into `config.effective_colors()` clusters
/// 4. Per cluster: binary mask and area filtering
/// 5. External contour tracing (pluggable strategy)
/// 6. Polygon simplification (Ramer-Douglas-Peucker)
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails validation
/// or `config.colors` exceeds the image's pixel count.
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
pub fn process(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<ProcessResult, PipelineError> {
    Ok(process_staged(image_bytes, config)?.into_result())
}

/// Run the pipeline and keep every intermediate result.
///
/// This is [`diagnostics::process_staged_with_diagnostics`] with a clock
/// that never advances, so both entry points share one code path.
///
/// # Errors
///
/// Same as [`process`].
pub fn process_staged(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    diagnostics::process_staged_with_diagnostics(image_bytes, config, &diagnostics::NoClock)
        .map(|(staged, _)| staged)
}
