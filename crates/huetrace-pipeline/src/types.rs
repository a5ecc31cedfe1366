//! Shared types for the huetrace processing pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::contour::ContourTracerKind;
use crate::mask::RegionFilter;
use crate::quantize::Quantization;

/// Re-export `RgbImage` so downstream crates can reference the
/// composited raster without depending on `image` directly.
pub use image::RgbImage;

/// Re-export `RgbaImage` so downstream crates can reference the
/// original decoded image without depending on `image` directly.
pub use image::RgbaImage;

/// An opaque 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Color {
    /// Opaque white, the default compositing background.
    pub const WHITE: Self = Self::new(255, 255, 255);

    /// Create a new color.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels as an array, in `[r, g, b]` order.
    #[must_use]
    pub const fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Format as a lowercase 6-digit hex string with a leading `#`.
    #[must_use]
    pub fn to_hex(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl From<image::Rgb<u8>> for Color {
    fn from(pixel: image::Rgb<u8>) -> Self {
        let [r, g, b] = pixel.0;
        Self { r, g, b }
    }
}

impl From<Color> for image::Rgb<u8> {
    fn from(color: Color) -> Self {
        Self(color.channels())
    }
}

/// Error returned when a color string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseColorError {
    /// The string did not contain exactly three comma-separated channels.
    #[error("expected three comma-separated channels (R,G,B), got {0:?}")]
    ChannelCount(String),

    /// A channel was not an integer in `0..=255`.
    #[error("invalid color channel {0:?}: expected an integer from 0 to 255")]
    Channel(String),

    /// A `#rrggbb` string was malformed.
    #[error("invalid hex color {0:?}: expected #rrggbb")]
    Hex(String),
}

impl FromStr for Color {
    type Err = ParseColorError;

    /// Parse either `R,G,B` (decimal channels) or `#rrggbb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(ParseColorError::Hex(s.to_owned()));
            }
            let channel = |range: std::ops::Range<usize>| {
                u8::from_str_radix(&hex[range], 16).map_err(|_| ParseColorError::Hex(s.to_owned()))
            };
            return Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?));
        }

        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [r, g, b] = parts.as_slice() else {
            return Err(ParseColorError::ChannelCount(s.to_owned()));
        };
        let channel = |part: &str| {
            part.parse::<u8>()
                .map_err(|_| ParseColorError::Channel(part.to_owned()))
        };
        Ok(Self::new(channel(*r)?, channel(*g)?, channel(*b)?))
    }
}

/// An integer vertex in image (pixel grid) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Column (pixels from left edge).
    pub x: u32,
    /// Row (pixels from top edge).
    pub y: u32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// A closed contour: the last vertex connects back to the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polygon(Vec<Point>);

impl Polygon {
    /// Minimum vertex count for a polygon to enclose any area.
    pub const MIN_VERTICES: usize = 3;

    /// Create a new polygon from a vector of vertices.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polygon has no vertices.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of vertices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the polygon has enough vertices to be emitted.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.0.len() >= Self::MIN_VERTICES
    }

    /// Returns a slice of all vertices.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polygon and returns the underlying vertices.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total pixel count.
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// All polygons traced for one color cluster, with the cluster's fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRegion {
    /// Representative (centroid) color of the cluster.
    pub color: Color,
    /// Outer-boundary polygons of the cluster's retained mask.
    pub polygons: Vec<Polygon>,
}

/// Configuration for the processing pipeline.
///
/// Construct with [`Default`] and override fields, then call
/// [`validate`](Self::validate) (the pipeline entry points do this
/// automatically).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Requested number of color clusters (K). Values below
    /// [`MIN_COLORS`](Self::MIN_COLORS) are clamped up.
    pub colors: usize,

    /// Douglas-Peucker tolerance in pixels: the maximum deviation of a
    /// simplified polygon from its traced contour.
    pub simplify_tolerance: f64,

    /// Minimum 8-connected component area (pixels) treated as significant.
    pub area_threshold: u32,

    /// Background color that transparent pixels are composited over.
    pub background: Color,

    /// How the area threshold is applied to each cluster mask.
    pub region_filter: RegionFilter,

    /// Which contour tracing algorithm to use.
    pub contour_tracer: ContourTracerKind,

    /// Seed for k-means++ initialisation.
    pub seed: u64,

    /// Number of independent k-means attempts; the lowest-distortion
    /// result wins.
    pub attempts: usize,

    /// Iteration cap for each k-means attempt.
    pub max_iterations: usize,

    /// Stop iterating once no centroid moves farther than this (RGB units).
    pub convergence_epsilon: f64,
}

impl PipelineConfig {
    /// Smallest cluster count the quantizer will run with.
    pub const MIN_COLORS: usize = 2;
    /// Default cluster count.
    pub const DEFAULT_COLORS: usize = 8;
    /// Default simplification tolerance in pixels.
    pub const DEFAULT_SIMPLIFY_TOLERANCE: f64 = 1.5;
    /// Default significant-region area in pixels.
    pub const DEFAULT_AREA_THRESHOLD: u32 = 32;
    /// Default k-means seed.
    pub const DEFAULT_SEED: u64 = 0;
    /// Default number of k-means attempts.
    pub const DEFAULT_ATTEMPTS: usize = 3;
    /// Default k-means iteration cap.
    pub const DEFAULT_MAX_ITERATIONS: usize = 20;
    /// Default k-means convergence threshold.
    pub const DEFAULT_CONVERGENCE_EPSILON: f64 = 1.0;

    /// The cluster count actually used: `colors` clamped to at least
    /// [`MIN_COLORS`](Self::MIN_COLORS).
    #[must_use]
    pub fn effective_colors(&self) -> usize {
        self.colors.max(Self::MIN_COLORS)
    }

    /// Check that every numeric parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.simplify_tolerance.is_finite() || self.simplify_tolerance < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "simplify_tolerance must be finite and non-negative, got {}",
                self.simplify_tolerance
            )));
        }
        if !self.convergence_epsilon.is_finite() || self.convergence_epsilon < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "convergence_epsilon must be finite and non-negative, got {}",
                self.convergence_epsilon
            )));
        }
        if self.attempts == 0 {
            return Err(PipelineError::InvalidConfig(
                "attempts must be at least 1".to_owned(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_iterations must be at least 1".to_owned(),
            ));
        }
        if u32::try_from(self.effective_colors()).is_err() {
            return Err(PipelineError::InvalidConfig(format!(
                "colors is too large: {}",
                self.colors
            )));
        }
        Ok(())
    }

    /// Check that the image has at least as many pixels as clusters.
    ///
    /// k-means cannot fill more clusters than it has samples, and every
    /// cluster costs a full-size mask downstream.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if
    /// [`effective_colors`](Self::effective_colors) exceeds the pixel
    /// count of `dimensions`.
    pub fn check_colors_fit(&self, dimensions: Dimensions) -> Result<(), PipelineError> {
        let k = self.effective_colors();
        let pixels = dimensions.pixel_count();
        if u64::try_from(k).ok().is_none_or(|k| k > pixels) {
            return Err(PipelineError::InvalidConfig(format!(
                "colors ({k}) exceeds the image's pixel count ({pixels})"
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            colors: Self::DEFAULT_COLORS,
            simplify_tolerance: Self::DEFAULT_SIMPLIFY_TOLERANCE,
            area_threshold: Self::DEFAULT_AREA_THRESHOLD,
            background: Color::WHITE,
            region_filter: RegionFilter::default(),
            contour_tracer: ContourTracerKind::default(),
            seed: Self::DEFAULT_SEED,
            attempts: Self::DEFAULT_ATTEMPTS,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            convergence_epsilon: Self::DEFAULT_CONVERGENCE_EPSILON,
        }
    }
}

/// Result of running the full pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResult {
    /// One entry per cluster, in cluster-index order. Clusters that
    /// produced no polygons are kept with an empty polygon list.
    pub regions: Vec<ColorRegion>,

    /// Dimensions of the source image in pixels.
    ///
    /// The SVG serializer uses this for the canvas size and `viewBox`.
    pub dimensions: Dimensions,
}

/// Result of running the pipeline with all intermediate stage outputs preserved.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Stage 0: original decoded image as RGBA.
    pub original: RgbaImage,
    /// Stage 1: opaque image after compositing over the background.
    pub composited: RgbImage,
    /// Stage 2: per-pixel cluster labels and centroid colors.
    pub quantization: Quantization,
    /// Stage 3: simplified polygons grouped by cluster.
    pub regions: Vec<ColorRegion>,
    /// Source image dimensions in pixels.
    pub dimensions: Dimensions,
}

impl StagedResult {
    /// Drop the raster intermediates, keeping only the vector output.
    #[must_use]
    pub fn into_result(self) -> ProcessResult {
        ProcessResult {
            regions: self.regions,
            dimensions: self.dimensions,
        }
    }
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Color tests ---

    #[test]
    fn color_hex_is_lowercase_six_digits() {
        assert_eq!(Color::new(255, 0, 0).to_hex(), "#ff0000");
        assert_eq!(Color::new(0, 0, 255).to_hex(), "#0000ff");
        assert_eq!(Color::new(1, 171, 16).to_hex(), "#01ab10");
    }

    #[test]
    fn color_parses_decimal_triple() {
        assert_eq!("125,58,237".parse::<Color>(), Ok(Color::new(125, 58, 237)));
        assert_eq!(" 0, 255 ,0 ".parse::<Color>(), Ok(Color::new(0, 255, 0)));
    }

    #[test]
    fn color_parses_hex() {
        assert_eq!("#7d3aed".parse::<Color>(), Ok(Color::new(125, 58, 237)));
    }

    #[test]
    fn color_rejects_wrong_channel_count() {
        assert!(matches!(
            "1,2".parse::<Color>(),
            Err(ParseColorError::ChannelCount(_))
        ));
        assert!(matches!(
            "1,2,3,4".parse::<Color>(),
            Err(ParseColorError::ChannelCount(_))
        ));
    }

    #[test]
    fn color_rejects_out_of_range_channel() {
        assert!(matches!(
            "256,0,0".parse::<Color>(),
            Err(ParseColorError::Channel(_))
        ));
        assert!(matches!(
            "red,0,0".parse::<Color>(),
            Err(ParseColorError::Channel(_))
        ));
    }

    #[test]
    fn color_rejects_malformed_hex() {
        assert!(matches!("#fff".parse::<Color>(), Err(ParseColorError::Hex(_))));
        assert!(matches!(
            "#gg0000".parse::<Color>(),
            Err(ParseColorError::Hex(_))
        ));
    }

    #[test]
    fn color_converts_to_and_from_rgb_pixel() {
        let c = Color::new(10, 20, 30);
        let px: image::Rgb<u8> = c.into();
        assert_eq!(px.0, [10, 20, 30]);
        assert_eq!(Color::from(px), c);
    }

    // --- Polygon tests ---

    #[test]
    fn polygon_validity_needs_three_vertices() {
        let two = Polygon::new(vec![Point::new(0, 0), Point::new(1, 1)]);
        assert!(!two.is_valid());
        let three = Polygon::new(vec![Point::new(0, 0), Point::new(1, 1), Point::new(0, 1)]);
        assert!(three.is_valid());
        assert_eq!(three.len(), 3);
    }

    #[test]
    fn polygon_into_points_returns_owned_vec() {
        let points = vec![Point::new(0, 0), Point::new(4, 0), Point::new(4, 4)];
        let pg = Polygon::new(points.clone());
        assert_eq!(pg.points(), points.as_slice());
        assert_eq!(pg.into_points(), points);
    }

    #[test]
    fn dimensions_pixel_count() {
        let d = Dimensions {
            width: 100,
            height: 50,
        };
        assert_eq!(d.pixel_count(), 5000);
    }

    // --- PipelineConfig tests ---

    #[test]
    fn pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.colors, 8);
        assert!((config.simplify_tolerance - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.area_threshold, 32);
        assert_eq!(config.background, Color::WHITE);
        assert_eq!(config.region_filter, RegionFilter::WholeMask);
        assert_eq!(config.contour_tracer, ContourTracerKind::BorderFollowing);
        assert_eq!(config.attempts, 3);
        assert_eq!(config.max_iterations, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn effective_colors_clamps_to_two() {
        for colors in [0, 1, 2] {
            let config = PipelineConfig {
                colors,
                ..PipelineConfig::default()
            };
            assert_eq!(config.effective_colors(), 2);
        }
    }

    #[test]
    fn validate_rejects_negative_tolerance() {
        let config = PipelineConfig {
            simplify_tolerance: -0.5,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn validate_rejects_nan_tolerance() {
        let config = PipelineConfig {
            simplify_tolerance: f64::NAN,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_attempts_and_iterations() {
        let no_attempts = PipelineConfig {
            attempts: 0,
            ..PipelineConfig::default()
        };
        assert!(no_attempts.validate().is_err());
        let no_iterations = PipelineConfig {
            max_iterations: 0,
            ..PipelineConfig::default()
        };
        assert!(no_iterations.validate().is_err());
    }

    #[test]
    fn colors_must_fit_in_pixel_count() {
        let dims = Dimensions {
            width: 4,
            height: 4,
        };
        let fits = PipelineConfig {
            colors: 16,
            ..PipelineConfig::default()
        };
        assert!(fits.check_colors_fit(dims).is_ok());

        for colors in [17, 5000, usize::MAX] {
            let config = PipelineConfig {
                colors,
                ..PipelineConfig::default()
            };
            assert!(matches!(
                config.check_colors_fit(dims),
                Err(PipelineError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn clamped_minimum_still_needs_two_pixels() {
        let config = PipelineConfig {
            colors: 0,
            ..PipelineConfig::default()
        };
        let one_pixel = Dimensions {
            width: 1,
            height: 1,
        };
        assert!(config.check_colors_fit(one_pixel).is_err());
    }

    #[test]
    fn config_json_fills_missing_fields_with_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"colors": 4}"#).unwrap();
        assert_eq!(config.colors, 4);
        assert_eq!(config.area_threshold, PipelineConfig::DEFAULT_AREA_THRESHOLD);
    }

    #[test]
    fn config_json_round_trip() {
        let config = PipelineConfig {
            colors: 5,
            background: Color::new(0, 255, 0),
            region_filter: RegionFilter::Components,
            ..PipelineConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
