//! Contour tracing: extract outer boundaries from a binary mask.
//!
//! This module defines the [`ContourTracer`] trait for pluggable contour
//! tracing algorithms and the [`ContourTracerKind`] enum for selecting
//! which algorithm to use at runtime.
//!
//! Only external boundaries are produced. Hole borders, and any
//! foreground nested inside a hole, are not traced: the filled outer
//! path covers the hole, and whichever cluster owns the hole's pixels
//! paints them again only if it comes later in paint order. Regions are
//! emitted in cluster-index order, so a hole is visible exactly when its
//! owner has a higher index than the surrounding cluster.
//!
//! Pixels outside the image count as background, so a region touching
//! the image edge still has an outer border there.

use image::GrayImage;
use imageproc::contours::BorderType;
use serde::{Deserialize, Serialize};

use crate::types::{Point, Polygon};

/// Selects which contour tracing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContourTracerKind {
    /// Suzuki-Abe border following via `imageproc::contours::find_contours`,
    /// keeping only top-level outer borders.
    #[default]
    BorderFollowing,
}

/// Trait for contour tracing strategies.
///
/// Input: a binary mask (non-zero pixels = foreground).
/// Output: one closed polygon per external boundary, vertices on
/// boundary pixel centres, in tracing order.
pub trait ContourTracer {
    /// Trace external contours in the given mask.
    fn trace(&self, mask: &GrayImage) -> Vec<Polygon>;
}

impl ContourTracer for ContourTracerKind {
    fn trace(&self, mask: &GrayImage) -> Vec<Polygon> {
        match *self {
            Self::BorderFollowing => trace_border_following(mask),
        }
    }
}

/// Suzuki-Abe border following, outermost borders only.
///
/// The mask is traced inside a one-pixel background frame; without it,
/// `find_contours` reports a region touching column 0 as a hole and a
/// full-frame mask as no border at all. Coordinates are shifted back
/// into the unpadded image.
///
/// Contours with fewer than three points (isolated pixels, two-pixel
/// runs) cannot enclose area and are dropped here.
fn trace_border_following(mask: &GrayImage) -> Vec<Polygon> {
    let padded = pad_with_background(mask);
    let contours: Vec<imageproc::contours::Contour<u32>> =
        imageproc::contours::find_contours(&padded);

    contours
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .filter(|c| c.points.len() >= Polygon::MIN_VERTICES)
        .map(|c| {
            // Border pixels are foreground, so never in the zero frame.
            let points = c
                .points
                .into_iter()
                .map(|p| Point::new(p.x.saturating_sub(1), p.y.saturating_sub(1)))
                .collect();
            Polygon::new(points)
        })
        .collect()
}

/// Copy `mask` into the centre of a buffer one pixel larger on every side.
fn pad_with_background(mask: &GrayImage) -> GrayImage {
    let mut padded = GrayImage::new(mask.width() + 2, mask.height() + 2);
    for (x, y, pixel) in mask.enumerate_pixels() {
        padded.put_pixel(x + 1, y + 1, *pixel);
    }
    padded
}
