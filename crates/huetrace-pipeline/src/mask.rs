//! Area-threshold filtering of per-cluster binary masks.
//!
//! Each cluster's mask is split into 8-connected components and every
//! component's pixel area is measured. The [`RegionFilter`] strategy then
//! decides which pixels survive into contour tracing.
//!
//! Whatever the strategy, a mask in which *no* component reaches the
//! threshold is traced in full rather than dropped, so small clusters
//! still contribute geometry when they are all the cluster has.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};

/// Foreground value in binary masks.
pub const FOREGROUND: u8 = 255;

/// Selects how the area threshold is applied to a cluster mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegionFilter {
    /// Retain the entire mask, speckles included.
    ///
    /// The threshold only decides whether the cluster has any
    /// significant region; either way the whole mask is traced. This
    /// keeps every pixel of the image covered by some path.
    #[default]
    WholeMask,

    /// Retain only components whose area reaches the threshold, falling
    /// back to the whole mask when none does.
    Components,
}

/// A cluster mask after area filtering, with the counts that drove the
/// decision.
#[derive(Debug, Clone)]
pub struct FilteredMask {
    /// Pixels to trace (255 = foreground).
    pub mask: GrayImage,
    /// Number of 8-connected components in the original mask.
    pub component_count: usize,
    /// Components whose area is at least the threshold.
    pub significant_count: usize,
    /// `true` when no component reached the threshold and the full
    /// original mask was kept.
    pub fell_back: bool,
}

impl FilteredMask {
    /// Returns `true` if there is nothing to trace.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.component_count == 0
    }
}

impl RegionFilter {
    /// Apply this strategy to `mask` with the given area threshold.
    #[must_use = "returns the filtered mask"]
    pub fn apply(self, mask: &GrayImage, area_threshold: u32) -> FilteredMask {
        let (labels, areas) = label_components(mask);
        let threshold = u64::from(area_threshold);
        let significant_count = areas.iter().filter(|&&a| a >= threshold).count();
        let fell_back = significant_count == 0;

        let retained = match self {
            Self::WholeMask => mask.clone(),
            Self::Components if fell_back => mask.clone(),
            Self::Components => GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
                let label = labels.get_pixel(x, y).0[0] as usize;
                let keep = label != 0 && areas.get(label - 1).is_some_and(|&a| a >= threshold);
                Luma([if keep { FOREGROUND } else { 0 }])
            }),
        };

        FilteredMask {
            mask: retained,
            component_count: areas.len(),
            significant_count,
            fell_back,
        }
    }
}

/// Label the 8-connected foreground components of `mask`.
///
/// Returns the label image (0 = background, components numbered from 1)
/// and the pixel area of each component, indexed by `label - 1`.
pub fn label_components(mask: &GrayImage) -> (image::ImageBuffer<Luma<u32>, Vec<u32>>, Vec<u64>) {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0_u8]));
    let mut areas: Vec<u64> = Vec::new();
    for label in labels.pixels().map(|p| p.0[0] as usize).filter(|&l| l != 0) {
        if areas.len() < label {
            areas.resize(label, 0);
        }
        areas[label - 1] += 1;
    }
    (labels, areas)
}
