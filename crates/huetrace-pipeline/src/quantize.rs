//! Color quantization with k-means clustering.
//!
//! Partitions every pixel of an opaque RGB raster into K clusters and
//! reports a per-pixel label grid plus one representative color per
//! cluster.
//!
//! Pixels are first collapsed into a weighted histogram of unique
//! colors, so the cost of each iteration scales with the number of
//! distinct colors rather than the pixel count. Flat-colored artwork
//! (icons, logos) typically has only a few hundred distinct colors.
//!
//! Initialisation uses k-means++ driven by a seeded [`StdRng`], so a
//! given seed always reproduces the same clustering. Several attempts
//! are run from the same RNG stream and the one with the lowest
//! distortion wins.

use std::collections::HashMap;

use image::{GrayImage, RgbImage};
use rand::SeedableRng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;

use crate::types::{Color, PipelineConfig};

/// An RGB color in floating point for centroid arithmetic.
type Rgb = [f64; 3];

/// Parameters for one quantization run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KmeansParams {
    /// Number of clusters.
    pub k: usize,
    /// Independent attempts; the lowest-distortion attempt wins.
    pub attempts: usize,
    /// Iteration cap per attempt.
    pub max_iterations: usize,
    /// Convergence threshold on the largest centroid movement.
    pub epsilon: f64,
    /// RNG seed for k-means++ initialisation.
    pub seed: u64,
}

impl KmeansParams {
    /// Derive quantizer parameters from the pipeline configuration.
    ///
    /// `k` is taken from [`PipelineConfig::effective_colors`], so it is
    /// always at least 2. `attempts` and `max_iterations` are raised to 1.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            k: config.effective_colors(),
            attempts: config.attempts.max(1),
            max_iterations: config.max_iterations.max(1),
            epsilon: config.convergence_epsilon,
            seed: config.seed,
        }
    }
}

/// Per-pixel cluster indices, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelGrid {
    width: u32,
    height: u32,
    labels: Vec<u32>,
}

impl LabelGrid {
    /// Build a grid from row-major labels.
    ///
    /// Returns `None` if `labels.len() != width * height`.
    #[must_use]
    pub fn from_raw(width: u32, height: u32, labels: Vec<u32>) -> Option<Self> {
        let expected = usize::try_from(u64::from(width) * u64::from(height)).ok()?;
        (labels.len() == expected).then_some(Self {
            width,
            height,
            labels,
        })
    }

    /// Grid width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// All labels, row-major.
    #[must_use]
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Label at `(x, y)`, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = usize::try_from(u64::from(y) * u64::from(self.width) + u64::from(x)).ok()?;
        self.labels.get(idx).copied()
    }

    /// Binary mask of one cluster: 255 where the label equals `cluster`,
    /// 0 elsewhere.
    #[must_use]
    pub fn mask(&self, cluster: u32) -> GrayImage {
        let raw = self
            .labels
            .iter()
            .map(|&label| if label == cluster { 255 } else { 0 })
            .collect();
        // Same length as `labels`, which `from_raw` checked.
        GrayImage::from_raw(self.width, self.height, raw)
            .unwrap_or_else(|| GrayImage::new(self.width, self.height))
    }

    /// Pixel count of each cluster in `0..k`.
    #[must_use]
    pub fn cluster_sizes(&self, k: usize) -> Vec<u64> {
        let mut sizes = vec![0_u64; k];
        for &label in &self.labels {
            if let Some(size) = usize::try_from(label).ok().and_then(|l| sizes.get_mut(l)) {
                *size += 1;
            }
        }
        sizes
    }
}

/// Output of [`quantize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Quantization {
    /// Cluster index of every pixel.
    pub labels: LabelGrid,
    /// One color per cluster, indexed by label.
    pub centroids: Vec<Color>,
    /// Sum of squared RGB distances from each pixel to its (unrounded)
    /// centroid for the winning attempt.
    pub distortion: f64,
    /// Iterations the winning attempt ran before converging or hitting the cap.
    pub iterations: usize,
    /// Number of distinct input colors the clustering ran over.
    pub distinct_colors: usize,
}

impl Quantization {
    /// Number of clusters (K).
    #[must_use]
    pub fn k(&self) -> usize {
        self.centroids.len()
    }
}

/// Weighted histogram of the unique colors in an image.
struct ColorHistogram {
    colors: Vec<Rgb>,
    weights: Vec<f64>,
    /// Index into `colors` for every pixel, row-major.
    pixel_color: Vec<u32>,
}

impl ColorHistogram {
    fn build(image: &RgbImage) -> Self {
        let mut index: HashMap<[u8; 3], u32> = HashMap::new();
        let mut colors = Vec::new();
        let mut counts: Vec<u64> = Vec::new();
        let mut pixel_color = Vec::with_capacity(image.as_raw().len() / 3);

        for pixel in image.pixels() {
            let key = pixel.0;
            let next = u32::try_from(colors.len()).unwrap_or(u32::MAX);
            let idx = *index.entry(key).or_insert_with(|| {
                colors.push(key.map(f64::from));
                counts.push(0);
                next
            });
            if let Some(count) = counts.get_mut(idx as usize) {
                *count += 1;
            }
            pixel_color.push(idx);
        }

        #[allow(clippy::cast_precision_loss)]
        let weights = counts.into_iter().map(|c| c as f64).collect();
        Self {
            colors,
            weights,
            pixel_color,
        }
    }
}

/// One finished k-means attempt.
struct Attempt {
    centers: Vec<Rgb>,
    assignment: Vec<usize>,
    distortion: f64,
    iterations: usize,
}

/// Partition all pixels of `image` into `params.k` clusters.
///
/// Every pixel is assigned to its nearest centroid by Euclidean distance
/// in RGB space (ties go to the lowest cluster index). Centroids are the
/// mean of their assigned pixels, rounded to the nearest integer color.
/// A cluster that ends up with no pixels keeps the color it was seeded
/// with, so the centroid list always has exactly `k` entries.
#[must_use = "returns the label grid and centroids"]
pub fn quantize(image: &RgbImage, params: &KmeansParams) -> Quantization {
    let k = params.k.max(1);
    let histogram = ColorHistogram::build(image);
    let mut rng = StdRng::seed_from_u64(params.seed);

    let mut best: Option<Attempt> = None;
    if !histogram.colors.is_empty() {
        for _ in 0..params.attempts.max(1) {
            let attempt = run_attempt(&histogram, k, params, &mut rng);
            if best
                .as_ref()
                .is_none_or(|b| attempt.distortion < b.distortion)
            {
                best = Some(attempt);
            }
        }
    }

    let Some(best) = best else {
        // No pixels at all: every cluster is empty.
        return Quantization {
            labels: LabelGrid {
                width: image.width(),
                height: image.height(),
                labels: Vec::new(),
            },
            centroids: vec![Color::new(0, 0, 0); k],
            distortion: 0.0,
            iterations: 0,
            distinct_colors: 0,
        };
    };

    let labels = histogram
        .pixel_color
        .iter()
        .map(|&c| {
            best.assignment
                .get(c as usize)
                .and_then(|&label| u32::try_from(label).ok())
                .unwrap_or(0)
        })
        .collect();

    Quantization {
        labels: LabelGrid {
            width: image.width(),
            height: image.height(),
            labels,
        },
        centroids: best.centers.iter().map(|c| to_color(*c)).collect(),
        distortion: best.distortion,
        iterations: best.iterations,
        distinct_colors: histogram.colors.len(),
    }
}

/// Run one seeded k-means attempt over the histogram.
fn run_attempt(
    histogram: &ColorHistogram,
    k: usize,
    params: &KmeansParams,
    rng: &mut StdRng,
) -> Attempt {
    let mut centers = seed_centers(&histogram.colors, &histogram.weights, k, rng);
    let mut assignment = vec![0_usize; histogram.colors.len()];
    let epsilon_sq = params.epsilon * params.epsilon;
    let mut iterations = 0;

    for _ in 0..params.max_iterations.max(1) {
        iterations += 1;
        assign(&histogram.colors, &centers, &mut assignment);
        let updated = recompute_centers(histogram, &assignment, &centers);
        let max_shift_sq = centers
            .iter()
            .zip(&updated)
            .map(|(a, b)| distance_squared(*a, *b))
            .fold(0.0, f64::max);
        centers = updated;
        if max_shift_sq <= epsilon_sq {
            break;
        }
    }

    // Final assignment so labels agree with the returned centers.
    let distortion: f64 = assign(&histogram.colors, &centers, &mut assignment)
        .iter()
        .zip(&histogram.weights)
        .map(|(d, w)| d * w)
        .sum();

    Attempt {
        centers,
        assignment,
        distortion,
        iterations,
    }
}

/// k-means++ seeding.
///
/// The first center is drawn in proportion to color frequency (uniform
/// over pixels). Each subsequent center is drawn with probability
/// proportional to `weight * d^2`, where `d` is the distance to the
/// nearest center chosen so far. When every remaining pixel coincides
/// with a chosen center the draw falls back to frequency alone.
fn seed_centers(colors: &[Rgb], weights: &[f64], k: usize, rng: &mut StdRng) -> Vec<Rgb> {
    let by_frequency = WeightedIndex::new(weights).ok();
    let draw_by_frequency = |rng: &mut StdRng| by_frequency.as_ref().map_or(0, |d| d.sample(rng));

    let mut centers = Vec::with_capacity(k);
    let first = draw_by_frequency(rng);
    centers.push(colors[first]);

    let mut nearest: Vec<f64> = colors
        .iter()
        .map(|c| distance_squared(*c, colors[first]))
        .collect();

    while centers.len() < k {
        let scores: Vec<f64> = nearest.iter().zip(weights).map(|(d, w)| d * w).collect();
        let idx = match WeightedIndex::new(&scores) {
            Ok(by_distance) => by_distance.sample(rng),
            Err(_) => draw_by_frequency(rng),
        };
        let chosen = colors[idx];
        centers.push(chosen);
        for (n, c) in nearest.iter_mut().zip(colors) {
            *n = n.min(distance_squared(*c, chosen));
        }
    }

    centers
}

/// Assign each color to its nearest center, returning the squared
/// distance of each color to that center.
fn assign(colors: &[Rgb], centers: &[Rgb], assignment: &mut [usize]) -> Vec<f64> {
    colors
        .iter()
        .zip(assignment.iter_mut())
        .map(|(color, slot)| {
            let (idx, dist) = nearest_center(*color, centers);
            *slot = idx;
            dist
        })
        .collect()
}

/// Index of and squared distance to the nearest center. Ties go to the
/// lowest index.
fn nearest_center(color: Rgb, centers: &[Rgb]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, center) in centers.iter().enumerate() {
        let d = distance_squared(color, *center);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// Weighted mean of each cluster; empty clusters keep their previous center.
fn recompute_centers(histogram: &ColorHistogram, assignment: &[usize], previous: &[Rgb]) -> Vec<Rgb> {
    let mut sums = vec![[0.0_f64; 3]; previous.len()];
    let mut totals = vec![0.0_f64; previous.len()];

    for ((color, weight), &cluster) in histogram
        .colors
        .iter()
        .zip(&histogram.weights)
        .zip(assignment)
    {
        if let (Some(sum), Some(total)) = (sums.get_mut(cluster), totals.get_mut(cluster)) {
            for (s, c) in sum.iter_mut().zip(color) {
                *s += c * weight;
            }
            *total += weight;
        }
    }

    sums.into_iter()
        .zip(totals)
        .zip(previous)
        .map(|((sum, total), prev)| {
            if total > 0.0 {
                sum.map(|s| s / total)
            } else {
                *prev
            }
        })
        .collect()
}

fn distance_squared(a: Rgb, b: Rgb) -> f64 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr.mul_add(dr, dg.mul_add(dg, db * db))
}

/// Round a floating-point centroid to the nearest 8-bit color.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_color(c: Rgb) -> Color {
    let channel = |v: f64| v.round().clamp(0.0, 255.0) as u8;
    Color::new(channel(c[0]), channel(c[1]), channel(c[2]))
}
