// THEORY:
// The `AxisCluster` module is the second segmentation strategy. It is used for
// sheets where the artist promises exactly K characters standing side by side.
// Instead of discovering components, it splits the opaque pixels into K groups
// along the x-axis with a one-dimensional Lloyd iteration (k-means on x).
// Ragged outlines, detached props, and antialiasing islands all get absorbed
// into their nearest character instead of becoming separate components.
//
// Algorithm steps:
// 1.  **Evidence**: collect every opaque pixel. Fewer than K pixels cannot form
//     K non-empty clusters, so that fails immediately.
// 2.  **Seeding**: sort the x-coordinates, cut them into K equal strata, and
//     draw one seed per stratum from an injected random source. Seeds come out
//     ascending, so the initial left-to-right order usually survives.
// 3.  **Iteration**: assign each pixel to the nearest centroid (ties go to the
//     lowest index), then move each centroid to the mean x of its members. A
//     cluster that received nobody keeps its previous centroid. Stop once every
//     centroid moves by no more than epsilon, or after the iteration cap.
// 4.  **Boxes**: one tight box per non-empty cluster, sorted by `min_x`. Fewer
//     than K boxes is a reportable failure, never a silently short result.
//
// Seed-to-cluster identity is not stable across runs. Only the final sorted
// output order is guaranteed.

use crate::core_modules::bounding_box::BoundingBox;
use crate::core_modules::pixel::pixel::{AlphaThreshold, collect_opaque_pixels};
use crate::error::{Result, SpriteError};
use image::RgbaImage;
use rand::Rng;
use serde::Deserialize;

pub const DEFAULT_MAX_ITERATIONS: usize = 25;
pub const DEFAULT_EPSILON: f64 = 0.05;

/// Tunables for axis clustering.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Pixels with alpha above this value are sprite content.
    pub alpha_threshold: AlphaThreshold,
    /// The exact number of side-by-side sprites on the sheet.
    pub count: usize,
    /// Upper bound on assignment/update rounds.
    pub max_iterations: usize,
    /// Largest centroid movement still considered converged.
    pub epsilon: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            alpha_threshold: AlphaThreshold(200),
            count: 1,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

/// The result of a one-dimensional clustering run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterOutcome {
    /// Final centroid positions, one per cluster, in seed order.
    pub centroids: Vec<f64>,
    /// For every input point, the index of the cluster it was last assigned to.
    pub assignments: Vec<usize>,
    /// Number of assignment/update rounds that ran.
    pub iterations: usize,
    /// Whether the run stopped because the centroids settled.
    pub converged: bool,
}

impl ClusterOutcome {
    /// Member count per cluster from the final assignment.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &cluster in &self.assignments {
            sizes[cluster] += 1;
        }
        sizes
    }
}

/// Draws one seed per stratum of the sorted x-coordinates.
///
/// Returns an ascending list of `k` seeds. Requires `xs.len() >= k`; with fewer
/// values only as many strata as values are produced.
pub fn seed_centroids<R: Rng + ?Sized>(xs: &[u32], k: usize, rng: &mut R) -> Vec<f64> {
    let mut sorted = xs.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    let k = k.min(n);

    (0..k)
        .map(|stratum| {
            let start = stratum * n / k;
            let end = (stratum + 1) * n / k;
            f64::from(sorted[rng.gen_range(start..end)])
        })
        .collect()
}

/// Index of the centroid nearest to `x`. Ties resolve to the lowest index.
fn nearest_centroid(x: f64, centroids: &[f64]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (index, centroid) in centroids.iter().enumerate() {
        let distance = (x - centroid).abs();
        if distance < best_distance {
            best_distance = distance;
            best = index;
        }
    }
    best
}

/// Lloyd iteration on scalar points starting from `seeds`.
///
/// Runs at least one round so `assignments` is always populated.
pub fn cluster_1d(points: &[f64], seeds: &[f64], max_iterations: usize, epsilon: f64) -> ClusterOutcome {
    let k = seeds.len();
    let mut centroids = seeds.to_vec();
    let mut assignments = vec![0usize; points.len()];
    let mut iterations = 0;
    let mut converged = false;

    if k == 0 {
        return ClusterOutcome {
            centroids,
            assignments: Vec::new(),
            iterations,
            converged: true,
        };
    }

    while iterations < max_iterations.max(1) {
        iterations += 1;

        // --- Assignment ---
        let mut sums = vec![0.0f64; k];
        let mut counts = vec![0usize; k];
        for (point, slot) in points.iter().zip(assignments.iter_mut()) {
            let cluster = nearest_centroid(*point, &centroids);
            *slot = cluster;
            sums[cluster] += point;
            counts[cluster] += 1;
        }

        // --- Update ---
        let mut settled = true;
        for cluster in 0..k {
            if counts[cluster] == 0 {
                // Empty cluster keeps its previous centroid.
                continue;
            }
            let mean = sums[cluster] / counts[cluster] as f64;
            if (mean - centroids[cluster]).abs() > epsilon {
                settled = false;
            }
            centroids[cluster] = mean;
        }

        if settled {
            converged = true;
            break;
        }
    }

    ClusterOutcome {
        centroids,
        assignments,
        iterations,
        converged,
    }
}

/// Splits the opaque pixels of `image` into exactly `config.count` boxes,
/// sorted left-to-right by `min_x`.
pub fn find_clusters<R: Rng + ?Sized>(
    image: &RgbaImage,
    config: &ClusterConfig,
    rng: &mut R,
) -> Result<Vec<BoundingBox>> {
    let k = config.count;
    if k == 0 {
        return Ok(Vec::new());
    }

    let pixels = collect_opaque_pixels(image, config.alpha_threshold);
    if pixels.len() < k {
        return Err(SpriteError::InsufficientEvidence {
            required: k,
            found: pixels.len(),
        });
    }

    let xs: Vec<u32> = pixels.iter().map(|p| p.x).collect();
    let points: Vec<f64> = xs.iter().map(|&x| f64::from(x)).collect();
    let seeds = seed_centroids(&xs, k, rng);
    let outcome = cluster_1d(&points, &seeds, config.max_iterations, config.epsilon);

    tracing::debug!(
        pixels = pixels.len(),
        iterations = outcome.iterations,
        converged = outcome.converged,
        centroids = ?outcome.centroids,
        "axis clustering finished"
    );

    // --- Box Derivation ---
    let mut boxes: Vec<Option<BoundingBox>> = vec![None; k];
    for (pixel, &cluster) in pixels.iter().zip(&outcome.assignments) {
        let (x, y) = (i64::from(pixel.x), i64::from(pixel.y));
        boxes[cluster] = Some(match boxes[cluster] {
            Some(b) => b.include(x, y),
            None => BoundingBox::new(x, y, x, y),
        });
    }

    let mut boxes: Vec<BoundingBox> = boxes.into_iter().flatten().collect();
    if boxes.len() != k {
        tracing::warn!(expected = k, found = boxes.len(), "axis clustering left empty clusters");
        return Err(SpriteError::ClusterCountMismatch {
            expected: k,
            found: boxes.len(),
        });
    }

    boxes.sort_by_key(BoundingBox::min_x);
    Ok(boxes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn fill(image: &mut RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32) {
        for y in y0..=y1 {
            for x in x0..=x1 {
                image.put_pixel(x, y, Rgba([30, 90, 160, 255]));
            }
        }
    }

    fn config(count: usize) -> ClusterConfig {
        ClusterConfig {
            count,
            ..ClusterConfig::default()
        }
    }

    #[test]
    fn three_blocks_cluster_left_to_right() {
        let mut image = RgbaImage::new(60, 20);
        fill(&mut image, 46, 4, 55, 15);
        fill(&mut image, 2, 4, 11, 15);
        fill(&mut image, 24, 4, 33, 15);

        for seed in [0u64, 7, 42, 1234] {
            let mut rng = StdRng::seed_from_u64(seed);
            let boxes = find_clusters(&image, &config(3), &mut rng).unwrap();
            assert_eq!(
                boxes,
                vec![
                    BoundingBox::new(2, 4, 11, 15),
                    BoundingBox::new(24, 4, 33, 15),
                    BoundingBox::new(46, 4, 55, 15),
                ]
            );
        }
    }

    #[test]
    fn centroids_settle_on_block_centres() {
        let points: Vec<f64> = (2..=11).chain(24..=33).chain(46..=55).map(f64::from).collect();
        let outcome = cluster_1d(&points, &[3.0, 30.0, 50.0], DEFAULT_MAX_ITERATIONS, DEFAULT_EPSILON);
        assert!(outcome.converged);
        let expected = [6.5, 28.5, 50.5];
        for (got, want) in outcome.centroids.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{got} vs {want}");
        }
        assert_eq!(outcome.cluster_sizes(), vec![10, 10, 10]);
    }

    #[test]
    fn too_few_opaque_pixels_is_insufficient_evidence() {
        let mut image = RgbaImage::new(10, 10);
        image.put_pixel(1, 1, Rgba([0, 0, 0, 255]));
        image.put_pixel(8, 8, Rgba([0, 0, 0, 255]));

        let mut rng = StdRng::seed_from_u64(1);
        match find_clusters(&image, &config(3), &mut rng) {
            Err(SpriteError::InsufficientEvidence { required, found }) => {
                assert_eq!((required, found), (3, 2));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn empty_cluster_keeps_previous_centroid() {
        let points = [0.0, 1.0, 2.0, 100.0, 101.0];
        let outcome = cluster_1d(&points, &[0.0, 100.0, 1000.0], 25, 0.05);
        assert_eq!(outcome.centroids[2], 1000.0);
        assert_eq!(outcome.cluster_sizes(), vec![3, 2, 0]);
        assert!((outcome.centroids[0] - 1.0).abs() < 1e-9);
        assert!((outcome.centroids[1] - 100.5).abs() < 1e-9);
    }

    #[test]
    fn ties_go_to_the_lowest_index() {
        let outcome = cluster_1d(&[5.0], &[4.0, 6.0], 1, 0.05);
        assert_eq!(outcome.assignments, vec![0]);
    }

    #[test]
    fn degenerate_seeding_reports_cluster_mismatch() {
        // A single vertical line: every seed lands on the same x, and ties
        // push all pixels into cluster 0.
        let mut image = RgbaImage::new(10, 10);
        fill(&mut image, 5, 0, 5, 9);

        let mut rng = StdRng::seed_from_u64(3);
        match find_clusters(&image, &config(2), &mut rng) {
            Err(SpriteError::ClusterCountMismatch { expected, found }) => {
                assert_eq!((expected, found), (2, 1));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn seeds_are_ascending_and_one_per_stratum() {
        let xs: Vec<u32> = (0..90).rev().collect();
        let mut rng = StdRng::seed_from_u64(99);
        let seeds = seed_centroids(&xs, 3, &mut rng);
        assert_eq!(seeds.len(), 3);
        assert!(seeds[0] < 30.0);
        assert!((30.0..60.0).contains(&seeds[1]));
        assert!(seeds[2] >= 60.0);
    }

    #[test]
    fn iteration_cap_is_respected() {
        let points: Vec<f64> = (0..100).map(f64::from).collect();
        let outcome = cluster_1d(&points, &[0.0, 1.0], 2, 0.0);
        assert_eq!(outcome.iterations, 2);
        assert!(!outcome.converged);
    }
}
