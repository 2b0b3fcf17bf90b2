//! Iterative k-means palette extraction over a color histogram.
//!
//! The loop is strictly sequential: clusters and centroids are rebuilt
//! from scratch on every iteration and nothing outside the loop observes
//! intermediate state. Termination relies on the partition reaching a
//! fixed point under the median update rule; no iteration cap is applied.

use log::warn;
use rand::Rng;

use crate::color::{self, Color, BLACK};
use crate::error::QuantizeError;
use crate::histogram::{Histogram, HistogramEntry, Surface};

/// A cluster's representative color plus its stable index in `[0, k)`.
///
/// `count` carries the summed pixel-occurrence counts of the cluster's
/// members. It is reporting metadata only; the median update deliberately
/// ignores it and weighs each distinct color once.
#[derive(Debug, Clone, Copy)]
pub struct Centroid {
    pub index: usize,
    pub color: Color,
    pub count: u64,
}

/// Reduce `histogram` to exactly `k` representative colors, ordered by
/// centroid index.
///
/// Initial centroids are sampled without replacement from the histogram
/// using `rng`; runs are reproducible under a seeded generator. When the
/// histogram holds fewer than `k` distinct colors, the surplus slots keep
/// the default black color rather than failing.
///
/// # Errors
///
/// [`QuantizeError::InvalidClusterCount`] when `k == 0`,
/// [`QuantizeError::EmptyHistogram`] for a zero-pixel surface.
pub fn quantize<R: Rng>(
    histogram: &Histogram,
    k: usize,
    rng: &mut R,
) -> Result<Vec<Color>, QuantizeError> {
    if k == 0 {
        return Err(QuantizeError::InvalidClusterCount(k));
    }
    if histogram.is_empty() {
        return Err(QuantizeError::EmptyHistogram);
    }

    let mut centroids = init_centroids(k, histogram.entries(), rng);

    // Every entry starts in cluster 0; the first assignment pass against
    // the sampled centroids builds the real partition.
    let mut clusters: Vec<Vec<HistogramEntry>> = vec![Vec::new(); k];
    clusters[0] = histogram.entries().to_vec();

    loop {
        let mut moved = false;
        let mut next: Vec<Vec<HistogramEntry>> = vec![Vec::new(); k];

        for (current, members) in clusters.iter().enumerate() {
            for &entry in members {
                let target = match nearest_centroid(entry.color, &centroids) {
                    Ok(index) => index,
                    Err(err) => {
                        // Contractually unreachable with k >= 1; keep the
                        // entry where it was so the loop still converges.
                        warn!(
                            "assignment found no centroid for {}, keeping cluster {current}: {err}",
                            color::to_hex(entry.color)
                        );
                        current
                    }
                };
                if target != current {
                    moved = true;
                }
                next[target].push(entry);
            }
        }

        clusters = next;
        centroids = median_centroids(&clusters);

        if !moved {
            break;
        }
    }

    Ok(centroids.into_iter().map(|c| c.color).collect())
}

/// Convenience entry: histogram the surface, then [`quantize`] it.
pub fn quantize_surface<R: Rng>(
    surface: &impl Surface,
    k: usize,
    rng: &mut R,
) -> Result<Vec<Color>, QuantizeError> {
    quantize(&Histogram::from_surface(surface), k, rng)
}

/// Sample `k` initial centroids without replacement from the (sorted)
/// histogram entries. With fewer than `k` distinct colors, sampling stops
/// once every color has been taken and the remaining slots stay black.
fn init_centroids<R: Rng>(k: usize, entries: &[HistogramEntry], rng: &mut R) -> Vec<Centroid> {
    let mut centroids: Vec<Centroid> = (0..k)
        .map(|index| Centroid {
            index,
            color: BLACK,
            count: 0,
        })
        .collect();

    let mut chosen = vec![false; entries.len()];
    let mut chosen_total = 0;
    let mut slot = 0;
    while slot < k {
        let candidate = rng.gen_range(0..entries.len());
        if chosen[candidate] {
            continue;
        }
        chosen[candidate] = true;
        chosen_total += 1;
        centroids[slot].color = entries[candidate].color;

        if chosen_total == entries.len() {
            break;
        }
        slot += 1;
    }

    centroids
}

/// Index of the centroid nearest to `target` by squared RGB distance.
///
/// Scans in centroid-index order and only replaces the best candidate on a
/// strict improvement, so ties go to the lowest index.
///
/// # Errors
///
/// [`QuantizeError::EmptyCentroidSet`] when `centroids` is empty. Callers
/// inside a live assignment pass must treat that as an invariant violation
/// and retain the entry's previous cluster.
pub fn nearest_centroid(target: Color, centroids: &[Centroid]) -> Result<usize, QuantizeError> {
    let mut best: Option<(usize, i32)> = None;
    for centroid in centroids {
        let distance = color::distance_sq(target, centroid.color);
        if best.map_or(true, |(_, best_distance)| distance < best_distance) {
            best = Some((centroid.index, distance));
        }
    }
    best.map(|(index, _)| index)
        .ok_or(QuantizeError::EmptyCentroidSet)
}

/// Recompute one centroid per cluster as the per-channel upper median of
/// the cluster's distinct member colors.
///
/// Channels are sorted and picked independently (`sorted[len/2]`), so the
/// resulting color need not equal any actual pixel color. Empty clusters
/// fall back to black with a zero count.
fn median_centroids(clusters: &[Vec<HistogramEntry>]) -> Vec<Centroid> {
    clusters
        .iter()
        .enumerate()
        .map(|(index, members)| {
            let count = members.iter().map(|e| e.count as u64).sum();

            let mut reds: Vec<u8> = members.iter().map(|e| e.color.r).collect();
            let mut greens: Vec<u8> = members.iter().map(|e| e.color.g).collect();
            let mut blues: Vec<u8> = members.iter().map(|e| e.color.b).collect();
            reds.sort_unstable();
            greens.sort_unstable();
            blues.sort_unstable();

            let upper_median = |channel: &[u8]| channel.get(channel.len() / 2).copied().unwrap_or(0);

            Centroid {
                index,
                color: Color {
                    r: upper_median(&reds),
                    g: upper_median(&greens),
                    b: upper_median(&blues),
                },
                count,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::tests::PixelGrid;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn entry(r: u8, g: u8, b: u8, count: u32) -> HistogramEntry {
        HistogramEntry {
            color: Color { r, g, b },
            count,
        }
    }

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(7)
    }

    #[test]
    fn zero_clusters_is_an_error() {
        let grid = PixelGrid::uniform(2, 2, Color { r: 5, g: 5, b: 5 });
        assert!(matches!(
            quantize_surface(&grid, 0, &mut rng()),
            Err(QuantizeError::InvalidClusterCount(0))
        ));
    }

    #[test]
    fn empty_histogram_is_an_error() {
        let grid = PixelGrid::uniform(0, 3, Color { r: 5, g: 5, b: 5 });
        assert!(matches!(
            quantize_surface(&grid, 2, &mut rng()),
            Err(QuantizeError::EmptyHistogram)
        ));
    }

    #[test]
    fn output_length_always_equals_k() {
        let grid = PixelGrid::uniform(4, 4, Color { r: 10, g: 20, b: 30 });
        for k in 1..=6 {
            let palette = quantize_surface(&grid, k, &mut rng()).unwrap();
            assert_eq!(palette.len(), k);
        }
    }

    #[test]
    fn surplus_slots_default_to_black() {
        let grid = PixelGrid::uniform(3, 3, Color { r: 250, g: 0, b: 0 });
        let palette = quantize_surface(&grid, 3, &mut rng()).unwrap();
        let red = palette
            .iter()
            .filter(|&&c| c == Color { r: 250, g: 0, b: 0 })
            .count();
        let black = palette.iter().filter(|&&c| c == BLACK).count();
        assert_eq!(red, 1);
        assert_eq!(black, 2);
    }

    #[test]
    fn nearest_breaks_ties_toward_lowest_index() {
        let centroids = vec![
            Centroid {
                index: 0,
                color: Color { r: 10, g: 0, b: 0 },
                count: 0,
            },
            Centroid {
                index: 1,
                color: Color { r: 30, g: 0, b: 0 },
                count: 0,
            },
        ];
        // (20,0,0) is equidistant from both
        let winner = nearest_centroid(Color { r: 20, g: 0, b: 0 }, &centroids).unwrap();
        assert_eq!(winner, 0);
    }

    #[test]
    fn nearest_on_empty_set_is_an_explicit_error() {
        assert!(matches!(
            nearest_centroid(BLACK, &[]),
            Err(QuantizeError::EmptyCentroidSet)
        ));
    }

    #[test]
    fn median_takes_upper_element_per_channel() {
        // Even-sized cluster: sorted reds [10,20,30,40] -> index 2 -> 30.
        // Channels pick independently, so the result mixes member colors.
        let cluster = vec![
            entry(10, 4, 1, 1),
            entry(20, 3, 2, 1),
            entry(30, 2, 3, 1),
            entry(40, 1, 4, 1),
        ];
        let centroids = median_centroids(&[cluster]);
        assert_eq!(centroids[0].color, Color { r: 30, g: 3, b: 3 });
        assert_eq!(centroids[0].count, 4);
    }

    #[test]
    fn median_ignores_occurrence_weights() {
        // One dominant color by count must not drag the median.
        let cluster = vec![entry(0, 0, 0, 1_000), entry(100, 0, 0, 1), entry(200, 0, 0, 1)];
        let centroids = median_centroids(&[cluster]);
        assert_eq!(centroids[0].color.r, 100);
        assert_eq!(centroids[0].count, 1_002);
    }

    #[test]
    fn empty_cluster_falls_back_to_black() {
        let centroids = median_centroids(&[Vec::new(), vec![entry(9, 9, 9, 2)]]);
        assert_eq!(centroids[0].color, BLACK);
        assert_eq!(centroids[0].count, 0);
        assert_eq!(centroids[1].index, 1);
        assert_eq!(centroids[1].color, Color { r: 9, g: 9, b: 9 });
    }

    #[test]
    fn init_assigns_indices_in_order_and_samples_distinct_colors() {
        let entries: Vec<HistogramEntry> =
            (0..8u8).map(|v| entry(v * 10, 0, 0, 1)).collect();
        let centroids = init_centroids(4, &entries, &mut rng());

        for (slot, centroid) in centroids.iter().enumerate() {
            assert_eq!(centroid.index, slot);
        }
        let mut colors: Vec<Color> = centroids.iter().map(|c| c.color).collect();
        colors.sort();
        colors.dedup();
        assert_eq!(colors.len(), 4, "initial colors must be distinct");
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let pixels = (0..64u32)
            .map(|i| Color {
                r: (i * 3 % 251) as u8,
                g: (i * 7 % 241) as u8,
                b: (i * 11 % 239) as u8,
            })
            .collect();
        let grid = PixelGrid {
            width: 8,
            height: 8,
            pixels,
        };

        let first = quantize_surface(&grid, 4, &mut SmallRng::seed_from_u64(42)).unwrap();
        let second = quantize_surface(&grid, 4, &mut SmallRng::seed_from_u64(42)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn converges_on_a_gradient_surface() {
        let pixels = (0..256u32)
            .map(|i| Color {
                r: i as u8,
                g: (255 - i) as u8,
                b: 128,
            })
            .collect();
        let grid = PixelGrid {
            width: 16,
            height: 16,
            pixels,
        };

        let palette = quantize_surface(&grid, 5, &mut rng()).unwrap();
        assert_eq!(palette.len(), 5);
    }
}
