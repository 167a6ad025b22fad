//! Gap distance estimation from mate pair evidence

use crate::scaffold::mate_pairs::{ContigMatePairs, MatePairLinks, ValidMatePair};

/// Smallest per-pair deviation used for weighting
const MIN_STANDARD_DEVIATION: f64 = 1.0;

#[derive(Debug, Clone, Default)]
pub struct DistanceCalculator;

impl DistanceCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Fill in distance, deviation and weight for every link
    pub fn calculate_distances<S: AsRef<str>>(&self, links: &mut MatePairLinks, contigs: &[S]) {
        for (&forward, targets) in links.iter_mut() {
            let forward_length = contigs.get(forward).map_or(0, |c| c.as_ref().len());
            for link in targets.values_mut() {
                Self::estimate(link, forward_length);
            }
        }
    }

    fn estimate(link: &mut ContigMatePairs, forward_length: usize) {
        for orientation in 0..2 {
            let samples: Vec<(f64, f64)> = link
                .pairs
                .iter()
                .map(|pair| Self::implied_distance(pair, forward_length, orientation))
                .collect();
            let (distance, deviation) = Self::combine(samples);
            link.distance[orientation] = distance;
            link.standard_deviation[orientation] = deviation;
        }
        link.weight = link.pairs.len();
    }

    /// Gap implied by one pair and its deviation
    fn implied_distance(pair: &ValidMatePair, forward_length: usize, orientation: usize) -> (f64, f64) {
        let reverse_offset = if orientation == 0 {
            pair.reverse_contig_start
        } else {
            pair.reverse_complement_start
        };
        let distance = pair.mean
            - (forward_length as f64 - pair.forward_contig_start as f64)
            - reverse_offset as f64
            - 1.0;
        (distance, pair.standard_deviation.max(MIN_STANDARD_DEVIATION))
    }

    /// Inverse-variance weighted mean, dropping samples further than three
    /// deviations from it until the sample set is stable
    fn combine(mut samples: Vec<(f64, f64)>) -> (f64, f64) {
        if samples.is_empty() {
            return (0.0, 0.0);
        }
        loop {
            let weight: f64 = samples.iter().map(|(_, s)| 1.0 / (s * s)).sum();
            let distance = samples.iter().map(|(d, s)| d / (s * s)).sum::<f64>() / weight;
            let deviation = 1.0 / weight.sqrt();

            let inliers: Vec<(f64, f64)> = samples
                .iter()
                .copied()
                .filter(|(d, s)| (d - distance).abs() <= 3.0 * s)
                .collect();

            if inliers.len() == samples.len() || inliers.is_empty() {
                return (distance, deviation);
            }
            samples = inliers;
        }
    }
}
