//! Overlap-weighted point subsampling.

use log::{debug, warn};
use rand::{rngs::StdRng, seq::index, SeedableRng};
use scanreg_core::{Pt3, Real, RegistrationError, Result};

/// Reduces a point set to a fixed budget, favouring likely-overlapping
/// points.
///
/// Sampling is without replacement, with probability proportional to the
/// overlap score. Returned indices are sorted so the subset keeps the cloud
/// order. The same seed always yields the same subset.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointSampler {
    seed: u64,
}

impl PointSampler {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Pick at most `budget` distinct indices into `points`.
    ///
    /// - `points.len() <= budget`: every index, in order.
    /// - all scores zero: uniform sampling.
    /// - fewer non-zero scores than `budget`: every non-zero point, the rest
    ///   drawn uniformly from the zero-score points.
    pub fn sample(&self, points: &[Pt3], overlap_scores: &[Real], budget: usize) -> Result<Vec<usize>> {
        let n = points.len();
        if overlap_scores.len() != n {
            return Err(RegistrationError::LengthMismatch {
                what: "overlap scores",
                expected: n,
                found: overlap_scores.len(),
            });
        }
        if let Some((i, s)) = overlap_scores
            .iter()
            .enumerate()
            .find(|(_, s)| !s.is_finite() || **s < 0.0)
        {
            return Err(RegistrationError::InvalidScores(format!(
                "score {s} at index {i} is negative or not finite"
            )));
        }
        if n <= budget {
            return Ok((0..n).collect());
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let (weighted, zero): (Vec<usize>, Vec<usize>) =
            (0..n).partition(|&i| overlap_scores[i] > 0.0);

        let mut picked = if weighted.is_empty() {
            warn!("all {n} overlap scores are zero; sampling {budget} points uniformly");
            index::sample(&mut rng, n, budget).into_vec()
        } else if weighted.len() <= budget {
            let fill = budget - weighted.len();
            debug!(
                "{} points with non-zero overlap; filling {fill} uniformly",
                weighted.len()
            );
            let mut picked = weighted;
            picked.extend(
                index::sample(&mut rng, zero.len(), fill)
                    .into_iter()
                    .map(|k| zero[k]),
            );
            picked
        } else {
            index::sample_weighted(&mut rng, weighted.len(), |k| overlap_scores[weighted[k]], budget)
                .map_err(|e| RegistrationError::InvalidScores(e.to_string()))?
                .into_iter()
                .map(|k| weighted[k])
                .collect()
        };
        picked.sort_unstable();
        debug!("sampled {} of {n} points", picked.len());
        Ok(picked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanreg_core::synthetic::random_points;

    fn is_strictly_sorted(v: &[usize]) -> bool {
        v.windows(2).all(|w| w[0] < w[1])
    }

    #[test]
    fn small_clouds_are_returned_whole() {
        let pts = random_points(10, 1.0, 1);
        let scores = vec![0.5; 10];
        let idx = PointSampler::new(3).sample(&pts, &scores, 10).unwrap();
        assert_eq!(idx, (0..10).collect::<Vec<_>>());
        let idx = PointSampler::new(3).sample(&pts, &scores, 50).unwrap();
        assert_eq!(idx.len(), 10);
    }

    #[test]
    fn weighted_draw_is_unique_sorted_and_exact() {
        let pts = random_points(500, 1.0, 2);
        let scores: Vec<Real> = (0..500).map(|i| (i % 7) as Real / 7.0 + 0.01).collect();
        let idx = PointSampler::new(11).sample(&pts, &scores, 120).unwrap();
        assert_eq!(idx.len(), 120);
        assert!(is_strictly_sorted(&idx));
        assert!(idx.iter().all(|&i| i < 500));
    }

    #[test]
    fn same_seed_same_subset() {
        let pts = random_points(400, 1.0, 3);
        let scores: Vec<Real> = (0..400).map(|i| ((i * 37) % 100) as Real / 100.0).collect();
        let a = PointSampler::new(5).sample(&pts, &scores, 50).unwrap();
        let b = PointSampler::new(5).sample(&pts, &scores, 50).unwrap();
        let c = PointSampler::new(6).sample(&pts, &scores, 50).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn zero_scores_fall_back_to_uniform() {
        let pts = random_points(300, 1.0, 4);
        let scores = vec![0.0; 300];
        let idx = PointSampler::new(9).sample(&pts, &scores, 40).unwrap();
        assert_eq!(idx.len(), 40);
        assert!(is_strictly_sorted(&idx));
    }

    #[test]
    fn sparse_scores_take_every_weighted_point_first() {
        let pts = random_points(200, 1.0, 5);
        let mut scores = vec![0.0; 200];
        let hot = [3, 50, 51, 120, 199];
        for &i in &hot {
            scores[i] = 0.7;
        }
        let idx = PointSampler::new(1).sample(&pts, &scores, 20).unwrap();
        assert_eq!(idx.len(), 20);
        assert!(is_strictly_sorted(&idx));
        for i in hot {
            assert!(idx.contains(&i), "weighted point {i} missing");
        }
    }

    #[test]
    fn heavily_weighted_points_dominate() {
        let pts = random_points(1000, 1.0, 6);
        // first half almost never chosen
        let scores: Vec<Real> = (0..1000).map(|i| if i < 500 { 1e-6 } else { 1.0 }).collect();
        let idx = PointSampler::new(2).sample(&pts, &scores, 100).unwrap();
        let low = idx.iter().filter(|&&i| i < 500).count();
        assert!(low <= 2, "{low} low-score points selected");
    }

    #[test]
    fn rejects_bad_scores() {
        let pts = random_points(4, 1.0, 7);
        let sampler = PointSampler::default();
        assert!(matches!(
            sampler.sample(&pts, &[0.1, -0.2, 0.3, 0.4], 2),
            Err(RegistrationError::InvalidScores(_))
        ));
        assert!(matches!(
            sampler.sample(&pts, &[0.1, Real::NAN, 0.3, 0.4], 2),
            Err(RegistrationError::InvalidScores(_))
        ));
        assert_eq!(
            sampler.sample(&pts, &[0.1, 0.2], 2),
            Err(RegistrationError::LengthMismatch {
                what: "overlap scores",
                expected: 4,
                found: 2,
            })
        );
    }
}
