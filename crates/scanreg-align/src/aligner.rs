//! RANSAC rigid alignment over putative correspondences.

use std::time::Duration;

use log::{debug, info};
use scanreg_core::{
    ransac, Correspondence, Estimator, FeatureMatrix, Pt3, RansacOptions, Real, RegistrationError,
    Result, RigidTransform, StopReason,
};
use scanreg_match::CorrespondenceMatcher;
use serde::{Deserialize, Serialize};

use crate::degeneracy::{edge_lengths_consistent, is_degenerate_triangle};
use crate::fit_rigid;

/// Smallest inlier count an accepted transform may have: one more than the
/// minimal sample.
pub const MIN_ACCEPTED_INLIERS: usize = RigidEstimator::MIN_SAMPLES + 1;

/// Knobs for [`RobustAligner`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignerOptions {
    /// Hard upper bound on RANSAC trials.
    pub max_iterations: usize,
    /// Confidence for the adaptive trial bound; `0` disables it.
    pub confidence: Real,
    /// Fewest inliers an accepted transform may have. Never below
    /// [`MIN_ACCEPTED_INLIERS`]: a minimal sample always fits its own three
    /// points.
    pub min_inliers: usize,
    /// Stop once this fraction of correspondences are inliers.
    pub early_stop_inlier_ratio: Option<Real>,
    /// Minimal samples whose source and target edge lengths differ by more
    /// than this ratio are pruned before fitting. `0` disables the check.
    pub edge_length_ratio: Real,
    /// Redraws of a degenerate sample within one trial.
    pub max_resample_attempts: usize,
    /// Trials evaluated in parallel per batch.
    pub batch_size: usize,
    /// Optional wall-clock budget in milliseconds.
    pub time_budget_ms: Option<u64>,
    pub seed: u64,
}

impl Default for AlignerOptions {
    fn default() -> Self {
        Self {
            max_iterations: 50_000,
            confidence: 0.999,
            min_inliers: 10,
            early_stop_inlier_ratio: None,
            edge_length_ratio: 0.9,
            max_resample_attempts: 32,
            batch_size: 256,
            time_budget_ms: None,
            seed: 0,
        }
    }
}

impl AlignerOptions {
    fn ransac_options(&self, inlier_threshold: Real) -> RansacOptions {
        RansacOptions {
            max_iters: self.max_iterations,
            thresh: inlier_threshold,
            min_inliers: self.min_inliers.max(MIN_ACCEPTED_INLIERS),
            confidence: self.confidence,
            early_stop_inlier_ratio: self.early_stop_inlier_ratio,
            seed: self.seed,
            refit_on_inliers: true,
            max_resample_attempts: self.max_resample_attempts,
            batch_size: self.batch_size,
            time_budget: self.time_budget_ms.map(Duration::from_millis),
        }
    }
}

/// Result of a successful robust alignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentEstimate {
    /// Source-to-target transform, refined on all inliers.
    pub transform: RigidTransform,
    /// Indices into `correspondences` of the final inliers, ascending.
    pub inliers: Vec<usize>,
    /// The correspondences RANSAC ran on.
    pub correspondences: Vec<Correspondence>,
    /// Root-mean-square residual of the inliers.
    pub inlier_rmse: Real,
    /// Inlier fraction of `correspondences`.
    pub fitness: Real,
    pub iterations: usize,
    pub stop_reason: StopReason,
}

impl AlignmentEstimate {
    pub fn num_inliers(&self) -> usize {
        self.inliers.len()
    }

    /// Inlier correspondences.
    pub fn inlier_correspondences(&self) -> impl Iterator<Item = &Correspondence> + '_ {
        self.inliers.iter().map(|&k| &self.correspondences[k])
    }

    /// `points` moved into the target frame.
    pub fn aligned_source(&self, points: &[Pt3]) -> Vec<Pt3> {
        self.transform.transform_points(points)
    }
}

#[derive(Debug, Clone)]
struct PairDatum {
    source: Pt3,
    target: Pt3,
    weight: Real,
    edge_length_ratio: Real,
}

struct RigidEstimator;

impl RigidEstimator {
    fn fit_subset(data: &[PairDatum], indices: &[usize], weighted: bool) -> Option<RigidTransform> {
        let source: Vec<Pt3> = indices.iter().map(|&i| data[i].source).collect();
        let target: Vec<Pt3> = indices.iter().map(|&i| data[i].target).collect();
        if weighted {
            let weights: Vec<Real> = indices.iter().map(|&i| data[i].weight).collect();
            if let Ok(t) = fit_rigid(&source, &target, Some(weights.as_slice())) {
                return Some(t);
            }
        }
        fit_rigid(&source, &target, None).ok()
    }
}

impl Estimator for RigidEstimator {
    type Datum = PairDatum;
    type Model = RigidTransform;

    const MIN_SAMPLES: usize = 3;

    fn fit(data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model> {
        Self::fit_subset(data, sample_indices, false)
    }

    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64 {
        (model.transform_point(&datum.source) - datum.target).norm()
    }

    fn is_degenerate(data: &[Self::Datum], sample_indices: &[usize]) -> bool {
        let [a, b, c] = sample_indices else {
            return true;
        };
        let (a, b, c) = (&data[*a], &data[*b], &data[*c]);
        is_degenerate_triangle(&a.source, &b.source, &c.source)
            || is_degenerate_triangle(&a.target, &b.target, &c.target)
    }

    fn accept_sample(data: &[Self::Datum], sample_indices: &[usize]) -> bool {
        let ratio = data[sample_indices[0]].edge_length_ratio;
        let source: Vec<Pt3> = sample_indices.iter().map(|&i| data[i].source).collect();
        let target: Vec<Pt3> = sample_indices.iter().map(|&i| data[i].target).collect();
        edge_lengths_consistent(&source, &target, ratio)
    }

    fn refit(data: &[Self::Datum], inliers: &[usize]) -> Option<Self::Model> {
        Self::fit_subset(data, inliers, true).map(|t| t.orthonormalized())
    }
}

/// Robust rigid alignment: RANSAC over 3-point Kabsch fits, then a weighted
/// refinement on all inliers.
#[derive(Debug, Clone, Default)]
pub struct RobustAligner {
    matcher: CorrespondenceMatcher,
    options: AlignerOptions,
}

impl RobustAligner {
    pub fn new(matcher: CorrespondenceMatcher, options: AlignerOptions) -> Self {
        Self { matcher, options }
    }

    pub fn options(&self) -> &AlignerOptions {
        &self.options
    }

    /// Match `source_features` to `target_features` by nearest neighbour and
    /// align on those correspondences.
    pub fn estimate(
        &self,
        source_points: &[Pt3],
        target_points: &[Pt3],
        source_features: &FeatureMatrix,
        target_features: &FeatureMatrix,
        inlier_threshold: Real,
    ) -> Result<AlignmentEstimate> {
        let correspondences =
            self.match_points(source_points, target_points, source_features, target_features, None)?;
        self.estimate_from_correspondences(
            source_points,
            target_points,
            &correspondences,
            inlier_threshold,
        )
    }

    /// Like [`estimate`](Self::estimate), with one confidence weight per
    /// source point used in the final refinement.
    pub fn estimate_weighted(
        &self,
        source_points: &[Pt3],
        target_points: &[Pt3],
        source_features: &FeatureMatrix,
        target_features: &FeatureMatrix,
        source_weights: &[Real],
        inlier_threshold: Real,
    ) -> Result<AlignmentEstimate> {
        let correspondences = self.match_points(
            source_points,
            target_points,
            source_features,
            target_features,
            Some(source_weights),
        )?;
        self.estimate_from_correspondences(
            source_points,
            target_points,
            &correspondences,
            inlier_threshold,
        )
    }

    /// Align on given correspondences.
    ///
    /// Fails with `InsufficientCorrespondences` below three correspondences
    /// and with `RegistrationFailed` when no candidate reaches
    /// `min_inliers`.
    pub fn estimate_from_correspondences(
        &self,
        source_points: &[Pt3],
        target_points: &[Pt3],
        correspondences: &[Correspondence],
        inlier_threshold: Real,
    ) -> Result<AlignmentEstimate> {
        if !(inlier_threshold.is_finite() && inlier_threshold > 0.0) {
            return Err(RegistrationError::InvalidConfig(format!(
                "inlier threshold must be positive, got {inlier_threshold}"
            )));
        }
        check_indices(source_points, target_points, correspondences)?;
        let required = RigidEstimator::MIN_SAMPLES;
        if correspondences.len() < required {
            return Err(RegistrationError::InsufficientCorrespondences {
                found: correspondences.len(),
                required,
            });
        }

        let data: Vec<PairDatum> = correspondences
            .iter()
            .map(|c| PairDatum {
                source: source_points[c.source()],
                target: target_points[c.target()],
                weight: c.weight(),
                edge_length_ratio: self.options.edge_length_ratio,
            })
            .collect();

        let opts = self.options.ransac_options(inlier_threshold);
        let res = ransac::<RigidEstimator>(&data, &opts);
        debug!(
            "rigid ransac: {} trials, {} degenerate redraws, best at trial {}",
            res.iters, res.degenerate_samples, res.best_iter
        );

        let transform = match res.model {
            Some(model) if res.success => model,
            _ => {
                return Err(RegistrationError::RegistrationFailed {
                    best_inliers: res.best_inlier_count,
                    required: opts.min_inliers,
                    iterations: res.iters,
                })
            }
        };

        let fitness = res.inliers.len() as Real / data.len() as Real;
        info!(
            "aligned {} / {} correspondences (fitness {:.3}, rmse {:.4}, rotation {:.2} deg, translation {:.3})",
            res.inliers.len(),
            data.len(),
            fitness,
            res.inlier_rms,
            scanreg_core::rotation_angle(transform.rotation()).to_degrees(),
            transform.translation().norm()
        );

        Ok(AlignmentEstimate {
            transform,
            inliers: res.inliers,
            correspondences: correspondences.to_vec(),
            inlier_rmse: res.inlier_rms,
            fitness,
            iterations: res.iters,
            stop_reason: res.stop_reason,
        })
    }

    fn match_points(
        &self,
        source_points: &[Pt3],
        target_points: &[Pt3],
        source_features: &FeatureMatrix,
        target_features: &FeatureMatrix,
        source_weights: Option<&[Real]>,
    ) -> Result<Vec<Correspondence>> {
        if source_features.len() != source_points.len() {
            return Err(RegistrationError::LengthMismatch {
                what: "source features",
                expected: source_points.len(),
                found: source_features.len(),
            });
        }
        if target_features.len() != target_points.len() {
            return Err(RegistrationError::LengthMismatch {
                what: "target features",
                expected: target_points.len(),
                found: target_features.len(),
            });
        }
        if let Some(w) = source_weights {
            if w.len() != source_points.len() {
                return Err(RegistrationError::LengthMismatch {
                    what: "source weights",
                    expected: source_points.len(),
                    found: w.len(),
                });
            }
        }

        let matches = self.matcher.match_features(source_features, target_features)?;
        Ok(matches
            .iter()
            .map(|m| match source_weights {
                Some(w) => Correspondence::new(m.source, m.target, w[m.source]),
                None => Correspondence::unweighted(m.source, m.target),
            })
            .collect())
    }
}

fn check_indices(
    source_points: &[Pt3],
    target_points: &[Pt3],
    correspondences: &[Correspondence],
) -> Result<()> {
    if source_points.is_empty() {
        return Err(RegistrationError::EmptyInput {
            what: "source points",
        });
    }
    if target_points.is_empty() {
        return Err(RegistrationError::EmptyInput {
            what: "target points",
        });
    }
    let max_source = correspondences.iter().map(|c| c.source()).max().unwrap_or(0);
    if max_source >= source_points.len() {
        return Err(RegistrationError::LengthMismatch {
            what: "source points addressed by correspondences",
            expected: max_source + 1,
            found: source_points.len(),
        });
    }
    let max_target = correspondences.iter().map(|c| c.target()).max().unwrap_or(0);
    if max_target >= target_points.len() {
        return Err(RegistrationError::LengthMismatch {
            what: "target points addressed by correspondences",
            expected: max_target + 1,
            found: target_points.len(),
        });
    }
    Ok(())
}
