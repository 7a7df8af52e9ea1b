//! Cross-scale consensus filtering of feature correspondences.
//!
//! The matcher runs once per feature scale; those passes are independent.
//! A single reduction then keeps the fine-scale matches whose coarse and mid
//! counterparts land close to the same target point.

use log::debug;
use rayon::prelude::*;
use scanreg_core::{
    Correspondence, FeatureMatrix, FeatureScale, FeatureSet, Pt3, Real, RegistrationError, Result,
};
use serde::{Deserialize, Serialize};

use crate::{CorrespondenceMatcher, FeatureMatch};

/// Number of feature scales voting on each correspondence.
pub const NUM_SCALES: usize = FeatureScale::ALL.len();

/// Fewest scales a correspondence may be required to agree on; one would
/// accept every fine-scale match unvoted.
pub const MIN_AGREEING_SCALES: usize = 2;

/// Knobs for [`ConsistencyVoter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoterOptions {
    /// Scales (including fine) that must agree, in `2..=3`.
    pub min_agreeing_scales: usize,
    /// Require the reverse fine-scale match to return near the source point.
    pub mutual_filter: bool,
    /// Scale weights by `sqrt(overlap_src * overlap_tgt)`.
    pub overlap_weighting: bool,
    /// Fewer survivors than this is an error.
    pub min_correspondences: usize,
}

impl Default for VoterOptions {
    fn default() -> Self {
        Self {
            min_agreeing_scales: 2,
            mutual_filter: true,
            overlap_weighting: true,
            min_correspondences: 3,
        }
    }
}

/// Correspondences that survived voting, with re-indexed parallel data.
///
/// Entry `k` of every sequence describes `correspondences[k]`; the
/// correspondence indices address the point arrays passed to
/// [`ConsistencyVoter::vote`].
#[derive(Debug, Clone)]
pub struct VotingResult {
    pub correspondences: Vec<Correspondence>,
    pub source_points: Vec<Pt3>,
    pub target_points: Vec<Pt3>,
    /// Fine-scale source features.
    pub source_features: FeatureMatrix,
    /// Fine-scale target features.
    pub target_features: FeatureMatrix,
    /// Number of scales (2..=3) that agreed on each correspondence.
    pub agreement: Vec<u8>,
}

impl VotingResult {
    pub fn len(&self) -> usize {
        self.correspondences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.correspondences.is_empty()
    }

    pub fn weights(&self) -> Vec<Real> {
        self.correspondences.iter().map(|c| c.weight()).collect()
    }

    /// Correspondences on which every scale agreed.
    pub fn num_unanimous(&self) -> usize {
        self.agreement
            .iter()
            .filter(|&&a| a as usize == NUM_SCALES)
            .count()
    }
}

/// Multi-scale feature voting.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyVoter {
    matcher: CorrespondenceMatcher,
    options: VoterOptions,
}

impl ConsistencyVoter {
    pub fn new(matcher: CorrespondenceMatcher, options: VoterOptions) -> Self {
        Self { matcher, options }
    }

    pub fn options(&self) -> &VoterOptions {
        &self.options
    }

    /// Match at every scale and keep the fine-scale matches that enough
    /// scales agree on.
    ///
    /// Two target points agree when they are within `voxel_size` of each
    /// other. Weights are `agreement / 3`, times the geometric mean of the
    /// two overlap scores when overlap weighting is on.
    pub fn vote(
        &self,
        source_points: &[Pt3],
        target_points: &[Pt3],
        source_features: &FeatureSet,
        target_features: &FeatureSet,
        voxel_size: Real,
    ) -> Result<VotingResult> {
        self.check_inputs(
            source_points,
            target_points,
            source_features,
            target_features,
            voxel_size,
        )?;

        // map: one independent pass per scale
        let passes: Vec<Vec<FeatureMatch>> = FeatureScale::ALL
            .iter()
            .map(|&scale| {
                self.matcher
                    .match_features(source_features.scale(scale), target_features.scale(scale))
            })
            .collect::<Result<_>>()?;
        let (coarse, mid, fine) = (&passes[0], &passes[1], &passes[2]);

        let reverse = if self.options.mutual_filter {
            Some(
                self.matcher
                    .match_features(&target_features.fine, &source_features.fine)?,
            )
        } else {
            None
        };

        // reduce: per-source consensus
        let radius_sq = voxel_size * voxel_size;
        let options = &self.options;
        let kept: Vec<(Correspondence, u8)> = fine
            .par_iter()
            .filter_map(|m| {
                let i = m.source;
                let f = m.target;
                let anchor = target_points[f];
                let agreeing = 1 + [coarse[i].target, mid[i].target]
                    .iter()
                    .filter(|&&j| (target_points[j] - anchor).norm_squared() <= radius_sq)
                    .count();
                if agreeing < options.min_agreeing_scales {
                    return None;
                }
                if let Some(reverse) = &reverse {
                    let back = reverse[f].target;
                    if (source_points[back] - source_points[i]).norm_squared() > radius_sq {
                        return None;
                    }
                }
                let mut weight = agreeing as Real / NUM_SCALES as Real;
                if options.overlap_weighting {
                    weight *= (source_features.overlap[i] * target_features.overlap[f]).sqrt();
                }
                Some((Correspondence::new(i, f, weight), agreeing as u8))
            })
            .collect();

        debug!(
            "voting kept {} of {} fine-scale matches (min agreement {}, mutual {})",
            kept.len(),
            fine.len(),
            options.min_agreeing_scales,
            options.mutual_filter
        );

        if kept.len() < options.min_correspondences {
            return Err(RegistrationError::InsufficientCorrespondences {
                found: kept.len(),
                required: options.min_correspondences,
            });
        }

        let (correspondences, agreement): (Vec<_>, Vec<_>) = kept.into_iter().unzip();
        let src_idx: Vec<usize> = correspondences.iter().map(|c| c.source()).collect();
        let tgt_idx: Vec<usize> = correspondences.iter().map(|c| c.target()).collect();
        Ok(VotingResult {
            source_points: src_idx.iter().map(|&i| source_points[i]).collect(),
            target_points: tgt_idx.iter().map(|&j| target_points[j]).collect(),
            source_features: source_features.fine.select(&src_idx),
            target_features: target_features.fine.select(&tgt_idx),
            correspondences,
            agreement,
        })
    }

    fn check_inputs(
        &self,
        source_points: &[Pt3],
        target_points: &[Pt3],
        source_features: &FeatureSet,
        target_features: &FeatureSet,
        voxel_size: Real,
    ) -> Result<()> {
        if !(MIN_AGREEING_SCALES..=NUM_SCALES).contains(&self.options.min_agreeing_scales) {
            return Err(RegistrationError::InvalidConfig(format!(
                "min_agreeing_scales must be in {MIN_AGREEING_SCALES}..={NUM_SCALES}, got {}",
                self.options.min_agreeing_scales
            )));
        }
        if !(voxel_size.is_finite() && voxel_size > 0.0) {
            return Err(RegistrationError::InvalidConfig(format!(
                "voting radius must be positive, got {voxel_size}"
            )));
        }
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
        source_features.validate_for(source_points.len())?;
        target_features.validate_for(target_points.len())?;
        for scale in FeatureScale::ALL {
            let (s, t) = (source_features.scale(scale), target_features.scale(scale));
            if s.dim() != t.dim() {
                return Err(RegistrationError::DimensionMismatch {
                    scale: Some(scale),
                    source_dim: s.dim(),
                    target_dim: t.dim(),
                });
            }
        }
        Ok(())
    }
}
