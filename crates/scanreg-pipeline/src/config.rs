//! Serializable pipeline configuration.

use scanreg_align::AlignerOptions;
use scanreg_core::{Real, RegistrationError};
use scanreg_match::{
    CorrespondenceMatcher, FeatureMetric, VoterOptions, MIN_AGREEING_SCALES, NUM_SCALES,
};
use serde::{Deserialize, Serialize};

/// Configuration for one registration run.
///
/// Every field has a default, so a partial JSON object is a valid config.
/// Unset tolerances resolve to twice the voxel size, independently for
/// voting and for inlier classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Voxel size the clouds were downsampled with (metres).
    pub voxel_size: Real,
    /// Point budget per cloud after overlap-weighted sampling.
    pub max_points: usize,
    /// Seed for sampling and RANSAC.
    pub seed: u64,
    /// Feature-space metric used for matching.
    pub metric: FeatureMetric,
    pub vote: VoteConfig,
    pub ransac: RansacConfig,
}

/// Cross-scale voting settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoteConfig {
    /// When off, alignment runs on fine-scale nearest neighbours directly.
    pub enabled: bool,
    /// Agreement radius; `None` means `2 × voxel_size`.
    pub radius: Option<Real>,
    /// Scales that must agree, `2` or `3`.
    pub min_agreeing_scales: usize,
    pub mutual_filter: bool,
    pub overlap_weighting: bool,
    pub min_correspondences: usize,
}

/// Robust alignment settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    /// Inlier distance; `None` means `2 × voxel_size`.
    pub inlier_threshold: Option<Real>,
    pub max_iterations: usize,
    pub confidence: Real,
    /// Raised to four when lower: three inliers only reproduce the sample.
    pub min_inliers: usize,
    pub early_stop_inlier_ratio: Option<Real>,
    pub edge_length_ratio: Real,
    pub max_resample_attempts: usize,
    pub batch_size: usize,
    pub time_budget_ms: Option<u64>,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            voxel_size: 0.2,
            max_points: 20_000,
            seed: 0,
            metric: FeatureMetric::Euclidean,
            vote: VoteConfig::default(),
            ransac: RansacConfig::default(),
        }
    }
}

impl Default for VoteConfig {
    fn default() -> Self {
        let voter = VoterOptions::default();
        Self {
            enabled: true,
            radius: None,
            min_agreeing_scales: voter.min_agreeing_scales,
            mutual_filter: voter.mutual_filter,
            overlap_weighting: voter.overlap_weighting,
            min_correspondences: voter.min_correspondences,
        }
    }
}

impl Default for RansacConfig {
    fn default() -> Self {
        let aligner = AlignerOptions::default();
        Self {
            inlier_threshold: None,
            max_iterations: aligner.max_iterations,
            confidence: aligner.confidence,
            min_inliers: aligner.min_inliers,
            early_stop_inlier_ratio: aligner.early_stop_inlier_ratio,
            edge_length_ratio: aligner.edge_length_ratio,
            max_resample_attempts: aligner.max_resample_attempts,
            batch_size: aligner.batch_size,
            time_budget_ms: aligner.time_budget_ms,
        }
    }
}

impl RegistrationConfig {
    /// Voting radius after defaulting.
    pub fn vote_radius(&self) -> Real {
        self.vote.radius.unwrap_or(2.0 * self.voxel_size)
    }

    /// Inlier threshold after defaulting.
    pub fn inlier_threshold(&self) -> Real {
        self.ransac.inlier_threshold.unwrap_or(2.0 * self.voxel_size)
    }

    /// Seeds for the source sampler, the target sampler and RANSAC.
    pub(crate) fn stage_seeds(&self) -> [u64; 3] {
        [
            self.seed,
            self.seed.wrapping_add(0x9E37_79B9_7F4A_7C15),
            self.seed.wrapping_add(0x3C6E_F372_FE94_F82A),
        ]
    }

    pub fn matcher(&self) -> CorrespondenceMatcher {
        CorrespondenceMatcher::new(self.metric)
    }

    /// Convert to voter options.
    pub fn voter_options(&self) -> VoterOptions {
        VoterOptions {
            min_agreeing_scales: self.vote.min_agreeing_scales,
            mutual_filter: self.vote.mutual_filter,
            overlap_weighting: self.vote.overlap_weighting,
            min_correspondences: self.vote.min_correspondences,
        }
    }

    /// Convert to aligner options.
    pub fn aligner_options(&self) -> AlignerOptions {
        AlignerOptions {
            max_iterations: self.ransac.max_iterations,
            confidence: self.ransac.confidence,
            min_inliers: self.ransac.min_inliers,
            early_stop_inlier_ratio: self.ransac.early_stop_inlier_ratio,
            edge_length_ratio: self.ransac.edge_length_ratio,
            max_resample_attempts: self.ransac.max_resample_attempts,
            batch_size: self.ransac.batch_size,
            time_budget_ms: self.ransac.time_budget_ms,
            seed: self.stage_seeds()[2],
        }
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        let invalid = |msg: String| Err(RegistrationError::InvalidConfig(msg));

        if !is_positive(self.voxel_size) {
            return invalid(format!("voxel_size must be positive, got {}", self.voxel_size));
        }
        if self.max_points == 0 {
            return invalid("max_points must be positive".to_string());
        }
        if !is_positive(self.vote_radius()) {
            return invalid(format!("vote.radius must be positive, got {}", self.vote_radius()));
        }
        if !(MIN_AGREEING_SCALES..=NUM_SCALES).contains(&self.vote.min_agreeing_scales) {
            return invalid(format!(
                "vote.min_agreeing_scales must be in {MIN_AGREEING_SCALES}..={NUM_SCALES}, got {}",
                self.vote.min_agreeing_scales
            ));
        }
        if !is_positive(self.inlier_threshold()) {
            return invalid(format!(
                "ransac.inlier_threshold must be positive, got {}",
                self.inlier_threshold()
            ));
        }
        if self.ransac.max_iterations == 0 {
            return invalid("ransac.max_iterations must be positive".to_string());
        }
        if !(0.0..1.0).contains(&self.ransac.confidence) {
            return invalid(format!(
                "ransac.confidence must be in [0, 1), got {}",
                self.ransac.confidence
            ));
        }
        if let Some(r) = self.ransac.early_stop_inlier_ratio {
            if !(r > 0.0 && r <= 1.0) {
                return invalid(format!(
                    "ransac.early_stop_inlier_ratio must be in (0, 1], got {r}"
                ));
            }
        }
        if !(0.0..1.0).contains(&self.ransac.edge_length_ratio) {
            return invalid(format!(
                "ransac.edge_length_ratio must be in [0, 1), got {}",
                self.ransac.edge_length_ratio
            ));
        }
        if self.ransac.batch_size == 0 {
            return invalid("ransac.batch_size must be positive".to_string());
        }
        Ok(())
    }
}

fn is_positive(v: Real) -> bool {
    v.is_finite() && v > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerances_default_to_twice_the_voxel() {
        let cfg = RegistrationConfig {
            voxel_size: 0.05,
            ..RegistrationConfig::default()
        };
        assert!((cfg.vote_radius() - 0.1).abs() < 1e-12);
        assert!((cfg.inlier_threshold() - 0.1).abs() < 1e-12);

        let mut cfg = cfg;
        cfg.vote.radius = Some(0.3);
        assert!((cfg.vote_radius() - 0.3).abs() < 1e-12);
        assert!((cfg.inlier_threshold() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: RegistrationConfig = serde_json::from_str(
            r#"{ "voxel_size": 0.1, "metric": "cosine", "vote": { "min_agreeing_scales": 3 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.metric, FeatureMetric::Cosine);
        assert_eq!(cfg.vote.min_agreeing_scales, 3);
        assert!(cfg.vote.enabled);
        assert!(cfg.vote.mutual_filter);
        assert_eq!(cfg.max_points, 20_000);
        assert_eq!(cfg.ransac.max_iterations, 50_000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn json_roundtrip() {
        let mut cfg = RegistrationConfig::default();
        cfg.ransac.time_budget_ms = Some(250);
        cfg.vote.radius = Some(0.4);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: RegistrationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let base = RegistrationConfig::default();
        assert!(base.validate().is_ok());

        let mut cfg = base.clone();
        cfg.voxel_size = 0.0;
        assert!(matches!(cfg.validate(), Err(RegistrationError::InvalidConfig(_))));

        let mut cfg = base.clone();
        cfg.max_points = 0;
        assert!(cfg.validate().is_err());

        for scales in [0, 1, 4] {
            let mut cfg = base.clone();
            cfg.vote.min_agreeing_scales = scales;
            assert!(cfg.validate().is_err(), "{scales} agreeing scales accepted");
        }

        let mut cfg = base.clone();
        cfg.ransac.inlier_threshold = Some(-1.0);
        assert!(cfg.validate().is_err());

        let mut cfg = base.clone();
        cfg.ransac.confidence = 1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = base.clone();
        cfg.ransac.early_stop_inlier_ratio = Some(0.0);
        assert!(cfg.validate().is_err());

        let mut cfg = base;
        cfg.ransac.edge_length_ratio = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn conversions_carry_settings() {
        let mut cfg = RegistrationConfig::default();
        cfg.vote.mutual_filter = false;
        cfg.ransac.min_inliers = 42;
        cfg.ransac.time_budget_ms = Some(10);
        assert!(!cfg.voter_options().mutual_filter);
        let opts = cfg.aligner_options();
        assert_eq!(opts.min_inliers, 42);
        assert_eq!(opts.time_budget_ms, Some(10));
        assert_ne!(opts.seed, cfg.seed);
    }
}
