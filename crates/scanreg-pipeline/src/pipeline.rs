//! Sample, vote, align.

use log::{debug, info, warn};
use scanreg_align::{AlignmentEstimate, RobustAligner};
use scanreg_core::{FeatureSet, PointCloud, RegistrationError};
use scanreg_match::{ConsistencyVoter, PointSampler};
use serde::{Deserialize, Serialize};

use crate::{
    CalibrationRecord, FeatureProvider, PipelineError, RegistrationConfig, RegistrationReport,
    ScanSession, ScanSource,
};

/// Two clouds to register: `source` is moved onto `target`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudPair {
    pub source: PointCloud,
    pub target: PointCloud,
}

/// End-to-end registration of a cloud pair.
///
/// The pipeline owns only its configuration; every call allocates its own
/// working state, so one value can serve concurrent calls.
#[derive(Debug, Clone, Default)]
pub struct RegistrationPipeline {
    config: RegistrationConfig,
}

impl RegistrationPipeline {
    /// Create a pipeline after validating `config`.
    pub fn new(config: RegistrationConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Request features for both clouds from `provider`, then register.
    pub fn register<P>(&self, pair: &CloudPair, provider: &P) -> Result<RegistrationReport, PipelineError>
    where
        P: FeatureProvider + ?Sized,
    {
        let source_features = provider
            .features(&pair.source)
            .map_err(|e| PipelineError::provider("source", e))?;
        let target_features = provider
            .features(&pair.target)
            .map_err(|e| PipelineError::provider("target", e))?;
        self.register_with_features(
            &pair.source,
            &source_features,
            &pair.target,
            &target_features,
        )
    }

    /// Register clouds whose features are already known.
    pub fn register_with_features(
        &self,
        source: &PointCloud,
        source_features: &FeatureSet,
        target: &PointCloud,
        target_features: &FeatureSet,
    ) -> Result<RegistrationReport, PipelineError> {
        let cfg = &self.config;
        if source.is_empty() {
            return Err(RegistrationError::EmptyInput {
                what: "source cloud",
            }
            .into());
        }
        if target.is_empty() {
            return Err(RegistrationError::EmptyInput {
                what: "target cloud",
            }
            .into());
        }
        source_features.validate_for(source.len())?;
        target_features.validate_for(target.len())?;

        // ─────────────────────────────────────────────────────────────────
        // Sampling
        // ─────────────────────────────────────────────────────────────────
        let [source_seed, target_seed, _] = cfg.stage_seeds();
        let src_idx = PointSampler::new(source_seed).sample(
            &source.points,
            &source_features.overlap,
            cfg.max_points,
        )?;
        let tgt_idx = PointSampler::new(target_seed).sample(
            &target.points,
            &target_features.overlap,
            cfg.max_points,
        )?;
        let src = source.select(&src_idx);
        let tgt = target.select(&tgt_idx);
        let src_feats = source_features.select(&src_idx);
        let tgt_feats = target_features.select(&tgt_idx);
        debug!(
            "sampled {} / {} source and {} / {} target points",
            src.len(),
            source.len(),
            tgt.len(),
            target.len()
        );

        // ─────────────────────────────────────────────────────────────────
        // Voting and alignment
        // ─────────────────────────────────────────────────────────────────
        let aligner = RobustAligner::new(cfg.matcher(), cfg.aligner_options());
        let threshold = cfg.inlier_threshold();
        let (estimate, num_voted): (AlignmentEstimate, Option<usize>) = if cfg.vote.enabled {
            let voter = ConsistencyVoter::new(cfg.matcher(), cfg.voter_options());
            let voted = voter.vote(
                &src.points,
                &tgt.points,
                &src_feats,
                &tgt_feats,
                cfg.vote_radius(),
            )?;
            debug!(
                "voting kept {} correspondences ({} unanimous)",
                voted.len(),
                voted.num_unanimous()
            );
            let estimate = aligner.estimate_from_correspondences(
                &src.points,
                &tgt.points,
                &voted.correspondences,
                threshold,
            )?;
            (estimate, Some(voted.len()))
        } else {
            let estimate = aligner.estimate(
                &src.points,
                &tgt.points,
                &src_feats.fine,
                &tgt_feats.fine,
                threshold,
            )?;
            (estimate, None)
        };

        let report = RegistrationReport {
            transform: estimate.transform,
            fitness: estimate.fitness,
            inlier_rmse: estimate.inlier_rmse,
            num_inliers: estimate.num_inliers(),
            num_correspondences: estimate.correspondences.len(),
            num_voted,
            sampled_source: src.len(),
            sampled_target: tgt.len(),
            iterations: estimate.iterations,
            stop_reason: estimate.stop_reason,
        };
        info!(
            "registration finished: {} inliers of {} correspondences, rmse {:.4}",
            report.num_inliers, report.num_correspondences, report.inlier_rmse
        );
        Ok(report)
    }

    /// Register every side scan of `session` onto its center scan.
    ///
    /// Center features are requested once. The first failure aborts the
    /// session.
    pub fn register_session<P>(
        &self,
        session: &ScanSession,
        provider: &P,
    ) -> Result<CalibrationRecord, PipelineError>
    where
        P: FeatureProvider + ?Sized,
    {
        let mut record = CalibrationRecord::new(session.scan_id.clone());
        let sides: Vec<(ScanSource, &PointCloud)> = ScanSource::ALL
            .into_iter()
            .filter_map(|s| session.side(s).map(|c| (s, c)))
            .collect();
        if sides.is_empty() {
            warn!("session {} has no side scans to register", session.scan_id);
            return Ok(record);
        }

        let center_features = provider
            .features(&session.center)
            .map_err(|e| PipelineError::provider("center", e))?;
        for (side, cloud) in sides {
            let features = provider
                .features(cloud)
                .map_err(|e| PipelineError::provider(side.name(), e))?;
            let report =
                self.register_with_features(cloud, &features, &session.center, &center_features)?;
            info!(
                "session {}: {} fitness {:.3}",
                session.scan_id,
                side.record_key(),
                report.fitness
            );
            record.insert(side, &report.transform);
        }
        Ok(record)
    }
}
