use scanreg_core::{Real, RigidTransform, StopReason};
use serde::{Deserialize, Serialize};

/// Outcome of one registration with diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationReport {
    /// Source-to-target transform; serialized as a row-major 4×4 array.
    pub transform: RigidTransform,
    /// Inlier fraction of the correspondences RANSAC ran on.
    pub fitness: Real,
    pub inlier_rmse: Real,
    pub num_inliers: usize,
    /// Correspondences handed to RANSAC.
    pub num_correspondences: usize,
    /// Survivors of voting; `None` when voting was disabled.
    pub num_voted: Option<usize>,
    /// Source points kept by the sampler.
    pub sampled_source: usize,
    /// Target points kept by the sampler.
    pub sampled_target: usize,
    pub iterations: usize,
    pub stop_reason: StopReason,
}
