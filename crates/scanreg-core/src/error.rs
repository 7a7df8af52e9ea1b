//! Error taxonomy shared by the registration crates.

use thiserror::Error;

use crate::FeatureScale;

/// Errors surfaced by sampling, matching, voting and alignment.
///
/// None of these are retried internally. Degenerate minimal samples inside
/// the RANSAC loop are handled locally and never reach the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    /// A point cloud or feature matrix has zero points.
    #[error("empty input: {what} has no points")]
    EmptyInput { what: &'static str },

    /// Two parallel sequences disagree in length.
    #[error("length mismatch for {what}: expected {expected}, found {found}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// Source and target features have different dimensions.
    #[error(
        "{}feature dimension mismatch: source {source_dim}, target {target_dim}",
        scale_prefix(.scale)
    )]
    DimensionMismatch {
        scale: Option<FeatureScale>,
        source_dim: usize,
        target_dim: usize,
    },

    /// Overlap scores are negative or not finite.
    #[error("invalid overlap scores: {0}")]
    InvalidScores(String),

    /// A serialized transform is not a rigid motion.
    #[error("invalid rigid transform: {0}")]
    InvalidTransform(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Voting left too few correspondences for alignment.
    #[error("insufficient correspondences after voting: {found} < {required}")]
    InsufficientCorrespondences { found: usize, required: usize },

    /// No candidate transform reached the minimum inlier count.
    #[error(
        "registration failed: best candidate has {best_inliers} inliers, \
         {required} required ({iterations} iterations)"
    )]
    RegistrationFailed {
        best_inliers: usize,
        required: usize,
        iterations: usize,
    },
}

fn scale_prefix(scale: &Option<FeatureScale>) -> String {
    scale.map(|s| format!("{s} ")).unwrap_or_default()
}

/// Convenience alias for results carrying a [`RegistrationError`].
pub type Result<T, E = RegistrationError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_quantity() {
        let err = RegistrationError::InsufficientCorrespondences {
            found: 1,
            required: 3,
        };
        assert_eq!(
            err.to_string(),
            "insufficient correspondences after voting: 1 < 3"
        );

        let err = RegistrationError::DimensionMismatch {
            scale: Some(FeatureScale::Mid),
            source_dim: 32,
            target_dim: 16,
        };
        assert!(err.to_string().starts_with("mid feature dimension mismatch"));

        let err = RegistrationError::DimensionMismatch {
            scale: None,
            source_dim: 4,
            target_dim: 8,
        };
        assert_eq!(
            err.to_string(),
            "feature dimension mismatch: source 4, target 8"
        );
    }
}
