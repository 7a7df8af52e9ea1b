use std::path::PathBuf;

use scanreg_core::RegistrationError;
use thiserror::Error;

/// Errors returned by [`RegistrationPipeline`](crate::RegistrationPipeline)
/// and the calibration record I/O.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// The feature provider failed for one of the clouds.
    #[error("feature provider failed for the {cloud} cloud")]
    FeatureProvider {
        cloud: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("cannot access calibration record {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed calibration record")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn provider(cloud: impl Into<String>, err: anyhow::Error) -> Self {
        Self::FeatureProvider {
            cloud: cloud.into(),
            source: err.into(),
        }
    }

    /// The underlying registration error, if this is one.
    pub fn registration(&self) -> Option<&RegistrationError> {
        match self {
            Self::Registration(e) => Some(e),
            _ => None,
        }
    }
}
