//! End-to-end registration of overlapping point clouds.
//!
//! [`RegistrationPipeline`] runs three stages on a cloud pair:
//!
//! 1. overlap-weighted sampling of each cloud to `max_points`,
//! 2. multi-scale correspondence voting (optional),
//! 3. RANSAC rigid alignment with refinement on the inliers.
//!
//! Features come from a [`FeatureProvider`]. Sessions with "up" and "down"
//! scans are registered onto their "center" scan with
//! [`RegistrationPipeline::register_session`], producing a
//! [`CalibrationRecord`].
//!
//! # Example
//!
//! ```no_run
//! use scanreg_pipeline::{CloudPair, RegistrationConfig, RegistrationPipeline};
//! use scanreg_core::{FeatureSet, PointCloud};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let pair = CloudPair::default();
//! let model = |cloud: &PointCloud| -> anyhow::Result<FeatureSet> {
//!     // run the feature network here
//! #   unimplemented!()
//! };
//! let pipeline = RegistrationPipeline::new(RegistrationConfig::default())?;
//! let report = pipeline.register(&pair, &model)?;
//! println!("{:?}", report.transform.to_row_major());
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod pipeline;
mod provider;
mod record;
mod report;

pub use config::{RansacConfig, RegistrationConfig, VoteConfig};
pub use error::PipelineError;
pub use pipeline::{CloudPair, RegistrationPipeline};
pub use provider::{FeatureProvider, FeaturedCloud, PrecomputedFeatures};
pub use record::{CalibrationRecord, FeaturedSession, ScanSession, ScanSource};
pub use report::RegistrationReport;
