//! High-level entry crate for `scanreg`: rigid registration of partially
//! overlapping 3D point clouds from precomputed per-point features.
//!
//! ## Pipeline API
//!
//! One call samples both clouds by overlap score, keeps correspondences that
//! agree across feature scales and fits a rigid transform robustly:
//!
//! ```no_run
//! use scanreg::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pair: CloudPair = serde_json::from_str(&std::fs::read_to_string("pair.json")?)?;
//! let provider = |cloud: &PointCloud| -> anyhow::Result<FeatureSet> {
//!     /* run a feature model on the cloud */
//! #   unimplemented!()
//! };
//!
//! let pipeline = RegistrationPipeline::new(RegistrationConfig::default())?;
//! let report = pipeline.register(&pair, &provider)?;
//! println!("fitness {:.3}, {:?}", report.fitness, report.transform.to_row_major());
//! # Ok(())
//! # }
//! ```
//!
//! ## Building Blocks
//!
//! The stages are usable on their own:
//!
//! ```
//! use scanreg::align::fit_rigid;
//! use scanreg::core::{Mat3, Pt3, RigidTransform, Vec3};
//!
//! let source = vec![
//!     Pt3::new(0.0, 0.0, 0.0),
//!     Pt3::new(1.0, 0.0, 0.0),
//!     Pt3::new(0.0, 1.0, 0.0),
//!     Pt3::new(0.0, 0.0, 1.0),
//! ];
//! let shift = RigidTransform::new(Mat3::identity(), Vec3::new(0.5, 0.0, 0.0))?;
//! let target = shift.transform_points(&source);
//!
//! let fitted = fit_rigid(&source, &target, None)?;
//! assert!(fitted.translation_distance_to(&shift) < 1e-12);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Module Organization
//!
//! - **[`core`]**: geometry types, errors, the generic RANSAC engine
//! - **[`matching`]**: feature index, matcher, sampler, consistency voter
//! - **[`align`]**: Kabsch fit and the robust aligner
//! - **[`pipeline`]**: end-to-end registration, sessions, calibration records
//! - **[`prelude`]**: common re-exports

/// Geometry types, error type, RANSAC engine and synthetic scenes.
pub mod core {
    pub use scanreg_core::*;
}

/// Nearest-neighbour matching, overlap-weighted sampling and multi-scale
/// voting.
pub mod matching {
    pub use scanreg_match::*;
}

/// Closed-form and robust rigid alignment.
pub mod align {
    pub use scanreg_align::*;
}

/// End-to-end registration and calibration records.
pub mod pipeline {
    pub use scanreg_pipeline::*;
}

/// Convenient re-exports for common use cases.
///
/// Import with `use scanreg::prelude::*;`.
pub mod prelude {
    pub use crate::core::{
        Correspondence, FeatureMatrix, FeatureScale, FeatureSet, PointCloud, Pt3, Real,
        RegistrationError, RigidTransform, Vec3,
    };

    pub use crate::matching::{ConsistencyVoter, CorrespondenceMatcher, FeatureMetric, PointSampler};

    pub use crate::align::{AlignmentEstimate, RobustAligner};

    pub use crate::pipeline::{
        CalibrationRecord, CloudPair, FeatureProvider, PipelineError, RegistrationConfig,
        RegistrationPipeline, RegistrationReport, ScanSession, ScanSource,
    };
}
