//! Rigid alignment of corresponding point sets.
//!
//! [`fit_rigid`] is the closed-form weighted Kabsch solver. [`RobustAligner`]
//! wraps it in the generic RANSAC engine from `scanreg-core`, pruning
//! degenerate and edge-inconsistent minimal samples, and refines the best
//! candidate on all of its inliers.
//!
//! # Example
//!
//! ```
//! use nalgebra::Rotation3;
//! use scanreg_align::RobustAligner;
//! use scanreg_core::synthetic::correspondences_with_outliers;
//! use scanreg_core::{RigidTransform, Vec3};
//!
//! let gt = RigidTransform::from_rotation(
//!     &Rotation3::from_axis_angle(&Vec3::z_axis(), 0.5),
//!     Vec3::new(1.0, 2.0, 0.0),
//! );
//! let fx = correspondences_with_outliers(40, 20, 3.0, 0.0, &gt, 1);
//! let est = RobustAligner::default()
//!     .estimate_from_correspondences(&fx.source, &fx.target, &fx.correspondences, 0.05)
//!     .unwrap();
//! assert!(est.transform.rotation_angle_to(&gt) < 1e-9);
//! ```

mod aligner;
pub mod degeneracy;
mod kabsch;

pub use aligner::{AlignerOptions, AlignmentEstimate, RobustAligner, MIN_ACCEPTED_INLIERS};
pub use kabsch::{fit_rigid, KabschError};
