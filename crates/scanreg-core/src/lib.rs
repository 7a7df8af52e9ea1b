//! Core math and data types for `scanreg`.
//!
//! This crate provides the building blocks shared by every registration
//! stage:
//!
//! - linear algebra type aliases (`Real`, `Pt3`, `Mat3`, and friends),
//! - the data model: [`PointCloud`], [`FeatureMatrix`], [`FeatureSet`],
//!   [`Correspondence`] and [`RigidTransform`],
//! - the [`RegistrationError`] taxonomy,
//! - a deterministic, parallel, model-agnostic RANSAC engine.
//!
//! # Example
//!
//! ```
//! use scanreg_core::{Pt3, RigidTransform, Vec3};
//! use nalgebra::Rotation3;
//!
//! let rot = Rotation3::from_axis_angle(&Vec3::z_axis(), std::f64::consts::FRAC_PI_2);
//! let t = RigidTransform::from_rotation(&rot, Vec3::new(1.0, 0.0, 0.0));
//! let p = t.transform_point(&Pt3::new(1.0, 0.0, 0.0));
//! assert!((p - Pt3::new(1.0, 1.0, 0.0)).norm() < 1e-12);
//! assert_eq!(t.to_row_major().len(), 16);
//! ```

mod error;
/// Linear algebra type aliases and helpers.
pub mod math;
/// Generic RANSAC engine and traits.
pub mod ransac;
/// Deterministic synthetic scenes for tests and benchmarks.
pub mod synthetic;
mod types;

pub use error::*;
pub use math::*;
pub use ransac::*;
pub use types::*;
