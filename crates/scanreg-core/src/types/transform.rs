use nalgebra::{Rotation3, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

use crate::math::{project_to_so3, rotation_angle};
use crate::{Iso3, Mat3, Mat4, Pt3, Real, RegistrationError, Result, Vec3};

/// Maximum deviation from orthonormality accepted for input rotations.
pub const ORTHONORMAL_TOLERANCE: Real = 1e-6;

/// Rigid motion `p ↦ R p + t` with `R ∈ SO(3)`.
///
/// The rotation is kept orthonormal with determinant `+1`: every constructor
/// projects onto SO(3) after validation. Serializes as the flat, row-major
/// 16-element homogeneous matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[Real; 16]", try_from = "[Real; 16]")]
pub struct RigidTransform {
    rotation: Mat3,
    translation: Vec3,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self {
            rotation: Mat3::identity(),
            translation: Vec3::zeros(),
        }
    }

    /// Build from a rotation that must already be orthonormal (det `+1`)
    /// within [`ORTHONORMAL_TOLERANCE`].
    pub fn new(rotation: Mat3, translation: Vec3) -> Result<Self> {
        if !rotation.iter().chain(translation.iter()).all(|v| v.is_finite()) {
            return Err(RegistrationError::InvalidTransform(
                "non-finite entries".to_string(),
            ));
        }
        let deviation = (rotation.transpose() * rotation - Mat3::identity()).norm();
        if deviation > ORTHONORMAL_TOLERANCE {
            return Err(RegistrationError::InvalidTransform(format!(
                "rotation is not orthonormal (deviation {deviation:.3e})"
            )));
        }
        if rotation.determinant() <= 0.0 {
            return Err(RegistrationError::InvalidTransform(
                "rotation is a reflection".to_string(),
            ));
        }
        Self::from_approx_rotation(&rotation, translation)
    }

    /// Build from an estimated 3×3 matrix, projecting it onto SO(3).
    pub fn from_approx_rotation(m: &Mat3, translation: Vec3) -> Result<Self> {
        let rotation = project_to_so3(m).ok_or_else(|| {
            RegistrationError::InvalidTransform("svd failed while orthonormalizing".to_string())
        })?;
        Ok(Self {
            rotation,
            translation,
        })
    }

    pub fn from_rotation(rotation: &Rotation3<Real>, translation: Vec3) -> Self {
        Self {
            rotation: *rotation.matrix(),
            translation,
        }
    }

    pub fn from_isometry(iso: &Iso3) -> Self {
        Self::from_rotation(&iso.rotation.to_rotation_matrix(), iso.translation.vector)
    }

    /// Parse a homogeneous 4×4 matrix with bottom row `[0, 0, 0, 1]`.
    pub fn from_matrix(m: &Mat4) -> Result<Self> {
        let bottom = m.fixed_view::<1, 4>(3, 0);
        let expected = [0.0, 0.0, 0.0, 1.0];
        if bottom
            .iter()
            .zip(expected.iter())
            .any(|(a, b)| (a - b).abs() > ORTHONORMAL_TOLERANCE)
        {
            return Err(RegistrationError::InvalidTransform(format!(
                "bottom row must be [0, 0, 0, 1], got [{}, {}, {}, {}]",
                m[(3, 0)],
                m[(3, 1)],
                m[(3, 2)],
                m[(3, 3)]
            )));
        }
        let rotation: Mat3 = m.fixed_view::<3, 3>(0, 0).into_owned();
        let translation: Vec3 = m.fixed_view::<3, 1>(0, 3).into_owned();
        Self::new(rotation, translation)
    }

    pub fn from_row_major(values: &[Real; 16]) -> Result<Self> {
        Self::from_matrix(&Mat4::from_row_slice(values))
    }

    pub fn rotation(&self) -> &Mat3 {
        &self.rotation
    }

    pub fn translation(&self) -> &Vec3 {
        &self.translation
    }

    pub fn to_matrix(&self) -> Mat4 {
        let mut m = Mat4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rotation);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }

    /// Flat row-major homogeneous matrix, the persisted form.
    pub fn to_row_major(&self) -> [Real; 16] {
        let m = self.to_matrix();
        let mut out = [0.0; 16];
        for r in 0..4 {
            for c in 0..4 {
                out[4 * r + c] = m[(r, c)];
            }
        }
        out
    }

    pub fn to_isometry(&self) -> Iso3 {
        let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(
            self.rotation,
        ));
        Iso3::from_parts(Translation3::from(self.translation), rot)
    }

    pub fn transform_point(&self, p: &Pt3) -> Pt3 {
        Pt3::from(self.rotation * p.coords + self.translation)
    }

    pub fn transform_points(&self, points: &[Pt3]) -> Vec<Pt3> {
        points.iter().map(|p| self.transform_point(p)).collect()
    }

    /// `self ∘ other`: applies `other` first.
    pub fn compose(&self, other: &RigidTransform) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
        .orthonormalized()
    }

    pub fn inverse(&self) -> Self {
        let rt = self.rotation.transpose();
        Self {
            rotation: rt,
            translation: -(rt * self.translation),
        }
    }

    /// Re-project the rotation onto SO(3) to remove accumulated drift.
    pub fn orthonormalized(&self) -> Self {
        match project_to_so3(&self.rotation) {
            Some(rotation) => Self {
                rotation,
                translation: self.translation,
            },
            None => *self,
        }
    }

    /// Angle (radians) of the relative rotation between two transforms.
    pub fn rotation_angle_to(&self, other: &RigidTransform) -> Real {
        rotation_angle(&(self.rotation.transpose() * other.rotation))
    }

    /// Euclidean distance between the translation parts.
    pub fn translation_distance_to(&self, other: &RigidTransform) -> Real {
        (self.translation - other.translation).norm()
    }
}

impl From<RigidTransform> for [Real; 16] {
    fn from(t: RigidTransform) -> Self {
        t.to_row_major()
    }
}

impl TryFrom<[Real; 16]> for RigidTransform {
    type Error = RegistrationError;

    fn try_from(values: [Real; 16]) -> Result<Self> {
        Self::from_row_major(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_6;

    fn sample_transform() -> RigidTransform {
        let rot = Rotation3::from_axis_angle(&Vec3::z_axis(), FRAC_PI_6);
        RigidTransform::from_rotation(&rot, Vec3::new(1.0, 0.0, 0.0))
    }

    #[test]
    fn row_major_layout() {
        let t = sample_transform();
        let flat = t.to_row_major();
        assert!((flat[3] - 1.0).abs() < 1e-12);
        assert!((flat[0] - FRAC_PI_6.cos()).abs() < 1e-12);
        assert!((flat[1] + FRAC_PI_6.sin()).abs() < 1e-12);
        assert_eq!(&flat[12..], &[0.0, 0.0, 0.0, 1.0]);

        let back = RigidTransform::from_row_major(&flat).unwrap();
        assert!(back.rotation_angle_to(&t) < 1e-12);
        assert!(back.translation_distance_to(&t) < 1e-12);
    }

    #[test]
    fn inverse_and_compose_cancel() {
        let t = sample_transform();
        let id = t.compose(&t.inverse());
        assert!(id.rotation_angle_to(&RigidTransform::identity()) < 1e-12);
        assert!(id.translation().norm() < 1e-12);

        let p = Pt3::new(0.3, -1.2, 2.0);
        let q = t.inverse().transform_point(&t.transform_point(&p));
        assert!((q - p).norm() < 1e-12);
    }

    #[test]
    fn isometry_round_trip() {
        let t = sample_transform();
        let iso = t.to_isometry();
        let p = Pt3::new(1.0, 2.0, 3.0);
        assert!((iso.transform_point(&p) - t.transform_point(&p)).norm() < 1e-12);
        let back = RigidTransform::from_isometry(&iso);
        assert!(back.rotation_angle_to(&t) < 1e-9);
    }

    #[test]
    fn rejects_non_rigid_matrices() {
        let mut flat = RigidTransform::identity().to_row_major();
        flat[0] = 2.0;
        assert!(matches!(
            RigidTransform::from_row_major(&flat),
            Err(RegistrationError::InvalidTransform(_))
        ));

        let mut flat = RigidTransform::identity().to_row_major();
        flat[15] = 0.5;
        assert!(RigidTransform::from_row_major(&flat).is_err());

        let mut reflection = Mat3::identity();
        reflection[(2, 2)] = -1.0;
        assert!(RigidTransform::new(reflection, Vec3::zeros()).is_err());
    }

    #[test]
    fn approx_rotation_is_projected() {
        let mut m = *sample_transform().rotation();
        m[(0, 1)] += 1e-3;
        let t = RigidTransform::from_approx_rotation(&m, Vec3::zeros()).unwrap();
        let r = t.rotation();
        assert!((r.transpose() * r - Mat3::identity()).norm() < 1e-12);
        assert!((r.determinant() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn serializes_as_flat_array() {
        let t = sample_transform();
        let json = serde_json::to_string(&t).unwrap();
        let values: Vec<Real> = serde_json::from_str(&json).unwrap();
        assert_eq!(values.len(), 16);
        let back: RigidTransform = serde_json::from_str(&json).unwrap();
        assert!(back.rotation_angle_to(&t) < 1e-12);
        assert!(serde_json::from_str::<RigidTransform>("[1.0, 0.0]").is_err());
    }
}
