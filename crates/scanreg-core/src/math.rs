//! Linear algebra type aliases and small geometric helpers.

use nalgebra::{Isometry3, Matrix3, Matrix4, Point3, Vector3};

/// Scalar type used throughout the workspace (currently `f64`).
pub type Real = f64;

/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// 4×4 matrix with [`Real`] entries.
pub type Mat4 = Matrix4<Real>;
/// 3D rigid transform (SE(3)) using [`Real`].
pub type Iso3 = Isometry3<Real>;

/// Project an arbitrary 3×3 matrix onto SO(3).
///
/// Returns the closest rotation in the Frobenius sense (`U Vᵀ` from the SVD).
/// When the product is a reflection the last column of `U` is negated so the
/// result always has determinant `+1`. Returns `None` if the SVD fails.
pub fn project_to_so3(m: &Mat3) -> Option<Mat3> {
    let svd = m.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r = u * v_t;

    if r.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r = u_flipped * v_t;
    }
    Some(r)
}

/// Rotation angle (radians) of a rotation matrix.
///
/// Uses `atan2` of the skew-symmetric part against the trace so that angles
/// near zero keep full precision.
pub fn rotation_angle(r: &Mat3) -> Real {
    let sin = Vec3::new(
        r[(2, 1)] - r[(1, 2)],
        r[(0, 2)] - r[(2, 0)],
        r[(1, 0)] - r[(0, 1)],
    )
    .norm()
        * 0.5;
    let cos = (r.trace() - 1.0) * 0.5;
    sin.atan2(cos)
}

/// Centroid of a non-empty point set.
pub fn centroid(points: &[Pt3]) -> Option<Pt3> {
    if points.is_empty() {
        return None;
    }
    let sum = points.iter().fold(Vec3::zeros(), |acc, p| acc + p.coords);
    Some(Pt3::from(sum / points.len() as Real))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Rotation3;

    #[test]
    fn projection_keeps_rotations() {
        let r = *Rotation3::from_euler_angles(0.2, -0.1, 0.7).matrix();
        let p = project_to_so3(&r).unwrap();
        assert!((p - r).norm() < 1e-12);
    }

    #[test]
    fn projection_flips_reflections() {
        let mut m = Mat3::identity();
        m[(2, 2)] = -1.0;
        let p = project_to_so3(&m).unwrap();
        assert!((p.determinant() - 1.0).abs() < 1e-12);
        assert!((p.transpose() * p - Mat3::identity()).norm() < 1e-12);
    }

    #[test]
    fn angle_of_z_rotation() {
        let r = *Rotation3::from_axis_angle(&Vec3::z_axis(), 0.5).matrix();
        assert!((rotation_angle(&r) - 0.5).abs() < 1e-12);
        assert!(rotation_angle(&Mat3::identity()).abs() < 1e-12);
    }

    #[test]
    fn centroid_of_empty_set_is_none() {
        assert!(centroid(&[]).is_none());
        let c = centroid(&[Pt3::new(0.0, 0.0, 0.0), Pt3::new(2.0, 4.0, -2.0)]).unwrap();
        assert_eq!(c, Pt3::new(1.0, 2.0, -1.0));
    }
}
