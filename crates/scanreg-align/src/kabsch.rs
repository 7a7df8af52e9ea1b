//! Closed-form rigid fitting (weighted Kabsch).
//!
//! Finds `R`, `t` minimising `Σ wᵢ |R pᵢ + t - qᵢ|²` for paired points.

use scanreg_core::{Mat3, Pt3, Real, RigidTransform, Vec3};
use thiserror::Error;

/// Errors from [`fit_rigid`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KabschError {
    #[error("need at least 3 point pairs, got {0}")]
    NotEnoughPoints(usize),
    #[error("point sets differ in length: {source_len} source vs {target_len} target")]
    LengthMismatch {
        source_len: usize,
        target_len: usize,
    },
    #[error("weights must be finite, non-negative and not all zero")]
    InvalidWeights,
    #[error("svd failed in rigid fit")]
    SvdFailed,
}

/// Best rigid transform taking `source[i]` onto `target[i]`.
///
/// `weights`, when given, must have one non-negative entry per pair.
pub fn fit_rigid(
    source: &[Pt3],
    target: &[Pt3],
    weights: Option<&[Real]>,
) -> Result<RigidTransform, KabschError> {
    if source.len() != target.len() {
        return Err(KabschError::LengthMismatch {
            source_len: source.len(),
            target_len: target.len(),
        });
    }
    if source.len() < 3 {
        return Err(KabschError::NotEnoughPoints(source.len()));
    }
    if let Some(w) = weights {
        if w.len() != source.len() || w.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(KabschError::InvalidWeights);
        }
    }
    let weight = |i: usize| weights.map_or(1.0, |w| w[i]);

    let total: Real = (0..source.len()).map(weight).sum();
    if total <= Real::EPSILON {
        return Err(KabschError::InvalidWeights);
    }

    let mut c_s = Vec3::zeros();
    let mut c_t = Vec3::zeros();
    for (i, (ps, pt)) in source.iter().zip(target).enumerate() {
        let w = weight(i);
        c_s += ps.coords * w;
        c_t += pt.coords * w;
    }
    c_s /= total;
    c_t /= total;

    let mut h = Mat3::zeros();
    for (i, (ps, pt)) in source.iter().zip(target).enumerate() {
        h += (pt.coords - c_t) * (ps.coords - c_s).transpose() * weight(i);
    }

    let (r, _) = rotation_from_covariance(&h)?;
    let t = c_t - r * c_s;
    RigidTransform::from_approx_rotation(&r, t).map_err(|_| KabschError::SvdFailed)
}

/// Rotation maximising `tr(Rᵀ H)` for the cross-covariance `H = Σ q pᵀ`.
///
/// The second value reports whether `U Vᵀ` was a reflection and the last
/// singular vector had to be flipped.
pub(crate) fn rotation_from_covariance(h: &Mat3) -> Result<(Mat3, bool), KabschError> {
    let svd = h.svd(true, true);
    let u = svd.u.ok_or(KabschError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(KabschError::SvdFailed)?;
    let r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_fix = u;
        u_fix.column_mut(2).neg_mut();
        return Ok((u_fix * v_t, true));
    }
    Ok((r, false))
}
