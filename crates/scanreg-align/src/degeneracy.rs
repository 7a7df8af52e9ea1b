//! Cheap geometric checks for minimal samples.

use scanreg_core::{Pt3, Real};

/// Edges shorter than this count as coincident points.
pub const MIN_EDGE_LENGTH: Real = 1e-9;

/// Triangles whose area is below this fraction of the squared longest edge
/// count as collinear.
pub const COLLINEARITY_TOLERANCE: Real = 1e-6;

/// `true` when `a`, `b`, `c` cannot pin down a rotation: two of them
/// coincide or all three lie on one line.
pub fn is_degenerate_triangle(a: &Pt3, b: &Pt3, c: &Pt3) -> bool {
    let ab = b - a;
    let ac = c - a;
    let bc = c - b;
    let longest_sq = ab.norm_squared().max(ac.norm_squared()).max(bc.norm_squared());
    let shortest_sq = ab.norm_squared().min(ac.norm_squared()).min(bc.norm_squared());
    if shortest_sq <= MIN_EDGE_LENGTH * MIN_EDGE_LENGTH {
        return true;
    }
    ab.cross(&ac).norm() <= COLLINEARITY_TOLERANCE * longest_sq
}

/// Pairwise edge lengths of two point sets agree within `ratio`.
///
/// For every pair `(i, j)` both `|sᵢ - sⱼ| >= ratio · |tᵢ - tⱼ|` and
/// `|tᵢ - tⱼ| >= ratio · |sᵢ - sⱼ|` must hold. A ratio of `0` accepts
/// everything.
pub fn edge_lengths_consistent(source: &[Pt3], target: &[Pt3], ratio: Real) -> bool {
    if ratio <= 0.0 {
        return true;
    }
    let n = source.len().min(target.len());
    for i in 0..n {
        for j in i + 1..n {
            let ds = (source[i] - source[j]).norm();
            let dt = (target[i] - target[j]).norm();
            if ds < ratio * dt || dt < ratio * ds {
                return false;
            }
        }
    }
    true
}
