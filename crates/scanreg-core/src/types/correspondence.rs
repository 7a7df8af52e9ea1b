use serde::{Deserialize, Serialize};

use crate::Real;

/// A putative match between a source point and a target point.
///
/// Indices address the point sequences the correspondence was built from.
/// The confidence weight is clamped into `[0, 1]` at construction and the
/// value is never modified afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    source: usize,
    target: usize,
    weight: Real,
}

impl Correspondence {
    /// Create a correspondence; non-finite weights become `0`.
    pub fn new(source: usize, target: usize, weight: Real) -> Self {
        let weight = if weight.is_finite() {
            weight.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            source,
            target,
            weight,
        }
    }

    /// Correspondence with full confidence.
    pub fn unweighted(source: usize, target: usize) -> Self {
        Self::new(source, target, 1.0)
    }

    pub fn source(&self) -> usize {
        self.source
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn weight(&self) -> Real {
        self.weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_is_clamped() {
        assert_eq!(Correspondence::new(0, 1, 1.7).weight(), 1.0);
        assert_eq!(Correspondence::new(0, 1, -0.2).weight(), 0.0);
        assert_eq!(Correspondence::new(0, 1, Real::NAN).weight(), 0.0);
        assert_eq!(Correspondence::new(3, 5, 0.25).weight(), 0.25);
    }
}
