use serde::{Deserialize, Serialize};

use crate::Pt3;

/// An ordered set of 3D points in metric coordinates.
///
/// Point order is stable: index `i` addresses row `i` of every
/// [`FeatureMatrix`](crate::FeatureMatrix) computed for this cloud.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloud {
    pub points: Vec<Pt3>,
}

impl PointCloud {
    pub fn new(points: Vec<Pt3>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Copy the points at `indices`, in the given order.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of range.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            points: indices.iter().map(|&i| self.points[i]).collect(),
        }
    }
}

impl From<Vec<Pt3>> for PointCloud {
    fn from(points: Vec<Pt3>) -> Self {
        Self::new(points)
    }
}

impl FromIterator<Pt3> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Pt3>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
