use std::fmt;
use std::slice::ChunksExact;

use serde::{Deserialize, Serialize};

use crate::{Real, RegistrationError, Result};

/// One of the three embedding resolutions emitted by the feature model.
///
/// Coarser scales encode larger spatial context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureScale {
    Coarse,
    Mid,
    Fine,
}

impl FeatureScale {
    /// All scales, coarse first.
    pub const ALL: [FeatureScale; 3] = [FeatureScale::Coarse, FeatureScale::Mid, FeatureScale::Fine];

    pub fn name(self) -> &'static str {
        match self {
            FeatureScale::Coarse => "coarse",
            FeatureScale::Mid => "mid",
            FeatureScale::Fine => "fine",
        }
    }
}

impl fmt::Display for FeatureScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Dense row-major `rows × dim` matrix of per-point feature vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFeatureMatrix")]
pub struct FeatureMatrix {
    dim: usize,
    data: Vec<Real>,
}

#[derive(Deserialize)]
struct RawFeatureMatrix {
    dim: usize,
    data: Vec<Real>,
}

impl TryFrom<RawFeatureMatrix> for FeatureMatrix {
    type Error = RegistrationError;

    fn try_from(raw: RawFeatureMatrix) -> Result<Self> {
        FeatureMatrix::new(raw.dim, raw.data)
    }
}

impl FeatureMatrix {
    /// Wrap a flat row-major buffer.
    ///
    /// Fails when `data.len()` is not a multiple of `dim`, or when `dim == 0`
    /// for a non-empty buffer.
    pub fn new(dim: usize, data: Vec<Real>) -> Result<Self> {
        if dim == 0 {
            if !data.is_empty() {
                return Err(RegistrationError::LengthMismatch {
                    what: "feature matrix with zero dimension",
                    expected: 0,
                    found: data.len(),
                });
            }
        } else if data.len() % dim != 0 {
            return Err(RegistrationError::LengthMismatch {
                what: "feature matrix buffer",
                expected: (data.len() / dim + 1) * dim,
                found: data.len(),
            });
        }
        Ok(Self { dim, data })
    }

    /// Build from per-point rows; all rows must share one length.
    pub fn from_rows<R: AsRef<[Real]>>(rows: &[R]) -> Result<Self> {
        let dim = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * dim);
        for row in rows {
            let row = row.as_ref();
            if row.len() != dim {
                return Err(RegistrationError::LengthMismatch {
                    what: "feature row",
                    expected: dim,
                    found: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Self::new(dim, data)
    }

    /// Matrix with no rows.
    pub fn empty(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of rows (points).
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn row(&self, i: usize) -> &[Real] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    pub fn rows(&self) -> ChunksExact<'_, Real> {
        // chunks_exact panics on 0; an empty matrix yields no rows either way
        self.data.chunks_exact(self.dim.max(1))
    }

    pub fn as_slice(&self) -> &[Real] {
        &self.data
    }

    /// Copy the rows at `indices`, in the given order.
    pub fn select(&self, indices: &[usize]) -> Self {
        let mut data = Vec::with_capacity(indices.len() * self.dim);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Self {
            dim: self.dim,
            data,
        }
    }

    /// Copy with every row scaled to unit L2 norm; zero rows stay zero.
    pub fn normalized(&self) -> Self {
        let mut data = self.data.clone();
        for row in data.chunks_exact_mut(self.dim.max(1)) {
            let norm = row.iter().map(|v| v * v).sum::<Real>().sqrt();
            if norm > Real::EPSILON {
                row.iter_mut().for_each(|v| *v /= norm);
            }
        }
        Self {
            dim: self.dim,
            data,
        }
    }

    fn all_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

/// Per-point output of the external feature model for one cloud.
///
/// All four members share the index space of the owning
/// [`PointCloud`](crate::PointCloud).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub coarse: FeatureMatrix,
    pub mid: FeatureMatrix,
    pub fine: FeatureMatrix,
    /// Overlap confidence in `[0, 1]`.
    pub overlap: Vec<Real>,
}

impl FeatureSet {
    /// Assemble a feature set, checking that all members have equal length.
    pub fn new(
        coarse: FeatureMatrix,
        mid: FeatureMatrix,
        fine: FeatureMatrix,
        overlap: Vec<Real>,
    ) -> Result<Self> {
        let set = Self {
            coarse,
            mid,
            fine,
            overlap,
        };
        set.validate_for(set.overlap.len())?;
        Ok(set)
    }

    /// Number of points described.
    pub fn len(&self) -> usize {
        self.overlap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlap.is_empty()
    }

    pub fn scale(&self, scale: FeatureScale) -> &FeatureMatrix {
        match scale {
            FeatureScale::Coarse => &self.coarse,
            FeatureScale::Mid => &self.mid,
            FeatureScale::Fine => &self.fine,
        }
    }

    /// Check this set against a cloud of `n` points.
    ///
    /// Every scale must have `n` finite rows and every overlap score must lie
    /// in `[0, 1]`.
    pub fn validate_for(&self, n: usize) -> Result<()> {
        for scale in FeatureScale::ALL {
            let m = self.scale(scale);
            if m.len() != n {
                return Err(RegistrationError::LengthMismatch {
                    what: scale_what(scale),
                    expected: n,
                    found: m.len(),
                });
            }
            if !m.all_finite() {
                return Err(RegistrationError::InvalidScores(format!(
                    "{scale} features contain non-finite values"
                )));
            }
        }
        if self.overlap.len() != n {
            return Err(RegistrationError::LengthMismatch {
                what: "overlap scores",
                expected: n,
                found: self.overlap.len(),
            });
        }
        if let Some((i, s)) = self
            .overlap
            .iter()
            .enumerate()
            .find(|(_, s)| !(0.0..=1.0).contains(*s))
        {
            return Err(RegistrationError::InvalidScores(format!(
                "overlap score {s} at index {i} is outside [0, 1]"
            )));
        }
        Ok(())
    }

    /// Restrict every member to `indices`, in the given order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            coarse: self.coarse.select(indices),
            mid: self.mid.select(indices),
            fine: self.fine.select(indices),
            overlap: indices.iter().map(|&i| self.overlap[i]).collect(),
        }
    }
}

fn scale_what(scale: FeatureScale) -> &'static str {
    match scale {
        FeatureScale::Coarse => "coarse features",
        FeatureScale::Mid => "mid features",
        FeatureScale::Fine => "fine features",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[[Real; 2]]) -> FeatureMatrix {
        FeatureMatrix::from_rows(rows).unwrap()
    }

    #[test]
    fn rows_and_select() {
        let m = matrix(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        assert_eq!(m.len(), 3);
        assert_eq!(m.row(1), &[3.0, 4.0]);
        let s = m.select(&[2, 0]);
        assert_eq!(s.as_slice(), &[5.0, 6.0, 1.0, 2.0]);
        assert_eq!(m.rows().count(), 3);
    }

    #[test]
    fn ragged_buffers_are_rejected() {
        assert!(FeatureMatrix::new(3, vec![0.0; 7]).is_err());
        assert!(FeatureMatrix::new(0, vec![1.0]).is_err());
        assert!(FeatureMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_err());
        assert!(FeatureMatrix::new(0, Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn normalized_rows_have_unit_norm() {
        let m = matrix(&[[3.0, 4.0], [0.0, 0.0]]).normalized();
        assert!((m.row(0)[0] - 0.6).abs() < 1e-12);
        assert!((m.row(0)[1] - 0.8).abs() < 1e-12);
        assert_eq!(m.row(1), &[0.0, 0.0]);
    }

    #[test]
    fn feature_set_validates_lengths_and_scores() {
        let m = matrix(&[[0.0, 1.0], [1.0, 0.0]]);
        let short = matrix(&[[0.0, 1.0]]);
        assert!(FeatureSet::new(m.clone(), m.clone(), m.clone(), vec![0.5, 1.0]).is_ok());
        assert!(matches!(
            FeatureSet::new(m.clone(), short, m.clone(), vec![0.5, 1.0]),
            Err(RegistrationError::LengthMismatch { what: "mid features", .. })
        ));
        assert!(matches!(
            FeatureSet::new(m.clone(), m.clone(), m, vec![0.5, 1.5]),
            Err(RegistrationError::InvalidScores(_))
        ));
    }

    #[test]
    fn deserialization_checks_shape() {
        let ok: FeatureMatrix = serde_json::from_str(r#"{"dim":2,"data":[1.0,2.0]}"#).unwrap();
        assert_eq!(ok.len(), 1);
        let bad = serde_json::from_str::<FeatureMatrix>(r#"{"dim":2,"data":[1.0,2.0,3.0]}"#);
        assert!(bad.is_err());
    }
}
