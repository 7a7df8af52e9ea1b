//! Nearest-neighbour correspondences in feature space.

use log::debug;
use rayon::prelude::*;
use scanreg_core::{FeatureMatrix, Real, RegistrationError, Result};
use serde::{Deserialize, Serialize};

use crate::FeatureIndex;

/// Distance used to compare feature vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureMetric {
    #[default]
    Euclidean,
    /// `1 - cos(a, b)`, evaluated on L2-normalized rows.
    Cosine,
}

/// Best target row for one source row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatch {
    pub source: usize,
    pub target: usize,
    /// Distance under the matcher's [`FeatureMetric`].
    pub distance: Real,
}

/// One-directional nearest-neighbour matcher.
///
/// Produces exactly one match per source row. Ties go to the lowest target
/// index.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrespondenceMatcher {
    metric: FeatureMetric,
}

impl CorrespondenceMatcher {
    pub fn new(metric: FeatureMetric) -> Self {
        Self { metric }
    }

    pub fn metric(&self) -> FeatureMetric {
        self.metric
    }

    /// Build an index over `target` prepared for this matcher's metric.
    pub fn index(&self, target: &FeatureMatrix) -> Result<FeatureIndex> {
        if target.is_empty() {
            return Err(RegistrationError::EmptyInput {
                what: "target features",
            });
        }
        Ok(FeatureIndex::build(self.prepare(target)))
    }

    /// Match every row of `source` against a prebuilt target index.
    pub fn match_with_index(
        &self,
        source: &FeatureMatrix,
        index: &FeatureIndex,
    ) -> Result<Vec<FeatureMatch>> {
        if source.is_empty() {
            return Err(RegistrationError::EmptyInput {
                what: "source features",
            });
        }
        if index.is_empty() {
            return Err(RegistrationError::EmptyInput {
                what: "target features",
            });
        }
        if source.dim() != index.dim() {
            return Err(RegistrationError::DimensionMismatch {
                scale: None,
                source_dim: source.dim(),
                target_dim: index.dim(),
            });
        }

        let queries = self.prepare(source);
        let metric = self.metric;
        let matches: Vec<FeatureMatch> = (0..queries.len())
            .into_par_iter()
            .filter_map(|i| {
                index.nearest(queries.row(i)).map(|hit| FeatureMatch {
                    source: i,
                    target: hit.index,
                    distance: metric.distance_from_squared(hit.distance_sq),
                })
            })
            .collect();

        debug!(
            "matched {} source rows against {} targets ({:?})",
            matches.len(),
            index.len(),
            metric
        );
        Ok(matches)
    }

    /// Match every row of `source` to its nearest row of `target`.
    ///
    /// Fails with `EmptyInput` when either matrix has no rows and with
    /// `DimensionMismatch` when their widths differ.
    pub fn match_features(
        &self,
        source: &FeatureMatrix,
        target: &FeatureMatrix,
    ) -> Result<Vec<FeatureMatch>> {
        if source.is_empty() {
            return Err(RegistrationError::EmptyInput {
                what: "source features",
            });
        }
        let index = self.index(target)?;
        self.match_with_index(source, &index)
    }

    fn prepare(&self, features: &FeatureMatrix) -> FeatureMatrix {
        match self.metric {
            FeatureMetric::Euclidean => features.clone(),
            FeatureMetric::Cosine => features.normalized(),
        }
    }
}

impl FeatureMetric {
    /// Convert a squared Euclidean distance between prepared rows.
    ///
    /// For unit rows `|a - b|^2 = 2 - 2 cos`, so the cosine distance is half
    /// the squared distance.
    fn distance_from_squared(self, d2: Real) -> Real {
        match self {
            FeatureMetric::Euclidean => d2.sqrt(),
            FeatureMetric::Cosine => 0.5 * d2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanreg_core::synthetic::random_features;

    fn m(rows: &[&[Real]]) -> FeatureMatrix {
        FeatureMatrix::from_rows(rows).unwrap()
    }

    #[test]
    fn one_match_per_source_row_in_order() {
        let source = random_features(150, 8, 1);
        let target = random_features(90, 8, 2);
        let matches = CorrespondenceMatcher::default()
            .match_features(&source, &target)
            .unwrap();
        assert_eq!(matches.len(), 150);
        for (i, m) in matches.iter().enumerate() {
            assert_eq!(m.source, i);
            assert!(m.target < 90);
        }
    }

    #[test]
    fn euclidean_distance_is_not_squared() {
        let source = m(&[&[0.0, 0.0]]);
        let target = m(&[&[3.0, 4.0], &[6.0, 8.0]]);
        let matches = CorrespondenceMatcher::new(FeatureMetric::Euclidean)
            .match_features(&source, &target)
            .unwrap();
        assert_eq!(matches[0].target, 0);
        assert!((matches[0].distance - 5.0).abs() < 1e-12);
    }

    #[test]
    fn cosine_ignores_magnitude() {
        let source = m(&[&[1.0, 0.0]]);
        let target = m(&[&[0.9, 0.9], &[10.0, 0.5]]);

        let euclid = CorrespondenceMatcher::new(FeatureMetric::Euclidean)
            .match_features(&source, &target)
            .unwrap();
        assert_eq!(euclid[0].target, 0);

        let cosine = CorrespondenceMatcher::new(FeatureMetric::Cosine)
            .match_features(&source, &target)
            .unwrap();
        assert_eq!(cosine[0].target, 1);
        let cos = 10.0 / (100.0_f64 + 0.25).sqrt();
        assert!((cosine[0].distance - (1.0 - cos)).abs() < 1e-12);
    }

    #[test]
    fn equidistant_targets_pick_lowest_index() {
        let source = m(&[&[0.0, 0.0]]);
        let target = m(&[&[2.0, 0.0], &[1.0, 0.0], &[-1.0, 0.0], &[0.0, 1.0]]);
        let matches = CorrespondenceMatcher::default()
            .match_features(&source, &target)
            .unwrap();
        assert_eq!(matches[0].target, 1);
    }

    #[test]
    fn rejects_empty_and_mismatched_inputs() {
        let matcher = CorrespondenceMatcher::default();
        let a = random_features(5, 4, 1);
        let b = random_features(5, 6, 2);

        assert_eq!(
            matcher.match_features(&FeatureMatrix::empty(4), &a),
            Err(RegistrationError::EmptyInput {
                what: "source features"
            })
        );
        assert_eq!(
            matcher.match_features(&a, &FeatureMatrix::empty(4)),
            Err(RegistrationError::EmptyInput {
                what: "target features"
            })
        );
        assert_eq!(
            matcher.match_features(&a, &b),
            Err(RegistrationError::DimensionMismatch {
                scale: None,
                source_dim: 4,
                target_dim: 6,
            })
        );
    }

    #[test]
    fn metric_serializes_snake_case() {
        let json = serde_json::to_string(&FeatureMetric::Cosine).unwrap();
        assert_eq!(json, "\"cosine\"");
        let back: FeatureMetric = serde_json::from_str("\"euclidean\"").unwrap();
        assert_eq!(back, FeatureMetric::Euclidean);
    }
}
