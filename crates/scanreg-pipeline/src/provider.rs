//! Source of per-point features.

use anyhow::anyhow;
use scanreg_core::{FeatureSet, PointCloud};
use serde::{Deserialize, Serialize};

/// Computes multi-scale features and overlap scores for a cloud.
///
/// Usually backed by a learned model running outside this workspace.
/// Closures `Fn(&PointCloud) -> anyhow::Result<FeatureSet>` implement the
/// trait directly.
pub trait FeatureProvider {
    fn features(&self, cloud: &PointCloud) -> anyhow::Result<FeatureSet>;
}

impl<F> FeatureProvider for F
where
    F: Fn(&PointCloud) -> anyhow::Result<FeatureSet>,
{
    fn features(&self, cloud: &PointCloud) -> anyhow::Result<FeatureSet> {
        self(cloud)
    }
}

/// A cloud together with features computed ahead of time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturedCloud {
    pub cloud: PointCloud,
    pub features: FeatureSet,
}

/// Provider that hands out features computed ahead of time.
///
/// Lookup is by point-wise equality with a stored cloud.
#[derive(Debug, Clone, Default)]
pub struct PrecomputedFeatures {
    entries: Vec<FeaturedCloud>,
}

impl PrecomputedFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cloud: PointCloud, features: FeatureSet) {
        self.entries.push(FeaturedCloud { cloud, features });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<FeaturedCloud> for PrecomputedFeatures {
    fn from_iter<I: IntoIterator<Item = FeaturedCloud>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl FeatureProvider for PrecomputedFeatures {
    fn features(&self, cloud: &PointCloud) -> anyhow::Result<FeatureSet> {
        self.entries
            .iter()
            .find(|e| e.cloud == *cloud)
            .map(|e| e.features.clone())
            .ok_or_else(|| anyhow!("no precomputed features for a cloud of {} points", cloud.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanreg_core::synthetic::{random_feature_set, random_points};

    #[test]
    fn closures_are_providers() {
        let provider = |cloud: &PointCloud| -> anyhow::Result<FeatureSet> {
            Ok(random_feature_set(cloud.len(), [2, 3, 4], 1))
        };
        let cloud = PointCloud::new(random_points(7, 1.0, 2));
        let features = provider.features(&cloud).unwrap();
        assert_eq!(features.len(), 7);
        assert_eq!(features.fine.dim(), 4);
    }

    #[test]
    fn precomputed_lookup_by_cloud() {
        let a = PointCloud::new(random_points(5, 1.0, 3));
        let b = PointCloud::new(random_points(6, 1.0, 4));
        let fa = random_feature_set(5, [2, 2, 2], 5);
        let mut provider = PrecomputedFeatures::new();
        provider.insert(a.clone(), fa.clone());

        assert_eq!(provider.len(), 1);
        assert_eq!(provider.features(&a).unwrap(), fa);
        let err = provider.features(&b).unwrap_err();
        assert!(err.to_string().contains("6 points"));
    }
}
