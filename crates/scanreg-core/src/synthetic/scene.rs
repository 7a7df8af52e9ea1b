//! Scene and correspondence generators with known ground truth.

use super::SplitMix64;
use crate::{Correspondence, FeatureMatrix, FeatureSet, PointCloud, Pt3, Real, RigidTransform};

/// `n` points uniformly distributed in `[-half_extent, half_extent]^3`.
pub fn random_points(n: usize, half_extent: Real, seed: u64) -> Vec<Pt3> {
    let mut rng = SplitMix64::new(seed);
    (0..n).map(|_| rng.point_in_cube(half_extent)).collect()
}

/// `n × dim` features with components uniform in `[-1, 1)`.
pub fn random_features(n: usize, dim: usize, seed: u64) -> FeatureMatrix {
    let mut rng = SplitMix64::new(seed);
    let data = (0..n * dim).map(|_| rng.uniform(-1.0, 1.0)).collect();
    FeatureMatrix::new(dim, data).expect("buffer length is n * dim")
}

/// Unrelated random features at every scale, all overlap scores `1`.
pub fn random_feature_set(n: usize, dims: [usize; 3], seed: u64) -> FeatureSet {
    FeatureSet {
        coarse: random_features(n, dims[0], seed ^ 0xC0A5),
        mid: random_features(n, dims[1], seed ^ 0x0317),
        fine: random_features(n, dims[2], seed ^ 0xF17E),
        overlap: vec![1.0; n],
    }
}

/// Parameters of a two-cloud scene with partial overlap.
#[derive(Debug, Clone)]
pub struct OverlapSceneSpec {
    /// Points seen by both clouds.
    pub shared: usize,
    /// Points only in the source cloud.
    pub source_only: usize,
    /// Points only in the target cloud.
    pub target_only: usize,
    pub half_extent: Real,
    /// Feature dimensions `[coarse, mid, fine]`.
    pub dims: [usize; 3],
    /// Overlap score assigned to shared points.
    pub shared_overlap: Real,
    /// Overlap score assigned to points outside the shared region.
    pub private_overlap: Real,
    /// Maximum displacement added to shared target points.
    pub point_noise: Real,
    /// Maximum per-component perturbation of shared target features.
    pub feature_noise: Real,
    pub seed: u64,
}

impl Default for OverlapSceneSpec {
    fn default() -> Self {
        Self {
            shared: 200,
            source_only: 50,
            target_only: 50,
            half_extent: 5.0,
            dims: [16, 16, 16],
            shared_overlap: 0.9,
            private_overlap: 0.1,
            point_noise: 0.0,
            feature_noise: 0.0,
            seed: 0,
        }
    }
}

/// A generated scene: target = `source_to_target` applied to the shared
/// part of the source, plus private points on both sides.
#[derive(Debug, Clone)]
pub struct OverlapScene {
    pub source: PointCloud,
    pub target: PointCloud,
    pub source_features: FeatureSet,
    pub target_features: FeatureSet,
    pub source_to_target: RigidTransform,
    /// `(source index, target index)` of every shared point.
    pub shared_pairs: Vec<(usize, usize)>,
}

struct Entry {
    point: Pt3,
    rows: [Vec<Real>; 3],
    overlap: Real,
}

impl OverlapSceneSpec {
    pub fn build(&self, source_to_target: &RigidTransform) -> OverlapScene {
        let mut rng = SplitMix64::new(self.seed);
        let n_src = self.shared + self.source_only;

        let mut source = Vec::with_capacity(n_src);
        for k in 0..n_src {
            let overlap = if k < self.shared {
                self.shared_overlap
            } else {
                self.private_overlap
            };
            source.push(Entry {
                point: rng.point_in_cube(self.half_extent),
                rows: self.random_rows(&mut rng),
                overlap,
            });
        }

        let mut target = Vec::with_capacity(self.shared + self.target_only);
        for entry in source.iter().take(self.shared) {
            let offset = rng.unit_vector() * rng.uniform(0.0, self.point_noise);
            let rows = entry.rows.clone().map(|row| {
                row.into_iter()
                    .map(|v| v + rng.uniform(-self.feature_noise, self.feature_noise))
                    .collect()
            });
            target.push(Entry {
                point: source_to_target.transform_point(&entry.point) + offset,
                rows,
                overlap: self.shared_overlap,
            });
        }
        for _ in 0..self.target_only {
            let p = rng.point_in_cube(self.half_extent);
            target.push(Entry {
                point: source_to_target.transform_point(&p),
                rows: self.random_rows(&mut rng),
                overlap: self.private_overlap,
            });
        }

        // shuffle the target so index equality never hints at a match
        let keys: Vec<u64> = (0..target.len()).map(|_| rng.next_u64()).collect();
        let mut order: Vec<usize> = (0..target.len()).collect();
        order.sort_by_key(|&i| keys[i]);
        let mut new_index = vec![0; target.len()];
        for (new, &old) in order.iter().enumerate() {
            new_index[old] = new;
        }
        let shared_pairs = (0..self.shared).map(|k| (k, new_index[k])).collect();
        let target: Vec<Entry> = {
            let mut slots: Vec<Option<Entry>> = target.into_iter().map(Some).collect();
            order.iter().filter_map(|&old| slots[old].take()).collect()
        };

        let (source_cloud, source_features) = self.assemble(source);
        let (target_cloud, target_features) = self.assemble(target);
        OverlapScene {
            source: source_cloud,
            target: target_cloud,
            source_features,
            target_features,
            source_to_target: *source_to_target,
            shared_pairs,
        }
    }

    fn random_rows(&self, rng: &mut SplitMix64) -> [Vec<Real>; 3] {
        self.dims
            .map(|dim| (0..dim).map(|_| rng.uniform(-1.0, 1.0)).collect())
    }

    fn assemble(&self, entries: Vec<Entry>) -> (PointCloud, FeatureSet) {
        let n = entries.len();
        let mut points = Vec::with_capacity(n);
        let mut data: [Vec<Real>; 3] = Default::default();
        let mut overlap = Vec::with_capacity(n);
        for entry in entries {
            points.push(entry.point);
            for (buf, row) in data.iter_mut().zip(entry.rows) {
                buf.extend(row);
            }
            overlap.push(entry.overlap);
        }
        let [coarse, mid, fine] = data;
        let features = FeatureSet {
            coarse: FeatureMatrix::new(self.dims[0], coarse).expect("rows share one dimension"),
            mid: FeatureMatrix::new(self.dims[1], mid).expect("rows share one dimension"),
            fine: FeatureMatrix::new(self.dims[2], fine).expect("rows share one dimension"),
            overlap,
        };
        (PointCloud::new(points), features)
    }
}

/// Point pairs with index-aligned correspondences, some of them corrupted.
#[derive(Debug, Clone)]
pub struct CorrespondenceFixture {
    pub source: Vec<Pt3>,
    pub target: Vec<Pt3>,
    /// Correspondence `i` links `source[i]` and `target[i]`.
    pub correspondences: Vec<Correspondence>,
    /// Indices of the uncorrupted correspondences, ascending.
    pub inliers: Vec<usize>,
}

/// Build `inliers + outliers` correspondences under `source_to_target`.
///
/// Inlier targets are displaced by at most `noise`; outlier targets are
/// pushed between 1 and 3 units away from their true position in a random
/// direction.
pub fn correspondences_with_outliers(
    inliers: usize,
    outliers: usize,
    half_extent: Real,
    noise: Real,
    source_to_target: &RigidTransform,
    seed: u64,
) -> CorrespondenceFixture {
    let mut rng = SplitMix64::new(seed);
    let n = inliers + outliers;

    let keys: Vec<u64> = (0..n).map(|_| rng.next_u64()).collect();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&i| keys[i]);
    let mut is_outlier = vec![false; n];
    for &i in order.iter().take(outliers) {
        is_outlier[i] = true;
    }

    let mut source = Vec::with_capacity(n);
    let mut target = Vec::with_capacity(n);
    for outlier in &is_outlier {
        let p = rng.point_in_cube(half_extent);
        let mut q = source_to_target.transform_point(&p) + rng.unit_vector() * rng.uniform(0.0, noise);
        if *outlier {
            q += rng.unit_vector() * rng.uniform(1.0, 3.0);
        }
        source.push(p);
        target.push(q);
    }

    CorrespondenceFixture {
        source,
        target,
        correspondences: (0..n).map(|i| Correspondence::unweighted(i, i)).collect(),
        inliers: (0..n).filter(|&i| !is_outlier[i]).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vec3;
    use nalgebra::Rotation3;

    fn gt() -> RigidTransform {
        RigidTransform::from_rotation(
            &Rotation3::from_euler_angles(0.1, 0.2, 0.3),
            Vec3::new(0.5, -1.0, 2.0),
        )
    }

    #[test]
    fn shared_pairs_follow_the_ground_truth() {
        let spec = OverlapSceneSpec {
            shared: 20,
            source_only: 5,
            target_only: 7,
            ..OverlapSceneSpec::default()
        };
        let scene = spec.build(&gt());
        assert_eq!(scene.source.len(), 25);
        assert_eq!(scene.target.len(), 27);
        scene.source_features.validate_for(25).unwrap();
        scene.target_features.validate_for(27).unwrap();

        for &(s, t) in &scene.shared_pairs {
            let mapped = gt().transform_point(&scene.source.points[s]);
            assert!((mapped - scene.target.points[t]).norm() < 1e-9);
            assert_eq!(
                scene.source_features.fine.row(s),
                scene.target_features.fine.row(t)
            );
            assert_eq!(scene.target_features.overlap[t], spec.shared_overlap);
        }
    }

    #[test]
    fn fixture_marks_outliers() {
        let f = correspondences_with_outliers(8, 12, 4.0, 0.0, &gt(), 3);
        assert_eq!(f.correspondences.len(), 20);
        assert_eq!(f.inliers.len(), 8);
        for (i, (p, q)) in f.source.iter().zip(&f.target).enumerate() {
            let err = (gt().transform_point(p) - q).norm();
            if f.inliers.contains(&i) {
                assert!(err < 1e-9);
            } else {
                assert!(err >= 1.0);
            }
        }
    }
}
