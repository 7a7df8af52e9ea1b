//! Exact nearest-neighbour index over feature vectors.
//!
//! A static k-d tree with bucketed leaves. Nodes live in one arena and
//! address a shared permutation of the row indices, so building never
//! copies feature rows.

use scanreg_core::{FeatureMatrix, Real};

const LEAF_SIZE: usize = 16;

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        start: usize,
        end: usize,
    },
    Split {
        dim: usize,
        value: Real,
        left: usize,
        right: usize,
    },
}

/// Result of a nearest-neighbour query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Row index in the indexed matrix.
    pub index: usize,
    /// Squared Euclidean distance to the query.
    pub distance_sq: Real,
}

/// Static k-d tree over the rows of a [`FeatureMatrix`].
///
/// Queries are exact. Among rows at the same distance the lowest row index
/// wins, so results do not depend on the tree shape.
#[derive(Debug, Clone)]
pub struct FeatureIndex {
    features: FeatureMatrix,
    order: Vec<usize>,
    nodes: Vec<Node>,
}

impl FeatureIndex {
    /// Build the tree; the matrix is moved into the index.
    pub fn build(features: FeatureMatrix) -> Self {
        let mut builder = Builder {
            features: &features,
            order: (0..features.len()).collect(),
            nodes: Vec::new(),
        };
        if !features.is_empty() {
            builder.build(0, features.len());
        }
        let Builder { order, nodes, .. } = builder;
        Self {
            features,
            order,
            nodes,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.features.dim()
    }

    /// Nearest row to `query`, or `None` for an empty index.
    ///
    /// `query` must have [`dim`](Self::dim) components.
    pub fn nearest(&self, query: &[Real]) -> Option<Neighbor> {
        if self.nodes.is_empty() {
            return None;
        }
        debug_assert_eq!(query.len(), self.dim());
        let mut best = Neighbor {
            index: usize::MAX,
            distance_sq: Real::INFINITY,
        };
        self.search(0, query, &mut best);
        (best.index != usize::MAX).then_some(best)
    }

    fn search(&self, node: usize, query: &[Real], best: &mut Neighbor) {
        match self.nodes[node] {
            Node::Leaf { start, end } => {
                for &idx in &self.order[start..end] {
                    let d = squared_distance(self.features.row(idx), query);
                    if d < best.distance_sq || (d == best.distance_sq && idx < best.index) {
                        *best = Neighbor {
                            index: idx,
                            distance_sq: d,
                        };
                    }
                }
            }
            Node::Split {
                dim,
                value,
                left,
                right,
            } => {
                let diff = query[dim] - value;
                let (near, far) = if diff < 0.0 {
                    (left, right)
                } else {
                    (right, left)
                };
                self.search(near, query, best);
                // equal distances must still be visited for the index tie-break
                if diff * diff <= best.distance_sq {
                    self.search(far, query, best);
                }
            }
        }
    }
}

struct Builder<'a> {
    features: &'a FeatureMatrix,
    order: Vec<usize>,
    nodes: Vec<Node>,
}

impl Builder<'_> {
    fn build(&mut self, start: usize, end: usize) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { start, end });
        if end - start <= LEAF_SIZE {
            return id;
        }

        let Some(dim) = self.widest_dimension(start, end) else {
            // every row in the range is identical
            return id;
        };

        let mid = start + (end - start) / 2;
        let features = self.features;
        self.order[start..end].select_nth_unstable_by(mid - start, |&a, &b| {
            features.row(a)[dim].total_cmp(&features.row(b)[dim])
        });
        let value = features.row(self.order[mid])[dim];

        let left = self.build(start, mid);
        let right = self.build(mid, end);
        self.nodes[id] = Node::Split {
            dim,
            value,
            left,
            right,
        };
        id
    }

    fn widest_dimension(&self, start: usize, end: usize) -> Option<usize> {
        let dim = self.features.dim();
        let mut lo = vec![Real::INFINITY; dim];
        let mut hi = vec![Real::NEG_INFINITY; dim];
        for &idx in &self.order[start..end] {
            for (d, &v) in self.features.row(idx).iter().enumerate() {
                lo[d] = lo[d].min(v);
                hi[d] = hi[d].max(v);
            }
        }
        let (best, spread) = (0..dim)
            .map(|d| (d, hi[d] - lo[d]))
            .fold((0, 0.0), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
        (spread > 0.0).then_some(best)
    }
}

fn squared_distance(a: &[Real], b: &[Real]) -> Real {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanreg_core::synthetic::{random_features, SplitMix64};

    fn brute_force(features: &FeatureMatrix, query: &[Real]) -> Neighbor {
        let mut best = Neighbor {
            index: usize::MAX,
            distance_sq: Real::INFINITY,
        };
        for (i, row) in features.rows().enumerate() {
            let d = squared_distance(row, query);
            if d < best.distance_sq {
                best = Neighbor {
                    index: i,
                    distance_sq: d,
                };
            }
        }
        best
    }

    #[test]
    fn empty_index_has_no_neighbor() {
        let index = FeatureIndex::build(FeatureMatrix::empty(4));
        assert!(index.is_empty());
        assert_eq!(index.nearest(&[0.0; 4]), None);
    }

    #[test]
    fn matches_brute_force_on_random_features() {
        let features = random_features(700, 12, 5);
        let queries = random_features(200, 12, 6);
        let index = FeatureIndex::build(features.clone());
        assert_eq!(index.len(), 700);
        assert_eq!(index.dim(), 12);

        for q in queries.rows() {
            let got = index.nearest(q).unwrap();
            let want = brute_force(&features, q);
            assert_eq!(got.index, want.index);
            assert!((got.distance_sq - want.distance_sq).abs() < 1e-12);
        }
    }

    #[test]
    fn self_query_returns_the_row() {
        let features = random_features(300, 3, 17);
        let index = FeatureIndex::build(features.clone());
        for (i, row) in features.rows().enumerate() {
            let hit = index.nearest(row).unwrap();
            assert_eq!(hit.index, i);
            assert_eq!(hit.distance_sq, 0.0);
        }
    }

    #[test]
    fn ties_resolve_to_lowest_index() {
        // many duplicated rows spread over several leaves
        let mut rng = SplitMix64::new(3);
        let mut rows = Vec::new();
        for _ in 0..100 {
            let v = rng.uniform(-1.0, 1.0);
            rows.push([v, -v]);
        }
        for _ in 0..50 {
            rows.push([0.25, 0.25]);
        }
        rows.push([0.25, 0.25]);
        let features = FeatureMatrix::from_rows(&rows).unwrap();
        let index = FeatureIndex::build(features);
        let hit = index.nearest(&[0.25, 0.25]).unwrap();
        assert_eq!(hit.index, 100);
    }

    #[test]
    fn identical_rows_collapse_into_one_leaf() {
        let rows = vec![[1.0, 1.0, 1.0]; 64];
        let features = FeatureMatrix::from_rows(&rows).unwrap();
        let index = FeatureIndex::build(features);
        assert_eq!(index.nodes.len(), 1);
        assert_eq!(index.nearest(&[0.0, 0.0, 0.0]).unwrap().index, 0);
    }
}
