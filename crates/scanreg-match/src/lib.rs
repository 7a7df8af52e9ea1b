//! Correspondence search for point-cloud registration.
//!
//! - [`PointSampler`]: overlap-weighted reduction of a cloud to a budget,
//! - [`FeatureIndex`]: exact k-d tree over feature rows,
//! - [`CorrespondenceMatcher`]: nearest-neighbour matches at one scale,
//! - [`ConsistencyVoter`]: multi-scale consensus filtering.
//!
//! # Example
//!
//! ```
//! use scanreg_core::synthetic::{random_feature_set, random_points};
//! use scanreg_match::ConsistencyVoter;
//!
//! let points = random_points(50, 1.0, 7);
//! let features = random_feature_set(50, [8, 8, 8], 8);
//! let voted = ConsistencyVoter::default()
//!     .vote(&points, &points, &features, &features, 0.05)
//!     .unwrap();
//! assert_eq!(voted.len(), 50);
//! ```

mod index;
mod matcher;
mod sampler;
mod voter;

pub use index::{FeatureIndex, Neighbor};
pub use matcher::{CorrespondenceMatcher, FeatureMatch, FeatureMetric};
pub use sampler::PointSampler;
pub use voter::{ConsistencyVoter, VoterOptions, VotingResult, MIN_AGREEING_SCALES, NUM_SCALES};
