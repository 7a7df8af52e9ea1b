//! Deterministic synthetic registration scenes.
//!
//! Used by the workspace tests and handy for benchmarking: all randomness
//! comes from a SplitMix64 stream, so scenes are identical across platforms
//! and `rand` versions.

mod scene;
mod stream;

pub use scene::*;
pub use stream::*;
