//! Data model shared by every registration stage.

mod cloud;
mod correspondence;
mod features;
mod transform;

pub use cloud::*;
pub use correspondence::*;
pub use features::*;
pub use transform::*;
