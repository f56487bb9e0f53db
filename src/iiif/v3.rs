// src/iiif/v3.rs
//
// IIIF Image API 3.0

pub mod info;
pub mod parameters;
pub mod size;

pub use info::InfoDocument;
pub use parameters::{Parameters, ParametersBuilder};
pub use size::Size;
