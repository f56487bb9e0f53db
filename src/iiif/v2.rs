// src/iiif/v2.rs
//
// IIIF Image API 2.1

pub mod info;
pub mod parameters;
pub mod size;

pub use info::InfoDocument;
pub use parameters::{Parameters, ParametersBuilder};
pub use size::Size;
