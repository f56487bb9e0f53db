// src/geometry.rs
//
// Value types shared by the parsers, the operation model and the raster
// engine. All of them are Copy and carry no pixel data.

mod rational;
mod rectangle;
mod reduction;
mod size;

pub use rational::{Rational, ScaleConstraint};
pub use rectangle::Rectangle;
pub use reduction::ReductionFactor;
pub use size::Size;

/// Tolerance used when comparing scale factors and degrees.
pub const DELTA: f64 = 1e-7;
