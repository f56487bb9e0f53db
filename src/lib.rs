// lib.rs
//
// iiif-image: IIIF Image API request handling and image processing.
//
// Layers, from the outside in:
// - iiif: parses v2/v3 request URIs into an operation list, produces
//   canonical URIs and info.json documents
// - ops: the typed, version-independent operation list
// - engine: decodes a source, runs the operation list over it, encodes
// - geometry/info: the shared arithmetic and source metadata

pub mod engine;
pub mod error;
pub mod geometry;
pub mod iiif;
pub mod info;
pub mod ops;

pub use engine::{
    ImageEncoder, Processor, ProcessorConfig, Source, SourceDecoder, SourceFormat,
    StandardDecoder, StandardEncoder,
};
pub use error::{ErrorCategory, IiifError, Result};
pub use geometry::{Rectangle, ReductionFactor, ScaleConstraint, Size};
pub use iiif::OperationListContext;
pub use info::{Info, Orientation};
pub use ops::{Operation, OperationList};
