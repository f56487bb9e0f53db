// src/ops.rs
//
// Operation model.
// Operations are plain values; the expensive work happens in the engine.

pub mod color;
pub mod crop;
pub mod encode;
pub mod identifier;
pub mod list;
pub mod overlay;
pub mod policy;
pub mod rotate;
pub mod scale;
pub mod sharpen;

pub use color::{Color, ColorTransform};
pub use crop::Crop;
pub use encode::{Encode, EncodeOptions, OutputFormat};
pub use identifier::MetaIdentifier;
pub use list::OperationList;
pub use overlay::{
    ImageOverlay, Overlay, OverlaySource, Position, Redaction, StringOverlay, TextLayout,
};
pub use policy::ValidationPolicy;
pub use rotate::{Rotate, Transpose};
pub use scale::{Scale, ScaleFilter, ScaleKind, ScaleMode};
pub use sharpen::Sharpen;

use crate::geometry::Size;
use std::fmt;

/// A single step of an operation list.
///
/// Each variant carries only what it needs. Variants are listed in the
/// order the engine applies them.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    Crop(Crop),
    Scale(Scale),
    Transpose(Transpose),
    Rotate(Rotate),
    ColorTransform(ColorTransform),
    Sharpen(Sharpen),
    Redaction(Redaction),
    Overlay(Overlay),
    Encode(Encode),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Crop(_) => "crop",
            Operation::Scale(_) => "scale",
            Operation::Transpose(_) => "transpose",
            Operation::Rotate(_) => "rotate",
            Operation::ColorTransform(_) => "color transform",
            Operation::Sharpen(_) => "sharpen",
            Operation::Redaction(_) => "redaction",
            Operation::Overlay(_) => "overlay",
            Operation::Encode(_) => "encode",
        }
    }

    /// Position in the fixed pipeline order.
    pub fn rank(&self) -> u8 {
        match self {
            Operation::Crop(_) => 0,
            Operation::Scale(_) => 1,
            Operation::Transpose(_) => 2,
            Operation::Rotate(_) => 3,
            Operation::ColorTransform(_) => 4,
            Operation::Sharpen(_) => 5,
            Operation::Redaction(_) => 6,
            Operation::Overlay(_) => 7,
            Operation::Encode(_) => 8,
        }
    }

    /// Operations that may appear at most once per list.
    pub fn is_singleton(&self) -> bool {
        matches!(
            self,
            Operation::Crop(_) | Operation::Scale(_) | Operation::Rotate(_) | Operation::Encode(_)
        )
    }

    /// Whether applying this operation to an image of `full_size`, in the
    /// context of `list`, would change it.
    pub fn has_effect(&self, full_size: Size, list: &OperationList) -> bool {
        let sc = list.scale_constraint();
        match self {
            Operation::Crop(crop) => crop.has_effect(full_size, sc),
            Operation::Scale(scale) => scale.has_effect(list.region(full_size).size(), sc),
            Operation::Transpose(_) => true,
            Operation::Rotate(rotate) => rotate.has_effect(),
            Operation::ColorTransform(_) => true,
            Operation::Sharpen(sharpen) => sharpen.has_effect(),
            Operation::Redaction(redaction) => {
                redaction.has_effect(full_size)
                    && !redaction
                        .region()
                        .intersect(&list.region(full_size))
                        .is_empty()
            }
            Operation::Overlay(overlay) => overlay.has_effect(),
            Operation::Encode(_) => true,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Crop(op) => op.fmt(f),
            Operation::Scale(op) => op.fmt(f),
            Operation::Transpose(op) => op.fmt(f),
            Operation::Rotate(op) => op.fmt(f),
            Operation::ColorTransform(op) => write!(f, "color:{op}"),
            Operation::Sharpen(op) => op.fmt(f),
            Operation::Redaction(op) => op.fmt(f),
            Operation::Overlay(op) => op.fmt(f),
            Operation::Encode(op) => op.fmt(f),
        }
    }
}
