// src/ops/list.rs

use super::{
    ColorTransform, Crop, Encode, MetaIdentifier, Operation, OutputFormat, Overlay, Redaction,
    Rotate, Scale, Sharpen, Transpose, ValidationPolicy,
};
use crate::error::{IiifError, Result};
use crate::geometry::{Rectangle, ScaleConstraint, Size};
use std::collections::BTreeMap;
use std::fmt;

/// Ordered operations for one request.
///
/// `add` keeps operations in pipeline order regardless of insertion order,
/// and rejects a second Crop, Scale, Rotate or Encode. Once frozen the list
/// rejects every mutation.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct OperationList {
    identifier: MetaIdentifier,
    operations: Vec<Operation>,
    options: BTreeMap<String, String>,
    frozen: bool,
}

impl OperationList {
    pub fn new(identifier: MetaIdentifier) -> Self {
        Self {
            identifier,
            ..Self::default()
        }
    }

    pub fn add(&mut self, op: Operation) -> Result<()> {
        if self.frozen {
            return Err(IiifError::frozen_operation_list(format!("add {}", op.name())));
        }
        if op.is_singleton() && self.operations.iter().any(|o| o.rank() == op.rank()) {
            return Err(IiifError::duplicate_operation(op.name()));
        }
        let index = self
            .operations
            .iter()
            .position(|o| o.rank() > op.rank())
            .unwrap_or(self.operations.len());
        self.operations.insert(index, op);
        Ok(())
    }

    /// Builder-style `add`.
    pub fn with(mut self, op: Operation) -> Result<Self> {
        self.add(op)?;
        Ok(self)
    }

    pub fn set_option(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        if self.frozen {
            return Err(IiifError::frozen_operation_list("set option"));
        }
        self.options.insert(key.into(), value.into());
        Ok(())
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn identifier(&self) -> &MetaIdentifier {
        &self.identifier
    }

    pub fn scale_constraint(&self) -> ScaleConstraint {
        self.identifier.scale_constraint()
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.operations.iter()
    }

    pub fn crop(&self) -> Option<&Crop> {
        self.iter().find_map(|op| match op {
            Operation::Crop(c) => Some(c),
            _ => None,
        })
    }

    pub fn scale(&self) -> Option<&Scale> {
        self.iter().find_map(|op| match op {
            Operation::Scale(s) => Some(s),
            _ => None,
        })
    }

    pub fn rotate(&self) -> Option<&Rotate> {
        self.iter().find_map(|op| match op {
            Operation::Rotate(r) => Some(r),
            _ => None,
        })
    }

    pub fn color_transform(&self) -> Option<ColorTransform> {
        self.iter().find_map(|op| match op {
            Operation::ColorTransform(c) => Some(*c),
            _ => None,
        })
    }

    pub fn sharpen(&self) -> Option<&Sharpen> {
        self.iter().find_map(|op| match op {
            Operation::Sharpen(s) => Some(s),
            _ => None,
        })
    }

    pub fn encode(&self) -> Option<&Encode> {
        self.iter().find_map(|op| match op {
            Operation::Encode(e) => Some(e),
            _ => None,
        })
    }

    pub fn transposes(&self) -> impl Iterator<Item = &Transpose> {
        self.iter().filter_map(|op| match op {
            Operation::Transpose(t) => Some(t),
            _ => None,
        })
    }

    pub fn redactions(&self) -> impl Iterator<Item = &Redaction> {
        self.iter().filter_map(|op| match op {
            Operation::Redaction(r) => Some(r),
            _ => None,
        })
    }

    pub fn overlays(&self) -> impl Iterator<Item = &Overlay> {
        self.iter().filter_map(|op| match op {
            Operation::Overlay(o) => Some(o),
            _ => None,
        })
    }

    /// Crop region in full-resolution pixels (the whole image without a crop).
    pub fn region(&self, full_size: Size) -> Rectangle {
        match self.crop() {
            Some(crop) => crop.rectangle(full_size, self.scale_constraint()),
            None => Rectangle::from_size(full_size),
        }
    }

    /// Logical output size after every geometric operation.
    pub fn resulting_size(&self, full_size: Size) -> Size {
        let sc = self.scale_constraint();
        let region = self.region(full_size).size();
        let scaled = match self.scale() {
            Some(scale) => scale.resulting_size(region, sc),
            None => sc.constrained_size(region),
        };
        match self.rotate() {
            Some(rotate) => rotate.resulting_size(scaled),
            None => scaled,
        }
    }

    /// Whether processing would produce anything other than the source
    /// bytes re-encoded in the same format.
    pub fn has_effect(&self, full_size: Size, source_format: Option<OutputFormat>) -> bool {
        let format_changes = match (self.encode(), source_format) {
            (Some(encode), Some(source)) => encode.format() != source,
            _ => true,
        };
        format_changes
            || self
                .iter()
                .filter(|op| !matches!(op, Operation::Encode(_)))
                .any(|op| op.has_effect(full_size, self))
    }

    /// Checks the list against `full_size` and server policy.
    pub fn validate(&self, full_size: Size, policy: &ValidationPolicy) -> Result<()> {
        let sc = self.scale_constraint();
        let region = self.region(full_size);
        if region.int_width() <= 0 || region.int_height() <= 0 {
            let requested = match self.crop() {
                Some(Crop::ByPixels {
                    x,
                    y,
                    width,
                    height,
                }) => Rectangle::new(*x, *y, *width, *height),
                _ => region,
            };
            return Err(IiifError::empty_region(
                requested.to_int_tuple(),
                (full_size.floor_width(), full_size.floor_height()),
            ));
        }

        let virt_region = sc.constrained_size(region.size());
        let (out, scale) = match self.scale() {
            Some(s) => {
                let out = s.resulting_size(region.size(), sc);
                if s.is_upscaling(region.size(), sc)
                    && (!s.allows_upscaling() || !policy.allow_upscaling)
                {
                    return Err(IiifError::upscaling_not_allowed(
                        (out.int_width() as u64, out.int_height() as u64),
                        (virt_region.int_width() as u64, virt_region.int_height() as u64),
                    ));
                }
                (out, s.resulting_scales(region.size(), sc))
            }
            None => (virt_region, (sc.to_f64(), sc.to_f64())),
        };

        let (w, h) = (out.int_width(), out.int_height());
        policy.enforce_pixels(w, h)?;
        policy.enforce_scale(w, h, scale.0.max(scale.1))?;
        policy.enforce_restricted(w, h)?;
        Ok(())
    }

    /// Mutations that apply to every request regardless of endpoint: a
    /// scale constraint without an explicit Scale still needs resizing.
    pub fn apply_non_endpoint_mutations(&mut self, full_size: Size) -> Result<()> {
        if self.frozen {
            return Err(IiifError::frozen_operation_list(
                "apply non-endpoint mutations",
            ));
        }
        if self.scale_constraint().has_effect() && self.scale().is_none() {
            self.add(Operation::Scale(Scale::by_percent(1.0)?))?;
            tracing::trace!(
                target: "iiif_image::ops",
                full = %full_size,
                sc = %self.scale_constraint(),
                "inserted 100% scale for scale constraint"
            );
        }
        Ok(())
    }
}

impl fmt::Display for OperationList {
    /// Stable string form, usable as a derivative cache key.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier)?;
        for op in &self.operations {
            write!(f, "_{op}")?;
        }
        for (key, value) in &self.options {
            write!(f, "_{key}:{value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::ops::{ColorTransform, ScaleMode};

    fn list(id: &str) -> OperationList {
        OperationList::new(MetaIdentifier::parse(id, ";").unwrap())
    }

    #[test]
    fn test_add_sorts_by_pipeline_order() {
        let mut ops = list("img");
        ops.add(Operation::Encode(Encode::new(OutputFormat::Jpg))).unwrap();
        ops.add(Operation::ColorTransform(ColorTransform::Gray)).unwrap();
        ops.add(Operation::Crop(Crop::ToSquare)).unwrap();
        let names: Vec<_> = ops.iter().map(|o| o.name()).collect();
        assert_eq!(names, ["crop", "color transform", "encode"]);
    }

    #[test]
    fn test_duplicate_singleton_rejected() {
        let mut ops = list("img");
        ops.add(Operation::Crop(Crop::ToSquare)).unwrap();
        assert!(ops.add(Operation::Crop(Crop::ToSquare)).is_err());
        ops.add(Operation::Transpose(Transpose::Horizontal)).unwrap();
        ops.add(Operation::Transpose(Transpose::Vertical)).unwrap();
        assert_eq!(ops.transposes().count(), 2);
    }

    #[test]
    fn test_frozen_rejects_mutation() {
        let mut ops = list("img");
        ops.freeze();
        assert!(ops.add(Operation::Crop(Crop::ToSquare)).is_err());
        assert!(ops.set_option("a", "b").is_err());
        assert!(ops.apply_non_endpoint_mutations(Size::new(1.0, 1.0)).is_err());
    }

    #[test]
    fn test_resulting_size() {
        let full = Size::new(64.0, 56.0);
        let ops = list("img")
            .with(Operation::Crop(Crop::by_percent(0.5, 0.5, 0.5, 0.5).unwrap()))
            .unwrap()
            .with(Operation::Scale(
                Scale::by_pixels(None, Some(50), ScaleMode::AspectFitHeight).unwrap(),
            ))
            .unwrap();
        let out = ops.resulting_size(full);
        assert_eq!((out.int_width(), out.int_height()), (57, 50));
    }

    #[test]
    fn test_resulting_size_with_scale_constraint() {
        let ops = list("img;1:2");
        let out = ops.resulting_size(Size::new(200.0, 100.0));
        assert_eq!(out, Size::new(100.0, 50.0));
    }

    #[test]
    fn test_validate_empty_region() {
        let ops = list("img")
            .with(Operation::Crop(Crop::by_pixels(500.0, 0.0, 10.0, 10.0).unwrap()))
            .unwrap();
        let err = ops
            .validate(Size::new(100.0, 100.0), &ValidationPolicy::default())
            .unwrap_err();
        assert!(matches!(err, IiifError::EmptyRegion { x: 500, .. }));
    }

    #[test]
    fn test_validate_upscaling() {
        let full = Size::new(100.0, 100.0);
        let up = Scale::by_pixels(Some(200), None, ScaleMode::AspectFitWidth).unwrap();
        let ops = list("img").with(Operation::Scale(up)).unwrap();
        assert!(ops.validate(full, &ValidationPolicy::default()).is_ok());
        assert!(ops.validate(full, &ValidationPolicy::strict()).is_err());

        let ops = list("img")
            .with(Operation::Scale(up.with_upscaling(false)))
            .unwrap();
        let err = ops.validate(full, &ValidationPolicy::default()).unwrap_err();
        assert!(matches!(err, IiifError::UpscalingNotAllowed { .. }));
    }

    #[test]
    fn test_validate_extreme_aspect_ratio() {
        let full = Size::new(20_000.0, 4.0);
        let ops = list("img")
            .with(Operation::Scale(
                Scale::by_pixels(Some(100), None, ScaleMode::AspectFitWidth).unwrap(),
            ))
            .unwrap();
        assert!(ops.validate(full, &ValidationPolicy::default()).is_ok());
        assert_eq!(ops.resulting_size(full).to_pixels(), (100, 1));
    }

    #[test]
    fn test_validate_restricted_sizes() {
        let policy = ValidationPolicy {
            restricted_sizes: Some(vec![(50, 50)]),
            ..ValidationPolicy::default()
        };
        let ops = list("img")
            .with(Operation::Scale(Scale::by_percent(0.5).unwrap()))
            .unwrap();
        assert!(ops.validate(Size::new(100.0, 100.0), &policy).is_ok());
        let err = ops.validate(Size::new(90.0, 100.0), &policy).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::SizeRestricted);
    }

    #[test]
    fn test_validate_max_pixels() {
        let policy = ValidationPolicy {
            max_pixels: Some(100),
            ..ValidationPolicy::default()
        };
        assert!(list("img").validate(Size::new(100.0, 100.0), &policy).is_err());
        assert!(list("img").validate(Size::new(10.0, 10.0), &policy).is_ok());
    }

    #[test]
    fn test_non_endpoint_mutations() {
        let mut ops = list("img;1:4");
        ops.apply_non_endpoint_mutations(Size::new(400.0, 400.0)).unwrap();
        assert!(ops.scale().is_some());

        let mut plain = list("img");
        plain.apply_non_endpoint_mutations(Size::new(400.0, 400.0)).unwrap();
        assert!(plain.scale().is_none());
    }

    #[test]
    fn test_has_effect() {
        let full = Size::new(64.0, 56.0);
        let ops = list("img")
            .with(Operation::Rotate(Rotate::new(0.0).unwrap()))
            .unwrap()
            .with(Operation::Encode(Encode::new(OutputFormat::Jpg)))
            .unwrap();
        assert!(!ops.has_effect(full, Some(OutputFormat::Jpg)));
        assert!(ops.has_effect(full, Some(OutputFormat::Png)));
    }

    #[test]
    fn test_display_is_stable_cache_key() {
        let mut ops = list("img;2")
            .with(Operation::Crop(Crop::ToSquare))
            .unwrap()
            .with(Operation::Encode(Encode::new(OutputFormat::Png)))
            .unwrap();
        ops.set_option("b", "2").unwrap();
        ops.set_option("a", "1").unwrap();
        assert_eq!(
            ops.to_string(),
            "img;2_crop:square_encode:png,q=80_a:1_b:2"
        );
    }
}
