// src/ops/crop.rs

use crate::error::{IiifError, Result};
use crate::geometry::{Rectangle, ReductionFactor, ScaleConstraint, Size, DELTA};
use std::fmt;

/// Region selection.
///
/// Pixel coordinates are expressed in the scale-constrained ("virtual")
/// full image the client sees; percentages are fractions in `0.0..=1.0` of
/// the image. Neither depends on the reduction factor of the raster that is
/// eventually cropped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Crop {
    ByPixels {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    ByPercent {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    ToSquare,
}

impl Crop {
    pub fn by_pixels(x: f64, y: f64, width: f64, height: f64) -> Result<Self> {
        validate_origin("crop x", x)?;
        validate_origin("crop y", y)?;
        validate_extent("crop width", width)?;
        validate_extent("crop height", height)?;
        Ok(Crop::ByPixels {
            x,
            y,
            width,
            height,
        })
    }

    pub fn by_percent(x: f64, y: f64, width: f64, height: f64) -> Result<Self> {
        validate_origin("crop x percent", x)?;
        validate_origin("crop y percent", y)?;
        validate_extent("crop width percent", width)?;
        validate_extent("crop height percent", height)?;
        Ok(Crop::ByPercent {
            x,
            y,
            width,
            height,
        })
    }

    /// Region in the full-resolution source, clipped to its bounds.
    pub fn rectangle(&self, full_size: Size, scale_constraint: ScaleConstraint) -> Rectangle {
        self.raster_rectangle(full_size, ReductionFactor::default(), scale_constraint)
    }

    /// Region in a raster of `reduced_size` that has already been reduced by
    /// `reduction_factor`, clipped to the raster bounds.
    ///
    /// Pixel crops undo the scale constraint (virtual → full) and then apply
    /// the reduction (full → raster); percent and square crops are relative
    /// to whatever raster they are applied to.
    pub fn raster_rectangle(
        &self,
        reduced_size: Size,
        reduction_factor: ReductionFactor,
        scale_constraint: ScaleConstraint,
    ) -> Rectangle {
        let rect = match *self {
            Crop::ByPixels {
                x,
                y,
                width,
                height,
            } => {
                let scale = reduction_factor.scale() / scale_constraint.to_f64();
                Rectangle::new(x, y, width, height).scaled(scale)
            }
            Crop::ByPercent {
                x,
                y,
                width,
                height,
            } => Rectangle::new(
                x * reduced_size.width(),
                y * reduced_size.height(),
                width * reduced_size.width(),
                height * reduced_size.height(),
            ),
            Crop::ToSquare => {
                let shortest = reduced_size.width().min(reduced_size.height());
                Rectangle::new(
                    (reduced_size.width() - shortest) / 2.0,
                    (reduced_size.height() - shortest) / 2.0,
                    shortest,
                    shortest,
                )
            }
        };
        rect.clipped_to(reduced_size)
    }

    /// A crop has no effect when it selects the whole image.
    pub fn has_effect(&self, full_size: Size, scale_constraint: ScaleConstraint) -> bool {
        match *self {
            Crop::ToSquare => (full_size.width() - full_size.height()).abs() > DELTA,
            _ => {
                let rect = self.rectangle(full_size, scale_constraint);
                rect.x().abs() > DELTA
                    || rect.y().abs() > DELTA
                    || (rect.width() - full_size.width()).abs() > DELTA
                    || (rect.height() - full_size.height()).abs() > DELTA
            }
        }
    }
}

fn validate_origin(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(IiifError::invalid_argument(
            name,
            value.to_string(),
            "must be greater than or equal to 0",
        ));
    }
    Ok(())
}

fn validate_extent(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(IiifError::invalid_argument(
            name,
            value.to_string(),
            "must be greater than 0",
        ));
    }
    Ok(())
}

impl fmt::Display for Crop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crop::ByPixels {
                x,
                y,
                width,
                height,
            } => write!(f, "crop:{x},{y},{width},{height}"),
            Crop::ByPercent {
                x,
                y,
                width,
                height,
            } => write!(f, "crop:pct:{x},{y},{width},{height}"),
            Crop::ToSquare => f.write_str("crop:square"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> Size {
        Size::new(200.0, 100.0)
    }

    #[test]
    fn test_by_pixels_validation() {
        assert!(Crop::by_pixels(0.0, 0.0, 10.0, 10.0).is_ok());
        assert!(Crop::by_pixels(-1.0, 0.0, 10.0, 10.0).is_err());
        assert!(Crop::by_pixels(0.0, 0.0, 0.0, 10.0).is_err());
        assert!(Crop::by_percent(0.0, 0.0, 0.5, f64::NAN).is_err());
    }

    #[test]
    fn test_square_is_centered() {
        let rect = Crop::ToSquare.rectangle(full(), ScaleConstraint::identity());
        assert_eq!(rect, Rectangle::new(50.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn test_square_at_reduction_factor() {
        let reduced = Size::new(100.0, 50.0);
        let rect = Crop::ToSquare.raster_rectangle(
            reduced,
            ReductionFactor(1),
            ScaleConstraint::identity(),
        );
        assert_eq!(rect, Rectangle::new(25.0, 0.0, 50.0, 50.0));
    }

    #[test]
    fn test_pixels_with_reduction_factor() {
        let crop = Crop::by_pixels(20.0, 20.0, 100.0, 60.0).unwrap();
        let rect = crop.raster_rectangle(
            Size::new(50.0, 25.0),
            ReductionFactor(2),
            ScaleConstraint::identity(),
        );
        assert_eq!(rect, Rectangle::new(5.0, 5.0, 25.0, 15.0));
    }

    #[test]
    fn test_pixels_with_scale_constraint() {
        // Client sees a 100x50 image; region 10,10,50,20 maps to 20,20,100,40.
        let crop = Crop::by_pixels(10.0, 10.0, 50.0, 20.0).unwrap();
        let sc = ScaleConstraint::new(1, 2).unwrap();
        assert_eq!(
            crop.rectangle(full(), sc),
            Rectangle::new(20.0, 20.0, 100.0, 40.0)
        );
    }

    #[test]
    fn test_clipped_to_bounds() {
        let crop = Crop::by_pixels(150.0, 50.0, 100.0, 100.0).unwrap();
        assert_eq!(
            crop.rectangle(full(), ScaleConstraint::identity()),
            Rectangle::new(150.0, 50.0, 50.0, 50.0)
        );
    }

    #[test]
    fn test_percent() {
        let crop = Crop::by_percent(0.2, 0.2, 0.5, 0.5).unwrap();
        assert_eq!(
            crop.rectangle(Size::new(64.0, 56.0), ScaleConstraint::identity())
                .to_int_tuple(),
            (13, 11, 32, 28)
        );
    }

    #[test]
    fn test_has_effect() {
        let sc = ScaleConstraint::identity();
        assert!(!Crop::by_pixels(0.0, 0.0, 200.0, 100.0)
            .unwrap()
            .has_effect(full(), sc));
        assert!(!Crop::by_pixels(0.0, 0.0, 500.0, 500.0)
            .unwrap()
            .has_effect(full(), sc));
        assert!(Crop::by_pixels(1.0, 0.0, 199.0, 100.0)
            .unwrap()
            .has_effect(full(), sc));
        assert!(Crop::ToSquare.has_effect(full(), sc));
        assert!(!Crop::ToSquare.has_effect(Size::new(50.0, 50.0), sc));
    }
}
