// src/geometry/reduction.rs

use super::DELTA;
use std::fmt;

/// Number of times a raster's dimensions have already been halved by a
/// multi-resolution decoder, relative to the full-resolution source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReductionFactor(pub u8);

impl ReductionFactor {
    pub fn new(factor: u8) -> Self {
        Self(factor)
    }

    pub fn factor(&self) -> u8 {
        self.0
    }

    /// 2^-factor
    pub fn scale(&self) -> f64 {
        0.5f64.powi(self.0 as i32)
    }

    /// Largest factor (up to `max_factor`) whose scale still covers `scale`,
    /// so a decoder never hands back fewer pixels than the request needs.
    pub fn for_scale(scale: f64, max_factor: u8) -> Self {
        let mut factor = 0u8;
        let mut next = 0.5;
        while scale <= next + DELTA && factor < max_factor {
            next /= 2.0;
            factor += 1;
        }
        Self(factor)
    }
}

impl fmt::Display for ReductionFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale() {
        assert_eq!(ReductionFactor(0).scale(), 1.0);
        assert_eq!(ReductionFactor(2).scale(), 0.25);
    }

    #[test]
    fn test_for_scale() {
        assert_eq!(ReductionFactor::for_scale(1.0, 5), ReductionFactor(0));
        assert_eq!(ReductionFactor::for_scale(0.75, 5), ReductionFactor(0));
        assert_eq!(ReductionFactor::for_scale(0.5, 5), ReductionFactor(1));
        assert_eq!(ReductionFactor::for_scale(0.3, 5), ReductionFactor(1));
        assert_eq!(ReductionFactor::for_scale(0.2, 5), ReductionFactor(2));
        assert_eq!(ReductionFactor::for_scale(0.01, 3), ReductionFactor(3));
    }
}
