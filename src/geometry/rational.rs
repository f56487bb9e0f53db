// src/geometry/rational.rs

use crate::error::{IiifError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exact fraction used for scale constraints.
#[derive(Clone, Copy, Debug, Eq, Serialize, Deserialize)]
pub struct Rational {
    numerator: i64,
    denominator: i64,
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

impl Rational {
    pub fn new(numerator: i64, denominator: i64) -> Result<Self> {
        if denominator == 0 {
            return Err(IiifError::arithmetic(format!(
                "rational {numerator}/0 has a zero denominator"
            )));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    pub const fn one() -> Self {
        Self {
            numerator: 1,
            denominator: 1,
        }
    }

    pub fn numerator(&self) -> i64 {
        self.numerator
    }

    pub fn denominator(&self) -> i64 {
        self.denominator
    }

    /// Lowest terms, with the sign carried on the numerator.
    pub fn reduced(&self) -> Self {
        let divisor = gcd(self.numerator, self.denominator).max(1);
        let sign = if self.denominator < 0 { -1 } else { 1 };
        Self {
            numerator: sign * self.numerator / divisor,
            denominator: sign * self.denominator / divisor,
        }
    }

    pub fn to_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    pub fn is_one(&self) -> bool {
        self.numerator == self.denominator
    }
}

impl PartialEq for Rational {
    fn eq(&self, other: &Self) -> bool {
        (self.numerator as i128) * (other.denominator as i128)
            == (other.numerator as i128) * (self.denominator as i128)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.numerator, self.denominator)
    }
}

/// A virtual, policy-imposed maximum resolution: the identifier is served as
/// if the full image were `rational` times its real size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleConstraint {
    rational: Rational,
}

impl ScaleConstraint {
    pub fn new(numerator: i64, denominator: i64) -> Result<Self> {
        let rational = Rational::new(numerator, denominator)?;
        if numerator <= 0 || denominator < 0 {
            return Err(IiifError::invalid_argument(
                "scale constraint",
                rational.to_string(),
                "numerator and denominator must be positive",
            ));
        }
        if numerator > denominator {
            return Err(IiifError::invalid_argument(
                "scale constraint",
                rational.to_string(),
                "numerator must not be greater than the denominator",
            ));
        }
        Ok(Self { rational })
    }

    pub const fn identity() -> Self {
        Self {
            rational: Rational::one(),
        }
    }

    pub fn rational(&self) -> Rational {
        self.rational
    }

    pub fn to_f64(&self) -> f64 {
        self.rational.to_f64()
    }

    pub fn has_effect(&self) -> bool {
        !self.rational.is_one()
    }

    /// The virtual full size a client sees.
    pub fn constrained_size(&self, full: super::Size) -> super::Size {
        full.scaled(self.to_f64())
    }

    /// Parses `n:d`.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || {
            IiifError::invalid_argument(
                "scale constraint",
                value.to_string(),
                "expected the form numerator:denominator",
            )
        };
        let (n, d) = value.split_once(':').ok_or_else(invalid)?;
        let n: i64 = n.trim().parse().map_err(|_| invalid())?;
        let d: i64 = d.trim().parse().map_err(|_| invalid())?;
        if d == 0 {
            return Err(invalid());
        }
        Self::new(n, d)
    }
}

impl Default for ScaleConstraint {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Display for ScaleConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.rational.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn test_zero_denominator_is_arithmetic_error() {
        let err = Rational::new(3, 0).unwrap_err();
        assert!(matches!(err, IiifError::Arithmetic { .. }));
        assert_eq!(err.category(), ErrorCategory::InternalBug);
    }

    #[test]
    fn test_reduced() {
        let r = Rational::new(6, 8).unwrap().reduced();
        assert_eq!((r.numerator(), r.denominator()), (3, 4));
        let r = Rational::new(2, -4).unwrap().reduced();
        assert_eq!((r.numerator(), r.denominator()), (-1, 2));
    }

    #[test]
    fn test_equality_by_value() {
        assert_eq!(Rational::new(1, 2).unwrap(), Rational::new(2, 4).unwrap());
        assert_ne!(Rational::new(1, 2).unwrap(), Rational::new(1, 3).unwrap());
    }

    #[test]
    fn test_scale_constraint_has_effect() {
        assert!(!ScaleConstraint::new(2, 2).unwrap().has_effect());
        assert!(ScaleConstraint::new(1, 2).unwrap().has_effect());
    }

    #[test]
    fn test_scale_constraint_rejects_upscaling() {
        assert!(ScaleConstraint::new(3, 2).is_err());
        assert!(ScaleConstraint::new(0, 2).is_err());
    }

    #[test]
    fn test_scale_constraint_parse() {
        let sc = ScaleConstraint::parse("1:4").unwrap();
        assert_eq!(sc.to_f64(), 0.25);
        assert_eq!(sc.to_string(), "1:4");
        assert!(ScaleConstraint::parse("1:0").is_err());
        assert!(ScaleConstraint::parse("half").is_err());
    }
}
