//! This module defines the unit types used for scenario quantities and costs.
//!
//! The optimisation itself works on plain `f64` coefficients; these types keep the inputs and the
//! reported cost breakdowns from being mixed up.
use serde::{Deserialize, Serialize};

macro_rules! unit_struct {
    ($name:ident) => {
        /// Represents a type of quantity.
        #[derive(
            Debug,
            Clone,
            Copy,
            Default,
            PartialEq,
            PartialOrd,
            derive_more::Add,
            derive_more::Sub,
            derive_more::Display,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub f64);

        impl $name {
            /// Creates a new instance of the unit type from a f64 value.
            pub fn new(val: f64) -> Self {
                Self(val)
            }

            /// Returns the value of the unit type as a f64.
            pub fn value(self) -> f64 {
                self.0
            }

            /// Whether the value is finite and not negative
            pub fn is_non_negative(self) -> bool {
                self.0.is_finite() && self.0 >= 0.0
            }
        }

        impl std::ops::Mul<Dimensionless> for $name {
            type Output = $name;
            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::iter::Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                $name(iter.map(|x| x.0).sum())
            }
        }
    };
}

macro_rules! impl_mul {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Mul<$Rhs> for $Lhs {
            type Output = $Out;
            fn mul(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 * rhs.0)
            }
        }
        impl std::ops::Mul<$Lhs> for $Rhs {
            type Output = $Out;
            fn mul(self, lhs: $Lhs) -> $Out {
                <$Out>::new(self.0 * lhs.0)
            }
        }
    };
}

/// Represents a dimensionless quantity, such as a content fraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dimensionless(pub f64);

impl Dimensionless {
    /// Whether the value lies within `[0, 1]`
    pub fn is_fraction(self) -> bool {
        (0.0..=1.0).contains(&self.0)
    }
}

impl From<f64> for Dimensionless {
    fn from(val: f64) -> Self {
        Self(val)
    }
}

impl From<Dimensionless> for f64 {
    fn from(val: Dimensionless) -> Self {
        val.0
    }
}

// Base quantities
unit_struct!(Mass);
unit_struct!(Money);

// Derived quantities
unit_struct!(MoneyPerMass);

// Multiplication rules
impl_mul!(MoneyPerMass, Mass, Money);

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_cost_of_mass() {
        let cost = MoneyPerMass::new(8.5) * Mass::new(20.0);
        assert_approx_eq!(f64, cost.value(), 170.0);
        assert_eq!(Mass::new(2.0) * MoneyPerMass::new(3.0), Money::new(6.0));
    }

    #[test]
    fn test_sum_and_scale() {
        let total: Money = [Money::new(1.0), Money::new(2.5)].into_iter().sum();
        assert_eq!(total, Money::new(3.5));
        assert_eq!(Money::new(10.0) * Dimensionless(0.5), Money::new(5.0));
    }

    #[test]
    fn test_validity_checks() {
        assert!(Mass::new(0.0).is_non_negative());
        assert!(!Mass::new(-1.0).is_non_negative());
        assert!(!Mass::new(f64::NAN).is_non_negative());
        assert!(Dimensionless(0.18).is_fraction());
        assert!(!Dimensionless(1.5).is_fraction());
    }
}
