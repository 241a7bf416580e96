use crate::CoreError;

/// Floating point type used throughout the engine
pub type Real = f64;

/// Absolute/relative tolerance pair for float comparisons.
///
/// The absolute part handles comparisons near zero where a relative test
/// degenerates; the relative part scales with the larger magnitude.
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    diff <= tol.abs.max(tol.rel * a.abs().max(b.abs()))
}

/// Pass `v` through unchanged, or fail if it is NaN or infinite.
///
/// Used at the seams where fluxes and states cross between layers, so a
/// non-finite value is caught with a name attached instead of propagating
/// silently through the arithmetic.
pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Time-step size shared by every element of a simulation run.
///
/// The constructor is the single place where the "positive and finite"
/// invariant is enforced, so downstream code can take the value on faith.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepSize(Real);

impl StepSize {
    pub fn new(dt: Real) -> Result<Self, CoreError> {
        ensure_finite(dt, "step size")?;
        if dt <= 0.0 {
            return Err(CoreError::InvalidArg {
                what: "step size must be positive",
            });
        }
        Ok(Self(dt))
    }

    pub fn get(self) -> Real {
        self.0
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn nearly_equal_is_reflexive(v in -1e12_f64..1e12_f64) {
            prop_assert!(nearly_equal(v, v, Tolerances::default()));
        }

        #[test]
        fn step_size_accepts_any_positive(dt in 1e-12_f64..1e6_f64) {
            let s = StepSize::new(dt).unwrap();
            prop_assert_eq!(s.get(), dt);
        }
    }
}
