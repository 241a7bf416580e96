//! Pure time-delay elements.
//!
//! A `LagElement` spreads each incoming flux value across future steps
//! according to a normalized weight kernel, holding the pending partial
//! deliveries in a ring buffer. It is a `Stateful` element: the buffer slots
//! are its states, so snapshots and resets work like any other element.

use crate::error::{ElementError, ElementResult};
use crate::traits::{Element, Stateful};
use hf_core::{ensure_finite, nearly_equal, Real, StepSize, Tolerances};
use tracing::warn;

/// Normalized weighting kernel over a finite window of future steps.
///
/// `weights()[k]` is the fraction of an incoming pulse delivered `k` steps
/// after it arrives (index 0 = the same step). Conceptually the weights sum
/// to 1; the element renormalizes small drift and warns about it.
pub trait LagKernel: Send + Sync {
    fn weights(&self) -> Vec<Real>;
}

/// Half-triangular lag: delivery rate grows linearly until the lag time.
///
/// Cumulative delivery is `(t / lag_steps)^2`, so per-step weights are the
/// successive differences. Fractional lag lengths are fine; the window is
/// the ceiling. A non-positive `lag_steps` degenerates to same-step
/// delivery.
#[derive(Clone, Copy, Debug)]
pub struct TriangularKernel {
    pub lag_steps: Real,
}

impl LagKernel for TriangularKernel {
    fn weights(&self) -> Vec<Real> {
        let t = self.lag_steps.max(0.0);
        if t == 0.0 {
            return vec![1.0];
        }
        let window = t.ceil() as usize;
        let cumulative = |step: Real| -> Real {
            if step >= t {
                1.0
            } else {
                (step / t).powi(2)
            }
        };
        (0..window)
            .map(|i| cumulative((i + 1) as Real) - cumulative(i as Real))
            .collect()
    }
}

/// Uniform delivery after a fixed dead time.
///
/// `delay` steps of silence, then `1/length` per step for `length` steps.
#[derive(Clone, Copy, Debug)]
pub struct DelayedUniformKernel {
    pub delay: usize,
    pub length: usize,
}

impl LagKernel for DelayedUniformKernel {
    fn weights(&self) -> Vec<Real> {
        let length = self.length.max(1);
        let mut w = vec![0.0; self.delay + length];
        for slot in w.iter_mut().skip(self.delay) {
            *slot = 1.0 / length as Real;
        }
        w
    }
}

/// Validate a kernel's weights and normalize them to sum to 1.
///
/// Rejects empty windows, non-finite or negative weights, and all-zero
/// kernels. Normalization beyond rounding drift is logged, not silent.
pub fn normalized_weights(kernel: &dyn LagKernel, context: &str) -> ElementResult<Vec<Real>> {
    let mut weights = kernel.weights();
    if weights.is_empty() {
        return Err(ElementError::InvalidArg {
            what: "lag kernel must have a non-empty window",
        });
    }
    for w in &weights {
        ensure_finite(*w, "lag weight")?;
        if *w < 0.0 {
            return Err(ElementError::InvalidArg {
                what: "lag weights must be non-negative",
            });
        }
    }

    let sum: Real = weights.iter().sum();
    if sum <= 0.0 {
        return Err(ElementError::InvalidArg {
            what: "lag weights must not all be zero",
        });
    }
    let tol = Tolerances {
        abs: 1e-9,
        rel: 1e-9,
    };
    if !nearly_equal(sum, 1.0, tol) {
        warn!(%context, sum, "normalizing lag kernel weights");
        for w in &mut weights {
            *w /= sum;
        }
    }
    Ok(weights)
}

/// A state element representing pure time delay/spreading of one flux.
pub struct LagElement {
    id: String,
    flux: String,
    weights: Vec<Real>,
    /// Pending partial deliveries; index 0 is the current step.
    buffer: Vec<Real>,
}

impl LagElement {
    pub fn new(id: impl Into<String>, kernel: &dyn LagKernel, flux: impl Into<String>) -> ElementResult<Self> {
        let id = id.into();
        let weights = normalized_weights(kernel, &id)?;
        let window = weights.len();
        Ok(Self {
            id,
            flux: flux.into(),
            weights,
            buffer: vec![0.0; window],
        })
    }

    /// Window length in steps.
    pub fn window(&self) -> usize {
        self.weights.len()
    }

    /// Flush the buffered tail: the deliveries the element would emit if
    /// stepped with zero inflow until empty. The buffer is emptied.
    pub fn drain(&mut self) -> Vec<Real> {
        let tail_len = self.pending();
        let tail = self.buffer[..tail_len].to_vec();
        self.buffer.fill(0.0);
        tail
    }
}

impl Element for LagElement {
    fn id(&self) -> &str {
        &self.id
    }

    fn input_names(&self) -> Vec<&str> {
        vec![&self.flux]
    }

    fn output_names(&self) -> Vec<&str> {
        vec![&self.flux]
    }

    fn step(&mut self, _dt: StepSize, inputs: &[Real]) -> ElementResult<Vec<Real>> {
        if inputs.len() != 1 {
            return Err(ElementError::FluxArity {
                element: self.id.clone(),
                expected: 1,
                got: inputs.len(),
            });
        }
        let inflow = ensure_finite(inputs[0], "lag inflow")?;

        // Distribute the incoming pulse, emit the head, advance.
        for (slot, w) in self.buffer.iter_mut().zip(&self.weights) {
            *slot += w * inflow;
        }
        let out = self.buffer[0];
        self.buffer.rotate_left(1);
        if let Some(last) = self.buffer.last_mut() {
            *last = 0.0;
        }
        Ok(vec![out])
    }

    fn pending(&self) -> usize {
        self.buffer
            .iter()
            .rposition(|v| *v != 0.0)
            .map_or(0, |i| i + 1)
    }

    fn as_stateful(&self) -> Option<&dyn Stateful> {
        Some(self)
    }

    fn as_stateful_mut(&mut self) -> Option<&mut dyn Stateful> {
        Some(self)
    }
}

impl Stateful for LagElement {
    fn state_names(&self) -> Vec<String> {
        (0..self.buffer.len()).map(|i| format!("lag_{i}")).collect()
    }

    fn state(&self, name: &str) -> Option<Real> {
        let idx: usize = name.strip_prefix("lag_")?.parse().ok()?;
        self.buffer.get(idx).copied()
    }

    fn set_state(&mut self, name: &str, value: Real) -> ElementResult<()> {
        ensure_finite(value, "lag state")?;
        let idx = name
            .strip_prefix("lag_")
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|i| *i < self.buffer.len())
            .ok_or_else(|| ElementError::UnknownState {
                element: self.id.clone(),
                name: name.to_string(),
            })?;
        self.buffer[idx] = value;
        Ok(())
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn arbitrary_series_conserves_mass(
            inflows in prop::collection::vec(0.0_f64..100.0, 1..30),
            lag_steps in 0.5_f64..8.0,
        ) {
            let mut lag =
                LagElement::new("lag", &TriangularKernel { lag_steps }, "flow").unwrap();
            let dt = StepSize::new(1.0).unwrap();

            let mut total_out = 0.0;
            for inflow in &inflows {
                total_out += lag.step(dt, &[*inflow]).unwrap()[0];
            }
            total_out += lag.drain().iter().sum::<Real>();

            let total_in: Real = inflows.iter().sum();
            prop_assert!((total_out - total_in).abs() < 1e-9 * total_in.max(1.0));
        }
    }
}
