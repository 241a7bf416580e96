//! Element pipelines.
//!
//! A `Unit` is an ordered chain of elements representing one hydrological
//! response unit: each element's outputs feed the next element's inputs,
//! synchronously within the step. Wiring is validated by flux name when the
//! unit is built, so a running unit never sees an arity or name mismatch.

use crate::error::{ConfigError, ConfigResult};
use hf_core::{Real, StepSize};
use hf_elements::{Element, ElementResult};

pub struct Unit {
    id: String,
    elements: Vec<Box<dyn Element>>,
}

impl std::fmt::Debug for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unit")
            .field("id", &self.id)
            .field("elements", &self.elements.iter().map(|e| e.id()).collect::<Vec<_>>())
            .finish()
    }
}

impl Unit {
    /// Build a pipeline, checking that each element's output fluxes match
    /// the next element's input fluxes exactly (names and order).
    pub fn new(id: impl Into<String>, elements: Vec<Box<dyn Element>>) -> ConfigResult<Self> {
        let id = id.into();
        if elements.is_empty() {
            return Err(ConfigError::EmptyUnit { unit: id });
        }
        for pair in elements.windows(2) {
            let produced = pair[0].output_names();
            let expected = pair[1].input_names();
            if produced != expected {
                return Err(ConfigError::FluxMismatch {
                    context: format!(
                        "unit '{}', between '{}' and '{}'",
                        id,
                        pair[0].id(),
                        pair[1].id()
                    ),
                    expected: expected.iter().map(|s| s.to_string()).collect(),
                    got: produced.iter().map(|s| s.to_string()).collect(),
                });
            }
        }
        Ok(Self { id, elements })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.elements[0].input_names()
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.elements[self.elements.len() - 1].output_names()
    }

    /// Advance every element one step in order, feeding fluxes forward.
    /// Returns the last element's outputs.
    pub fn step(&mut self, dt: StepSize, inputs: &[Real]) -> ElementResult<Vec<Real>> {
        let mut fluxes = inputs.to_vec();
        for element in &mut self.elements {
            fluxes = element.step(dt, &fluxes)?;
        }
        Ok(fluxes)
    }

    /// Longest remaining lag window over the pipeline's elements.
    pub fn pending(&self) -> usize {
        self.elements.iter().map(|e| e.pending()).max().unwrap_or(0)
    }

    pub fn element(&self, id: &str) -> Option<&dyn Element> {
        self.elements
            .iter()
            .find(|e| e.id() == id)
            .map(|e| e.as_ref())
    }

    pub fn element_mut(&mut self, id: &str) -> Option<&mut (dyn Element + '_)> {
        self.elements
            .iter_mut()
            .find(|e| e.id() == id)
            .map(|e| &mut **e as &mut dyn Element)
    }

    pub fn elements(&self) -> impl Iterator<Item = &dyn Element> {
        self.elements.iter().map(|e| e.as_ref())
    }

    /// Restore every stateful element to its initial state.
    pub fn reset(&mut self) {
        for element in &mut self.elements {
            if let Some(stateful) = element.as_stateful_mut() {
                stateful.reset();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_elements::{
        BoundPolicy, LagElement, LinearReservoir, OdeElement, ParameterSet, TriangularKernel,
    };
    use hf_numerics::{SchemeKind, SolverConfig};

    fn reservoir(id: &str, input: &str, output: &str, k: Real) -> Box<dyn Element> {
        Box::new(
            OdeElement::new(
                id,
                Box::new(LinearReservoir::with_fluxes(input, output)),
                ParameterSet::from_values(&[("k", k)]).unwrap(),
                vec![0.0],
                SchemeKind::ImplicitEuler.build(),
                SolverConfig::default(),
                BoundPolicy::default(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn mismatched_fluxes_are_rejected_at_build() {
        let err = Unit::new(
            "hru",
            vec![
                reservoir("fast", "rain", "q_fast", 0.5),
                reservoir("slow", "q_other", "q_slow", 0.1),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::FluxMismatch { .. }));
    }

    #[test]
    fn empty_unit_is_rejected() {
        assert!(matches!(
            Unit::new("hru", vec![]),
            Err(ConfigError::EmptyUnit { .. })
        ));
    }

    #[test]
    fn pipeline_feeds_fluxes_forward() {
        let mut unit = Unit::new(
            "hru",
            vec![
                reservoir("upper", "rain", "perc", 0.5),
                reservoir("lower", "perc", "runoff", 0.2),
            ],
        )
        .unwrap();

        assert_eq!(unit.input_names(), vec!["rain"]);
        assert_eq!(unit.output_names(), vec!["runoff"]);

        // Route the same forcing through the two reservoirs by hand.
        let dt = StepSize::new(1.0).unwrap();
        let mut upper = reservoir("upper", "rain", "perc", 0.5);
        let mut lower = reservoir("lower", "perc", "runoff", 0.2);
        for p in [4.0, 0.0, 2.5] {
            let got = unit.step(dt, &[p]).unwrap()[0];
            let perc = upper.step(dt, &[p]).unwrap()[0];
            let want = lower.step(dt, &[perc]).unwrap()[0];
            assert_eq!(got.to_bits(), want.to_bits());
        }
    }

    #[test]
    fn closed_run_conserves_mass() {
        let mut unit = Unit::new("hru", vec![reservoir("res", "rain", "runoff", 0.4)]).unwrap();
        let dt = StepSize::new(0.5).unwrap();

        let forcing = [3.0, 1.0, 0.0, 2.0, 0.0, 0.0, 0.0];
        let mut total_in = 0.0;
        let mut total_out = 0.0;
        for p in forcing {
            total_in += p * dt.get();
            total_out += unit.step(dt, &[p]).unwrap()[0] * dt.get();
        }

        let stored = unit
            .element("res")
            .unwrap()
            .as_stateful()
            .unwrap()
            .state("storage")
            .unwrap();
        assert!((total_in - total_out - stored).abs() < 1e-8);
    }

    #[test]
    fn pending_tracks_the_longest_lag() {
        let mut unit = Unit::new(
            "hru",
            vec![
                reservoir("res", "rain", "runoff", 0.4),
                Box::new(
                    LagElement::new("lag", &TriangularKernel { lag_steps: 4.0 }, "runoff")
                        .unwrap(),
                ),
            ],
        )
        .unwrap();

        assert_eq!(unit.pending(), 0);
        unit.step(StepSize::new(1.0).unwrap(), &[1.0]).unwrap();
        assert!(unit.pending() > 0);

        unit.reset();
        assert_eq!(unit.pending(), 0);
    }
}
