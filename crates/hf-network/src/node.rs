//! Area-weighted unit combination.
//!
//! A `Node` is one catchment: a set of units sharing the same forcing, each
//! covering a fraction of the catchment area. Units are independent, so a
//! node's output is just the weighted sum of its units' outputs, and one
//! catchment can omit units present elsewhere without affecting any other
//! node.

use crate::error::{ConfigError, ConfigResult};
use crate::unit::Unit;
use hf_core::{Real, StepSize};
use hf_elements::{ElementError, ElementResult};
#[cfg(feature = "parallel-units")]
use rayon::prelude::*;

pub struct Node {
    id: String,
    units: Vec<Unit>,
    weights: Vec<Real>,
    area: Real,
    /// Extra flux series added to the node's first output per step, for
    /// inflows not produced by any unit (reservoir releases, imports).
    direct_input: Option<Vec<Real>>,
}

impl Node {
    /// Build a node from `(unit, weight)` pairs and the catchment's own
    /// (non-cumulative) area. Weights are fractional areas and must be
    /// positive; every unit must expose the same input and output fluxes.
    pub fn new(
        id: impl Into<String>,
        units: Vec<(Unit, Real)>,
        area: Real,
    ) -> ConfigResult<Self> {
        let id = id.into();
        if units.is_empty() {
            return Err(ConfigError::EmptyNode { node: id });
        }
        if !area.is_finite() || area <= 0.0 {
            return Err(ConfigError::BadArea {
                node: id,
                value: area,
            });
        }

        let (units, weights): (Vec<Unit>, Vec<Real>) = units.into_iter().unzip();
        for (unit, weight) in units.iter().zip(&weights) {
            if !weight.is_finite() || *weight <= 0.0 {
                return Err(ConfigError::BadWeight {
                    node: id,
                    unit: unit.id().to_string(),
                    value: *weight,
                });
            }
        }
        for unit in &units[1..] {
            if unit.input_names() != units[0].input_names()
                || unit.output_names() != units[0].output_names()
            {
                return Err(ConfigError::FluxMismatch {
                    context: format!("node '{}', unit '{}'", id, unit.id()),
                    expected: units[0].output_names().iter().map(|s| s.to_string()).collect(),
                    got: unit.output_names().iter().map(|s| s.to_string()).collect(),
                });
            }
        }

        Ok(Self {
            id,
            units,
            weights,
            area,
            direct_input: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn area(&self) -> Real {
        self.area
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.units[0].input_names()
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.units[0].output_names()
    }

    pub fn set_direct_input(&mut self, series: Vec<Real>) {
        self.direct_input = Some(series);
    }

    pub fn direct_input_len(&self) -> Option<usize> {
        self.direct_input.as_ref().map(|s| s.len())
    }

    /// Step every unit with the same forcing and combine outputs as the
    /// weighted sum. `t` indexes the direct-input series if one is set;
    /// steps beyond its end contribute nothing.
    pub fn step(&mut self, dt: StepSize, inputs: &[Real], t: usize) -> ElementResult<Vec<Real>> {
        #[cfg(feature = "parallel-units")]
        let per_unit: Vec<Vec<Real>> = self
            .units
            .par_iter_mut()
            .map(|unit| unit.step(dt, inputs))
            .collect::<Result<_, ElementError>>()?;
        #[cfg(not(feature = "parallel-units"))]
        let per_unit: Vec<Vec<Real>> = self
            .units
            .iter_mut()
            .map(|unit| unit.step(dt, inputs))
            .collect::<Result<_, ElementError>>()?;

        // Sequential reduction keeps the summation order fixed, so the
        // parallel feature cannot change results.
        let arity = per_unit[0].len();
        let mut combined = vec![0.0; arity];
        for (outputs, weight) in per_unit.iter().zip(&self.weights) {
            for (acc, value) in combined.iter_mut().zip(outputs) {
                *acc += weight * value;
            }
        }

        if let Some(series) = &self.direct_input {
            if let Some(extra) = series.get(t) {
                combined[0] += extra;
            }
        }
        Ok(combined)
    }

    pub fn pending(&self) -> usize {
        self.units.iter().map(|u| u.pending()).max().unwrap_or(0)
    }

    pub fn unit(&self, id: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.id() == id)
    }

    pub fn unit_mut(&mut self, id: &str) -> Option<&mut Unit> {
        self.units.iter_mut().find(|u| u.id() == id)
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn reset(&mut self) {
        for unit in &mut self.units {
            unit.reset();
        }
    }
}
