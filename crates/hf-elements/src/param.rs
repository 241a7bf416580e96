//! Shared parameter cells.
//!
//! A parameter is a single owned cell with any number of non-owning
//! references: cloning a `Parameter` handle shares the cell, so declaring a
//! parameter shared across elements (or across units) is just passing the
//! same handle to each constructor. Writes happen at configuration time;
//! stepping only reads, so the lock is uncontended during a run.

use crate::error::{ElementError, ElementResult};
use hf_core::{ensure_finite, Real};
use std::sync::{Arc, RwLock};

/// Cloneable handle to one named scalar parameter value.
#[derive(Clone, Debug)]
pub struct Parameter {
    cell: Arc<RwLock<Real>>,
}

impl Parameter {
    pub fn new(value: Real) -> Self {
        Self {
            cell: Arc::new(RwLock::new(value)),
        }
    }

    pub fn get(&self) -> Real {
        *self.cell.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set(&self, value: Real) {
        *self.cell.write().unwrap_or_else(|e| e.into_inner()) = value;
    }

    /// True if both handles reference the same cell.
    pub fn shares_cell(&self, other: &Parameter) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

/// Ordered name -> parameter map owned by one element.
#[derive(Clone, Debug, Default)]
pub struct ParameterSet {
    entries: Vec<(String, Parameter)>,
}

impl ParameterSet {
    /// Build from fresh values (each gets its own cell).
    pub fn from_values(pairs: &[(&str, Real)]) -> ElementResult<Self> {
        let mut set = Self::default();
        for (name, value) in pairs {
            ensure_finite(*value, "parameter value")?;
            set.entries.push((name.to_string(), Parameter::new(*value)));
        }
        Ok(set)
    }

    /// Build from existing handles (sharing their cells).
    pub fn from_handles(pairs: Vec<(&str, Parameter)>) -> Self {
        Self {
            entries: pairs
                .into_iter()
                .map(|(name, p)| (name.to_string(), p))
                .collect(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<Parameter> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.clone())
    }

    /// Snapshot values in the order given by `names`, so one step sees one
    /// consistent view even if a handle is written concurrently elsewhere.
    pub fn snapshot(&self, names: &[&str], element: &str) -> ElementResult<Vec<Real>> {
        names
            .iter()
            .map(|name| {
                self.get(name)
                    .map(|p| p.get())
                    .ok_or_else(|| ElementError::UnknownParameter {
                        element: element.to_string(),
                        name: name.to_string(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloned_handle_shares_writes() {
        let k = Parameter::new(0.5);
        let alias = k.clone();
        alias.set(0.8);
        assert_eq!(k.get(), 0.8);
        assert!(k.shares_cell(&alias));
    }

    #[test]
    fn independent_cells_do_not_alias() {
        let a = Parameter::new(1.0);
        let b = Parameter::new(1.0);
        b.set(2.0);
        assert_eq!(a.get(), 1.0);
        assert!(!a.shares_cell(&b));
    }

    #[test]
    fn snapshot_orders_by_requested_names() {
        let set = ParameterSet::from_values(&[("k", 0.5), ("alpha", 2.0)]).unwrap();
        let values = set.snapshot(&["alpha", "k"], "test").unwrap();
        assert_eq!(values, vec![2.0, 0.5]);
    }

    #[test]
    fn snapshot_reports_unknown_parameter() {
        let set = ParameterSet::from_values(&[("k", 0.5)]).unwrap();
        let err = set.snapshot(&["missing"], "res").unwrap_err();
        assert!(matches!(err, ElementError::UnknownParameter { .. }));
    }

    #[test]
    fn from_values_rejects_non_finite() {
        assert!(ParameterSet::from_values(&[("k", Real::NAN)]).is_err());
    }
}
