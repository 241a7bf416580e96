//! Hierarchical introspection paths.
//!
//! Every tunable value in a built network is addressable by the stable
//! dot-path `node.unit.element.name`. Parameter paths resolve to shared
//! cell handles collected once at build time; state paths are dispatched
//! through the ownership chain on demand, so there is no reflection and no
//! stale copy of mutable state.

use crate::error::{ConfigError, ConfigResult};
use crate::node::Node;
use hf_elements::Parameter;

/// Parameter path table built at `NetworkBuilder::build`.
///
/// Two paths may resolve to the same underlying cell when elements share a
/// parameter; writing through either is equivalent.
pub struct Registry {
    parameters: Vec<(String, Parameter)>,
}

impl Registry {
    pub(crate) fn build(nodes: &[Node]) -> Self {
        let mut parameters = Vec::new();
        for node in nodes {
            for unit in node.units() {
                for element in unit.elements() {
                    let Some(parameterized) = element.as_parameterized() else {
                        continue;
                    };
                    for name in parameterized.parameter_names() {
                        if let Some(handle) = parameterized.parameter(name) {
                            let path =
                                format!("{}.{}.{}.{}", node.id(), unit.id(), element.id(), name);
                            parameters.push((path, handle));
                        }
                    }
                }
            }
        }
        Self { parameters }
    }

    /// All parameter paths, in node/unit/element declaration order.
    pub fn parameter_paths(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|(path, _)| path.as_str())
    }

    /// Handle to the cell behind `path`, if the path exists.
    pub fn parameter(&self, path: &str) -> Option<Parameter> {
        self.parameters
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, handle)| handle.clone())
    }
}

/// A `node.unit.element.leaf` path split into its segments.
pub(crate) struct Path<'a> {
    pub node: &'a str,
    pub unit: &'a str,
    pub element: &'a str,
    pub leaf: &'a str,
}

impl<'a> Path<'a> {
    pub fn parse(path: &'a str) -> ConfigResult<Self> {
        let mut parts = path.splitn(4, '.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(node), Some(unit), Some(element), Some(leaf))
                if !node.is_empty() && !unit.is_empty() && !element.is_empty() && !leaf.is_empty() =>
            {
                Ok(Self {
                    node,
                    unit,
                    element,
                    leaf,
                })
            }
            _ => Err(ConfigError::UnknownPath(path.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_splits_into_four_segments() {
        let p = Path::parse("basin.hru1.fast.k").unwrap();
        assert_eq!(p.node, "basin");
        assert_eq!(p.unit, "hru1");
        assert_eq!(p.element, "fast");
        assert_eq!(p.leaf, "k");
    }

    #[test]
    fn short_or_empty_paths_are_rejected() {
        assert!(Path::parse("basin.hru1.fast").is_err());
        assert!(Path::parse("basin..fast.k").is_err());
        assert!(Path::parse("").is_err());
    }
}
