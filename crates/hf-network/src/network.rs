//! Topologically-ordered routing of node discharges.
//!
//! Provides:
//! - `NetworkBuilder`: incremental construction, then `build()` validates
//!   and freezes the topology (unknown/duplicate nodes, cycles, single
//!   downstream per node, routing kernels) and precomputes topological
//!   order and cumulative upstream areas
//! - `Network`: the run driver; steps nodes in topological order, carries
//!   discharge volumes across edges (optionally through a lag kernel), and
//!   records per-node discharge series
//!
//! Discharge accounting follows catchment convention: a node's reported
//! discharge is the area-weighted discharge of its whole upstream
//! catchment, so routed volumes are `discharge x cumulative_area` and the
//! receiving node renormalizes by its own cumulative area.

use std::collections::HashMap;

use crate::error::{ConfigError, ConfigResult, NetworkError, NetworkResult};
use crate::node::Node;
use crate::registry::{Path, Registry};
use hf_core::{Real, StepSize};
use hf_elements::{normalized_weights, ElementError, LagKernel, Parameter};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One routing link with its delivery schedule.
///
/// `buffer[k]` is the volume due at the downstream node `k` steps from now.
/// Zero-delay edges have the single weight `[1.0]` and an always-empty
/// buffer.
struct RouteEdge {
    dst: usize,
    weights: Vec<Real>,
    buffer: Vec<Real>,
}

impl RouteEdge {
    /// Pop the volume due this step and advance the schedule.
    fn deliver(&mut self) -> Real {
        let due = self.buffer[0];
        self.buffer.rotate_left(1);
        if let Some(last) = self.buffer.last_mut() {
            *last = 0.0;
        }
        due
    }

    /// Schedule an upstream volume; returns the same-step fraction.
    fn push(&mut self, volume: Real) -> Real {
        for (slot, w) in self.buffer.iter_mut().zip(self.weights.iter().skip(1)) {
            *slot += w * volume;
        }
        self.weights[0] * volume
    }

    fn pending(&self) -> usize {
        self.buffer
            .iter()
            .rposition(|v| *v != 0.0)
            .map_or(0, |i| i + 1)
    }
}

/// Builder for constructing a routing network incrementally.
///
/// Use `add_node` and `add_edge` to declare the topology, then call
/// `build()` to validate and freeze it into a `Network`.
#[derive(Default)]
pub struct NetworkBuilder {
    nodes: Vec<Node>,
    edges: Vec<(String, String, Option<Box<dyn LagKernel>>)>,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> &mut Self {
        self.nodes.push(node);
        self
    }

    /// Link `upstream` into `downstream`. With no kernel the edge delivers
    /// within the same step; with a kernel the volume is spread over the
    /// kernel's window.
    pub fn add_edge(
        &mut self,
        upstream: impl Into<String>,
        downstream: impl Into<String>,
        kernel: Option<Box<dyn LagKernel>>,
    ) -> &mut Self {
        self.edges.push((upstream.into(), downstream.into(), kernel));
        self
    }

    /// Validate and freeze the topology.
    pub fn build(self) -> ConfigResult<Network> {
        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if index.insert(node.id().to_string(), i).is_some() {
                return Err(ConfigError::DuplicateNode(node.id().to_string()));
            }
            // Routing carries one discharge flux per node.
            if node.output_names().len() != 1 {
                return Err(ConfigError::FluxMismatch {
                    context: format!("node '{}' must produce exactly one discharge flux", node.id()),
                    expected: node
                        .output_names()
                        .first()
                        .map(|s| s.to_string())
                        .into_iter()
                        .collect(),
                    got: node.output_names().iter().map(|s| s.to_string()).collect(),
                });
            }
        }

        let mut graph = DiGraph::<usize, usize>::new();
        let petgraph_ids: Vec<_> = (0..self.nodes.len()).map(|i| graph.add_node(i)).collect();

        let mut edges = Vec::with_capacity(self.edges.len());
        let mut out_edges: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (edge_idx, (up, down, kernel)) in self.edges.into_iter().enumerate() {
            let src = *index
                .get(&up)
                .ok_or_else(|| ConfigError::UnknownNode(up.clone()))?;
            let dst = *index
                .get(&down)
                .ok_or_else(|| ConfigError::UnknownNode(down.clone()))?;
            graph.add_edge(petgraph_ids[src], petgraph_ids[dst], edge_idx);

            let weights = match kernel {
                Some(kernel) => normalized_weights(kernel.as_ref(), &format!("{up}->{down}"))
                    .map_err(|source| ConfigError::BadKernel {
                        edge: format!("{up}->{down}"),
                        source,
                    })?,
                None => vec![1.0],
            };
            let window = weights.len();
            out_edges[src].push(edge_idx);
            edges.push(RouteEdge {
                dst,
                weights,
                buffer: vec![0.0; window],
            });
        }

        // Each node drains to at most one downstream node, so cumulative
        // areas never double count.
        for (i, outs) in out_edges.iter().enumerate() {
            if outs.len() > 1 {
                return Err(ConfigError::MultipleDownstream(self.nodes[i].id().to_string()));
            }
        }

        let topo: Vec<usize> = toposort(&graph, None)
            .map_err(|cycle| {
                let i = graph[cycle.node_id()];
                ConfigError::Cycle(self.nodes[i].id().to_string())
            })?
            .into_iter()
            .map(|ix| graph[ix])
            .collect();

        // Walking in topological order, each node's finished cumulative
        // area is folded into its single downstream node.
        let mut cumulative_area: Vec<Real> = self.nodes.iter().map(|n| n.area()).collect();
        for &i in &topo {
            if let Some(&e) = out_edges[i].first() {
                let dst = edges[e].dst;
                cumulative_area[dst] += cumulative_area[i];
            }
        }

        debug!(
            nodes = self.nodes.len(),
            edges = edges.len(),
            "network topology frozen"
        );
        let registry = Registry::build(&self.nodes);
        let forcing = vec![None; self.nodes.len()];
        Ok(Network {
            nodes: self.nodes,
            index,
            topo,
            cumulative_area,
            edges,
            out_edges,
            forcing,
            registry,
        })
    }
}

/// Options controlling a `Network::run`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RunOptions {
    /// Extend the run with zero forcing by the longest lag window still
    /// pending when the forcing ends, reporting the tail separately.
    pub auto_drain: bool,
    /// Include a final state snapshot in the output.
    pub record_states: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            auto_drain: true,
            record_states: false,
        }
    }
}

/// Results of a run. Discharge series are in node declaration order and
/// have one value per forcing step; drained tails hold deliveries that fell
/// past the end of the forcing window.
#[derive(Clone, Debug, Default)]
pub struct RunOutput {
    pub discharge: Vec<(String, Vec<Real>)>,
    pub drained: Vec<(String, Vec<Real>)>,
    pub final_states: Vec<(String, Real)>,
}

impl RunOutput {
    pub fn node_discharge(&self, id: &str) -> Option<&[Real]> {
        self.discharge
            .iter()
            .find(|(n, _)| n == id)
            .map(|(_, s)| s.as_slice())
    }

    pub fn node_drained(&self, id: &str) -> Option<&[Real]> {
        self.drained
            .iter()
            .find(|(n, _)| n == id)
            .map(|(_, s)| s.as_slice())
    }
}

/// A frozen, runnable routing topology.
pub struct Network {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    topo: Vec<usize>,
    cumulative_area: Vec<Real>,
    edges: Vec<RouteEdge>,
    out_edges: Vec<Vec<usize>>,
    /// Per node: one series per input flux, in input order.
    forcing: Vec<Option<Vec<Vec<Real>>>>,
    registry: Registry,
}

impl Network {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.index.get(id).copied().map(move |i| &mut self.nodes[i])
    }

    /// Total catchment area drained through `id`.
    pub fn cumulative_area(&self, id: &str) -> Option<Real> {
        self.index.get(id).map(|&i| self.cumulative_area[i])
    }

    /// Assign named forcing series to a node. Names must cover the node's
    /// input fluxes exactly (any order); series must have equal lengths.
    pub fn set_forcing(
        &mut self,
        node_id: &str,
        series: Vec<(String, Vec<Real>)>,
    ) -> NetworkResult<()> {
        let idx = *self
            .index
            .get(node_id)
            .ok_or_else(|| ConfigError::UnknownNode(node_id.to_string()))?;
        let expected: Vec<String> = self.nodes[idx]
            .input_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mismatch = || ConfigError::FluxMismatch {
            context: format!("forcing for node '{node_id}'"),
            expected: expected.clone(),
            got: series.iter().map(|(n, _)| n.clone()).collect(),
        };
        if series.len() != expected.len() {
            return Err(mismatch().into());
        }
        let mut ordered = Vec::with_capacity(expected.len());
        for name in &expected {
            let pos = series
                .iter()
                .position(|(n, _)| n == name)
                .ok_or_else(mismatch)?;
            ordered.push(series[pos].1.clone());
        }

        if let Some(first) = ordered.first() {
            let len = first.len();
            for (name, s) in expected.iter().zip(&ordered) {
                if s.len() != len {
                    return Err(ConfigError::LengthMismatch {
                        name: format!("{node_id}.{name}"),
                        expected: len,
                        got: s.len(),
                    }
                    .into());
                }
            }
        }
        self.forcing[idx] = Some(ordered);
        Ok(())
    }

    /// Longest remaining lag window over all elements and routing edges.
    pub fn pending(&self) -> usize {
        let nodes = self.nodes.iter().map(|n| n.pending()).max().unwrap_or(0);
        let edges = self.edges.iter().map(|e| e.pending()).max().unwrap_or(0);
        nodes.max(edges)
    }

    /// Restore every element's initial state and clear routing buffers.
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.reset();
        }
        for edge in &mut self.edges {
            edge.buffer.fill(0.0);
        }
    }

    /// Execute a run over the full forcing window.
    ///
    /// Nodes are stepped in topological order so same-step routed volumes
    /// are always available. An element failure aborts the run with
    /// `NetworkError::AtStep`, carrying everything recorded so far.
    pub fn run(&mut self, dt: StepSize, options: &RunOptions) -> NetworkResult<RunOutput> {
        let n = self.forcing_window()?;
        debug!(steps = n, auto_drain = options.auto_drain, "starting run");

        let mut main: Vec<Vec<Real>> =
            (0..self.nodes.len()).map(|_| Vec::with_capacity(n)).collect();
        let mut tail: Vec<Vec<Real>> = vec![Vec::new(); self.nodes.len()];

        for t in 0..n {
            match self.step_once(dt, t) {
                Ok(discharge) => {
                    for (series, q) in main.iter_mut().zip(&discharge) {
                        series.push(*q);
                    }
                }
                Err((node, source)) => {
                    return Err(self.abort(t, node, source, main, tail, options));
                }
            }
        }

        if options.auto_drain {
            let extension = self.pending();
            if extension > 0 {
                debug!(extension, "draining lag tails");
            }
            for k in 0..extension {
                let t = n + k;
                match self.step_once(dt, t) {
                    Ok(discharge) => {
                        for (series, q) in tail.iter_mut().zip(&discharge) {
                            series.push(*q);
                        }
                    }
                    Err((node, source)) => {
                        return Err(self.abort(t, node, source, main, tail, options));
                    }
                }
            }
        }

        Ok(self.assemble(main, tail, options))
    }

    /// Determine the run length and check forcing consistency.
    fn forcing_window(&self) -> NetworkResult<usize> {
        let mut n: Option<usize> = None;
        let mut check = |name: String, len: usize| -> NetworkResult<()> {
            match n {
                None => {
                    n = Some(len);
                    Ok(())
                }
                Some(expected) if expected == len => Ok(()),
                Some(expected) => Err(ConfigError::LengthMismatch {
                    name,
                    expected,
                    got: len,
                }
                .into()),
            }
        };

        for (i, node) in self.nodes.iter().enumerate() {
            match &self.forcing[i] {
                Some(series) => {
                    let len = series.first().map_or(0, |s| s.len());
                    check(format!("{}.forcing", node.id()), len)?;
                }
                None if !node.input_names().is_empty() => {
                    return Err(NetworkError::MissingForcing {
                        node: node.id().to_string(),
                    });
                }
                None => {}
            }
            if let Some(len) = node.direct_input_len() {
                check(format!("{}.direct_input", node.id()), len)?;
            }
        }
        Ok(n.unwrap_or(0))
    }

    /// Advance every node one step in topological order; returns discharge
    /// per node in declaration order.
    fn step_once(
        &mut self,
        dt: StepSize,
        t: usize,
    ) -> Result<Vec<Real>, (String, ElementError)> {
        let Self {
            nodes,
            topo,
            cumulative_area,
            edges,
            out_edges,
            forcing,
            ..
        } = self;

        // Volumes scheduled by earlier steps arrive first.
        let mut routed = vec![0.0; nodes.len()];
        for edge in edges.iter_mut() {
            routed[edge.dst] += edge.deliver();
        }

        let mut discharge = vec![0.0; nodes.len()];
        for &i in topo.iter() {
            let inputs: Vec<Real> = match &forcing[i] {
                Some(series) => series
                    .iter()
                    .map(|s| s.get(t).copied().unwrap_or(0.0))
                    .collect(),
                None => Vec::new(),
            };
            let local = match nodes[i].step(dt, &inputs, t) {
                Ok(outputs) => outputs,
                Err(e) => return Err((nodes[i].id().to_string(), e)),
            };

            let q = (local[0] * nodes[i].area() + routed[i]) / cumulative_area[i];
            discharge[i] = q;

            // Pass the full upstream-catchment volume downstream.
            let volume = q * cumulative_area[i];
            for &e in &out_edges[i] {
                let edge = &mut edges[e];
                routed[edge.dst] += edge.push(volume);
            }
        }
        Ok(discharge)
    }

    fn abort(
        &self,
        step: usize,
        node: String,
        source: ElementError,
        main: Vec<Vec<Real>>,
        tail: Vec<Vec<Real>>,
        options: &RunOptions,
    ) -> NetworkError {
        NetworkError::AtStep {
            step,
            node,
            source,
            partial: Box::new(self.assemble(main, tail, options)),
        }
    }

    fn assemble(
        &self,
        main: Vec<Vec<Real>>,
        tail: Vec<Vec<Real>>,
        options: &RunOptions,
    ) -> RunOutput {
        let names = |series: Vec<Vec<Real>>| {
            self.nodes
                .iter()
                .zip(series)
                .map(|(node, s)| (node.id().to_string(), s))
                .collect()
        };
        RunOutput {
            discharge: names(main),
            drained: names(tail),
            final_states: if options.record_states {
                self.state_snapshot()
            } else {
                Vec::new()
            },
        }
    }

    /// Current value of every element state, by dot path.
    pub fn state_snapshot(&self) -> Vec<(String, Real)> {
        let mut snapshot = Vec::new();
        for node in &self.nodes {
            for unit in node.units() {
                for element in unit.elements() {
                    let Some(stateful) = element.as_stateful() else {
                        continue;
                    };
                    for name in stateful.state_names() {
                        if let Some(value) = stateful.state(&name) {
                            let path =
                                format!("{}.{}.{}.{}", node.id(), unit.id(), element.id(), name);
                            snapshot.push((path, value));
                        }
                    }
                }
            }
        }
        snapshot
    }

    /// All registered parameter paths.
    pub fn parameters(&self) -> impl Iterator<Item = &str> {
        self.registry.parameter_paths()
    }

    /// Shared-cell handle for a parameter path.
    pub fn parameter(&self, path: &str) -> Option<Parameter> {
        self.registry.parameter(path)
    }

    /// Read one element state by dot path.
    pub fn state(&self, path: &str) -> NetworkResult<Real> {
        let p = Path::parse(path)?;
        let unknown = || NetworkError::Config(ConfigError::UnknownPath(path.to_string()));
        self.node(p.node)
            .and_then(|node| node.unit(p.unit))
            .and_then(|unit| unit.element(p.element))
            .and_then(|el| el.as_stateful())
            .and_then(|s| s.state(p.leaf))
            .ok_or_else(unknown)
    }

    /// Overwrite one element state by dot path (configuration phase).
    pub fn set_state(&mut self, path: &str, value: Real) -> NetworkResult<()> {
        let p = Path::parse(path)?;
        let idx = *self
            .index
            .get(p.node)
            .ok_or_else(|| ConfigError::UnknownPath(path.to_string()))?;
        let stateful = self.nodes[idx]
            .unit_mut(p.unit)
            .and_then(|unit| unit.element_mut(p.element))
            .and_then(|el| el.as_stateful_mut())
            .ok_or_else(|| ConfigError::UnknownPath(path.to_string()))?;
        stateful.set_state(p.leaf, value)?;
        Ok(())
    }
}
