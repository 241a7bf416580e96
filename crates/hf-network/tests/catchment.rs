//! Integration tests for hf-network: multi-catchment routing scenarios.

use hf_core::{Real, StepSize};
use hf_elements::{
    BoundPolicy, Element, LinearReservoir, OdeElement, Parameter, ParameterSet, TriangularKernel,
};
use hf_network::{NetworkBuilder, Node, RunOptions, Unit};
use hf_numerics::{SchemeKind, SolverConfig};

fn reservoir(id: &str, k: Real) -> Box<dyn Element> {
    reservoir_with_handle(id, Parameter::new(k))
}

fn reservoir_with_handle(id: &str, k: Parameter) -> Box<dyn Element> {
    Box::new(
        OdeElement::new(
            id,
            Box::new(LinearReservoir::with_fluxes("rain", "runoff")),
            ParameterSet::from_handles(vec![("k", k)]),
            vec![0.0],
            SchemeKind::ImplicitEuler.build(),
            SolverConfig::default(),
            BoundPolicy::default(),
        )
        .unwrap(),
    )
}

fn single_unit_node(id: &str, k: Real, area: Real) -> Node {
    let unit = Unit::new("hru", vec![reservoir("res", k)]).unwrap();
    Node::new(id, vec![(unit, 1.0)], area).unwrap()
}

fn storm(n: usize) -> Vec<Real> {
    (0..n)
        .map(|t| match t {
            0..=2 => 5.0,
            3..=5 => 1.0,
            _ => 0.0,
        })
        .collect()
}

fn rain_forcing(n: usize) -> Vec<(String, Vec<Real>)> {
    vec![("rain".to_string(), storm(n))]
}

fn dt() -> StepSize {
    StepSize::new(1.0).unwrap()
}

#[test]
fn zero_delay_confluence_sums_upstream_outputs() {
    // a and b drain into d; all areas 1, so cumulative discharges reduce to
    // plain sums. d's reservoir has k = 0 and produces no local discharge.
    let mut b = NetworkBuilder::new();
    b.add_node(single_unit_node("a", 0.6, 1.0));
    b.add_node(single_unit_node("b", 0.2, 1.0));
    b.add_node(single_unit_node("d", 0.0, 1.0));
    b.add_edge("a", "d", None);
    b.add_edge("b", "d", None);
    let mut net = b.build().unwrap();

    let n = 10;
    for id in ["a", "b", "d"] {
        net.set_forcing(id, rain_forcing(n)).unwrap();
    }
    let out = net.run(dt(), &RunOptions::default()).unwrap();

    let qa = out.node_discharge("a").unwrap();
    let qb = out.node_discharge("b").unwrap();
    let qd = out.node_discharge("d").unwrap();
    let cum_d = net.cumulative_area("d").unwrap();
    for t in 0..n {
        // Routed inflow at d equals the sum of upstream outputs at t.
        let routed = qd[t] * cum_d;
        assert!(
            (routed - (qa[t] + qb[t])).abs() < 1e-12,
            "step {t}: routed {routed} vs {}",
            qa[t] + qb[t]
        );
    }
}

#[test]
fn omitting_a_unit_elsewhere_leaves_a_catchment_bit_identical() {
    let two_unit_node = |id: &str| {
        let fast = Unit::new("fast", vec![reservoir("res", 0.8)]).unwrap();
        let slow = Unit::new("slow", vec![reservoir("res", 0.1)]).unwrap();
        Node::new(id, vec![(fast, 0.4), (slow, 0.6)], 1.0).unwrap()
    };
    let one_unit_node = |id: &str| {
        let fast = Unit::new("fast", vec![reservoir("res", 0.8)]).unwrap();
        Node::new(id, vec![(fast, 1.0)], 1.0).unwrap()
    };

    let n = 12;
    let run = |other: Node| {
        let mut b = NetworkBuilder::new();
        b.add_node(two_unit_node("alpha"));
        b.add_node(other);
        let mut net = b.build().unwrap();
        net.set_forcing("alpha", rain_forcing(n)).unwrap();
        net.set_forcing("beta", rain_forcing(n)).unwrap();
        net.run(dt(), &RunOptions::default()).unwrap()
    };

    let full = run(two_unit_node("beta"));
    let reduced = run(one_unit_node("beta"));

    let alpha_full = full.node_discharge("alpha").unwrap();
    let alpha_reduced = reduced.node_discharge("alpha").unwrap();
    for (a, b) in alpha_full.iter().zip(alpha_reduced) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn identical_configurations_are_bit_reproducible() {
    let n = 15;
    let run = || {
        let mut b = NetworkBuilder::new();
        b.add_node(single_unit_node("up", 0.5, 2.0));
        b.add_node(single_unit_node("down", 0.3, 3.0));
        b.add_edge(
            "up",
            "down",
            Some(Box::new(TriangularKernel { lag_steps: 3.0 })),
        );
        let mut net = b.build().unwrap();
        net.set_forcing("up", rain_forcing(n)).unwrap();
        net.set_forcing("down", rain_forcing(n)).unwrap();
        net.run(dt(), &RunOptions::default()).unwrap()
    };

    let first = run();
    let second = run();
    for id in ["up", "down"] {
        let a = first.node_discharge(id).unwrap();
        let b = second.node_discharge(id).unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }
}

#[test]
fn shared_parameter_handle_reaches_every_referencing_element() {
    // Both catchments reference the same recession cell.
    let shared_k = Parameter::new(0.5);
    let node = |id: &str, k: Parameter| {
        let unit = Unit::new("hru", vec![reservoir_with_handle("res", k)]).unwrap();
        Node::new(id, vec![(unit, 1.0)], 1.0).unwrap()
    };

    let mut b = NetworkBuilder::new();
    b.add_node(node("a", shared_k.clone()));
    b.add_node(node("b", shared_k.clone()));
    let mut net = b.build().unwrap();

    let pa = net.parameter("a.hru.res.k").unwrap();
    let pb = net.parameter("b.hru.res.k").unwrap();
    assert!(pa.shares_cell(&pb));

    // One write through the registry is visible everywhere.
    pa.set(0.9);
    assert_eq!(pb.get(), 0.9);
    assert_eq!(shared_k.get(), 0.9);

    // And both catchments now produce identical discharge.
    let n = 8;
    net.set_forcing("a", rain_forcing(n)).unwrap();
    net.set_forcing("b", rain_forcing(n)).unwrap();
    let out = net.run(dt(), &RunOptions::default()).unwrap();
    let qa = out.node_discharge("a").unwrap();
    let qb = out.node_discharge("b").unwrap();
    for (x, y) in qa.iter().zip(qb) {
        assert_eq!(x.to_bits(), y.to_bits());
    }
}

#[test]
fn routed_run_conserves_water_volume() {
    // Zero-delay routing: every drop is either discharged at the outlet or
    // still sitting in a reservoir when the run ends.
    let areas = [("up", 2.0), ("down", 3.0)];
    let mut b = NetworkBuilder::new();
    b.add_node(single_unit_node("up", 0.4, areas[0].1));
    b.add_node(single_unit_node("down", 0.4, areas[1].1));
    b.add_edge("up", "down", None);
    let mut net = b.build().unwrap();

    let n = 6;
    net.set_forcing("up", rain_forcing(n)).unwrap();
    net.set_forcing("down", rain_forcing(n)).unwrap();
    let options = RunOptions {
        record_states: true,
        ..RunOptions::default()
    };
    let out = net.run(dt(), &options).unwrap();

    // Inflow volume: per-area rain times each catchment's own area.
    let total_area: Real = areas.iter().map(|(_, a)| a).sum();
    let volume_in: Real = storm(n).iter().sum::<Real>() * total_area * dt().get();

    // Outflow volume through the outlet, including the drained tail.
    let cum = net.cumulative_area("down").unwrap();
    let volume_out: Real = out
        .node_discharge("down")
        .unwrap()
        .iter()
        .chain(out.node_drained("down").unwrap())
        .map(|q| q * cum * dt().get())
        .sum();

    // Water still held in reservoir storage after the drain.
    let volume_stored: Real = out
        .final_states
        .iter()
        .map(|(path, storage)| {
            let node = path.split('.').next().unwrap();
            let area = areas.iter().find(|(id, _)| *id == node).unwrap().1;
            storage * area
        })
        .sum();

    assert!(
        (volume_in - volume_out - volume_stored).abs() < 1e-6 * volume_in,
        "in {volume_in}, out {volume_out}, stored {volume_stored}"
    );
}
