//! RC charging: first-tick current, discrete charging law, and the
//! initial-condition round trip.

use approx::assert_relative_eq;
use bf_components::{EffortSource, LinearDissipator, Origin, SelfCapacitance};
use bf_graph::Domain;
use bf_sim::Network;

const E: Domain = Domain::Electrical;
const TAU: f64 = 0.01;
const R: f64 = 120.0;
const U: f64 = 5.0;
const V0: f64 = 2.0;

fn rc_network(dt: f64) -> (Network, bf_core::ElemId, bf_core::ElemId) {
    let mut net = Network::new();
    let gnd = net.register_named_node(E, "gnd");
    let top = net.register_named_node(E, "top");
    let mid = net.register_named_node(E, "mid");

    let o = net
        .register_element(Origin::closed("gnd", E, 0.0).unwrap())
        .unwrap();
    net.connect_to(o, gnd).unwrap();
    let u = net
        .register_element(EffortSource::new("u", E, U).unwrap())
        .unwrap();
    net.connect_between(u, gnd, top).unwrap();
    let r = net
        .register_element(LinearDissipator::new("r", E, R).unwrap())
        .unwrap();
    net.connect_between(r, top, mid).unwrap();
    let c = net
        .register_element(SelfCapacitance::new("c", E, TAU, V0).unwrap())
        .unwrap();
    net.connect_to(c, mid).unwrap();

    net.set_step_time(dt).unwrap();
    (net, r, c)
}

#[test]
fn first_tick_current_is_exact() {
    let (mut net, r, _) = rc_network(1e-4);
    net.step().unwrap();
    assert!(net.is_calculation_finished());
    let flow = net.through_flow(r).unwrap();
    assert!((flow - (U - V0) / R).abs() < 1e-8);
}

#[test]
fn charging_follows_the_discrete_law() {
    let dt = 1e-4;
    let steps = 2000;
    let (mut net, _, c) = rc_network(dt);
    for _ in 0..steps {
        net.step().unwrap();
    }
    // One more prepare rotates the last staged state in.
    net.prepare_calculation().unwrap();

    // v' = v + (U - v) * dt / (R * tau), applied `steps` times.
    let mut expected = V0;
    for _ in 0..steps {
        expected += (U - expected) * dt / (R * TAU);
    }
    let state = net.element(c).as_self_capacitance().unwrap().state();
    assert_relative_eq!(state, expected, max_relative = 1e-9);
    assert!(state > V0 && state < U);
}

#[test]
fn initial_conditions_round_trip_through_json() {
    let dt = 1e-4;
    let (mut net, _, c) = rc_network(dt);
    for _ in 0..25 {
        net.step().unwrap();
    }
    net.prepare_calculation().unwrap();
    let saved = net.save_states();
    let json = serde_json::to_string(&saved).unwrap();

    let (mut restored, _, c2) = rc_network(dt);
    let records: Vec<bf_sim::StateRecord> = serde_json::from_str(&json).unwrap();
    restored.load_states(&records).unwrap();

    let v1 = net.element(c).as_self_capacitance().unwrap().state();
    let v2 = restored.element(c2).as_self_capacitance().unwrap().state();
    assert_eq!(v1.to_bits(), v2.to_bits());

    // Both continue identically.
    net.step().unwrap();
    restored.step().unwrap();
    net.prepare_calculation().unwrap();
    restored.prepare_calculation().unwrap();
    let v1 = net.element(c).as_self_capacitance().unwrap().state();
    let v2 = restored.element(c2).as_self_capacitance().unwrap().state();
    assert_eq!(v1.to_bits(), v2.to_bits());
}
