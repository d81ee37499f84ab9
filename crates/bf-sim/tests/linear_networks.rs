//! Linear end-to-end scenarios: bridge, superposition, and an
//! irreducible mesh with bridged and open branches.

use bf_core::ElemId;
use bf_components::{EffortSource, LinearDissipator, Origin};
use bf_graph::Domain;
use bf_sim::Network;

const E: Domain = Domain::Electrical;

struct Bridge {
    net: Network,
    source: ElemId,
}

/// Classical Wheatstone bridge: 10 V source between t0 and t1, arms
/// 40/55 up top, 60/50 down low, 45 across.
fn wheatstone(reversed_registration: bool) -> Bridge {
    let mut net = Network::new();
    let t0 = net.register_named_node(E, "t0");
    let t1 = net.register_named_node(E, "t1");
    let a = net.register_named_node(E, "a");
    let b = net.register_named_node(E, "b");

    let mut builders: Vec<(bf_components::Element, (bf_core::NodeId, Option<bf_core::NodeId>))> = vec![
        (
            Origin::closed("gnd", E, 0.0).unwrap().into(),
            (t0, None),
        ),
        (
            EffortSource::new("u", E, 10.0).unwrap().into(),
            (t0, Some(t1)),
        ),
        (
            LinearDissipator::new("r1", E, 40.0).unwrap().into(),
            (t1, Some(a)),
        ),
        (
            LinearDissipator::new("r2", E, 55.0).unwrap().into(),
            (t1, Some(b)),
        ),
        (
            LinearDissipator::new("r3", E, 60.0).unwrap().into(),
            (a, Some(t0)),
        ),
        (
            LinearDissipator::new("r4", E, 50.0).unwrap().into(),
            (b, Some(t0)),
        ),
        (
            LinearDissipator::new("r0", E, 45.0).unwrap().into(),
            (a, Some(b)),
        ),
    ];
    if reversed_registration {
        builders.reverse();
    }

    let mut source = None;
    for (element, (n0, n1)) in builders {
        let is_source = element.name() == "u";
        let id = net.register_element(element).unwrap();
        match n1 {
            Some(n1) => net.connect_between(id, n0, n1).unwrap(),
            None => net.connect_to(id, n0).unwrap(),
        }
        if is_source {
            source = Some(id);
        }
    }
    net.recursive_simplification_setup();
    net.set_step_time(0.1).unwrap();
    Bridge {
        net,
        source: source.unwrap(),
    }
}

#[test]
fn wheatstone_bridge_total_resistance() {
    let mut bridge = wheatstone(false);
    bridge.net.step().unwrap();
    assert!(bridge.net.is_calculation_finished());

    let current = bridge.net.through_flow(bridge.source).unwrap();
    assert!((current - 0.197).abs() < 0.001);
    // Total resistance seen by the source.
    assert!((10.0 / current - 50.8).abs() < 0.05);
}

#[test]
fn wheatstone_is_schedule_order_independent() {
    let mut forward = wheatstone(false);
    forward.net.step().unwrap();
    let mut backward = wheatstone(true);
    backward.net.step().unwrap();

    let i_fwd = forward.net.through_flow(forward.source).unwrap();
    let i_bwd = backward.net.through_flow(backward.source).unwrap();
    assert!((i_fwd - i_bwd).abs() < 1e-10);

    for name in ["r0", "r1", "r2", "r3", "r4"] {
        let f = forward.net.element_by_name(name).unwrap();
        let b = backward.net.element_by_name(name).unwrap();
        let nf = forward.net.bank();
        let nb = backward.net.bank();
        let flow_f = nf.flow(f.ports()[0].node, f.ports()[0].edge).unwrap();
        let flow_b = nb.flow(b.ports()[0].node, b.ports()[0].edge).unwrap();
        assert!((flow_f - flow_b).abs() < 1e-10, "{name}");
    }
}

#[test]
fn two_source_superposition() {
    let mut net = Network::new();
    let n0 = net.register_named_node(E, "n0");
    let n1 = net.register_named_node(E, "n1");
    let n2 = net.register_named_node(E, "n2");
    let n3 = net.register_named_node(E, "n3");

    let gnd = net
        .register_element(Origin::closed("gnd", E, 0.0).unwrap())
        .unwrap();
    net.connect_to(gnd, n0).unwrap();
    let u0 = net
        .register_element(EffortSource::new("u0", E, 15.0).unwrap())
        .unwrap();
    net.connect_between(u0, n0, n1).unwrap();
    let u1 = net
        .register_element(EffortSource::new("u1", E, 10.0).unwrap())
        .unwrap();
    net.connect_between(u1, n0, n3).unwrap();
    let r0 = net
        .register_element(LinearDissipator::new("r0", E, 200.0).unwrap())
        .unwrap();
    net.connect_between(r0, n1, n2).unwrap();
    let r1 = net
        .register_element(LinearDissipator::new("r1", E, 50.0).unwrap())
        .unwrap();
    net.connect_between(r1, n3, n2).unwrap();
    let r2 = net
        .register_element(LinearDissipator::new("r2", E, 100.0).unwrap())
        .unwrap();
    net.connect_between(r2, n2, n0).unwrap();

    net.super_position_setup();
    net.set_step_time(0.1).unwrap();
    net.step().unwrap();
    assert!(net.is_calculation_finished());

    let flow_r2 = net.through_flow(r2).unwrap();
    assert!((flow_r2 - 0.0785).abs() < 0.0001);
    assert!((net.effort(n2).unwrap() - 55.0 / 7.0).abs() < 1e-8);
    assert!((net.effort(n1).unwrap() - 15.0).abs() < 1e-8);
    assert!((net.effort(n3).unwrap() - 10.0).abs() < 1e-8);
}

#[test]
fn isolated_ring_collapses_beside_a_driven_loop() {
    use bf_core::{Warning, WarningKind};
    use std::sync::{Arc, Mutex};

    let mut net = Network::new();
    let gnd = net.register_named_node(E, "gnd");
    let top = net.register_named_node(E, "top");
    let i1 = net.register_named_node(E, "i1");
    let i2 = net.register_named_node(E, "i2");
    let i3 = net.register_named_node(E, "i3");

    let seen: Arc<Mutex<Vec<Warning>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    net.set_reporter(Some(Box::new(move |w: &Warning| {
        sink.lock().unwrap().push(w.clone());
    })));

    let o = net
        .register_element(Origin::closed("gnd", E, 0.0).unwrap())
        .unwrap();
    net.connect_to(o, gnd).unwrap();
    let u = net
        .register_element(EffortSource::new("u", E, 3.0).unwrap())
        .unwrap();
    net.connect_between(u, gnd, top).unwrap();
    let r = net
        .register_element(LinearDissipator::new("r", E, 6.0).unwrap())
        .unwrap();
    net.connect_between(r, top, gnd).unwrap();

    // A resistor triangle with no anchor and no source.
    let ra = net
        .register_element(LinearDissipator::new("ra", E, 10.0).unwrap())
        .unwrap();
    net.connect_between(ra, i1, i2).unwrap();
    let rb = net
        .register_element(LinearDissipator::new("rb", E, 20.0).unwrap())
        .unwrap();
    net.connect_between(rb, i2, i3).unwrap();
    let rc = net
        .register_element(LinearDissipator::new("rc", E, 30.0).unwrap())
        .unwrap();
    net.connect_between(rc, i3, i1).unwrap();

    net.recursive_simplification_setup();
    net.set_step_time(0.1).unwrap();
    net.step().unwrap();
    assert!(net.is_calculation_finished());

    // The driven loop carries its current; the ring carries nothing and
    // collapses onto zero effort.
    assert!((net.through_flow(r).unwrap() - 0.5).abs() < 1e-12);
    for node in [i1, i2, i3] {
        assert_eq!(net.effort(node), Some(0.0));
    }
    for elem in [ra, rb, rc] {
        assert_eq!(net.through_flow(elem), Some(0.0));
    }
    assert!(seen
        .lock()
        .unwrap()
        .iter()
        .any(|w| w.kind == WarningKind::IsolatedRing));
}

#[test]
fn unarmed_source_stalls_until_armed() {
    let mut net = Network::new();
    let n0 = net.register_named_node(Domain::Thermal, "cold");
    let n1 = net.register_named_node(Domain::Thermal, "hot");

    let gnd = net
        .register_element(Origin::closed("gnd", Domain::Thermal, 280.0).unwrap())
        .unwrap();
    net.connect_to(gnd, n0).unwrap();
    let bridge = net
        .register_element(EffortSource::unarmed("bridge", Domain::Thermal))
        .unwrap();
    net.connect_between(bridge, n0, n1).unwrap();
    let r = net
        .register_element(LinearDissipator::new("r", Domain::Thermal, 2.0).unwrap())
        .unwrap();
    net.connect_between(r, n1, n0).unwrap();

    net.recursive_simplification_setup();
    net.set_step_time(0.1).unwrap();

    // Without a value the source keeps the whole loop waiting.
    net.prepare_calculation().unwrap();
    assert!(!net.do_calculation().unwrap());
    assert!(!net.is_calculation_finished());

    // The owning model supplies the bridge value mid-tick.
    net.element_mut(bridge)
        .as_effort_source_mut()
        .unwrap()
        .set_effort(40.0)
        .unwrap();
    assert!(net.do_calculation().unwrap());
    assert!(net.is_calculation_finished());
    assert_eq!(net.effort(n1), Some(320.0));
    assert!((net.through_flow(r).unwrap() - 20.0).abs() < 1e-9);
}

/// Twelve dissipators around a star center, with one bridged and three
/// open branches: the bridged node rides at the source voltage, the
/// node behind the opens sits at the origin potential with zero flow.
#[test]
fn mesh_with_bridges_and_opens() {
    let mut net = Network::new();
    let t0 = net.register_named_node(E, "t0");
    let t1 = net.register_named_node(E, "t1");
    let c = net.register_named_node(E, "c");
    let m1 = net.register_named_node(E, "m1");
    let m5 = net.register_named_node(E, "m5");
    let m6 = net.register_named_node(E, "m6");
    let m7 = net.register_named_node(E, "m7");

    let gnd = net
        .register_element(Origin::closed("gnd", E, 0.0).unwrap())
        .unwrap();
    net.connect_to(gnd, t0).unwrap();
    let u = net
        .register_element(EffortSource::new("u", E, 10.0).unwrap())
        .unwrap();
    net.connect_between(u, t0, t1).unwrap();

    let mut dissipator = |net: &mut Network, name: &str, r: Option<f64>, bridged: bool| {
        let d = match r {
            Some(r) => LinearDissipator::new(name, E, r).unwrap(),
            None if bridged => LinearDissipator::bridged(name, E),
            None => LinearDissipator::open(name, E),
        };
        net.register_element(d).unwrap()
    };

    let d1 = dissipator(&mut net, "d1", Some(50.0), false);
    net.connect_between(d1, c, m1).unwrap();
    let d2 = dissipator(&mut net, "d2", Some(60.0), false);
    net.connect_between(d2, c, m5).unwrap();
    let d3 = dissipator(&mut net, "d3", Some(70.0), false);
    net.connect_between(d3, c, m6).unwrap();
    let d4 = dissipator(&mut net, "d4", None, false); // open
    net.connect_between(d4, c, m7).unwrap();

    let d5 = dissipator(&mut net, "d5", Some(100.0), false);
    net.connect_between(d5, m1, t1).unwrap();
    let d6 = dissipator(&mut net, "d6", Some(150.0), false);
    net.connect_between(d6, m1, t0).unwrap();
    let d7 = dissipator(&mut net, "d7", Some(90.0), false);
    net.connect_between(d7, m5, t1).unwrap();
    let d8 = dissipator(&mut net, "d8", Some(130.0), false);
    net.connect_between(d8, m5, t0).unwrap();
    let d9 = dissipator(&mut net, "d9", None, true); // bridged
    net.connect_between(d9, m6, t1).unwrap();
    let d10 = dissipator(&mut net, "d10", Some(170.0), false);
    net.connect_between(d10, m6, t0).unwrap();
    let d11 = dissipator(&mut net, "d11", None, false); // open
    net.connect_between(d11, m7, t1).unwrap();
    let d12 = dissipator(&mut net, "d12", Some(140.0), false);
    net.connect_between(d12, m7, t0).unwrap();

    net.recursive_simplification_setup();
    net.set_step_time(0.1).unwrap();
    net.step().unwrap();
    assert!(net.is_calculation_finished());

    // Bridged branch pins its node at the source voltage.
    assert!((net.effort(m6).unwrap() - 10.0).abs() < 1e-12);
    // The node behind the opens carries nothing and sits on the origin
    // potential.
    assert!(net.effort(m7).unwrap().abs() < 1e-12);
    for open in [d4, d11] {
        assert!(net.port_flow(open, 0).unwrap().abs() < 1e-12);
        assert!(net.port_flow(open, 1).unwrap().abs() < 1e-12);
    }
    assert!(net.through_flow(d12).unwrap().abs() < 1e-12);

    // The interior balances: current into the center leaves the center.
    let f1 = net.through_flow(d1).unwrap();
    let f2 = net.through_flow(d2).unwrap();
    let f3 = net.through_flow(d3).unwrap();
    assert!((f1 + f2 + f3).abs() < 1e-9);
}
