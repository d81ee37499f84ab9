//! Heated expanding vessel in a full network: liquid pass-through until
//! saturation, then expansion-driven mass ejection.

use std::sync::Arc;

use bf_components::{ExpandingExchanger, FlowSource, Origin};
use bf_fluids::{FluidProperties, LinearTwoPhase};
use bf_graph::Domain;
use bf_sim::Network;

#[test]
fn heated_vessel_ejects_more_than_it_takes_in() {
    let water = Arc::new(LinearTwoPhase::water_like());
    let p0 = 1.0e5;
    let h0 = 1.5e6; // warm liquid
    let volume = 1.0;
    let m0 = water.rho_liq(p0).unwrap() * volume;
    let feed_rate = 1.0;
    let dt = 0.1;

    let mut net = Network::new();
    let n_feed = net.register_named_node(Domain::PhasedFluid, "feed");
    let n_in = net.register_named_node(Domain::PhasedFluid, "inlet");
    let n_out = net.register_named_node(Domain::PhasedFluid, "outlet");
    let n_hot = net.register_named_node(Domain::Thermal, "hot-side");
    let n_amb = net.register_named_node(Domain::Thermal, "ambient");

    let mut feed = Origin::open("feed", Domain::PhasedFluid, p0).unwrap();
    feed.set_boundary_enthalpy(h0).unwrap();
    let feed = net.register_element(feed).unwrap();
    net.connect_to(feed, n_feed).unwrap();

    let pump = net
        .register_element(FlowSource::new("pump", Domain::PhasedFluid, feed_rate).unwrap())
        .unwrap();
    // Draws from the feed, pushes into the vessel inlet.
    net.connect_between(pump, n_in, n_feed).unwrap();

    let vessel = net
        .register_element(
            ExpandingExchanger::new("vessel", water.clone(), volume, m0, h0).unwrap(),
        )
        .unwrap();
    net.connect_between(vessel, n_in, n_out).unwrap();
    net.connect_to(vessel, n_hot).unwrap();

    let drain = net
        .register_element(Origin::open("drain", Domain::PhasedFluid, p0).unwrap())
        .unwrap();
    net.connect_to(drain, n_out).unwrap();

    // 5 MW of heating pushed into the vessel's thermal surface.
    let burner = net
        .register_element(FlowSource::new("burner", Domain::Thermal, 5.0e6).unwrap())
        .unwrap();
    net.connect_between(burner, n_hot, n_amb).unwrap();
    let amb = net
        .register_element(Origin::closed("ambient", Domain::Thermal, 300.0).unwrap())
        .unwrap();
    net.connect_to(amb, n_amb).unwrap();

    net.set_step_time(dt).unwrap();

    let mut saw_expansion = false;
    for _ in 0..200 {
        net.step().unwrap();
        assert!(net.is_calculation_finished());
        let inlet_flow = -net.port_flow(vessel, 0).unwrap();
        let outlet_flow = net.port_flow(vessel, 1).unwrap();
        assert!((inlet_flow - feed_rate).abs() < 1e-9);
        assert!(outlet_flow >= 0.0);
        if outlet_flow > feed_rate + 0.1 {
            saw_expansion = true;
            // Ejected mass carries the inner enthalpy of this tick.
            let hx = net.element(vessel).as_evaporator().unwrap();
            let h_out = net.port_heat(vessel, 1).unwrap();
            assert_eq!(h_out, hx.enthalpy());
        }
    }
    net.prepare_calculation().unwrap();

    let hx = net.element(vessel).as_evaporator().unwrap();
    // Heating won over the cooler feed, and once saturation was crossed
    // the falling mixture density squeezed mass out of the vessel.
    assert!(hx.enthalpy() > h0);
    assert!(
        hx.enthalpy() > water.h_liq_sat(p0).unwrap(),
        "vessel should have reached the two-phase region"
    );
    assert!(saw_expansion);
    assert!(hx.inner_mass() < m0);
}
