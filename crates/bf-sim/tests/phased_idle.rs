//! Idle phased-fluid network: everything at 300 K, zero flow sources.
//! Ten ticks later nothing has moved and nothing has warmed or cooled.

use std::sync::Arc;

use bf_components::{FlowSource, SteamReservoir};
use bf_fluids::LinearTwoPhase;
use bf_graph::Domain;
use bf_sim::Network;

#[test]
fn idle_network_holds_300_kelvin() {
    let water = Arc::new(LinearTwoPhase::liquid("water", 4200.0, 1000.0).unwrap());
    let h0 = 300.0 * 4200.0; // 1 260 000 J/kg
    let p0 = 1.0e5;

    let mut net = Network::new();
    let n_a = net.register_named_node(Domain::PhasedFluid, "a");
    let n_b = net.register_named_node(Domain::PhasedFluid, "b");

    let tank_a = net
        .register_element(SteamReservoir::new("tank_a", water.clone(), p0, 400.0, h0).unwrap())
        .unwrap();
    net.connect_to(tank_a, n_a).unwrap();

    let pump = net
        .register_element(FlowSource::new("pump", Domain::PhasedFluid, 0.0).unwrap())
        .unwrap();
    net.connect_between(pump, n_b, n_a).unwrap();

    let tank_b = net
        .register_element(SteamReservoir::new("tank_b", water.clone(), p0, 250.0, h0).unwrap())
        .unwrap();
    net.connect_to(tank_b, n_b).unwrap();

    net.set_step_time(0.5).unwrap();

    for _ in 0..10 {
        net.step().unwrap();
        assert!(net.is_calculation_finished());
        for elem in [pump] {
            assert!(net.port_flow(elem, 0).unwrap().abs() < 1e-8);
            assert!(net.port_flow(elem, 1).unwrap().abs() < 1e-8);
        }
    }
    net.prepare_calculation().unwrap();

    for (name, mass) in [("tank_a", 400.0), ("tank_b", 250.0)] {
        let tank = net.element_by_name(name).unwrap().as_reservoir().unwrap();
        let t = tank.temperature().unwrap();
        assert!((t - 300.0).abs() < 1e-8, "{name} at {t} K");
        assert!((tank.inner_mass() - mass).abs() < 1e-12);
        // The staged enthalpy is the old one, bit for bit.
        assert_eq!(tank.enthalpy().to_bits(), h0.to_bits());
    }
}
