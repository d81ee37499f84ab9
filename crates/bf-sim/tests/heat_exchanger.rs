//! Oil/water exchanger pair coupled through a thermal resistance:
//! step responses of the counterflow cooler scenario.

use std::sync::Arc;

use bf_core::ElemId;
use bf_components::{FlowSource, LinearDissipator, Origin, ThermalExchanger};
use bf_fluids::LinearTwoPhase;
use bf_graph::Domain;
use bf_sim::Network;

const P0: f64 = 2.0e5;

struct Side {
    exchanger: ElemId,
    pump: ElemId,
    supply: ElemId,
    cp: f64,
}

/// One circulation loop: open supply -> exchanger -> pump -> open drain,
/// with the exchanger's thermal surface exposed on `n_thermal`.
#[allow(clippy::too_many_arguments)]
fn build_side(
    net: &mut Network,
    name: &str,
    cp: f64,
    rho: f64,
    mdot: f64,
    inner_mass: f64,
    t_init: f64,
    t_in: f64,
    n_thermal: bf_core::NodeId,
) -> Side {
    let fluid = Arc::new(LinearTwoPhase::liquid(format!("{name}-fluid"), cp, rho).unwrap());
    let n_in = net.register_named_node(Domain::PhasedFluid, format!("{name}-in"));
    let n_out = net.register_named_node(Domain::PhasedFluid, format!("{name}-out"));
    let n_drain = net.register_named_node(Domain::PhasedFluid, format!("{name}-drain"));

    let mut supply = Origin::open(format!("{name}-supply"), Domain::PhasedFluid, P0).unwrap();
    supply.set_boundary_enthalpy(cp * t_in).unwrap();
    let supply = net.register_element(supply).unwrap();
    net.connect_to(supply, n_in).unwrap();

    let exchanger = net
        .register_element(
            ThermalExchanger::new(format!("{name}-hx"), fluid, inner_mass, cp * t_init).unwrap(),
        )
        .unwrap();
    net.connect_between(exchanger, n_in, n_out).unwrap();
    net.connect_to(exchanger, n_thermal).unwrap();

    let pump = net
        .register_element(FlowSource::new(format!("{name}-pump"), Domain::PhasedFluid, mdot).unwrap())
        .unwrap();
    // The pump draws from the exchanger outlet and feeds the drain.
    net.connect_between(pump, n_drain, n_out).unwrap();

    let drain = net
        .register_element(Origin::open(format!("{name}-drain"), Domain::PhasedFluid, P0).unwrap())
        .unwrap();
    net.connect_to(drain, n_drain).unwrap();

    Side {
        exchanger,
        pump,
        supply,
        cp,
    }
}

fn temperature(net: &Network, side: &Side) -> f64 {
    let hx = net.element(side.exchanger).as_exchanger().unwrap();
    hx.enthalpy() / side.cp
}

#[test]
fn oil_cooler_step_responses() {
    let mut net = Network::new();
    let n_t_oil = net.register_named_node(Domain::Thermal, "t-oil");
    let n_t_water = net.register_named_node(Domain::Thermal, "t-water");

    let oil = build_side(
        &mut net, "oil", 1600.0, 900.0, 0.1388, 75.0, 306.95, 393.15, n_t_oil,
    );
    let water = build_side(
        &mut net, "water", 4200.0, 1000.0, 0.1385, 100.0, 316.15, 283.15, n_t_water,
    );

    let coupling = net
        .register_element(LinearDissipator::new("coupling", Domain::Thermal, 0.005).unwrap())
        .unwrap();
    net.connect_between(coupling, n_t_oil, n_t_water).unwrap();

    net.set_step_time(1.0).unwrap();

    let run = |net: &mut Network, seconds: usize| {
        for _ in 0..seconds {
            net.step().unwrap();
        }
    };

    run(&mut net, 950);
    let t_oil_1 = temperature(&net, &oil);
    let t_water_1 = temperature(&net, &water);
    // Hot oil feed heats the oil mass; both inventories stay inside the
    // span of the boundary temperatures.
    assert!(t_oil_1 > 306.95 && t_oil_1 < 393.15);
    assert!(t_water_1 > 283.15 && t_water_1 < 393.15);
    // With the oil side far above the water side, heat crosses toward
    // the water.
    assert!(t_oil_1 > t_water_1);
    let q = net.through_flow(coupling).unwrap();
    assert!(q > 0.0);

    // +10% oil flow: more hot inflow, the oil inventory settles hotter.
    // The water inventory is still relaxing down from its warm start,
    // so it sits lower than before despite the stronger coupling.
    net.element_mut(oil.pump)
        .as_flow_source_mut()
        .unwrap()
        .set_flow(0.1388 * 1.1)
        .unwrap();
    run(&mut net, 3950);
    let t_oil_2 = temperature(&net, &oil);
    let t_water_2 = temperature(&net, &water);
    assert!(t_oil_2 > t_oil_1);
    assert!(t_water_2 < t_water_1);
    assert!(t_water_2 > 283.15);

    // +5 K on the oil inlet: the oil side warms again.
    net.element_mut(oil.supply)
        .as_origin_mut()
        .unwrap()
        .set_boundary_enthalpy(oil.cp * (393.15 + 5.0))
        .unwrap();
    run(&mut net, 3950);
    let t_oil_3 = temperature(&net, &oil);
    let t_water_3 = temperature(&net, &water);
    assert!(t_oil_3 > t_oil_2);
    assert!(t_water_3 > t_water_2);
}
