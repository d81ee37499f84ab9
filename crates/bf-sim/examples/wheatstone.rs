//! Solve the classical Wheatstone bridge and print the branch currents.
//!
//! Run with `cargo run -p bf-sim --example wheatstone`.

use bf_components::{EffortSource, LinearDissipator, Origin};
use bf_graph::Domain;
use bf_sim::Network;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    const E: Domain = Domain::Electrical;

    let mut net = Network::new();
    let t0 = net.register_named_node(E, "t0");
    let t1 = net.register_named_node(E, "t1");
    let a = net.register_named_node(E, "a");
    let b = net.register_named_node(E, "b");

    let gnd = net.register_element(Origin::closed("gnd", E, 0.0)?)?;
    net.connect_to(gnd, t0)?;
    let source = net.register_element(EffortSource::new("u", E, 10.0)?)?;
    net.connect_between(source, t0, t1)?;

    let arms = [
        ("r1", 40.0, t1, a),
        ("r2", 55.0, t1, b),
        ("r3", 60.0, a, t0),
        ("r4", 50.0, b, t0),
        ("r0", 45.0, a, b),
    ];
    let mut ids = Vec::new();
    for (name, r, n0, n1) in arms {
        let id = net.register_element(LinearDissipator::new(name, E, r)?)?;
        net.connect_between(id, n0, n1)?;
        ids.push((name, id));
    }

    net.recursive_simplification_setup();
    net.set_step_time(0.1)?;
    net.step()?;

    let current = net.through_flow(source).expect("solved");
    println!("source current: {current:.6} A");
    println!("total resistance: {:.4} ohm", 10.0 / current);
    for (name, id) in ids {
        println!("{name}: {:+.6} A", net.through_flow(id).expect("solved"));
    }
    Ok(())
}
