//! Fixed-point propagation sweep.

use bf_components::Element;
use bf_graph::NodeBank;

use crate::error::{SolverError, SolverResult};

/// Outcome of a sweep run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Every element reports finished.
    Finished,
    /// A pass ran without progress while elements remain unfinished.
    Stalled,
}

/// Iteration budget: generous enough that only a genuinely stuck
/// network exhausts it.
pub fn pass_budget(element_count: usize) -> usize {
    (10 * element_count).max(64)
}

/// Run `do_calc` over all elements until a pass makes no progress.
///
/// Each pass also lets the bank close dangling edges and mix phased
/// enthalpies, so node-level rules fire even when no element moved.
/// Correctness does not depend on element order; order only affects how
/// many passes a fixed point takes.
pub fn run_sweep(elements: &mut [Element], bank: &mut NodeBank) -> SolverResult<SweepOutcome> {
    let budget = pass_budget(elements.len());
    for pass in 0..budget {
        let revision_before = bank.revision();
        let mut element_progress = false;
        for element in elements.iter_mut() {
            element_progress |= element.do_calc(bank)?;
        }
        bank.close_dangling()?;
        bank.mix_phased()?;

        let progress = element_progress || bank.revision() != revision_before;
        if elements.iter().all(|e| e.finished(bank)) {
            tracing::debug!(passes = pass + 1, "sweep settled");
            return Ok(SweepOutcome::Finished);
        }
        if !progress {
            tracing::debug!(passes = pass + 1, "sweep stalled");
            return Ok(SweepOutcome::Stalled);
        }
    }
    Err(SolverError::SweepBudgetExceeded { passes: budget })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bf_components::{LinearDissipator, Origin, Port};
    use bf_graph::Domain;
    use bf_core::ElemId;

    #[test]
    fn rc_first_tick_settles_by_propagation() {
        // origin(0V) + effort source 5V -> top - R - mid - capacitance.
        // The capacitance pins the middle effort, so propagation alone
        // resolves the resistor current.
        use bf_components::{EffortSource, SelfCapacitance};

        let mut bank = NodeBank::new();
        let n_gnd = bank.add_node(Domain::Electrical, Some("gnd".into()));
        let n_top = bank.add_node(Domain::Electrical, Some("top".into()));
        let n_mid = bank.add_node(Domain::Electrical, Some("mid".into()));

        let mut elements = Vec::new();

        let mut gnd = Origin::closed("gnd", Domain::Electrical, 0.0).unwrap();
        let e = bank.connect(n_gnd, ElemId::from_index(0), Domain::Electrical).unwrap();
        gnd.attach(Port { node: n_gnd, edge: e }, &mut bank).unwrap();
        elements.push(Element::Origin(gnd));

        let mut src = EffortSource::new("u", Domain::Electrical, 5.0).unwrap();
        let e = bank.connect(n_gnd, ElemId::from_index(1), Domain::Electrical).unwrap();
        src.attach(Port { node: n_gnd, edge: e }, &mut bank).unwrap();
        let e = bank.connect(n_top, ElemId::from_index(1), Domain::Electrical).unwrap();
        src.attach(Port { node: n_top, edge: e }, &mut bank).unwrap();
        elements.push(Element::EffortSource(src));

        let mut r = LinearDissipator::new("r", Domain::Electrical, 120.0).unwrap();
        let e = bank.connect(n_top, ElemId::from_index(2), Domain::Electrical).unwrap();
        r.attach(Port { node: n_top, edge: e }, &mut bank).unwrap();
        let e = bank.connect(n_mid, ElemId::from_index(2), Domain::Electrical).unwrap();
        r.attach(Port { node: n_mid, edge: e }, &mut bank).unwrap();
        elements.push(Element::Dissipator(r));

        let mut cap = SelfCapacitance::new("c", Domain::Electrical, 0.01, 2.0).unwrap();
        cap.set_step_time(1e-4);
        let e = bank.connect(n_mid, ElemId::from_index(3), Domain::Electrical).unwrap();
        cap.attach(Port { node: n_mid, edge: e }, &mut bank).unwrap();
        elements.push(Element::SelfCapacitance(cap));

        let outcome = run_sweep(&mut elements, &mut bank).unwrap();
        assert_eq!(outcome, SweepOutcome::Finished);
        assert_eq!(bank.effort(n_top), Some(5.0));
        assert_eq!(bank.effort(n_mid), Some(2.0));
        // (5 - 2) / 120 into the capacitance
        let r_ports = elements[2].ports().to_vec();
        assert!((bank.flow(r_ports[1].node, r_ports[1].edge).unwrap() - 0.025).abs() < 1e-12);
        bank.validate_tick().unwrap();
    }
}
