//! Shared plumbing for element kinds.

use bf_core::{NodeId, Real};
use bf_graph::NodeBank;

use crate::error::{ElementError, ElementResult};

/// One connection of an element: the node and the edge index the value
/// channel handed out when the port was attached.
#[derive(Debug, Clone, Copy)]
pub struct Port {
    pub node: NodeId,
    pub edge: usize,
}

/// Integrator state of a storage element.
///
/// `state` is the value the element presents during the running tick;
/// the staged successor only becomes visible after the next `prepare`
/// rotation, so mid-tick readers never observe a half-advanced state.
#[derive(Debug, Clone)]
pub struct StorageState {
    pub state: Real,
    next: Real,
    staged: bool,
    delta_done: bool,
    /// Integration time constant in seconds.
    pub tau: Real,
}

impl StorageState {
    pub fn new(initial: Real, tau: Real) -> Self {
        Self {
            state: initial,
            next: initial,
            staged: false,
            delta_done: false,
            tau,
        }
    }

    /// Rotate the staged state in; called from `prepare`.
    pub fn rotate(&mut self) {
        if self.staged {
            self.state = self.next;
            self.staged = false;
        }
        self.delta_done = false;
    }

    /// Forward-Euler step: stage `state + delta / tau`.
    pub fn integrate(&mut self, delta: Real) {
        self.stage(self.state + delta / self.tau);
    }

    /// Stage an explicitly computed successor state.
    pub fn stage(&mut self, next: Real) {
        self.next = next;
        self.staged = true;
        self.delta_done = true;
    }

    pub fn delta_done(&self) -> bool {
        self.delta_done
    }

    /// Overwrite the state outside a tick (initial conditions).
    pub fn reset_to(&mut self, value: Real) {
        self.state = value;
        self.next = value;
        self.staged = false;
        self.delta_done = false;
    }
}

/// Through-flow of a two-port element, positive entering port 0 and
/// leaving port 1, derived from whichever edge is already known.
pub fn through_flow(bank: &NodeBank, p0: Port, p1: Port) -> Option<Real> {
    if let Some(f0) = bank.flow(p0.node, p0.edge) {
        return Some(-f0);
    }
    bank.flow(p1.node, p1.edge)
}

/// Complete the second edge of a two-port element once one side is
/// known. Returns whether a slot was written.
pub fn pass_flow_through(bank: &mut NodeBank, p0: Port, p1: Port) -> ElementResult<bool> {
    let mut progress = false;
    if let Some(f) = through_flow(bank, p0, p1) {
        if bank.flow(p0.node, p0.edge).is_none() {
            bank.set_flow(p0.node, p0.edge, -f)?;
            progress = true;
        }
        if bank.flow(p1.node, p1.edge).is_none() {
            bank.set_flow(p1.node, p1.edge, f)?;
            progress = true;
        }
    }
    Ok(progress)
}

/// Copy a known effort across a two-port element that enforces equality.
pub fn equalize_efforts(bank: &mut NodeBank, p0: Port, p1: Port) -> ElementResult<bool> {
    match (bank.effort(p0.node), bank.effort(p1.node)) {
        (Some(e), None) => {
            bank.set_effort(p1.node, e)?;
            Ok(true)
        }
        (None, Some(e)) => {
            bank.set_effort(p0.node, e)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// The opposite node of a two-port element; an element with a different
/// port count has no through direction.
pub fn only_other_node(element: &str, ports: &[Port], this: NodeId) -> ElementResult<NodeId> {
    if ports.len() != 2 {
        return Err(ElementError::NoFlowThrough {
            element: element.to_string(),
        });
    }
    if ports[0].node == this {
        Ok(ports[1].node)
    } else {
        Ok(ports[0].node)
    }
}

/// Attach guard shared by fixed-arity elements.
pub fn push_port(
    element: &str,
    ports: &mut Vec<Port>,
    port: Port,
    max: usize,
) -> ElementResult<()> {
    if ports.len() >= max {
        return Err(ElementError::model(
            element,
            format!("already connected to {max} node(s)"),
        ));
    }
    ports.push(port);
    Ok(())
}

/// Require the element to be fully wired before calculating.
pub fn require_ports(element: &str, ports: &[Port], expected: usize) -> ElementResult<()> {
    if ports.len() != expected {
        return Err(ElementError::model(
            element,
            format!(
                "needs {expected} connected node(s), has {}",
                ports.len()
            ),
        ));
    }
    Ok(())
}
