//! Flow-storing element.

use bf_core::Real;
use bf_graph::{Domain, NodeBank};

use crate::common::{push_port, Port, StorageState};
use crate::error::{ElementError, ElementResult};

/// Inductance: stores a through-flow and forces it on its nodes.
///
/// With two ports the stored flow enters port 0 and leaves port 1, and
/// the effort difference across the element charges the state
/// (`delta = (e0 − e1)·Δt`). A single-port inductance drives its flow
/// against the domain ground, charging from the node effort alone.
#[derive(Debug, Clone)]
pub struct Inductance {
    name: String,
    domain: Domain,
    storage: StorageState,
    dt: Real,
    ports: Vec<Port>,
}

impl Inductance {
    pub fn new(
        name: impl Into<String>,
        domain: Domain,
        tau: Real,
        initial: Real,
    ) -> ElementResult<Self> {
        let name = name.into();
        if !tau.is_finite() || tau <= 0.0 {
            return Err(ElementError::calculation(
                &name,
                "time constant must be positive and finite",
            ));
        }
        if !initial.is_finite() {
            return Err(ElementError::calculation(&name, "initial state must be finite"));
        }
        Ok(Self {
            name,
            domain,
            storage: StorageState::new(initial, tau),
            dt: 0.0,
            ports: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn state(&self) -> Real {
        self.storage.state
    }

    pub fn set_time_constant(&mut self, tau: Real) -> ElementResult<()> {
        if !tau.is_finite() || tau <= 0.0 {
            return Err(ElementError::calculation(
                &self.name,
                "time constant must be positive and finite",
            ));
        }
        self.storage.tau = tau;
        Ok(())
    }

    pub fn set_initial_state(&mut self, state: Real) -> ElementResult<()> {
        if !state.is_finite() {
            return Err(ElementError::calculation(&self.name, "state must be finite"));
        }
        self.storage.reset_to(state);
        Ok(())
    }

    pub fn set_step_time(&mut self, dt: Real) {
        self.dt = dt;
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn attach(&mut self, port: Port, bank: &mut NodeBank) -> ElementResult<()> {
        let node_domain = bank.domain(port.node);
        if !self.domain.compatible(node_domain) {
            return Err(ElementError::model(&self.name, "node domain mismatch"));
        }
        push_port(&self.name, &mut self.ports, port, 2)
    }

    pub fn prepare(&mut self, _bank: &mut NodeBank) -> ElementResult<()> {
        self.storage.rotate();
        Ok(())
    }

    pub fn do_calc(&mut self, bank: &mut NodeBank) -> ElementResult<bool> {
        if self.ports.is_empty() {
            return Err(ElementError::model(&self.name, "needs at least one node"));
        }
        let mut progress = false;
        let f = self.storage.state;
        if bank.flow(self.ports[0].node, self.ports[0].edge).is_none() {
            bank.set_flow(self.ports[0].node, self.ports[0].edge, -f)?;
            progress = true;
        }
        if let Some(p1) = self.ports.get(1).copied() {
            if bank.flow(p1.node, p1.edge).is_none() {
                bank.set_flow(p1.node, p1.edge, f)?;
                progress = true;
            }
        }
        if !self.storage.delta_done() {
            let delta = match self.ports.len() {
                1 => bank.effort(self.ports[0].node),
                _ => match (
                    bank.effort(self.ports[0].node),
                    bank.effort(self.ports[1].node),
                ) {
                    (Some(e0), Some(e1)) => Some(e0 - e1),
                    _ => None,
                },
            };
            if let Some(delta) = delta {
                self.storage.integrate(delta * self.dt);
                progress = true;
            }
        }
        Ok(progress)
    }

    pub fn finished(&self, bank: &NodeBank) -> bool {
        self.storage.delta_done()
            && !self.ports.is_empty()
            && self.ports.iter().all(|p| {
                bank.effort(p.node).is_some() && bank.flow(p.node, p.edge).is_some()
            })
    }

}
