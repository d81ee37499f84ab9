//! Effort-storing elements.

use bf_core::Real;
use bf_graph::{Domain, NodeBank};

use crate::common::{
    pass_flow_through, push_port, require_ports, through_flow, Port, StorageState,
};
use crate::error::{ElementError, ElementResult};

/// Capacitance against the domain's ground: forces its stored effort on
/// every connected node and integrates the net inflow.
///
/// `next_state = state + Σ inflow · Δt / τ`, rotated in at the next
/// `prepare`, so every tick is solved against the state the tick started
/// with.
#[derive(Debug, Clone)]
pub struct SelfCapacitance {
    name: String,
    domain: Domain,
    storage: StorageState,
    dt: Real,
    ports: Vec<Port>,
}

impl SelfCapacitance {
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
        self.ports.push(port);
        Ok(())
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
        for p in &self.ports {
            if bank.effort(p.node).is_none() {
                bank.set_effort(p.node, self.storage.state)?;
                progress = true;
            }
        }
        if !self.storage.delta_done()
            && self
                .ports
                .iter()
                .all(|p| bank.flow(p.node, p.edge).is_some())
        {
            // Edge values are element-into-node; inflow is their negation.
            let inflow: Real = self
                .ports
                .iter()
                .map(|p| -bank.flow(p.node, p.edge).unwrap_or(0.0))
                .sum();
            self.storage.integrate(inflow * self.dt);
            progress = true;
        }
        Ok(progress)
    }

    pub fn finished(&self, bank: &NodeBank) -> bool {
        self.storage.delta_done()
            && self.ports.iter().all(|p| {
                bank.effort(p.node).is_some() && bank.flow(p.node, p.edge).is_some()
            })
    }

}

/// Capacitance between two nodes storing their effort difference:
/// `effort(port 1) = effort(port 0) − state`, flow passes through, and
/// the through-flow charges the state.
#[derive(Debug, Clone)]
pub struct MutualCapacitance {
    name: String,
    domain: Domain,
    storage: StorageState,
    dt: Real,
    ports: Vec<Port>,
}

impl MutualCapacitance {
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
        require_ports(&self.name, &self.ports, 2)?;
        let (p0, p1) = (self.ports[0], self.ports[1]);
        let mut progress = pass_flow_through(bank, p0, p1)?;
        match (bank.effort(p0.node), bank.effort(p1.node)) {
            (Some(e0), None) => {
                bank.set_effort(p1.node, e0 - self.storage.state)?;
                progress = true;
            }
            (None, Some(e1)) => {
                bank.set_effort(p0.node, e1 + self.storage.state)?;
                progress = true;
            }
            _ => {}
        }
        if !self.storage.delta_done() {
            if let Some(f) = through_flow(bank, p0, p1) {
                self.storage.integrate(f * self.dt);
                progress = true;
            }
        }
        Ok(progress)
    }

    pub fn finished(&self, bank: &NodeBank) -> bool {
        self.storage.delta_done()
            && self.ports.len() == 2
            && self.ports.iter().all(|p| {
                bank.effort(p.node).is_some() && bank.flow(p.node, p.edge).is_some()
            })
    }

}
