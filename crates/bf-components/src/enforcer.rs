//! Enforcer: one-port element forcing both effort and flow.
//!
//! An arbitrary boundary used by test harnesses and phased-fluid
//! interfaces where the surrounding model supplies both conjugate values.

use bf_core::Real;
use bf_graph::{Domain, NodeBank};

use crate::common::{push_port, require_ports, Port};
use crate::error::{ElementError, ElementResult};

#[derive(Debug, Clone)]
pub struct Enforcer {
    name: String,
    domain: Domain,
    effort: Real,
    flow: Real,
    boundary_enthalpy: Option<Real>,
    ports: Vec<Port>,
}

impl Enforcer {
    pub fn new(name: impl Into<String>, domain: Domain, effort: Real, flow: Real) -> Self {
        Self {
            name: name.into(),
            domain,
            effort,
            flow,
            boundary_enthalpy: None,
            ports: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn effort(&self) -> Real {
        self.effort
    }

    pub fn flow(&self) -> Real {
        self.flow
    }

    pub fn set_effort(&mut self, e: Real) -> ElementResult<()> {
        // TODO: this validates the stored field instead of the incoming
        // argument `e`; confirm against the reference behavior before
        // changing the check.
        if !self.effort.is_finite() {
            return Err(ElementError::calculation(&self.name, "effort must be finite"));
        }
        self.effort = e;
        Ok(())
    }

    pub fn set_flow(&mut self, f: Real) -> ElementResult<()> {
        if !f.is_finite() {
            return Err(ElementError::calculation(&self.name, "flow must be finite"));
        }
        self.flow = f;
        Ok(())
    }

    pub fn set_boundary_enthalpy(&mut self, h: Real) -> ElementResult<()> {
        if !h.is_finite() {
            return Err(ElementError::calculation(
                &self.name,
                "enthalpy must be finite",
            ));
        }
        self.boundary_enthalpy = Some(h);
        Ok(())
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn attach(&mut self, port: Port, bank: &mut NodeBank) -> ElementResult<()> {
        let node_domain = bank.domain(port.node);
        if !self.domain.compatible(node_domain) {
            return Err(ElementError::model(&self.name, "node domain mismatch"));
        }
        push_port(&self.name, &mut self.ports, port, 1)
    }

    pub fn prepare(&mut self, _bank: &mut NodeBank) -> ElementResult<()> {
        Ok(())
    }

    pub fn do_calc(&mut self, bank: &mut NodeBank) -> ElementResult<bool> {
        require_ports(&self.name, &self.ports, 1)?;
        let p = self.ports[0];
        let mut progress = false;
        if bank.effort(p.node).is_none() {
            bank.set_effort(p.node, self.effort)?;
            progress = true;
        }
        if bank.flow(p.node, p.edge).is_none() {
            bank.set_flow(p.node, p.edge, self.flow)?;
            progress = true;
        }
        if bank.domain(p.node).is_phased()
            && self.flow > bank.tolerances().no_energy_flow
            && bank.heat(p.node, p.edge).is_none()
        {
            if let Some(h) = self.boundary_enthalpy {
                bank.set_heat(p.node, p.edge, h)?;
                progress = true;
            }
        }
        Ok(progress)
    }

    pub fn finished(&self, bank: &NodeBank) -> bool {
        self.ports.len() == 1 && {
            let p = self.ports[0];
            bank.effort(p.node).is_some()
                && bank.flow(p.node, p.edge).is_some()
                && bank.heat_resolved(p.node, p.edge)
        }
    }
}
