//! Square-law dissipator: `Δeffort = sign(f)·f²·ζ`.
//!
//! Experimental. The quadratic relation is not stable under discrete
//! stepping; the element exists for completeness behind the `square-law`
//! feature and is not exercised by the default test suite.

use bf_core::Real;
use bf_graph::{Domain, NodeBank};

use crate::common::{pass_flow_through, push_port, require_ports, through_flow, Port};
use crate::error::{ElementError, ElementResult};

#[derive(Debug, Clone)]
pub struct SquareDissipator {
    name: String,
    domain: Domain,
    zeta: Real,
    ports: Vec<Port>,
}

impl SquareDissipator {
    pub fn new(name: impl Into<String>, domain: Domain, zeta: Real) -> ElementResult<Self> {
        let name = name.into();
        if !zeta.is_finite() || zeta <= 0.0 {
            return Err(ElementError::calculation(
                &name,
                "zeta must be positive and finite",
            ));
        }
        Ok(Self {
            name,
            domain,
            zeta,
            ports: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> Domain {
        self.domain
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
        Ok(())
    }

    pub fn do_calc(&mut self, bank: &mut NodeBank) -> ElementResult<bool> {
        require_ports(&self.name, &self.ports, 2)?;
        let (p0, p1) = (self.ports[0], self.ports[1]);
        let mut progress = pass_flow_through(bank, p0, p1)?;
        let flow = through_flow(bank, p0, p1);
        let e0 = bank.effort(p0.node);
        let e1 = bank.effort(p1.node);

        if let Some(f) = flow {
            let delta = f.signum() * f * f * self.zeta;
            match (e0, e1) {
                (Some(e0), None) => {
                    bank.set_effort(p1.node, e0 - delta)?;
                    progress = true;
                }
                (None, Some(e1)) => {
                    bank.set_effort(p0.node, e1 + delta)?;
                    progress = true;
                }
                _ => {}
            }
        } else if let (Some(e0), Some(e1)) = (e0, e1) {
            let delta = e0 - e1;
            let f = delta.signum() * (delta.abs() / self.zeta).sqrt();
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

    pub fn finished(&self, bank: &NodeBank) -> bool {
        self.ports.len() == 2
            && self.ports.iter().all(|p| {
                bank.effort(p.node).is_some() && bank.flow(p.node, p.edge).is_some()
            })
    }
}
