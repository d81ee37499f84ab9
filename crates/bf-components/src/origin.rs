//! Origins: single-port boundary anchors.

use bf_core::Real;
use bf_graph::{Domain, NodeBank};

use crate::common::{push_port, require_ports, Port};
use crate::error::{ElementError, ElementResult};

/// One-port anchor forcing an effort on its node.
///
/// A closed origin also forces zero flow through itself (a Kirchhoff
/// ground); an open origin absorbs or supplies whatever flow the node
/// balance demands. Closed origins are illegal on phased-fluid nodes
/// (mass would vanish without an enthalpy account); open origins are
/// illegal in the electrical domain.
#[derive(Debug, Clone)]
pub struct Origin {
    name: String,
    domain: Domain,
    effort: Real,
    open: bool,
    /// Enthalpy handed to the node when an open phased origin supplies
    /// mass.
    boundary_enthalpy: Option<Real>,
    ports: Vec<Port>,
}

impl Origin {
    pub fn closed(name: impl Into<String>, domain: Domain, effort: Real) -> ElementResult<Self> {
        let name = name.into();
        if domain == Domain::PhasedFluid {
            return Err(ElementError::model(
                &name,
                "closed origin is illegal on phased-fluid nodes",
            ));
        }
        Self::build(name, domain, effort, false)
    }

    pub fn open(name: impl Into<String>, domain: Domain, effort: Real) -> ElementResult<Self> {
        let name = name.into();
        if domain == Domain::Electrical {
            return Err(ElementError::model(
                &name,
                "open origin is illegal in the electrical domain",
            ));
        }
        Self::build(name, domain, effort, true)
    }

    fn build(name: String, domain: Domain, effort: Real, open: bool) -> ElementResult<Self> {
        if !effort.is_finite() {
            return Err(ElementError::calculation(&name, "effort must be finite"));
        }
        Ok(Self {
            name,
            domain,
            effort,
            open,
            boundary_enthalpy: None,
            ports: Vec::new(),
        })
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

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn set_effort(&mut self, e: Real) -> ElementResult<()> {
        if !e.is_finite() {
            return Err(ElementError::calculation(&self.name, "effort must be finite"));
        }
        self.effort = e;
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
        if node_domain == Domain::PhasedFluid && !self.open {
            return Err(ElementError::model(
                &self.name,
                "closed origin is illegal on phased-fluid nodes",
            ));
        }
        push_port(&self.name, &mut self.ports, port, 1)?;
        if !self.open {
            // The anchored node is its subnet's potential reference; the
            // implicit ground return ends there.
            bank.mark_reference(port.node);
        }
        Ok(())
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
        if !self.open && bank.flow(p.node, p.edge).is_none() {
            bank.set_flow(p.node, p.edge, 0.0)?;
            progress = true;
        }
        // An open phased boundary supplying mass labels it with the
        // configured enthalpy; drawn mass is labelled by node mixing.
        if self.open && bank.domain(p.node).is_phased() {
            if let Some(f) = bank.flow(p.node, p.edge) {
                if f > bank.tolerances().no_energy_flow
                    && bank.heat(p.node, p.edge).is_none()
                {
                    let h = self.boundary_enthalpy.ok_or_else(|| {
                        ElementError::model(
                            &self.name,
                            "open phased origin supplies mass without a boundary enthalpy",
                        )
                    })?;
                    bank.set_heat(p.node, p.edge, h)?;
                    progress = true;
                }
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

#[cfg(test)]
mod tests {
    use super::*;
    use bf_core::ElemId;

    #[test]
    fn closed_origin_forces_effort_and_zero_flow() {
        let mut bank = NodeBank::new();
        let n = bank.add_node(Domain::Electrical, None);
        let edge = bank.connect(n, ElemId::from_index(0), Domain::Electrical).unwrap();
        bank.connect(n, ElemId::from_index(1), Domain::Electrical).unwrap();
        let mut o = Origin::closed("gnd", Domain::Electrical, 0.0).unwrap();
        o.attach(Port { node: n, edge }, &mut bank).unwrap();
        assert!(o.do_calc(&mut bank).unwrap());
        assert_eq!(bank.effort(n), Some(0.0));
        assert_eq!(bank.flow(n, edge), Some(0.0));
    }

    #[test]
    fn closed_origin_rejects_phased_domain() {
        assert!(Origin::closed("o", Domain::PhasedFluid, 1.0).is_err());
    }

    #[test]
    fn open_origin_rejects_electrical_domain() {
        assert!(Origin::open("o", Domain::Electrical, 1.0).is_err());
    }

    #[test]
    fn open_origin_leaves_flow_to_balance() {
        let mut bank = NodeBank::new();
        let n = bank.add_node(Domain::Hydraulic, None);
        let edge = bank.connect(n, ElemId::from_index(0), Domain::Hydraulic).unwrap();
        bank.connect(n, ElemId::from_index(1), Domain::Hydraulic).unwrap();
        let mut o = Origin::open("reservoir", Domain::Hydraulic, 2.0e5).unwrap();
        o.attach(Port { node: n, edge }, &mut bank).unwrap();
        o.do_calc(&mut bank).unwrap();
        assert_eq!(bank.effort(n), Some(2.0e5));
        assert_eq!(bank.flow(n, edge), None);
        // someone else pushes 0.4 into the node: balance closes us to -0.4
        bank.set_flow(n, 1, 0.4).unwrap();
        assert_eq!(bank.flow(n, edge), Some(-0.4));
    }
}
