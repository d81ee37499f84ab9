//! Effort and flow sources.

use bf_core::Real;
use bf_graph::{Domain, NodeBank};

use crate::common::{pass_flow_through, push_port, require_ports, Port};
use crate::error::{ElementError, ElementResult};

/// Two-port source enforcing `effort(port 1) = effort(port 0) + E`.
///
/// An unarmed source sits idle until `set_effort` supplies the value;
/// cross-domain bridges are built that way, with the owning element
/// arming its source once its own state is known.
#[derive(Debug, Clone)]
pub struct EffortSource {
    name: String,
    domain: Domain,
    delta: Real,
    armed: bool,
    ports: Vec<Port>,
}

impl EffortSource {
    pub fn new(name: impl Into<String>, domain: Domain, delta: Real) -> ElementResult<Self> {
        let name = name.into();
        if !delta.is_finite() {
            return Err(ElementError::calculation(&name, "effort must be finite"));
        }
        Ok(Self {
            name,
            domain,
            delta,
            armed: true,
            ports: Vec::new(),
        })
    }

    /// A source that waits for a later `set_effort` before propagating.
    pub fn unarmed(name: impl Into<String>, domain: Domain) -> Self {
        Self {
            name: name.into(),
            domain,
            delta: 0.0,
            armed: false,
            ports: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn armed(&self) -> bool {
        self.armed
    }

    pub fn effort(&self) -> Real {
        self.delta
    }

    /// Supply the source value and arm the source.
    pub fn set_effort(&mut self, e: Real) -> ElementResult<()> {
        if !e.is_finite() {
            return Err(ElementError::calculation(&self.name, "effort must be finite"));
        }
        self.delta = e;
        self.armed = true;
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
        push_port(&self.name, &mut self.ports, port, 2)
    }

    pub fn prepare(&mut self, _bank: &mut NodeBank) -> ElementResult<()> {
        Ok(())
    }

    pub fn do_calc(&mut self, bank: &mut NodeBank) -> ElementResult<bool> {
        require_ports(&self.name, &self.ports, 2)?;
        if !self.armed {
            return Ok(false);
        }
        let (p0, p1) = (self.ports[0], self.ports[1]);
        let mut progress = pass_flow_through(bank, p0, p1)?;
        match (bank.effort(p0.node), bank.effort(p1.node)) {
            (Some(e0), None) => {
                bank.set_effort(p1.node, e0 + self.delta)?;
                progress = true;
            }
            (None, Some(e1)) => {
                bank.set_effort(p0.node, e1 - self.delta)?;
                progress = true;
            }
            _ => {}
        }
        Ok(progress)
    }

    pub fn finished(&self, bank: &NodeBank) -> bool {
        self.armed
            && self.ports.len() == 2
            && self.ports.iter().all(|p| {
                bank.effort(p.node).is_some() && bank.flow(p.node, p.edge).is_some()
            })
    }
}

/// Two-port source forcing a fixed flow: `+F` into port 0's node, `-F`
/// out of port 1's node.
///
/// The element owns its edge values: an edge someone else already set is
/// accepted only when it agrees with the enforced flow. `allow_looping`
/// permits wiring both ports onto one node, where the balance closure
/// triggered by the first write legitimately completes the second edge.
#[derive(Debug, Clone)]
pub struct FlowSource {
    name: String,
    domain: Domain,
    flow: Real,
    allow_looping: bool,
    /// Enthalpy delivered with the pushed mass on phased nodes when the
    /// source acts as a boundary feed.
    carried_enthalpy: Option<Real>,
    ports: Vec<Port>,
}

impl FlowSource {
    pub fn new(name: impl Into<String>, domain: Domain, flow: Real) -> ElementResult<Self> {
        let name = name.into();
        if !flow.is_finite() {
            return Err(ElementError::calculation(&name, "flow must be finite"));
        }
        Ok(Self {
            name,
            domain,
            flow,
            allow_looping: false,
            carried_enthalpy: None,
            ports: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn flow(&self) -> Real {
        self.flow
    }

    pub fn set_flow(&mut self, f: Real) -> ElementResult<()> {
        if !f.is_finite() {
            return Err(ElementError::calculation(&self.name, "flow must be finite"));
        }
        self.flow = f;
        Ok(())
    }

    pub fn set_allow_looping(&mut self, allow: bool) {
        self.allow_looping = allow;
    }

    pub fn set_carried_enthalpy(&mut self, h: Real) -> ElementResult<()> {
        if !h.is_finite() {
            return Err(ElementError::calculation(
                &self.name,
                "enthalpy must be finite",
            ));
        }
        self.carried_enthalpy = Some(h);
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
        if !self.allow_looping && self.ports.iter().any(|p| p.node == port.node) {
            return Err(ElementError::model(
                &self.name,
                "both ports on one node require allow_looping",
            ));
        }
        push_port(&self.name, &mut self.ports, port, 2)
    }

    fn enforce_edge(&self, bank: &mut NodeBank, port: Port, value: Real) -> ElementResult<bool> {
        match bank.flow(port.node, port.edge) {
            None => {
                bank.set_flow(port.node, port.edge, value)?;
                Ok(true)
            }
            Some(existing) => {
                if (existing - value).abs() > bank.tolerances().flow_balance {
                    return Err(ElementError::model(
                        &self.name,
                        "flow already set where element expected freedom",
                    ));
                }
                Ok(false)
            }
        }
    }

    pub fn prepare(&mut self, _bank: &mut NodeBank) -> ElementResult<()> {
        Ok(())
    }

    pub fn do_calc(&mut self, bank: &mut NodeBank) -> ElementResult<bool> {
        require_ports(&self.name, &self.ports, 2)?;
        let (p0, p1) = (self.ports[0], self.ports[1]);
        let mut progress = self.enforce_edge(bank, p0, self.flow)?;
        progress |= self.enforce_edge(bank, p1, -self.flow)?;

        // A pump moving phased fluid hands on what it draws, unless it
        // feeds from a configured boundary enthalpy.
        if bank.domain(p0.node).is_phased() && self.flow.abs() > bank.tolerances().no_energy_flow {
            let (push, draw) = if self.flow > 0.0 { (p0, p1) } else { (p1, p0) };
            if bank.heat(push.node, push.edge).is_none() {
                let h = match self.carried_enthalpy {
                    Some(h) => Some(h),
                    None => bank.heat(draw.node, draw.edge),
                };
                if let Some(h) = h {
                    bank.set_heat(push.node, push.edge, h)?;
                    progress = true;
                }
            }
        }
        Ok(progress)
    }

    pub fn finished(&self, bank: &NodeBank) -> bool {
        self.ports.len() == 2
            && self.ports.iter().all(|p| {
                bank.effort(p.node).is_some()
                    && bank.flow(p.node, p.edge).is_some()
                    && bank.heat_resolved(p.node, p.edge)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bf_core::ElemId;

    #[test]
    fn unarmed_source_waits() {
        let mut bank = NodeBank::new();
        let mut src = EffortSource::unarmed("u", Domain::Electrical);
        for _ in 0..2 {
            let n = bank.add_node(Domain::Electrical, None);
            let edge = bank.connect(n, ElemId::from_index(0), Domain::Electrical).unwrap();
            src.attach(Port { node: n, edge }, &mut bank).unwrap();
        }
        bank.set_effort(src.ports()[0].node, 1.0).unwrap();
        assert!(!src.do_calc(&mut bank).unwrap());
        src.set_effort(4.0).unwrap();
        assert!(src.do_calc(&mut bank).unwrap());
        assert_eq!(bank.effort(src.ports()[1].node), Some(5.0));
    }

    #[test]
    fn flow_source_loop_on_itself_is_consistent() {
        let mut bank = NodeBank::new();
        let n = bank.add_node(Domain::Hydraulic, None);
        let mut src = FlowSource::new("pump", Domain::Hydraulic, 2.5).unwrap();
        src.set_allow_looping(true);
        let e0 = bank.connect(n, ElemId::from_index(0), Domain::Hydraulic).unwrap();
        src.attach(Port { node: n, edge: e0 }, &mut bank).unwrap();
        let e1 = bank.connect(n, ElemId::from_index(0), Domain::Hydraulic).unwrap();
        src.attach(Port { node: n, edge: e1 }, &mut bank).unwrap();
        // First write triggers balance closure, which fills the second
        // edge with the matching value; the source must accept it.
        src.do_calc(&mut bank).unwrap();
        assert_eq!(bank.flow(n, e0), Some(2.5));
        assert_eq!(bank.flow(n, e1), Some(-2.5));
    }

    #[test]
    fn looped_attach_requires_flag() {
        let mut bank = NodeBank::new();
        let n = bank.add_node(Domain::Hydraulic, None);
        let mut src = FlowSource::new("pump", Domain::Hydraulic, 1.0).unwrap();
        let e0 = bank.connect(n, ElemId::from_index(0), Domain::Hydraulic).unwrap();
        src.attach(Port { node: n, edge: e0 }, &mut bank).unwrap();
        let e1 = bank.connect(n, ElemId::from_index(0), Domain::Hydraulic).unwrap();
        assert!(src.attach(Port { node: n, edge: e1 }, &mut bank).is_err());
    }

    #[test]
    fn conflicting_preset_flow_is_a_model_error() {
        let mut bank = NodeBank::new();
        let mut src = FlowSource::new("pump", Domain::Hydraulic, 1.0).unwrap();
        for _ in 0..2 {
            let n = bank.add_node(Domain::Hydraulic, None);
            let edge = bank.connect(n, ElemId::from_index(0), Domain::Hydraulic).unwrap();
            src.attach(Port { node: n, edge }, &mut bank).unwrap();
            bank.connect(n, ElemId::from_index(9), Domain::Hydraulic).unwrap();
        }
        let p0 = src.ports()[0];
        bank.set_flow(p0.node, p0.edge, 0.25).unwrap();
        assert!(matches!(
            src.do_calc(&mut bank),
            Err(ElementError::Model { .. })
        ));
    }
}
