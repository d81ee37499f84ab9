//! The network orchestrator.

use bf_core::{ElemId, NodeId, Real, Reporter};
use bf_components::{Element, Port};
use bf_graph::{Domain, NodeBank};
use bf_solver::{run_calculation, SolveTiers};

use crate::error::{SimError, SimResult};

/// Owns the node and element arenas and runs the per-tick triplet
/// `prepare_calculation` / `do_calculation` / `is_calculation_finished`.
///
/// Elements and nodes are addressed by their arena indices; the element
/// at index `i` owns `ElemId(i)` on every edge it is connected with.
pub struct Network {
    bank: NodeBank,
    elements: Vec<Element>,
    /// Informational cross-domain links (`a` embeds or drives `b`).
    coupled: Vec<(ElemId, ElemId)>,
    dt: Real,
    tiers: SolveTiers,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    pub fn new() -> Self {
        Self {
            bank: NodeBank::new(),
            elements: Vec::new(),
            coupled: Vec::new(),
            dt: 0.0,
            tiers: SolveTiers::default(),
        }
    }

    pub fn register_node(&mut self, domain: Domain) -> NodeId {
        self.bank.add_node(domain, None)
    }

    pub fn register_named_node(&mut self, domain: Domain, name: impl Into<String>) -> NodeId {
        self.bank.add_node(domain, Some(name.into()))
    }

    pub fn register_element(&mut self, element: impl Into<Element>) -> SimResult<ElemId> {
        let element = element.into();
        if self.elements.iter().any(|e| e.name() == element.name()) {
            return Err(SimError::DuplicateElement {
                name: element.name().to_string(),
            });
        }
        let id = ElemId::from_index(self.elements.len());
        self.elements.push(element);
        Ok(id)
    }

    /// Attach the element's next port to a node.
    pub fn connect_to(&mut self, elem: ElemId, node: NodeId) -> SimResult<()> {
        let domain = self.elements[elem.index()].domain();
        let edge = self.bank.connect(node, elem, domain)?;
        self.elements[elem.index()].attach(Port { node, edge }, &mut self.bank)?;
        Ok(())
    }

    /// Attach a two-port element between two nodes.
    pub fn connect_between(&mut self, elem: ElemId, n0: NodeId, n1: NodeId) -> SimResult<()> {
        self.connect_to(elem, n0)?;
        self.connect_to(elem, n1)
    }

    /// Join two elements on a shared node.
    pub fn connect_to_via(&mut self, a: ElemId, b: ElemId, node: NodeId) -> SimResult<()> {
        self.connect_to(a, node)?;
        self.connect_to(b, node)
    }

    /// Declare two elements coupled (informational back-pointer for
    /// cross-domain bridges).
    pub fn couple(&mut self, a: ElemId, b: ElemId) {
        self.coupled.push((a, b));
    }

    pub fn coupled_partner(&self, elem: ElemId) -> Option<ElemId> {
        self.coupled.iter().find_map(|&(a, b)| {
            if a == elem {
                Some(b)
            } else if b == elem {
                Some(a)
            } else {
                None
            }
        })
    }

    pub fn set_step_time(&mut self, dt: Real) -> SimResult<()> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "step time must be positive and finite",
            });
        }
        self.dt = dt;
        for e in &mut self.elements {
            e.set_step_time(dt);
        }
        Ok(())
    }

    pub fn step_time(&self) -> Real {
        self.dt
    }

    pub fn set_reporter(&mut self, reporter: Option<Reporter>) {
        self.bank.set_reporter(reporter);
    }

    /// Enable the recursive series/parallel/star simplifier.
    pub fn recursive_simplification_setup(&mut self) {
        self.tiers.reduction = true;
    }

    /// Enable superposition (implies the simplifier for the overlays).
    pub fn super_position_setup(&mut self) {
        self.tiers.reduction = true;
        self.tiers.superposition = true;
    }

    /// Enable the transfer-subnet tier (implies the lower tiers).
    pub fn setup_transfer_subnet(&mut self) {
        self.tiers.reduction = true;
        self.tiers.superposition = true;
        self.tiers.transfer = true;
    }

    /// Reset updated-flags and rotate staged states for a fresh tick.
    pub fn prepare_calculation(&mut self) -> SimResult<()> {
        self.bank.reset_tick();
        for e in &mut self.elements {
            e.prepare(&mut self.bank)?;
        }
        Ok(())
    }

    /// Sweep to a fixed point, escalating to the enabled solver tiers on
    /// stalls. Returns whether the tick settled completely.
    pub fn do_calculation(&mut self) -> SimResult<bool> {
        Ok(run_calculation(
            &mut self.elements,
            &mut self.bank,
            self.tiers,
        )?)
    }

    /// All elements finished and the channel invariants hold.
    pub fn is_calculation_finished(&self) -> bool {
        self.elements.iter().all(|e| e.finished(&self.bank))
            && self.bank.validate_tick().is_ok()
    }

    /// Convenience: one full tick, failing when the tick cannot settle.
    pub fn step(&mut self) -> SimResult<()> {
        self.prepare_calculation()?;
        let settled = self.do_calculation()?;
        if !settled {
            return Err(SimError::Unfinished {
                what: "no enabled solver tier could settle the network".to_string(),
            });
        }
        self.bank.validate_tick()?;
        Ok(())
    }

    pub fn element(&self, id: ElemId) -> &Element {
        &self.elements[id.index()]
    }

    pub fn element_mut(&mut self, id: ElemId) -> &mut Element {
        &mut self.elements[id.index()]
    }

    pub fn element_by_name(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name() == name)
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub(crate) fn elements_mut(&mut self) -> &mut [Element] {
        &mut self.elements
    }

    pub fn bank(&self) -> &NodeBank {
        &self.bank
    }

    pub fn effort(&self, node: NodeId) -> Option<Real> {
        self.bank.effort(node)
    }

    /// Through-flow of a two-port element: positive entering port 0.
    pub fn through_flow(&self, elem: ElemId) -> Option<Real> {
        let ports = self.elements[elem.index()].ports();
        if ports.len() != 2 {
            return None;
        }
        self.bank.flow(ports[0].node, ports[0].edge).map(|f| -f)
    }

    /// Flow on one element port (element into node positive).
    pub fn port_flow(&self, elem: ElemId, port: usize) -> Option<Real> {
        let p = self.elements[elem.index()].ports()[port];
        self.bank.flow(p.node, p.edge)
    }

    /// Enthalpy on one element port, if resolved with energy.
    pub fn port_heat(&self, elem: ElemId, port: usize) -> Option<Real> {
        let p = self.elements[elem.index()].ports()[port];
        self.bank.heat(p.node, p.edge)
    }
}
