//! The node arena and the per-tick value protocol.

use bf_core::{
    canonical_zero, ensure_finite, nearly_equal, ElemId, NodeId, Real, Reporter, Tolerances,
    Warning, WarningKind,
};

use crate::domain::Domain;
use crate::error::{GraphError, GraphResult};
use crate::node::{Edge, HeatSlot, Node, Slot};

/// Arena of nodes plus the setter protocol all elements and solvers use.
///
/// Every successful write bumps a monotone revision counter; the sweep
/// loop compares revisions across passes to detect a fixed point.
pub struct NodeBank {
    nodes: Vec<Node>,
    revision: u64,
    tol: Tolerances,
    reporter: Option<Reporter>,
}

impl Default for NodeBank {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeBank {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            revision: 0,
            tol: Tolerances::default(),
            reporter: None,
        }
    }

    pub fn tolerances(&self) -> Tolerances {
        self.tol
    }

    pub fn set_tolerances(&mut self, tol: Tolerances) {
        self.tol = tol;
    }

    pub fn set_reporter(&mut self, reporter: Option<Reporter>) {
        self.reporter = reporter;
    }

    /// Emit a contained numerical warning through the injected reporter.
    pub fn warn(&self, warning: Warning) {
        tracing::warn!(%warning, "numerical tolerance warning");
        if let Some(reporter) = &self.reporter {
            reporter(&warning);
        }
    }

    pub fn add_node(&mut self, domain: Domain, name: Option<String>) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Node {
            id,
            domain,
            name,
            effort: Slot::default(),
            edges: Vec::new(),
            reference: false,
        });
        id
    }

    /// Declare a node the potential reference of its subnet. The
    /// implicit ground return ends here: the node's flow balance is the
    /// redundant equation, so it is neither auto-closed nor validated.
    pub fn mark_reference(&mut self, node: NodeId) {
        self.nodes[node.index()].reference = true;
    }

    pub fn is_reference(&self, node: NodeId) -> bool {
        self.nodes[node.index()].reference
    }

    /// Attach an element port to a node, checking domain compatibility.
    /// Returns the edge index the element must use to address its slot.
    pub fn connect(
        &mut self,
        node: NodeId,
        elem: ElemId,
        elem_domain: Domain,
    ) -> GraphResult<usize> {
        let n = &mut self.nodes[node.index()];
        if !n.domain.compatible(elem_domain) {
            return Err(GraphError::DomainMismatch { node });
        }
        let heat = n.domain.is_phased().then(HeatSlot::default);
        n.edges.push(Edge {
            elem,
            flow: Slot::default(),
            heat,
        });
        Ok(n.edges.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn domain(&self, id: NodeId) -> Domain {
        self.nodes[id.index()].domain
    }

    pub fn degree(&self, id: NodeId) -> usize {
        self.nodes[id.index()].edges.len()
    }

    pub fn effort(&self, id: NodeId) -> Option<Real> {
        self.nodes[id.index()].effort.get()
    }

    pub fn flow(&self, node: NodeId, edge: usize) -> Option<Real> {
        self.nodes[node.index()].edges[edge].flow.get()
    }

    /// Set a node's effort. At most once per tick; non-finite refused.
    pub fn set_effort(&mut self, node: NodeId, value: Real) -> GraphResult<()> {
        let value = ensure_finite(value, "effort").map_err(|_| GraphError::NonFinite {
            what: "effort",
            node,
            value,
        })?;
        let slot = &mut self.nodes[node.index()].effort;
        if slot.updated {
            return Err(GraphError::EffortAlreadySet { node });
        }
        slot.value = canonical_zero(value);
        slot.updated = true;
        self.revision += 1;
        Ok(())
    }

    /// Set the signed flow on one edge (element into node positive).
    ///
    /// Marks the slot before closing the node's balance, so a closure
    /// cascade can never re-enter the same slot. Once all but one of the
    /// node's flows are known the remaining one is forced to close the
    /// balance.
    pub fn set_flow(&mut self, node: NodeId, edge: usize, value: Real) -> GraphResult<()> {
        let value = ensure_finite(value, "flow").map_err(|_| GraphError::NonFinite {
            what: "flow",
            node,
            value,
        })?;
        {
            let slot = &mut self.nodes[node.index()].edges[edge].flow;
            if slot.updated {
                return Err(GraphError::FlowAlreadySet { node, edge });
            }
            slot.value = canonical_zero(value);
            slot.updated = true;
        }
        self.revision += 1;
        self.close_balance(node)
    }

    /// Force the remaining flow of `node` once all others are set.
    fn close_balance(&mut self, node: NodeId) -> GraphResult<()> {
        let (pending, sum) = {
            let n = &self.nodes[node.index()];
            if n.edges.len() < 2 || n.reference {
                return Ok(());
            }
            let mut pending = None;
            let mut sum = 0.0;
            for (i, e) in n.edges.iter().enumerate() {
                match e.flow.get() {
                    Some(f) => sum += f,
                    None if pending.is_some() => return Ok(()),
                    None => pending = Some(i),
                }
            }
            (pending, sum)
        };
        if let Some(edge) = pending {
            self.set_flow(node, edge, -sum)?;
        }
        Ok(())
    }

    /// Close degree-1 nodes: a single dangling edge can only carry zero.
    /// Returns whether any slot changed.
    pub fn close_dangling(&mut self) -> GraphResult<bool> {
        let before = self.revision;
        for i in 0..self.nodes.len() {
            let n = &self.nodes[i];
            if n.edges.len() == 1 && !n.edges[0].flow.updated {
                let id = n.id;
                self.set_flow(id, 0, 0.0)?;
            }
        }
        Ok(self.revision != before)
    }

    /// Solver write-back: set if unset, otherwise compare and warn on
    /// disagreement instead of raising a double-set error.
    pub fn confirm_or_set_effort(&mut self, node: NodeId, value: Real) -> GraphResult<()> {
        match self.effort(node) {
            None => self.set_effort(node, value),
            Some(existing) => {
                if !nearly_equal(existing, value, self.tol.solver_agreement) {
                    self.warn(Warning {
                        kind: WarningKind::SolverDisagreement,
                        subject: Some(self.nodes[node.index()].label()),
                        magnitude: (existing - value).abs(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Solver write-back counterpart of [`NodeBank::set_flow`].
    pub fn confirm_or_set_flow(&mut self, node: NodeId, edge: usize, value: Real) -> GraphResult<()> {
        match self.flow(node, edge) {
            None => self.set_flow(node, edge, value),
            Some(existing) => {
                if !nearly_equal(existing, value, self.tol.solver_agreement) {
                    self.warn(Warning {
                        kind: WarningKind::SolverDisagreement,
                        subject: Some(self.nodes[node.index()].label()),
                        magnitude: (existing - value).abs(),
                    });
                }
                Ok(())
            }
        }
    }

    pub(crate) fn heat_slot_mut(
        &mut self,
        node: NodeId,
        edge: usize,
    ) -> GraphResult<&mut HeatSlot> {
        self.nodes[node.index()].edges[edge]
            .heat
            .as_mut()
            .ok_or(GraphError::HeatOnUnphasedNode { node })
    }

    pub(crate) fn bump_revision(&mut self) {
        self.revision += 1;
    }

    /// Reset all updated-flags and phased markers for a fresh tick.
    pub fn reset_tick(&mut self) {
        for n in &mut self.nodes {
            n.effort.reset();
            for e in &mut n.edges {
                e.flow.reset();
                if let Some(h) = &mut e.heat {
                    *h = HeatSlot::default();
                }
            }
        }
        self.revision += 1;
    }

    /// All efforts and flows (and phased markers) present.
    pub fn all_complete(&self) -> bool {
        self.nodes.iter().all(|n| self.node_complete(n.id))
    }

    pub fn node_complete(&self, id: NodeId) -> bool {
        let n = &self.nodes[id.index()];
        n.effort.updated
            && n.edges.iter().all(|e| {
                e.flow.updated
                    && e.heat
                        .as_ref()
                        .map(|h| h.updated || h.no_energy)
                        .unwrap_or(true)
            })
    }
}
