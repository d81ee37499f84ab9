//! Perfect-mixing enthalpy propagation on phased-fluid nodes.
//!
//! Heat energy travels alongside mass flow: every inbound edge carries a
//! specific enthalpy; once all flows on a node are known and every inbound
//! enthalpy has arrived, the node hands the flow-weighted mixture to each
//! outbound edge. Edges without flow are marked as carrying no energy.

use bf_core::{NodeId, Real};

use crate::bank::NodeBank;
use crate::error::{GraphError, GraphResult};

impl NodeBank {
    /// Enthalpy on a phased edge, if known this tick.
    pub fn heat(&self, node: NodeId, edge: usize) -> Option<Real> {
        let e = &self.node(node).edges()[edge];
        match e.heat_state() {
            crate::node::HeatState::Energy(h) => Some(h),
            _ => None,
        }
    }

    pub fn heat_resolved(&self, node: NodeId, edge: usize) -> bool {
        !matches!(
            self.node(node).edges()[edge].heat_state(),
            crate::node::HeatState::Pending
        )
    }

    /// Attach a specific enthalpy to an edge. At most once per tick.
    pub fn set_heat(&mut self, node: NodeId, edge: usize, h: Real) -> GraphResult<()> {
        if !h.is_finite() {
            return Err(GraphError::NonFinite {
                what: "heat energy",
                node,
                value: h,
            });
        }
        let slot = self.heat_slot_mut(node, edge)?;
        if slot.updated {
            return Err(GraphError::HeatAlreadySet { node, edge });
        }
        slot.h = h;
        slot.updated = true;
        slot.no_energy = false;
        self.bump_revision();
        Ok(())
    }

    /// Mark an edge as carrying no energy this tick. Idempotent, but
    /// refuses to override an enthalpy that already arrived.
    pub fn mark_no_energy(&mut self, node: NodeId, edge: usize) -> GraphResult<()> {
        let slot = self.heat_slot_mut(node, edge)?;
        if slot.updated {
            return Err(GraphError::HeatAlreadySet { node, edge });
        }
        if !slot.no_energy {
            slot.no_energy = true;
            self.bump_revision();
        }
        Ok(())
    }

    /// One mixing pass over all phased nodes. Returns whether any edge
    /// gained an enthalpy or a no-energy marker.
    pub fn mix_phased(&mut self) -> GraphResult<bool> {
        let before = self.revision();
        let tol = self.tolerances().no_energy_flow;
        for idx in 0..self.len() {
            let id = NodeId::from_index(idx);
            if !self.domain(id).is_phased() {
                continue;
            }
            self.mix_node(id, tol)?;
        }
        Ok(self.revision() != before)
    }

    fn mix_node(&mut self, id: NodeId, tol: Real) -> GraphResult<()> {
        // Mixing needs the complete flow picture first.
        struct Plan {
            still: Vec<usize>,
            outbound_unset: Vec<usize>,
            mixture: Option<Real>,
        }
        let plan = {
            let n = self.node(id);
            if n.edges().iter().any(|e| !e.flow_updated()) {
                return Ok(());
            }
            let mut still = Vec::new();
            let mut outbound_unset = Vec::new();
            let mut flow_sum = 0.0;
            let mut energy_sum = 0.0;
            let mut inbound_pending = false;
            let mut total_magnitude = 0.0;
            for (i, e) in n.edges().iter().enumerate() {
                let f = e.flow().unwrap_or(0.0);
                total_magnitude += f.abs();
                if f > tol {
                    match e.heat_state() {
                        crate::node::HeatState::Energy(h) => {
                            flow_sum += f;
                            energy_sum += f * h;
                        }
                        crate::node::HeatState::Pending => inbound_pending = true,
                        crate::node::HeatState::NoEnergy => {}
                    }
                } else if f < -tol {
                    if matches!(e.heat_state(), crate::node::HeatState::Pending) {
                        outbound_unset.push(i);
                    }
                } else if matches!(e.heat_state(), crate::node::HeatState::Pending) {
                    still.push(i);
                }
            }
            if total_magnitude < tol {
                // Nothing moves: every pending edge carries no energy.
                Plan {
                    still: (0..n.edges().len())
                        .filter(|&i| {
                            matches!(n.edges()[i].heat_state(), crate::node::HeatState::Pending)
                        })
                        .collect(),
                    outbound_unset: Vec::new(),
                    mixture: None,
                }
            } else if inbound_pending || flow_sum <= tol {
                Plan {
                    still,
                    outbound_unset: Vec::new(),
                    mixture: None,
                }
            } else {
                Plan {
                    still,
                    outbound_unset,
                    mixture: Some(energy_sum / flow_sum),
                }
            }
        };
        for i in plan.still {
            self.mark_no_energy(id, i)?;
        }
        if let Some(h_out) = plan.mixture {
            for i in plan.outbound_unset {
                self.set_heat(id, i, h_out)?;
            }
        }
        Ok(())
    }
}
