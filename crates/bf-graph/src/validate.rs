//! End-of-tick invariant checks.

use crate::bank::NodeBank;
use crate::error::{GraphError, GraphResult};
use crate::node::HeatState;

impl NodeBank {
    /// Verify the universal end-of-tick invariants:
    /// every effort and flow set, flow balances closed within tolerance,
    /// and every phased edge resolved (enthalpy or no-energy marker).
    pub fn validate_tick(&self) -> GraphResult<()> {
        let tol = self.tolerances().flow_balance;
        for n in self.nodes() {
            if !n.effort_updated() {
                return Err(GraphError::Incomplete {
                    node: n.id(),
                    what: "effort never set",
                });
            }
            let mut sum = 0.0;
            for e in n.edges() {
                match e.flow() {
                    Some(f) => sum += f,
                    None => {
                        return Err(GraphError::Incomplete {
                            node: n.id(),
                            what: "flow never set",
                        });
                    }
                }
                if matches!(e.heat_state(), HeatState::Pending) {
                    return Err(GraphError::Incomplete {
                        node: n.id(),
                        what: "phased edge unresolved",
                    });
                }
            }
            if n.degree() > 1 && !n.is_reference() && sum.abs() > tol {
                return Err(GraphError::BalanceViolated {
                    node: n.id(),
                    residual: sum,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;
    use bf_core::ElemId;

    #[test]
    fn complete_node_validates() {
        let mut bank = NodeBank::new();
        let n = bank.add_node(Domain::Electrical, Some("n".into()));
        bank.connect(n, ElemId::from_index(0), Domain::Electrical)
            .unwrap();
        bank.connect(n, ElemId::from_index(1), Domain::Electrical)
            .unwrap();
        bank.set_effort(n, 1.0).unwrap();
        bank.set_flow(n, 0, 0.5).unwrap();
        bank.validate_tick().unwrap();
    }

    #[test]
    fn missing_effort_is_incomplete() {
        let mut bank = NodeBank::new();
        let n = bank.add_node(Domain::Electrical, None);
        bank.connect(n, ElemId::from_index(0), Domain::Electrical)
            .unwrap();
        bank.set_flow(n, 0, 0.0).unwrap();
        assert!(matches!(
            bank.validate_tick(),
            Err(GraphError::Incomplete { .. })
        ));
    }
}
