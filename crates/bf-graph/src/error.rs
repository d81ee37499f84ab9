use bf_core::NodeId;
use thiserror::Error;

pub type GraphResult<T> = Result<T, GraphError>;

/// Failures raised by the value channel.
///
/// `NonFinite` and `BalanceViolated` are calculation failures; the
/// remaining variants are structural (model) failures. Both classes are
/// fatal to the running tick and never swallowed.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Non-finite value for {what} at node {node}: {value}")]
    NonFinite {
        what: &'static str,
        node: NodeId,
        value: f64,
    },

    #[error("Effort already set this tick at node {node}")]
    EffortAlreadySet { node: NodeId },

    #[error("Flow already set this tick at node {node}, edge {edge}")]
    FlowAlreadySet { node: NodeId, edge: usize },

    #[error("Heat energy already set this tick at node {node}, edge {edge}")]
    HeatAlreadySet { node: NodeId, edge: usize },

    #[error("Heat energy on non-phased node {node}")]
    HeatOnUnphasedNode { node: NodeId },

    #[error("Domain mismatch connecting element to node {node}")]
    DomainMismatch { node: NodeId },

    #[error("Flow balance violated at node {node}: residual {residual:e}")]
    BalanceViolated { node: NodeId, residual: f64 },

    #[error("Tick incomplete at node {node}: {what}")]
    Incomplete { node: NodeId, what: &'static str },
}
