//! Error types for solver operations.

use bf_components::ElementError;
use bf_graph::GraphError;
use thiserror::Error;

pub type SolverResult<T> = Result<T, SolverError>;

/// Errors that can occur while sweeping or reducing a network.
#[derive(Error, Debug)]
pub enum SolverError {
    /// The sweep stalled and no enabled reduction tier could resolve the
    /// remaining subnet.
    #[error("No solution for subnet ({context})")]
    NoSolution { context: String },

    /// The sweep exceeded its iteration budget.
    #[error("Sweep exceeded {passes} passes without settling")]
    SweepBudgetExceeded { passes: usize },

    /// Conflicting absolute efforts on nodes merged by bridging.
    #[error("Inconsistent anchors after merging: {what}")]
    InconsistentAnchors { what: String },

    #[error("Element error: {0}")]
    Element(#[from] ElementError),

    #[error("Value channel error: {0}")]
    Graph(#[from] GraphError),
}
