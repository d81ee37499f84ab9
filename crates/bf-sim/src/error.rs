//! Error types for network orchestration.

use bf_components::ElementError;
use bf_graph::GraphError;
use bf_solver::SolverError;
use thiserror::Error;

pub type SimResult<T> = Result<T, SimError>;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Element {name} is already registered")]
    DuplicateElement { name: String },

    #[error("No element named {name}")]
    UnknownElement { name: String },

    #[error("Tick did not finish: {what}")]
    Unfinished { what: String },

    #[error("Element error: {0}")]
    Element(#[from] ElementError),

    #[error("Value channel error: {0}")]
    Graph(#[from] GraphError),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),
}
