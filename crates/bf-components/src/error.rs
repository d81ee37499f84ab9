//! Error types for element behavior.

use bf_fluids::FluidError;
use bf_graph::GraphError;
use thiserror::Error;

pub type ElementResult<T> = Result<T, ElementError>;

/// Failures raised by element construction, wiring and propagation.
#[derive(Error, Debug)]
pub enum ElementError {
    /// Structural violation: wrong node count, name mismatch, a value
    /// set where the element expected freedom.
    #[error("Model error in {element}: {what}")]
    Model { element: String, what: String },

    /// Inconsistent or non-finite values encountered while calculating.
    #[error("Calculation error in {element}: {what}")]
    Calculation { element: String, what: String },

    /// State requested from an element that does not store that variable.
    #[error("Element {element} has no state variable {field}")]
    NoSuchStateVariable { element: String, field: String },

    /// A structural assumption about through-flow was invalidated.
    #[error("No flow-through on element {element}")]
    NoFlowThrough { element: String },

    /// Operation the element kind does not support.
    #[error("Unsupported operation: {what}")]
    Unsupported { what: &'static str },

    #[error("Value channel error: {0}")]
    Graph(#[from] GraphError),

    #[error("Fluid property error: {0}")]
    Fluid(#[from] FluidError),
}

impl ElementError {
    pub fn model(element: impl Into<String>, what: impl Into<String>) -> Self {
        Self::Model {
            element: element.into(),
            what: what.into(),
        }
    }

    pub fn calculation(element: impl Into<String>, what: impl Into<String>) -> Self {
        Self::Calculation {
            element: element.into(),
            what: what.into(),
        }
    }
}
