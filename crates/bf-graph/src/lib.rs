//! bf-graph: the value channel of bondflow.
//!
//! Owns the node arena and everything that moves through it during one
//! simulation tick: one effort per node, one signed flow per node/element
//! edge, and (on phased-fluid nodes) one specific-enthalpy value per edge.
//! Every slot carries an updated-flag; setters refuse double writes and
//! non-finite values, and the bank closes flow balances and mixes phased
//! enthalpies as soon as enough neighbouring values are known.

pub mod bank;
pub mod domain;
pub mod error;
pub mod node;
pub mod phased;
pub mod validate;

pub use bank::NodeBank;
pub use domain::Domain;
pub use error::{GraphError, GraphResult};
pub use node::{Edge, HeatState, Node};
