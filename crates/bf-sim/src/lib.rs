//! bf-sim: network orchestration for bondflow.
//!
//! A [`Network`] owns the node bank and element arena, wires elements to
//! nodes, and drives the per-tick triplet: `prepare_calculation` resets
//! updated-flags and rotates staged states, `do_calculation` sweeps to a
//! fixed point and escalates stalls to the enabled solver tiers, and
//! `is_calculation_finished` asserts the end-of-tick invariants.

pub mod error;
pub mod network;
pub mod state_io;

pub use error::{SimError, SimResult};
pub use network::Network;
pub use state_io::StateRecord;
