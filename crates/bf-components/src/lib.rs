//! bf-components: the element kinds of bondflow.
//!
//! Each kind owns its ports into the value channel and implements the
//! per-tick lifecycle: `prepare` (rotate staged state, reset scratch),
//! `do_calc` (push every value derivable from what is already on the
//! nodes), `finished` (own state staged and all connected slots set).
//! The closed [`Element`] union dispatches over the kinds; solvers match
//! on it to extract linear subnets.

pub mod capacitance;
pub mod common;
pub mod dissipator;
pub mod element;
pub mod enforcer;
pub mod error;
pub mod evaporator;
pub mod exchanger;
pub mod inductance;
pub mod origin;
pub mod reservoir;
pub mod source;
#[cfg(feature = "square-law")]
pub mod square;

pub use capacitance::{MutualCapacitance, SelfCapacitance};
pub use common::{Port, StorageState};
pub use dissipator::{DissipatorMode, LinearDissipator};
pub use element::{Element, ElementKind};
pub use enforcer::Enforcer;
pub use error::{ElementError, ElementResult};
pub use evaporator::ExpandingExchanger;
pub use exchanger::ThermalExchanger;
pub use inductance::Inductance;
pub use origin::Origin;
pub use reservoir::{OutletKind, SteamReservoir};
pub use source::{EffortSource, FlowSource};
#[cfg(feature = "square-law")]
pub use square::SquareDissipator;
