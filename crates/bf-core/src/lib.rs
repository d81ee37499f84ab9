//! bf-core: stable foundation for bondflow.
//!
//! Contains:
//! - ids (stable compact IDs for the node/element arenas)
//! - numeric (Real + tolerances + float helpers)
//! - units (uom SI types + constructors)
//! - report (warning record + injected reporter)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod report;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use ids::{ElemId, NodeId};
pub use numeric::*;
pub use report::{Reporter, Warning, WarningKind};
