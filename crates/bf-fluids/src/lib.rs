//! bf-fluids: fluid property queries for the two-phase channel.
//!
//! The engine consumes the [`FluidProperties`] trait only; any steam-table
//! wrapper can sit behind it. The crate ships [`LinearTwoPhase`], an
//! analytic model with a linear temperature/enthalpy relation in the
//! single-phase regions and a saturation plateau of width `h_evap`.

pub mod error;
pub mod linear;
pub mod properties;

pub use error::{FluidError, FluidResult};
pub use linear::LinearTwoPhase;
pub use properties::FluidProperties;
