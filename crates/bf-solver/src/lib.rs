//! bf-solver: propagation sweep and network-reduction solvers.
//!
//! The sweep drives element-local propagation to a fixed point. What it
//! cannot settle — series dividers, bridges, meshes — is extracted into
//! a linear picture and solved by recursive simplification, lifted to
//! superposition overlays when several excitations drive the subnet,
//! and widened to the storage elements by the transfer tier.

pub mod error;
pub mod linnet;
pub mod reduce;
pub mod solve;
pub mod star;
pub mod superposition;
pub mod sweep;
pub mod two_series;

pub use error::{SolverError, SolverResult};
pub use linnet::{ExtractOptions, LinNet, LinSolution};
pub use solve::{resolve_stall, run_calculation, SolveTiers};
pub use sweep::{pass_budget, run_sweep, SweepOutcome};
