use crate::CoreError;

/// Floating point type used throughout the engine.
pub type Real = f64;

/// Tolerances shared by the value channel and the solvers.
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    /// Residual allowed in a node's flow balance.
    pub flow_balance: Real,
    /// Effort drift across a bridged element before a warning is emitted.
    pub bridged_drift: Real,
    /// Flow magnitude that counts as "carrying" for the drift warning.
    pub drift_flow: Real,
    /// Flow magnitude below which a phased edge carries no energy.
    pub no_energy_flow: Real,
    /// Disagreement allowed between a solver result and an already-set slot.
    pub solver_agreement: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            flow_balance: 1e-8,
            bridged_drift: 1e-2,
            drift_flow: 1e-6,
            no_energy_flow: 1e-10,
            solver_agreement: 1e-6,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Real) -> bool {
    let diff = (a - b).abs();
    diff <= tol || diff <= tol * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Map `-0.0` to `+0.0`, leave everything else untouched.
pub fn canonical_zero(v: Real) -> Real {
    if v == 0.0 { 0.0 } else { v }
}
