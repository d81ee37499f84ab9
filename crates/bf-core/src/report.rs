//! Warning records surfaced through an injected reporter.
//!
//! Numerical-tolerance findings (bridged drift, residual flow on an open
//! element, solver disagreement with an already-set slot) are contained
//! locally: the engine clamps or keeps the existing value and reports the
//! observation. With no reporter installed they are dropped.

use core::fmt;

use crate::Real;

/// A contained numerical observation, not an error.
#[derive(Clone, Debug, PartialEq)]
pub struct Warning {
    /// Which check fired.
    pub kind: WarningKind,
    /// Element or node name if one was available.
    pub subject: Option<String>,
    /// Magnitude of the observed residual or drift.
    pub magnitude: Real,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WarningKind {
    /// Effort difference across a bridged element while flow passes.
    BridgedDrift,
    /// Nonzero flow on an open element, clamped to zero.
    OpenResidualFlow,
    /// Solver result disagrees with a value already on the node.
    SolverDisagreement,
    /// A ring with no anchor collapsed to zero effort and flow.
    IsolatedRing,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            WarningKind::BridgedDrift => "effort drift across bridged element",
            WarningKind::OpenResidualFlow => "residual flow on open element",
            WarningKind::SolverDisagreement => "solver disagrees with set value",
            WarningKind::IsolatedRing => "isolated ring collapsed",
        };
        match &self.subject {
            Some(s) => write!(f, "{label} at {s}: {:e}", self.magnitude),
            None => write!(f, "{label}: {:e}", self.magnitude),
        }
    }
}

/// Injected warning sink. `None` drops warnings.
pub type Reporter = Box<dyn Fn(&Warning) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_check() {
        let w = Warning {
            kind: WarningKind::BridgedDrift,
            subject: Some("R7".into()),
            magnitude: 0.03,
        };
        let msg = format!("{w}");
        assert!(msg.contains("bridged"));
        assert!(msg.contains("R7"));
    }
}
