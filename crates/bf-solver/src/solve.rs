//! Tier escalation for stalled networks.
//!
//! Propagation settles everything it can; what remains is handed to the
//! reduction solvers. The transfer tier widens the extraction to the
//! storage elements: self-capacitances pin their nodes at the state the
//! tick started with (every port, which also stands in for the ground
//! synthesis when no origin survives the substitution), mutual
//! capacitances become effort sources of their stored difference, and
//! two-port inductances become known flows. The solved flows land back
//! on the bank, where the storage elements integrate them through their
//! ordinary `do_calc` — efforts consistent with the state at the start
//! of the tick, states advanced from fully solved flows.

use bf_components::Element;
use bf_graph::NodeBank;

use crate::error::{SolverError, SolverResult};
use crate::linnet::{self, ExtractOptions};
use crate::sweep::{run_sweep, SweepOutcome};
use crate::{reduce, superposition};

/// Which reduction tiers a network has enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolveTiers {
    /// Recursive series/parallel/star simplification.
    pub reduction: bool,
    /// Per-source overlays for multi-excitation networks.
    pub superposition: bool,
    /// Storage substitution (capacitances as pinned sources).
    pub transfer: bool,
}

impl SolveTiers {
    pub fn any(&self) -> bool {
        self.reduction || self.superposition || self.transfer
    }
}

/// One stall-resolution attempt. Returns whether anything was solved
/// and written back.
pub fn resolve_stall(
    elements: &mut [Element],
    bank: &mut NodeBank,
    tiers: SolveTiers,
) -> SolverResult<bool> {
    if !tiers.any() {
        return Ok(false);
    }
    let opts = ExtractOptions {
        include_storage: tiers.transfer,
    };
    let Some(net) = linnet::extract(elements, bank, opts)? else {
        return Ok(false);
    };

    let excitations = net.excitation_count();
    tracing::debug!(
        nodes = net.nodes.len(),
        branches = net.branches.len(),
        excitations,
        "reducing stalled subnet"
    );
    let attempt = if excitations > 1 && tiers.superposition {
        superposition::solve_superposed(&net)
    } else {
        reduce::solve(&net)
    };
    let sol = match attempt {
        Ok(sol) => sol,
        // An unsolvable picture is not fatal by itself: the caller sees
        // an unfinished tick (something may still be waiting for input,
        // e.g. an unarmed source).
        Err(SolverError::NoSolution { context }) => {
            tracing::warn!(%context, excitations, "no solution for stalled subnet");
            return Ok(false);
        }
        Err(e) => return Err(e),
    };
    linnet::apply(&net, &sol, elements, bank)?;
    Ok(true)
}

/// Full per-tick calculation: sweep, escalate on stall, sweep again.
///
/// Returns `true` when every element finished. `false` without an error
/// means the network is incomplete but no tier made progress — callers
/// treat that as a solver failure at their discretion.
pub fn run_calculation(
    elements: &mut [Element],
    bank: &mut NodeBank,
    tiers: SolveTiers,
) -> SolverResult<bool> {
    let mut last_stall = None;
    loop {
        match run_sweep(elements, bank)? {
            SweepOutcome::Finished => return Ok(true),
            SweepOutcome::Stalled => {
                // Two stalls at the same revision: the tiers are out of
                // ideas.
                let revision = bank.revision();
                if last_stall == Some(revision) {
                    return Ok(false);
                }
                last_stall = Some(revision);
                if !resolve_stall(elements, bank, tiers)? {
                    return Ok(false);
                }
            }
        }
    }
}
