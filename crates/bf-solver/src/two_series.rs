//! Closed-form fallback for a lone unknown node.
//!
//! The classic case is a pair of resistors in series between a source
//! terminal and an origin whose middle node survived reduction (an
//! anchor or a source on a neighbour blocks the series rule). The
//! balance at that node has a closed form as the conductance-weighted
//! mean of the neighbouring efforts; the generalization to any number
//! of resistive neighbours comes for free.

use bf_core::Real;

use crate::linnet::{Branch, BranchKind, LinNet};

/// Solve one unknown node whose incident branches are all resistors
/// with known far-end efforts. Returns whether a node was closed.
pub fn close_unknown_node(
    net: &LinNet,
    branches: &[Branch],
    eliminated: &[bool],
    efforts: &mut [Option<Real>],
) -> bool {
    for i in 0..net.nodes.len() {
        if eliminated[i] || efforts[i].is_some() || net.nodes[i].anchor.is_some() {
            continue;
        }
        let Some(inj) = net.nodes[i].injection else {
            continue;
        };
        let mut num = inj;
        let mut den = 0.0;
        let mut solvable = true;
        for b in branches.iter().filter(|b| b.alive) {
            let far = if b.n[0] == i {
                b.n[1]
            } else if b.n[1] == i {
                b.n[0]
            } else {
                continue;
            };
            let BranchKind::Resistor(r) = b.kind else {
                solvable = false;
                break;
            };
            let Some(e_far) = efforts[far] else {
                solvable = false;
                break;
            };
            num += e_far / r;
            den += 1.0 / r;
        }
        if solvable && den > 0.0 {
            efforts[i] = Some(num / den);
            return true;
        }
    }
    false
}

/// Closed form for a source in series with resistor chains: walk from
/// both source terminals through pass-through nodes until a known
/// effort appears on each side, then the loop current is
/// `(e_left + E - e_right) / (R_left + R_right)`.
pub fn close_source_loop(
    net: &LinNet,
    branches: &[Branch],
    eliminated: &[bool],
    efforts: &[Option<Real>],
    flows: &mut [Option<Real>],
) -> bool {
    for (b_ix, b) in branches.iter().enumerate() {
        if !b.alive || flows[b_ix].is_some() {
            continue;
        }
        let BranchKind::EffortSource(e_src) = b.kind else {
            continue;
        };
        let Some((e_left, r_left)) = walk_chain(net, branches, eliminated, efforts, b_ix, b.n[0])
        else {
            continue;
        };
        let Some((e_right, r_right)) =
            walk_chain(net, branches, eliminated, efforts, b_ix, b.n[1])
        else {
            continue;
        };
        let total = r_left + r_right;
        if total <= 0.0 {
            continue;
        }
        flows[b_ix] = Some((e_left + e_src - e_right) / total);
        return true;
    }
    false
}

/// Follow a chain of degree-2 resistor nodes away from `from_branch`
/// until a node with a known effort; returns that effort and the
/// accumulated resistance.
fn walk_chain(
    net: &LinNet,
    branches: &[Branch],
    eliminated: &[bool],
    efforts: &[Option<Real>],
    from_branch: usize,
    start: usize,
) -> Option<(Real, Real)> {
    let mut node = start;
    let mut came = from_branch;
    let mut r_acc = 0.0;
    for _ in 0..branches.len() + 1 {
        if let Some(e) = efforts[node] {
            return Some((e, r_acc));
        }
        if eliminated[node]
            || net.nodes[node].anchor.is_some()
            || !matches!(net.nodes[node].injection, Some(inj) if inj.abs() <= 1e-12)
        {
            return None;
        }
        let incident: Vec<usize> = (0..branches.len())
            .filter(|&i| {
                branches[i].alive && (branches[i].n[0] == node || branches[i].n[1] == node)
            })
            .collect();
        if incident.len() != 2 {
            return None;
        }
        let next = *incident.iter().find(|&&i| i != came)?;
        let BranchKind::Resistor(r) = branches[next].kind else {
            return None;
        };
        r_acc += r;
        node = if branches[next].n[0] == node {
            branches[next].n[1]
        } else {
            branches[next].n[0]
        };
        came = next;
    }
    None
}
