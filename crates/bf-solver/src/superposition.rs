//! Superposition over independent excitations.
//!
//! One overlay per nonzero excitation: every other effort source is
//! neutralized by merging its endpoints (a bridge, which is exactly the
//! shortcut-merging step that keeps parallel detection working), every
//! other known flow opens its branch, and every other anchor and
//! injection drops to zero. Each overlay is solved by reduction and the
//! per-node efforts and per-branch flows add linearly.

use bf_core::Real;

use crate::error::{SolverError, SolverResult};
use crate::linnet::{Branch, BranchKind, LinNet, LinNode, LinSolution};
use crate::reduce;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Excitation {
    /// Branch index of a nonzero effort source.
    Source(usize),
    /// Branch index of a nonzero known flow.
    Flow(usize),
    /// Node index with a nonzero anchor.
    Anchor(usize),
    /// Node index with a nonzero settled injection.
    Injection(usize),
}

pub fn solve_superposed(net: &LinNet) -> SolverResult<LinSolution> {
    let mut excitations = Vec::new();
    for (b, branch) in net.branches.iter().enumerate() {
        match branch.kind {
            BranchKind::EffortSource(e) if e != 0.0 => excitations.push(Excitation::Source(b)),
            BranchKind::KnownFlow(f) if f != 0.0 => excitations.push(Excitation::Flow(b)),
            _ => {}
        }
    }
    for (i, node) in net.nodes.iter().enumerate() {
        if matches!(node.anchor, Some(e) if e != 0.0) {
            excitations.push(Excitation::Anchor(i));
        }
        if matches!(node.injection, Some(f) if f != 0.0) {
            excitations.push(Excitation::Injection(i));
        }
    }
    if excitations.len() <= 1 {
        return reduce::solve(net);
    }

    let mut total = LinSolution {
        efforts: vec![Some(0.0); net.nodes.len()],
        flows: vec![Some(0.0); net.branches.len()],
        absolute: vec![true; net.nodes.len()],
    };
    for &active in &excitations {
        let overlay = build_overlay(net, active)?;
        let sol = reduce::solve(&overlay.net)?;
        accumulate(net, &overlay, &sol, active, &mut total)?;
    }
    Ok(total)
}

struct Overlay {
    net: LinNet,
    /// Base node -> overlay node.
    node_map: Vec<usize>,
    /// Base branch -> overlay branch, `None` when neutralized away.
    branch_map: Vec<Option<usize>>,
}

fn build_overlay(net: &LinNet, active: Excitation) -> SolverResult<Overlay> {
    // Merge the endpoints of every neutralized effort source.
    let mut parent: Vec<usize> = (0..net.nodes.len()).collect();
    fn find(parent: &mut Vec<usize>, i: usize) -> usize {
        if parent[i] != i {
            let root = find(parent, parent[i]);
            parent[i] = root;
        }
        parent[i]
    }
    for (b, branch) in net.branches.iter().enumerate() {
        if matches!(branch.kind, BranchKind::EffortSource(_)) && active != Excitation::Source(b) {
            let (ra, rb) = (
                find(&mut parent, branch.n[0]),
                find(&mut parent, branch.n[1]),
            );
            if ra != rb {
                parent[rb] = ra;
            }
        }
    }

    let mut rep_ix = vec![usize::MAX; net.nodes.len()];
    let mut nodes: Vec<LinNode> = Vec::new();
    let mut node_map = vec![usize::MAX; net.nodes.len()];
    for i in 0..net.nodes.len() {
        let rep = find(&mut parent, i);
        if rep_ix[rep] == usize::MAX {
            rep_ix[rep] = nodes.len();
            nodes.push(LinNode {
                members: Vec::new(),
                anchor: None,
                injection: Some(0.0),
                component: 0,
            });
        }
        let ix = rep_ix[rep];
        node_map[i] = ix;
        nodes[ix].members.extend(net.nodes[i].members.iter().copied());

        let anchor = match net.nodes[i].anchor {
            Some(e) if active == Excitation::Anchor(i) => Some(e),
            Some(_) => Some(0.0),
            None => None,
        };
        if let Some(e) = anchor {
            match nodes[ix].anchor {
                None => nodes[ix].anchor = Some(e),
                Some(existing) if (existing - e).abs() <= 1e-9 => {}
                Some(existing) => {
                    return Err(SolverError::InconsistentAnchors {
                        what: format!("{existing} vs {e} after neutralization"),
                    });
                }
            }
        }
        match (net.nodes[i].injection, nodes[ix].injection) {
            (None, _) => nodes[ix].injection = None,
            (Some(f), Some(acc)) => {
                let contribution = if active == Excitation::Injection(i) { f } else { 0.0 };
                nodes[ix].injection = Some(acc + contribution);
            }
            (Some(_), None) => {}
        }
    }

    let mut branches: Vec<Branch> = Vec::new();
    let mut branch_map = vec![None; net.branches.len()];
    for (b, branch) in net.branches.iter().enumerate() {
        let keep = match branch.kind {
            BranchKind::Resistor(_) => Some(branch.kind),
            BranchKind::EffortSource(_) => {
                if active == Excitation::Source(b) {
                    Some(branch.kind)
                } else {
                    None
                }
            }
            BranchKind::KnownFlow(_) => {
                if active == Excitation::Flow(b) {
                    Some(branch.kind)
                } else {
                    // A neutralized flow source opens its branch.
                    None
                }
            }
        };
        if let Some(kind) = keep {
            branch_map[b] = Some(branches.len());
            branches.push(Branch {
                elem: branch.elem,
                kind,
                n: [node_map[branch.n[0]], node_map[branch.n[1]]],
                alive: true,
            });
        }
    }

    // Recompute components on the overlay topology.
    let mut cparent: Vec<usize> = (0..nodes.len()).collect();
    for b in &branches {
        let (ra, rb) = (find(&mut cparent, b.n[0]), find(&mut cparent, b.n[1]));
        if ra != rb {
            cparent[rb] = ra;
        }
    }
    let mut comp_of_rep = vec![usize::MAX; nodes.len()];
    let mut next_comp = 0;
    for i in 0..nodes.len() {
        let rep = find(&mut cparent, i);
        if comp_of_rep[rep] == usize::MAX {
            comp_of_rep[rep] = next_comp;
            next_comp += 1;
        }
        nodes[i].component = comp_of_rep[rep];
    }

    Ok(Overlay {
        net: LinNet { nodes, branches },
        node_map,
        branch_map,
    })
}

fn accumulate(
    net: &LinNet,
    overlay: &Overlay,
    sol: &LinSolution,
    active: Excitation,
    total: &mut LinSolution,
) -> SolverResult<()> {
    for i in 0..net.nodes.len() {
        let ov = overlay.node_map[i];
        match (total.efforts[i], sol.efforts.get(ov).copied().flatten()) {
            (Some(acc), Some(e)) => {
                total.efforts[i] = Some(acc + e);
                total.absolute[i] &= sol.absolute.get(ov).copied().unwrap_or(false);
            }
            _ => {
                total.efforts[i] = None;
                total.absolute[i] = false;
            }
        }
    }

    for b in 0..net.branches.len() {
        let overlay_flow = match overlay.branch_map[b] {
            Some(ov) => sol.flows.get(ov).copied().flatten(),
            None => match net.branches[b].kind {
                // Opened flow source: nothing moves in this overlay.
                BranchKind::KnownFlow(_) => Some(0.0),
                // Merged effort source: recover its through-flow from
                // the balance at one of its base endpoints.
                BranchKind::EffortSource(_) => {
                    merged_source_flow(net, overlay, sol, active, b)
                }
                BranchKind::Resistor(_) => None,
            },
        };
        match (total.flows[b], overlay_flow) {
            (Some(acc), Some(f)) => total.flows[b] = Some(acc + f),
            _ => total.flows[b] = None,
        }
    }
    Ok(())
}

/// Through-flow of a neutralized (merged) effort source, from the flow
/// balance at one of its original endpoints.
fn merged_source_flow(
    net: &LinNet,
    overlay: &Overlay,
    sol: &LinSolution,
    active: Excitation,
    source: usize,
) -> Option<Real> {
    'endpoint: for (side, &node) in net.branches[source].n.iter().enumerate() {
        if net.nodes[node].anchor.is_some() {
            // The anchored endpoint may exchange flow with the implicit
            // ground; its balance cannot pin the source.
            continue;
        }
        let inj = match net.nodes[node].injection {
            Some(f) if active == Excitation::Injection(node) => f,
            Some(_) => 0.0,
            None => continue,
        };
        let mut sum = inj;
        for (b, branch) in net.branches.iter().enumerate() {
            if b == source {
                continue;
            }
            let sign = if branch.n[0] == node {
                -1.0
            } else if branch.n[1] == node {
                1.0
            } else {
                continue;
            };
            let f = match overlay.branch_map[b] {
                Some(ov) => sol.flows.get(ov).copied().flatten(),
                None => match branch.kind {
                    BranchKind::KnownFlow(_) => Some(0.0),
                    _ => None,
                },
            };
            match f {
                Some(f) => sum += sign * f,
                None => continue 'endpoint,
            }
        }
        // Balance: sum + (source contribution) = 0. At n0 the source
        // contributes -f, at n1 it contributes +f.
        let f = if side == 0 { sum } else { -sum };
        return Some(f);
    }
    None
}
