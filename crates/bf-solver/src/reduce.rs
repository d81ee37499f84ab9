//! Recursive network reduction with layered back-substitution.
//!
//! The rule order is parallel, series, star→delta on degree-3 centers,
//! star→polygon on wider centers. Every synthetic branch remembers its
//! rule and parents, so once the residual net is solved the layers
//! unwind in reverse: series restores its middle node from the drop
//! across the first parent, a star restores its center as the
//! conductance-weighted mean of its outer nodes, and parallel children
//! recover their share of the delta effort directly.

use bf_core::Real;

use crate::error::{SolverError, SolverResult};
use crate::linnet::{Branch, BranchKind, LinNet, LinSolution};
use crate::star::star_to_polygon;
use crate::two_series::{close_source_loop, close_unknown_node};

const ZERO_TOL: Real = 1e-12;

enum Reduction {
    /// Branch whose endpoints merged into one node: carries no net flow.
    SelfLoop { branch: usize },
    Parallel {
        merged: usize,
        children: [usize; 2],
    },
    Series {
        merged: usize,
        children: [usize; 2],
        mid: usize,
    },
    Star {
        center: usize,
        /// `(branch, outer node)` per arm.
        arms: Vec<(usize, usize)>,
    },
}

struct Work {
    branches: Vec<Branch>,
    eliminated: Vec<bool>,
    log: Vec<Reduction>,
}

impl Work {
    fn alive_incident(&self, node: usize) -> Vec<usize> {
        (0..self.branches.len())
            .filter(|&b| {
                self.branches[b].alive
                    && (self.branches[b].n[0] == node || self.branches[b].n[1] == node)
            })
            .collect()
    }

    fn resistance(&self, b: usize) -> Option<Real> {
        match self.branches[b].kind {
            BranchKind::Resistor(r) => Some(r),
            _ => None,
        }
    }

    fn other_end(&self, b: usize, node: usize) -> usize {
        let n = self.branches[b].n;
        if n[0] == node { n[1] } else { n[0] }
    }
}

/// Solve a linear net by reduction; the result is indexed like `net`
/// (synthetic layers are internal).
pub fn solve(net: &LinNet) -> SolverResult<LinSolution> {
    let mut work = Work {
        branches: net.branches.clone(),
        eliminated: vec![false; net.nodes.len()],
        log: Vec::new(),
    };

    // Monotone node-count reduction bounds the layer count.
    loop {
        if kill_self_loops(&mut work)? {
            continue;
        }
        if merge_parallel(&mut work) {
            continue;
        }
        if merge_series(net, &mut work) {
            continue;
        }
        if transform_star(net, &mut work, Some(3)) {
            continue;
        }
        if transform_star(net, &mut work, None) {
            continue;
        }
        break;
    }

    let (mut efforts, mut flows, absolute) = solve_residual(net, &work)?;
    unwind(&work, &mut efforts, &mut flows);

    flows.truncate(net.branches.len());
    Ok(LinSolution {
        efforts,
        flows,
        absolute,
    })
}

fn reducible(net: &LinNet, work: &Work, node: usize) -> bool {
    !work.eliminated[node]
        && net.nodes[node].anchor.is_none()
        && matches!(net.nodes[node].injection, Some(inj) if inj.abs() <= ZERO_TOL)
}

fn kill_self_loops(work: &mut Work) -> SolverResult<bool> {
    for b in 0..work.branches.len() {
        let branch = &work.branches[b];
        if !branch.alive || branch.n[0] != branch.n[1] {
            continue;
        }
        match branch.kind {
            BranchKind::Resistor(_) => {
                work.branches[b].alive = false;
                work.log.push(Reduction::SelfLoop { branch: b });
                return Ok(true);
            }
            BranchKind::EffortSource(e) => {
                if e != 0.0 {
                    return Err(SolverError::NoSolution {
                        context: format!("effort source of {e} bridged onto itself"),
                    });
                }
                work.branches[b].alive = false;
                work.log.push(Reduction::SelfLoop { branch: b });
                return Ok(true);
            }
            BranchKind::KnownFlow(_) => {}
        }
    }
    Ok(false)
}

fn merge_parallel(work: &mut Work) -> bool {
    for i in 0..work.branches.len() {
        let Some(ri) = work.resistance(i) else { continue };
        if !work.branches[i].alive {
            continue;
        }
        for j in (i + 1)..work.branches.len() {
            let Some(rj) = work.resistance(j) else { continue };
            if !work.branches[j].alive {
                continue;
            }
            let (a, b) = (work.branches[i].n[0], work.branches[i].n[1]);
            let same = work.branches[j].n == [a, b] || work.branches[j].n == [b, a];
            if !same || a == b {
                continue;
            }
            work.branches[i].alive = false;
            work.branches[j].alive = false;
            let merged = work.branches.len();
            work.branches.push(Branch {
                elem: None,
                kind: BranchKind::Resistor(crate::star::parallel(ri, rj)),
                n: [a, b],
                alive: true,
            });
            work.log.push(Reduction::Parallel {
                merged,
                children: [i, j],
            });
            return true;
        }
    }
    false
}

fn merge_series(net: &LinNet, work: &mut Work) -> bool {
    for k in 0..net.nodes.len() {
        if !reducible(net, work, k) {
            continue;
        }
        let incident = work.alive_incident(k);
        if incident.len() != 2 {
            continue;
        }
        let (c1, c2) = (incident[0], incident[1]);
        let (Some(r1), Some(r2)) = (work.resistance(c1), work.resistance(c2)) else {
            continue;
        };
        let a = work.other_end(c1, k);
        let b = work.other_end(c2, k);
        work.branches[c1].alive = false;
        work.branches[c2].alive = false;
        let merged = work.branches.len();
        work.branches.push(Branch {
            elem: None,
            kind: BranchKind::Resistor(r1 + r2),
            n: [a, b],
            alive: true,
        });
        work.log.push(Reduction::Series {
            merged,
            children: [c1, c2],
            mid: k,
        });
        work.eliminated[k] = true;
        return true;
    }
    false
}

fn transform_star(net: &LinNet, work: &mut Work, exact_degree: Option<usize>) -> bool {
    for k in 0..net.nodes.len() {
        if !reducible(net, work, k) {
            continue;
        }
        let incident = work.alive_incident(k);
        match exact_degree {
            Some(d) if incident.len() != d => continue,
            None if incident.len() < 4 => continue,
            _ => {}
        }
        let mut arms = Vec::with_capacity(incident.len());
        let mut resistances = Vec::with_capacity(incident.len());
        let mut ok = true;
        for &b in &incident {
            match work.resistance(b) {
                Some(r) => {
                    arms.push((b, work.other_end(b, k)));
                    resistances.push(r);
                }
                None => {
                    ok = false;
                    break;
                }
            }
        }
        if !ok {
            continue;
        }

        let polygon = star_to_polygon(&resistances);
        for &(b, _) in &arms {
            work.branches[b].alive = false;
        }
        for i in 0..arms.len() {
            for j in (i + 1)..arms.len() {
                let r = polygon[i][j];
                if r.is_finite() {
                    work.branches.push(Branch {
                        elem: None,
                        kind: BranchKind::Resistor(r),
                        n: [arms[i].1, arms[j].1],
                        alive: true,
                    });
                }
            }
        }
        work.log.push(Reduction::Star { center: k, arms });
        work.eliminated[k] = true;
        return true;
    }
    false
}

/// Known-value propagation over the fully reduced net.
#[allow(clippy::type_complexity)]
fn solve_residual(
    net: &LinNet,
    work: &Work,
) -> SolverResult<(Vec<Option<Real>>, Vec<Option<Real>>, Vec<bool>)> {
    let node_count = net.nodes.len();
    let mut efforts: Vec<Option<Real>> = vec![None; node_count];
    let mut flows: Vec<Option<Real>> = vec![None; work.branches.len()];

    // Anchors first; unanchored components run on gauge zero.
    let component_count = net.nodes.iter().map(|n| n.component + 1).max().unwrap_or(0);
    let mut comp_anchored = vec![false; component_count];
    for (i, node) in net.nodes.iter().enumerate() {
        if let Some(e) = node.anchor {
            efforts[i] = Some(e);
            comp_anchored[node.component] = true;
        }
    }
    for comp in 0..component_count {
        if comp_anchored[comp] {
            continue;
        }
        if let Some(gauge) = (0..node_count)
            .find(|&i| net.nodes[i].component == comp && !work.eliminated[i])
        {
            efforts[gauge] = Some(0.0);
        }
    }
    let absolute: Vec<bool> = net
        .nodes
        .iter()
        .map(|n| comp_anchored[n.component])
        .collect();

    let budget = 4 * (node_count + work.branches.len()).max(8);
    for _ in 0..budget {
        let mut progress = false;

        for b in 0..work.branches.len() {
            if !work.branches[b].alive {
                continue;
            }
            let [x, y] = work.branches[b].n;
            match work.branches[b].kind {
                BranchKind::Resistor(r) => {
                    match (efforts[x], efforts[y], flows[b]) {
                        (Some(ex), Some(ey), None) => {
                            flows[b] = Some((ex - ey) / r);
                            progress = true;
                        }
                        (Some(ex), None, Some(f)) => {
                            efforts[y] = Some(ex - f * r);
                            progress = true;
                        }
                        (None, Some(ey), Some(f)) => {
                            efforts[x] = Some(ey + f * r);
                            progress = true;
                        }
                        _ => {}
                    }
                }
                BranchKind::EffortSource(e) => match (efforts[x], efforts[y]) {
                    (Some(ex), None) => {
                        efforts[y] = Some(ex + e);
                        progress = true;
                    }
                    (None, Some(ey)) => {
                        efforts[x] = Some(ey - e);
                        progress = true;
                    }
                    _ => {}
                },
                BranchKind::KnownFlow(f) => {
                    if flows[b].is_none() {
                        flows[b] = Some(f);
                        progress = true;
                    }
                }
            }
        }

        // Balance closure at plain nodes.
        for i in 0..node_count {
            if work.eliminated[i] || net.nodes[i].anchor.is_some() {
                continue;
            }
            let Some(inj) = net.nodes[i].injection else {
                continue;
            };
            let incident = work.alive_incident(i);
            let mut unknown = None;
            let mut sum = inj;
            let mut multiple = false;
            for &b in &incident {
                let sign = if work.branches[b].n[0] == i { -1.0 } else { 1.0 };
                match flows[b] {
                    Some(f) => sum += sign * f,
                    None if unknown.is_some() => {
                        multiple = true;
                        break;
                    }
                    None => unknown = Some((b, sign)),
                }
            }
            if multiple {
                continue;
            }
            if let Some((b, sign)) = unknown {
                flows[b] = Some(-sum / sign);
                progress = true;
            }
        }

        if !progress {
            // Closed-form fallbacks: one unknown node between known
            // neighbours, or a source in series with resistor chains.
            if !close_unknown_node(net, &work.branches, &work.eliminated, &mut efforts)
                && !close_source_loop(
                    net,
                    &work.branches,
                    &work.eliminated,
                    &efforts,
                    &mut flows,
                )
            {
                break;
            }
        }
    }

    // Completeness per component: a component blocked by an unsettled
    // boundary is dropped (its values stay unwritten, the next sweep may
    // unblock it); only a fully undetermined picture is a failure.
    let mut comp_ok = vec![true; component_count];
    for i in 0..node_count {
        if !work.eliminated[i] && efforts[i].is_none() {
            comp_ok[net.nodes[i].component] = false;
        }
    }
    for b in 0..work.branches.len() {
        if work.branches[b].alive && flows[b].is_none() {
            comp_ok[net.nodes[work.branches[b].n[0]].component] = false;
        }
    }
    if !comp_ok.iter().any(|&ok| ok) {
        return Err(SolverError::NoSolution {
            context: "no component of the subnet could be determined by reduction".to_string(),
        });
    }
    for i in 0..node_count {
        if !comp_ok[net.nodes[i].component] {
            efforts[i] = None;
        }
    }
    for b in 0..work.branches.len() {
        if !comp_ok[net.nodes[work.branches[b].n[0]].component] {
            flows[b] = None;
        }
    }
    Ok((efforts, flows, absolute))
}

/// Reverse the reduction layers, restoring eliminated node efforts and
/// distributing merged flows onto parent branches.
fn unwind(work: &Work, efforts: &mut [Option<Real>], flows: &mut [Option<Real>]) {
    for reduction in work.log.iter().rev() {
        match reduction {
            Reduction::SelfLoop { branch } => {
                flows[*branch] = Some(0.0);
            }
            Reduction::Parallel { merged, children } => {
                let [x, y] = work.branches[*merged].n;
                let (Some(ex), Some(ey)) = (efforts[x], efforts[y]) else {
                    continue;
                };
                for &c in children {
                    let r = work.resistance(c).expect("parallel children are resistors");
                    let [cx, cy] = work.branches[c].n;
                    let (Some(ecx), Some(ecy)) = (efforts[cx], efforts[cy]) else {
                        continue;
                    };
                    // Children may be oriented either way around.
                    debug_assert!(
                        ((ecx - ecy).abs() - (ex - ey).abs()).abs()
                            <= 1e-9 * (ex - ey).abs().max(1.0)
                    );
                    flows[c] = Some((ecx - ecy) / r);
                }
            }
            Reduction::Series {
                merged,
                children,
                mid,
            } => {
                let [a, _] = work.branches[*merged].n;
                let f = flows[*merged].unwrap_or(0.0);
                let c1 = children[0];
                let r1 = work.resistance(c1).expect("series children are resistors");
                if let Some(ea) = efforts[a] {
                    // Drop from the shared endpoint toward the middle.
                    efforts[*mid] = Some(ea - f * r1);
                }
                for &c in children {
                    let [cx, cy] = work.branches[c].n;
                    if let (Some(ecx), Some(ecy)) = (efforts[cx], efforts[cy]) {
                        let r = work.resistance(c).expect("series children are resistors");
                        flows[c] = Some((ecx - ecy) / r);
                    }
                }
            }
            Reduction::Star { center, arms } => {
                let mut num = 0.0;
                let mut den = 0.0;
                for &(b, outer) in arms {
                    let r = work.resistance(b).expect("star arms are resistors");
                    if let Some(eo) = efforts[outer] {
                        num += eo / r;
                        den += 1.0 / r;
                    }
                }
                if den > 0.0 {
                    efforts[*center] = Some(num / den);
                }
                for &(b, outer) in arms {
                    let r = work.resistance(b).expect("star arms are resistors");
                    if let (Some(ec), Some(eo)) = (efforts[*center], efforts[outer]) {
                        let through = if work.branches[b].n[0] == *center {
                            (ec - eo) / r
                        } else {
                            (eo - ec) / r
                        };
                        flows[b] = Some(through);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linnet::LinNode;

    fn node(component: usize) -> LinNode {
        LinNode {
            members: Vec::new(),
            anchor: None,
            injection: Some(0.0),
            component,
        }
    }

    fn resistor(n0: usize, n1: usize, r: Real) -> Branch {
        Branch {
            elem: None,
            kind: BranchKind::Resistor(r),
            n: [n0, n1],
            alive: true,
        }
    }

    #[test]
    fn series_pair_between_source_terminals() {
        // anchor(0) -[E=10]- n1 -R1- n2 -R2- n0
        let mut nodes = vec![node(0), node(0), node(0)];
        nodes[0].anchor = Some(0.0);
        nodes[0].injection = None;
        let branches = vec![
            Branch {
                elem: None,
                kind: BranchKind::EffortSource(10.0),
                n: [0, 1],
                alive: true,
            },
            resistor(1, 2, 30.0),
            resistor(2, 0, 20.0),
        ];
        let net = LinNet { nodes, branches };
        let sol = solve(&net).unwrap();
        assert!((sol.efforts[1].unwrap() - 10.0).abs() < 1e-12);
        assert!((sol.efforts[2].unwrap() - 4.0).abs() < 1e-12);
        // 10 V over 50 ohms
        assert!((sol.flows[1].unwrap() - 0.2).abs() < 1e-12);
        assert!((sol.flows[2].unwrap() - 0.2).abs() < 1e-12);
        assert!((sol.flows[0].unwrap() - 0.2).abs() < 1e-12);
        assert!(sol.absolute[2]);
    }

    #[test]
    fn parallel_pair_shares_current() {
        // anchor(6) - two resistors in parallel - anchor(0)
        let mut nodes = vec![node(0), node(0)];
        nodes[0].anchor = Some(6.0);
        nodes[0].injection = None;
        nodes[1].anchor = Some(0.0);
        nodes[1].injection = None;
        let branches = vec![resistor(0, 1, 30.0), resistor(1, 0, 60.0)];
        let net = LinNet { nodes, branches };
        let sol = solve(&net).unwrap();
        assert!((sol.flows[0].unwrap() - 0.2).abs() < 1e-12);
        // Opposite orientation: through-flow is negative.
        assert!((sol.flows[1].unwrap() + 0.1).abs() < 1e-12);
    }

    #[test]
    fn wheatstone_bridge_via_star_delta() {
        // t0 anchored at 0; E=10 between t0 and t1; classical bridge.
        let mut nodes = vec![node(0), node(0), node(0), node(0)];
        nodes[0].anchor = Some(0.0);
        nodes[0].injection = None;
        let branches = vec![
            Branch {
                elem: None,
                kind: BranchKind::EffortSource(10.0),
                n: [0, 1],
                alive: true,
            },
            resistor(1, 2, 40.0), // r1: t1 - a
            resistor(1, 3, 55.0), // r2: t1 - b
            resistor(2, 0, 60.0), // r3: a - t0
            resistor(3, 0, 50.0), // r4: b - t0
            resistor(2, 3, 45.0), // r0: bridge a - b
        ];
        let net = LinNet { nodes, branches };
        let sol = solve(&net).unwrap();
        let source_flow = sol.flows[0].unwrap();
        approx::assert_relative_eq!(
            source_flow,
            10.0 / 50.800_508_259_212_19,
            max_relative = 1e-9
        );
        // Branch currents rejoin at the anchored terminal.
        let f3 = sol.flows[3].unwrap();
        let f4 = sol.flows[4].unwrap();
        assert!((f3 + f4 - source_flow).abs() < 1e-9);
    }

    #[test]
    fn source_in_series_with_two_resistors() {
        // anchor(0) -R10- b -[E=5]- c -R30- anchor(0): one loop, the
        // closed-form fallback finds the circulating flow.
        let mut nodes = vec![node(0), node(0), node(0)];
        nodes[0].anchor = Some(0.0);
        nodes[0].injection = None;
        let branches = vec![
            resistor(0, 1, 10.0),
            Branch {
                elem: None,
                kind: BranchKind::EffortSource(5.0),
                n: [1, 2],
                alive: true,
            },
            resistor(2, 0, 30.0),
        ];
        let net = LinNet { nodes, branches };
        let sol = solve(&net).unwrap();
        let f = sol.flows[1].unwrap();
        assert!((f - 0.125).abs() < 1e-12);
        // e(b) = -f*10 below the anchor, e(c) = e(b) + 5.
        assert!((sol.efforts[1].unwrap() + 1.25).abs() < 1e-12);
        assert!((sol.efforts[2].unwrap() - 3.75).abs() < 1e-12);
    }

    #[test]
    fn four_arm_star_with_pinned_outers() {
        // Degree-4 center, every outer anchored: the polygon transform
        // is the only rule that can fire.
        let mut nodes = vec![node(0), node(0), node(0), node(0), node(0)];
        let pins = [8.0, 4.0, 0.0, 2.0];
        for (i, p) in pins.iter().enumerate() {
            nodes[i].anchor = Some(*p);
            nodes[i].injection = None;
        }
        let arms = [10.0, 20.0, 40.0, 80.0];
        let branches: Vec<Branch> = arms
            .iter()
            .enumerate()
            .map(|(i, r)| resistor(4, i, *r))
            .collect();
        let net = LinNet { nodes, branches };
        let sol = solve(&net).unwrap();

        let num: f64 = pins.iter().zip(&arms).map(|(p, r)| p / r).sum();
        let den: f64 = arms.iter().map(|r| 1.0 / r).sum();
        let center = sol.efforts[4].unwrap();
        assert!((center - num / den).abs() < 1e-9);
        // The restored arm flows balance at the center.
        let total: f64 = (0..4).map(|b| sol.flows[b].unwrap()).sum::<f64>();
        assert!(total.abs() < 1e-9);
    }

    #[test]
    fn isolated_ring_collapses_to_zero() {
        let nodes = vec![node(0), node(0), node(0)];
        let branches = vec![
            resistor(0, 1, 10.0),
            resistor(1, 2, 20.0),
            resistor(2, 0, 30.0),
        ];
        let net = LinNet { nodes, branches };
        let sol = solve(&net).unwrap();
        for f in &sol.flows {
            assert_eq!(f.unwrap(), 0.0);
        }
        for (i, e) in sol.efforts.iter().enumerate() {
            assert_eq!(e.unwrap(), 0.0, "node {i}");
            assert!(!sol.absolute[i]);
        }
    }

    #[test]
    fn flow_source_drives_resistor_chain() {
        // anchor(0) -R1- n1 -R2- n2, known flow of 2 pushed n2 -> n0.
        let mut nodes = vec![node(0), node(0), node(0)];
        nodes[0].anchor = Some(0.0);
        nodes[0].injection = None;
        let branches = vec![
            resistor(0, 1, 5.0),
            resistor(1, 2, 7.0),
            Branch {
                elem: None,
                kind: BranchKind::KnownFlow(2.0),
                n: [2, 0],
                alive: true,
            },
        ];
        let net = LinNet { nodes, branches };
        let sol = solve(&net).unwrap();
        // 2 units circulate n0 -> n1 -> n2 -> source -> n0, so the
        // suction side sits below the anchored potential.
        assert!((sol.flows[0].unwrap() - 2.0).abs() < 1e-12);
        assert!((sol.efforts[1].unwrap() + 10.0).abs() < 1e-12);
        assert!((sol.efforts[2].unwrap() + 24.0).abs() < 1e-12);
    }
}
