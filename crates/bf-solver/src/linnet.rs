//! Linear subnet extraction and write-back.
//!
//! A stalled network is reduced to a pure linear picture: resistor
//! branches, effort-source branches, known-flow branches, anchored
//! nodes, and per-node injections summarizing everything the rest of
//! the network already settled. Bridged dissipators contract their
//! endpoints (the shortcut merging that keeps parallel detection
//! honest), open dissipators stay out entirely because their zero flows
//! are already on the bank, and nodes touching unsettled non-linear
//! elements become boundaries that no balance rule may close.
//!
//! Anchors come from origins and, in the transfer tier, from storage
//! elements pinned at their current state. An effort the bank already
//! carries is adopted as an additional anchor only when the node
//! touches an element outside the subnet (a genuine external pin, such
//! as a capacitance or an enforcer) and the value is not already
//! explained by the subnet's own anchors through its source chains —
//! anything else is derived from the very excitations being solved, and
//! counting it again would corrupt superposition. Components that still
//! float after that are gauge-fixed at write-back.

use bf_core::{ElemId, NodeId, Real, Warning, WarningKind};
use bf_components::{DissipatorMode, Element, ElementKind};
use bf_graph::NodeBank;

use crate::error::{SolverError, SolverResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Substitute storage elements: self-capacitances pin their nodes at
    /// the current state, mutual capacitances become effort sources,
    /// two-port inductances become known flows.
    pub include_storage: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BranchKind {
    /// Finite positive resistance.
    Resistor(Real),
    /// `effort(n1) = effort(n0) + E`.
    EffortSource(Real),
    /// Fixed through-flow entering at `n0`, leaving at `n1`.
    KnownFlow(Real),
}

#[derive(Debug, Clone)]
pub struct Branch {
    /// Backing element, `None` for synthetic reduction branches.
    pub elem: Option<ElemId>,
    pub kind: BranchKind,
    /// Local node indices.
    pub n: [usize; 2],
    pub alive: bool,
}

#[derive(Debug, Clone)]
pub struct LinNode {
    /// Bank nodes merged into this local node.
    pub members: Vec<NodeId>,
    /// Absolute effort pinned by an origin or a storage substitution.
    pub anchor: Option<Real>,
    /// Net external inflow already settled on the bank; `None` marks a
    /// boundary node whose balance must not be closed.
    pub injection: Option<Real>,
    /// Connected-component id over the branch graph.
    pub component: usize,
}

#[derive(Debug, Clone)]
pub struct LinNet {
    pub nodes: Vec<LinNode>,
    pub branches: Vec<Branch>,
}

/// Per-net solution; `efforts`/`flows` are indexed like the net that
/// produced them (solvers may append synthetic branches first).
#[derive(Debug, Clone)]
pub struct LinSolution {
    pub efforts: Vec<Option<Real>>,
    pub flows: Vec<Option<Real>>,
    /// Whether the node's effort is absolute (anchored component) or
    /// still gauge-relative.
    pub absolute: Vec<bool>,
}

impl LinNet {
    /// Number of independent excitations: nonzero sources, known flows,
    /// anchors and injections.
    pub fn excitation_count(&self) -> usize {
        let mut count = 0;
        for b in &self.branches {
            match b.kind {
                BranchKind::EffortSource(e) if e != 0.0 => count += 1,
                BranchKind::KnownFlow(f) if f != 0.0 => count += 1,
                _ => {}
            }
        }
        for n in &self.nodes {
            if matches!(n.anchor, Some(e) if e != 0.0) {
                count += 1;
            }
            if matches!(n.injection, Some(i) if i != 0.0) {
                count += 1;
            }
        }
        count
    }

    pub fn alive_degree(&self, node: usize) -> usize {
        self.branches
            .iter()
            .filter(|b| b.alive && (b.n[0] == node || b.n[1] == node))
            .count()
    }
}

struct UnionFind(Vec<usize>);

impl UnionFind {
    fn new(n: usize) -> Self {
        Self((0..n).collect())
    }

    fn find(&mut self, i: usize) -> usize {
        if self.0[i] != i {
            let root = self.find(self.0[i]);
            self.0[i] = root;
        }
        self.0[i]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.0[rb] = ra;
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Role {
    Outside,
    Branch,
    Anchor,
}

/// Build the linear picture of the current stall.
///
/// Element order is the arena contract: `elements[i]` owns `ElemId(i)`
/// on the bank's edges.
pub fn extract(
    elements: &[Element],
    bank: &NodeBank,
    opts: ExtractOptions,
) -> SolverResult<Option<LinNet>> {
    let mut roles = vec![Role::Outside; elements.len()];
    for (i, el) in elements.iter().enumerate() {
        roles[i] = match el.kind() {
            ElementKind::Dissipator => {
                let d = el.as_dissipator().expect("kind checked");
                match d.mode() {
                    DissipatorMode::Normal | DissipatorMode::Bridged => Role::Branch,
                    DissipatorMode::Open => Role::Outside,
                }
            }
            ElementKind::EffortSource => {
                let s = el.as_effort_source().expect("kind checked");
                if s.armed() { Role::Branch } else { Role::Outside }
            }
            ElementKind::FlowSource => Role::Branch,
            ElementKind::Origin => Role::Anchor,
            ElementKind::SelfCapacitance if opts.include_storage => Role::Anchor,
            ElementKind::MutualCapacitance if opts.include_storage => Role::Branch,
            ElementKind::Inductance if opts.include_storage => {
                if el.ports().len() == 2 {
                    Role::Branch
                } else {
                    Role::Outside
                }
            }
            _ => Role::Outside,
        };
    }

    // Collect involved bank nodes.
    let mut involved: Vec<NodeId> = Vec::new();
    let mut local_of = vec![usize::MAX; bank.len()];
    for (i, el) in elements.iter().enumerate() {
        if roles[i] == Role::Outside {
            continue;
        }
        for p in el.ports() {
            if local_of[p.node.index()] == usize::MAX {
                local_of[p.node.index()] = involved.len();
                involved.push(p.node);
            }
        }
    }
    if involved.is_empty() {
        return Ok(None);
    }

    // Contract bridged dissipators.
    let mut uf = UnionFind::new(involved.len());
    for (i, el) in elements.iter().enumerate() {
        if roles[i] != Role::Branch || el.kind() != ElementKind::Dissipator {
            continue;
        }
        let d = el.as_dissipator().expect("kind checked");
        if d.mode() == DissipatorMode::Bridged {
            let ports = el.ports();
            uf.union(
                local_of[ports[0].node.index()],
                local_of[ports[1].node.index()],
            );
        }
    }

    // Representative -> compact local index.
    let mut rep_local = vec![usize::MAX; involved.len()];
    let mut nodes: Vec<LinNode> = Vec::new();
    for i in 0..involved.len() {
        let rep = uf.find(i);
        if rep_local[rep] == usize::MAX {
            rep_local[rep] = nodes.len();
            nodes.push(LinNode {
                members: Vec::new(),
                anchor: None,
                injection: Some(0.0),
                component: usize::MAX,
            });
        }
        nodes[rep_local[rep]].members.push(involved[i]);
    }
    let mut local = |node: NodeId| -> usize {
        let raw = local_of[node.index()];
        rep_local[uf.find(raw)]
    };

    // Branches and anchors.
    let mut branches: Vec<Branch> = Vec::new();
    let tol = bank.tolerances().solver_agreement;
    let mut pin = |nodes: &mut Vec<LinNode>, ix: usize, value: Real| -> SolverResult<()> {
        match nodes[ix].anchor {
            None => {
                nodes[ix].anchor = Some(value);
                Ok(())
            }
            Some(existing) if (existing - value).abs() <= tol => Ok(()),
            Some(existing) => Err(SolverError::InconsistentAnchors {
                what: format!("{existing} vs {value}"),
            }),
        }
    };
    for (i, el) in elements.iter().enumerate() {
        if roles[i] == Role::Outside {
            continue;
        }
        let elem_id = ElemId::from_index(i);
        let ports = el.ports();
        match el.kind() {
            ElementKind::Dissipator => {
                let d = el.as_dissipator().expect("kind checked");
                if d.mode() == DissipatorMode::Normal {
                    branches.push(Branch {
                        elem: Some(elem_id),
                        kind: BranchKind::Resistor(d.resistance()),
                        n: [local(ports[0].node), local(ports[1].node)],
                        alive: true,
                    });
                }
            }
            ElementKind::EffortSource => {
                let s = el.as_effort_source().expect("kind checked");
                branches.push(Branch {
                    elem: Some(elem_id),
                    kind: BranchKind::EffortSource(s.effort()),
                    n: [local(ports[0].node), local(ports[1].node)],
                    alive: true,
                });
            }
            ElementKind::FlowSource => {
                let s = el.as_flow_source().expect("kind checked");
                // `+F` enters port 0's node, so the element's own
                // through-flow at port 0 is `-F`.
                branches.push(Branch {
                    elem: Some(elem_id),
                    kind: BranchKind::KnownFlow(-s.flow()),
                    n: [local(ports[0].node), local(ports[1].node)],
                    alive: true,
                });
            }
            ElementKind::Origin => {
                let o = el.as_origin().expect("kind checked");
                let ix = local(ports[0].node);
                pin(&mut nodes, ix, o.effort())?;
            }
            ElementKind::SelfCapacitance => {
                let c = el.as_self_capacitance().expect("kind checked");
                for p in ports {
                    let ix = local(p.node);
                    pin(&mut nodes, ix, c.state())?;
                }
            }
            ElementKind::MutualCapacitance => {
                let c = el.as_mutual_capacitance().expect("kind checked");
                branches.push(Branch {
                    elem: Some(elem_id),
                    kind: BranchKind::EffortSource(-c.state()),
                    n: [local(ports[0].node), local(ports[1].node)],
                    alive: true,
                });
            }
            ElementKind::Inductance => {
                let l = el.as_inductance().expect("kind checked");
                branches.push(Branch {
                    elem: Some(elem_id),
                    kind: BranchKind::KnownFlow(l.state()),
                    n: [local(ports[0].node), local(ports[1].node)],
                    alive: true,
                });
            }
            _ => {}
        }
    }
    if branches.is_empty() {
        return Ok(None);
    }

    // Injections: flows the rest of the network already settled on the
    // involved nodes. An unset outside edge or a reference node makes
    // the balance unusable.
    let mut external = vec![false; nodes.len()];
    for (ix, node) in nodes.iter_mut().enumerate() {
        let mut sum = 0.0;
        let mut boundary = false;
        for member in &node.members {
            if bank.is_reference(*member) {
                boundary = true;
            }
            for edge in bank.node(*member).edges() {
                let owner = edge.elem().index();
                if owner < roles.len() && roles[owner] != Role::Outside {
                    continue;
                }
                external[ix] = true;
                match edge.flow() {
                    Some(f) => sum += f,
                    None => boundary = true,
                }
            }
        }
        node.injection = if boundary { None } else { Some(sum) };
    }

    adopt_external_pins(&mut nodes, &branches, &external, bank);

    // Connected components over the branch graph.
    let mut cuf = UnionFind::new(nodes.len());
    for b in &branches {
        cuf.union(b.n[0], b.n[1]);
    }
    let mut comp_ids: Vec<usize> = Vec::new();
    for i in 0..nodes.len() {
        let rep = cuf.find(i);
        let id = match comp_ids.iter().position(|&c| c == rep) {
            Some(pos) => pos,
            None => {
                comp_ids.push(rep);
                comp_ids.len() - 1
            }
        };
        nodes[i].component = id;
    }

    Ok(Some(LinNet { nodes, branches }))
}

/// Adopt bank-pinned efforts as anchors where they are genuinely
/// external: the node touches a non-member element and the value is not
/// already explained by the existing anchors through the subnet's
/// effort-source chains.
fn adopt_external_pins(
    nodes: &mut [LinNode],
    branches: &[Branch],
    external: &[bool],
    bank: &NodeBank,
) {
    let mut derived: Vec<Option<Real>> = nodes.iter().map(|n| n.anchor).collect();
    let propagate = |derived: &mut Vec<Option<Real>>| loop {
        let mut progress = false;
        for b in branches {
            if let BranchKind::EffortSource(e) = b.kind {
                match (derived[b.n[0]], derived[b.n[1]]) {
                    (Some(e0), None) => {
                        derived[b.n[1]] = Some(e0 + e);
                        progress = true;
                    }
                    (None, Some(e1)) => {
                        derived[b.n[0]] = Some(e1 - e);
                        progress = true;
                    }
                    _ => {}
                }
            }
        }
        if !progress {
            break;
        }
    };
    propagate(&mut derived);

    let tol = bank.tolerances().solver_agreement;
    for i in 0..nodes.len() {
        if nodes[i].anchor.is_some() || !external[i] {
            continue;
        }
        let Some(pinned) = nodes[i].members.iter().find_map(|m| bank.effort(*m)) else {
            continue;
        };
        match derived[i] {
            // The source chains already explain the value: adopting it
            // would double-count the excitation.
            Some(d) if (d - pinned).abs() <= tol.max(tol * pinned.abs()) => {}
            Some(d) => {
                bank.warn(Warning {
                    kind: WarningKind::SolverDisagreement,
                    subject: None,
                    magnitude: (d - pinned).abs(),
                });
            }
            None => {
                nodes[i].anchor = Some(pinned);
                derived[i] = Some(pinned);
                propagate(&mut derived);
            }
        }
    }
}

/// Push a solution back onto the bank.
///
/// Unanchored components are gauge-fixed against efforts the bank
/// already carries; with no pin available, a source-driven component
/// falls back to per-dissipator delta injection, and a dead component
/// collapses to zero effort with a warning.
pub fn apply(
    net: &LinNet,
    sol: &LinSolution,
    elements: &mut [Element],
    bank: &mut NodeBank,
) -> SolverResult<()> {
    let component_count = net
        .nodes
        .iter()
        .map(|n| n.component + 1)
        .max()
        .unwrap_or(0);

    // Gauge offset per component; `None` means efforts stay unwritten.
    let mut offsets: Vec<Option<Real>> = vec![Some(0.0); component_count];
    let tol = bank.tolerances().solver_agreement;
    for comp in 0..component_count {
        let comp_nodes: Vec<usize> = (0..net.nodes.len())
            .filter(|&i| net.nodes[i].component == comp)
            .collect();
        if comp_nodes
            .iter()
            .all(|&i| sol.absolute.get(i).copied().unwrap_or(false))
        {
            continue;
        }

        // Relative component: look for a bank pin to fix the gauge.
        let mut offset: Option<Real> = None;
        let mut disagreement = false;
        for &i in &comp_nodes {
            let Some(e_rel) = sol.efforts.get(i).copied().flatten() else {
                continue;
            };
            for member in &net.nodes[i].members {
                if let Some(e_bank) = bank.effort(*member) {
                    match offset {
                        None => offset = Some(e_bank - e_rel),
                        Some(existing) => {
                            if (e_bank - e_rel - existing).abs() > tol {
                                disagreement = true;
                            }
                        }
                    }
                }
            }
        }
        if disagreement {
            return Err(SolverError::NoSolution {
                context: "externally pinned efforts disagree across a floating subnet"
                    .to_string(),
            });
        }
        match offset {
            Some(off) => offsets[comp] = Some(off),
            None => {
                let excited = net.branches.iter().any(|b| {
                    (net.nodes[b.n[0]].component == comp)
                        && !matches!(b.kind, BranchKind::Resistor(_))
                }) || comp_nodes
                    .iter()
                    .any(|&i| matches!(net.nodes[i].injection, Some(f) if f != 0.0));
                if excited {
                    // No absolute reference at all: hand the dissipators
                    // their delta efforts and let propagation finish.
                    offsets[comp] = None;
                } else {
                    bank.warn(Warning {
                        kind: WarningKind::IsolatedRing,
                        subject: None,
                        magnitude: 0.0,
                    });
                    offsets[comp] = Some(0.0);
                }
            }
        }
    }

    // Efforts.
    for (i, node) in net.nodes.iter().enumerate() {
        let Some(e_rel) = sol.efforts.get(i).copied().flatten() else {
            continue;
        };
        let Some(off) = offsets[node.component] else {
            continue;
        };
        let e_abs = if sol.absolute.get(i).copied().unwrap_or(false) {
            e_rel
        } else {
            e_rel + off
        };
        for member in &node.members {
            bank.confirm_or_set_effort(*member, e_abs)?;
        }
    }

    // Flows, plus delta injection where efforts stayed relative.
    for (b_ix, branch) in net.branches.iter().enumerate() {
        let Some(elem_id) = branch.elem else {
            continue;
        };
        let element = &mut elements[elem_id.index()];
        if offsets[net.nodes[branch.n[0]].component].is_none() {
            if let (Some(e0), Some(e1)) = (
                sol.efforts.get(branch.n[0]).copied().flatten(),
                sol.efforts.get(branch.n[1]).copied().flatten(),
            ) {
                if let Some(d) = element.as_dissipator_mut() {
                    d.impose_delta_effort(e0 - e1);
                }
            }
        }
        let Some(f) = sol.flows.get(b_ix).copied().flatten() else {
            continue;
        };
        let ports = element.ports().to_vec();
        if ports.len() == 2 {
            bank.confirm_or_set_flow(ports[0].node, ports[0].edge, -f)?;
            bank.confirm_or_set_flow(ports[1].node, ports[1].edge, f)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bf_components::{
        EffortSource, Enforcer, LinearDissipator, Origin, Port, SelfCapacitance,
    };
    use bf_graph::Domain;

    const E: Domain = Domain::Electrical;

    struct Rig {
        bank: NodeBank,
        elements: Vec<Element>,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                bank: NodeBank::new(),
                elements: Vec::new(),
            }
        }

        fn node(&mut self, domain: Domain) -> NodeId {
            self.bank.add_node(domain, None)
        }

        fn add(&mut self, element: impl Into<Element>, nodes: &[NodeId]) -> ElemId {
            let id = ElemId::from_index(self.elements.len());
            let mut element = element.into();
            for &n in nodes {
                let edge = self.bank.connect(n, id, element.domain()).unwrap();
                element.attach(Port { node: n, edge }, &mut self.bank).unwrap();
            }
            self.elements.push(element);
            id
        }
    }

    #[test]
    fn bridged_dissipators_contract_their_endpoints() {
        let mut rig = Rig::new();
        let a = rig.node(E);
        let b = rig.node(E);
        let c = rig.node(E);
        rig.add(Origin::closed("gnd", E, 0.0).unwrap(), &[a]);
        rig.add(LinearDissipator::bridged("short", E), &[a, b]);
        rig.add(LinearDissipator::new("r1", E, 10.0).unwrap(), &[b, c]);
        rig.add(LinearDissipator::new("r2", E, 20.0).unwrap(), &[a, c]);

        let net = extract(&rig.elements, &rig.bank, ExtractOptions::default())
            .unwrap()
            .unwrap();
        // a and b collapse: two local nodes, two resistor branches that
        // are now a parallel pair.
        assert_eq!(net.nodes.len(), 2);
        assert_eq!(net.branches.len(), 2);
        let merged = net.nodes.iter().find(|n| n.members.len() == 2).unwrap();
        assert_eq!(merged.anchor, Some(0.0));
    }

    #[test]
    fn open_dissipators_feed_injections_not_branches() {
        let mut rig = Rig::new();
        let a = rig.node(E);
        let b = rig.node(E);
        rig.add(Origin::closed("gnd", E, 0.0).unwrap(), &[b]);
        let open = rig.add(LinearDissipator::open("gap", E), &[a, b]);
        rig.add(LinearDissipator::new("r", E, 5.0).unwrap(), &[a, b]);
        // The open element settles its zero flows first.
        rig.elements[open.index()].do_calc(&mut rig.bank).unwrap();

        let net = extract(&rig.elements, &rig.bank, ExtractOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(net.branches.len(), 1);
        let plain = net.nodes.iter().find(|n| n.anchor.is_none()).unwrap();
        assert_eq!(plain.injection, Some(0.0));
    }

    #[test]
    fn unsettled_outsider_marks_the_boundary() {
        let mut rig = Rig::new();
        let a = rig.node(E);
        let b = rig.node(E);
        rig.add(Origin::closed("gnd", E, 0.0).unwrap(), &[a]);
        rig.add(LinearDissipator::new("r", E, 5.0).unwrap(), &[a, b]);
        // A capacitance outside the subnet whose edge flow is unknown.
        rig.add(SelfCapacitance::new("c", E, 1.0, 2.0).unwrap(), &[b]);

        let net = extract(&rig.elements, &rig.bank, ExtractOptions::default())
            .unwrap()
            .unwrap();
        let boundary = net
            .nodes
            .iter()
            .find(|n| n.members.contains(&b))
            .unwrap();
        assert_eq!(boundary.injection, None);
    }

    #[test]
    fn storage_tier_pins_capacitance_nodes() {
        let mut rig = Rig::new();
        let a = rig.node(E);
        let b = rig.node(E);
        rig.add(LinearDissipator::new("r", E, 5.0).unwrap(), &[a, b]);
        rig.add(SelfCapacitance::new("c", E, 1.0, 2.5).unwrap(), &[b]);
        rig.add(Origin::closed("gnd", E, 0.0).unwrap(), &[a]);

        let net = extract(
            &rig.elements,
            &rig.bank,
            ExtractOptions {
                include_storage: true,
            },
        )
        .unwrap()
        .unwrap();
        let pinned = net
            .nodes
            .iter()
            .find(|n| n.members.contains(&b))
            .unwrap();
        assert_eq!(pinned.anchor, Some(2.5));
    }

    #[test]
    fn derived_efforts_are_not_adopted_as_anchors() {
        // gnd -[E=10]- top - r - far - enforcer(pinned 4, flow 0).
        let mut rig = Rig::new();
        let gnd = rig.node(E);
        let top = rig.node(E);
        let far = rig.node(E);
        let origin = rig.add(Origin::closed("gnd", E, 0.0).unwrap(), &[gnd]);
        let src = rig.add(EffortSource::new("u", E, 10.0).unwrap(), &[gnd, top]);
        rig.add(LinearDissipator::new("r", E, 5.0).unwrap(), &[top, far]);
        let bc = rig.add(Enforcer::new("bc", E, 4.0, 0.0), &[far]);
        // Propagate what a sweep would have settled: the source's chain
        // and the enforcer's pin.
        rig.elements[origin.index()].do_calc(&mut rig.bank).unwrap();
        rig.elements[src.index()].do_calc(&mut rig.bank).unwrap();
        rig.elements[bc.index()].do_calc(&mut rig.bank).unwrap();

        let net = extract(&rig.elements, &rig.bank, ExtractOptions::default())
            .unwrap()
            .unwrap();
        let top_node = net
            .nodes
            .iter()
            .find(|n| n.members.contains(&top))
            .unwrap();
        // Derived from the source: must not become an anchor.
        assert_eq!(top_node.anchor, None);
        let far_node = net
            .nodes
            .iter()
            .find(|n| n.members.contains(&far))
            .unwrap();
        // Externally pinned by the enforcer: adopted.
        assert_eq!(far_node.anchor, Some(4.0));
        // One genuine excitation pair: the source and the adopted pin.
        assert_eq!(net.excitation_count(), 2);
    }
}
