//! Linear dissipator: effort difference proportional to through-flow.

use bf_core::{Real, Warning, WarningKind};
use bf_graph::{Domain, NodeBank};

use crate::common::{pass_flow_through, push_port, require_ports, through_flow, Port};
use crate::error::{ElementError, ElementResult};

/// Conduction mode of a dissipator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DissipatorMode {
    /// Finite positive resistance.
    Normal,
    /// Zero resistance: both ends share one effort, any flow passes.
    Bridged,
    /// Infinite resistance: no flow, ends stay independent.
    Open,
}

/// Two-port element with `Δeffort = flow · R`.
///
/// Positive through-flow enters port 0 and leaves port 1, so the element
/// contributes `-f` to node 0 and `+f` to node 1.
#[derive(Debug, Clone)]
pub struct LinearDissipator {
    name: String,
    domain: Domain,
    mode: DissipatorMode,
    resistance: Real,
    ports: Vec<Port>,
    /// Effort difference injected by a reduction solver for this tick.
    imposed_delta: Option<Real>,
}

impl LinearDissipator {
    pub fn new(name: impl Into<String>, domain: Domain, resistance: Real) -> ElementResult<Self> {
        let name = name.into();
        if !resistance.is_finite() || resistance <= 0.0 {
            return Err(ElementError::calculation(
                &name,
                "resistance must be positive and finite",
            ));
        }
        Ok(Self {
            name,
            domain,
            mode: DissipatorMode::Normal,
            resistance,
            ports: Vec::new(),
            imposed_delta: None,
        })
    }

    pub fn bridged(name: impl Into<String>, domain: Domain) -> Self {
        Self {
            name: name.into(),
            domain,
            mode: DissipatorMode::Bridged,
            resistance: 0.0,
            ports: Vec::new(),
            imposed_delta: None,
        }
    }

    pub fn open(name: impl Into<String>, domain: Domain) -> Self {
        Self {
            name: name.into(),
            domain,
            mode: DissipatorMode::Open,
            resistance: Real::INFINITY,
            ports: Vec::new(),
            imposed_delta: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn mode(&self) -> DissipatorMode {
        self.mode
    }

    /// Resistance as seen by the reducers: `0` when bridged, `+∞` when
    /// open.
    pub fn resistance(&self) -> Real {
        match self.mode {
            DissipatorMode::Normal => self.resistance,
            DissipatorMode::Bridged => 0.0,
            DissipatorMode::Open => Real::INFINITY,
        }
    }

    pub fn set_resistance(&mut self, r: Real) -> ElementResult<()> {
        if !r.is_finite() || r <= 0.0 {
            return Err(ElementError::calculation(
                &self.name,
                "resistance must be positive and finite",
            ));
        }
        self.mode = DissipatorMode::Normal;
        self.resistance = r;
        Ok(())
    }

    pub fn set_conductance(&mut self, g: Real) -> ElementResult<()> {
        if !g.is_finite() || g <= 0.0 {
            return Err(ElementError::calculation(
                &self.name,
                "conductance must be positive and finite",
            ));
        }
        self.set_resistance(1.0 / g)
    }

    pub fn set_mode(&mut self, mode: DissipatorMode) {
        self.mode = mode;
    }

    /// Inject an externally solved effort difference (port 0 minus
    /// port 1) for the running tick.
    pub fn impose_delta_effort(&mut self, delta: Real) {
        self.imposed_delta = Some(delta);
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn attach(&mut self, port: Port, bank: &mut NodeBank) -> ElementResult<()> {
        let node_domain = bank.domain(port.node);
        if !self.domain.compatible(node_domain) {
            return Err(ElementError::model(&self.name, "node domain mismatch"));
        }
        push_port(&self.name, &mut self.ports, port, 2)
    }

    pub fn prepare(&mut self, _bank: &mut NodeBank) -> ElementResult<()> {
        self.imposed_delta = None;
        Ok(())
    }

    pub fn do_calc(&mut self, bank: &mut NodeBank) -> ElementResult<bool> {
        require_ports(&self.name, &self.ports, 2)?;
        let (p0, p1) = (self.ports[0], self.ports[1]);
        let mut progress = false;

        if self.mode == DissipatorMode::Open {
            return self.calc_open(bank);
        }

        // A dead-end node cannot carry flow; the live side's effort
        // reaches across.
        if bank.degree(p0.node) == 1 || bank.degree(p1.node) == 1 {
            progress |= self.force_zero_flow(bank)?;
            progress |= crate::common::equalize_efforts(bank, p0, p1)?;
            return Ok(progress);
        }

        progress |= pass_flow_through(bank, p0, p1)?;
        let flow = through_flow(bank, p0, p1);
        let e0 = bank.effort(p0.node);
        let e1 = bank.effort(p1.node);

        match self.mode {
            DissipatorMode::Bridged => {
                progress |= crate::common::equalize_efforts(bank, p0, p1)?;
                if let (Some(e0), Some(e1), Some(f)) = (e0, e1, flow) {
                    let tol = bank.tolerances();
                    if (e0 - e1).abs() > tol.bridged_drift && f.abs() > tol.drift_flow {
                        bank.warn(Warning {
                            kind: WarningKind::BridgedDrift,
                            subject: Some(self.name.clone()),
                            magnitude: (e0 - e1).abs(),
                        });
                    }
                }
            }
            DissipatorMode::Normal => {
                let r = self.resistance;
                if let Some(f) = flow {
                    // One flow known: complete the opposite effort.
                    match (e0, e1) {
                        (Some(e0), None) => {
                            bank.set_effort(p1.node, e0 - f * r)?;
                            progress = true;
                        }
                        (None, Some(e1)) => {
                            bank.set_effort(p0.node, e1 + f * r)?;
                            progress = true;
                        }
                        _ => {}
                    }
                } else if let (Some(e0), Some(e1)) = (e0, e1) {
                    progress |= self.emit_flow(bank, (e0 - e1) / r)?;
                } else if let Some(delta) = self.imposed_delta {
                    progress |= self.emit_flow(bank, delta / r)?;
                    match (e0, e1) {
                        (Some(e0), None) => {
                            bank.set_effort(p1.node, e0 - delta)?;
                            progress = true;
                        }
                        (None, Some(e1)) => {
                            bank.set_effort(p0.node, e1 + delta)?;
                            progress = true;
                        }
                        _ => {}
                    }
                }
            }
            DissipatorMode::Open => unreachable!(),
        }
        Ok(progress)
    }

    fn calc_open(&mut self, bank: &mut NodeBank) -> ElementResult<bool> {
        let progress = self.force_zero_flow(bank)?;
        // Residual flow forced onto an open element by the surrounding
        // network is clamped upstream; here it can only be observed.
        for p in &self.ports {
            if let Some(f) = bank.flow(p.node, p.edge) {
                if f.abs() > bank.tolerances().drift_flow {
                    bank.warn(Warning {
                        kind: WarningKind::OpenResidualFlow,
                        subject: Some(self.name.clone()),
                        magnitude: f.abs(),
                    });
                }
            }
        }
        Ok(progress)
    }

    fn force_zero_flow(&mut self, bank: &mut NodeBank) -> ElementResult<bool> {
        let mut progress = false;
        for p in &self.ports {
            if bank.flow(p.node, p.edge).is_none() {
                bank.set_flow(p.node, p.edge, 0.0)?;
                progress = true;
            }
        }
        Ok(progress)
    }

    fn emit_flow(&mut self, bank: &mut NodeBank, f: Real) -> ElementResult<bool> {
        let (p0, p1) = (self.ports[0], self.ports[1]);
        let mut progress = false;
        if bank.flow(p0.node, p0.edge).is_none() {
            bank.set_flow(p0.node, p0.edge, -f)?;
            progress = true;
        }
        if bank.flow(p1.node, p1.edge).is_none() {
            bank.set_flow(p1.node, p1.edge, f)?;
            progress = true;
        }
        Ok(progress)
    }

    pub fn finished(&self, bank: &NodeBank) -> bool {
        self.ports.len() == 2
            && self.ports.iter().all(|p| {
                bank.effort(p.node).is_some() && bank.flow(p.node, p.edge).is_some()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bf_core::ElemId;

    fn wire(mut bank: &mut NodeBank, d: &mut LinearDissipator, extra_edges: usize) {
        // Give each node one extra edge so they are not dead ends.
        for _ in 0..2 {
            let n = bank.add_node(Domain::Electrical, None);
            let edge = bank.connect(n, ElemId::from_index(0), Domain::Electrical).unwrap();
            d.attach(Port { node: n, edge }, &mut bank).unwrap();
            for i in 0..extra_edges {
                bank.connect(n, ElemId::from_index(10 + i), Domain::Electrical)
                    .unwrap();
            }
        }
    }

    #[test]
    fn both_efforts_give_flow() {
        let mut bank = NodeBank::new();
        let mut d = LinearDissipator::new("r", Domain::Electrical, 100.0).unwrap();
        wire(&mut bank, &mut d, 1);
        let (n0, n1) = (d.ports()[0].node, d.ports()[1].node);
        bank.set_effort(n0, 10.0).unwrap();
        bank.set_effort(n1, 5.0).unwrap();
        assert!(d.do_calc(&mut bank).unwrap());
        // f = 0.05 into port 0: node 0 edge is -0.05, node 1 edge +0.05
        assert_eq!(bank.flow(n0, d.ports()[0].edge), Some(-0.05));
        assert_eq!(bank.flow(n1, d.ports()[1].edge), Some(0.05));
    }

    #[test]
    fn flow_and_effort_give_other_effort() {
        let mut bank = NodeBank::new();
        let mut d = LinearDissipator::new("r", Domain::Electrical, 100.0).unwrap();
        wire(&mut bank, &mut d, 1);
        let (p0, p1) = (d.ports()[0], d.ports()[1]);
        bank.set_effort(p0.node, 10.0).unwrap();
        bank.set_flow(p0.node, p0.edge, -0.02).unwrap(); // through-flow 0.02
        assert!(d.do_calc(&mut bank).unwrap());
        assert_eq!(bank.effort(p1.node), Some(8.0));
        assert_eq!(bank.flow(p1.node, p1.edge), Some(0.02));
    }

    #[test]
    fn open_forces_zero_flow() {
        let mut bank = NodeBank::new();
        let mut d = LinearDissipator::open("r", Domain::Electrical);
        wire(&mut bank, &mut d, 1);
        bank.set_effort(d.ports()[0].node, 100.0).unwrap();
        bank.set_effort(d.ports()[1].node, -40.0).unwrap();
        assert!(d.do_calc(&mut bank).unwrap());
        assert_eq!(bank.flow(d.ports()[0].node, d.ports()[0].edge), Some(0.0));
        assert_eq!(bank.flow(d.ports()[1].node, d.ports()[1].edge), Some(0.0));
    }

    #[test]
    fn bridged_copies_effort_and_passes_flow() {
        let mut bank = NodeBank::new();
        let mut d = LinearDissipator::bridged("r", Domain::Electrical);
        wire(&mut bank, &mut d, 1);
        let (p0, p1) = (d.ports()[0], d.ports()[1]);
        bank.set_effort(p0.node, 3.0).unwrap();
        bank.set_flow(p1.node, p1.edge, 0.7).unwrap();
        assert!(d.do_calc(&mut bank).unwrap());
        assert_eq!(bank.effort(p1.node), Some(3.0));
        assert_eq!(bank.flow(p0.node, p0.edge), Some(-0.7));
    }

    #[test]
    fn dead_end_propagates_effort_and_zero_flow() {
        let mut bank = NodeBank::new();
        let mut d = LinearDissipator::new("r", Domain::Electrical, 50.0).unwrap();
        // Port 0 node has a second edge, port 1 node is a dead end.
        let n0 = bank.add_node(Domain::Electrical, None);
        let e0 = bank.connect(n0, ElemId::from_index(0), Domain::Electrical).unwrap();
        bank.connect(n0, ElemId::from_index(1), Domain::Electrical).unwrap();
        let n1 = bank.add_node(Domain::Electrical, None);
        let e1 = bank.connect(n1, ElemId::from_index(0), Domain::Electrical).unwrap();
        d.attach(Port { node: n0, edge: e0 }, &mut bank).unwrap();
        d.attach(Port { node: n1, edge: e1 }, &mut bank).unwrap();
        bank.set_effort(n0, 12.0).unwrap();
        assert!(d.do_calc(&mut bank).unwrap());
        assert_eq!(bank.effort(n1), Some(12.0));
        assert_eq!(bank.flow(n1, e1), Some(0.0));
    }

    #[test]
    fn bridged_drift_is_reported_not_raised() {
        use std::sync::{Arc, Mutex};

        let seen: Arc<Mutex<Vec<Warning>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut bank = NodeBank::new();
        bank.set_reporter(Some(Box::new(move |w: &Warning| {
            sink.lock().unwrap().push(w.clone());
        })));

        let mut d = LinearDissipator::bridged("short", Domain::Electrical);
        wire(&mut bank, &mut d, 1);
        let (p0, p1) = (d.ports()[0], d.ports()[1]);
        // Upstream simplification left a residual across the bridge
        // while current passes.
        bank.set_effort(p0.node, 3.0).unwrap();
        bank.set_effort(p1.node, 3.05).unwrap();
        bank.set_flow(p0.node, p0.edge, -0.7).unwrap();
        d.do_calc(&mut bank).unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen
            .iter()
            .any(|w| w.kind == WarningKind::BridgedDrift));
    }

    #[test]
    fn imposed_delta_synthesises_flow() {
        let mut bank = NodeBank::new();
        let mut d = LinearDissipator::new("r", Domain::Electrical, 20.0).unwrap();
        wire(&mut bank, &mut d, 1);
        d.impose_delta_effort(4.0);
        assert!(d.do_calc(&mut bank).unwrap());
        assert_eq!(
            bank.flow(d.ports()[0].node, d.ports()[0].edge),
            Some(-0.2)
        );
    }
}
