//! Expanding thermal exchanger: isobaric evaporator with volume V.

use std::sync::Arc;

use bf_core::Real;
use bf_fluids::FluidProperties;
use bf_graph::{Domain, NodeBank};

use crate::common::{equalize_efforts, Port, StorageState};
use crate::error::{ElementError, ElementResult};

/// Tick phases of the evaporator's calculation machine.
///
/// The normal branch runs the expansion in one pass once every input is
/// present; the reverse branch needs two passes because the make-up
/// stream's enthalpy only exists after the provisional intake flow has
/// propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepPhase {
    Idle,
    ReversePending,
    Settled,
}

/// Isobaric evaporator tracking inner mass and enthalpy inside a fixed
/// volume.
///
/// Heating drops the mixture density; whatever mass no longer fits the
/// volume is ejected through the outlet at the current inner enthalpy.
/// A delayed inlet enthalpy (first-order lag over the turnover time)
/// anchors the density-weighting integral so a cold plug entering the
/// vessel does not instantly collapse the capacity estimate. Mass
/// deficits accumulate instead of sucking backwards and are drained by
/// later positive ejections.
pub struct ExpandingExchanger {
    name: String,
    props: Arc<dyn FluidProperties>,
    /// Vessel volume [m³].
    volume: Real,
    mass: StorageState,
    enthalpy: StorageState,
    /// PT1-delayed inlet enthalpy, the density-weighting anchor.
    h_delayed_in: Real,
    /// Accumulated mass deficit waiting to be drained.
    negative_mass: Real,
    phase: StepPhase,
    dt: Real,
    ports: Vec<Port>,
}

impl ExpandingExchanger {
    pub fn new(
        name: impl Into<String>,
        props: Arc<dyn FluidProperties>,
        volume: Real,
        initial_mass: Real,
        initial_enthalpy: Real,
    ) -> ElementResult<Self> {
        let name = name.into();
        if !volume.is_finite() || volume <= 0.0 {
            return Err(ElementError::calculation(
                &name,
                "volume must be positive and finite",
            ));
        }
        if !initial_mass.is_finite() || initial_mass <= 0.0 {
            return Err(ElementError::calculation(
                &name,
                "inner mass must be positive and finite",
            ));
        }
        if !initial_enthalpy.is_finite() {
            return Err(ElementError::calculation(&name, "enthalpy must be finite"));
        }
        Ok(Self {
            name,
            props,
            volume,
            mass: StorageState::new(initial_mass, 1.0),
            enthalpy: StorageState::new(initial_enthalpy, 1.0),
            h_delayed_in: initial_enthalpy,
            negative_mass: 0.0,
            phase: StepPhase::Idle,
            dt: 0.0,
            ports: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> Domain {
        Domain::MultiDomain
    }

    pub fn inner_mass(&self) -> Real {
        self.mass.state
    }

    pub fn enthalpy(&self) -> Real {
        self.enthalpy.state
    }

    pub fn set_volume(&mut self, v: Real) -> ElementResult<()> {
        if !v.is_finite() || v <= 0.0 {
            return Err(ElementError::calculation(
                &self.name,
                "volume must be positive and finite",
            ));
        }
        self.volume = v;
        Ok(())
    }

    pub fn set_step_time(&mut self, dt: Real) {
        self.dt = dt;
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    /// Ports attach in order: fluid inlet, fluid outlet, then optionally
    /// a thermal surface node.
    pub fn attach(&mut self, port: Port, bank: &mut NodeBank) -> ElementResult<()> {
        let node_domain = bank.domain(port.node);
        match self.ports.len() {
            0 | 1 => {
                if node_domain != Domain::PhasedFluid {
                    return Err(ElementError::model(
                        &self.name,
                        "fluid ports must be on phased-fluid nodes",
                    ));
                }
            }
            2 => {
                if node_domain != Domain::Thermal {
                    return Err(ElementError::model(
                        &self.name,
                        "third port must be on a thermal node",
                    ));
                }
            }
            _ => {
                return Err(ElementError::model(&self.name, "already fully connected"));
            }
        }
        self.ports.push(port);
        Ok(())
    }

    fn thermal_port(&self) -> Option<Port> {
        self.ports.get(2).copied()
    }

    pub fn prepare(&mut self, _bank: &mut NodeBank) -> ElementResult<()> {
        self.mass.rotate();
        self.enthalpy.rotate();
        self.phase = StepPhase::Idle;
        Ok(())
    }

    pub fn do_calc(&mut self, bank: &mut NodeBank) -> ElementResult<bool> {
        if self.ports.len() < 2 {
            return Err(ElementError::model(
                &self.name,
                "needs inlet and outlet nodes",
            ));
        }
        let (p0, p1) = (self.ports[0], self.ports[1]);
        let mut progress = equalize_efforts(bank, p0, p1)?;

        // Thermal surface behaves like the volumetric exchanger's.
        if let Some(pt) = self.thermal_port() {
            if bank.effort(pt.node).is_none() {
                if let Some(p) = self.pressure(bank) {
                    let t = self.props.temperature(self.enthalpy.state, p)?;
                    bank.set_effort(pt.node, t)?;
                    progress = true;
                }
            }
        }

        match self.phase {
            StepPhase::Idle => progress |= self.calc_from_idle(bank)?,
            StepPhase::ReversePending => progress |= self.finalize_reverse(bank)?,
            StepPhase::Settled => {}
        }
        Ok(progress)
    }

    fn pressure(&self, bank: &NodeBank) -> Option<Real> {
        bank.effort(self.ports[0].node)
            .or_else(|| bank.effort(self.ports[1].node))
    }

    fn heat_flow(&self, bank: &NodeBank) -> Option<Real> {
        match self.thermal_port() {
            Some(pt) => bank.flow(pt.node, pt.edge),
            None => Some(0.0),
        }
    }

    fn calc_from_idle(&mut self, bank: &mut NodeBank) -> ElementResult<bool> {
        let p0 = self.ports[0];
        let Some(f0) = bank.flow(p0.node, p0.edge) else {
            return Ok(false);
        };
        if f0 > bank.tolerances().no_energy_flow {
            // The network draws mass out through the inlet.
            self.begin_reverse(bank, f0)
        } else {
            self.calc_normal(bank, -f0)
        }
    }

    /// Normal regime: inflow through the inlet, ejection through the
    /// outlet, all in one pass.
    fn calc_normal(&mut self, bank: &mut NodeBank, f_in: Real) -> ElementResult<bool> {
        let (p0, p1) = (self.ports[0], self.ports[1]);
        let tol = bank.tolerances().no_energy_flow;

        let Some(p) = self.pressure(bank) else {
            return Ok(false);
        };
        let Some(q) = self.heat_flow(bank) else {
            return Ok(false);
        };
        let h_in = if f_in > tol {
            if !bank.heat_resolved(p0.node, p0.edge) {
                return Ok(false);
            }
            bank.heat(p0.node, p0.edge).unwrap_or(self.enthalpy.state)
        } else {
            self.enthalpy.state
        };

        let m = self.mass.state;
        let h = self.enthalpy.state;
        let fin_dt = f_in * self.dt;
        let q_dt = q * self.dt;

        // Energy balance without the outflow term; degenerate inputs
        // keep the state bit-identical.
        let e_prime = if fin_dt == 0.0 && q_dt == 0.0 {
            h
        } else if fin_dt == 0.0 {
            h - q_dt / m
        } else {
            (m * h + fin_dt * h_in - q_dt) / (m + fin_dt)
        };
        if !e_prime.is_finite() {
            return Err(ElementError::calculation(
                &self.name,
                "energy balance is not finite",
            ));
        }

        if f_in > 0.0 {
            self.h_delayed_in += self.dt * (f_in / m) * (h_in - self.h_delayed_in);
        }

        let rho_bar = self.props.rho_avg(self.h_delayed_in, e_prime, p)?;
        let m_capacity = rho_bar * self.volume;
        let m_out = self.eject_mass(m - m_capacity + fin_dt);

        let out_flow = m_out / self.dt;
        match bank.flow(p1.node, p1.edge) {
            None => bank.set_flow(p1.node, p1.edge, out_flow)?,
            Some(existing) => {
                if (existing - out_flow).abs() > bank.tolerances().flow_balance {
                    return Err(ElementError::model(
                        &self.name,
                        "flow already set where element expected freedom",
                    ));
                }
            }
        }
        if m_out > 0.0 && bank.heat(p1.node, p1.edge).is_none() {
            bank.set_heat(p1.node, p1.edge, h)?;
        }

        self.enthalpy.stage(e_prime);
        self.mass.stage(m - m_out + fin_dt);
        self.phase = StepPhase::Settled;
        Ok(true)
    }

    /// Apply the no-suction rule: deficits accumulate, later ejections
    /// drain them first.
    fn eject_mass(&mut self, m_out_raw: Real) -> Real {
        if m_out_raw <= 0.0 {
            self.negative_mass += -m_out_raw;
            0.0
        } else {
            let drained = m_out_raw.min(self.negative_mass);
            self.negative_mass -= drained;
            m_out_raw - drained
        }
    }

    /// Reverse regime, first pass: the inlet side draws `f0` out of the
    /// vessel. The inlet stream carries the inner enthalpy, and volume
    /// conservation fixes a provisional make-up intake through the
    /// outlet; the balance finishes once that stream's enthalpy arrives.
    fn begin_reverse(&mut self, bank: &mut NodeBank, f0: Real) -> ElementResult<bool> {
        let (p0, p1) = (self.ports[0], self.ports[1]);
        let Some(p) = self.pressure(bank) else {
            return Ok(false);
        };
        if bank.heat(p0.node, p0.edge).is_none() {
            bank.set_heat(p0.node, p0.edge, self.enthalpy.state)?;
        }

        let m = self.mass.state;
        let rho_bar = self
            .props
            .rho_avg(self.h_delayed_in, self.enthalpy.state, p)?;
        let m_capacity = rho_bar * self.volume;
        // Mass balance with the inlet ejection already committed.
        let m_out_raw = m - m_capacity - f0 * self.dt;
        let m_out = if m_out_raw >= 0.0 {
            self.eject_mass(m_out_raw)
        } else {
            // Make-up intake; no deficit bookkeeping for drawn mass.
            m_out_raw
        };
        match bank.flow(p1.node, p1.edge) {
            None => bank.set_flow(p1.node, p1.edge, m_out / self.dt)?,
            Some(existing) => {
                if (existing - m_out / self.dt).abs() > bank.tolerances().flow_balance {
                    return Err(ElementError::model(
                        &self.name,
                        "flow already set where element expected freedom",
                    ));
                }
            }
        }
        self.phase = StepPhase::ReversePending;
        Ok(true)
    }

    /// Reverse regime, second pass: the make-up stream's enthalpy has
    /// arrived (or no make-up was needed) and the state can be staged.
    fn finalize_reverse(&mut self, bank: &mut NodeBank) -> ElementResult<bool> {
        let (p0, p1) = (self.ports[0], self.ports[1]);
        let tol = bank.tolerances().no_energy_flow;
        let Some(q) = self.heat_flow(bank) else {
            return Ok(false);
        };
        let f0 = bank.flow(p0.node, p0.edge).unwrap_or(0.0);
        let f1 = bank.flow(p1.node, p1.edge).unwrap_or(0.0);

        let intake = -f1;
        let (fin_dt, h_in) = if intake > tol {
            if !bank.heat_resolved(p1.node, p1.edge) {
                return Ok(false);
            }
            (
                intake * self.dt,
                bank.heat(p1.node, p1.edge).unwrap_or(self.enthalpy.state),
            )
        } else {
            (0.0, self.enthalpy.state)
        };

        let m = self.mass.state;
        let h = self.enthalpy.state;
        let q_dt = q * self.dt;
        let e_prime = if fin_dt == 0.0 && q_dt == 0.0 {
            h
        } else if fin_dt == 0.0 {
            h - q_dt / m
        } else {
            (m * h + fin_dt * h_in - q_dt) / (m + fin_dt)
        };
        if !e_prime.is_finite() {
            return Err(ElementError::calculation(
                &self.name,
                "energy balance is not finite",
            ));
        }
        if fin_dt > 0.0 {
            self.h_delayed_in += self.dt * (fin_dt / self.dt / m) * (h_in - self.h_delayed_in);
        }

        self.enthalpy.stage(e_prime);
        // Both edges are signed element-into-node: positive values eject
        // mass, negative values take it in.
        self.mass.stage(m - f0 * self.dt - f1 * self.dt);
        self.phase = StepPhase::Settled;
        Ok(true)
    }

    pub fn finished(&self, bank: &NodeBank) -> bool {
        self.phase == StepPhase::Settled
            && self.mass.delta_done()
            && self.enthalpy.delta_done()
            && self.ports.iter().all(|p| {
                bank.effort(p.node).is_some()
                    && bank.flow(p.node, p.edge).is_some()
                    && bank.heat_resolved(p.node, p.edge)
            })
    }

    pub(crate) fn state_fields(&self) -> Vec<(String, Real)> {
        vec![
            ("m".to_string(), self.mass.state),
            ("h".to_string(), self.enthalpy.state),
            ("h_delayed_in".to_string(), self.h_delayed_in),
        ]
    }

    pub(crate) fn apply_state_fields(&mut self, values: &[(String, Real)]) -> ElementResult<()> {
        for (field, value) in values {
            match field.as_str() {
                "m" => self.mass.reset_to(*value),
                "h" => self.enthalpy.reset_to(*value),
                "h_delayed_in" => self.h_delayed_in = *value,
                _ => {
                    return Err(ElementError::NoSuchStateVariable {
                        element: self.name.clone(),
                        field: field.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
