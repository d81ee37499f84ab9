//! Volumetric thermal exchanger on the phased-fluid channel.

use std::sync::Arc;

use bf_core::Real;
use bf_fluids::FluidProperties;
use bf_graph::{Domain, NodeBank};

use crate::common::{equalize_efforts, pass_flow_through, Port, StorageState};
use crate::error::{ElementError, ElementResult};

/// Fixed mass of fluid exchanging heat with a thermal network.
///
/// Two phased-fluid ports pass the mass flow through without a pressure
/// drop; the third port lives on a thermal node where the element forces
/// its own temperature, so the surrounding thermal network settles the
/// heat flow against it. The inner state is the specific enthalpy of the
/// heated mass; inbound streams mix into it and the thermal heat flow
/// charges or drains it, staged for the next tick.
pub struct ThermalExchanger {
    name: String,
    props: Arc<dyn FluidProperties>,
    /// Heated fluid inventory [kg].
    mass: Real,
    storage: StorageState,
    dt: Real,
    ports: Vec<Port>,
}

impl ThermalExchanger {
    pub fn new(
        name: impl Into<String>,
        props: Arc<dyn FluidProperties>,
        inner_mass: Real,
        initial_enthalpy: Real,
    ) -> ElementResult<Self> {
        let name = name.into();
        if !inner_mass.is_finite() || inner_mass <= 0.0 {
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
            mass: inner_mass,
            storage: StorageState::new(initial_enthalpy, 1.0),
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

    /// Specific enthalpy of the heated mass at the start of this tick.
    pub fn enthalpy(&self) -> Real {
        self.storage.state
    }

    pub fn inner_mass(&self) -> Real {
        self.mass
    }

    pub fn set_inner_heated_mass(&mut self, m: Real) -> ElementResult<()> {
        if !m.is_finite() || m <= 0.0 {
            return Err(ElementError::calculation(
                &self.name,
                "inner mass must be positive and finite",
            ));
        }
        self.mass = m;
        Ok(())
    }

    pub fn set_initial_enthalpy(&mut self, h: Real) -> ElementResult<()> {
        if !h.is_finite() {
            return Err(ElementError::calculation(&self.name, "enthalpy must be finite"));
        }
        self.storage.reset_to(h);
        Ok(())
    }

    pub fn set_step_time(&mut self, dt: Real) {
        self.dt = dt;
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    /// Ports attach in order: fluid inlet, fluid outlet, thermal surface.
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

    /// Fluid temperature on one side, from that side's edge enthalpy.
    ///
    /// TODO: both sides evaluate against the port-0 pressure; revisit
    /// once the two fluid nodes can carry different pressures.
    pub fn temperature_at(&self, bank: &NodeBank, side: usize) -> ElementResult<Real> {
        if side > 1 {
            return Err(ElementError::model(&self.name, "fluid side must be 0 or 1"));
        }
        let p = bank.effort(self.ports[0].node).ok_or_else(|| {
            ElementError::calculation(&self.name, "pressure not yet known")
        })?;
        let port = self.ports[side];
        let h = bank
            .heat(port.node, port.edge)
            .unwrap_or(self.storage.state);
        Ok(self.props.temperature(h, p)?)
    }

    /// Inner temperature the element forces on its thermal node.
    pub fn inner_temperature(&self, pressure: Real) -> ElementResult<Real> {
        Ok(self.props.temperature(self.storage.state, pressure)?)
    }

    pub fn prepare(&mut self, _bank: &mut NodeBank) -> ElementResult<()> {
        self.storage.rotate();
        Ok(())
    }

    pub fn do_calc(&mut self, bank: &mut NodeBank) -> ElementResult<bool> {
        if self.ports.len() != 3 {
            return Err(ElementError::model(
                &self.name,
                "needs two fluid nodes and one thermal node",
            ));
        }
        let (p0, p1, pt) = (self.ports[0], self.ports[1], self.ports[2]);
        let mut progress = equalize_efforts(bank, p0, p1)?;
        progress |= pass_flow_through(bank, p0, p1)?;

        let tol = bank.tolerances().no_energy_flow;
        // Mass leaving the element carries the inner enthalpy.
        for p in [p0, p1] {
            if let Some(f) = bank.flow(p.node, p.edge) {
                if f > tol && bank.heat(p.node, p.edge).is_none() {
                    bank.set_heat(p.node, p.edge, self.storage.state)?;
                    progress = true;
                }
            }
        }

        // The thermal node sees the inner temperature.
        if bank.effort(pt.node).is_none() {
            if let Some(p) = bank.effort(p0.node) {
                let t = self.props.temperature(self.storage.state, p)?;
                bank.set_effort(pt.node, t)?;
                progress = true;
            }
        }

        if !self.storage.delta_done() {
            progress |= self.try_stage(bank)?;
        }
        Ok(progress)
    }

    fn try_stage(&mut self, bank: &mut NodeBank) -> ElementResult<bool> {
        let (p0, p1, pt) = (self.ports[0], self.ports[1], self.ports[2]);
        let tol = bank.tolerances().no_energy_flow;

        let Some(q_out) = bank.flow(pt.node, pt.edge) else {
            return Ok(false);
        };
        let mut fin_dt = 0.0;
        let mut energy_in = 0.0;
        for p in [p0, p1] {
            let Some(f) = bank.flow(p.node, p.edge) else {
                return Ok(false);
            };
            if f < -tol {
                // Inbound stream: its enthalpy must have arrived.
                if !bank.heat_resolved(p.node, p.edge) {
                    return Ok(false);
                }
                let h_in = bank.heat(p.node, p.edge).unwrap_or(self.storage.state);
                let m_in = -f * self.dt;
                fin_dt += m_in;
                energy_in += m_in * h_in;
            }
        }

        let m = self.mass;
        let h = self.storage.state;
        let q_dt = q_out * self.dt;
        // Degenerate inputs keep the state bit-identical.
        let next = if fin_dt == 0.0 && q_dt == 0.0 {
            h
        } else if fin_dt == 0.0 {
            h - q_dt / m
        } else if q_dt == 0.0 {
            (m * h + energy_in) / (m + fin_dt)
        } else {
            (m * h + energy_in - q_dt) / (m + fin_dt)
        };
        if !next.is_finite() {
            return Err(ElementError::calculation(
                &self.name,
                "staged enthalpy is not finite",
            ));
        }
        self.storage.stage(next);
        Ok(true)
    }

    pub fn finished(&self, bank: &NodeBank) -> bool {
        self.storage.delta_done()
            && self.ports.len() == 3
            && self.ports.iter().all(|p| {
                bank.effort(p.node).is_some()
                    && bank.flow(p.node, p.edge).is_some()
                    && bank.heat_resolved(p.node, p.edge)
            })
    }

    pub(crate) fn state_fields(&self) -> Vec<(String, Real)> {
        vec![("h".to_string(), self.storage.state)]
    }

    pub(crate) fn apply_state_fields(&mut self, values: &[(String, Real)]) -> ElementResult<()> {
        for (field, value) in values {
            match field.as_str() {
                "h" => self.storage.reset_to(*value),
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
