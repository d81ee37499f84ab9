//! Closed steamed reservoir with phase-separated outlets.

use std::sync::Arc;

use bf_core::Real;
use bf_fluids::FluidProperties;
use bf_graph::{Domain, NodeBank};

use crate::common::{Port, StorageState};
use crate::error::{ElementError, ElementResult};

/// Which phase an outlet port draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutletKind {
    /// Mixture at the inner enthalpy.
    #[default]
    Mixed,
    /// Vapor space: leaves with the full evaporation enthalpy on top.
    Steam,
    /// Liquid space: leaves at the inner enthalpy.
    Liquid,
}

/// Mass store whose pressure floor is ambient, lifted by evaporation
/// once the contents reach saturation.
///
/// The element is a self-capacitance over mass: it forces one pressure
/// on all of its nodes and integrates net inflow. The inner enthalpy
/// follows total-enthalpy bookkeeping, so steam drawn off the top also
/// drains energy from the remaining inventory.
pub struct SteamReservoir {
    name: String,
    props: Arc<dyn FluidProperties>,
    mass: StorageState,
    enthalpy: StorageState,
    /// Pressure floor [Pa].
    p_ambient: Real,
    dt: Real,
    ports: Vec<Port>,
    outlet_kinds: Vec<OutletKind>,
}

impl SteamReservoir {
    pub fn new(
        name: impl Into<String>,
        props: Arc<dyn FluidProperties>,
        p_ambient: Real,
        initial_mass: Real,
        initial_enthalpy: Real,
    ) -> ElementResult<Self> {
        let name = name.into();
        if !p_ambient.is_finite() || p_ambient <= 0.0 {
            return Err(ElementError::calculation(
                &name,
                "ambient pressure must be positive and finite",
            ));
        }
        if !initial_mass.is_finite() || initial_mass <= 0.0 {
            return Err(ElementError::calculation(
                &name,
                "initial mass must be positive and finite",
            ));
        }
        if !initial_enthalpy.is_finite() {
            return Err(ElementError::calculation(&name, "enthalpy must be finite"));
        }
        Ok(Self {
            name,
            props,
            mass: StorageState::new(initial_mass, 1.0),
            enthalpy: StorageState::new(initial_enthalpy, 1.0),
            p_ambient,
            dt: 0.0,
            ports: Vec::new(),
            outlet_kinds: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> Domain {
        Domain::PhasedFluid
    }

    pub fn inner_mass(&self) -> Real {
        self.mass.state
    }

    pub fn enthalpy(&self) -> Real {
        self.enthalpy.state
    }

    /// Inner temperature, evaluated at the ambient pressure floor.
    pub fn temperature(&self) -> ElementResult<Real> {
        Ok(self.props.temperature(self.enthalpy.state, self.p_ambient)?)
    }

    /// Pressure the reservoir forces on its nodes: ambient, or the
    /// saturation pressure of the contents if evaporation lifts it
    /// higher.
    pub fn pressure(&self) -> ElementResult<Real> {
        let t = self.temperature()?;
        let p_sat = self.props.p_sat(t)?;
        Ok(self.p_ambient.max(p_sat))
    }

    pub fn set_step_time(&mut self, dt: Real) {
        self.dt = dt;
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn attach(&mut self, port: Port, bank: &mut NodeBank) -> ElementResult<()> {
        let node_domain = bank.domain(port.node);
        if node_domain != Domain::PhasedFluid {
            return Err(ElementError::model(
                &self.name,
                "reservoir ports must be on phased-fluid nodes",
            ));
        }
        self.ports.push(port);
        self.outlet_kinds.push(OutletKind::Mixed);
        Ok(())
    }

    /// Tag the most recently attached port as a steam or liquid outlet.
    pub fn tag_last_outlet(&mut self, kind: OutletKind) -> ElementResult<()> {
        match self.outlet_kinds.last_mut() {
            Some(slot) => {
                *slot = kind;
                Ok(())
            }
            None => Err(ElementError::model(&self.name, "no port attached yet")),
        }
    }

    fn outlet_enthalpy(&self, kind: OutletKind) -> Real {
        match kind {
            OutletKind::Mixed | OutletKind::Liquid => self.enthalpy.state,
            OutletKind::Steam => self.enthalpy.state + self.props.h_evap(),
        }
    }

    pub fn prepare(&mut self, _bank: &mut NodeBank) -> ElementResult<()> {
        self.mass.rotate();
        self.enthalpy.rotate();
        Ok(())
    }

    pub fn do_calc(&mut self, bank: &mut NodeBank) -> ElementResult<bool> {
        if self.ports.is_empty() {
            return Err(ElementError::model(&self.name, "needs at least one node"));
        }
        let mut progress = false;
        let pressure = self.pressure()?;
        for p in &self.ports {
            if bank.effort(p.node).is_none() {
                bank.set_effort(p.node, pressure)?;
                progress = true;
            }
        }

        let tol = bank.tolerances().no_energy_flow;
        // Ejected mass carries the phase-dependent outlet enthalpy.
        for (p, kind) in self.ports.iter().zip(&self.outlet_kinds) {
            if let Some(f) = bank.flow(p.node, p.edge) {
                if f > tol && bank.heat(p.node, p.edge).is_none() {
                    bank.set_heat(p.node, p.edge, self.outlet_enthalpy(*kind))?;
                    progress = true;
                }
            }
        }

        if !self.mass.delta_done() {
            progress |= self.try_stage(bank)?;
        }
        Ok(progress)
    }

    fn try_stage(&mut self, bank: &mut NodeBank) -> ElementResult<bool> {
        let tol = bank.tolerances().no_energy_flow;
        let mut mass_in_dt = 0.0;
        let mut mass_out_dt = 0.0;
        let mut energy_in = 0.0;
        let mut energy_out = 0.0;
        for (p, kind) in self.ports.iter().zip(&self.outlet_kinds) {
            let Some(f) = bank.flow(p.node, p.edge) else {
                return Ok(false);
            };
            if f < -tol {
                if !bank.heat_resolved(p.node, p.edge) {
                    return Ok(false);
                }
                let h_in = bank.heat(p.node, p.edge).unwrap_or(self.enthalpy.state);
                let m_in = -f * self.dt;
                mass_in_dt += m_in;
                energy_in += m_in * h_in;
            } else if f > tol {
                let m_out = f * self.dt;
                mass_out_dt += m_out;
                energy_out += m_out * self.outlet_enthalpy(*kind);
            }
        }

        let m = self.mass.state;
        let h = self.enthalpy.state;
        let next_m = m + mass_in_dt - mass_out_dt;
        if next_m <= 0.0 {
            return Err(ElementError::calculation(
                &self.name,
                "reservoir drained below zero mass",
            ));
        }
        // Degenerate inputs keep the state bit-identical.
        let next_h = if mass_in_dt == 0.0 && mass_out_dt == 0.0 {
            h
        } else {
            (m * h + energy_in - energy_out) / next_m
        };
        if !next_h.is_finite() {
            return Err(ElementError::calculation(
                &self.name,
                "staged enthalpy is not finite",
            ));
        }
        self.mass.stage(next_m);
        self.enthalpy.stage(next_h);
        Ok(true)
    }

    pub fn finished(&self, bank: &NodeBank) -> bool {
        self.mass.delta_done()
            && self.enthalpy.delta_done()
            && !self.ports.is_empty()
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
        ]
    }

    pub(crate) fn apply_state_fields(&mut self, values: &[(String, Real)]) -> ElementResult<()> {
        for (field, value) in values {
            match field.as_str() {
                "m" => self.mass.reset_to(*value),
                "h" => self.enthalpy.reset_to(*value),
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
