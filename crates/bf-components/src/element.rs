//! The closed union of element kinds.
//!
//! Kind-specific behavior lives in the payload structs; this module only
//! dispatches the shared lifecycle surface (`prepare`, `do_calc`,
//! `finished`, `set_step_time`) and the state-record access used by the
//! initial-condition round trip.

use bf_core::Real;
use bf_graph::{Domain, NodeBank};

use crate::capacitance::{MutualCapacitance, SelfCapacitance};
use crate::common::Port;
use crate::dissipator::LinearDissipator;
use crate::enforcer::Enforcer;
use crate::error::{ElementError, ElementResult};
use crate::evaporator::ExpandingExchanger;
use crate::exchanger::ThermalExchanger;
use crate::inductance::Inductance;
use crate::origin::Origin;
use crate::reservoir::SteamReservoir;
use crate::source::{EffortSource, FlowSource};
#[cfg(feature = "square-law")]
use crate::square::SquareDissipator;

/// Discriminant of an element, used by solvers to pick their subnets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Dissipator,
    #[cfg(feature = "square-law")]
    SquareDissipator,
    EffortSource,
    FlowSource,
    Origin,
    Enforcer,
    SelfCapacitance,
    MutualCapacitance,
    Inductance,
    ThermalExchanger,
    ExpandingExchanger,
    SteamReservoir,
}

/// A network element.
pub enum Element {
    Dissipator(LinearDissipator),
    #[cfg(feature = "square-law")]
    SquareDissipator(SquareDissipator),
    EffortSource(EffortSource),
    FlowSource(FlowSource),
    Origin(Origin),
    Enforcer(Enforcer),
    SelfCapacitance(SelfCapacitance),
    MutualCapacitance(MutualCapacitance),
    Inductance(Inductance),
    ThermalExchanger(ThermalExchanger),
    ExpandingExchanger(ExpandingExchanger),
    SteamReservoir(SteamReservoir),
}

macro_rules! dispatch {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            Element::Dissipator($inner) => $body,
            #[cfg(feature = "square-law")]
            Element::SquareDissipator($inner) => $body,
            Element::EffortSource($inner) => $body,
            Element::FlowSource($inner) => $body,
            Element::Origin($inner) => $body,
            Element::Enforcer($inner) => $body,
            Element::SelfCapacitance($inner) => $body,
            Element::MutualCapacitance($inner) => $body,
            Element::Inductance($inner) => $body,
            Element::ThermalExchanger($inner) => $body,
            Element::ExpandingExchanger($inner) => $body,
            Element::SteamReservoir($inner) => $body,
        }
    };
}

impl Element {
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Dissipator(_) => ElementKind::Dissipator,
            #[cfg(feature = "square-law")]
            Element::SquareDissipator(_) => ElementKind::SquareDissipator,
            Element::EffortSource(_) => ElementKind::EffortSource,
            Element::FlowSource(_) => ElementKind::FlowSource,
            Element::Origin(_) => ElementKind::Origin,
            Element::Enforcer(_) => ElementKind::Enforcer,
            Element::SelfCapacitance(_) => ElementKind::SelfCapacitance,
            Element::MutualCapacitance(_) => ElementKind::MutualCapacitance,
            Element::Inductance(_) => ElementKind::Inductance,
            Element::ThermalExchanger(_) => ElementKind::ThermalExchanger,
            Element::ExpandingExchanger(_) => ElementKind::ExpandingExchanger,
            Element::SteamReservoir(_) => ElementKind::SteamReservoir,
        }
    }

    pub fn name(&self) -> &str {
        dispatch!(self, e => e.name())
    }

    pub fn domain(&self) -> Domain {
        dispatch!(self, e => e.domain())
    }

    pub fn ports(&self) -> &[Port] {
        dispatch!(self, e => e.ports())
    }

    pub fn attach(&mut self, port: Port, bank: &mut NodeBank) -> ElementResult<()> {
        dispatch!(self, e => e.attach(port, bank))
    }

    pub fn prepare(&mut self, bank: &mut NodeBank) -> ElementResult<()> {
        dispatch!(self, e => e.prepare(bank))
    }

    pub fn do_calc(&mut self, bank: &mut NodeBank) -> ElementResult<bool> {
        dispatch!(self, e => e.do_calc(bank))
    }

    pub fn finished(&self, bank: &NodeBank) -> bool {
        dispatch!(self, e => e.finished(bank))
    }

    pub fn set_step_time(&mut self, dt: Real) {
        match self {
            Element::SelfCapacitance(e) => e.set_step_time(dt),
            Element::MutualCapacitance(e) => e.set_step_time(dt),
            Element::Inductance(e) => e.set_step_time(dt),
            Element::ThermalExchanger(e) => e.set_step_time(dt),
            Element::ExpandingExchanger(e) => e.set_step_time(dt),
            Element::SteamReservoir(e) => e.set_step_time(dt),
            _ => {}
        }
    }

    /// Scalar state fields of a storage element, `None` for stateless
    /// kinds.
    pub fn state_record(&self) -> Option<Vec<(String, Real)>> {
        match self {
            Element::SelfCapacitance(e) => Some(vec![("state".to_string(), e.state())]),
            Element::MutualCapacitance(e) => Some(vec![("state".to_string(), e.state())]),
            Element::Inductance(e) => Some(vec![("state".to_string(), e.state())]),
            Element::ThermalExchanger(e) => Some(e.state_fields()),
            Element::ExpandingExchanger(e) => Some(e.state_fields()),
            Element::SteamReservoir(e) => Some(e.state_fields()),
            _ => None,
        }
    }

    /// Restore scalar state fields; requesting state on a stateless
    /// element is a caller bug.
    pub fn apply_state_record(&mut self, values: &[(String, Real)]) -> ElementResult<()> {
        match self {
            Element::SelfCapacitance(e) => {
                let name = e.name().to_string();
                apply_single_state(values, &name, |v| e.set_initial_state(v))
            }
            Element::MutualCapacitance(e) => {
                let name = e.name().to_string();
                apply_single_state(values, &name, |v| e.set_initial_state(v))
            }
            Element::Inductance(e) => {
                let name = e.name().to_string();
                apply_single_state(values, &name, |v| e.set_initial_state(v))
            }
            Element::ThermalExchanger(e) => e.apply_state_fields(values),
            Element::ExpandingExchanger(e) => e.apply_state_fields(values),
            Element::SteamReservoir(e) => e.apply_state_fields(values),
            other => Err(ElementError::NoSuchStateVariable {
                element: other.name().to_string(),
                field: values
                    .first()
                    .map(|(f, _)| f.clone())
                    .unwrap_or_else(|| "state".to_string()),
            }),
        }
    }

    pub fn as_dissipator(&self) -> Option<&LinearDissipator> {
        match self {
            Element::Dissipator(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_dissipator_mut(&mut self) -> Option<&mut LinearDissipator> {
        match self {
            Element::Dissipator(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_effort_source(&self) -> Option<&EffortSource> {
        match self {
            Element::EffortSource(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_effort_source_mut(&mut self) -> Option<&mut EffortSource> {
        match self {
            Element::EffortSource(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_flow_source(&self) -> Option<&FlowSource> {
        match self {
            Element::FlowSource(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_flow_source_mut(&mut self) -> Option<&mut FlowSource> {
        match self {
            Element::FlowSource(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_origin(&self) -> Option<&Origin> {
        match self {
            Element::Origin(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_origin_mut(&mut self) -> Option<&mut Origin> {
        match self {
            Element::Origin(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_self_capacitance(&self) -> Option<&SelfCapacitance> {
        match self {
            Element::SelfCapacitance(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_mutual_capacitance(&self) -> Option<&MutualCapacitance> {
        match self {
            Element::MutualCapacitance(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_inductance(&self) -> Option<&Inductance> {
        match self {
            Element::Inductance(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_exchanger(&self) -> Option<&ThermalExchanger> {
        match self {
            Element::ThermalExchanger(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_evaporator(&self) -> Option<&ExpandingExchanger> {
        match self {
            Element::ExpandingExchanger(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_reservoir(&self) -> Option<&SteamReservoir> {
        match self {
            Element::SteamReservoir(e) => Some(e),
            _ => None,
        }
    }
}

fn apply_single_state(
    values: &[(String, Real)],
    element: &str,
    mut set: impl FnMut(Real) -> ElementResult<()>,
) -> ElementResult<()> {
    for (field, value) in values {
        if field != "state" {
            return Err(ElementError::NoSuchStateVariable {
                element: element.to_string(),
                field: field.clone(),
            });
        }
        set(*value)?;
    }
    Ok(())
}

macro_rules! impl_from {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for Element {
            fn from(e: $ty) -> Self {
                Element::$variant(e)
            }
        }
    };
}

impl_from!(Dissipator, LinearDissipator);
#[cfg(feature = "square-law")]
impl_from!(SquareDissipator, SquareDissipator);
impl_from!(EffortSource, EffortSource);
impl_from!(FlowSource, FlowSource);
impl_from!(Origin, Origin);
impl_from!(Enforcer, Enforcer);
impl_from!(SelfCapacitance, SelfCapacitance);
impl_from!(MutualCapacitance, MutualCapacitance);
impl_from!(Inductance, Inductance);
impl_from!(ThermalExchanger, ThermalExchanger);
impl_from!(ExpandingExchanger, ExpandingExchanger);
impl_from!(SteamReservoir, SteamReservoir);
