//! Fluid property model trait.

use crate::error::{FluidError, FluidResult};

/// Scalar property queries the two-phase channel relies on.
///
/// All inputs and outputs are SI: pressures in Pa, temperatures in K,
/// specific enthalpies in J/kg, densities in kg/m³. Specific enthalpy is
/// a plain `f64` throughout the engine.
///
/// Implementations must be thread-safe (`Send + Sync`) so one model can
/// be shared across all components of a network.
pub trait FluidProperties: Send + Sync {
    /// Model name for diagnostics.
    fn name(&self) -> &str;

    /// Specific heat capacity of the liquid phase [J/(kg·K)].
    fn spec_heat_cp(&self) -> f64;

    /// Specific evaporation enthalpy, the width of the two-phase
    /// plateau [J/kg].
    fn h_evap(&self) -> f64;

    /// Saturation temperature at the given pressure [K].
    fn t_sat(&self, p: f64) -> FluidResult<f64>;

    /// Saturation pressure at the given temperature [Pa]; the exact
    /// inverse of [`FluidProperties::t_sat`].
    fn p_sat(&self, t: f64) -> FluidResult<f64>;

    /// Enthalpy at which the liquid region caps out: the saturated
    /// liquid enthalpy at this pressure [J/kg].
    fn h_liq_sat(&self, p: f64) -> FluidResult<f64>;

    /// Density at the given enthalpy and pressure [kg/m³].
    fn rho(&self, h: f64, p: f64) -> FluidResult<f64>;

    /// Mean density over the isobaric enthalpy interval `[h1, h2]`:
    /// `∫ρ dh / (h2 − h1)`, degenerating to `rho(h1, p)` when the
    /// interval collapses.
    fn rho_avg(&self, h1: f64, h2: f64, p: f64) -> FluidResult<f64>;

    /// Saturated liquid density [kg/m³].
    fn rho_liq(&self, p: f64) -> FluidResult<f64>;

    /// Saturated vapor density [kg/m³].
    fn rho_vap(&self, p: f64) -> FluidResult<f64>;

    /// Vapor mass fraction in `[0, 1]`.
    fn vapor_fraction(&self, h: f64, p: f64) -> FluidResult<f64>;

    /// Temperature at the given enthalpy and pressure [K]: linear in `h`
    /// in the liquid and superheated regions, constant at the saturation
    /// temperature across the plateau.
    fn temperature(&self, h: f64, p: f64) -> FluidResult<f64>;

    /// Key-string lookup for steam-table wrapper compatibility.
    ///
    /// One- and two-argument queries share this entry point; a missing
    /// second argument for a two-argument key is a caller error.
    fn get(&self, key: &str, arg1: f64, arg2: Option<f64>) -> FluidResult<f64> {
        let two = |key: &str| {
            arg2.ok_or_else(|| FluidError::MissingArgument {
                key: key.to_string(),
            })
        };
        match key {
            "spec_heat_cp" => Ok(self.spec_heat_cp()),
            "h_evap" => Ok(self.h_evap()),
            "t_sat" => self.t_sat(arg1),
            "p_sat" => self.p_sat(arg1),
            "h_liq_sat" => self.h_liq_sat(arg1),
            "rho_liq" => self.rho_liq(arg1),
            "rho_vap" => self.rho_vap(arg1),
            "rho" => self.rho(arg1, two(key)?),
            "x" => self.vapor_fraction(arg1, two(key)?),
            "temperature" => self.temperature(arg1, two(key)?),
            _ => Err(FluidError::UnknownProperty {
                key: key.to_string(),
            }),
        }
    }
}

pub(crate) fn check_finite(v: f64, what: &'static str) -> FluidResult<f64> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(FluidError::NonFinite { what, value: v })
    }
}
