//! Analytic two-phase property model with linear single-phase branches.

use bf_core::units::{Pressure, Temperature};

use crate::error::{FluidError, FluidResult};
use crate::properties::{check_finite, FluidProperties};

/// Piecewise-linear two-phase fluid.
///
/// Temperature rises with slope `1/cp_liq` up to the saturated liquid
/// enthalpy, stays at `t_sat(p)` across the plateau of width `h_evap`,
/// then rises with slope `1/cp_vap`. The saturation line is affine in
/// pressure, so `t_sat` and `p_sat` invert each other exactly. Density
/// is `rho_liq` below the plateau, falls linearly to `rho_vap` across
/// it, and stays at `rho_vap` above — which makes the isobaric mean
/// density a three-segment closed-form integral.
#[derive(Debug, Clone)]
pub struct LinearTwoPhase {
    name: String,
    cp_liq: f64,
    cp_vap: f64,
    h_evap: f64,
    rho_liq: f64,
    rho_vap: f64,
    /// Reference point and slope of the affine saturation line.
    p_ref: f64,
    t_sat_ref: f64,
    dt_sat_dp: f64,
}

impl LinearTwoPhase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        cp_liq: f64,
        cp_vap: f64,
        h_evap: f64,
        rho_liq: f64,
        rho_vap: f64,
        p_ref: Pressure,
        t_sat_ref: Temperature,
        dt_sat_dp: f64,
    ) -> FluidResult<Self> {
        for (v, what) in [
            (cp_liq, "cp_liq must be positive"),
            (cp_vap, "cp_vap must be positive"),
            (h_evap, "h_evap must be positive"),
            (rho_liq, "rho_liq must be positive"),
            (rho_vap, "rho_vap must be positive"),
            (dt_sat_dp, "dt_sat_dp must be positive"),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(FluidError::NonPhysical { what });
            }
        }
        Ok(Self {
            name: name.into(),
            cp_liq,
            cp_vap,
            h_evap,
            rho_liq,
            rho_vap,
            p_ref: p_ref.value,
            t_sat_ref: t_sat_ref.value,
            dt_sat_dp,
        })
    }

    /// Water-like parameter set around atmospheric pressure.
    pub fn water_like() -> Self {
        use bf_core::units::{k, pa};
        Self::new(
            "linear-water",
            4200.0,
            2000.0,
            2.26e6,
            958.0,
            0.6,
            pa(1.0e5),
            k(373.15),
            2.0e-4,
        )
        .expect("water-like parameters are valid")
    }

    /// Single-phase liquid of the given heat capacity: the saturation
    /// line is pushed far above any reachable state, so `temperature`
    /// reduces to `h / cp` everywhere.
    pub fn liquid(name: impl Into<String>, cp: f64, rho: f64) -> FluidResult<Self> {
        use bf_core::units::{k, pa};
        Self::new(name, cp, cp, 1.0e9, rho, rho, pa(1.0e5), k(1.0e6), 1.0e-3)
    }

    /// Enthalpy of liquid at the given temperature; inverse of
    /// [`FluidProperties::temperature`] in the liquid region.
    pub fn h_liquid(&self, t: f64) -> f64 {
        self.cp_liq * t
    }

    /// Saturated vapor enthalpy at the given pressure [J/kg].
    pub fn h_vap_sat(&self, p: f64) -> FluidResult<f64> {
        Ok(self.h_liq_sat(p)? + self.h_evap)
    }

    /// Density integral over `[a, b]` (a ≤ b) at the given pressure.
    fn rho_integral(&self, a: f64, b: f64, p: f64) -> FluidResult<f64> {
        let h_ls = self.h_liq_sat(p)?;
        let h_vs = h_ls + self.h_evap;
        let mut acc = 0.0;

        // Liquid segment
        let lo = a.min(h_ls);
        let hi = b.min(h_ls);
        if hi > lo {
            acc += self.rho_liq * (hi - lo);
        }
        // Plateau segment: rho falls linearly from rho_liq to rho_vap
        let lo = a.max(h_ls).min(h_vs);
        let hi = b.max(h_ls).min(h_vs);
        if hi > lo {
            let slope = (self.rho_vap - self.rho_liq) / self.h_evap;
            let mid = 0.5 * (lo + hi) - h_ls;
            acc += (self.rho_liq + slope * mid) * (hi - lo);
        }
        // Vapor segment
        let lo = a.max(h_vs);
        let hi = b.max(h_vs);
        if hi > lo {
            acc += self.rho_vap * (hi - lo);
        }
        Ok(acc)
    }
}

impl FluidProperties for LinearTwoPhase {
    fn name(&self) -> &str {
        &self.name
    }

    fn spec_heat_cp(&self) -> f64 {
        self.cp_liq
    }

    fn h_evap(&self) -> f64 {
        self.h_evap
    }

    fn t_sat(&self, p: f64) -> FluidResult<f64> {
        let p = check_finite(p, "pressure")?;
        Ok(self.t_sat_ref + self.dt_sat_dp * (p - self.p_ref))
    }

    fn p_sat(&self, t: f64) -> FluidResult<f64> {
        let t = check_finite(t, "temperature")?;
        Ok(self.p_ref + (t - self.t_sat_ref) / self.dt_sat_dp)
    }

    fn h_liq_sat(&self, p: f64) -> FluidResult<f64> {
        Ok(self.cp_liq * self.t_sat(p)?)
    }

    fn rho(&self, h: f64, p: f64) -> FluidResult<f64> {
        let h = check_finite(h, "enthalpy")?;
        let h_ls = self.h_liq_sat(p)?;
        if h <= h_ls {
            return Ok(self.rho_liq);
        }
        let x = (h - h_ls) / self.h_evap;
        if x >= 1.0 {
            return Ok(self.rho_vap);
        }
        Ok(self.rho_liq + (self.rho_vap - self.rho_liq) * x)
    }

    fn rho_avg(&self, h1: f64, h2: f64, p: f64) -> FluidResult<f64> {
        let h1 = check_finite(h1, "enthalpy")?;
        let h2 = check_finite(h2, "enthalpy")?;
        if h1 == h2 {
            return self.rho(h1, p);
        }
        let (a, b) = if h1 < h2 { (h1, h2) } else { (h2, h1) };
        Ok(self.rho_integral(a, b, p)? / (b - a))
    }

    fn rho_liq(&self, p: f64) -> FluidResult<f64> {
        check_finite(p, "pressure")?;
        Ok(self.rho_liq)
    }

    fn rho_vap(&self, p: f64) -> FluidResult<f64> {
        check_finite(p, "pressure")?;
        Ok(self.rho_vap)
    }

    fn vapor_fraction(&self, h: f64, p: f64) -> FluidResult<f64> {
        let h = check_finite(h, "enthalpy")?;
        let x = (h - self.h_liq_sat(p)?) / self.h_evap;
        Ok(x.clamp(0.0, 1.0))
    }

    fn temperature(&self, h: f64, p: f64) -> FluidResult<f64> {
        let h = check_finite(h, "enthalpy")?;
        let h_ls = self.h_liq_sat(p)?;
        if h <= h_ls {
            return Ok(h / self.cp_liq);
        }
        let t_sat = self.t_sat(p)?;
        if h <= h_ls + self.h_evap {
            return Ok(t_sat);
        }
        Ok(t_sat + (h - h_ls - self.h_evap) / self.cp_vap)
    }
}
