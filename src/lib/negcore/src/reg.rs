//! Regeneration solver (REG): the slow vegetation / soil-organic-matter
//! ODE, optional microbial-priming extension, and the one-way
//! hydrological write-back.
//!
//! REG reads one cell's own fields, computes new scalars in `f64`, and
//! funnels every write through a named setter — never a raw field
//! assignment — so a future edit can't silently widen what REG is allowed
//! to touch.

use crate::lut::PrimingLut;
use crate::state::{Cell, WARN_CLAMP_K, WARN_CLAMP_POROSITY};

/// Calibration constants for one soil/vegetation regime (the "Loess"
/// parameter set below is one instance of this).
#[derive(Debug, Clone, Copy)]
pub struct RegParams {
    pub r_v: f64,
    pub k_v: f64,
    pub lambda1: f64,
    pub lambda2: f64,
    pub theta_star: f64,
    pub som_star: f64,
    pub a1: f64,
    pub a2: f64,
    pub eta1: f64,
    pub k_vertical_multiplier: f64,
    pub enable_regv2: bool,
    /// Explicit calibration constant for REGv2's unit conversion
    /// ("1% SOM ≈ 100 g C m⁻²" at the default `365.25/100`). This is a
    /// calibration choice, not a physical identity, so it is exposed here
    /// rather than hardcoded.
    pub som_carbon_calibration: f64,
    pub p_max: f64,
    pub k_c: f64,
    pub k_theta: f64,
    pub alpha_t: f64,
    pub t0: f64,
    pub beta_n: f64,
    pub beta_phi: f64,
    pub r_base: f64,
    pub q10: f64,
    pub k_theta_r: f64,
}

impl RegParams {
    /// A Loess-soil reference parameter set, REGv1 fields filled in; REGv2
    /// fields at reasonable defaults for when `enable_regv2` is toggled on
    /// by the caller.
    pub fn loess() -> Self {
        RegParams {
            r_v: 0.12,
            k_v: 0.70,
            lambda1: 0.50,
            lambda2: 0.08,
            theta_star: 0.17,
            som_star: 1.2,
            a1: 0.18,
            a2: 0.035,
            eta1: 5.0,
            k_vertical_multiplier: 1.15,
            enable_regv2: false,
            som_carbon_calibration: 365.25 / 100.0,
            p_max: 1.0,
            k_c: 1.0,
            k_theta: 0.15,
            alpha_t: 0.05,
            t0: 293.15,
            beta_n: 0.1,
            beta_phi: 0.1,
            r_base: 0.5,
            q10: 2.0,
            k_theta_r: 0.15,
        }
    }
}

/// Extra per-cell inputs REG needs beyond what is stored directly on
/// `Cell`: the averaged water content driving the ODE and, for REGv2, the
/// microbial/aggregate forcing terms.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegInputs {
    pub theta_avg: f64,
    pub temperature_k: f64,
    pub c_labile: f64,
    pub fb_ratio: f64,
    pub n_fix: f64,
    pub phi_agg: f64,
    pub o2: f64,
}

/// Bitmask returned by [`threshold_flags`]: pure query, never used to
/// branch the ODE itself.
pub const THRESHOLD_THETA: u8 = 1 << 0;
pub const THRESHOLD_SOM: u8 = 1 << 1;
pub const THRESHOLD_VEGETATION: u8 = 1 << 2;

/// Pure diagnostic bitmask over the cell's current state. Never read by
/// [`step`].
pub fn threshold_flags(cell: &Cell, params: &RegParams, theta_avg: f64) -> u8 {
    let mut flags = 0u8;
    if theta_avg > params.theta_star {
        flags |= THRESHOLD_THETA;
    }
    if cell.som_percent() > params.som_star {
        flags |= THRESHOLD_SOM;
    }
    if cell.vegetation_cover() > 0.5 * params.k_v {
        flags |= THRESHOLD_VEGETATION;
    }
    flags
}

fn p_micro(inputs: &RegInputs, params: &RegParams, priming_lut: &PrimingLut) -> f64 {
    let fb = priming_lut.lookup(inputs.fb_ratio);
    let carbon_limitation = inputs.c_labile / (params.k_c + inputs.c_labile).max(1e-300);
    let water_limitation = inputs.theta_avg / (params.k_theta + inputs.theta_avg).max(1e-300);
    let temp_response = (params.alpha_t * (inputs.temperature_k - params.t0)).exp();
    params.p_max
        * fb
        * carbon_limitation
        * water_limitation
        * temp_response
        * (1.0 + params.beta_n * inputs.n_fix)
        * (1.0 + params.beta_phi * inputs.phi_agg)
}

fn d_resp(inputs: &RegInputs, params: &RegParams) -> f64 {
    let water_limitation = inputs.theta_avg / (params.k_theta_r + inputs.theta_avg).max(1e-300);
    params.r_base
        * params
            .q10
            .powf((inputs.temperature_k - params.t0) / 10.0)
        * water_limitation
        * inputs.o2
}

/// Advance one cell's (V, SOM) pair by one REG call of length `dt_years`,
/// apply the hydrological write-back, and commit the Q16.16 authoritative
/// values. Returns the OR-foldable warning bits raised by clamp events.
pub fn step(
    cell: &mut Cell,
    inputs: &RegInputs,
    params: &RegParams,
    priming_lut: &PrimingLut,
    dt_years: f64,
) -> u32 {
    let v_old = cell.vegetation_cover();
    let som_old = cell.som_percent();

    let dv_dt = params.r_v * v_old * (1.0 - v_old / params.k_v)
        + params.lambda1 * (inputs.theta_avg - params.theta_star).max(0.0)
        + params.lambda2 * (som_old - params.som_star).max(0.0);

    let dsom_dt = if params.enable_regv2 {
        let p = p_micro(inputs, params, priming_lut);
        let d = d_resp(inputs, params);
        (p - d) * params.som_carbon_calibration
    } else {
        params.a1 * v_old - params.a2 * som_old
    };

    let v_new = (v_old + dv_dt * dt_years).clamp(0.0, 1.0);
    let som_new = (som_old + dsom_dt * dt_years).clamp(0.01, 10.0);
    let d_som = som_new - som_old;

    let mut warnings = 0u32;
    let porosity_clamped =
        cell.write_back_porosity_eff(cell.porosity_eff() + (params.eta1 / 1000.0) * d_som);
    if porosity_clamped {
        warnings |= WARN_CLAMP_POROSITY;
    }
    let k_clamped =
        cell.write_back_k_vertical(cell.k_vertical() * params.k_vertical_multiplier.powf(d_som));
    if k_clamped {
        warnings |= WARN_CLAMP_K;
    }

    cell.commit_vegetation_cover(v_new);
    cell.commit_som_percent(som_new);

    warnings
}
