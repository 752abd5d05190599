//! Multi-rate step loop binding HYD and REG together. Single-threaded
//! cooperative — `step` takes `&mut self` and runs to completion, so the
//! borrow checker is the entire concurrency contract: no async, no
//! internal yielding.

use crate::error::Status;
use crate::hyd::{self, HydParams};
use crate::reg::{self, RegInputs, RegParams};
use crate::state::SimulationState;

/// Everything a `step` call needs beyond the grid itself: forcing inputs
/// and the cadence configuration.
#[derive(Debug, Clone, Copy)]
pub struct StepForcing {
    pub rainfall_flux: f64,
    pub reg_inputs: RegInputs,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerParams {
    pub hyd: HydParams,
    pub reg: RegParams,
    pub reg_call_frequency: u32,
    /// Years of REG-timescale advance represented by one full
    /// `reg_call_frequency`-tick cadence.
    pub reg_dt_years: f64,
}

/// Advance the scheduler by one tick of `dt_seconds`. Returns the status
/// code the public boundary will see; `state.fatal` is authoritative for
/// whether further steps are refused.
pub fn step(
    state: &mut SimulationState,
    dt_seconds: f64,
    forcing: &StepForcing,
    params: &SchedulerParams,
) -> Status {
    if dt_seconds <= 0.0 {
        return Status::InvalidConfig;
    }
    if state.fatal {
        return Status::NotInitialized;
    }

    let hyd_fatal = hyd::step(state, forcing.rainfall_flux, dt_seconds, &params.hyd);
    if hyd_fatal {
        state.fatal = true;
        return Status::NumericalFault;
    }

    state.hyd_step_counter += 1;
    if state.hyd_step_counter >= params.reg_call_frequency {
        state.hyd_step_counter = 0;
        let priming_lut = state.priming_lut;
        let mut reg_warnings = 0u32;
        for cell in state.cells.iter_mut() {
            reg_warnings |= reg::step(
                cell,
                &forcing.reg_inputs,
                &params.reg,
                &priming_lut,
                params.reg_dt_years,
            );
        }
        state.error_flags |= reg_warnings;
    }

    state.tick_micros = state
        .tick_micros
        .saturating_add((dt_seconds * 1_000_000.0) as u64);

    Status::Ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lut::{AtmosphereLut, PrimingLut, SoilLut};
    use crate::rng::Xorshift64Star;
    use crate::state::{Cell, GridDims, Scratch};

    fn small_state() -> SimulationState {
        let dims = GridDims {
            width: 2,
            height: 2,
            depth: 2,
        };
        SimulationState {
            dims,
            cells: vec![Cell::new_default(); dims.cell_count()],
            tick_micros: 0,
            rng: Xorshift64Star::default(),
            soil_lut: SoilLut::build(Default::default()),
            atmosphere_lut: AtmosphereLut::build(),
            priming_lut: PrimingLut,
            error_flags: 0,
            fatal: false,
            hyd_step_counter: 0,
            scratch: Scratch::new(2, 4),
        }
    }

    #[test]
    fn non_positive_dt_is_rejected_as_noop() {
        let mut state = small_state();
        let forcing = StepForcing {
            rainfall_flux: 0.0,
            reg_inputs: RegInputs::default(),
        };
        let params = SchedulerParams {
            hyd: HydParams::default(),
            reg: RegParams::loess(),
            reg_call_frequency: 128,
            reg_dt_years: 1.0,
        };
        assert_eq!(step(&mut state, 0.0, &forcing, &params), Status::InvalidConfig);
        assert_eq!(state.tick_micros, 0);
    }

    #[test]
    fn fatal_state_refuses_further_steps() {
        let mut state = small_state();
        state.fatal = true;
        let forcing = StepForcing {
            rainfall_flux: 0.0,
            reg_inputs: RegInputs::default(),
        };
        let params = SchedulerParams {
            hyd: HydParams::default(),
            reg: RegParams::loess(),
            reg_call_frequency: 128,
            reg_dt_years: 1.0,
        };
        assert_eq!(
            step(&mut state, 60.0, &forcing, &params),
            Status::NotInitialized
        );
    }

    #[test]
    fn reg_runs_once_per_cadence() {
        let mut state = small_state();
        let forcing = StepForcing {
            rainfall_flux: 2.78e-6,
            reg_inputs: RegInputs {
                theta_avg: 0.25,
                ..Default::default()
            },
        };
        let params = SchedulerParams {
            hyd: HydParams::default(),
            reg: RegParams::loess(),
            reg_call_frequency: 2,
            reg_dt_years: 1.0,
        };
        let v0 = state.cells[0].vegetation_cover();
        step(&mut state, 60.0, &forcing, &params);
        assert_eq!(state.cells[0].vegetation_cover(), v0, "REG should not fire yet");
        step(&mut state, 60.0, &forcing, &params);
        assert!(state.cells[0].vegetation_cover() > v0, "REG should have fired");
    }
}
