//! `negcore`: a deterministic, pointer-stable coupled hydrology/
//! regeneration solver core.
//!
//! Small pure-function modules hold the numerical substrate and solver
//! passes ([`fixed`], [`rng`], [`lut`], [`thomas`], [`hyd`], [`reg`]), a
//! plain-data state module holds the grid and wire formats ([`state`],
//! [`snapshot`]), and a thin [`Simulation`] facade in this file is what the
//! C-ABI ([`ffi`], feature `ffi`) and WASM ([`wasm`], feature `wasm`)
//! boundaries wrap without duplicating any solver logic.

pub mod error;
pub mod fixed;
pub mod hyd;
pub mod lut;
pub mod reg;
pub mod rng;
pub mod scheduler;
pub mod snapshot;
pub mod state;
pub mod thomas;

#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "wasm")]
pub mod wasm;

use error::{ConfigError, Status};
use hyd::HydParams;
use lut::{AtmosphereLut, PrimingLut, SoilLut, VanGenuchthenReference};
use reg::{RegInputs, RegParams};
use rng::Xorshift64Star;
use scheduler::{SchedulerParams, StepForcing};
use state::{Cell, GridDims, Scratch, SimulationState};

/// Configuration accepted by [`Simulation::create`]: grid shape, timestep,
/// seed, feature toggles, and solver cadence, in one flat struct so it can
/// be built from Rust or poked directly from the FFI boundary.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
#[repr(C)]
pub struct SimConfig {
    pub num_scalar_fields: u32,
    pub grid_width: u32,
    pub grid_height: u32,
    pub grid_depth: u32,
    pub dt: f64,
    pub seed: u64,
    pub enable_atmosphere: bool,
    pub enable_hydrology: bool,
    pub enable_soil: bool,
    pub integrator_type: u32,
    pub precision_mode: u32,
    pub use_free_drainage: bool,
    pub reg_call_frequency: u32,
    pub enable_regv2: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            num_scalar_fields: 1,
            grid_width: 1,
            grid_height: 1,
            grid_depth: 1,
            dt: 60.0,
            seed: 0,
            enable_atmosphere: true,
            enable_hydrology: true,
            enable_soil: true,
            integrator_type: 0,
            precision_mode: 0,
            use_free_drainage: false,
            reg_call_frequency: 128,
            enable_regv2: false,
        }
    }
}

/// An opaque, pointer-stable simulation instance. Owns exactly one
/// allocation (`SimulationState::cells`) plus the scheduler/solver
/// parameter bundles derived from the config at `create` time.
#[derive(Debug)]
pub struct Simulation {
    state: SimulationState,
    scheduler_params: SchedulerParams,
    last_error: Option<String>,
}

impl Simulation {
    /// Allocate and initialize a new simulation: validate `config`, build
    /// the LUTs, seed the PRNG, and zero-initialize every cell. No
    /// allocation happens after this call returns.
    pub fn create(config: &SimConfig) -> Result<Simulation, ConfigError> {
        if config.num_scalar_fields == 0 {
            return Err(ConfigError::ZeroGrid(0));
        }
        let product = config.grid_width as u64 * config.grid_height as u64 * config.grid_depth as u64;
        if product != config.num_scalar_fields as u64 {
            return Err(ConfigError::DimensionMismatch {
                product,
                num_scalar_fields: config.num_scalar_fields as u64,
            });
        }
        if config.dt <= 0.0 {
            return Err(ConfigError::InvalidTimestep(config.dt));
        }
        if config.reg_call_frequency == 0 {
            return Err(ConfigError::InvalidRegCadence(0));
        }

        let dims = GridDims {
            width: config.grid_width,
            height: config.grid_height,
            depth: config.grid_depth,
        };
        let cell_count = dims.cell_count();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            width = dims.width,
            height = dims.height,
            depth = dims.depth,
            seed = config.seed,
            regv2 = config.enable_regv2,
            "negcore simulation created"
        );

        let state = SimulationState {
            dims,
            cells: vec![Cell::new_default(); cell_count],
            tick_micros: 0,
            rng: Xorshift64Star::new(config.seed),
            soil_lut: SoilLut::build(VanGenuchthenReference::default()),
            atmosphere_lut: AtmosphereLut::build(),
            priming_lut: PrimingLut,
            error_flags: 0,
            fatal: false,
            hyd_step_counter: 0,
            scratch: Scratch::new(dims.depth as usize, dims.width as usize * dims.height as usize),
        };

        let scheduler_params = SchedulerParams {
            hyd: HydParams {
                use_free_drainage: config.use_free_drainage,
                ..HydParams::default()
            },
            reg: RegParams {
                enable_regv2: config.enable_regv2,
                ..RegParams::loess()
            },
            reg_call_frequency: config.reg_call_frequency,
            reg_dt_years: 1.0,
        };

        Ok(Simulation {
            state,
            scheduler_params,
            last_error: None,
        })
    }

    /// Advance the simulation by `dt_seconds`, applying `rainfall_flux`
    /// uniformly and `reg_inputs` to every cell's REG call (if this tick
    /// triggers one).
    pub fn step(&mut self, dt_seconds: f64, rainfall_flux: f64, reg_inputs: RegInputs) -> Status {
        let forcing = StepForcing {
            rainfall_flux,
            reg_inputs,
        };
        let status = scheduler::step(&mut self.state, dt_seconds, &forcing, &self.scheduler_params);
        #[cfg(feature = "tracing")]
        tracing::trace!(
            tick = self.state.tick_micros,
            hash = snapshot::state_hash(&self.state),
            error_flags = self.state.error_flags,
            "negcore step"
        );
        if status != Status::Ok {
            self.last_error = Some(format!("step failed: {status:?}"));
        }
        status
    }

    /// Overwrite the existing single allocation in place from a binary
    /// snapshot. Never reallocates: a grid-size mismatch against the
    /// current allocation is itself a config-shaped error.
    pub fn reset_from_binary(&mut self, bytes: &[u8]) -> Status {
        match snapshot::parse_binary(bytes) {
            Ok(parsed) => {
                if parsed.dims.cell_count() != self.state.cells.len() {
                    self.last_error = Some(format!(
                        "grid size mismatch: snapshot has {} cells, simulation has {}",
                        parsed.dims.cell_count(),
                        self.state.cells.len()
                    ));
                    return Status::InvalidConfig;
                }
                self.state.dims = parsed.dims;
                self.state.cells = parsed.cells;
                self.state.tick_micros = parsed.tick_micros;
                self.state.error_flags = parsed.error_flags;
                self.state.fatal = false;
                self.state.hyd_step_counter = 0;
                Status::Ok
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                Status::from(&err)
            }
        }
    }

    pub fn state_binary(&self) -> Vec<u8> {
        snapshot::to_binary(&self.state, self.state.tick_micros / 1000)
    }

    pub fn state_binary_size(&self) -> usize {
        snapshot::binary_size(&self.state)
    }

    pub fn state_json(&self) -> String {
        let snap = snapshot::to_json(&self.state, self.state_hash());
        serde_json::to_string(&snap).unwrap_or_default()
    }

    pub fn state_hash(&self) -> u64 {
        snapshot::state_hash(&self.state)
    }

    pub fn error_flags(&self) -> u32 {
        self.state.error_flags
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn tick_millis(&self) -> u64 {
        self.state.tick_micros / 1000
    }

    pub fn is_fatal(&self) -> bool {
        self.state.fatal
    }
}
