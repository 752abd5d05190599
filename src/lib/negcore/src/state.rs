//! Grid cell record and the single owning allocation.
//!
//! `SimulationState` is the "single contiguous allocation, pointer-stable"
//! piece of the design: one `Vec<Cell>` sized once at
//! [`create`](crate::Simulation::create) and never resized afterward, plus
//! the scheduler-owned scalars (tick, RNG, LUTs, error flags) that ride
//! alongside it.

use crate::lut::{AtmosphereLut, PrimingLut, SoilLut};
use crate::rng::Xorshift64Star;

/// Warning bit OR-folded into `error_flags` when a vertical Picard solve
/// fails to converge within `picard_max_iter`.
pub const WARN_PICARD: u32 = 1 << 0;
/// Warning bit for a clamp of `theta` back up to `theta_r`.
pub const WARN_CLAMP_THETA: u32 = 1 << 1;
/// Warning bit for a clamp of `porosity_eff` to `[0.3, 0.7]`.
pub const WARN_CLAMP_POROSITY: u32 = 1 << 2;
/// Warning bit for a clamp of `K_tensor[8]` to `[1e-8, 1e-3]`.
pub const WARN_CLAMP_K: u32 = 1 << 3;

/// One grid cell, grouped into fast hydrological state, static
/// soil/geometry, intervention multipliers, slow regeneration state with
/// dual fxp/float representation, and REG→HYD bonus slots. Plain old data,
/// `repr(C)` so the snapshot's byte layout is predictable and the FFI
/// boundary can describe it without surprises.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    // --- fast hydrological state ---
    pub theta: f64,
    pub psi: f64,
    pub h_surface: f64,
    pub zeta: f64,

    // --- static soil + geometry ---
    pub k_s: f64,
    pub alpha_vg: f64,
    pub n_vg: f64,
    pub theta_s: f64,
    pub theta_r: f64,
    pub z: f64,
    pub dz: f64,
    pub dx: f64,
    pub zeta_c: f64,
    pub a_c: f64,

    // --- intervention multipliers ---
    pub m_k_zz: f64,
    pub m_k_xx: f64,
    pub kappa_evap: f64,
    pub delta_zeta: f64,

    // --- slow regeneration state (dual representation) ---
    vegetation_cover_fxp: crate::fixed::Fxp,
    vegetation_cover_f64: f64,
    som_percent_fxp: crate::fixed::Fxp,
    som_percent_f64: f64,

    // --- REG -> HYD bonus slots, written only by reg::step ---
    porosity_eff: f64,
    k_tensor: [f64; 9],
}

impl Cell {
    /// A cell with sane defaults: dry-ish loam, flat terrain, no
    /// vegetation/SOM, REG→HYD slots at their mid-range defaults. Callers
    /// overwrite the fields relevant to their scenario after construction.
    pub fn new_default() -> Self {
        Cell {
            theta: 0.20,
            psi: -1.0,
            h_surface: 0.0,
            zeta: 0.0,
            k_s: 5e-6,
            alpha_vg: 1.5,
            n_vg: 1.8,
            theta_s: 0.45,
            theta_r: 0.05,
            z: 0.0,
            dz: 0.10,
            dx: 1.0,
            zeta_c: 0.010,
            a_c: 1000.0,
            m_k_zz: 1.0,
            m_k_xx: 1.0,
            kappa_evap: 1.0,
            delta_zeta: 0.0,
            vegetation_cover_fxp: crate::fixed::Fxp::ZERO,
            vegetation_cover_f64: 0.0,
            som_percent_fxp: crate::fixed::Fxp::from_f64(1.0),
            som_percent_f64: 1.0,
            porosity_eff: 0.40,
            k_tensor: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 5e-6],
        }
    }

    pub fn vegetation_cover(&self) -> f64 {
        self.vegetation_cover_f64
    }

    pub fn som_percent(&self) -> f64 {
        self.som_percent_f64
    }

    pub fn vegetation_cover_fxp(&self) -> crate::fixed::Fxp {
        self.vegetation_cover_fxp
    }

    pub fn som_percent_fxp(&self) -> crate::fixed::Fxp {
        self.som_percent_fxp
    }

    pub fn porosity_eff(&self) -> f64 {
        self.porosity_eff
    }

    pub fn k_tensor(&self) -> &[f64; 9] {
        &self.k_tensor
    }

    pub fn k_vertical(&self) -> f64 {
        self.k_tensor[8]
    }

    /// Commit a new vegetation cover value: quantize to Q16.16, then
    /// re-derive the float mirror *from that quantized value* so the two
    /// representations can never drift apart.
    pub fn commit_vegetation_cover(&mut self, value: f64) {
        let fxp = crate::fixed::Fxp::from_f64(value.clamp(0.0, 1.0));
        self.vegetation_cover_fxp = fxp;
        self.vegetation_cover_f64 = fxp.to_f64();
    }

    /// Commit a new SOM percent value, same fxp-is-truth discipline as
    /// [`Cell::commit_vegetation_cover`].
    pub fn commit_som_percent(&mut self, value: f64) {
        let fxp = crate::fixed::Fxp::from_f64(value.clamp(0.01, 10.0));
        self.som_percent_fxp = fxp;
        self.som_percent_f64 = fxp.to_f64();
    }

    /// The only way `reg::step` is permitted to touch `porosity_eff` —
    /// REG must never touch any other field of the cell, enforced here
    /// structurally rather than by convention.
    pub fn write_back_porosity_eff(&mut self, value: f64) -> bool {
        let clamped = value.clamp(0.3, 0.7);
        let clamped_flag = (clamped - value).abs() > f64::EPSILON;
        self.porosity_eff = clamped;
        clamped_flag
    }

    /// The only way `reg::step` is permitted to touch `K_tensor[8]`.
    pub fn write_back_k_vertical(&mut self, value: f64) -> bool {
        let clamped = value.clamp(1e-8, 1e-3);
        let clamped_flag = (clamped - value).abs() > f64::EPSILON;
        self.k_tensor[8] = clamped;
        clamped_flag
    }
}

/// Grid dimensions, validated once at `create` time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDims {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl GridDims {
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize
    }
}

/// Scratch buffers reused across every HYD step so no allocation happens
/// after `create`. Sized to the tallest column (`depth`) and the largest
/// horizontal slice (`width * height`) respectively.
#[derive(Debug, Clone)]
pub struct Scratch {
    pub lower: Vec<f64>,
    pub diag: Vec<f64>,
    pub upper: Vec<f64>,
    pub rhs: Vec<f64>,
    pub theta_prev_iter: Vec<f64>,
    pub h_next: Vec<f64>,
}

impl Scratch {
    pub fn new(depth: usize, slice_len: usize) -> Self {
        Scratch {
            lower: vec![0.0; depth],
            diag: vec![0.0; depth],
            upper: vec![0.0; depth],
            rhs: vec![0.0; depth],
            theta_prev_iter: vec![0.0; depth],
            h_next: vec![0.0; slice_len],
        }
    }
}

/// Owns the single contiguous cell allocation plus every piece of state the
/// scheduler needs between steps: the tick counter, RNG, LUTs, accumulated
/// error flags, fatal latch, HYD/REG cadence counter, and reusable scratch
/// buffers.
#[derive(Debug)]
pub struct SimulationState {
    pub dims: GridDims,
    pub cells: Vec<Cell>,
    pub tick_micros: u64,
    pub rng: Xorshift64Star,
    pub soil_lut: SoilLut,
    pub atmosphere_lut: AtmosphereLut,
    pub priming_lut: PrimingLut,
    pub error_flags: u32,
    pub fatal: bool,
    pub hyd_step_counter: u32,
    pub scratch: Scratch,
}

impl SimulationState {
    pub fn index(&self, x: u32, y: u32, z: u32) -> usize {
        let (w, h) = (self.dims.width as usize, self.dims.height as usize);
        z as usize * w * h + y as usize * w + x as usize
    }

    pub fn cell(&self, x: u32, y: u32, z: u32) -> &Cell {
        &self.cells[self.index(x, y, z)]
    }

    pub fn cell_mut(&mut self, x: u32, y: u32, z: u32) -> &mut Cell {
        let idx = self.index(x, y, z);
        &mut self.cells[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_discipline_keeps_mirrors_in_sync() {
        let mut cell = Cell::new_default();
        cell.commit_vegetation_cover(0.42);
        assert_eq!(cell.vegetation_cover(), cell.vegetation_cover_fxp.to_f64());
        cell.commit_som_percent(2.5);
        assert_eq!(cell.som_percent(), cell.som_percent_fxp.to_f64());
    }

    #[test]
    fn write_back_slots_clamp_and_report() {
        let mut cell = Cell::new_default();
        assert!(!cell.write_back_porosity_eff(0.5));
        assert_eq!(cell.porosity_eff(), 0.5);
        assert!(cell.write_back_porosity_eff(0.9));
        assert_eq!(cell.porosity_eff(), 0.7);

        assert!(!cell.write_back_k_vertical(1e-5));
        assert_eq!(cell.k_vertical(), 1e-5);
        assert!(cell.write_back_k_vertical(1.0));
        assert_eq!(cell.k_vertical(), 1e-3);
    }

    #[test]
    fn grid_indexing_is_row_major() {
        let dims = GridDims {
            width: 4,
            height: 3,
            depth: 2,
        };
        let state = SimulationState {
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
            scratch: Scratch::new(2, 12),
        };
        assert_eq!(state.index(0, 0, 0), 0);
        assert_eq!(state.index(1, 0, 0), 1);
        assert_eq!(state.index(0, 1, 0), 4);
        assert_eq!(state.index(0, 0, 1), 12);
    }
}
