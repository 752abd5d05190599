//! Hydrology solver (HYD): depression storage and connectivity, the
//! vertical implicit Richards solve, horizontal explicit surface diffusion
//! with CFL substepping, evaporation, and runoff classification.
//!
//! The horizontal pass recomputes a stability factor from the freshly
//! assembled fluxes every substep and shrinks the working `dt` rather than
//! aborting the step outright.

use crate::state::{Cell, SimulationState, WARN_CLAMP_THETA, WARN_PICARD};
use crate::thomas::{solve_column_picard, ColumnInputs};

/// Depression-storage / fill-and-spill and vertical/horizontal solver
/// tuning. Everything here is a per-simulation constant, never mutated
/// mid-step.
#[derive(Debug, Clone, Copy)]
pub struct HydParams {
    pub picard_tol: f64,
    pub picard_max_iter: u32,
    pub cfl: f64,
    pub use_free_drainage: bool,
    pub e_bare_ref: f64,
    pub connectivity_gate: f64,
}

impl Default for HydParams {
    fn default() -> Self {
        HydParams {
            picard_tol: 1e-6,
            picard_max_iter: 20,
            cfl: 0.5,
            use_free_drainage: false,
            e_bare_ref: 0.0,
            connectivity_gate: 0.1,
        }
    }
}

/// Diagnostic-only runoff classification: never an input to control flow
/// inside the solver, exactly like REG's `threshold_flags` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunoffClass {
    Ambiguous = 0,
    Hortonian = 1,
    Dunne = 2,
}

/// Logistic connectivity gate, clamped-exponent to `[-20, 20]` so a cell
/// far from its depression-storage capacity never produces an `exp`
/// overflow.
pub fn connectivity(zeta: f64, zeta_c: f64, a_c: f64) -> f64 {
    let exponent = (a_c * (zeta - zeta_c)).clamp(-20.0, 20.0);
    1.0 / (1.0 + (-exponent).exp())
}

/// Pure diagnostic: classifies a surface cell's runoff mechanism without
/// ever feeding back into the solver's own control flow.
pub fn classify_runoff(cell: &Cell, rainfall_flux: f64, k_lookup: f64) -> RunoffClass {
    if cell.h_surface <= 1e-6 {
        return RunoffClass::Ambiguous;
    }
    if cell.theta >= 0.99 * cell.theta_s {
        RunoffClass::Dunne
    } else if rainfall_flux > k_lookup * cell.m_k_zz {
        RunoffClass::Hortonian
    } else {
        RunoffClass::Ambiguous
    }
}

fn update_connectivity(cell: &mut Cell) -> f64 {
    cell.zeta = cell.h_surface.min(cell.zeta_c + cell.delta_zeta).max(0.0);
    connectivity(cell.zeta, cell.zeta_c, cell.a_c)
}

/// Run one HYD step of length `dt_seconds` over the whole grid: depression
/// storage/connectivity, vertical implicit columns, horizontal explicit
/// diffusion with CFL substepping, and evaporation. Returns `true` if a
/// fatal NaN/Inf fault was detected (in which case `state.fatal` is already
/// set and the caller must stop scheduling further steps).
pub fn step(state: &mut SimulationState, rainfall_flux: f64, dt_seconds: f64, params: &HydParams) -> bool {
    let (w, h) = (state.dims.width as usize, state.dims.height as usize);

    let mut connectivity_field = vec![0.0_f64; w * h];
    for y in 0..h {
        for x in 0..w {
            let idx = state.index(x as u32, y as u32, 0);
            connectivity_field[y * w + x] = update_connectivity(&mut state.cells[idx]);
        }
    }

    vertical_pass(state, rainfall_flux, dt_seconds, params);
    if state.fatal {
        return true;
    }

    horizontal_pass(state, dt_seconds, params, &connectivity_field);
    if state.fatal {
        return true;
    }

    evaporation_pass(state, dt_seconds, params);
    state.fatal
}

fn vertical_pass(state: &mut SimulationState, rainfall_flux: f64, dt_seconds: f64, params: &HydParams) {
    let (w, h, d) = (
        state.dims.width as usize,
        state.dims.height as usize,
        state.dims.depth as usize,
    );

    let mut theta_prev = vec![0.0; d];
    let mut theta_r = vec![0.0; d];
    let mut porosity_eff = vec![0.0; d];
    let mut dz = vec![0.0; d];
    let mut k_vertical = vec![0.0; d];
    let mut m_k_zz = vec![0.0; d];

    for y in 0..h {
        for x in 0..w {
            for z in 0..d {
                let cell = state.cell(x as u32, y as u32, z as u32);
                theta_prev[z] = cell.theta;
                theta_r[z] = cell.theta_r;
                porosity_eff[z] = cell.porosity_eff();
                dz[z] = cell.dz;
                k_vertical[z] = cell.k_vertical();
                m_k_zz[z] = cell.m_k_zz;
            }

            let soil_lut = &state.soil_lut;
            // Each layer keeps its own REG-writable K_vertical/M_K_zz, so a
            // heterogeneous column (and REG's write-back over time) actually
            // changes the conductivity profile the Picard solve linearizes
            // around, instead of collapsing to one column-wide scalar.
            let k_eff_of = |z: usize, theta: f64| -> f64 {
                k_vertical[z] * m_k_zz[z] * soil_lut.kr_of_theta(theta)
            };

            let inputs = ColumnInputs {
                theta_prev: &theta_prev,
                theta_r: &theta_r,
                porosity_eff: &porosity_eff,
                dz: &dz,
                dt: dt_seconds,
                rainfall_flux,
                use_free_drainage: params.use_free_drainage,
                picard_tol: params.picard_tol,
                picard_max_iter: params.picard_max_iter,
            };

            let result = solve_column_picard(
                &inputs,
                k_eff_of,
                &mut state.scratch.lower[..d],
                &mut state.scratch.diag[..d],
                &mut state.scratch.upper[..d],
                &mut state.scratch.rhs[..d],
            );

            if !result.converged {
                state.error_flags |= WARN_PICARD;
            }

            for z in 0..d {
                let mut theta_new = result.theta[z];
                if !theta_new.is_finite() {
                    state.fatal = true;
                    return;
                }
                if theta_new < theta_r[z] {
                    theta_new = theta_r[z];
                    state.error_flags |= WARN_CLAMP_THETA;
                }
                let clamped = theta_new.clamp(theta_r[z], porosity_eff[z]);
                let cell = state.cell_mut(x as u32, y as u32, z as u32);
                cell.theta = clamped;
            }
        }
    }
}

fn horizontal_pass(
    state: &mut SimulationState,
    dt_seconds: f64,
    params: &HydParams,
    connectivity_field: &[f64],
) {
    let (w, h) = (state.dims.width as usize, state.dims.height as usize);
    if w == 0 || h == 0 {
        return;
    }

    let mut max_k_r = 1e-300_f64;
    let mut min_dx = f64::MAX;
    for y in 0..h {
        for x in 0..w {
            if connectivity_field[y * w + x] < params.connectivity_gate {
                continue;
            }
            let cell = state.cell(x as u32, y as u32, 0);
            let k_r = state.soil_lut.kr_of_theta(cell.theta) * cell.k_s * cell.m_k_xx;
            max_k_r = max_k_r.max(k_r.max(1e-300));
            min_dx = min_dx.min(cell.dx.max(1e-9));
        }
    }
    if min_dx == f64::MAX {
        // No connected cells this step; nothing to diffuse.
        return;
    }

    let n_sub = ((dt_seconds / (params.cfl * min_dx * min_dx / (2.0 * max_k_r))).ceil() as u32).max(1);
    let dt_sub = dt_seconds / n_sub as f64;

    for _ in 0..n_sub {
        let h_surface_snapshot: Vec<f64> = (0..w * h)
            .map(|i| {
                let x = (i % w) as u32;
                let y = (i / w) as u32;
                state.cell(x, y, 0).h_surface
            })
            .collect();
        state.scratch.h_next[..w * h].copy_from_slice(&h_surface_snapshot);

        for y in 0..h {
            for x in 0..w {
                if connectivity_field[y * w + x] < params.connectivity_gate {
                    continue;
                }
                let cell = state.cell(x as u32, y as u32, 0);
                let k_r = state.soil_lut.kr_of_theta(cell.theta) * cell.k_s * cell.m_k_xx;
                let c = connectivity_field[y * w + x];
                let dx = cell.dx.max(1e-9);
                let center = cell.h_surface + cell.z;

                let mut sum_neighbors = 0.0;
                let mut n_neighbors = 0;
                for (nx, ny) in neighbors(x, y, w, h) {
                    let neighbor = state.cell(nx as u32, ny as u32, 0);
                    sum_neighbors += neighbor.h_surface + neighbor.z;
                    n_neighbors += 1;
                }
                // Dirichlet: absent neighbours copy the centre head, so
                // they contribute exactly `center` and cancel in the
                // Laplacian — equivalent to just using however many real
                // neighbours exist.
                let laplacian = if n_neighbors > 0 {
                    (sum_neighbors - n_neighbors as f64 * center) / (dx * dx)
                } else {
                    0.0
                };

                let h_new = cell.h_surface + dt_sub * k_r * c * laplacian;
                state.scratch.h_next[y * w + x] = h_new.max(0.0);
            }
        }

        for y in 0..h {
            for x in 0..w {
                let value = state.scratch.h_next[y * w + x];
                if !value.is_finite() {
                    state.fatal = true;
                    return;
                }
                state.cell_mut(x as u32, y as u32, 0).h_surface = value;
            }
        }
    }
}

fn neighbors(x: usize, y: usize, w: usize, h: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::with_capacity(4);
    if x > 0 {
        out.push((x - 1, y));
    }
    if x + 1 < w {
        out.push((x + 1, y));
    }
    if y > 0 {
        out.push((x, y - 1));
    }
    if y + 1 < h {
        out.push((x, y + 1));
    }
    out
}

fn evaporation_pass(state: &mut SimulationState, dt_seconds: f64, params: &HydParams) {
    let (w, h) = (state.dims.width as usize, state.dims.height as usize);
    for y in 0..h {
        for x in 0..w {
            let cell = state.cell_mut(x as u32, y as u32, 0);
            let loss = cell.kappa_evap * params.e_bare_ref * dt_seconds / cell.dz.max(1e-9);
            cell.theta = (cell.theta - loss).max(cell.theta_r);
        }
    }
}
