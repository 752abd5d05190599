//! Tridiagonal (Thomas) direct solver and the Picard driver that
//! linearizes the per-column Richards equation around it.
//!
//! A direct banded solve over one column at a time, rather than an
//! iterative sparse solve over the whole grid, since the vertical update
//! is split column-by-column instead of being assembled as one global
//! sparse system.

/// Outcome of a per-column Picard iteration: the converged (or
/// best-effort) `theta` profile, whether it actually converged, and how
/// many iterations it took.
#[derive(Debug, Clone)]
pub struct PicardResult {
    pub theta: Vec<f64>,
    pub converged: bool,
    pub iterations: u32,
}

/// Solve `A x = rhs` for a tridiagonal `A` given as three diagonals, in
/// place into `out`. `lower[0]` and `upper[n-1]` are ignored (there is no
/// sub-diagonal entry above the first row or super-diagonal entry below the
/// last). Destroys `diag`/`rhs` as scratch, exactly like a textbook Thomas
/// sweep — callers pass in owned scratch buffers so no allocation happens
/// on the hot path.
pub fn solve_tridiagonal(
    lower: &[f64],
    diag: &mut [f64],
    upper: &[f64],
    rhs: &mut [f64],
    out: &mut [f64],
) {
    let n = diag.len();
    debug_assert_eq!(lower.len(), n);
    debug_assert_eq!(upper.len(), n);
    debug_assert_eq!(rhs.len(), n);
    debug_assert_eq!(out.len(), n);
    if n == 0 {
        return;
    }

    for i in 1..n {
        let denom = diag[i - 1];
        let w = if denom.abs() < 1e-300 {
            0.0
        } else {
            lower[i] / denom
        };
        diag[i] -= w * upper[i - 1];
        rhs[i] -= w * rhs[i - 1];
    }

    out[n - 1] = if diag[n - 1].abs() < 1e-300 {
        0.0
    } else {
        rhs[n - 1] / diag[n - 1]
    };
    for i in (0..n - 1).rev() {
        out[i] = if diag[i].abs() < 1e-300 {
            0.0
        } else {
            (rhs[i] - upper[i] * out[i + 1]) / diag[i]
        };
    }
}

/// One column's worth of static inputs to the Picard/Thomas vertical
/// solve.
pub struct ColumnInputs<'a> {
    pub theta_prev: &'a [f64],
    pub theta_r: &'a [f64],
    pub porosity_eff: &'a [f64],
    pub dz: &'a [f64],
    pub dt: f64,
    pub rainfall_flux: f64,
    pub use_free_drainage: bool,
    pub picard_tol: f64,
    pub picard_max_iter: u32,
}

/// Re-linearize `K_eff(z, theta)` each Picard iteration and solve the
/// resulting tridiagonal system with [`solve_tridiagonal`]. `k_eff_of`
/// closes over the soil LUT and each layer's own `K_vertical`/`M_K_zz` (by
/// depth index `z`) so this module stays free of any LUT dependency of its
/// own while still letting a heterogeneous column carry a distinct
/// conductivity per layer.
pub fn solve_column_picard(
    inputs: &ColumnInputs,
    k_eff_of: impl Fn(usize, f64) -> f64,
    lower: &mut [f64],
    diag: &mut [f64],
    upper: &mut [f64],
    rhs: &mut [f64],
) -> PicardResult {
    let n = inputs.theta_prev.len();
    let mut theta = inputs.theta_prev.to_vec();
    let mut converged = false;
    let mut iterations = 0;

    for iter in 0..inputs.picard_max_iter {
        iterations = iter + 1;
        let k: Vec<f64> = theta.iter().enumerate().map(|(i, &t)| k_eff_of(i, t)).collect();

        for i in 0..n {
            let dz_i = inputs.dz[i].max(1e-9);
            let k_up = if i > 0 {
                2.0 * k[i] * k[i - 1] / (k[i] + k[i - 1]).max(1e-300)
            } else {
                0.0
            };
            let k_down = if i + 1 < n {
                2.0 * k[i] * k[i + 1] / (k[i] + k[i + 1]).max(1e-300)
            } else {
                0.0
            };

            let mut a_lower = 0.0;
            let mut a_upper = 0.0;
            let mut a_diag = dz_i / inputs.dt;
            let mut b_rhs = inputs.theta_prev[i] * dz_i / inputs.dt;

            if i > 0 {
                let coeff = k_up / dz_i;
                a_lower -= coeff;
                a_diag += coeff;
            } else {
                // Top Neumann flux: rainfall enters as a source term.
                b_rhs += inputs.rainfall_flux;
            }

            if i + 1 < n {
                let coeff = k_down / dz_i;
                a_upper -= coeff;
                a_diag += coeff;
            } else if inputs.use_free_drainage {
                // dpsi/dz = -1 free-drainage: gravity-only outflow folded
                // into the RHS as an extra sink at the bottom cell.
                b_rhs -= k[i];
            }

            lower[i] = a_lower;
            diag[i] = a_diag;
            upper[i] = a_upper;
            rhs[i] = b_rhs;
        }

        let mut next_theta = vec![0.0; n];
        solve_tridiagonal(lower, diag, upper, rhs, &mut next_theta);

        let mut max_delta: f64 = 0.0;
        for i in 0..n {
            let clamped = next_theta[i].clamp(inputs.theta_r[i], inputs.porosity_eff[i]);
            max_delta = max_delta.max((clamped - theta[i]).abs());
            theta[i] = clamped;
        }

        if max_delta < inputs.picard_tol {
            converged = true;
            break;
        }
    }

    PicardResult {
        theta,
        converged,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_identity_system() {
        let lower = [0.0, 0.0, 0.0];
        let mut diag = [1.0, 1.0, 1.0];
        let upper = [0.0, 0.0, 0.0];
        let mut rhs = [2.0, 3.0, 4.0];
        let mut out = [0.0; 3];
        solve_tridiagonal(&lower, &mut diag, &upper, &mut rhs, &mut out);
        assert_eq!(out, [2.0, 3.0, 4.0]);
    }

    #[test]
    fn solves_known_tridiagonal_system() {
        // [2 -1  0] [x0]   [1]
        // [-1 2 -1] [x1] = [0]
        // [0 -1  2] [x2]   [1]
        let lower = [0.0, -1.0, -1.0];
        let mut diag = [2.0, 2.0, 2.0];
        let upper = [-1.0, -1.0, 0.0];
        let mut rhs = [1.0, 0.0, 1.0];
        let mut out = [0.0; 3];
        solve_tridiagonal(&lower, &mut diag, &upper, &mut rhs, &mut out);
        for (got, want) in out.iter().zip([1.0, 1.0, 1.0]) {
            assert!((got - want).abs() < 1e-9);
        }
    }

    #[test]
    fn picard_converges_for_static_column() {
        let theta_prev = vec![0.20, 0.20, 0.20, 0.20];
        let theta_r = vec![0.05; 4];
        let porosity_eff = vec![0.45; 4];
        let dz = vec![0.10; 4];
        let inputs = ColumnInputs {
            theta_prev: &theta_prev,
            theta_r: &theta_r,
            porosity_eff: &porosity_eff,
            dz: &dz,
            dt: 60.0,
            rainfall_flux: 2.78e-6,
            use_free_drainage: false,
            picard_tol: 1e-9,
            picard_max_iter: 50,
        };
        let mut lower = vec![0.0; 4];
        let mut diag = vec![0.0; 4];
        let mut upper = vec![0.0; 4];
        let mut rhs = vec![0.0; 4];
        let result = solve_column_picard(
            &inputs,
            |_z, theta| 5e-6 * (theta / 0.45).powf(4.0),
            &mut lower,
            &mut diag,
            &mut upper,
            &mut rhs,
        );
        assert!(result.converged);
        for t in &result.theta {
            assert!(*t >= 0.05 && *t <= 0.45);
        }
    }
}
