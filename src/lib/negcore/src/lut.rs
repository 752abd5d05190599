//! Fixed-size lookup tables for the transcendental/empirical curves used on
//! hot solver paths: saturation vapor pressure, the van Genuchten water
//! retention and Mualem conductivity curves, and the fungal:bacterial
//! priming multiplier.
//!
//! Every table here is built once, deterministically, from closed-form
//! formulas at [`Simulation::create`](crate::Simulation::create) and then
//! owned by that simulation instance — there is no process-wide global
//! table, so two simulations created with different soil catalogs can never
//! observe each other's LUTs.

const ATMOS_ENTRIES: usize = 256;
const ATMOS_T_MIN: f64 = 243.0;
const ATMOS_T_MAX: f64 = 333.0;

const SOIL_ENTRIES: usize = 256;
const PSI_MIN: f64 = -100_000.0;
const PSI_MAX: f64 = 0.0;
const THETA_MIN: f64 = 0.01;
const THETA_MAX: f64 = 0.60;

/// Reference van Genuchten shape parameters used to build the *default*
/// soil LUT. Per-cell `theta_r`/`theta_s` rescale the LUT's normalized
/// effective saturation; per-cell `K_s` rescales the LUT's normalized
/// relative conductivity. `alpha_vG`/`n_vG` are held fixed at this
/// reference shape inside the LUT itself — see DESIGN.md for why the curve
/// shape, rather than every per-cell parameter combination, is what gets
/// tabulated.
#[derive(Debug, Clone, Copy)]
pub struct VanGenuchthenReference {
    pub alpha_vg: f64,
    pub n_vg: f64,
}

impl Default for VanGenuchthenReference {
    fn default() -> Self {
        VanGenuchthenReference {
            alpha_vg: 1.5,
            n_vg: 1.8,
        }
    }
}

fn lerp_table(table: &[f64], lo: f64, hi: f64, x: f64) -> f64 {
    let n = table.len();
    let t = ((x - lo) / (hi - lo)).clamp(0.0, 1.0);
    let pos = t * (n - 1) as f64;
    let i0 = pos.floor() as usize;
    let i1 = (i0 + 1).min(n - 1);
    let frac = pos - i0 as f64;
    table[i0] + (table[i1] - table[i0]) * frac
}

/// Saturation vapor pressure `e_s(T)` LUT, 256 entries over `T ∈ [243, 333]
/// K`, linear interpolation. Formula follows the Tetens approximation.
#[derive(Debug, Clone)]
pub struct AtmosphereLut {
    es: Vec<f64>,
}

impl AtmosphereLut {
    pub fn build() -> Self {
        let mut es = Vec::with_capacity(ATMOS_ENTRIES);
        for i in 0..ATMOS_ENTRIES {
            let t_kelvin =
                ATMOS_T_MIN + (ATMOS_T_MAX - ATMOS_T_MIN) * i as f64 / (ATMOS_ENTRIES - 1) as f64;
            let t_celsius = t_kelvin - 273.15;
            // Tetens: e_s(T) [kPa] = 0.6108 * exp(17.27*T / (T+237.3))
            let value = 0.6108 * (17.27 * t_celsius / (t_celsius + 237.3)).exp();
            es.push(value);
        }
        AtmosphereLut { es }
    }

    pub fn e_s(&self, t_kelvin: f64) -> f64 {
        lerp_table(&self.es, ATMOS_T_MIN, ATMOS_T_MAX, t_kelvin)
    }
}

/// van Genuchten / Mualem soil retention LUTs: normalized effective
/// saturation as a function of matric head, normalized relative hydraulic
/// conductivity as a function of effective saturation, and the retention
/// capacity `d(theta)/d(psi)` used by the Picard linearization.
#[derive(Debug, Clone)]
pub struct SoilLut {
    /// Effective saturation Se(psi), psi in [PSI_MIN, PSI_MAX].
    se_of_psi: Vec<f64>,
    /// Relative conductivity Kr(Se), Se in [0, 1] (indexed like theta grid
    /// for convenience: Kr(theta) over THETA_MIN..THETA_MAX, already folded
    /// through an assumed theta_r/theta_s reference span).
    kr_of_theta: Vec<f64>,
    /// d(Se)/d(psi), same domain as se_of_psi.
    capacity_of_psi: Vec<f64>,
    reference: VanGenuchthenReference,
}

impl SoilLut {
    pub fn build(reference: VanGenuchthenReference) -> Self {
        let alpha = reference.alpha_vg;
        let n = reference.n_vg;
        let m = 1.0 - 1.0 / n;

        let mut se_of_psi = Vec::with_capacity(SOIL_ENTRIES);
        let mut capacity_of_psi = Vec::with_capacity(SOIL_ENTRIES);
        for i in 0..SOIL_ENTRIES {
            let psi = PSI_MIN + (PSI_MAX - PSI_MIN) * i as f64 / (SOIL_ENTRIES - 1) as f64;
            let (se, dse_dpsi) = van_genuchten_se(psi, alpha, n, m);
            se_of_psi.push(se);
            capacity_of_psi.push(dse_dpsi);
        }

        let mut kr_of_theta = Vec::with_capacity(SOIL_ENTRIES);
        for i in 0..SOIL_ENTRIES {
            let theta =
                THETA_MIN + (THETA_MAX - THETA_MIN) * i as f64 / (SOIL_ENTRIES - 1) as f64;
            // Treat theta directly as an effective saturation proxy over
            // the reference [THETA_MIN, THETA_MAX] span for the Mualem Kr
            // shape; callers rescale by the cell's own K_s.
            let se = ((theta - THETA_MIN) / (THETA_MAX - THETA_MIN)).clamp(0.0, 1.0);
            let kr = mualem_kr(se, m);
            kr_of_theta.push(kr);
        }

        SoilLut {
            se_of_psi,
            kr_of_theta,
            capacity_of_psi,
            reference,
        }
    }

    pub fn reference(&self) -> VanGenuchthenReference {
        self.reference
    }

    /// Volumetric water content theta(psi) rescaled into a cell's own
    /// `[theta_r, theta_s]` span.
    pub fn theta_of_psi(&self, psi: f64, theta_r: f64, theta_s: f64) -> f64 {
        let se = lerp_table(&self.se_of_psi, PSI_MIN, PSI_MAX, psi);
        theta_r + se * (theta_s - theta_r)
    }

    /// Relative (dimensionless, [0,1]) hydraulic conductivity at a given
    /// volumetric water content — multiply by the cell's `K_s` to get an
    /// absolute conductivity.
    pub fn kr_of_theta(&self, theta: f64) -> f64 {
        lerp_table(&self.kr_of_theta, THETA_MIN, THETA_MAX, theta)
    }

    /// `d(theta)/d(psi)` capacity term, rescaled into a cell's `[theta_r,
    /// theta_s]` span, used as the Picard-iteration linearization slope.
    pub fn capacity_of_psi(&self, psi: f64, theta_r: f64, theta_s: f64) -> f64 {
        let dse_dpsi = lerp_table(&self.capacity_of_psi, PSI_MIN, PSI_MAX, psi);
        dse_dpsi * (theta_s - theta_r)
    }
}

/// Effective saturation and its derivative with respect to psi, closed
/// form: `Se(psi) = (1 + |alpha*psi|^n)^(-m)` for psi <= 0, else 1.
fn van_genuchten_se(psi: f64, alpha: f64, n: f64, m: f64) -> (f64, f64) {
    if psi >= 0.0 {
        return (1.0, 0.0);
    }
    let ap = (alpha * psi).abs();
    let apn = ap.powf(n);
    let base = 1.0 + apn;
    let se = base.powf(-m);
    // d(Se)/d(psi) = m*n*alpha*(alpha*|psi|)^(n-1) * (1+(alpha*|psi|)^n)^(-m-1)
    let dse_dpsi = m * n * alpha * ap.powf(n - 1.0) * base.powf(-m - 1.0);
    (se, dse_dpsi)
}

/// Mualem relative conductivity: `Kr(Se) = sqrt(Se) * (1 - (1 -
/// Se^(1/m))^m)^2`.
fn mualem_kr(se: f64, m: f64) -> f64 {
    let se = se.clamp(0.0, 1.0);
    let inner = 1.0 - (1.0 - se.powf(1.0 / m)).max(0.0).powf(m);
    se.sqrt() * inner * inner
}

/// Fungal:bacterial priming multiplier: 8 fixed anchor points, "first i
/// with key[i] >= input, saturating at the last".
const PRIMING_ANCHORS: [(f64, f64); 8] = [
    (0.1, 1.0),
    (0.25, 1.2),
    (0.5, 1.6),
    (1.0, 2.5),
    (1.5, 3.5),
    (2.0, 4.5),
    (3.0, 6.0),
    (f64::INFINITY, 8.0),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct PrimingLut;

impl PrimingLut {
    pub fn lookup(&self, fb_ratio: f64) -> f64 {
        for &(key, value) in PRIMING_ANCHORS.iter() {
            if key >= fb_ratio {
                return value;
            }
        }
        PRIMING_ANCHORS[PRIMING_ANCHORS.len() - 1].1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priming_anchor_points() {
        let p = PrimingLut;
        assert_eq!(p.lookup(0.10), 1.0);
        assert_eq!(p.lookup(1.0), 2.5);
        let at_three = p.lookup(3.0);
        assert!((6.0..=8.0).contains(&at_three));
        assert_eq!(p.lookup(1000.0), 8.0);
    }

    #[test]
    fn theta_of_psi_monotone_increasing() {
        let lut = SoilLut::build(VanGenuchthenReference::default());
        let mut prev = lut.theta_of_psi(PSI_MIN, 0.05, 0.45);
        let mut psi = PSI_MIN;
        while psi < 0.0 {
            let theta = lut.theta_of_psi(psi, 0.05, 0.45);
            assert!(theta >= prev - 1e-9);
            prev = theta;
            psi += 1000.0;
        }
    }

    #[test]
    fn theta_bounds_respected() {
        let lut = SoilLut::build(VanGenuchthenReference::default());
        let theta_r = 0.05;
        let theta_s = 0.45;
        assert!((lut.theta_of_psi(0.0, theta_r, theta_s) - theta_s).abs() < 1e-6);
        let dry = lut.theta_of_psi(PSI_MIN, theta_r, theta_s);
        assert!(dry >= theta_r - 1e-6 && dry < theta_s);
    }

    #[test]
    fn conductivity_increases_with_saturation() {
        let lut = SoilLut::build(VanGenuchthenReference::default());
        let kr_dry = lut.kr_of_theta(THETA_MIN);
        let kr_wet = lut.kr_of_theta(THETA_MAX);
        assert!(kr_wet > kr_dry);
        assert!(kr_dry >= 0.0);
        assert!(kr_wet <= 1.0 + 1e-9);
    }

    #[test]
    fn atmosphere_lut_increasing_with_temperature() {
        let lut = AtmosphereLut::build();
        assert!(lut.e_s(313.0) > lut.e_s(273.0));
    }
}
