//! Mass conservation under rainfall with a no-flux bottom boundary. Grid
//! 16x16x8, dz=0.10, dx=1.0, K_s=5e-6, theta0=0.20 everywhere,
//! use_free_drainage=false, E_bare_ref=0, rainfall = 10 mm/hr for 100
//! minutes, dt=60s.

use negcore::reg::RegInputs;
use negcore::{SimConfig, Simulation};

fn total_water_volume(sim: &Simulation, dz: f64, dx: f64) -> f64 {
    // Reconstruct total stored water (subsurface theta*volume plus ponded
    // surface depth*area) from the JSON snapshot, the same cross-cutting
    // view the public boundary exposes to callers.
    let json = sim.state_json();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    let cells = parsed["cells"].as_array().unwrap();
    let mut total = 0.0;
    for cell in cells {
        let theta = cell["theta"].as_f64().unwrap();
        let h_surface = cell["h_surface"].as_f64().unwrap();
        total += theta * dz * dx * dx + h_surface * dx * dx;
    }
    total
}

#[test]
fn mass_is_conserved_within_tolerance_under_rainfall() {
    let dz = 0.10;
    let dx = 1.0;
    let config = SimConfig {
        num_scalar_fields: 16 * 16 * 8,
        grid_width: 16,
        grid_height: 16,
        grid_depth: 8,
        dt: 60.0,
        seed: 0,
        use_free_drainage: false,
        reg_call_frequency: 1_000_000,
        ..Default::default()
    };

    let mut sim = Simulation::create(&config).expect("valid config");
    let w_init = total_water_volume(&sim, dz, dx);

    let rainfall_flux_m_per_s = 10.0 / 1000.0 / 3600.0; // 10 mm/hr -> m/s
    let steps = 100; // 100 minutes at dt=60s
    for _ in 0..steps {
        let status = sim.step(60.0, rainfall_flux_m_per_s, RegInputs::default());
        assert_eq!(status, negcore::error::Status::Ok);
    }

    let w_final = total_water_volume(&sim, dz, dx);
    let n_surface_cells = 16.0 * 16.0;
    let rainfall_volume = rainfall_flux_m_per_s * (steps as f64 * 60.0) * n_surface_cells * dx * dx;

    let relative_error = (w_final - (w_init + rainfall_volume)).abs() / (w_init + rainfall_volume);
    assert!(
        relative_error < 0.015,
        "relative mass error {relative_error} exceeds 1.5% tolerance"
    );
}
