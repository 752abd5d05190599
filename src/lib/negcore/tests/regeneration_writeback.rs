//! REG hydrological write-back under a literal Loess parameter set.

use negcore::lut::PrimingLut;
use negcore::reg::{self, RegInputs, RegParams};
use negcore::state::Cell;

#[test]
fn loess_parameter_set_increases_vegetation_som_and_writeback_slots() {
    let mut cell = Cell::new_default();
    cell.commit_som_percent(0.50);
    cell.write_back_porosity_eff(0.40);
    cell.write_back_k_vertical(5e-6);

    let params = RegParams::loess();
    let priming = PrimingLut;
    let inputs = RegInputs {
        theta_avg: 0.20, // above theta* = 0.17
        ..Default::default()
    };

    let v_before = cell.vegetation_cover();
    let som_before = cell.som_percent();
    let porosity_before = cell.porosity_eff();
    let k_before = cell.k_vertical();

    reg::step(&mut cell, &inputs, &params, &priming, 1.0);

    assert!(cell.vegetation_cover() > v_before, "V must strictly increase");
    assert!(cell.som_percent() > som_before, "SOM must strictly increase");
    assert!(cell.porosity_eff() > porosity_before, "porosity_eff must increase");
    assert!(cell.k_vertical() > k_before, "K_tensor[8] must increase");

    assert!(cell.porosity_eff() >= 0.3 && cell.porosity_eff() <= 0.7);
    assert!(cell.k_vertical() >= 1e-8 && cell.k_vertical() <= 1e-3);
}
