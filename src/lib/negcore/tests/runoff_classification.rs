//! Runoff classification on two literal cells.

use negcore::hyd::{classify_runoff, RunoffClass};
use negcore::state::Cell;

#[test]
fn hortonian_cell_is_classified_correctly() {
    let mut cell = Cell::new_default();
    cell.theta = 0.15;
    cell.theta_s = 0.40;
    cell.h_surface = 0.005;
    cell.m_k_zz = 1.0;

    let rainfall = 50.0 / 3600.0 / 1000.0;
    // K_lookup(theta) well below rainfall at this water content.
    let k_lookup = 1e-9;
    assert_eq!(classify_runoff(&cell, rainfall, k_lookup), RunoffClass::Hortonian);
}

#[test]
fn dunne_cell_is_classified_correctly() {
    let mut cell = Cell::new_default();
    cell.theta = 0.39;
    cell.theta_s = 0.40;
    cell.h_surface = 0.005;

    let rainfall = 10.0 / 3600.0 / 1000.0;
    let k_lookup = 1e-9;
    assert_eq!(classify_runoff(&cell, rainfall, k_lookup), RunoffClass::Dunne);
}
