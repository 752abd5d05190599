//! Binary and JSON snapshot formats: a fixed byte layout hashed with
//! `xxhash-rust`'s XXH3, a fast non-cryptographic hash well suited to a
//! buffer that needs to be hashed, not signed.

use crate::error::ConfigError;
use crate::state::{Cell, GridDims, SimulationState};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

pub const MAGIC: &[u8; 8] = b"NEGSTATE";
pub const VERSION: u32 = 1;

const CELL_FIELD_COUNT: usize = 23;
const CELL_BYTES: usize = CELL_FIELD_COUNT * 8;
/// tick (u64) + error_flags (u32, padded to u64) + width/height/depth (u32
/// each, packed into two u64 slots).
const HEADER_BYTES: usize = 8 + 8 + 8;

fn cell_to_bytes(cell: &Cell, out: &mut Vec<u8>) {
    let fields = [
        cell.theta,
        cell.psi,
        cell.h_surface,
        cell.zeta,
        cell.k_s,
        cell.alpha_vg,
        cell.n_vg,
        cell.theta_s,
        cell.theta_r,
        cell.z,
        cell.dz,
        cell.dx,
        cell.zeta_c,
        cell.a_c,
        cell.m_k_zz,
        cell.m_k_xx,
        cell.kappa_evap,
        cell.delta_zeta,
        cell.vegetation_cover_fxp().to_bits() as f64,
        cell.som_percent_fxp().to_bits() as f64,
        cell.porosity_eff(),
        cell.k_tensor()[8],
        0.0, // reserved, keeps the layout 16-byte aligned
    ];
    for f in fields {
        out.extend_from_slice(&f.to_bits().to_le_bytes());
    }
}

fn cell_from_bytes(bytes: &[u8]) -> Cell {
    let mut fields = [0.0_f64; CELL_FIELD_COUNT];
    for (i, chunk) in bytes.chunks_exact(8).take(CELL_FIELD_COUNT).enumerate() {
        let bits = u64::from_le_bytes(chunk.try_into().unwrap());
        fields[i] = f64::from_bits(bits);
    }

    let mut cell = Cell::new_default();
    cell.theta = fields[0];
    cell.psi = fields[1];
    cell.h_surface = fields[2];
    cell.zeta = fields[3];
    cell.k_s = fields[4];
    cell.alpha_vg = fields[5];
    cell.n_vg = fields[6];
    cell.theta_s = fields[7];
    cell.theta_r = fields[8];
    cell.z = fields[9];
    cell.dz = fields[10];
    cell.dx = fields[11];
    cell.zeta_c = fields[12];
    cell.a_c = fields[13];
    cell.m_k_zz = fields[14];
    cell.m_k_xx = fields[15];
    cell.kappa_evap = fields[16];
    cell.delta_zeta = fields[17];
    let vegetation_bits = fields[18] as i64 as i32;
    let som_bits = fields[19] as i64 as i32;
    cell.commit_vegetation_cover(crate::fixed::Fxp::from_bits(vegetation_bits).to_f64());
    cell.commit_som_percent(crate::fixed::Fxp::from_bits(som_bits).to_f64());
    cell.write_back_porosity_eff(fields[20]);
    cell.write_back_k_vertical(fields[21]);
    cell
}

fn data_section(state: &SimulationState) -> Vec<u8> {
    let mut data = Vec::with_capacity(HEADER_BYTES + state.cells.len() * CELL_BYTES);
    data.extend_from_slice(&state.tick_micros.to_le_bytes());
    data.extend_from_slice(&(state.error_flags as u64).to_le_bytes());
    let packed_dims = (state.dims.width as u64) << 40
        | (state.dims.height as u64) << 20
        | state.dims.depth as u64;
    data.extend_from_slice(&packed_dims.to_le_bytes());
    for cell in &state.cells {
        cell_to_bytes(cell, &mut data);
    }
    data
}

/// Serialize the full binary snapshot: MAGIC, VERSION, TIMESTAMP, HASH,
/// DATA_SIZE, DATA, in that fixed offset order.
pub fn to_binary(state: &SimulationState, timestamp_ms: u64) -> Vec<u8> {
    let data = data_section(state);
    let hash = xxh3_64(&data);

    let mut out = Vec::with_capacity(32 + data.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&timestamp_ms.to_le_bytes());
    out.extend_from_slice(&hash.to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&data);
    out
}

pub fn binary_size(state: &SimulationState) -> usize {
    32 + data_section(state).len()
}

/// Validate MAGIC/VERSION/HASH and rebuild a `SimulationState`'s cells and
/// scheduler scalars in place. The caller is responsible for grid-size
/// compatibility with the existing allocation (see lib.rs's
/// `reset_from_binary`, which never resizes the owning `Vec<Cell>`).
pub fn parse_binary(bytes: &[u8]) -> Result<ParsedSnapshot, ConfigError> {
    if bytes.len() < 32 {
        return Err(ConfigError::Truncated {
            needed: 32,
            got: bytes.len(),
        });
    }
    if &bytes[0..8] != MAGIC {
        return Err(ConfigError::BadMagic);
    }
    let version = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
    if version != VERSION {
        return Err(ConfigError::VersionMismatch {
            expected: VERSION,
            actual: version,
        });
    }
    let timestamp_ms = u64::from_le_bytes(bytes[12..20].try_into().unwrap());
    let header_hash = u64::from_le_bytes(bytes[20..28].try_into().unwrap());
    let data_size = u32::from_le_bytes(bytes[28..32].try_into().unwrap()) as usize;

    if bytes.len() < 32 + data_size {
        return Err(ConfigError::Truncated {
            needed: 32 + data_size,
            got: bytes.len(),
        });
    }
    let data = &bytes[32..32 + data_size];
    let recomputed_hash = xxh3_64(data);
    if recomputed_hash != header_hash {
        return Err(ConfigError::HashMismatch);
    }

    if data.len() < HEADER_BYTES {
        return Err(ConfigError::Truncated {
            needed: HEADER_BYTES,
            got: data.len(),
        });
    }
    let tick_micros = u64::from_le_bytes(data[0..8].try_into().unwrap());
    let error_flags = u64::from_le_bytes(data[8..16].try_into().unwrap()) as u32;
    let packed_dims = u64::from_le_bytes(data[16..24].try_into().unwrap());
    let dims = GridDims {
        width: ((packed_dims >> 40) & 0xFFFFF) as u32,
        height: ((packed_dims >> 20) & 0xFFFFF) as u32,
        depth: (packed_dims & 0xFFFFF) as u32,
    };

    let cell_bytes = &data[HEADER_BYTES..];
    let expected = dims.cell_count() * CELL_BYTES;
    if cell_bytes.len() < expected {
        return Err(ConfigError::SizeMismatch {
            declared: data_size as u32,
            expected: (HEADER_BYTES + expected) as u32,
        });
    }
    let cells = cell_bytes
        .chunks_exact(CELL_BYTES)
        .take(dims.cell_count())
        .map(cell_from_bytes)
        .collect();

    Ok(ParsedSnapshot {
        dims,
        tick_micros,
        error_flags,
        cells,
        timestamp_ms,
    })
}

#[derive(Debug)]
pub struct ParsedSnapshot {
    pub dims: GridDims,
    pub tick_micros: u64,
    pub error_flags: u32,
    pub cells: Vec<Cell>,
    pub timestamp_ms: u64,
}

/// JSON-serializable mirror of the hydrological/regeneration state,
/// `u64`/`hash64` fields as `"0x…"` hex strings so double-precision-only
/// JSON consumers don't lose bits.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonSnapshot {
    #[serde(serialize_with = "serialize_hex_u64", deserialize_with = "deserialize_hex_u64")]
    pub tick_micros: u64,
    pub error_flags: u32,
    pub grid_width: u32,
    pub grid_height: u32,
    pub grid_depth: u32,
    #[serde(serialize_with = "serialize_hex_u64", deserialize_with = "deserialize_hex_u64")]
    pub state_hash: u64,
    pub cells: Vec<JsonCell>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonCell {
    pub theta: f64,
    pub psi: f64,
    pub h_surface: f64,
    pub zeta: f64,
    pub vegetation_cover: f64,
    pub som_percent: f64,
    pub porosity_eff: f64,
    pub k_vertical: f64,
}

fn serialize_hex_u64<S: serde::Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("0x{value:x}"))
}

fn deserialize_hex_u64<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let s = String::deserialize(deserializer)?;
    let digits = s.strip_prefix("0x").unwrap_or(&s);
    u64::from_str_radix(digits, 16).map_err(serde::de::Error::custom)
}

pub fn to_json(state: &SimulationState, state_hash: u64) -> JsonSnapshot {
    JsonSnapshot {
        tick_micros: state.tick_micros,
        error_flags: state.error_flags,
        grid_width: state.dims.width,
        grid_height: state.dims.height,
        grid_depth: state.dims.depth,
        state_hash,
        cells: state
            .cells
            .iter()
            .map(|cell| JsonCell {
                theta: cell.theta,
                psi: cell.psi,
                h_surface: cell.h_surface,
                zeta: cell.zeta,
                vegetation_cover: cell.vegetation_cover(),
                som_percent: cell.som_percent(),
                porosity_eff: cell.porosity_eff(),
                k_vertical: cell.k_vertical(),
            })
            .collect(),
    }
}

/// Content hash of the DATA section only — what `get_state_hash` returns.
pub fn state_hash(state: &SimulationState) -> u64 {
    xxh3_64(&data_section(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lut::{AtmosphereLut, PrimingLut, SoilLut};
    use crate::rng::Xorshift64Star;
    use crate::state::Scratch;

    fn sample_state() -> SimulationState {
        let dims = GridDims {
            width: 2,
            height: 2,
            depth: 1,
        };
        SimulationState {
            dims,
            cells: vec![Cell::new_default(); dims.cell_count()],
            tick_micros: 42,
            rng: Xorshift64Star::default(),
            soil_lut: SoilLut::build(Default::default()),
            atmosphere_lut: AtmosphereLut::build(),
            priming_lut: PrimingLut,
            error_flags: 0,
            fatal: false,
            hyd_step_counter: 0,
            scratch: Scratch::new(1, 4),
        }
    }

    #[test]
    fn binary_round_trip_is_hash_identical() {
        let state = sample_state();
        let bytes = to_binary(&state, 1000);
        let parsed = parse_binary(&bytes).expect("valid snapshot");
        assert_eq!(parsed.dims, state.dims);
        assert_eq!(parsed.tick_micros, state.tick_micros);
        assert_eq!(parsed.cells.len(), state.cells.len());

        let hash_before = state_hash(&state);
        let reconstructed = SimulationState {
            dims: parsed.dims,
            cells: parsed.cells,
            tick_micros: parsed.tick_micros,
            rng: Xorshift64Star::default(),
            soil_lut: SoilLut::build(Default::default()),
            atmosphere_lut: AtmosphereLut::build(),
            priming_lut: PrimingLut,
            error_flags: parsed.error_flags,
            fatal: false,
            hyd_step_counter: 0,
            scratch: Scratch::new(1, 4),
        };
        assert_eq!(hash_before, state_hash(&reconstructed));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let state = sample_state();
        let mut bytes = to_binary(&state, 0);
        bytes[0] = b'X';
        assert_eq!(parse_binary(&bytes).unwrap_err(), ConfigError::BadMagic);
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let state = sample_state();
        let mut bytes = to_binary(&state, 0);
        bytes[8..12].copy_from_slice(&99u32.to_le_bytes());
        assert_eq!(
            parse_binary(&bytes).unwrap_err(),
            ConfigError::VersionMismatch { expected: 1, actual: 99 }
        );
    }

    #[test]
    fn hash_mismatch_is_rejected() {
        let state = sample_state();
        let mut bytes = to_binary(&state, 0);
        let len = bytes.len();
        bytes[len - 1] ^= 0xFF;
        assert_eq!(parse_binary(&bytes).unwrap_err(), ConfigError::HashMismatch);
    }

    #[test]
    fn json_snapshot_hex_encodes_u64_fields() {
        let state = sample_state();
        let json = to_json(&state, 0xDEAD_BEEF);
        let serialized = serde_json::to_string(&json).unwrap();
        assert!(serialized.contains("0xdeadbeef"));
    }
}
