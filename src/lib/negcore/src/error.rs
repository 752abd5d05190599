//! Error taxonomy: `thiserror` enums for configuration/serialization
//! failures, numeric status codes only at the FFI boundary. Internal code
//! uses typed error enums; only the C-ABI/WASM boundaries flatten
//! everything down to a status code plus an optional message buffer.

use thiserror::Error;

/// Returned by `Simulation::create` / `reset_from_binary` for anything
/// that is wrong before a single solver step could possibly run.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("num_scalar_fields must be >= 1, got {0}")]
    ZeroGrid(u32),

    #[error("grid_width * grid_height * grid_depth ({product}) does not equal num_scalar_fields ({num_scalar_fields})")]
    DimensionMismatch { product: u64, num_scalar_fields: u64 },

    #[error("dt must be > 0, got {0}")]
    InvalidTimestep(f64),

    #[error("reg_call_frequency must be >= 1, got {0}")]
    InvalidRegCadence(u32),

    #[error("snapshot magic mismatch: expected NEGSTATE")]
    BadMagic,

    #[error("snapshot version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("snapshot hash mismatch: recomputed hash does not match header")]
    HashMismatch,

    #[error("snapshot data size mismatch: header says {declared} bytes, grid expects {expected} bytes")]
    SizeMismatch { declared: u32, expected: u32 },

    #[error("snapshot buffer truncated: needed at least {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },
}

/// Numeric status codes exposed at the FFI/wasm boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    InvalidHandle = 1,
    InvalidConfig = 2,
    BufferTooSmall = 3,
    VersionMismatch = 4,
    HashMismatch = 5,
    PicardDiverged = 6,
    NumericalFault = 7,
    NotInitialized = 8,
}

impl From<&ConfigError> for Status {
    fn from(err: &ConfigError) -> Self {
        match err {
            ConfigError::ZeroGrid(_)
            | ConfigError::DimensionMismatch { .. }
            | ConfigError::InvalidTimestep(_)
            | ConfigError::InvalidRegCadence(_) => Status::InvalidConfig,
            ConfigError::BadMagic => Status::InvalidConfig,
            ConfigError::VersionMismatch { .. } => Status::VersionMismatch,
            ConfigError::HashMismatch => Status::HashMismatch,
            ConfigError::SizeMismatch { .. } => Status::BufferTooSmall,
            ConfigError::Truncated { .. } => Status::BufferTooSmall,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_maps_to_expected_status() {
        assert_eq!(Status::from(&ConfigError::ZeroGrid(0)), Status::InvalidConfig);
        assert_eq!(
            Status::from(&ConfigError::VersionMismatch { expected: 1, actual: 2 }),
            Status::VersionMismatch
        );
        assert_eq!(Status::from(&ConfigError::HashMismatch), Status::HashMismatch);
    }
}
