use thiserror::Error;

/// Rejected configuration. Per-tick algorithms never fail; only setup does.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f32 },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f32 },

    #[error("cell size must be positive, got {0}")]
    CellSize(f32),

    #[error("world bounds are inverted on the {axis} axis ({min} > {max})")]
    InvertedBounds { axis: char, min: f32, max: f32 },

    #[error("min_walkable_y must be in (0, 1], got {0}")]
    WalkableThreshold(f32),

    #[error("capsule radius {radius} and half-length {half_length} do not describe a capsule")]
    CapsuleDims { radius: f32, half_length: f32 },
}

/// Check that `value` is finite and non-negative. `INFINITY` is allowed when `allow_inf`.
pub fn check_non_negative(
    field: &'static str,
    value: f32,
    allow_inf: bool,
) -> Result<(), ConfigError> {
    if value.is_nan() || (value.is_infinite() && !allow_inf) {
        return Err(ConfigError::NonFinite { field, value });
    }
    if value < 0.0 {
        return Err(ConfigError::Negative { field, value });
    }
    Ok(())
}
