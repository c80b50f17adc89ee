//! Collision-world settings for the tick pipeline.

use capsweep_collision::broad::SpatialGrid;
use capsweep_collision::error::ConfigError;
use capsweep_collision::types::{Vec3, is_non_finite};

/// Longest tick the pipeline integrates in one step (seconds). Longer ticks are clamped.
pub const MAX_TICK_DT: f32 = 0.125;

/// Bounds and cell size of the broad-phase grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldSettings {
    pub min: Vec3,
    pub max: Vec3,
    pub cell_size: f32,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            min: Vec3::new(-80.0, 0.0, -80.0),
            max: Vec3::new(80.0, 10.0, 80.0),
            cell_size: 4.0,
        }
    }
}

impl WorldSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if is_non_finite(&self.min) || is_non_finite(&self.max) {
            return Err(ConfigError::NonFinite {
                field: "world bounds",
                value: f32::NAN,
            });
        }
        for (axis, (lo, hi)) in ['x', 'y', 'z']
            .into_iter()
            .zip(self.min.iter().zip(self.max.iter()))
        {
            if lo > hi {
                return Err(ConfigError::InvertedBounds {
                    axis,
                    min: *lo,
                    max: *hi,
                });
            }
        }
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(ConfigError::CellSize(self.cell_size));
        }
        Ok(())
    }

    pub fn build_grid(&self) -> Result<SpatialGrid, ConfigError> {
        self.validate()?;
        SpatialGrid::new(self.min, self.max, self.cell_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_world_builds() {
        let grid = WorldSettings::default().build_grid().unwrap();
        assert_eq!(grid.dims(), [40, 3, 40]);
    }

    #[test]
    fn rejects_invalid_settings() {
        let inverted = WorldSettings {
            min: Vec3::new(0.0, 5.0, 0.0),
            max: Vec3::new(10.0, 1.0, 10.0),
            cell_size: 1.0,
        };
        assert_eq!(
            inverted.validate(),
            Err(ConfigError::InvertedBounds {
                axis: 'y',
                min: 5.0,
                max: 1.0
            })
        );

        let zero_cell = WorldSettings {
            cell_size: 0.0,
            ..Default::default()
        };
        assert_eq!(zero_cell.validate(), Err(ConfigError::CellSize(0.0)));
    }
}
