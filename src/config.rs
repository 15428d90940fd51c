//! Flocking configuration.
//!
//! `FlockingConfig` carries every tunable of the simulation. It is owned by
//! the caller and passed by reference into each tick, so edits take effect
//! on the next parameter upload. Only a change of agent count requires a
//! buffer reset; see [`FlockingConfig::set_agent_count`].
//!
//! Configs serialize to JSON:
//!
//! ```ignore
//! let config = FlockingConfig::load("flock.json")?;
//! config.save("flock.backup.json")?;
//! ```

use std::fs;
use std::path::Path;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::agents::{effective_agent_count, DEFAULT_SPAWN_EXTENT};
use crate::error::{Result, ShoalError};
use crate::target::TargetSource;

fn default_agent_count() -> u32 {
    10_000
}

fn default_spawn_extent() -> f32 {
    DEFAULT_SPAWN_EXTENT
}

/// Target seeking parameters.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TargetConfig {
    pub source: TargetSource,
    /// Attraction strength toward the target.
    pub seek_force: f32,
    /// Distance beyond which attraction stops growing.
    pub clamp_distance: f32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            source: TargetSource::default(),
            seek_force: 0.4,
            clamp_distance: 5.0,
        }
    }
}

/// Parameters forwarded to the renderer and never read by the kernel.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Min/max instance scale.
    pub scale_range: [f32; 2],
    pub animation_speed: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            scale_range: [0.6, 1.0],
            animation_speed: 1.0,
        }
    }
}

/// Complete flocking configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FlockingConfig {
    /// Requested agent count; never allocated below 256.
    #[serde(default = "default_agent_count")]
    pub agent_count: u32,
    /// Min/max agent speed.
    pub speed_range: [f32; 2],
    /// Weights of (alignment, cohesion, separation).
    pub force_weight: [f32; 3],
    /// Neighbor radii of (alignment, cohesion, separation).
    pub perception_radius: [f32; 3],
    /// Cap on the combined flocking steering force.
    pub max_steer_force: f32,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub render: RenderConfig,
    /// Half-size of the cube agents are seeded in.
    #[serde(default = "default_spawn_extent")]
    pub spawn_extent: f32,
    /// RNG seed for agent seeding. `None` seeds from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for FlockingConfig {
    fn default() -> Self {
        Self {
            agent_count: default_agent_count(),
            speed_range: [2.0, 5.0],
            force_weight: [1.0, 1.0, 1.5],
            perception_radius: [1.0, 1.0, 0.5],
            max_steer_force: 1.0,
            target: TargetConfig::default(),
            render: RenderConfig::default(),
            spawn_extent: DEFAULT_SPAWN_EXTENT,
            seed: None,
        }
    }
}

impl FlockingConfig {
    /// Save the configuration to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load and validate a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Parse and validate a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is in its legal range.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ShoalError::InvalidConfig(msg));

        let scalars = [
            ("speed_range", self.speed_range.as_slice()),
            ("force_weight", self.force_weight.as_slice()),
            ("perception_radius", self.perception_radius.as_slice()),
            ("max_steer_force", std::slice::from_ref(&self.max_steer_force)),
            ("target.seek_force", std::slice::from_ref(&self.target.seek_force)),
            ("target.clamp_distance", std::slice::from_ref(&self.target.clamp_distance)),
            ("render.scale_range", self.render.scale_range.as_slice()),
            ("render.animation_speed", std::slice::from_ref(&self.render.animation_speed)),
            ("spawn_extent", std::slice::from_ref(&self.spawn_extent)),
        ];
        for (name, values) in scalars {
            if values.iter().any(|v| !v.is_finite()) {
                return invalid(format!("{name} must be finite"));
            }
        }

        let [min_speed, max_speed] = self.speed_range;
        if min_speed < 0.0 || min_speed > max_speed {
            return invalid(format!(
                "speed_range must satisfy 0 <= min <= max, got [{min_speed}, {max_speed}]"
            ));
        }
        if self.perception_radius.iter().any(|&r| r < 0.0) {
            return invalid("perception_radius must be non-negative".into());
        }
        if self.max_steer_force < 0.0 {
            return invalid("max_steer_force must be non-negative".into());
        }
        let [min_scale, max_scale] = self.render.scale_range;
        if min_scale > max_scale {
            return invalid(format!(
                "render.scale_range min must not exceed max, got [{min_scale}, {max_scale}]"
            ));
        }
        if self.spawn_extent < 0.0 {
            return invalid("spawn_extent must be non-negative".into());
        }
        if let TargetSource::Pointer { world_size } = self.target.source {
            if world_size.iter().any(|&s| !s.is_finite() || s <= 0.0) {
                return invalid("target.source world_size must be positive".into());
            }
        }
        Ok(())
    }

    /// Agent count that will actually be allocated.
    #[inline]
    pub fn effective_agent_count(&self) -> u32 {
        effective_agent_count(self.agent_count)
    }

    /// Change the requested agent count.
    ///
    /// Returns `true` if the allocated count changes, in which case the
    /// caller must request a reset.
    pub fn set_agent_count(&mut self, count: u32) -> bool {
        let before = self.effective_agent_count();
        self.agent_count = count;
        self.effective_agent_count() != before
    }

    pub fn speed_range(&self) -> Vec2 {
        Vec2::from_array(self.speed_range)
    }

    pub fn set_speed_range(&mut self, range: Vec2) {
        self.speed_range = range.to_array();
    }

    pub fn force_weight(&self) -> Vec3 {
        Vec3::from_array(self.force_weight)
    }

    pub fn set_force_weight(&mut self, weight: Vec3) {
        self.force_weight = weight.to_array();
    }

    pub fn perception_radius(&self) -> Vec3 {
        Vec3::from_array(self.perception_radius)
    }

    pub fn set_perception_radius(&mut self, radius: Vec3) {
        self.perception_radius = radius.to_array();
    }

    pub fn scale_range(&self) -> Vec2 {
        Vec2::from_array(self.render.scale_range)
    }

    pub fn set_scale_range(&mut self, range: Vec2) {
        self.render.scale_range = range.to_array();
    }
}
