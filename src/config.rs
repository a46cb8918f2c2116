/*
 * Configuration Module
 *
 * This module defines the value objects that parameterise the engine:
 * BubbleConfig (owned by every actor, never mutated after construction),
 * GlassConfig (the container's pacing) and GrowthPolicy (the gate the
 * lifecycle consults before letting an actor grow or die).
 *
 * Both configs deserialize from JSON with defaults for every missing field.
 * GlassConfig also exposes the slider range for the viewer's control panel.
 */

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// When a Normal bubble is allowed to move from BORN to GROWN and from
/// GROWN to DIED on an ordinary `advance()`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrowthPolicy {
    /// Always ready.
    Unconditional,
    /// Ready once the bubble has eaten at least `min_meals` neighbours.
    EatCount { min_meals: u32 },
    /// Ready once `min_meals` is reached, and then only with `probability`.
    Probabilistic { min_meals: u32, probability: f32 },
}

impl Default for GrowthPolicy {
    fn default() -> Self {
        GrowthPolicy::Unconditional
    }
}

// Per-actor parameters, fixed at construction
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BubbleConfig {
    pub init_size: f32,
    pub min_size: f32,
    pub max_size: f32,
    pub size_random_rate: f32,
    pub size_grow_rate: f32,
    pub init_opacity: f32,
    pub min_opacity: f32,
    pub max_opacity: f32,
    pub space_padding: f32,
    pub min_move_duration_ms: u64,
    pub max_move_duration_ms: u64,
    pub default_animation_duration_ms: u64,
    // Height of the birth band as a fraction of the space height
    pub birth_region_ratio: f32,
    pub growth_policy: GrowthPolicy,
    // Refuse consumption partners that are mid move/scale tween
    pub guard_animating: bool,
}

impl Default for BubbleConfig {
    fn default() -> Self {
        Self {
            init_size: 100.0,
            min_size: 20.0,
            max_size: 160.0,
            size_random_rate: 60.0,
            size_grow_rate: 0.2,
            init_opacity: 0.0,
            min_opacity: 0.5,
            max_opacity: 0.9,
            space_padding: 10.0,
            min_move_duration_ms: 200,
            max_move_duration_ms: 600,
            default_animation_duration_ms: 200,
            birth_region_ratio: 0.3,
            growth_policy: GrowthPolicy::Unconditional,
            guard_animating: false,
        }
    }
}

impl BubbleConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_size > 0.0
            && self.min_size <= self.init_size
            && self.init_size <= self.max_size
            && self.max_size.is_finite())
        {
            return Err(ConfigError::SizeBounds {
                min: self.min_size,
                init: self.init_size,
                max: self.max_size,
            });
        }

        // Written so that NaN fails the comparison
        let rate_ok = |v: f32| v.is_finite() && v >= 0.0;
        if !(rate_ok(self.size_random_rate) && rate_ok(self.size_grow_rate)) {
            return Err(ConfigError::InvalidRate {
                random: self.size_random_rate,
                grow: self.size_grow_rate,
            });
        }

        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        if !(in_unit(self.init_opacity)
            && in_unit(self.min_opacity)
            && in_unit(self.max_opacity)
            && self.min_opacity <= self.max_opacity)
        {
            return Err(ConfigError::OpacityBounds {
                min: self.min_opacity,
                max: self.max_opacity,
            });
        }

        if self.min_move_duration_ms > self.max_move_duration_ms {
            return Err(ConfigError::MoveDuration {
                min: self.min_move_duration_ms,
                max: self.max_move_duration_ms,
            });
        }

        if !(self.space_padding.is_finite() && self.space_padding >= 0.0) {
            return Err(ConfigError::Padding(self.space_padding));
        }

        if !(self.birth_region_ratio > 0.0 && self.birth_region_ratio <= 1.0) {
            return Err(ConfigError::BirthRegion(self.birth_region_ratio));
        }

        if let GrowthPolicy::Probabilistic { probability, .. } = self.growth_policy {
            if !in_unit(probability) {
                return Err(ConfigError::Probability(probability));
            }
        }

        Ok(())
    }

    pub fn default_animation_duration(&self) -> Duration {
        Duration::from_millis(self.default_animation_duration_ms)
    }

    pub fn min_move_duration(&self) -> Duration {
        Duration::from_millis(self.min_move_duration_ms)
    }

    pub fn max_move_duration(&self) -> Duration {
        Duration::from_millis(self.max_move_duration_ms)
    }

    // Clamp a requested diameter into [min_size, max_size]
    pub fn clamp_size(&self, size: f32) -> f32 {
        size.clamp(self.min_size, self.max_size)
    }
}

// Container pacing: how often a random bubble is nudged forward
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GlassConfig {
    pub nudge_interval_ms: u64,
    pub startup_delay_ms: u64,
    pub wake_stagger_min_ms: u64,
    pub wake_stagger_max_ms: u64,
    pub autoplay: bool,
    pub seed: u64,
}

impl Default for GlassConfig {
    fn default() -> Self {
        Self {
            nudge_interval_ms: 1000,
            startup_delay_ms: 2000,
            wake_stagger_min_ms: 50,
            wake_stagger_max_ms: 150,
            autoplay: true,
            seed: 0x00B0_BB1E,
        }
    }
}

impl GlassConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        if config.wake_stagger_min_ms > config.wake_stagger_max_ms {
            return Err(ConfigError::Stagger {
                min: config.wake_stagger_min_ms,
                max: config.wake_stagger_max_ms,
            });
        }
        Ok(config)
    }

    pub fn nudge_interval(&self) -> Duration {
        Duration::from_millis(self.nudge_interval_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn get_nudge_interval_range() -> std::ops::RangeInclusive<u64> {
        100..=5000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(BubbleConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = BubbleConfig::from_json_str(r#"{ "max_size": 200.0 }"#).unwrap();
        assert_eq!(config.max_size, 200.0);
        assert_eq!(config.min_size, 20.0);
        assert_eq!(config.growth_policy, GrowthPolicy::Unconditional);
    }

    #[test]
    fn growth_policy_is_tagged() {
        let config = BubbleConfig::from_json_str(
            r#"{ "growth_policy": { "kind": "probabilistic", "min_meals": 1, "probability": 0.5 } }"#,
        )
        .unwrap();
        assert_eq!(
            config.growth_policy,
            GrowthPolicy::Probabilistic { min_meals: 1, probability: 0.5 }
        );
    }

    #[test]
    fn inverted_size_bounds_are_rejected() {
        let config = BubbleConfig {
            min_size: 200.0,
            ..BubbleConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::SizeBounds { .. })));
    }

    #[test]
    fn opacity_outside_unit_interval_is_rejected() {
        let result = BubbleConfig::from_json_str(r#"{ "max_opacity": 1.5 }"#);
        assert!(matches!(result, Err(ConfigError::OpacityBounds { .. })));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let nan_grow = BubbleConfig {
            size_grow_rate: f32::NAN,
            ..BubbleConfig::default()
        };
        assert!(matches!(nan_grow.validate(), Err(ConfigError::InvalidRate { .. })));

        let infinite_random = BubbleConfig {
            size_random_rate: f32::INFINITY,
            ..BubbleConfig::default()
        };
        assert!(matches!(infinite_random.validate(), Err(ConfigError::InvalidRate { .. })));

        let nan_padding = BubbleConfig {
            space_padding: f32::NAN,
            ..BubbleConfig::default()
        };
        assert!(matches!(nan_padding.validate(), Err(ConfigError::Padding(_))));

        let unbounded = BubbleConfig {
            max_size: f32::INFINITY,
            ..BubbleConfig::default()
        };
        assert!(matches!(unbounded.validate(), Err(ConfigError::SizeBounds { .. })));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            BubbleConfig::from_json_str("{ nope"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn glass_config_rejects_inverted_stagger() {
        let result = GlassConfig::from_json_str(
            r#"{ "wake_stagger_min_ms": 300, "wake_stagger_max_ms": 100 }"#,
        );
        assert!(matches!(result, Err(ConfigError::Stagger { .. })));
    }
}
