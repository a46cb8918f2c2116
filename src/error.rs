/*
 * Error Module
 *
 * Errors raised by the engine. Behavior hooks return BubbleError and the
 * lifecycle absorbs it; consumption guard failures and dropped transitions
 * are not errors at all.
 */

use thiserror::Error;

use crate::tween::Channel;
use crate::ActorId;

#[derive(Debug, Error)]
pub enum BubbleError {
    #[error("a bubble can only be created inside a container")]
    MissingContainer,

    #[error("the container of {0} is gone")]
    ContainerGone(ActorId),

    #[error("no behavior is registered under `{0}`")]
    UnknownBehavior(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("{channel} tween on {actor} was replaced before it settled")]
    TweenCancelled { actor: ActorId, channel: Channel },

    #[error("behavior `{behavior}` failed: {reason}")]
    Behavior {
        behavior: &'static str,
        reason: String,
    },

    #[error("failed to spawn task: {0}")]
    Spawn(#[from] futures::task::SpawnError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("size bounds must satisfy 0 < min ({min}) <= init ({init}) <= max ({max})")]
    SizeBounds { min: f32, init: f32, max: f32 },

    #[error("size rates must be finite and not negative, got random {random} and grow {grow}")]
    InvalidRate { random: f32, grow: f32 },

    #[error("opacities must lie in [0, 1] with min ({min}) <= max ({max})")]
    OpacityBounds { min: f32, max: f32 },

    #[error("move duration bounds are inverted: {min}ms > {max}ms")]
    MoveDuration { min: u64, max: u64 },

    #[error("space padding must be finite and not negative, got {0}")]
    Padding(f32),

    #[error("birth region ratio must lie in (0, 1], got {0}")]
    BirthRegion(f32),

    #[error("probability must lie in [0, 1], got {0}")]
    Probability(f32),

    #[error("wake stagger bounds are inverted: {min}ms > {max}ms")]
    Stagger { min: u64, max: u64 },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
