/*
 * Bubbles - Module Definitions
 *
 * A lifecycle engine for bubble actors: each bubble is born, grows by eating
 * smaller neighbours, dies and is recycled, driven by a pluggable behavior
 * and animated through a tween port.
 */

use std::fmt;

// Re-export key components for easier access
pub use behavior::{Behavior, BubbleBehavior, DebugBehavior, HookResult, ImmortalBehavior, ModalBehavior, NormalBehavior};
pub use bubble::{Bubble, BubbleBuilder, BubbleContext};
pub use collision::{Meal, Refusal};
pub use config::{BubbleConfig, GlassConfig, GrowthPolicy};
pub use error::{BubbleError, ConfigError};
pub use geometry::{Position, SpaceRect};
pub use glass::{BubbleSnapshot, Glass, StageCounts};
pub use lifecycle::{Stage, StageEvent};
pub use registry::BehaviorRegistry;
pub use space::Space;
pub use timeline::Timeline;
pub use tween::{Channel, TweenPort, Visual};

// Define modules
pub mod behavior;
pub mod bubble;
pub mod collision;
pub mod config;
pub mod error;
pub mod geometry;
pub mod glass;
pub mod lifecycle;
pub mod move_queue;
pub mod registry;
pub mod space;
pub mod timeline;
pub mod tween;

#[cfg(feature = "viewer")]
pub mod viewer;

/// Identity of a bubble within its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub u32);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bubble-{}", self.0)
    }
}
