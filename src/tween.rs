/*
 * Tween Port Module
 *
 * The capability the engine uses to animate a bubble's visual state. The
 * engine owns the authoritative numbers; a port only projects them over time
 * and reports when each tween has fully settled.
 *
 * A port keeps at most one active tween per (actor, channel). Starting a new
 * tween on a busy channel cancels the old one, whose caller then sees
 * BubbleError::TweenCancelled.
 */

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::BubbleError;
use crate::geometry::Position;
use crate::ActorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Move,
    Scale,
    Fade,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Channel::Move => "move",
            Channel::Scale => "scale",
            Channel::Fade => "fade",
        })
    }
}

// What the render layer draws for one bubble
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Visual {
    pub position: Position,
    pub size: f32,
    pub opacity: f32,
    pub visible: bool,
    // Cosmetic offset from idle breathing, never part of the position
    pub drift: Position,
}

impl Visual {
    pub fn new(position: Position, size: f32, opacity: f32) -> Self {
        Self {
            position,
            size,
            opacity,
            visible: true,
            drift: Position::ZERO,
        }
    }

    // Where the circle is actually drawn
    pub fn drawn_position(&self) -> Position {
        self.position + self.drift
    }
}

#[async_trait(?Send)]
pub trait TweenPort {
    async fn move_to(
        &self,
        actor: ActorId,
        from: Position,
        to: Position,
        duration: Duration,
    ) -> Result<(), BubbleError>;

    async fn scale_to(&self, actor: ActorId, from: f32, to: f32, duration: Duration) -> Result<(), BubbleError>;

    async fn fade_to(&self, actor: ActorId, from: f32, to: f32, duration: Duration) -> Result<(), BubbleError>;

    /// Resolve after `duration` of animation time has elapsed.
    async fn sleep(&self, duration: Duration);

    fn is_animating(&self, actor: ActorId, channel: Channel) -> bool;

    fn set_visible(&self, actor: ActorId, visible: bool);

    /// Sway the actor up and down by `amplitude` until stopped, taking
    /// `period` for each leg. Only the drawn offset moves.
    fn breathe(&self, actor: ActorId, amplitude: f32, period: Duration);

    fn stop_breathing(&self, actor: ActorId);

    fn is_breathing(&self, actor: ActorId) -> bool;

    /// Register (or overwrite) the projection of an actor without animating.
    fn sync(&self, actor: ActorId, visual: Visual);

    /// Forget an actor, cancelling anything still in flight for it.
    fn detach(&self, actor: ActorId);
}
