/*
 * Debug Behavior
 *
 * Deterministic fixture: a fixed size at a fixed spot, no randomness. Pointer
 * hooks let a bubble be dragged around and snapped back.
 */

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;

use super::{BubbleBehavior, HookResult};
use crate::bubble::Bubble;
use crate::geometry::Position;

pub const DEBUG_SIZE: f32 = 120.0;
pub const DEBUG_POSITION: Position = Position::new(100.0, 200.0);

pub struct DebugBehavior {
    size: f32,
    home: Position,
    // Where a cancelled drag snaps back to
    anchor: Cell<Position>,
}

impl DebugBehavior {
    pub fn new(size: f32, home: Position) -> Self {
        Self {
            size,
            home,
            anchor: Cell::new(home),
        }
    }

    pub fn anchor(&self) -> Position {
        self.anchor.get()
    }
}

impl Default for DebugBehavior {
    fn default() -> Self {
        Self::new(DEBUG_SIZE, DEBUG_POSITION)
    }
}

#[async_trait(?Send)]
impl BubbleBehavior for DebugBehavior {
    fn name(&self) -> &'static str {
        "debug"
    }

    async fn on_born(&self, actor: &Rc<Bubble>) -> HookResult {
        let duration = actor.config().default_animation_duration();
        actor.scale_to(self.size, duration, false).await?;
        self.anchor.set(self.home);
        actor.goto(self.home, duration, false).await?;
        actor.fade_to(1.0, duration).await
    }

    async fn on_grown(&self, _actor: &Rc<Bubble>) -> HookResult {
        Ok(())
    }

    async fn on_death(&self, _actor: &Rc<Bubble>) -> HookResult {
        Ok(())
    }

    async fn on_click(&self, _actor: &Rc<Bubble>) -> HookResult {
        Ok(())
    }

    async fn on_long_press(&self, actor: &Rc<Bubble>, _at: Position) -> HookResult {
        let peak = actor.size() * 1.5;
        let bouncer = actor.clone();
        actor.spawn_detached(async move {
            let _ = bouncer.bounce(Some(peak)).await;
        })
    }

    async fn on_drag(&self, actor: &Rc<Bubble>, to: Position) -> HookResult {
        let half = actor.size() / 2.0;
        let target = Position::new(to.x - half, to.y - half);
        self.anchor.set(target);
        actor.goto(target, Duration::ZERO, false).await
    }

    async fn on_pointer_cancel(&self, actor: &Rc<Bubble>) -> HookResult {
        actor
            .goto(self.anchor.get(), actor.config().default_animation_duration(), false)
            .await
    }

    fn is_ready_to_grow(&self, _actor: &Bubble) -> bool {
        false
    }

    fn is_ready_to_die(&self, _actor: &Bubble) -> bool {
        false
    }

    fn is_edible(&self) -> bool {
        false
    }

    fn can_consume(&self) -> bool {
        false
    }
}
