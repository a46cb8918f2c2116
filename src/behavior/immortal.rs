/*
 * Immortal Behavior
 *
 * A bubble that is born once at its declared spot and never grows or dies.
 * Tapping it bounces it and ripples an advance through every sibling with a
 * small random stagger.
 */

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use super::{BubbleBehavior, HookResult};
use crate::bubble::Bubble;

pub const IMMORTAL_SIZE: f32 = 80.0;

const STAGGER_MIN: Duration = Duration::from_millis(50);
const STAGGER_MAX: Duration = Duration::from_millis(250);

#[derive(Default)]
pub struct ImmortalBehavior {
    born: Cell<bool>,
}

impl ImmortalBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_born(&self) -> bool {
        self.born.get()
    }
}

#[async_trait(?Send)]
impl BubbleBehavior for ImmortalBehavior {
    fn name(&self) -> &'static str {
        "immortal"
    }

    async fn on_born(&self, actor: &Rc<Bubble>) -> HookResult {
        if self.born.get() {
            return Ok(());
        }

        let duration = actor.config().default_animation_duration();
        actor.set_visible(false);
        actor.scale_to(IMMORTAL_SIZE, duration, false).await?;
        actor.set_visible(true);
        actor.fade_to(actor.birth_opacity(), duration).await?;
        actor.goto(actor.declared_position(), duration, false).await?;

        self.born.set(true);
        Ok(())
    }

    async fn on_grown(&self, _actor: &Rc<Bubble>) -> HookResult {
        Ok(())
    }

    async fn on_death(&self, _actor: &Rc<Bubble>) -> HookResult {
        Ok(())
    }

    async fn on_click(&self, actor: &Rc<Bubble>) -> HookResult {
        actor.bounce(None).await?;

        for sibling in actor.siblings() {
            let stagger = actor.random_duration(STAGGER_MIN, STAGGER_MAX);
            actor.sleep(stagger).await;
            trace!(actor = %actor.id(), sibling = %sibling.id(), "waking sibling");
            actor.spawn_detached(async move {
                sibling.advance().await;
            })?;
        }

        Ok(())
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
