/*
 * Modal Behavior
 *
 * A small bubble parked in the bottom-right corner that toggles a fullscreen
 * presentation on click. Entering and leaving both play a bounce: the position
 * and size keyframes run as two concurrent sequences and the routine resolves
 * only once both have settled.
 */

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{BubbleBehavior, HookResult};
use crate::bubble::Bubble;
use crate::geometry::{Position, SpaceRect};

const REST_SIZE: f32 = 50.0;
const CORNER_INSET: f32 = 80.0;
const MAX_EXPANDED_SIZE: f32 = 300.0;
const ENTER_DURATION: Duration = Duration::from_millis(200);
const EXIT_DURATION: Duration = Duration::from_millis(100);

pub struct ModalBehavior {
    born: Cell<bool>,
    fullscreen: Cell<bool>,
    rest: Cell<Position>,
}

impl ModalBehavior {
    pub fn new() -> Self {
        Self {
            born: Cell::new(false),
            fullscreen: Cell::new(false),
            rest: Cell::new(Position::ZERO),
        }
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen.get()
    }

    pub fn rest_position(&self) -> Position {
        self.rest.get()
    }

    async fn enter_fullscreen(&self, actor: &Rc<Bubble>, space: SpaceRect) -> HookResult {
        let d = ENTER_DURATION;
        let size = space.height.min(space.width).min(MAX_EXPANDED_SIZE);
        let target = Position::new(
            space.left + (space.width - size) / 2.0,
            space.top + (space.height - size) / 2.0,
        );
        let overshoot = Position::new(target.x, target.y - 6.0);
        let undershoot = Position::new(target.x, target.y + 4.0);

        let position_bounce = async {
            actor.goto(overshoot, d.mul_f32(0.5), true).await?;
            actor.goto(undershoot, d.mul_f32(0.3), true).await?;
            actor.goto(target, d.mul_f32(0.2), true).await
        };

        let size_bounce = async {
            actor.scale_to(size * 1.5, d.mul_f32(0.5), true).await?;
            actor.scale_to(size * 0.8, d.mul_f32(0.3), true).await?;
            actor.scale_to(size, d.mul_f32(0.2), true).await
        };

        let (moved, scaled) = futures::join!(position_bounce, size_bounce);
        moved?;
        scaled
    }

    async fn exit_fullscreen(&self, actor: &Rc<Bubble>) -> HookResult {
        let d = EXIT_DURATION;
        let rest = self.rest.get();
        let overshoot = Position::new(rest.x, rest.y + 6.0);
        let undershoot = Position::new(rest.x, rest.y - 4.0);

        let position_bounce = async {
            actor.goto(overshoot, d.mul_f32(0.5), true).await?;
            actor.goto(undershoot, d.mul_f32(0.3), true).await?;
            actor.goto(rest, d.mul_f32(0.2), true).await
        };

        let shrink = actor.scale_to(REST_SIZE, d.mul_f32(0.2), true);

        let (moved, scaled) = futures::join!(position_bounce, shrink);
        moved?;
        scaled
    }
}

impl Default for ModalBehavior {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl BubbleBehavior for ModalBehavior {
    fn name(&self) -> &'static str {
        "modal"
    }

    async fn on_born(&self, actor: &Rc<Bubble>) -> HookResult {
        if self.born.get() {
            return Ok(());
        }

        let duration = actor.config().default_animation_duration();
        actor.set_visible(false);
        actor.scale_to(REST_SIZE, duration, false).await?;
        actor.set_visible(true);
        actor.fade_to(actor.birth_opacity(), duration).await?;

        let space = actor.space_rect()?;
        let rest = Position::new(space.right() - CORNER_INSET, space.bottom() - CORNER_INSET);
        self.rest.set(rest);
        actor.goto(rest, ENTER_DURATION, true).await?;

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
        let entering = !self.fullscreen.get();
        self.fullscreen.set(entering);
        debug!(actor = %actor.id(), fullscreen = entering, "modal toggled");

        if entering {
            let space = actor.space_rect()?;
            self.enter_fullscreen(actor, space).await
        } else {
            self.exit_fullscreen(actor).await
        }
    }

    fn is_ready_to_grow(&self, _actor: &Bubble) -> bool {
        false
    }

    fn is_ready_to_die(&self, _actor: &Bubble) -> bool {
        false
    }

    // Never takes part in a consumption, on either side
    fn is_edible(&self) -> bool {
        false
    }

    fn can_consume(&self) -> bool {
        false
    }

    fn is_expanded(&self) -> bool {
        self.fullscreen.get()
    }
}
