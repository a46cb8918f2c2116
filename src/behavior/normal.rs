/*
 * Normal Behavior
 *
 * The default bubble: born small in the bottom band, floats up to a height
 * that depends on its size, eats smaller overlapping neighbours on the way,
 * and on death rises to the top, fades out and is recycled back into a
 * dormant bubble in the birth band.
 */

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{BubbleBehavior, HookResult};
use crate::bubble::Bubble;
use crate::collision;
use crate::config::GrowthPolicy;

pub struct NormalBehavior {
    policy: GrowthPolicy,
    meals: Cell<u32>,
}

impl NormalBehavior {
    pub fn new(policy: GrowthPolicy) -> Self {
        Self {
            policy,
            meals: Cell::new(0),
        }
    }

    pub fn meals(&self) -> u32 {
        self.meals.get()
    }

    async fn eat_neighbours(&self, actor: &Rc<Bubble>) {
        let meals = collision::consume_overlapping(actor).await;
        if !meals.is_empty() {
            debug!(actor = %actor.id(), count = meals.len(), "finished eating");
        }
    }

    fn has_eaten_enough(&self) -> bool {
        match self.policy {
            GrowthPolicy::Unconditional => true,
            GrowthPolicy::EatCount { min_meals } | GrowthPolicy::Probabilistic { min_meals, .. } => {
                self.meals.get() >= min_meals
            }
        }
    }
}

impl Default for NormalBehavior {
    fn default() -> Self {
        Self::new(GrowthPolicy::default())
    }
}

#[async_trait(?Send)]
impl BubbleBehavior for NormalBehavior {
    fn name(&self) -> &'static str {
        "normal"
    }

    async fn on_born(&self, actor: &Rc<Bubble>) -> HookResult {
        let duration = actor.config().default_animation_duration();

        actor.set_visible(false);
        actor.scale_to(actor.random_birth_size(), duration, false).await?;
        let spot = actor.random_birth_position()?;
        actor.goto(spot, Duration::ZERO, false).await?;
        actor.set_visible(true);
        actor.fade_to(actor.birth_opacity(), duration).await?;

        self.eat_neighbours(actor).await;
        Ok(())
    }

    async fn on_grown(&self, actor: &Rc<Bubble>) -> HookResult {
        let idle = actor.idle_position()?;
        actor.goto(idle, actor.move_duration(), false).await?;
        actor
            .fade_to(actor.birth_opacity(), actor.config().default_animation_duration())
            .await?;

        self.eat_neighbours(actor).await;
        if actor.is_visible() {
            actor.breathe();
        }
        Ok(())
    }

    async fn on_death(&self, actor: &Rc<Bubble>) -> HookResult {
        // Reset before anything below can fail
        self.meals.set(0);
        actor.stop_breathing();

        let top = actor.top_position()?;
        actor.goto(top, actor.move_duration(), false).await?;
        actor.fade_to(0.0, actor.config().default_animation_duration()).await?;
        actor.scale_to(actor.config().init_size, Duration::ZERO, false).await?;
        actor.set_visible(false);

        let spot = actor.random_birth_position()?;
        actor.goto(spot, Duration::ZERO, false).await
    }

    async fn on_click(&self, actor: &Rc<Bubble>) -> HookResult {
        actor.advance().await;
        Ok(())
    }

    async fn on_touch(&self, actor: &Rc<Bubble>, other: &Rc<Bubble>) -> HookResult {
        collision::try_consume(actor, other).await;
        Ok(())
    }

    fn is_ready_to_grow(&self, _actor: &Bubble) -> bool {
        self.has_eaten_enough()
    }

    fn is_ready_to_die(&self, actor: &Bubble) -> bool {
        match self.policy {
            GrowthPolicy::Probabilistic { probability, .. } => self.has_eaten_enough() && actor.roll(probability),
            _ => self.has_eaten_enough(),
        }
    }

    fn record_meal(&self) {
        self.meals.set(self.meals.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconditional_policy_needs_no_meals() {
        let behavior = NormalBehavior::default();
        assert!(behavior.has_eaten_enough());
    }

    #[test]
    fn eat_count_policy_counts_meals() {
        let behavior = NormalBehavior::new(GrowthPolicy::EatCount { min_meals: 2 });
        assert!(!behavior.has_eaten_enough());
        behavior.record_meal();
        assert!(!behavior.has_eaten_enough());
        behavior.record_meal();
        assert!(behavior.has_eaten_enough());
        assert_eq!(behavior.meals(), 2);
    }
}
