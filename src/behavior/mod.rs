/*
 * Behavior Module
 *
 * The policy a bubble consults at every lifecycle transition and on user
 * input. Built-in variants live in their own submodules; anything else plugs
 * in through Behavior::Custom. All variants are dispatched through the single
 * BubbleBehavior interface.
 *
 * Behaviors hold only their own per-bubble state (meal counts, born flags,
 * fullscreen toggles) and receive the bubble they act on as an argument.
 */

use std::ops::Deref;
use std::rc::Rc;

use async_trait::async_trait;

use crate::bubble::Bubble;
use crate::error::BubbleError;
use crate::geometry::Position;

pub mod debug;
pub mod immortal;
pub mod modal;
pub mod normal;

pub use debug::DebugBehavior;
pub use immortal::ImmortalBehavior;
pub use modal::ModalBehavior;
pub use normal::NormalBehavior;

pub type HookResult = Result<(), BubbleError>;

#[async_trait(?Send)]
pub trait BubbleBehavior {
    fn name(&self) -> &'static str;

    async fn on_born(&self, actor: &Rc<Bubble>) -> HookResult;

    async fn on_grown(&self, actor: &Rc<Bubble>) -> HookResult;

    async fn on_death(&self, actor: &Rc<Bubble>) -> HookResult;

    async fn on_sick(&self, _actor: &Rc<Bubble>) -> HookResult {
        Ok(())
    }

    async fn on_click(&self, actor: &Rc<Bubble>) -> HookResult;

    async fn on_touch(&self, _actor: &Rc<Bubble>, _other: &Rc<Bubble>) -> HookResult {
        Ok(())
    }

    // Setup after this behavior has been swapped in
    async fn on_learned(&self, _actor: &Rc<Bubble>) -> HookResult {
        Ok(())
    }

    // Teardown before this behavior is swapped out
    async fn on_forgot(&self, _actor: &Rc<Bubble>) -> HookResult {
        Ok(())
    }

    async fn on_long_press(&self, _actor: &Rc<Bubble>, _at: Position) -> HookResult {
        Ok(())
    }

    async fn on_drag(&self, _actor: &Rc<Bubble>, _to: Position) -> HookResult {
        Ok(())
    }

    async fn on_pointer_cancel(&self, _actor: &Rc<Bubble>) -> HookResult {
        Ok(())
    }

    /// Consulted before an ordinary BORN -> GROWN advance.
    fn is_ready_to_grow(&self, _actor: &Bubble) -> bool {
        true
    }

    /// Consulted before an ordinary GROWN -> DIED advance.
    fn is_ready_to_die(&self, _actor: &Bubble) -> bool {
        true
    }

    // Called on the eater after a successful consumption
    fn record_meal(&self) {}

    fn is_expanded(&self) -> bool {
        false
    }

    /// Whether another bubble may eat this one.
    fn is_edible(&self) -> bool {
        true
    }

    /// Whether this bubble may eat another one.
    fn can_consume(&self) -> bool {
        true
    }
}

pub enum Behavior {
    Normal(NormalBehavior),
    Immortal(ImmortalBehavior),
    Modal(ModalBehavior),
    Debug(DebugBehavior),
    Custom(Box<dyn BubbleBehavior>),
}

impl Behavior {
    pub fn custom(behavior: impl BubbleBehavior + 'static) -> Self {
        Behavior::Custom(Box::new(behavior))
    }

    pub fn as_dyn(&self) -> &(dyn BubbleBehavior + 'static) {
        match self {
            Behavior::Normal(b) => b,
            Behavior::Immortal(b) => b,
            Behavior::Modal(b) => b,
            Behavior::Debug(b) => b,
            Behavior::Custom(b) => b.as_ref(),
        }
    }
}

impl Deref for Behavior {
    type Target = dyn BubbleBehavior;

    fn deref(&self) -> &Self::Target {
        self.as_dyn()
    }
}

impl std::fmt::Debug for Behavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Behavior").field(&self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Inert;

    #[async_trait(?Send)]
    impl BubbleBehavior for Inert {
        fn name(&self) -> &'static str {
            "inert"
        }

        async fn on_born(&self, _actor: &Rc<Bubble>) -> HookResult {
            Ok(())
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
    }

    #[test]
    fn every_variant_dispatches_through_one_interface() {
        let behaviors = [
            Behavior::Normal(NormalBehavior::default()),
            Behavior::Immortal(ImmortalBehavior::new()),
            Behavior::Modal(ModalBehavior::new()),
            Behavior::Debug(DebugBehavior::default()),
            Behavior::custom(Inert),
        ];
        let names: Vec<_> = behaviors.iter().map(|b| b.name()).collect();
        assert_eq!(names, ["normal", "immortal", "modal", "debug", "inert"]);

        // Only ordinary bubbles take part in consumption
        let eaters: Vec<_> = behaviors.iter().map(|b| b.can_consume() && b.is_edible()).collect();
        assert_eq!(eaters, [true, false, false, false, true]);
    }
}
