/*
 * Lifecycle Module
 *
 * The per-bubble state machine: DIED -> BORN -> GROWN -> DIED -> ...
 * SICK is a side exit that runs the behavior's on_sick routine without moving
 * the main cycle.
 *
 * A transition holds the `transitioning` flag for its whole duration. A second
 * request while one is in flight is dropped, never queued. The flag is held by
 * an RAII guard, so a failing or abandoned hook cannot leave the bubble locked.
 */

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use futures::channel::mpsc;
use tracing::{debug, error, trace};

use crate::bubble::Bubble;
use crate::ActorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Died,
    Born,
    Grown,
    Sick,
}

impl Stage {
    // Fixed successor table for the main cycle
    pub fn successor(self) -> Stage {
        match self {
            Stage::Died => Stage::Born,
            Stage::Born => Stage::Grown,
            Stage::Grown => Stage::Died,
            // A sick bubble recovers by dying
            Stage::Sick => Stage::Died,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Died => "bubble-died",
            Stage::Born => "bubble-born",
            Stage::Grown => "bubble-grown",
            Stage::Sick => "bubble-sick",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageEvent {
    pub actor: ActorId,
    pub stage: Stage,
}

pub struct Lifecycle {
    stage: Cell<Stage>,
    transitioning: Cell<bool>,
    subscribers: RefCell<Vec<mpsc::UnboundedSender<StageEvent>>>,
}

// Clears `transitioning` when dropped
pub(crate) struct TransitionGuard<'a> {
    lifecycle: &'a Lifecycle,
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.lifecycle.transitioning.set(false);
    }
}

impl Lifecycle {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage: Cell::new(stage),
            transitioning: Cell::new(false),
            subscribers: RefCell::new(Vec::new()),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage.get()
    }

    pub fn is_at(&self, stage: Stage) -> bool {
        self.stage.get() == stage
    }

    pub fn is_stable(&self) -> bool {
        !self.transitioning.get()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StageEvent> {
        let (tx, rx) = mpsc::unbounded();
        self.subscribers.borrow_mut().push(tx);
        rx
    }

    pub(crate) fn try_begin(&self) -> Option<TransitionGuard<'_>> {
        if self.transitioning.replace(true) {
            return None;
        }
        Some(TransitionGuard { lifecycle: self })
    }

    fn settle(&self, stage: Stage) {
        if stage != Stage::Sick {
            self.stage.set(stage);
        }
    }

    fn notify(&self, event: StageEvent) {
        // Closed receivers are pruned as we go
        self.subscribers
            .borrow_mut()
            .retain(|subscriber| subscriber.unbounded_send(event).is_ok());
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new(Stage::Died)
    }
}

// Run the stage's hook, then do the bookkeeping whatever the hook returned
pub(crate) async fn run_stage(actor: &Rc<Bubble>, stage: Stage) {
    let behavior = actor.behavior();
    debug!(actor = %actor.id(), behavior = behavior.name(), %stage, "entering stage");

    let result = match stage {
        Stage::Born => behavior.on_born(actor).await,
        Stage::Grown => behavior.on_grown(actor).await,
        Stage::Died => behavior.on_death(actor).await,
        Stage::Sick => behavior.on_sick(actor).await,
    };

    if let Err(err) = result {
        error!(actor = %actor.id(), %stage, error = %err, "lifecycle hook failed");
    }

    let lifecycle = actor.lifecycle();
    lifecycle.settle(stage);

    let event = StageEvent {
        actor: actor.id(),
        stage,
    };
    lifecycle.notify(event);
    actor.publish(&event);
}

// Whether the behavior lets the cycle move on from the current stage
fn is_ready_for(actor: &Bubble, next: Stage) -> bool {
    let behavior = actor.behavior();
    match next {
        Stage::Grown => behavior.is_ready_to_grow(actor),
        Stage::Died => behavior.is_ready_to_die(actor),
        Stage::Born | Stage::Sick => true,
    }
}

pub(crate) async fn advance(actor: &Rc<Bubble>) -> bool {
    let Some(_guard) = actor.lifecycle().try_begin() else {
        trace!(actor = %actor.id(), "advance dropped: already transitioning");
        return false;
    };

    if actor.is_consumption_locked() {
        trace!(actor = %actor.id(), "advance dropped: consumption in progress");
        return false;
    }

    let next = actor.lifecycle().stage().successor();
    if !is_ready_for(actor, next) {
        trace!(actor = %actor.id(), %next, "advance refused by behavior");
        return false;
    }

    run_stage(actor, next).await;
    true
}

pub(crate) async fn force_transition(actor: &Rc<Bubble>, stage: Stage) -> bool {
    let Some(_guard) = actor.lifecycle().try_begin() else {
        trace!(actor = %actor.id(), %stage, "forced transition dropped: already transitioning");
        return false;
    };

    run_stage(actor, stage).await;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successor_table_cycles() {
        let mut stage = Stage::Died;
        let mut seen = Vec::new();
        for _ in 0..4 {
            stage = stage.successor();
            seen.push(stage);
        }
        assert_eq!(seen, vec![Stage::Born, Stage::Grown, Stage::Died, Stage::Born]);
    }

    #[test]
    fn guard_is_exclusive_and_released_on_drop() {
        let lifecycle = Lifecycle::default();
        let guard = lifecycle.try_begin();
        assert!(guard.is_some());
        assert!(!lifecycle.is_stable());
        assert!(lifecycle.try_begin().is_none());
        drop(guard);
        assert!(lifecycle.is_stable());
    }

    #[test]
    fn sick_does_not_move_the_cycle() {
        let lifecycle = Lifecycle::new(Stage::Grown);
        lifecycle.settle(Stage::Sick);
        assert!(lifecycle.is_at(Stage::Grown));
        lifecycle.settle(Stage::Died);
        assert!(lifecycle.is_at(Stage::Died));
    }

    #[test]
    fn notify_prunes_closed_subscribers() {
        let lifecycle = Lifecycle::default();
        let mut open = lifecycle.subscribe();
        drop(lifecycle.subscribe());

        let event = StageEvent {
            actor: ActorId(4),
            stage: Stage::Born,
        };
        lifecycle.notify(event);

        assert_eq!(lifecycle.subscribers.borrow().len(), 1);
        assert_eq!(open.try_next().unwrap(), Some(event));
    }
}
