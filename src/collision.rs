/*
 * Collision Module
 *
 * Consumption resolution between two bubbles: the eligibility guards, the
 * choice of eater, and the choreography that shrinks the eaten bubble into
 * the eater while the eater grows.
 *
 * Guards are checked once, at the moment of the attempt. Both parties then
 * hold a consumption lock until the choreography is over, so no other
 * consumption can touch either of them in the meantime.
 */

use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::bubble::Bubble;
use crate::geometry::{self, Position};
use crate::lifecycle::Stage;
use crate::tween::Channel;
use crate::ActorId;

/// Why a consumption attempt did not happen. Refusals are not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    SameActor,
    NoOverlap,
    Immortal,
    // The behavior opts out of being eaten or of eating
    Exempt,
    // Hidden, faded out, or resting at DIED
    Dormant,
    Transitioning,
    Locked,
    Animating,
}

/// The outcome of a successful consumption.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Meal {
    pub eater: ActorId,
    pub eaten: ActorId,
    pub eater_size: f32,
}

pub fn overlaps(a: &Bubble, b: &Bubble) -> bool {
    geometry::circles_overlap(a.position(), a.size(), b.position(), b.size())
}

/// The larger bubble eats the smaller; on a tie the initiator eats.
pub fn choose_eater<'a>(initiator: &'a Rc<Bubble>, other: &'a Rc<Bubble>) -> (&'a Rc<Bubble>, &'a Rc<Bubble>) {
    if other.size() > initiator.size() {
        (other, initiator)
    } else {
        (initiator, other)
    }
}

// A bubble that is mid-transition only counts as dormant once it is hidden
fn is_dormant(bubble: &Bubble) -> bool {
    !bubble.is_visible() || bubble.opacity() <= 0.0 || (bubble.is_at(Stage::Died) && bubble.is_stable())
}

fn is_animating(bubble: &Bubble) -> bool {
    bubble.is_animating(Channel::Move) || bubble.is_animating(Channel::Scale)
}

/// Decide whether `initiator` and `other` may take part in a consumption.
pub fn check(initiator: &Rc<Bubble>, other: &Rc<Bubble>) -> Result<(), Refusal> {
    if initiator.id() == other.id() {
        return Err(Refusal::SameActor);
    }

    if initiator.is_immortal() || other.is_immortal() {
        return Err(Refusal::Immortal);
    }

    let (eater, eaten) = choose_eater(initiator, other);
    if !eater.behavior().can_consume() || !eaten.behavior().is_edible() {
        return Err(Refusal::Exempt);
    }

    if is_dormant(initiator) || is_dormant(other) {
        return Err(Refusal::Dormant);
    }

    if initiator.is_consumption_locked() || other.is_consumption_locked() {
        return Err(Refusal::Locked);
    }

    // The initiator may be running its own routine; it can then only eat
    if !other.is_stable() || !eaten.is_stable() {
        return Err(Refusal::Transitioning);
    }

    if initiator.config().guard_animating && is_animating(other) {
        return Err(Refusal::Animating);
    }

    if !overlaps(initiator, other) {
        return Err(Refusal::NoOverlap);
    }

    Ok(())
}

/// Attempt a consumption between `initiator` and `other`. Returns the meal
/// when one of them ate the other, `None` when the attempt was refused.
pub async fn try_consume(initiator: &Rc<Bubble>, other: &Rc<Bubble>) -> Option<Meal> {
    if let Err(refusal) = check(initiator, other) {
        trace!(actor = %initiator.id(), other = %other.id(), ?refusal, "consumption refused");
        return None;
    }

    let (eater, eaten) = choose_eater(initiator, other);
    let _eater_lock = eater.try_lock_consumption()?;
    let _eaten_lock = eaten.try_lock_consumption()?;

    debug!(eater = %eater.id(), eaten = %eaten.id(), "consuming");

    let config = eater.config();
    let d = config.default_animation_duration();
    let min_size = config.min_size;
    let grown = eater.size() + eaten.size() * config.size_grow_rate;

    // Aim the shrunken bubble at the eater's centre
    let centre = eater.center();
    let sink = Position::new(centre.x - min_size / 2.0, centre.y - min_size / 2.0);

    let shrink = async {
        let (scaled, faded, moved) = futures::join!(
            eaten.scale_to(min_size, d, true),
            eaten.fade_to(0.0, d),
            eaten.goto(sink, d, true),
        );
        scaled.and(faded).and(moved)
    };
    let grow = eater.scale_to(grown, d, false);

    let (shrunk, grew) = futures::join!(shrink, grow);
    if let Err(err) = shrunk.and(grew) {
        warn!(eater = %eater.id(), eaten = %eaten.id(), error = %err, "consumption animation interrupted");
    }

    let settle = async {
        match eater.idle_position() {
            Ok(idle) => eater.goto(idle, eater.move_duration(), false).await,
            Err(err) => Err(err),
        }
    };
    let (died, settled) = futures::join!(eaten.force_transition(Stage::Died), settle);
    if !died {
        warn!(eaten = %eaten.id(), "eaten bubble was already transitioning");
    }
    if let Err(err) = settled {
        warn!(eater = %eater.id(), error = %err, "eater could not return to idle");
    }

    eater.behavior().record_meal();

    let meal = Meal {
        eater: eater.id(),
        eaten: eaten.id(),
        eater_size: eater.size(),
    };
    debug!(eater = %meal.eater, eaten = %meal.eaten, size = meal.eater_size, "consumed");
    Some(meal)
}

/// Try to consume every sibling in container order. Stops early once the
/// actor itself has been eaten or hidden.
pub async fn consume_overlapping(actor: &Rc<Bubble>) -> Vec<Meal> {
    let mut meals = Vec::new();

    for sibling in actor.siblings() {
        if !actor.is_visible() {
            break;
        }

        if let Some(meal) = try_consume(actor, &sibling).await {
            let eaten_self = meal.eaten == actor.id();
            meals.push(meal);
            if eaten_self {
                break;
            }
        }
    }

    meals
}
