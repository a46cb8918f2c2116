/*
 * Space Module
 *
 * What a bubble needs from its container: the rectangle it lives in, its
 * siblings in a stable order, and somewhere to publish lifecycle events.
 * The engine only ever reads from a space.
 */

use std::rc::Rc;

use crate::bubble::Bubble;
use crate::geometry::SpaceRect;
use crate::lifecycle::StageEvent;
use crate::ActorId;

pub trait Space {
    fn bounding_rect(&self) -> SpaceRect;

    /// Every other bubble in the space, in the container's order.
    fn siblings_of(&self, actor: ActorId) -> Vec<Rc<Bubble>>;

    // Container-level event bus
    fn publish(&self, _event: &StageEvent) {}
}
