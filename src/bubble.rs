/*
 * Bubble Module
 *
 * This module defines the Bubble actor: one circle with an authoritative
 * position, size and opacity, a lifecycle, a behavior and a move queue.
 *
 * Every visual change goes through the tween port and is committed to the
 * bubble's own fields once the tween has settled; the render layer is only
 * ever a projection of these numbers.
 */

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures::channel::mpsc;
use futures::executor::LocalSpawner;
use futures::task::LocalSpawnExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{trace, warn};

use crate::behavior::{Behavior, HookResult, ImmortalBehavior, NormalBehavior};
use crate::config::BubbleConfig;
use crate::error::BubbleError;
use crate::geometry::{self, Position, SpaceRect};
use crate::lifecycle::{self, Lifecycle, Stage, StageEvent};
use crate::move_queue::{MoveQueue, MoveRequest};
use crate::space::Space;
use crate::tween::{Channel, TweenPort, Visual};
use crate::ActorId;

const BREATH_AMPLITUDE: f32 = 2.0;
const BREATH_PERIOD: Duration = Duration::from_millis(2000);

// The pieces only a container can provide
#[derive(Clone)]
pub struct BubbleContext {
    pub id: ActorId,
    pub space: Weak<dyn Space>,
    pub port: Rc<dyn TweenPort>,
    pub spawner: LocalSpawner,
    pub seed: u64,
}

pub struct BubbleBuilder {
    config: BubbleConfig,
    immortal: bool,
    position: Option<Position>,
    size: Option<f32>,
    opacity: Option<f32>,
    stage: Stage,
    behavior_key: Option<String>,
    behavior: Option<Behavior>,
    context: Option<BubbleContext>,
}

impl Default for BubbleBuilder {
    fn default() -> Self {
        Self {
            config: BubbleConfig::default(),
            immortal: false,
            position: None,
            size: None,
            opacity: None,
            stage: Stage::Died,
            behavior_key: None,
            behavior: None,
            context: None,
        }
    }
}

impl BubbleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: BubbleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn immortal(mut self, immortal: bool) -> Self {
        self.immortal = immortal;
        self
    }

    pub fn position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Position::new(x, y));
        self
    }

    pub fn size(mut self, size: f32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    // Resolved by the container's registry
    pub fn behavior_key(mut self, key: impl Into<String>) -> Self {
        self.behavior_key = Some(key.into());
        self
    }

    pub fn behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = Some(behavior);
        self
    }

    pub fn context(mut self, context: BubbleContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn get_config(&self) -> &BubbleConfig {
        &self.config
    }

    pub fn get_behavior_key(&self) -> Option<&str> {
        self.behavior_key.as_deref()
    }

    pub fn has_behavior(&self) -> bool {
        self.behavior.is_some()
    }

    pub fn is_immortal(&self) -> bool {
        self.immortal
    }

    pub fn build(self) -> Result<Rc<Bubble>, BubbleError> {
        self.config.validate()?;

        let context = self.context.ok_or(BubbleError::MissingContainer)?;
        let space = context.space.upgrade().ok_or(BubbleError::MissingContainer)?;
        let rect = space.bounding_rect();

        let config = self.config;
        let size = config.clamp_size(self.size.unwrap_or(config.init_size));
        let declared = self.position.unwrap_or(Position::ZERO);
        let position = geometry::clamp_to_space(declared, size, &rect, config.space_padding);
        let opacity = self.opacity.unwrap_or(config.init_opacity).clamp(0.0, 1.0);

        let behavior = match self.behavior {
            Some(behavior) => behavior,
            None if self.immortal => Behavior::Immortal(ImmortalBehavior::new()),
            None => Behavior::Normal(NormalBehavior::new(config.growth_policy)),
        };

        let visual = Visual::new(position, size, opacity);
        context.port.sync(context.id, visual);

        Ok(Rc::new(Bubble {
            id: context.id,
            immortal: self.immortal,
            declared_position: declared,
            state: RefCell::new(visual),
            behavior: RefCell::new(Rc::new(behavior)),
            lifecycle: Lifecycle::new(self.stage),
            moves: MoveQueue::new(),
            consumption_locked: Cell::new(false),
            space: context.space,
            port: context.port,
            spawner: context.spawner,
            rng: RefCell::new(StdRng::seed_from_u64(context.seed)),
            config,
        }))
    }
}

pub struct Bubble {
    id: ActorId,
    config: BubbleConfig,
    immortal: bool,
    declared_position: Position,
    state: RefCell<Visual>,
    behavior: RefCell<Rc<Behavior>>,
    lifecycle: Lifecycle,
    moves: MoveQueue,
    consumption_locked: Cell<bool>,
    space: Weak<dyn Space>,
    port: Rc<dyn TweenPort>,
    spawner: LocalSpawner,
    rng: RefCell<StdRng>,
}

// Marks a bubble as taking part in a consumption until dropped
pub(crate) struct ConsumptionLock<'a> {
    bubble: &'a Bubble,
}

impl Drop for ConsumptionLock<'_> {
    fn drop(&mut self) {
        self.bubble.consumption_locked.set(false);
    }
}

impl Bubble {
    pub fn builder() -> BubbleBuilder {
        BubbleBuilder::new()
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn config(&self) -> &BubbleConfig {
        &self.config
    }

    pub fn is_immortal(&self) -> bool {
        self.immortal
    }

    // Where the container asked this bubble to be, before any clamping
    pub fn declared_position(&self) -> Position {
        self.declared_position
    }

    pub fn position(&self) -> Position {
        self.state.borrow().position
    }

    pub fn size(&self) -> f32 {
        self.state.borrow().size
    }

    pub fn opacity(&self) -> f32 {
        self.state.borrow().opacity
    }

    pub fn is_visible(&self) -> bool {
        self.state.borrow().visible
    }

    pub fn visual(&self) -> Visual {
        *self.state.borrow()
    }

    pub fn center(&self) -> Position {
        let state = self.state.borrow();
        geometry::center_of(state.position, state.size)
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn stage(&self) -> Stage {
        self.lifecycle.stage()
    }

    pub fn is_at(&self, stage: Stage) -> bool {
        self.lifecycle.is_at(stage)
    }

    pub fn is_stable(&self) -> bool {
        self.lifecycle.is_stable()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StageEvent> {
        self.lifecycle.subscribe()
    }

    pub fn behavior(&self) -> Rc<Behavior> {
        self.behavior.borrow().clone()
    }

    pub fn is_expanded(&self) -> bool {
        self.behavior().is_expanded()
    }

    pub fn is_animating(&self, channel: Channel) -> bool {
        self.port.is_animating(self.id, channel)
    }

    pub fn space_rect(&self) -> Result<SpaceRect, BubbleError> {
        self.space
            .upgrade()
            .map(|space| space.bounding_rect())
            .ok_or(BubbleError::ContainerGone(self.id))
    }

    pub fn siblings(&self) -> Vec<Rc<Bubble>> {
        match self.space.upgrade() {
            Some(space) => space.siblings_of(self.id),
            None => Vec::new(),
        }
    }

    pub(crate) fn publish(&self, event: &StageEvent) {
        if let Some(space) = self.space.upgrade() {
            space.publish(event);
        }
    }

    // Lifecycle

    /// Move to the next stage of the cycle. Returns false when the request was
    /// dropped (already transitioning, being consumed, or not ready).
    pub async fn advance(self: &Rc<Self>) -> bool {
        lifecycle::advance(self).await
    }

    pub async fn force_transition(self: &Rc<Self>, stage: Stage) -> bool {
        lifecycle::force_transition(self, stage).await
    }

    pub async fn sicken(self: &Rc<Self>) -> bool {
        lifecycle::force_transition(self, Stage::Sick).await
    }

    // Swap the behavior: teardown on the old one, setup on the new one
    pub async fn learn(self: &Rc<Self>, behavior: Behavior) -> HookResult {
        let old = self.behavior();
        if let Err(err) = old.on_forgot(self).await {
            warn!(actor = %self.id, behavior = old.name(), error = %err, "teardown failed");
        }

        let new = Rc::new(behavior);
        *self.behavior.borrow_mut() = new.clone();
        new.on_learned(self).await
    }

    // Input

    pub async fn click(self: &Rc<Self>) -> HookResult {
        self.behavior().on_click(self).await
    }

    pub async fn touch(self: &Rc<Self>, other: &Rc<Bubble>) -> HookResult {
        self.behavior().on_touch(self, other).await
    }

    pub async fn long_press(self: &Rc<Self>, at: Position) -> HookResult {
        self.behavior().on_long_press(self, at).await
    }

    pub async fn drag(self: &Rc<Self>, to: Position) -> HookResult {
        self.behavior().on_drag(self, to).await
    }

    pub async fn pointer_cancel(self: &Rc<Self>) -> HookResult {
        self.behavior().on_pointer_cancel(self).await
    }

    // Visual commands

    /// Queue a move. The place in line is taken at call time; the returned
    /// future resolves once this particular move has been executed, so moves
    /// on one bubble run strictly in call order.
    pub fn goto(
        &self,
        target: Position,
        duration: Duration,
        force: bool,
    ) -> impl Future<Output = Result<(), BubbleError>> + '_ {
        let request = MoveRequest::new(target, duration, force);
        let ticket = self.moves.reserve();
        async move {
            let _turn = ticket.ready().await;
            self.execute_move(request).await
        }
    }

    async fn execute_move(&self, request: MoveRequest) -> Result<(), BubbleError> {
        let target = if request.force {
            request.target
        } else {
            let rect = self.space_rect()?;
            geometry::clamp_to_space(request.target, self.size(), &rect, self.config.space_padding)
        };

        let from = self.position();
        self.port.move_to(self.id, from, target, request.duration).await?;
        self.state.borrow_mut().position = target;
        trace!(actor = %self.id, x = target.x, y = target.y, "moved");
        Ok(())
    }

    /// Animate the diameter. Unless forced, the size is clamped to the
    /// configured bounds and the position is corrected afterwards so the
    /// whole circle stays inside the padded space.
    pub async fn scale_to(&self, size: f32, duration: Duration, force: bool) -> Result<(), BubbleError> {
        let target = if force { size.max(0.0) } else { self.config.clamp_size(size) };
        let from = self.size();
        self.port.scale_to(self.id, from, target, duration).await?;
        self.state.borrow_mut().size = target;

        if !force {
            let rect = self.space_rect()?;
            let position = self.position();
            let safe = geometry::clamp_to_space(position, target, &rect, self.config.space_padding);
            if safe != position {
                self.goto(safe, Duration::ZERO, true).await?;
            }
        }
        Ok(())
    }

    pub async fn fade_to(&self, opacity: f32, duration: Duration) -> Result<(), BubbleError> {
        let target = opacity.clamp(0.0, 1.0);
        let from = self.opacity();
        self.port.fade_to(self.id, from, target, duration).await?;
        self.state.borrow_mut().opacity = target;
        Ok(())
    }

    pub fn set_visible(&self, visible: bool) {
        self.state.borrow_mut().visible = visible;
        self.port.set_visible(self.id, visible);
    }

    // Overshoot to `peak`, dip below, settle back at the current size
    pub async fn bounce(&self, peak: Option<f32>) -> Result<(), BubbleError> {
        let base = self.size();
        let peak = peak.unwrap_or(base * 1.1);
        let d = self.config.default_animation_duration();
        self.scale_to(peak, d.mul_f32(0.5), true).await?;
        self.scale_to(base * 0.9, d.mul_f32(0.3), true).await?;
        self.scale_to(base, d.mul_f32(0.2), true).await
    }

    // Idle sway drawn on top of the position
    pub fn breathe(&self) {
        self.port.breathe(self.id, BREATH_AMPLITUDE, BREATH_PERIOD);
    }

    pub fn stop_breathing(&self) {
        self.port.stop_breathing(self.id);
    }

    pub fn is_breathing(&self) -> bool {
        self.port.is_breathing(self.id)
    }

    pub async fn sleep(&self, duration: Duration) {
        self.port.sleep(duration).await;
    }

    pub fn spawn_detached<F>(&self, future: F) -> Result<(), BubbleError>
    where
        F: Future<Output = ()> + 'static,
    {
        self.spawner.spawn_local(future)?;
        Ok(())
    }

    // Consumption bookkeeping

    pub fn is_consumption_locked(&self) -> bool {
        self.consumption_locked.get()
    }

    pub(crate) fn try_lock_consumption(&self) -> Option<ConsumptionLock<'_>> {
        if self.consumption_locked.replace(true) {
            return None;
        }
        Some(ConsumptionLock { bubble: self })
    }

    // Randomness and placement

    pub fn random_between(&self, lo: f32, hi: f32) -> f32 {
        if hi <= lo {
            return lo;
        }
        self.rng.borrow_mut().gen_range(lo..=hi)
    }

    pub fn random_duration(&self, lo: Duration, hi: Duration) -> Duration {
        if hi <= lo {
            return lo;
        }
        self.rng.borrow_mut().gen_range(lo..=hi)
    }

    // True with probability `p`
    pub fn roll(&self, p: f32) -> bool {
        self.rng.borrow_mut().gen::<f32>() < p
    }

    pub fn random_birth_size(&self) -> f32 {
        let lo = self.config.min_size;
        let hi = (lo + self.config.size_random_rate).min(self.config.max_size);
        self.random_between(lo, hi)
    }

    pub fn random_birth_position(&self) -> Result<Position, BubbleError> {
        let rect = self.space_rect()?;
        let (min, max) = geometry::birth_region(self.size(), &rect, &self.config);
        Ok(Position::new(
            self.random_between(min.x, max.x),
            self.random_between(min.y, max.y),
        ))
    }

    // Bigger bubbles are more opaque
    pub fn birth_opacity(&self) -> f32 {
        let ratio = geometry::size_ratio(self.size(), &self.config);
        self.config.min_opacity + ratio * (self.config.max_opacity - self.config.min_opacity)
    }

    pub fn idle_position(&self) -> Result<Position, BubbleError> {
        let rect = self.space_rect()?;
        Ok(geometry::idle_position(self.position(), self.size(), &rect, &self.config))
    }

    pub fn top_position(&self) -> Result<Position, BubbleError> {
        let rect = self.space_rect()?;
        Ok(geometry::top_position(self.position(), self.size(), &rect, &self.config))
    }

    // Bigger bubbles move slower
    pub fn move_duration(&self) -> Duration {
        let ratio = geometry::size_ratio(self.size(), &self.config);
        let min = self.config.min_move_duration();
        let max = self.config.max_move_duration();
        min + (max - min).mul_f32(ratio)
    }
}

impl std::fmt::Debug for Bubble {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Bubble")
            .field("id", &self.id)
            .field("stage", &self.lifecycle.stage())
            .field("behavior", &self.behavior.borrow().name())
            .field("position", &state.position)
            .field("size", &state.size)
            .field("opacity", &state.opacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn building_without_a_container_fails_fast() {
        let result = Bubble::builder().position(10.0, 10.0).build();
        assert!(matches!(result, Err(BubbleError::MissingContainer)));
    }

    #[test]
    fn invalid_config_is_reported_before_the_container() {
        let config = BubbleConfig {
            max_opacity: 2.0,
            ..BubbleConfig::default()
        };
        let result = Bubble::builder().config(config).build();
        assert!(matches!(result, Err(BubbleError::Config(_))));
    }
}
