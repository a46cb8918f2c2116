/*
 * Glass Module
 *
 * The reference container. A Glass owns the ordered list of bubbles, is the
 * Space they live in, drives the single-threaded executor their routines run
 * on, and owns the Timeline that animates them.
 *
 * Time is virtual: nothing moves until the host calls `advance_clock` or
 * `step` with a frame delta. After every clock tick the executor is run until
 * no task can make progress, so one frame fully settles before the next.
 */

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::channel::mpsc;
use futures::executor::{LocalPool, LocalSpawner};
use futures::task::{ArcWake, LocalSpawnExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace, warn};

use crate::bubble::{Bubble, BubbleBuilder, BubbleContext};
use crate::config::GlassConfig;
use crate::error::BubbleError;
use crate::geometry::{self, Position, SpaceRect};
use crate::lifecycle::{Stage, StageEvent};
use crate::registry::{BehaviorRegistry, DEFAULT_KEY, IMMORTAL_KEY};
use crate::space::Space;
use crate::timeline::Timeline;
use crate::tween::{TweenPort, Visual};
use crate::ActorId;

/// What the render layer needs to draw one bubble.
#[derive(Debug, Clone, PartialEq)]
pub struct BubbleSnapshot {
    pub id: ActorId,
    pub visual: Visual,
    pub stage: Stage,
    pub transitioning: bool,
    pub behavior: &'static str,
    pub immortal: bool,
    pub expanded: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub died: usize,
    pub born: usize,
    pub grown: usize,
    pub transitioning: usize,
}

// Records whether the future polled by `run_until` has been woken
#[derive(Default)]
struct WakeFlag(AtomicBool);

impl ArcWake for WakeFlag {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.store(true, Ordering::SeqCst);
    }
}

pub struct Glass {
    config: RefCell<GlassConfig>,
    rect: Cell<SpaceRect>,
    bubbles: RefCell<Vec<Rc<Bubble>>>,
    registry: BehaviorRegistry,
    timeline: Rc<Timeline>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
    rng: RefCell<StdRng>,
    next_id: Cell<u32>,
    subscribers: RefCell<Vec<mpsc::UnboundedSender<StageEvent>>>,
    elapsed: Cell<Duration>,
    since_nudge: Cell<Duration>,
    started: Cell<bool>,
    paused: Cell<bool>,
    this: Weak<Glass>,
}

impl Glass {
    pub fn new(rect: SpaceRect, config: GlassConfig) -> Rc<Self> {
        Self::with_parts(rect, config, BehaviorRegistry::default(), Rc::new(Timeline::new()))
    }

    pub fn with_registry(rect: SpaceRect, config: GlassConfig, registry: BehaviorRegistry) -> Rc<Self> {
        Self::with_parts(rect, config, registry, Rc::new(Timeline::new()))
    }

    pub fn with_parts(
        rect: SpaceRect,
        config: GlassConfig,
        registry: BehaviorRegistry,
        timeline: Rc<Timeline>,
    ) -> Rc<Self> {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        let rng = StdRng::seed_from_u64(config.seed);

        Rc::new_cyclic(|this| Glass {
            config: RefCell::new(config),
            rect: Cell::new(rect),
            bubbles: RefCell::new(Vec::new()),
            registry,
            timeline,
            pool: RefCell::new(pool),
            spawner,
            rng: RefCell::new(rng),
            next_id: Cell::new(1),
            subscribers: RefCell::new(Vec::new()),
            elapsed: Cell::new(Duration::ZERO),
            since_nudge: Cell::new(Duration::ZERO),
            started: Cell::new(false),
            paused: Cell::new(false),
            this: this.clone(),
        })
    }

    pub fn config(&self) -> GlassConfig {
        self.config.borrow().clone()
    }

    pub fn set_nudge_interval(&self, interval_ms: u64) {
        self.config.borrow_mut().nudge_interval_ms = interval_ms;
    }

    pub fn set_autoplay(&self, autoplay: bool) {
        self.config.borrow_mut().autoplay = autoplay;
    }

    pub fn timeline(&self) -> &Rc<Timeline> {
        &self.timeline
    }

    pub fn registry(&self) -> &BehaviorRegistry {
        &self.registry
    }

    pub fn rect(&self) -> SpaceRect {
        self.rect.get()
    }

    pub fn now(&self) -> Duration {
        self.timeline.now()
    }

    // Actors

    /// Resolve the builder's behavior, give it an id and a seeded RNG, and
    /// add the new bubble at the end of the container order.
    pub fn spawn_bubble(&self, builder: BubbleBuilder) -> Result<Rc<Bubble>, BubbleError> {
        let builder = if builder.has_behavior() {
            builder
        } else {
            let key = match builder.get_behavior_key() {
                Some(key) => key.to_owned(),
                None if builder.is_immortal() => IMMORTAL_KEY.to_owned(),
                None => DEFAULT_KEY.to_owned(),
            };
            let behavior = self.registry.resolve(&key, builder.get_config())?;
            builder.behavior(behavior)
        };

        let id = ActorId(self.next_id.get());
        let space: Weak<dyn Space> = self.this.clone();
        let port: Rc<dyn TweenPort> = self.timeline.clone();
        let context = BubbleContext {
            id,
            space,
            port,
            spawner: self.spawner.clone(),
            seed: self.rng.borrow_mut().gen(),
        };

        let bubble = builder.context(context).build()?;
        self.next_id.set(id.0 + 1);
        self.bubbles.borrow_mut().push(bubble.clone());

        debug!(actor = %id, behavior = bubble.behavior().name(), "bubble spawned");
        Ok(bubble)
    }

    pub fn bubbles(&self) -> Vec<Rc<Bubble>> {
        self.bubbles.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.bubbles.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.borrow().is_empty()
    }

    pub fn get(&self, id: ActorId) -> Option<Rc<Bubble>> {
        self.bubbles.borrow().iter().find(|b| b.id() == id).cloned()
    }

    /// Take a bubble out of the container. Its tweens are cancelled; any
    /// routine still running on it ends with a cancelled-tween error.
    pub fn remove(&self, id: ActorId) -> Option<Rc<Bubble>> {
        let removed = {
            let mut bubbles = self.bubbles.borrow_mut();
            let index = bubbles.iter().position(|b| b.id() == id)?;
            bubbles.remove(index)
        };
        self.timeline.detach(id);
        debug!(actor = %id, "bubble removed");
        Some(removed)
    }

    // Resize the space and pull every bubble back inside it
    pub fn resize(&self, rect: SpaceRect) -> Result<(), BubbleError> {
        self.rect.set(rect);
        for bubble in self.bubbles() {
            let position = bubble.position();
            let safe = geometry::clamp_to_space(position, bubble.size(), &rect, bubble.config().space_padding);
            if safe != position {
                self.spawn(async move {
                    if let Err(err) = bubble.goto(safe, Duration::ZERO, true).await {
                        warn!(actor = %bubble.id(), error = %err, "could not re-clamp after resize");
                    }
                })?;
            }
        }
        Ok(())
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StageEvent> {
        let (tx, rx) = mpsc::unbounded();
        self.subscribers.borrow_mut().push(tx);
        rx
    }

    // Driving

    pub fn spawn<F>(&self, future: F) -> Result<(), BubbleError>
    where
        F: Future<Output = ()> + 'static,
    {
        self.spawner.spawn_local(future)?;
        Ok(())
    }

    fn run_pool(&self) {
        self.pool.borrow_mut().run_until_stalled();
    }

    /// Move the animation clock forward by `dt` and let every task that was
    /// waiting on it run until it stalls again.
    pub fn advance_clock(&self, dt: Duration) {
        self.run_pool();
        self.timeline.advance(dt);
        self.run_pool();
    }

    pub fn run_for(&self, total: Duration, frame: Duration) {
        let mut remaining = total;
        while !remaining.is_zero() {
            let dt = frame.min(remaining);
            self.advance_clock(dt);
            remaining -= dt;
        }
    }

    /// Drive the container until `future` completes, one `frame` at a time.
    /// Returns `None` when it has not completed after `max_frames` frames.
    pub fn run_until<F: Future>(&self, future: F, frame: Duration, max_frames: usize) -> Option<F::Output> {
        futures::pin_mut!(future);
        let flag = Arc::new(WakeFlag(AtomicBool::new(true)));
        let waker = futures::task::waker(flag.clone());
        let mut cx = Context::from_waker(&waker);

        let mut frames = 0;
        loop {
            // Poll whenever the future was woken, until it and the pool both stall
            while flag.0.swap(false, Ordering::SeqCst) {
                if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
                    return Some(output);
                }
                self.run_pool();
            }

            if frames >= max_frames {
                trace!(frames, "run_until gave up");
                return None;
            }

            self.timeline.advance(frame);
            self.run_pool();
            frames += 1;
        }
    }

    /// One host frame: tick the clock and, when autoplay is on, wake every
    /// bubble once the startup delay is over and then nudge a random bubble
    /// every nudge interval.
    pub fn step(&self, dt: Duration) -> Result<(), BubbleError> {
        if self.paused.get() {
            return Ok(());
        }

        self.advance_clock(dt);

        let config = self.config();
        if !config.autoplay {
            return Ok(());
        }

        self.elapsed.set(self.elapsed.get() + dt);
        if self.elapsed.get() < config.startup_delay() {
            return Ok(());
        }

        if !self.started.replace(true) {
            self.wake_all()?;
            return Ok(());
        }

        let interval = config.nudge_interval();
        if interval.is_zero() {
            return Ok(());
        }

        let mut since = self.since_nudge.get() + dt;
        while since >= interval {
            self.nudge()?;
            since -= interval;
        }
        self.since_nudge.set(since);
        Ok(())
    }

    /// Advance one randomly chosen bubble. Immortal and expanded bubbles are
    /// never picked.
    pub fn nudge(&self) -> Result<Option<ActorId>, BubbleError> {
        let candidates: Vec<Rc<Bubble>> = self
            .bubbles
            .borrow()
            .iter()
            .filter(|b| !b.is_immortal() && !b.is_expanded())
            .cloned()
            .collect();

        if candidates.is_empty() {
            return Ok(None);
        }

        let index = self.rng.borrow_mut().gen_range(0..candidates.len());
        let bubble = candidates[index].clone();
        let id = bubble.id();
        trace!(actor = %id, "nudged");

        self.spawn(async move {
            bubble.advance().await;
        })?;
        Ok(Some(id))
    }

    /// Advance every dormant bubble one after another, with a small random
    /// pause between them.
    pub fn wake_all(&self) -> Result<(), BubbleError> {
        let config = self.config();
        let min = Duration::from_millis(config.wake_stagger_min_ms);
        let max = Duration::from_millis(config.wake_stagger_max_ms);

        let dormant: Vec<(Rc<Bubble>, Duration)> = self
            .bubbles()
            .into_iter()
            .filter(|b| b.is_at(Stage::Died) && b.is_stable())
            .map(|b| {
                let stagger = if max > min {
                    self.rng.borrow_mut().gen_range(min..=max)
                } else {
                    min
                };
                (b, stagger)
            })
            .collect();

        debug!(count = dormant.len(), "waking bubbles");

        let timeline = self.timeline.clone();
        let spawner = self.spawner.clone();
        self.spawn(async move {
            for (bubble, stagger) in dormant {
                timeline.sleep(stagger).await;
                let id = bubble.id();
                if let Err(err) = spawner.spawn_local(async move {
                    bubble.advance().await;
                }) {
                    warn!(actor = %id, error = %err, "could not wake bubble");
                }
            }
        })
    }

    pub fn pause(&self, paused: bool) {
        self.paused.set(paused);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.get()
    }

    // Hit-testing and input

    // Where the bubble is drawn right now, mid-tween included
    fn projection(&self, bubble: &Bubble) -> Visual {
        self.timeline.visual(bubble.id()).unwrap_or_else(|| bubble.visual())
    }

    /// The top-most visible bubble whose circle contains `point`.
    pub fn bubble_at(&self, point: Position) -> Option<Rc<Bubble>> {
        self.bubbles
            .borrow()
            .iter()
            .rev()
            .find(|bubble| {
                let visual = self.projection(bubble);
                let radius = visual.size / 2.0;
                visual.visible
                    && geometry::center_of(visual.drawn_position(), visual.size).distance_squared(point) <= radius * radius
            })
            .cloned()
    }

    fn dispatch<F, Fut>(&self, id: ActorId, what: &'static str, input: F) -> Result<bool, BubbleError>
    where
        F: FnOnce(Rc<Bubble>) -> Fut,
        Fut: Future<Output = Result<(), BubbleError>> + 'static,
    {
        let Some(bubble) = self.get(id) else {
            return Ok(false);
        };

        let routine = input(bubble);
        self.spawn(async move {
            if let Err(err) = routine.await {
                warn!(actor = %id, input = what, error = %err, "input handler failed");
            }
        })?;
        Ok(true)
    }

    pub fn click(&self, id: ActorId) -> Result<bool, BubbleError> {
        self.dispatch(id, "click", |bubble| async move { bubble.click().await })
    }

    pub fn long_press(&self, id: ActorId, at: Position) -> Result<bool, BubbleError> {
        self.dispatch(id, "long-press", move |bubble| async move { bubble.long_press(at).await })
    }

    pub fn drag(&self, id: ActorId, to: Position) -> Result<bool, BubbleError> {
        self.dispatch(id, "drag", move |bubble| async move { bubble.drag(to).await })
    }

    pub fn pointer_cancel(&self, id: ActorId) -> Result<bool, BubbleError> {
        self.dispatch(id, "pointer-cancel", |bubble| async move { bubble.pointer_cancel().await })
    }

    // Projection

    pub fn snapshot(&self) -> Vec<BubbleSnapshot> {
        self.bubbles
            .borrow()
            .iter()
            .map(|bubble| BubbleSnapshot {
                id: bubble.id(),
                visual: self.projection(bubble),
                stage: bubble.stage(),
                transitioning: !bubble.is_stable(),
                behavior: bubble.behavior().name(),
                immortal: bubble.is_immortal(),
                expanded: bubble.is_expanded(),
            })
            .collect()
    }

    pub fn stage_counts(&self) -> StageCounts {
        let mut counts = StageCounts::default();
        for bubble in self.bubbles.borrow().iter() {
            match bubble.stage() {
                Stage::Died => counts.died += 1,
                Stage::Born => counts.born += 1,
                Stage::Grown => counts.grown += 1,
                Stage::Sick => {}
            }
            if !bubble.is_stable() {
                counts.transitioning += 1;
            }
        }
        counts
    }
}

impl Space for Glass {
    fn bounding_rect(&self) -> SpaceRect {
        self.rect.get()
    }

    fn siblings_of(&self, actor: ActorId) -> Vec<Rc<Bubble>> {
        self.bubbles
            .borrow()
            .iter()
            .filter(|b| b.id() != actor)
            .cloned()
            .collect()
    }

    fn publish(&self, event: &StageEvent) {
        self.subscribers
            .borrow_mut()
            .retain(|subscriber| subscriber.unbounded_send(*event).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{Behavior, DebugBehavior};

    const FRAME: Duration = Duration::from_millis(16);

    fn glass() -> Rc<Glass> {
        let config = GlassConfig {
            autoplay: false,
            ..GlassConfig::default()
        };
        Glass::new(SpaceRect::from_size(800.0, 600.0), config)
    }

    #[test]
    fn ids_follow_spawn_order() {
        let glass = glass();
        let a = glass.spawn_bubble(Bubble::builder()).unwrap();
        let b = glass.spawn_bubble(Bubble::builder()).unwrap();
        assert_eq!(a.id(), ActorId(1));
        assert_eq!(b.id(), ActorId(2));
        assert_eq!(glass.len(), 2);
    }

    #[test]
    fn behavior_key_resolution() {
        let glass = glass();
        let normal = glass.spawn_bubble(Bubble::builder()).unwrap();
        let immortal = glass.spawn_bubble(Bubble::builder().immortal(true)).unwrap();
        let modal = glass.spawn_bubble(Bubble::builder().behavior_key("modal")).unwrap();
        assert_eq!(normal.behavior().name(), "normal");
        assert_eq!(immortal.behavior().name(), "immortal");
        assert_eq!(modal.behavior().name(), "modal");

        let unknown = glass.spawn_bubble(Bubble::builder().behavior_key("nope"));
        assert!(matches!(unknown, Err(BubbleError::UnknownBehavior(_))));
        assert_eq!(glass.len(), 3);
    }

    #[test]
    fn siblings_exclude_self_and_keep_order() {
        let glass = glass();
        let a = glass.spawn_bubble(Bubble::builder()).unwrap();
        let b = glass.spawn_bubble(Bubble::builder()).unwrap();
        let c = glass.spawn_bubble(Bubble::builder()).unwrap();
        let ids: Vec<ActorId> = b.siblings().iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![a.id(), c.id()]);
    }

    #[test]
    fn run_until_gives_up_on_a_future_that_never_completes() {
        let glass = glass();
        let result = glass.run_until(futures::future::pending::<()>(), FRAME, 10);
        assert!(result.is_none());
        assert_eq!(glass.now(), FRAME * 10);
    }

    #[test]
    fn run_until_returns_once_the_routine_settles() {
        let glass = glass();
        let bubble = glass.spawn_bubble(Bubble::builder().position(100.0, 100.0)).unwrap();
        let target = Position::new(300.0, 200.0);
        let done = glass.run_until(bubble.goto(target, Duration::from_millis(100), false), FRAME, 100);
        assert!(matches!(done, Some(Ok(()))));
        assert_eq!(bubble.position(), target);
    }

    #[test]
    fn nudge_skips_immortal_bubbles() {
        let glass = glass();
        glass.spawn_bubble(Bubble::builder().immortal(true)).unwrap();
        assert_eq!(glass.nudge().unwrap(), None);

        let normal = glass.spawn_bubble(Bubble::builder()).unwrap();
        for _ in 0..5 {
            assert_eq!(glass.nudge().unwrap(), Some(normal.id()));
        }
    }

    #[test]
    fn nudge_brings_a_dormant_bubble_to_life() {
        let glass = glass();
        let bubble = glass.spawn_bubble(Bubble::builder()).unwrap();
        glass.nudge().unwrap();
        glass.run_for(Duration::from_secs(2), FRAME);
        assert!(bubble.is_at(Stage::Born));
        assert!(bubble.is_stable());
    }

    #[test]
    fn wake_all_births_every_dormant_bubble() {
        let glass = glass();
        for x in 0..3 {
            glass
                .spawn_bubble(Bubble::builder().position(50.0 + 250.0 * x as f32, 50.0))
                .unwrap();
        }
        glass.wake_all().unwrap();
        glass.run_for(Duration::from_secs(3), FRAME);

        let counts = glass.stage_counts();
        assert_eq!(counts.transitioning, 0);
        assert_eq!(counts.born + counts.died, 3);
        assert!(counts.born >= 1);
    }

    #[test]
    fn container_events_are_published() {
        let glass = glass();
        let mut events = glass.subscribe();
        let bubble = glass.spawn_bubble(Bubble::builder()).unwrap();
        glass.run_until(bubble.advance(), FRAME, 200);

        let event = events.try_next().unwrap().unwrap();
        assert_eq!(event.actor, bubble.id());
        assert_eq!(event.stage, Stage::Born);
    }

    #[test]
    fn bubble_at_prefers_the_top_most() {
        let glass = glass();
        let below = glass
            .spawn_bubble(Bubble::builder().position(100.0, 100.0).size(100.0))
            .unwrap();
        let above = glass
            .spawn_bubble(Bubble::builder().position(120.0, 120.0).size(100.0))
            .unwrap();

        let hit = glass.bubble_at(Position::new(160.0, 160.0)).unwrap();
        assert_eq!(hit.id(), above.id());
        let hit = glass.bubble_at(Position::new(110.0, 150.0)).unwrap();
        assert_eq!(hit.id(), below.id());
        assert!(glass.bubble_at(Position::new(700.0, 500.0)).is_none());
    }

    #[test]
    fn remove_drops_the_bubble_from_the_space() {
        let glass = glass();
        let a = glass.spawn_bubble(Bubble::builder()).unwrap();
        let b = glass.spawn_bubble(Bubble::builder()).unwrap();
        assert!(glass.remove(a.id()).is_some());
        assert!(glass.remove(a.id()).is_none());
        assert!(b.siblings().is_empty());
        assert!(glass.timeline().visual(a.id()).is_none());
    }

    #[test]
    fn resize_pulls_bubbles_back_inside() {
        let glass = glass();
        let bubble = glass
            .spawn_bubble(Bubble::builder().position(600.0, 400.0).size(100.0))
            .unwrap();
        glass.resize(SpaceRect::from_size(400.0, 300.0)).unwrap();
        glass.advance_clock(FRAME);

        let rect = glass.rect();
        assert!(geometry::is_within_space(bubble.position(), bubble.size(), &rect, 10.0));
    }

    #[test]
    fn step_waits_for_the_startup_delay() {
        let config = GlassConfig {
            startup_delay_ms: 100,
            nudge_interval_ms: 50,
            ..GlassConfig::default()
        };
        let glass = Glass::new(SpaceRect::from_size(800.0, 600.0), config);
        let bubble = glass.spawn_bubble(Bubble::builder()).unwrap();
        let mut events = bubble.subscribe();

        glass.step(Duration::from_millis(50)).unwrap();
        glass.run_for(Duration::from_millis(500), FRAME);
        assert!(bubble.is_at(Stage::Died));
        assert!(events.try_next().is_err());

        for _ in 0..60 {
            glass.step(FRAME).unwrap();
        }
        let first = events.try_next().unwrap().map(|event| event.stage);
        assert_eq!(first, Some(Stage::Born));
    }

    #[test]
    fn paused_glass_does_not_move() {
        let glass = glass();
        let bubble = glass.spawn_bubble(Bubble::builder()).unwrap();
        glass.pause(true);
        glass.nudge().unwrap();
        glass.step(Duration::from_secs(1)).unwrap();
        assert_eq!(glass.now(), Duration::ZERO);
        assert!(bubble.is_at(Stage::Died));
    }

    #[test]
    fn snapshot_reports_the_projection() {
        let glass = glass();
        let debug = Bubble::builder().behavior(Behavior::Debug(DebugBehavior::default()));
        let bubble = glass.spawn_bubble(debug).unwrap();
        glass.run_until(bubble.advance(), FRAME, 200);

        let snapshot = glass.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].behavior, "debug");
        assert_eq!(snapshot[0].stage, Stage::Born);
        assert_eq!(snapshot[0].visual.size, 120.0);
        assert_eq!(snapshot[0].visual.position, Position::new(100.0, 200.0));
    }
}
