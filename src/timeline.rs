/*
 * Timeline Module
 *
 * A frame-driven TweenPort. The host advances the timeline's clock by a frame
 * delta; every active tween is interpolated (smoothstep ease-in-out) and
 * written into the actor's Visual, and tweens and timers whose time is up
 * complete their waiters. Nothing completes between advances, which makes the
 * whole engine run on virtual time.
 *
 * Zero-duration tweens are hard teleports: they settle on the next advance.
 * Breathing is the one endless animation: it only writes the drift offset of
 * the projection and never completes.
 */

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::oneshot;
use tracing::trace;

use crate::error::BubbleError;
use crate::geometry::Position;
use crate::tween::{Channel, TweenPort, Visual};
use crate::ActorId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TweenValue {
    Position(Position),
    Scalar(f32),
}

impl TweenValue {
    fn interpolate(self, to: TweenValue, t: f32) -> TweenValue {
        match (self, to) {
            (TweenValue::Position(a), TweenValue::Position(b)) => TweenValue::Position(a.lerp(b, t)),
            (TweenValue::Scalar(a), TweenValue::Scalar(b)) => TweenValue::Scalar(a + (b - a) * t),
            // Mismatched kinds cannot be produced by the port methods
            (_, to) => to,
        }
    }
}

// One started tween, recorded when journaling is enabled
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub actor: ActorId,
    pub channel: Channel,
    pub target: TweenValue,
    pub duration: Duration,
    pub started_at: Duration,
}

struct ActiveTween {
    from: TweenValue,
    to: TweenValue,
    started_at: Duration,
    duration: Duration,
    done: oneshot::Sender<()>,
}

struct Breath {
    amplitude: f32,
    period: Duration,
    started_at: Duration,
}

impl Breath {
    // Ease from -amplitude to +amplitude over one period, then back
    fn offset(&self, now: Duration) -> f32 {
        let period = self.period.as_secs_f32();
        if period <= 0.0 {
            return 0.0;
        }
        let legs = now.saturating_sub(self.started_at).as_secs_f32() / period;
        let phase = legs % 2.0;
        let t = if phase <= 1.0 { phase } else { 2.0 - phase };
        -self.amplitude + 2.0 * self.amplitude * ease_in_out(t)
    }
}

struct PendingTimer {
    deadline: Duration,
    done: oneshot::Sender<()>,
}

#[derive(Default)]
struct TimelineState {
    now: Duration,
    tweens: BTreeMap<(ActorId, Channel), ActiveTween>,
    timers: Vec<PendingTimer>,
    breaths: BTreeMap<ActorId, Breath>,
    visuals: BTreeMap<ActorId, Visual>,
    journal: Option<Vec<JournalEntry>>,
}

#[derive(Default)]
pub struct Timeline {
    state: RefCell<TimelineState>,
}

#[inline]
fn ease_in_out(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

fn apply(visual: &mut Visual, channel: Channel, value: TweenValue) {
    match (channel, value) {
        (Channel::Move, TweenValue::Position(p)) => visual.position = p,
        (Channel::Scale, TweenValue::Scalar(s)) => visual.size = s,
        (Channel::Fade, TweenValue::Scalar(o)) => visual.opacity = o,
        _ => {}
    }
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    // Record every started tween so callers can inspect ordering
    pub fn with_journal() -> Self {
        let timeline = Self::default();
        timeline.state.borrow_mut().journal = Some(Vec::new());
        timeline
    }

    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.state.borrow().journal.clone().unwrap_or_default()
    }

    pub fn visual(&self, actor: ActorId) -> Option<Visual> {
        self.state.borrow().visuals.get(&actor).copied()
    }

    pub fn active_tweens(&self) -> usize {
        self.state.borrow().tweens.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.state.borrow().timers.len()
    }

    /// Move the clock forward by `dt`, project every active tween and wake
    /// the waiters of everything that has settled.
    pub fn advance(&self, dt: Duration) {
        let mut settled = Vec::new();
        let mut fired = Vec::new();

        {
            let mut state = self.state.borrow_mut();
            state.now += dt;
            let now = state.now;
            let TimelineState {
                tweens,
                timers,
                breaths,
                visuals,
                ..
            } = &mut *state;

            for (actor, breath) in breaths.iter() {
                if let Some(visual) = visuals.get_mut(actor) {
                    visual.drift = Position::new(0.0, breath.offset(now));
                }
            }

            for (&(actor, channel), tween) in tweens.iter() {
                let t = if tween.duration.is_zero() {
                    1.0
                } else {
                    (now.saturating_sub(tween.started_at).as_secs_f32() / tween.duration.as_secs_f32()).min(1.0)
                };

                let value = tween.from.interpolate(tween.to, ease_in_out(t));
                if let Some(visual) = visuals.get_mut(&actor) {
                    apply(visual, channel, value);
                }

                if t >= 1.0 {
                    settled.push((actor, channel));
                }
            }

            for key in settled {
                if let Some(tween) = tweens.remove(&key) {
                    fired.push(tween.done);
                }
            }

            let (due, waiting): (Vec<_>, Vec<_>) = timers.drain(..).partition(|timer| timer.deadline <= now);
            *timers = waiting;
            fired.extend(due.into_iter().map(|timer| timer.done));
        }

        // Waiters are only woken here; they run when the executor is polled
        for done in fired {
            let _ = done.send(());
        }
    }

    fn start(
        &self,
        actor: ActorId,
        channel: Channel,
        from: TweenValue,
        to: TweenValue,
        duration: Duration,
    ) -> oneshot::Receiver<()> {
        let (done, settled) = oneshot::channel();
        let mut state = self.state.borrow_mut();
        let now = state.now;

        if let Some(visual) = state.visuals.get_mut(&actor) {
            apply(visual, channel, from);
        }

        if let Some(journal) = state.journal.as_mut() {
            journal.push(JournalEntry {
                actor,
                channel,
                target: to,
                duration,
                started_at: now,
            });
        }

        let replaced = state.tweens.insert(
            (actor, channel),
            ActiveTween {
                from,
                to,
                started_at: now,
                duration,
                done,
            },
        );

        if replaced.is_some() {
            trace!(%actor, %channel, "replaced in-flight tween");
        }

        settled
    }

    async fn run(
        &self,
        actor: ActorId,
        channel: Channel,
        from: TweenValue,
        to: TweenValue,
        duration: Duration,
    ) -> Result<(), BubbleError> {
        let settled = self.start(actor, channel, from, to, duration);
        settled
            .await
            .map_err(|_| BubbleError::TweenCancelled { actor, channel })
    }
}

#[async_trait(?Send)]
impl TweenPort for Timeline {
    async fn move_to(
        &self,
        actor: ActorId,
        from: Position,
        to: Position,
        duration: Duration,
    ) -> Result<(), BubbleError> {
        self.run(actor, Channel::Move, TweenValue::Position(from), TweenValue::Position(to), duration)
            .await
    }

    async fn scale_to(&self, actor: ActorId, from: f32, to: f32, duration: Duration) -> Result<(), BubbleError> {
        self.run(actor, Channel::Scale, TweenValue::Scalar(from), TweenValue::Scalar(to), duration)
            .await
    }

    async fn fade_to(&self, actor: ActorId, from: f32, to: f32, duration: Duration) -> Result<(), BubbleError> {
        self.run(actor, Channel::Fade, TweenValue::Scalar(from), TweenValue::Scalar(to), duration)
            .await
    }

    async fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }

        let (done, elapsed) = oneshot::channel();
        {
            let mut state = self.state.borrow_mut();
            let deadline = state.now + duration;
            state.timers.push(PendingTimer { deadline, done });
        }
        let _ = elapsed.await;
    }

    fn is_animating(&self, actor: ActorId, channel: Channel) -> bool {
        self.state.borrow().tweens.contains_key(&(actor, channel))
    }

    fn set_visible(&self, actor: ActorId, visible: bool) {
        if let Some(visual) = self.state.borrow_mut().visuals.get_mut(&actor) {
            visual.visible = visible;
        }
    }

    fn breathe(&self, actor: ActorId, amplitude: f32, period: Duration) {
        let mut state = self.state.borrow_mut();
        let started_at = state.now;
        state.breaths.insert(
            actor,
            Breath {
                amplitude,
                period,
                started_at,
            },
        );
    }

    fn stop_breathing(&self, actor: ActorId) {
        let mut state = self.state.borrow_mut();
        if state.breaths.remove(&actor).is_some() {
            if let Some(visual) = state.visuals.get_mut(&actor) {
                visual.drift = Position::ZERO;
            }
        }
    }

    fn is_breathing(&self, actor: ActorId) -> bool {
        self.state.borrow().breaths.contains_key(&actor)
    }

    fn sync(&self, actor: ActorId, visual: Visual) {
        self.state.borrow_mut().visuals.insert(actor, visual);
    }

    fn detach(&self, actor: ActorId) {
        let mut state = self.state.borrow_mut();
        state.visuals.remove(&actor);
        state.breaths.remove(&actor);
        // Dropping the senders cancels the waiters
        state.tweens.retain(|&(owner, _), _| owner != actor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::LocalPool;
    use futures::task::LocalSpawnExt;
    use std::cell::Cell;
    use std::rc::Rc;

    const FRAME: Duration = Duration::from_millis(16);

    fn visual() -> Visual {
        Visual::new(Position::ZERO, 50.0, 1.0)
    }

    #[test]
    fn tween_settles_only_after_its_duration() {
        let timeline = Rc::new(Timeline::new());
        let actor = ActorId(1);
        timeline.sync(actor, visual());

        let mut pool = LocalPool::new();
        let done = Rc::new(Cell::new(false));
        {
            let timeline = timeline.clone();
            let done = done.clone();
            pool.spawner()
                .spawn_local(async move {
                    timeline
                        .move_to(actor, Position::ZERO, Position::new(100.0, 0.0), Duration::from_millis(100))
                        .await
                        .unwrap();
                    done.set(true);
                })
                .unwrap();
        }

        pool.run_until_stalled();
        for _ in 0..3 {
            timeline.advance(FRAME);
            pool.run_until_stalled();
        }
        assert!(!done.get());
        let midway = timeline.visual(actor).unwrap().position.x;
        assert!(midway > 0.0 && midway < 100.0);

        for _ in 0..10 {
            timeline.advance(FRAME);
            pool.run_until_stalled();
        }
        assert!(done.get());
        assert_eq!(timeline.visual(actor).unwrap().position.x, 100.0);
        assert_eq!(timeline.active_tweens(), 0);
    }

    #[test]
    fn replacing_a_tween_cancels_the_previous_waiter() {
        let timeline = Rc::new(Timeline::new());
        let actor = ActorId(7);
        timeline.sync(actor, visual());

        let mut pool = LocalPool::new();
        let first = Rc::new(Cell::new(None));
        let second = Rc::new(Cell::new(None));
        for (slot, to) in [(first.clone(), 10.0), (second.clone(), 90.0)] {
            let timeline = timeline.clone();
            pool.spawner()
                .spawn_local(async move {
                    let result = timeline.scale_to(actor, 50.0, to, Duration::from_millis(48)).await;
                    slot.set(Some(result.is_ok()));
                })
                .unwrap();
            pool.run_until_stalled();
        }

        for _ in 0..4 {
            timeline.advance(FRAME);
            pool.run_until_stalled();
        }

        assert_eq!(first.get(), Some(false));
        assert_eq!(second.get(), Some(true));
        assert_eq!(timeline.visual(actor).unwrap().size, 90.0);
    }

    #[test]
    fn zero_duration_settles_on_next_advance() {
        let timeline = Rc::new(Timeline::new());
        let actor = ActorId(2);
        timeline.sync(actor, visual());

        let mut pool = LocalPool::new();
        let done = Rc::new(Cell::new(false));
        {
            let timeline = timeline.clone();
            let done = done.clone();
            pool.spawner()
                .spawn_local(async move {
                    timeline.fade_to(actor, 1.0, 0.0, Duration::ZERO).await.unwrap();
                    done.set(true);
                })
                .unwrap();
        }
        pool.run_until_stalled();
        assert!(!done.get());

        timeline.advance(Duration::ZERO);
        pool.run_until_stalled();
        assert!(done.get());
        assert_eq!(timeline.visual(actor).unwrap().opacity, 0.0);
    }

    #[test]
    fn sleep_fires_at_deadline() {
        let timeline = Rc::new(Timeline::new());
        let mut pool = LocalPool::new();
        let done = Rc::new(Cell::new(false));
        {
            let timeline = timeline.clone();
            let done = done.clone();
            pool.spawner()
                .spawn_local(async move {
                    timeline.sleep(Duration::from_millis(40)).await;
                    done.set(true);
                })
                .unwrap();
        }
        pool.run_until_stalled();
        timeline.advance(Duration::from_millis(32));
        pool.run_until_stalled();
        assert!(!done.get());
        timeline.advance(Duration::from_millis(8));
        pool.run_until_stalled();
        assert!(done.get());
        assert_eq!(timeline.pending_timers(), 0);
    }

    #[test]
    fn detach_cancels_in_flight_tweens() {
        let timeline = Rc::new(Timeline::new());
        let actor = ActorId(3);
        timeline.sync(actor, visual());

        let mut pool = LocalPool::new();
        let outcome = Rc::new(Cell::new(None));
        {
            let timeline = timeline.clone();
            let outcome = outcome.clone();
            pool.spawner()
                .spawn_local(async move {
                    let result = timeline
                        .move_to(actor, Position::ZERO, Position::new(5.0, 5.0), Duration::from_secs(1))
                        .await;
                    outcome.set(Some(matches!(result, Err(BubbleError::TweenCancelled { .. }))));
                })
                .unwrap();
        }
        pool.run_until_stalled();
        assert!(timeline.is_animating(actor, Channel::Move));

        timeline.detach(actor);
        pool.run_until_stalled();
        assert_eq!(outcome.get(), Some(true));
        assert!(timeline.visual(actor).is_none());
    }

    #[test]
    fn breathing_sways_the_drift_and_stops_cleanly() {
        let timeline = Timeline::new();
        let actor = ActorId(4);
        timeline.sync(actor, visual());
        timeline.breathe(actor, 2.0, Duration::from_millis(100));

        let mut lowest = f32::MAX;
        let mut highest = f32::MIN;
        for _ in 0..30 {
            timeline.advance(FRAME);
            let drift = timeline.visual(actor).unwrap().drift;
            assert_eq!(drift.x, 0.0);
            lowest = lowest.min(drift.y);
            highest = highest.max(drift.y);
        }

        assert!(lowest >= -2.0 && highest <= 2.0);
        assert!(highest - lowest > 3.0);
        assert_eq!(timeline.visual(actor).unwrap().position, Position::ZERO);
        assert_eq!(timeline.active_tweens(), 0);

        timeline.stop_breathing(actor);
        timeline.advance(FRAME);
        assert!(!timeline.is_breathing(actor));
        assert_eq!(timeline.visual(actor).unwrap().drift, Position::ZERO);
    }
}
