/*
 * Move Queue Module
 *
 * Serializes position changes for one bubble. Every goto takes a turn in
 * strict submission order and holds it until its tween has settled, so two
 * overlapping motion commands never race on the move channel.
 *
 * A place in line is reserved when the move is requested, not when its
 * future first runs. Turns are handed over explicitly: the finishing holder
 * wakes the oldest waiter, and a ticket dropped before or after being handed
 * the turn passes it on, so the queue can never wedge.
 */

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use futures::channel::oneshot;

use crate::geometry::Position;

// One position change, alive only while it waits for and holds its turn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveRequest {
    pub target: Position,
    pub duration: Duration,
    // Skip the clamp to the padded space
    pub force: bool,
}

impl MoveRequest {
    pub fn new(target: Position, duration: Duration, force: bool) -> Self {
        Self { target, duration, force }
    }
}

#[derive(Default)]
pub struct MoveQueue {
    busy: Cell<bool>,
    waiting: RefCell<VecDeque<oneshot::Sender<()>>>,
    // Requests submitted but not yet finished, including the one executing
    in_flight: Cell<usize>,
}

// Held while a request executes; dropping it hands the turn on
pub struct MoveTurn<'a> {
    queue: &'a MoveQueue,
}

impl Drop for MoveTurn<'_> {
    fn drop(&mut self) {
        self.queue.in_flight.set(self.queue.in_flight.get().saturating_sub(1));
        self.queue.hand_off();
    }
}

enum TicketState {
    // Granted at reservation, not yet claimed
    Holding,
    Waiting(oneshot::Receiver<()>),
    Claimed,
}

/// A place in the queue, taken synchronously. Await `ready` to claim the
/// turn once every earlier ticket has finished.
pub struct MoveTicket<'a> {
    queue: &'a MoveQueue,
    state: TicketState,
}

impl<'a> MoveTicket<'a> {
    pub async fn ready(mut self) -> MoveTurn<'a> {
        if let TicketState::Waiting(turn) = &mut self.state {
            // Err only when the queue itself is gone; proceed either way
            let _ = turn.await;
        }
        self.state = TicketState::Claimed;
        MoveTurn { queue: self.queue }
    }
}

impl Drop for MoveTicket<'_> {
    fn drop(&mut self) {
        match std::mem::replace(&mut self.state, TicketState::Claimed) {
            TicketState::Claimed => {}
            TicketState::Holding => {
                self.queue.in_flight.set(self.queue.in_flight.get().saturating_sub(1));
                self.queue.hand_off();
            }
            TicketState::Waiting(mut turn) => {
                self.queue.in_flight.set(self.queue.in_flight.get().saturating_sub(1));
                if let Ok(Some(())) = turn.try_recv() {
                    self.queue.hand_off();
                }
            }
        }
    }
}

impl MoveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        !self.busy.get()
    }

    pub fn len(&self) -> usize {
        self.in_flight.get()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the next place in line. Places are handed out in call order,
    /// whatever order the tickets are later awaited in.
    pub fn reserve(&self) -> MoveTicket<'_> {
        self.in_flight.set(self.in_flight.get() + 1);

        if !self.busy.replace(true) {
            return MoveTicket {
                queue: self,
                state: TicketState::Holding,
            };
        }

        let (tx, rx) = oneshot::channel();
        self.waiting.borrow_mut().push_back(tx);
        MoveTicket {
            queue: self,
            state: TicketState::Waiting(rx),
        }
    }

    pub async fn acquire(&self) -> MoveTurn<'_> {
        self.reserve().ready().await
    }

    fn hand_off(&self) {
        loop {
            let next = self.waiting.borrow_mut().pop_front();
            match next {
                // A closed receiver means that waiter went away before its turn
                Some(waiter) => {
                    if waiter.send(()).is_ok() {
                        return;
                    }
                }
                None => {
                    self.busy.set(false);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::LocalPool;
    use futures::task::LocalSpawnExt;
    use std::rc::Rc;

    #[test]
    fn turns_are_granted_in_submission_order() {
        let queue = Rc::new(MoveQueue::new());
        let order = Rc::new(RefCell::new(Vec::new()));
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let release_rx = Rc::new(RefCell::new(Some(release_rx)));

        let mut pool = LocalPool::new();
        for label in 0..3 {
            let queue = queue.clone();
            let order = order.clone();
            let release_rx = release_rx.clone();
            pool.spawner()
                .spawn_local(async move {
                    let _turn = queue.acquire().await;
                    order.borrow_mut().push(label);
                    // The first holder blocks until released
                    let gate = release_rx.borrow_mut().take();
                    if let Some(gate) = gate {
                        let _ = gate.await;
                    }
                })
                .unwrap();
        }

        pool.run_until_stalled();
        assert_eq!(*order.borrow(), vec![0]);
        assert_eq!(queue.len(), 3);

        release_tx.send(()).unwrap();
        pool.run_until_stalled();
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        assert!(queue.is_idle());
        assert!(queue.is_empty());
    }

    #[test]
    fn reservation_order_wins_over_poll_order() {
        let queue = MoveQueue::new();
        let order = RefCell::new(Vec::new());
        let mut pool = LocalPool::new();

        let first = queue.reserve();
        let second = queue.reserve();
        assert_eq!(queue.len(), 2);

        pool.run_until(async {
            let late = async {
                let _turn = second.ready().await;
                order.borrow_mut().push("second");
            };
            let early = async {
                let _turn = first.ready().await;
                order.borrow_mut().push("first");
            };
            futures::join!(late, early);
        });

        assert_eq!(*order.borrow(), vec!["first", "second"]);
        assert!(queue.is_idle());
    }

    #[test]
    fn unclaimed_ticket_passes_its_turn_on() {
        let queue = MoveQueue::new();
        let mut pool = LocalPool::new();

        let abandoned = queue.reserve();
        let next = queue.reserve();
        drop(abandoned);

        pool.run_until(async {
            let _turn = next.ready().await;
            assert!(!queue.is_idle());
        });
        assert!(queue.is_idle());
        assert!(queue.is_empty());
    }

    #[test]
    fn abandoned_waiter_does_not_wedge_the_queue() {
        let queue = MoveQueue::new();
        let mut pool = LocalPool::new();

        pool.run_until(async {
            let first = queue.acquire().await;
            {
                // Start waiting, then give up before the turn arrives
                let abandoned = queue.acquire();
                futures::pin_mut!(abandoned);
                assert!(futures::poll!(abandoned.as_mut()).is_pending());
            }
            drop(first);
            let _second = queue.acquire().await;
            assert!(!queue.is_idle());
        });

        assert!(queue.is_idle());
    }
}
