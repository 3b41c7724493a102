//! Component C: the single-threaded cooperative event loop.
//!
//! Grounded in `icmp::tracer::IcmpTracer::trace`'s `loop { ... }` (poll the
//! socket, service any expired timers, drain a FIFO of pending work) but
//! pulled out into its own reusable type rather than being inlined into the
//! tracer, since MDA (component F) drives the same loop shape.

use crate::types::Tag;
use std::collections::{BinaryHeap, VecDeque};
use std::cmp::Ordering;
use std::time::{Duration, Instant};

/// An event the loop hands back to its caller: either a timer that expired
/// or a unit of caller-queued work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<T> {
    TimerExpired(Tag),
    Queued(T),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Timer {
    deadline: Instant,
    tag: Tag,
}

impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: `BinaryHeap` is a max-heap, we want the earliest deadline.
        other.deadline.cmp(&self.deadline).then_with(|| other.tag.cmp(&self.tag))
    }
}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A timer wheel plus a FIFO work queue, servicing whichever is ready first.
///
/// Cancellation is lazy: `cancel` records the tag as cancelled and the timer
/// is skipped when it is popped, rather than being removed from the heap
/// immediately (the heap does not support efficient arbitrary removal).
pub struct EventLoop<T> {
    timers: BinaryHeap<Timer>,
    cancelled: indexmap::IndexSet<Tag>,
    queue: VecDeque<T>,
}

impl<T> Default for EventLoop<T> {
    fn default() -> Self {
        Self {
            timers: BinaryHeap::new(),
            cancelled: indexmap::IndexSet::new(),
            queue: VecDeque::new(),
        }
    }
}

impl<T> EventLoop<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `tag` to fire after `delay`.
    pub fn schedule(&mut self, tag: Tag, delay: Duration) {
        self.timers.push(Timer {
            deadline: Instant::now() + delay,
            tag,
        });
    }

    /// Cancel a previously scheduled timer. A no-op if it already fired or
    /// was never scheduled.
    pub fn cancel(&mut self, tag: Tag) {
        self.cancelled.insert(tag);
    }

    /// Push a unit of work onto the back of the FIFO queue.
    pub fn push(&mut self, item: T) {
        self.queue.push_back(item);
    }

    /// The duration until the next live timer fires, if any -- the value the
    /// caller should use as its socket poll timeout.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.live_timers().next().map(|t| t.deadline.saturating_duration_since(Instant::now()))
    }

    fn live_timers(&self) -> impl Iterator<Item = &Timer> {
        self.timers.iter().filter(|t| !self.cancelled.contains(&t.tag))
    }

    /// Pop the next ready event: a queued item takes priority over an
    /// expired timer when both are ready, matching FIFO-work-before-timers
    /// ordering in the tracer's original loop.
    pub fn poll(&mut self) -> Option<Event<T>> {
        if let Some(item) = self.queue.pop_front() {
            return Some(Event::Queued(item));
        }
        loop {
            let Timer { deadline, tag } = *self.timers.peek()?;
            if deadline > Instant::now() {
                return None;
            }
            self.timers.pop();
            if self.cancelled.shift_remove(&tag) {
                continue;
            }
            return Some(Event::TimerExpired(tag));
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.live_timers().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_work_is_drained_before_timers() {
        let mut loop_: EventLoop<&str> = EventLoop::new();
        loop_.schedule(Tag(1), Duration::from_secs(0));
        loop_.push("work");
        assert_eq!(loop_.poll(), Some(Event::Queued("work")));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut loop_: EventLoop<&str> = EventLoop::new();
        loop_.schedule(Tag(1), Duration::from_secs(0));
        loop_.cancel(Tag(1));
        assert_eq!(loop_.poll(), None);
        assert!(loop_.is_idle());
    }

    #[test]
    fn earliest_deadline_fires_first() {
        let mut loop_: EventLoop<&str> = EventLoop::new();
        loop_.schedule(Tag(2), Duration::from_millis(0));
        loop_.schedule(Tag(1), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        let first = loop_.poll();
        assert!(matches!(first, Some(Event::TimerExpired(_))));
    }
}
