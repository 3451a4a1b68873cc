use crate::error::GbError;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

pub type Callback<C> = Box<dyn FnOnce(&mut C) -> Result<(), GbError>>;

/// Anything that owns a [`Clock`] and can be handed to its callbacks.
pub trait Clocked: Sized {
    fn clock(&mut self) -> &mut Clock<Self>;
}

struct Event<C> {
    target: u64,
    sequence: u64,
    callback: Callback<C>,
}

impl<C> PartialEq for Event<C> {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target && self.sequence == other.sequence
    }
}

impl<C> Eq for Event<C> {}

impl<C> PartialOrd for Event<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C> Ord for Event<C> {
    // BinaryHeap is a max-heap, so the earliest (target, sequence) has to compare greatest.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .target
            .cmp(&self.target)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Logical machine time in T-cycles plus the callbacks waiting on it.
pub struct Clock<C> {
    now: u64,
    sequence: u64,
    queue: BinaryHeap<Event<C>>,
}

impl<C: Clocked> Clock<C> {
    pub fn new() -> Clock<C> {
        Clock {
            now: 0,
            sequence: 0,
            queue: BinaryHeap::new(),
        }
    }

    #[inline]
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Fires `callback` once the clock reaches `now + delay`. Events sharing a
    /// target fire in the order they were scheduled.
    pub fn schedule<F>(&mut self, delay: u64, callback: F)
    where
        F: FnOnce(&mut C) -> Result<(), GbError> + 'static,
    {
        self.queue.push(Event {
            target: self.now + delay,
            sequence: self.sequence,
            callback: Box::new(callback),
        });
        self.sequence += 1;
    }

    /// Moves time forward by `duration`, firing every event due strictly before
    /// the end of the window. Callbacks may schedule further events; those are
    /// honored within the same call when they also fall inside the window.
    pub fn advance(ctx: &mut C, duration: u64) -> Result<(), GbError> {
        let end = ctx.clock().now + duration;

        while let Some(callback) = ctx.clock().pop_due(end) {
            callback(ctx)?;
        }

        ctx.clock().now = end;
        Ok(())
    }

    fn pop_due(&mut self, end: u64) -> Option<Callback<C>> {
        if self.queue.peek()?.target >= end {
            return None;
        }

        let event = self.queue.pop()?;
        self.now = event.target;
        Some(event.callback)
    }
}

impl<C: Clocked> Default for Clock<C> {
    fn default() -> Clock<C> {
        Clock::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        clock: Clock<Recorder>,
        fired: Vec<(u64, &'static str)>,
    }

    impl Clocked for Recorder {
        fn clock(&mut self) -> &mut Clock<Recorder> {
            &mut self.clock
        }
    }

    impl Recorder {
        fn new() -> Recorder {
            Recorder {
                clock: Clock::new(),
                fired: Vec::new(),
            }
        }

        fn record(&mut self, name: &'static str) {
            let now = self.clock.now();
            self.fired.push((now, name));
        }
    }

    #[test]
    fn fires_in_target_order() {
        let mut rec = Recorder::new();
        rec.clock.schedule(5, |r: &mut Recorder| Ok(r.record("five")));
        rec.clock.schedule(3, |r: &mut Recorder| Ok(r.record("three")));
        rec.clock.schedule(8, |r: &mut Recorder| Ok(r.record("eight")));

        Clock::advance(&mut rec, 10).unwrap();

        assert_eq!(rec.fired, vec![(3, "three"), (5, "five"), (8, "eight")]);
        assert_eq!(rec.clock.now(), 10);
        assert_eq!(rec.clock.pending(), 0);
    }

    #[test]
    fn ties_are_fifo() {
        let mut rec = Recorder::new();
        rec.clock.schedule(4, |r: &mut Recorder| Ok(r.record("first")));
        rec.clock.schedule(4, |r: &mut Recorder| Ok(r.record("second")));
        rec.clock.schedule(4, |r: &mut Recorder| Ok(r.record("third")));

        Clock::advance(&mut rec, 5).unwrap();

        let names: Vec<_> = rec.fired.iter().map(|(_, name)| *name).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn event_at_window_end_waits_for_next_advance() {
        let mut rec = Recorder::new();
        rec.clock.schedule(4, |r: &mut Recorder| Ok(r.record("edge")));

        Clock::advance(&mut rec, 4).unwrap();
        assert!(rec.fired.is_empty());
        assert_eq!(rec.clock.pending(), 1);

        Clock::advance(&mut rec, 1).unwrap();
        assert_eq!(rec.fired, vec![(4, "edge")]);
        assert_eq!(rec.clock.now(), 5);
    }

    #[test]
    fn callbacks_can_chain_within_one_advance() {
        fn tick(r: &mut Recorder) -> Result<(), GbError> {
            r.record("tick");
            r.clock.schedule(3, tick);
            Ok(())
        }

        let mut rec = Recorder::new();
        rec.clock.schedule(3, tick);
        Clock::advance(&mut rec, 10).unwrap();

        let times: Vec<_> = rec.fired.iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![3, 6, 9]);
        assert_eq!(rec.clock.pending(), 1);
    }

    #[test]
    fn zero_delay_from_callback_fires_at_same_time() {
        let mut rec = Recorder::new();
        rec.clock.schedule(2, |r: &mut Recorder| {
            r.record("outer");
            r.clock.schedule(0, |r: &mut Recorder| Ok(r.record("inner")));
            Ok(())
        });

        Clock::advance(&mut rec, 3).unwrap();
        assert_eq!(rec.fired, vec![(2, "outer"), (2, "inner")]);
    }

    #[test]
    fn callback_errors_stop_the_advance() {
        let mut rec = Recorder::new();
        rec.clock
            .schedule(1, |_: &mut Recorder| Err(GbError::InvalidTimerFrequency { tac: 0xff }));
        rec.clock.schedule(2, |r: &mut Recorder| Ok(r.record("never")));

        assert!(Clock::advance(&mut rec, 5).is_err());
        assert!(rec.fired.is_empty());
        assert_eq!(rec.clock.now(), 1);
    }
}
