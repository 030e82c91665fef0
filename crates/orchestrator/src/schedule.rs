//! Event scheduler: typed triggers evaluated once per clock tick
//!
//! Events are registered before the run and never removed. Each one carries
//! a trigger and a priority equal to its registration index; on every tick
//! the due events fire in priority order. One-shot triggers retire after
//! firing, recurring triggers re-arm.
//!
//! Time comparisons accept a relative slack of [`TIME_TOLERANCE`] so that a
//! clock that lands on `0.0299999999` after many steps still counts as having
//! reached `0.03`.

use kernel::RunClock;
use thiserror::Error;

/// Relative slack used when comparing the clock against a target time.
pub const TIME_TOLERANCE: f64 = 1e-9;

/// True when `time` has reached `target`, within [`TIME_TOLERANCE`].
pub fn reached(time: f64, target: f64) -> bool {
    time >= target - TIME_TOLERANCE * target.abs()
}

/// Errors raised while registering events
#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    /// Non-positive period or non-finite time
    #[error("invalid trigger for event {name}: {trigger:?}")]
    InvalidTrigger {
        /// Event name
        name: String,
        /// Rejected trigger
        trigger: Trigger,
    },
}

/// When an event fires
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    /// Once, on the first tick at or past `time`
    Once {
        /// Target time (s)
        time: f64,
    },
    /// Every time the clock crosses a multiple of `interval`, starting at 0
    EveryTime {
        /// Period (s)
        interval: f64,
    },
    /// Every tick whose iteration count is a multiple of `interval`
    EveryIteration {
        /// Period (iterations)
        interval: u64,
    },
    /// Once at `time`, then the run loop stops
    AtEnd {
        /// End time (s)
        time: f64,
    },
}

impl Trigger {
    fn is_valid(&self) -> bool {
        match *self {
            Trigger::Once { time } | Trigger::AtEnd { time } => time.is_finite(),
            Trigger::EveryTime { interval } => interval > 0.0 && interval.is_finite(),
            Trigger::EveryIteration { interval } => interval > 0,
        }
    }
}

/// Lifecycle of a registered event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    /// Waiting for its trigger
    Pending,
    /// One-shot event that has fired (or can no longer fire)
    Retired,
}

type Action<C> = Box<dyn FnMut(&mut C)>;

struct ScheduledEvent<C> {
    name: String,
    trigger: Trigger,
    priority: usize,
    state: EventState,
    /// Next multiple of the period an `EveryTime` event waits for
    next_multiple: u64,
    fired: u64,
    action: Action<C>,
}

impl<C> ScheduledEvent<C> {
    /// Decide whether the event is due on this tick, updating its state.
    fn due(&mut self, clock: RunClock, first_tick: bool) -> bool {
        if self.state == EventState::Retired {
            return false;
        }
        match self.trigger {
            Trigger::Once { time } => {
                if !reached(clock.time, time) {
                    return false;
                }
                self.state = EventState::Retired;
                // A clock that starts past the target never saw it
                let overshoot = clock.time - time > TIME_TOLERANCE * time.abs();
                !(first_tick && overshoot)
            }
            Trigger::EveryIteration { interval } => clock.iteration % interval == 0,
            Trigger::EveryTime { interval } => {
                if !reached(clock.time, self.next_multiple as f64 * interval) {
                    return false;
                }
                // Re-arm strictly past every multiple the clock counts as reached
                let mut next =
                    (self.next_multiple + 1).max((clock.time / interval).floor() as u64 + 1);
                while reached(clock.time, next as f64 * interval) {
                    next += 1;
                }
                self.next_multiple = next;
                true
            }
            Trigger::AtEnd { time } => {
                if !reached(clock.time, time) {
                    return false;
                }
                self.state = EventState::Retired;
                true
            }
        }
    }

    /// Next time target this event waits for, if it is time-triggered.
    fn target(&self) -> Option<f64> {
        if self.state == EventState::Retired {
            return None;
        }
        match self.trigger {
            Trigger::Once { time } | Trigger::AtEnd { time } => Some(time),
            Trigger::EveryTime { interval } => Some(self.next_multiple as f64 * interval),
            Trigger::EveryIteration { .. } => None,
        }
    }
}

/// Result of evaluating one tick
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tick {
    /// Names of the events that fired, in firing order
    pub fired: Vec<String>,
    /// An `AtEnd` event fired; the run loop must stop
    pub terminate: bool,
}

/// Registry of events over a context `C` handed to every action
pub struct Scheduler<C> {
    events: Vec<ScheduledEvent<C>>,
    ticks: u64,
    finished: bool,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Scheduler<C> {
    /// Empty scheduler
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            ticks: 0,
            finished: false,
        }
    }

    /// Register an event; returns its priority (registration index).
    pub fn register<F>(
        &mut self,
        name: &str,
        trigger: Trigger,
        action: F,
    ) -> Result<usize, ScheduleError>
    where
        F: FnMut(&mut C) + 'static,
    {
        if !trigger.is_valid() {
            return Err(ScheduleError::InvalidTrigger {
                name: name.to_string(),
                trigger,
            });
        }
        let priority = self.events.len();
        self.events.push(ScheduledEvent {
            name: name.to_string(),
            trigger,
            priority,
            state: EventState::Pending,
            next_multiple: 0,
            fired: 0,
            action: Box::new(action),
        });
        Ok(priority)
    }

    /// Number of registered events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when no event is registered
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Ticks evaluated so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// True once an `AtEnd` event has fired
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// State of the event registered under `name`
    pub fn state(&self, name: &str) -> Option<EventState> {
        self.events.iter().find(|e| e.name == name).map(|e| e.state)
    }

    /// How many times the event registered under `name` has fired
    pub fn fire_count(&self, name: &str) -> Option<u64> {
        self.events.iter().find(|e| e.name == name).map(|e| e.fired)
    }

    /// Fire every event due at `clock`, in priority order.
    pub fn tick(&mut self, clock: RunClock, ctx: &mut C) -> Tick {
        let first_tick = self.ticks == 0;
        self.ticks += 1;

        let mut tick = Tick::default();
        for event in &mut self.events {
            if !event.due(clock, first_tick) {
                continue;
            }
            tracing::trace!(
                "event {} (priority {}) at i = {}, t = {}",
                event.name,
                event.priority,
                clock.iteration,
                clock.time
            );
            (event.action)(ctx);
            event.fired += 1;
            tick.fired.push(event.name.clone());
            if matches!(event.trigger, Trigger::AtEnd { .. }) {
                tick.terminate = true;
            }
        }
        if tick.terminate {
            self.finished = true;
        }
        tick
    }

    /// Earliest pending time target not yet reached at `time`.
    ///
    /// The run loop caps the next step at `deadline - time` so that the
    /// clock lands on every time-triggered event instead of stepping over it.
    pub fn next_deadline(&self, time: f64) -> Option<f64> {
        self.events
            .iter()
            .filter_map(|e| e.target())
            .filter(|&target| !reached(time, target))
            .min_by(f64::total_cmp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::dtnext;

    fn clock(iteration: u64, time: f64) -> RunClock {
        RunClock { iteration, time }
    }

    /// Scheduler whose actions record their names into a Vec context.
    fn recorder(events: &[(&'static str, Trigger)]) -> Scheduler<Vec<&'static str>> {
        let mut scheduler = Scheduler::new();
        for &(name, trigger) in events {
            scheduler
                .register(name, trigger, move |log: &mut Vec<&'static str>| log.push(name))
                .unwrap();
        }
        scheduler
    }

    #[test]
    fn test_reached_tolerance() {
        assert!(reached(0.03, 0.03));
        assert!(reached(0.029_999_999_999, 0.03));
        assert!(!reached(0.0299, 0.03));
        assert!(reached(0.0, 0.0));
    }

    #[test]
    fn test_due_events_fire_in_registration_order() {
        let mut scheduler = recorder(&[
            ("log", Trigger::EveryIteration { interval: 1 }),
            ("adapt", Trigger::EveryIteration { interval: 1 }),
            ("movie", Trigger::EveryTime { interval: 0.1 }),
            ("end", Trigger::AtEnd { time: 0.0 }),
        ]);
        let mut log = Vec::new();
        let tick = scheduler.tick(clock(0, 0.0), &mut log);
        assert_eq!(log, vec!["log", "adapt", "movie", "end"]);
        assert_eq!(tick.fired, vec!["log", "adapt", "movie", "end"]);
        assert!(tick.terminate);
        assert!(scheduler.is_finished());
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let mut scheduler = recorder(&[("init", Trigger::Once { time: 0.0 })]);
        let mut log = Vec::new();
        scheduler.tick(clock(0, 0.0), &mut log);
        scheduler.tick(clock(1, 0.1), &mut log);
        scheduler.tick(clock(2, 0.2), &mut log);
        assert_eq!(log, vec!["init"]);
        assert_eq!(scheduler.state("init"), Some(EventState::Retired));
    }

    #[test]
    fn test_once_waits_for_its_time() {
        let mut scheduler = recorder(&[("kick", Trigger::Once { time: 0.15 })]);
        let mut log = Vec::new();
        scheduler.tick(clock(0, 0.0), &mut log);
        scheduler.tick(clock(1, 0.1), &mut log);
        assert!(log.is_empty());
        scheduler.tick(clock(2, 0.2), &mut log);
        assert_eq!(log, vec!["kick"]);
    }

    #[test]
    fn test_once_in_the_past_retires_silently() {
        let mut scheduler = recorder(&[("init", Trigger::Once { time: 0.0 })]);
        let mut log = Vec::new();
        scheduler.tick(clock(10, 0.5), &mut log);
        assert!(log.is_empty());
        assert_eq!(scheduler.state("init"), Some(EventState::Retired));
        assert_eq!(scheduler.fire_count("init"), Some(0));
    }

    #[test]
    fn test_every_iteration() {
        let mut scheduler = recorder(&[("every3", Trigger::EveryIteration { interval: 3 })]);
        let mut log = Vec::new();
        for i in 0..10 {
            scheduler.tick(clock(i, i as f64), &mut log);
        }
        // i = 0, 3, 6, 9
        assert_eq!(scheduler.fire_count("every3"), Some(4));
    }

    #[test]
    fn test_every_time_fires_once_per_crossing() {
        let mut scheduler = recorder(&[("movie", Trigger::EveryTime { interval: 1.0 })]);
        let mut log = Vec::new();
        // Steps of 0.4 cross 1, 2 at t = 1.2, 2.0
        for (i, t) in [0.0, 0.4, 0.8, 1.2, 1.6, 2.0].into_iter().enumerate() {
            scheduler.tick(clock(i as u64, t), &mut log);
        }
        assert_eq!(scheduler.fire_count("movie"), Some(3));

        // A jump over several multiples fires once, then re-arms past it
        scheduler.tick(clock(6, 4.5), &mut log);
        assert_eq!(scheduler.fire_count("movie"), Some(4));
        scheduler.tick(clock(7, 4.9), &mut log);
        assert_eq!(scheduler.fire_count("movie"), Some(4));
        scheduler.tick(clock(8, 5.0), &mut log);
        assert_eq!(scheduler.fire_count("movie"), Some(5));
    }

    #[test]
    fn test_at_end_terminates() {
        let mut scheduler = recorder(&[
            ("log", Trigger::EveryIteration { interval: 1 }),
            ("end", Trigger::AtEnd { time: 1.0 }),
        ]);
        let mut log = Vec::new();
        assert!(!scheduler.tick(clock(0, 0.0), &mut log).terminate);
        assert!(!scheduler.tick(clock(1, 0.5), &mut log).terminate);
        assert!(scheduler.tick(clock(2, 1.0), &mut log).terminate);
        assert_eq!(log, vec!["log", "log", "log", "end"]);
        assert_eq!(scheduler.next_deadline(1.0), None);
    }

    #[test]
    fn test_next_deadline_is_earliest_pending_target() {
        let mut scheduler = recorder(&[
            ("movie", Trigger::EveryTime { interval: 0.25 }),
            ("end", Trigger::AtEnd { time: 0.6 }),
        ]);
        let mut log = Vec::new();
        // Before the first tick the movie waits for t = 0, already reached
        assert_eq!(scheduler.next_deadline(0.0), Some(0.6));
        scheduler.tick(clock(0, 0.0), &mut log);
        assert_eq!(scheduler.next_deadline(0.0), Some(0.25));
        assert_eq!(scheduler.next_deadline(0.1), Some(0.25));
    }

    #[test]
    fn test_frame_count_is_independent_of_step_size() {
        let end = 0.03;
        let interval = 1e-4;
        for stable_dt in [3.7e-5, 1e-4, 1.3e-4, 7.9e-4] {
            let mut scheduler = recorder(&[
                ("movie", Trigger::EveryTime { interval }),
                ("end", Trigger::AtEnd { time: end }),
            ]);
            let mut log = Vec::new();
            let mut clock = RunClock::new();
            loop {
                if scheduler.tick(clock, &mut log).terminate {
                    break;
                }
                let remaining = scheduler.next_deadline(clock.time).map(|d| d - clock.time);
                clock.advance(dtnext(stable_dt, remaining));
                assert!(clock.iteration < 100_000, "run did not terminate");
            }
            let frames = scheduler.fire_count("movie").unwrap();
            assert_eq!(
                frames,
                (end / interval).round() as u64 + 1,
                "stable dt {stable_dt}"
            );
            assert!(reached(clock.time, end));
            assert!(clock.time < end + 1e-12);
        }
    }

    #[test]
    fn test_every_time_does_not_repeat_a_frame_landed_just_short() {
        let interval = 1e-4;
        let mut scheduler = recorder(&[("movie", Trigger::EveryTime { interval })]);
        let mut log = Vec::new();
        scheduler.tick(clock(0, 0.0), &mut log);
        // Within the relative tolerance of 300 * interval, but below it
        scheduler.tick(clock(1, 0.03 * (1.0 - 5e-10)), &mut log);
        scheduler.tick(clock(2, 0.03), &mut log);
        assert_eq!(scheduler.fire_count("movie"), Some(2));
        assert_eq!(scheduler.next_deadline(0.03), Some(301.0 * interval));

        for k in [2_u64, 7, 150, 299] {
            let mut scheduler = recorder(&[("movie", Trigger::EveryTime { interval })]);
            let target = k as f64 * interval;
            scheduler.tick(clock(0, 0.0), &mut log);
            scheduler.tick(clock(1, target * (1.0 - 5e-10)), &mut log);
            scheduler.tick(clock(2, target), &mut log);
            assert_eq!(scheduler.fire_count("movie"), Some(2), "multiple {k}");
        }
    }

    #[test]
    fn test_zero_period_is_rejected() {
        let mut scheduler: Scheduler<()> = Scheduler::new();
        let err = scheduler
            .register("bad", Trigger::EveryIteration { interval: 0 }, |_| {})
            .unwrap_err();
        assert!(err.to_string().contains("invalid trigger for event bad"));
        assert!(scheduler.is_empty());

        let err = scheduler.register("nan", Trigger::Once { time: f64::NAN }, |_| {});
        assert!(err.is_err());
    }
}
