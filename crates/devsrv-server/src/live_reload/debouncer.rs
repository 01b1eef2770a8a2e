//! Rebuild debouncing.
//!
//! Collapses bursts of relevant change events into a single rebuild. Each new
//! event cancels the pending deadline and arms a fresh one; events that arrive
//! while a build is running are folded into exactly one follow-up rebuild.
//!
//! The state machine is clock-agnostic: callers pass `now` explicitly, and
//! the rebuild trigger drives it from the tokio clock.

use std::time::Duration;

use tokio::time::Instant;

/// Debouncer state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DebounceState {
    /// Nothing scheduled.
    Idle,
    /// A rebuild fires once `deadline` is reached.
    PendingRebuild { deadline: Instant },
    /// A build is running; `retrigger` records changes seen meanwhile.
    Building { retrigger: bool },
}

pub(crate) struct RebuildDebouncer {
    state: DebounceState,
    interval: Duration,
}

impl RebuildDebouncer {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            state: DebounceState::Idle,
            interval,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> DebounceState {
        self.state
    }

    /// Record a relevant change observed at `now`.
    pub(crate) fn record(&mut self, now: Instant) {
        self.state = match self.state {
            DebounceState::Idle | DebounceState::PendingRebuild { .. } => {
                DebounceState::PendingRebuild {
                    deadline: now + self.interval,
                }
            }
            DebounceState::Building { .. } => DebounceState::Building { retrigger: true },
        };
    }

    /// Deadline of the pending rebuild, if one is armed.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::PendingRebuild { deadline } => Some(deadline),
            DebounceState::Idle | DebounceState::Building { .. } => None,
        }
    }

    /// Start a build if the pending deadline has passed.
    ///
    /// Returns `true` when the caller must run a build now.
    pub(crate) fn take_due(&mut self, now: Instant) -> bool {
        if let DebounceState::PendingRebuild { deadline } = self.state
            && deadline <= now
        {
            self.state = DebounceState::Building { retrigger: false };
            return true;
        }
        false
    }

    /// Mark the running build as finished, whatever its outcome.
    pub(crate) fn finish_build(&mut self, now: Instant) {
        if let DebounceState::Building { retrigger } = self.state {
            self.state = if retrigger {
                DebounceState::PendingRebuild {
                    deadline: now + self.interval,
                }
            } else {
                DebounceState::Idle
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(100);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_starts_idle() {
        let debouncer = RebuildDebouncer::new(INTERVAL);
        assert_eq!(debouncer.state(), DebounceState::Idle);
        assert_eq!(debouncer.next_deadline(), None);
    }

    #[test]
    fn test_record_arms_deadline() {
        let t0 = Instant::now();
        let mut debouncer = RebuildDebouncer::new(INTERVAL);

        debouncer.record(t0);

        assert_eq!(debouncer.next_deadline(), Some(t0 + INTERVAL));
    }

    #[test]
    fn test_burst_rearms_from_last_event() {
        let t0 = Instant::now();
        let mut debouncer = RebuildDebouncer::new(INTERVAL);

        for i in 0..5 {
            debouncer.record(t0 + ms(50 * i));
        }

        let last = t0 + ms(200);
        assert_eq!(debouncer.next_deadline(), Some(last + INTERVAL));
        assert!(!debouncer.take_due(last + ms(99)));
        assert!(debouncer.take_due(last + INTERVAL));
        assert_eq!(debouncer.state(), DebounceState::Building { retrigger: false });
    }

    #[test]
    fn test_take_due_fires_once() {
        let t0 = Instant::now();
        let mut debouncer = RebuildDebouncer::new(INTERVAL);
        debouncer.record(t0);

        assert!(debouncer.take_due(t0 + INTERVAL));
        assert!(!debouncer.take_due(t0 + ms(500)));
    }

    #[test]
    fn test_take_due_when_idle() {
        let mut debouncer = RebuildDebouncer::new(INTERVAL);
        assert!(!debouncer.take_due(Instant::now()));
        assert_eq!(debouncer.state(), DebounceState::Idle);
    }

    #[test]
    fn test_finish_without_changes_returns_to_idle() {
        let t0 = Instant::now();
        let mut debouncer = RebuildDebouncer::new(INTERVAL);
        debouncer.record(t0);
        debouncer.take_due(t0 + INTERVAL);

        debouncer.finish_build(t0 + ms(300));

        assert_eq!(debouncer.state(), DebounceState::Idle);
    }

    #[test]
    fn test_changes_during_build_schedule_one_follow_up() {
        let t0 = Instant::now();
        let mut debouncer = RebuildDebouncer::new(INTERVAL);
        debouncer.record(t0);
        debouncer.take_due(t0 + INTERVAL);

        debouncer.record(t0 + ms(150));
        debouncer.record(t0 + ms(160));
        debouncer.record(t0 + ms(170));
        assert_eq!(debouncer.next_deadline(), None);
        assert_eq!(debouncer.state(), DebounceState::Building { retrigger: true });

        let finished = t0 + ms(400);
        debouncer.finish_build(finished);
        assert_eq!(debouncer.next_deadline(), Some(finished + INTERVAL));

        assert!(debouncer.take_due(finished + INTERVAL));
        debouncer.finish_build(finished + ms(300));
        assert_eq!(debouncer.state(), DebounceState::Idle);
    }

    #[test]
    fn test_finish_build_when_not_building_is_noop() {
        let t0 = Instant::now();
        let mut debouncer = RebuildDebouncer::new(INTERVAL);
        debouncer.record(t0);

        debouncer.finish_build(t0 + ms(10));

        assert_eq!(
            debouncer.state(),
            DebounceState::PendingRebuild {
                deadline: t0 + INTERVAL
            }
        );
    }
}
