//! Viewport exposure detection.
//!
//! An element counts as *exposed* once its intersection ratio has stayed at
//! or above the threshold for `min_duration_ms` without interruption. The
//! machine is fed ratio updates from the visibility observer and polled with
//! the current time; the `Pending` deadline is its only timer.
//!
//! ```text
//!             ratio >= threshold                 deadline reached
//!  Invisible ────────────────────▶ Pending ─────────────────────────▶ Exposed
//!      ▲                              │                                  │
//!      │        ratio < threshold     │   ratio < threshold (once=false) │
//!      ├──────────────────────────────┘                                  │
//!      └─────────────────────────────────────────────────────────────────┘
//!
//!  once=true: Pending ──deadline──▶ Finished (terminal, observer released)
//! ```

use crate::clock::Millis;
use serde::{Deserialize, Serialize};

/// Current state of one observed element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExposureState {
    Invisible,
    Pending { deadline: Millis, entered_at: Millis },
    Exposed { since: Millis },
    /// No further transitions: a `once` exposure fired or observation ended
    Finished,
}

/// Accumulated exposure bookkeeping for one element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureRecord {
    pub is_exposed: bool,
    pub exposure_count: u32,
    /// Milliseconds spent visible in qualifying intervals
    pub total_duration: Millis,
    pub pending_since: Option<Millis>,
}

/// Emitted when a pending element qualifies as exposed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exposure {
    /// Time visible before qualifying
    pub duration_ms: Millis,
    pub intersection_ratio: f64,
    pub is_first_exposure: bool,
    pub exposure_count: u32,
}

/// Per-element visibility/duration state machine.
#[derive(Debug, Clone)]
pub struct ExposureStateMachine {
    threshold: f64,
    min_duration_ms: Millis,
    once: bool,
    state: ExposureState,
    record: ExposureRecord,
    last_ratio: f64,
}

impl ExposureStateMachine {
    pub fn new(threshold: f64, min_duration_ms: Millis, once: bool) -> Self {
        Self {
            threshold,
            min_duration_ms: min_duration_ms.max(0),
            once,
            state: ExposureState::Invisible,
            record: ExposureRecord::default(),
            last_ratio: 0.0,
        }
    }

    /// Apply an intersection update observed at `now`.
    ///
    /// A pending deadline that passed before `now` fires first, so an exit
    /// reported late cannot cancel an exposure that already qualified.
    pub fn update(&mut self, ratio: f64, now: Millis) -> Option<Exposure> {
        let fired = self.poll(now);
        self.last_ratio = ratio;
        let visible = ratio >= self.threshold;

        match self.state {
            ExposureState::Invisible if visible => {
                self.state = ExposureState::Pending {
                    deadline: now.saturating_add(self.min_duration_ms),
                    entered_at: now,
                };
                self.record.pending_since = Some(now);
            }
            ExposureState::Pending { .. } if !visible => {
                self.state = ExposureState::Invisible;
                self.record.pending_since = None;
            }
            ExposureState::Exposed { since } if !visible => {
                self.record.total_duration += now - since;
                self.record.is_exposed = false;
                self.state = ExposureState::Invisible;
            }
            _ => {}
        }

        // Zero min_duration qualifies on the same update.
        fired.or_else(|| self.poll(now))
    }

    /// Fire the pending timer if its deadline has been reached.
    pub fn poll(&mut self, now: Millis) -> Option<Exposure> {
        let ExposureState::Pending {
            deadline,
            entered_at,
        } = self.state
        else {
            return None;
        };
        if now < deadline {
            return None;
        }

        let duration_ms = now - entered_at;
        self.record.exposure_count += 1;
        self.record.total_duration += duration_ms;
        self.record.pending_since = None;
        self.record.is_exposed = true;
        self.state = if self.once {
            ExposureState::Finished
        } else {
            ExposureState::Exposed { since: now }
        };

        Some(Exposure {
            duration_ms,
            intersection_ratio: self.last_ratio,
            is_first_exposure: self.record.exposure_count == 1,
            exposure_count: self.record.exposure_count,
        })
    }

    /// Drop any pending timer and return to an armable state.
    ///
    /// Used when the observed element is replaced. A finished machine stays
    /// finished.
    pub fn disarm(&mut self, now: Millis) {
        match self.state {
            ExposureState::Pending { .. } => {
                self.record.pending_since = None;
                self.state = ExposureState::Invisible;
            }
            ExposureState::Exposed { since } => {
                self.record.total_duration += now - since;
                self.record.is_exposed = false;
                self.state = ExposureState::Invisible;
            }
            ExposureState::Invisible | ExposureState::Finished => {}
        }
    }

    /// Tear down observation. Never produces an exposure.
    pub fn cancel(&mut self, now: Millis) {
        if let ExposureState::Exposed { since } = self.state {
            self.record.total_duration += now - since;
        }
        self.record.pending_since = None;
        self.state = ExposureState::Finished;
    }

    pub fn deadline(&self) -> Option<Millis> {
        match self.state {
            ExposureState::Pending { deadline, .. } => Some(deadline),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state == ExposureState::Finished
    }

    pub fn state(&self) -> ExposureState {
        self.state
    }

    pub fn record(&self) -> &ExposureRecord {
        &self.record
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Millis = 1_000;

    #[test]
    fn test_short_visibility_never_fires() {
        let mut machine = ExposureStateMachine::new(0.5, MIN, true);
        assert!(machine.update(0.8, 0).is_none());
        assert_eq!(machine.record().pending_since, Some(0));
        assert!(machine.update(0.2, MIN - 1).is_none());

        assert_eq!(machine.state(), ExposureState::Invisible);
        assert_eq!(machine.record().exposure_count, 0);
        assert_eq!(machine.record().total_duration, 0);
        assert_eq!(machine.poll(10 * MIN), None);
    }

    #[test]
    fn test_unbounded_min_duration_saturates() {
        let mut machine = ExposureStateMachine::new(0.5, Millis::MAX, true);
        assert!(machine.update(1.0, 1_700_000_000_000).is_none());
        assert_eq!(machine.deadline(), Some(Millis::MAX));
        assert!(machine.poll(1_700_000_060_000).is_none());
    }

    #[test]
    fn test_once_fires_exactly_once_then_inert() {
        let mut machine = ExposureStateMachine::new(0.5, MIN, true);
        machine.update(0.6, 0);
        let exposure = machine.poll(MIN + 1).expect("should fire");
        assert!(exposure.is_first_exposure);
        assert_eq!(exposure.duration_ms, MIN + 1);
        assert!((exposure.intersection_ratio - 0.6).abs() < f64::EPSILON);
        assert!(machine.is_finished());

        // Leaving and re-entering changes nothing.
        assert!(machine.update(0.0, 2 * MIN).is_none());
        assert!(machine.update(1.0, 3 * MIN).is_none());
        assert!(machine.poll(10 * MIN).is_none());
        assert_eq!(machine.record().exposure_count, 1);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut machine = ExposureStateMachine::new(0.5, MIN, true);
        machine.update(0.5, 0);
        assert_eq!(machine.deadline(), Some(MIN));
        assert!(machine.poll(MIN).is_some());
    }

    #[test]
    fn test_repeatable_exposures_accumulate_duration() {
        let mut machine = ExposureStateMachine::new(0.5, 500, false);

        machine.update(0.9, 0);
        let first = machine.poll(500).expect("first exposure");
        assert!(first.is_first_exposure);
        machine.update(0.1, 1_000);

        machine.update(0.9, 5_000);
        let second = machine.poll(5_500).expect("second exposure");
        assert!(!second.is_first_exposure);
        assert_eq!(second.exposure_count, 2);
        machine.update(0.1, 6_000);

        let record = machine.record();
        assert_eq!(record.exposure_count, 2);
        assert_eq!(record.total_duration, 2_000);
        assert!(!record.is_exposed);
    }

    #[test]
    fn test_late_exit_fires_pending_timer_first() {
        let mut machine = ExposureStateMachine::new(0.5, MIN, false);
        machine.update(0.7, 0);
        // No poll happened at the deadline; the exit arrives afterwards.
        let exposure = machine.update(0.0, MIN + 200).expect("timer fired before exit");
        assert_eq!(exposure.duration_ms, MIN + 200);
        assert_eq!(machine.state(), ExposureState::Invisible);
        assert_eq!(machine.record().total_duration, MIN + 200);
    }

    #[test]
    fn test_rapid_cycles_below_min_duration() {
        let mut machine = ExposureStateMachine::new(0.5, MIN, false);
        let mut t = 0;
        for _ in 0..20 {
            assert!(machine.update(0.9, t).is_none());
            assert!(machine.update(0.1, t + MIN / 2).is_none());
            t += MIN;
        }
        assert_eq!(machine.record().exposure_count, 0);
        assert_eq!(machine.record().total_duration, 0);
    }

    #[test]
    fn test_cancel_never_emits() {
        let mut machine = ExposureStateMachine::new(0.5, MIN, true);
        machine.update(1.0, 0);
        machine.cancel(MIN / 2);
        assert!(machine.poll(MIN * 2).is_none());
        assert!(machine.update(1.0, MIN * 3).is_none());
        assert_eq!(machine.record().exposure_count, 0);
        assert_eq!(machine.deadline(), None);
    }

    #[test]
    fn test_zero_min_duration_fires_on_entry() {
        let mut machine = ExposureStateMachine::new(0.25, 0, true);
        let exposure = machine.update(0.3, 42).expect("immediate exposure");
        assert_eq!(exposure.duration_ms, 0);
    }

    #[test]
    fn test_disarm_keeps_counts() {
        let mut machine = ExposureStateMachine::new(0.5, 100, false);
        machine.update(1.0, 0);
        machine.poll(100);
        machine.disarm(300);
        assert_eq!(machine.state(), ExposureState::Invisible);
        assert_eq!(machine.record().exposure_count, 1);
        assert_eq!(machine.record().total_duration, 300);

        machine.update(1.0, 400);
        machine.disarm(450);
        assert_eq!(machine.deadline(), None);
        assert_eq!(machine.record().exposure_count, 1);
    }
}
