//! Deadline-based deferral primitives.
//!
//! Nothing here spawns timers. A component pushes values in, asks for its
//! next deadline, and polls with the current time; a cancelled or superseded
//! deadline simply disappears, so a stale callback can never fire.

use crate::clock::Millis;

/// Emits the latest value once no new value arrived for `delay_ms`.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay_ms: Millis,
    pending: Option<(Millis, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay_ms: Millis) -> Self {
        Self {
            delay_ms,
            pending: None,
        }
    }

    /// Replace the pending value and push the deadline out.
    pub fn push(&mut self, value: T, now: Millis) {
        self.pending = Some((now.saturating_add(self.delay_ms), value));
    }

    /// Take the value if its quiet period has elapsed.
    pub fn poll(&mut self, now: Millis) -> Option<T> {
        match &self.pending {
            Some((deadline, _)) if now >= *deadline => self.pending.take().map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Millis> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, v)| v)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Emits at most once per window: immediately on the leading edge, then the
/// latest coalesced value when the window closes.
#[derive(Debug, Clone)]
pub struct Throttle<T> {
    window_ms: Millis,
    last_emit: Option<Millis>,
    trailing: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(window_ms: Millis) -> Self {
        Self {
            window_ms,
            last_emit: None,
            trailing: None,
        }
    }

    /// Offer a value. Returns it straight back if the window is open.
    pub fn push(&mut self, value: T, now: Millis) -> Option<T> {
        // While a trailing value is pending, newer values replace it.
        if self.window_open(now) && self.trailing.is_none() {
            self.last_emit = Some(now);
            return Some(value);
        }
        self.trailing = Some(value);
        None
    }

    /// Release the trailing value once its window has closed.
    pub fn poll(&mut self, now: Millis) -> Option<T> {
        if self.trailing.is_some() && self.window_open(now) {
            self.last_emit = Some(now);
            return self.trailing.take();
        }
        None
    }

    pub fn deadline(&self) -> Option<Millis> {
        self.trailing.as_ref()?;
        Some(self.last_emit.map_or(Millis::MIN, |t| t.saturating_add(self.window_ms)))
    }

    pub fn cancel(&mut self) {
        self.trailing = None;
        self.last_emit = None;
    }

    fn window_open(&self, now: Millis) -> bool {
        self.last_emit.map_or(true, |t| now - t >= self.window_ms)
    }
}
