//! Signal collectors.
//!
//! A collector observes one category of host signal and reports normalized
//! partial events through the [`EventSink`] it receives on start. Collectors
//! never own a queue; the tracker drains the sink and stamps identity.
//!
//! All collector calls go through [`CollectorRegistry`], which isolates
//! failures: an error or panic in one collector is logged and counted, and
//! the remaining collectors keep running.

pub mod click;
pub mod error;
pub mod exposure;
pub mod input;
pub mod navigation;
pub mod performance;
pub mod scroll;
pub mod types;

use crate::clock::Millis;
use crate::core::event::{EventData, EventType, Priority};
use crate::stats::SharedTrackerStats;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::panic::{catch_unwind, AssertUnwindSafe};

// Re-export commonly used types
pub use click::ClickCollector;
pub use error::ErrorCollector;
pub use exposure::{
    ExposureCollector, ExposureId, ExposureOptions, PassiveObserver, VisibilityObserver,
};
pub use input::InputCollector;
pub use navigation::NavigationCollector;
pub use performance::PerformanceCollector;
pub use scroll::ScrollCollector;
pub use types::{
    ClickSignal, ElementInfo, ErrorSignal, InputSignal, IntersectionEntry, NavigationKind,
    NavigationSignal, NavigationTiming, ObservationHandle, PaintTiming, RejectionSignal,
    ScrollSignal, Signal,
};

/// Capacity of the sink between collectors and the tracker.
pub const SINK_CAPACITY: usize = 10_000;

/// A partial event reported by a collector, before identity stamping.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedEvent {
    pub name: String,
    pub event_type: EventType,
    pub data: EventData,
    pub priority: Option<Priority>,
}

/// Handle collectors use to report events.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: Sender<EmittedEvent>,
}

impl EventSink {
    /// Create a sink and the receiver the tracker drains.
    pub fn channel() -> (Self, Receiver<EmittedEvent>) {
        // Bounded to keep a runaway collector from growing memory without limit
        let (sender, receiver) = bounded(SINK_CAPACITY);
        (Self { sender }, receiver)
    }

    /// Report an event. Returns `false` if it could not be handed over.
    pub fn emit(
        &self,
        name: impl Into<String>,
        event_type: EventType,
        data: EventData,
        priority: Option<Priority>,
    ) -> bool {
        let event = EmittedEvent {
            name: name.into(),
            event_type,
            data,
            priority,
        };
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(event = %event.name, "Collector sink full, dropping event");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// What a collector gets when it starts.
#[derive(Debug, Clone)]
pub struct CollectorContext {
    pub sink: EventSink,
    pub now: Millis,
}

/// Errors raised inside a collector.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("collector '{0}' is already running")]
    AlreadyRunning(&'static str),
    #[error("collector '{0}' is not running")]
    NotRunning(&'static str),
    #[error("collector '{name}' failed: {message}")]
    Failed { name: &'static str, message: String },
}

/// A source of one category of events.
pub trait Collector: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Begin observing. The sink in `ctx` is where events go.
    fn start(&mut self, ctx: CollectorContext) -> Result<(), CollectorError>;

    /// Stop observing and cancel every pending timer.
    ///
    /// `now` closes any interval the collector is still measuring.
    fn stop(&mut self, now: Millis);

    fn is_running(&self) -> bool;

    /// Handle a raw host signal. Signals a collector does not care about are
    /// ignored.
    fn on_signal(&mut self, _signal: &Signal, _now: Millis) -> Result<(), CollectorError> {
        Ok(())
    }

    /// Fire timers that are due at `now`.
    fn poll(&mut self, _now: Millis) -> Result<(), CollectorError> {
        Ok(())
    }

    /// Earliest pending timer, if any.
    fn next_deadline(&self) -> Option<Millis> {
        None
    }
}

/// Owns the collectors and runs every call to them in isolation.
pub struct CollectorRegistry {
    collectors: Vec<Box<dyn Collector>>,
    exposure: ExposureCollector,
    exposure_enabled: bool,
    stats: SharedTrackerStats,
}

impl CollectorRegistry {
    pub fn new(exposure: ExposureCollector, stats: SharedTrackerStats) -> Self {
        Self {
            collectors: Vec::new(),
            exposure,
            exposure_enabled: true,
            stats,
        }
    }

    /// Whether the exposure collector starts with the others. When disabled,
    /// exposures can still be registered but are never observed.
    pub fn set_exposure_enabled(&mut self, enabled: bool) {
        self.exposure_enabled = enabled;
    }

    pub fn register(&mut self, collector: Box<dyn Collector>) {
        tracing::debug!(collector = collector.name(), "Registered collector");
        self.collectors.push(collector);
    }

    /// The exposure collector, which also takes direct observation requests.
    pub fn exposure_mut(&mut self) -> &mut ExposureCollector {
        &mut self.exposure
    }

    pub fn exposure(&self) -> &ExposureCollector {
        &self.exposure
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.collectors
            .iter()
            .map(|c| c.name())
            .chain(self.exposure_enabled.then(|| self.exposure.name()))
            .collect()
    }

    fn all_mut(&mut self) -> impl Iterator<Item = &mut dyn Collector> {
        self.collectors
            .iter_mut()
            .map(|c| c.as_mut() as &mut dyn Collector)
            .chain(
                self.exposure_enabled
                    .then_some(&mut self.exposure as &mut dyn Collector),
            )
    }

    pub fn start_all(&mut self, ctx: &CollectorContext) {
        let stats = self.stats.clone();
        for collector in self.all_mut() {
            if collector.is_running() {
                continue;
            }
            let ctx = ctx.clone();
            guarded(&stats, collector, "start", |c| c.start(ctx));
        }
    }

    pub fn stop_all(&mut self, now: Millis) {
        let stats = self.stats.clone();
        for collector in self.all_mut() {
            guarded(&stats, collector, "stop", |c| {
                c.stop(now);
                Ok(())
            });
        }
    }

    pub fn dispatch(&mut self, signal: &Signal, now: Millis) {
        let stats = self.stats.clone();
        for collector in self.all_mut() {
            if collector.is_running() {
                guarded(&stats, collector, signal.kind(), |c| c.on_signal(signal, now));
            }
        }
    }

    pub fn poll(&mut self, now: Millis) {
        let stats = self.stats.clone();
        for collector in self.all_mut() {
            let due = collector.next_deadline().is_some_and(|d| d <= now);
            if collector.is_running() && due {
                guarded(&stats, collector, "poll", |c| c.poll(now));
            }
        }
    }

    pub fn next_deadline(&self) -> Option<Millis> {
        self.collectors
            .iter()
            .filter(|c| c.is_running())
            .filter_map(|c| c.next_deadline())
            .chain(
                self.exposure
                    .is_running()
                    .then(|| self.exposure.next_deadline())
                    .flatten(),
            )
            .min()
    }
}

/// Run one collector call, containing errors and panics.
fn guarded<F>(stats: &SharedTrackerStats, collector: &mut dyn Collector, op: &str, f: F)
where
    F: FnOnce(&mut dyn Collector) -> Result<(), CollectorError>,
{
    let name = collector.name();
    match catch_unwind(AssertUnwindSafe(|| f(collector))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            stats.record_collector_failure();
            tracing::warn!(collector = name, op, error = %e, "Collector failed");
        }
        Err(panic) => {
            stats.record_collector_failure();
            let message = panic_message(panic.as_ref());
            tracing::warn!(collector = name, op, panic = %message, "Collector panicked");
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::TrackerStats;
    use std::sync::Arc;

    /// Fails or panics on every signal, depending on the mode.
    struct Faulty {
        running: bool,
        panic: bool,
    }

    impl Collector for Faulty {
        fn name(&self) -> &'static str {
            "faulty"
        }

        fn start(&mut self, _ctx: CollectorContext) -> Result<(), CollectorError> {
            self.running = true;
            Ok(())
        }

        fn stop(&mut self, _now: Millis) {
            self.running = false;
        }

        fn is_running(&self) -> bool {
            self.running
        }

        fn on_signal(&mut self, _signal: &Signal, _now: Millis) -> Result<(), CollectorError> {
            if self.panic {
                panic!("collector bug");
            }
            Err(CollectorError::Failed {
                name: "faulty",
                message: "bad signal".to_string(),
            })
        }
    }

    fn click() -> Signal {
        Signal::Click(ClickSignal {
            target: ElementInfo::new("button").with_id("buy"),
        })
    }

    #[test]
    fn test_failures_are_isolated() {
        let stats = Arc::new(TrackerStats::new());
        let mut registry =
            CollectorRegistry::new(ExposureCollector::new(PassiveObserver::new()), stats.clone());
        registry.register(Box::new(Faulty {
            running: false,
            panic: false,
        }));
        registry.register(Box::new(Faulty {
            running: false,
            panic: true,
        }));
        registry.register(Box::new(ClickCollector::new()));

        let (sink, receiver) = EventSink::channel();
        registry.start_all(&CollectorContext { sink, now: 0 });
        registry.dispatch(&click(), 1);

        // The click collector still ran after both faulty ones misbehaved.
        let emitted = receiver.try_recv().expect("click event");
        assert_eq!(emitted.event_type, EventType::Click);
        assert_eq!(stats.snapshot().collector_failures, 2);
    }

    #[test]
    fn test_stopped_collectors_ignore_signals() {
        let stats = Arc::new(TrackerStats::new());
        let mut registry =
            CollectorRegistry::new(ExposureCollector::new(PassiveObserver::new()), stats);
        registry.register(Box::new(ClickCollector::new()));

        let (sink, receiver) = EventSink::channel();
        registry.start_all(&CollectorContext { sink, now: 0 });
        registry.stop_all(1);
        registry.dispatch(&click(), 1);
        assert!(receiver.try_recv().is_err());
        assert_eq!(registry.names(), vec!["click", "exposure"]);
    }

    #[test]
    fn test_sink_emit() {
        let (sink, receiver) = EventSink::channel();
        assert!(sink.emit("custom", EventType::Custom, EventData::new(), None));
        let event = receiver.try_recv().unwrap();
        assert_eq!(event.name, "custom");
        drop(receiver);
        assert!(!sink.emit("custom", EventType::Custom, EventData::new(), None));
    }
}
