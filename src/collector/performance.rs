//! Performance collector.
//!
//! Emits one `performance` summary per page: as soon as navigation timing and
//! first-contentful-paint are both known, or once the settle delay after
//! navigation timing has passed without a contentful paint.

use crate::clock::Millis;
use crate::collector::types::{NavigationTiming, Signal};
use crate::collector::{Collector, CollectorContext, CollectorError, EventSink};
use crate::core::event::{EventData, EventType, Priority};
use serde_json::Value;

pub const FIRST_PAINT: &str = "first-paint";
pub const FIRST_CONTENTFUL_PAINT: &str = "first-contentful-paint";

pub struct PerformanceCollector {
    settle_ms: Millis,
    /// Page the summary belongs to
    current_url: String,
    timing: Option<NavigationTiming>,
    first_paint: Option<f64>,
    first_contentful_paint: Option<f64>,
    settle_deadline: Option<Millis>,
    emitted: bool,
    sink: Option<EventSink>,
}

impl PerformanceCollector {
    pub fn new(settle_ms: Millis, initial_url: impl Into<String>) -> Self {
        Self {
            settle_ms,
            current_url: initial_url.into(),
            timing: None,
            first_paint: None,
            first_contentful_paint: None,
            settle_deadline: None,
            emitted: false,
            sink: None,
        }
    }

    fn reset(&mut self) {
        self.timing = None;
        self.first_paint = None;
        self.first_contentful_paint = None;
        self.settle_deadline = None;
        self.emitted = false;
    }

    fn try_emit(&mut self, settled: bool) {
        if self.emitted {
            return;
        }
        let (Some(timing), Some(sink)) = (self.timing, &self.sink) else {
            return;
        };
        if self.first_contentful_paint.is_none() && !settled {
            return;
        }

        let mut data = EventData::new();
        data.insert("dns".to_string(), Value::from(timing.dns));
        data.insert("tcp".to_string(), Value::from(timing.tcp));
        data.insert("ttfb".to_string(), Value::from(timing.ttfb));
        data.insert(
            "domContentLoaded".to_string(),
            Value::from(timing.dom_content_loaded),
        );
        data.insert("load".to_string(), Value::from(timing.load));
        if let Some(fp) = self.first_paint {
            data.insert("firstPaint".to_string(), Value::from(fp));
        }
        if let Some(fcp) = self.first_contentful_paint {
            data.insert("firstContentfulPaint".to_string(), Value::from(fcp));
        }
        sink.emit("performance", EventType::Performance, data, Some(Priority::Low));

        self.emitted = true;
        self.settle_deadline = None;
    }
}

impl Collector for PerformanceCollector {
    fn name(&self) -> &'static str {
        "performance"
    }

    fn start(&mut self, ctx: CollectorContext) -> Result<(), CollectorError> {
        if self.sink.is_some() {
            return Err(CollectorError::AlreadyRunning(self.name()));
        }
        self.sink = Some(ctx.sink);
        Ok(())
    }

    fn stop(&mut self, _now: Millis) {
        self.settle_deadline = None;
        self.sink = None;
    }

    fn is_running(&self) -> bool {
        self.sink.is_some()
    }

    fn on_signal(&mut self, signal: &Signal, now: Millis) -> Result<(), CollectorError> {
        match signal {
            Signal::NavigationTiming(timing) if !self.emitted => {
                self.timing = Some(*timing);
                self.settle_deadline.get_or_insert(now.saturating_add(self.settle_ms));
                self.try_emit(false);
            }
            Signal::Paint(paint) if !self.emitted => {
                match paint.name.as_str() {
                    FIRST_PAINT => self.first_paint = Some(paint.start_time),
                    FIRST_CONTENTFUL_PAINT => self.first_contentful_paint = Some(paint.start_time),
                    _ => return Ok(()),
                }
                self.try_emit(false);
            }
            Signal::Navigation(nav) if nav.url != self.current_url => {
                self.current_url = nav.url.clone();
                self.reset();
            }
            _ => {}
        }
        Ok(())
    }

    fn poll(&mut self, now: Millis) -> Result<(), CollectorError> {
        if self.settle_deadline.is_some_and(|deadline| now >= deadline) {
            self.try_emit(true);
        }
        Ok(())
    }

    fn next_deadline(&self) -> Option<Millis> {
        self.settle_deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::{NavigationKind, NavigationSignal, PaintTiming};

    fn timing() -> Signal {
        Signal::NavigationTiming(NavigationTiming {
            dns: 12.0,
            tcp: 30.0,
            ttfb: 120.0,
            dom_content_loaded: 640.0,
            load: 1_200.0,
        })
    }

    fn paint(name: &str, at: f64) -> Signal {
        Signal::Paint(PaintTiming {
            name: name.to_string(),
            start_time: at,
        })
    }

    #[test]
    fn test_emits_once_fcp_known() {
        let (sink, receiver) = EventSink::channel();
        let mut collector = PerformanceCollector::new(3_000, "/a");
        collector.start(CollectorContext { sink, now: 0 }).unwrap();

        collector.on_signal(&paint(FIRST_PAINT, 300.0), 10).unwrap();
        collector.on_signal(&timing(), 20).unwrap();
        assert!(receiver.try_recv().is_err());
        collector.on_signal(&paint(FIRST_CONTENTFUL_PAINT, 350.0), 30).unwrap();

        let event = receiver.try_recv().unwrap();
        assert_eq!(event.event_type, EventType::Performance);
        assert_eq!(event.data["ttfb"], 120.0);
        assert_eq!(event.data["firstPaint"], 300.0);
        assert_eq!(event.data["firstContentfulPaint"], 350.0);

        // Later entries for the same page are ignored.
        collector.on_signal(&timing(), 40).unwrap();
        collector.poll(10_000).unwrap();
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_emits_after_settle_without_fcp() {
        let (sink, receiver) = EventSink::channel();
        let mut collector = PerformanceCollector::new(3_000, "/a");
        collector.start(CollectorContext { sink, now: 0 }).unwrap();

        collector.on_signal(&timing(), 100).unwrap();
        assert_eq!(collector.next_deadline(), Some(3_100));
        collector.poll(3_099).unwrap();
        assert!(receiver.try_recv().is_err());
        collector.poll(3_100).unwrap();

        let event = receiver.try_recv().unwrap();
        assert!(event.data.get("firstContentfulPaint").is_none());
        assert_eq!(collector.next_deadline(), None);
    }

    #[test]
    fn test_navigation_starts_new_page() {
        let (sink, receiver) = EventSink::channel();
        let mut collector = PerformanceCollector::new(0, "/a");
        collector.start(CollectorContext { sink, now: 0 }).unwrap();

        collector.on_signal(&timing(), 0).unwrap();
        collector.poll(0).unwrap();
        collector
            .on_signal(
                &Signal::Navigation(NavigationSignal {
                    kind: NavigationKind::Push,
                    url: "/b".to_string(),
                }),
                5,
            )
            .unwrap();
        collector.on_signal(&timing(), 6).unwrap();
        collector.poll(6).unwrap();
        assert_eq!(receiver.try_iter().count(), 2);
    }

    #[test]
    fn test_same_url_navigation_keeps_summary() {
        let (sink, receiver) = EventSink::channel();
        let mut collector = PerformanceCollector::new(0, "/a");
        collector.start(CollectorContext { sink, now: 0 }).unwrap();

        collector.on_signal(&timing(), 0).unwrap();
        collector.poll(0).unwrap();
        collector
            .on_signal(
                &Signal::Navigation(NavigationSignal {
                    kind: NavigationKind::Hash,
                    url: "/a".to_string(),
                }),
                5,
            )
            .unwrap();
        collector.on_signal(&timing(), 6).unwrap();
        collector.poll(6).unwrap();
        assert_eq!(receiver.try_iter().count(), 1);
    }
}
