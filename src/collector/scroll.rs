//! Scroll collector.
//!
//! Scroll events arrive at frame rate, so they are throttled: the first one
//! in a window is reported right away and the rest collapse into one trailing
//! report with the latest position.

use crate::clock::Millis;
use crate::collector::types::{ScrollSignal, Signal};
use crate::collector::{Collector, CollectorContext, CollectorError, EventSink};
use crate::core::event::{EventData, EventType, Priority};
use crate::core::timing::Throttle;
use serde_json::Value;

pub struct ScrollCollector {
    throttle: Throttle<ScrollSignal>,
    sink: Option<EventSink>,
    /// Position of the last reported scroll, for direction
    last_top: Option<f64>,
    max_depth: f64,
    /// Page the depth belongs to
    current_url: String,
}

impl ScrollCollector {
    pub fn new(throttle_ms: Millis, initial_url: impl Into<String>) -> Self {
        Self {
            throttle: Throttle::new(throttle_ms),
            sink: None,
            last_top: None,
            max_depth: 0.0,
            current_url: initial_url.into(),
        }
    }

    fn report(&mut self, scroll: ScrollSignal) {
        let Some(sink) = &self.sink else {
            return;
        };

        let depth = scroll.depth_percent();
        self.max_depth = self.max_depth.max(depth);
        let direction = match self.last_top {
            Some(prev) if scroll.scroll_top < prev => "up",
            _ => "down",
        };
        self.last_top = Some(scroll.scroll_top);

        let mut data = EventData::new();
        data.insert("scrollTop".to_string(), Value::from(scroll.scroll_top));
        data.insert("scrollHeight".to_string(), Value::from(scroll.scroll_height));
        data.insert(
            "viewportHeight".to_string(),
            Value::from(scroll.viewport_height),
        );
        data.insert("depth".to_string(), Value::from(depth.round()));
        data.insert("maxDepth".to_string(), Value::from(self.max_depth.round()));
        data.insert("direction".to_string(), Value::from(direction));
        sink.emit("scroll", EventType::Scroll, data, Some(Priority::Low));
    }
}

impl Collector for ScrollCollector {
    fn name(&self) -> &'static str {
        "scroll"
    }

    fn start(&mut self, ctx: CollectorContext) -> Result<(), CollectorError> {
        if self.sink.is_some() {
            return Err(CollectorError::AlreadyRunning(self.name()));
        }
        self.sink = Some(ctx.sink);
        Ok(())
    }

    fn stop(&mut self, _now: Millis) {
        self.throttle.cancel();
        self.sink = None;
    }

    fn is_running(&self) -> bool {
        self.sink.is_some()
    }

    fn on_signal(&mut self, signal: &Signal, now: Millis) -> Result<(), CollectorError> {
        match signal {
            Signal::Scroll(scroll) => {
                if let Some(scroll) = self.throttle.push(*scroll, now) {
                    self.report(scroll);
                }
            }
            // Depth is per page.
            Signal::Navigation(nav) if nav.url != self.current_url => {
                self.current_url = nav.url.clone();
                self.throttle.cancel();
                self.last_top = None;
                self.max_depth = 0.0;
            }
            _ => {}
        }
        Ok(())
    }

    fn poll(&mut self, now: Millis) -> Result<(), CollectorError> {
        if let Some(scroll) = self.throttle.poll(now) {
            self.report(scroll);
        }
        Ok(())
    }

    fn next_deadline(&self) -> Option<Millis> {
        self.throttle.deadline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::{NavigationKind, NavigationSignal};
    use crossbeam_channel::Receiver;

    fn scroll(top: f64) -> Signal {
        Signal::Scroll(ScrollSignal {
            scroll_top: top,
            scroll_height: 4_000.0,
            viewport_height: 1_000.0,
        })
    }

    fn started(throttle_ms: Millis) -> (ScrollCollector, Receiver<crate::collector::EmittedEvent>) {
        let (sink, receiver) = EventSink::channel();
        let mut collector = ScrollCollector::new(throttle_ms, "/");
        collector.start(CollectorContext { sink, now: 0 }).unwrap();
        (collector, receiver)
    }

    #[test]
    fn test_scroll_is_throttled() {
        let (mut collector, receiver) = started(200);
        for (i, t) in (0..10).map(|i| (i, i * 20)) {
            collector.on_signal(&scroll(i as f64 * 100.0), t).unwrap();
        }
        // Only the leading edge so far.
        assert_eq!(receiver.try_iter().count(), 1);
        assert_eq!(collector.next_deadline(), Some(200));

        collector.poll(200).unwrap();
        let trailing: Vec<_> = receiver.try_iter().collect();
        assert_eq!(trailing.len(), 1);
        assert_eq!(trailing[0].data["scrollTop"], 900.0);
        assert_eq!(trailing[0].data["direction"], "down");
        assert_eq!(trailing[0].priority, Some(Priority::Low));
        assert_eq!(collector.next_deadline(), None);
    }

    #[test]
    fn test_scroll_direction_and_depth() {
        let (mut collector, receiver) = started(100);
        collector.on_signal(&scroll(3_000.0), 0).unwrap();
        collector.on_signal(&scroll(1_000.0), 500).unwrap();
        let events: Vec<_> = receiver.try_iter().collect();
        assert_eq!(events[0].data["depth"], 100.0);
        assert_eq!(events[1].data["direction"], "up");
        assert_eq!(events[1].data["depth"], 50.0);
        assert_eq!(events[1].data["maxDepth"], 100.0);
    }

    #[test]
    fn test_stop_cancels_trailing() {
        let (mut collector, receiver) = started(200);
        collector.on_signal(&scroll(0.0), 0).unwrap();
        collector.on_signal(&scroll(10.0), 10).unwrap();
        collector.stop(100);
        collector.poll(1_000).unwrap();
        assert_eq!(receiver.try_iter().count(), 1);
        assert_eq!(collector.next_deadline(), None);
    }

    #[test]
    fn test_navigation_resets_depth() {
        let (mut collector, receiver) = started(100);
        collector.on_signal(&scroll(3_000.0), 0).unwrap();
        collector
            .on_signal(
                &Signal::Navigation(NavigationSignal {
                    kind: NavigationKind::Push,
                    url: "/next".to_string(),
                }),
                10,
            )
            .unwrap();
        collector.on_signal(&scroll(0.0), 500).unwrap();
        let events: Vec<_> = receiver.try_iter().collect();
        assert_eq!(events[1].data["maxDepth"], 25.0);
        assert_eq!(events[1].data["direction"], "down");
    }

    #[test]
    fn test_same_url_navigation_keeps_depth() {
        let (mut collector, receiver) = started(100);
        collector.on_signal(&scroll(3_000.0), 0).unwrap();
        collector
            .on_signal(
                &Signal::Navigation(NavigationSignal {
                    kind: NavigationKind::Replace,
                    url: "/".to_string(),
                }),
                10,
            )
            .unwrap();
        collector.on_signal(&scroll(1_000.0), 500).unwrap();
        let events: Vec<_> = receiver.try_iter().collect();
        assert_eq!(events[1].data["maxDepth"], 100.0);
        assert_eq!(events[1].data["direction"], "up");
    }
}
