//! Navigation collector.
//!
//! History mutations (`push`/`replace`), back/forward (`pop`) and hash
//! changes each report a `navigation` event when the location actually
//! changed. The tracker starts a new page when it sees one.

use crate::clock::Millis;
use crate::collector::types::Signal;
use crate::collector::{Collector, CollectorContext, CollectorError, EventSink};
use crate::core::event::{EventData, EventType};
use serde_json::Value;

pub struct NavigationCollector {
    current_url: String,
    sink: Option<EventSink>,
}

impl NavigationCollector {
    pub fn new(initial_url: impl Into<String>) -> Self {
        Self {
            current_url: initial_url.into(),
            sink: None,
        }
    }

    pub fn current_url(&self) -> &str {
        &self.current_url
    }
}

impl Collector for NavigationCollector {
    fn name(&self) -> &'static str {
        "navigation"
    }

    fn start(&mut self, ctx: CollectorContext) -> Result<(), CollectorError> {
        if self.sink.is_some() {
            return Err(CollectorError::AlreadyRunning(self.name()));
        }
        self.sink = Some(ctx.sink);
        Ok(())
    }

    fn stop(&mut self, _now: Millis) {
        self.sink = None;
    }

    fn is_running(&self) -> bool {
        self.sink.is_some()
    }

    fn on_signal(&mut self, signal: &Signal, _now: Millis) -> Result<(), CollectorError> {
        let (Signal::Navigation(nav), Some(sink)) = (signal, &self.sink) else {
            return Ok(());
        };
        if nav.url == self.current_url {
            tracing::trace!(url = %nav.url, kind = nav.kind.as_str(), "Navigation to same URL ignored");
            return Ok(());
        }

        let from = std::mem::replace(&mut self.current_url, nav.url.clone());
        let mut data = EventData::new();
        data.insert("from".to_string(), Value::from(from));
        data.insert("to".to_string(), Value::from(nav.url.clone()));
        data.insert("kind".to_string(), Value::from(nav.kind.as_str()));
        sink.emit("navigation", EventType::Navigation, data, None);
        Ok(())
    }
}
