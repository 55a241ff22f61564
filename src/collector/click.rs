//! Click collector.
//!
//! Every click is distinct intent, so there is no debouncing.

use crate::clock::Millis;
use crate::collector::types::Signal;
use crate::collector::{Collector, CollectorContext, CollectorError, EventSink};
use crate::core::event::{EventData, EventType};
use serde_json::Value;

#[derive(Debug, Default)]
pub struct ClickCollector {
    sink: Option<EventSink>,
}

impl ClickCollector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Collector for ClickCollector {
    fn name(&self) -> &'static str {
        "click"
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
        let (Signal::Click(click), Some(sink)) = (signal, &self.sink) else {
            return Ok(());
        };

        let mut data = EventData::new();
        click.target.describe_into(&mut data);
        data.insert("text".to_string(), Value::from(click.target.text_snippet()));
        sink.emit("click", EventType::Click, data, None);
        Ok(())
    }
}
