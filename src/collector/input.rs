//! Input collector.
//!
//! Reports form edits after the user pauses typing, one event per field per
//! pause. Only the value length leaves the collector, never the value.

use crate::clock::Millis;
use crate::collector::types::{InputSignal, Signal};
use crate::collector::{Collector, CollectorContext, CollectorError, EventSink};
use crate::core::event::{EventData, EventType};
use crate::core::timing::Debouncer;
use serde_json::Value;
use std::collections::HashMap;

pub struct InputCollector {
    debounce_ms: Millis,
    /// One debouncer per field, keyed by [`ElementInfo::key`](crate::collector::ElementInfo::key)
    pending: HashMap<String, Debouncer<InputSignal>>,
    sink: Option<EventSink>,
}

impl InputCollector {
    pub fn new(debounce_ms: Millis) -> Self {
        Self {
            debounce_ms,
            pending: HashMap::new(),
            sink: None,
        }
    }

    fn report(&self, input: InputSignal) {
        let Some(sink) = &self.sink else {
            return;
        };
        let mut data = EventData::new();
        input.target.describe_into(&mut data);
        data.insert(
            "elementName".to_string(),
            Value::from(input.target.name.clone().unwrap_or_default()),
        );
        data.insert(
            "inputType".to_string(),
            Value::from(input.target.input_type.clone().unwrap_or_else(|| "text".to_string())),
        );
        data.insert("valueLength".to_string(), Value::from(input.value_length));
        sink.emit("input", EventType::Input, data, None);
    }
}

impl Collector for InputCollector {
    fn name(&self) -> &'static str {
        "input"
    }

    fn start(&mut self, ctx: CollectorContext) -> Result<(), CollectorError> {
        if self.sink.is_some() {
            return Err(CollectorError::AlreadyRunning(self.name()));
        }
        self.sink = Some(ctx.sink);
        Ok(())
    }

    fn stop(&mut self, _now: Millis) {
        self.pending.clear();
        self.sink = None;
    }

    fn is_running(&self) -> bool {
        self.sink.is_some()
    }

    fn on_signal(&mut self, signal: &Signal, now: Millis) -> Result<(), CollectorError> {
        if let Signal::Input(input) = signal {
            let delay = self.debounce_ms;
            self.pending
                .entry(input.target.key())
                .or_insert_with(|| Debouncer::new(delay))
                .push(input.clone(), now);
        }
        Ok(())
    }

    fn poll(&mut self, now: Millis) -> Result<(), CollectorError> {
        let mut due: Vec<InputSignal> = self
            .pending
            .values_mut()
            .filter_map(|debounce| debounce.poll(now))
            .collect();
        self.pending.retain(|_, debounce| debounce.is_pending());

        // HashMap order is arbitrary; report fields in element order.
        due.sort_by(|a, b| a.target.key().cmp(&b.target.key()));
        for input in due {
            self.report(input);
        }
        Ok(())
    }

    fn next_deadline(&self) -> Option<Millis> {
        self.pending.values().filter_map(Debouncer::deadline).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::ElementInfo;

    fn typed(id: &str, len: usize) -> Signal {
        Signal::Input(InputSignal {
            target: ElementInfo::new("input")
                .with_id(id)
                .with_name(id)
                .with_input_type("email"),
            value_length: len,
        })
    }

    #[test]
    fn test_input_debounced_per_field() {
        let (sink, receiver) = EventSink::channel();
        let mut collector = InputCollector::new(500);
        collector.start(CollectorContext { sink, now: 0 }).unwrap();

        for (t, len) in [(0, 1), (100, 2), (250, 3)] {
            collector.on_signal(&typed("email", len), t).unwrap();
        }
        collector.on_signal(&typed("name", 4), 300).unwrap();
        assert_eq!(collector.next_deadline(), Some(750));

        collector.poll(749).unwrap();
        assert!(receiver.try_recv().is_err());

        collector.poll(750).unwrap();
        let event = receiver.try_recv().unwrap();
        assert_eq!(event.data["elementId"], "email");
        assert_eq!(event.data["valueLength"], 3);
        assert_eq!(event.data["inputType"], "email");
        assert!(event.data.get("value").is_none());
        assert_eq!(collector.next_deadline(), Some(800));

        collector.poll(800).unwrap();
        assert_eq!(receiver.try_recv().unwrap().data["elementId"], "name");
        assert_eq!(collector.next_deadline(), None);
    }

    #[test]
    fn test_stop_discards_pending_input() {
        let (sink, receiver) = EventSink::channel();
        let mut collector = InputCollector::new(500);
        collector.start(CollectorContext { sink, now: 0 }).unwrap();
        collector.on_signal(&typed("email", 5), 0).unwrap();
        collector.stop(100);
        collector.poll(10_000).unwrap();
        assert!(receiver.try_recv().is_err());
        assert_eq!(collector.next_deadline(), None);
    }
}
