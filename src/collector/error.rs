//! Error collector.
//!
//! Reports host errors and unhandled rejections, and optionally panics in the
//! embedding process. The panic hook wraps whatever hook was installed
//! before it and always calls through to it; stopping the collector only
//! silences the wrapper, so a hook installed later by someone else is never
//! removed.

use crate::clock::Millis;
use crate::collector::types::Signal;
use crate::collector::{panic_message, Collector, CollectorContext, CollectorError, EventSink};
use crate::core::event::{EventData, EventType, Priority};
use serde_json::Value;
use std::panic::{self, PanicHookInfo};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type PanicHook = Arc<dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static>;

pub struct ErrorCollector {
    capture_panics: bool,
    sink: Option<EventSink>,
    /// Set while the installed panic hook should report
    hook_active: Option<Arc<AtomicBool>>,
}

impl ErrorCollector {
    pub fn new(capture_panics: bool) -> Self {
        Self {
            capture_panics,
            sink: None,
            hook_active: None,
        }
    }

    fn install_panic_hook(&mut self, sink: EventSink) {
        if let Some(active) = &self.hook_active {
            active.store(true, Ordering::SeqCst);
            return;
        }

        let active = Arc::new(AtomicBool::new(true));
        let previous: PanicHook = Arc::from(panic::take_hook());
        let flag = active.clone();
        panic::set_hook(Box::new(move |info| {
            if flag.load(Ordering::SeqCst) {
                sink.emit("error", EventType::Error, panic_data(info), Some(Priority::High));
            }
            previous(info);
        }));
        tracing::debug!("Installed chained panic hook");
        self.hook_active = Some(active);
    }

    fn report(&self, data: EventData) {
        if let Some(sink) = &self.sink {
            sink.emit("error", EventType::Error, data, Some(Priority::High));
        }
    }
}

fn panic_data(info: &PanicHookInfo<'_>) -> EventData {
    let mut data = EventData::new();
    data.insert("errorType".to_string(), Value::from("panic"));
    data.insert(
        "message".to_string(),
        Value::from(panic_message(info.payload())),
    );
    if let Some(location) = info.location() {
        data.insert("source".to_string(), Value::from(location.file()));
        data.insert("line".to_string(), Value::from(location.line()));
        data.insert("column".to_string(), Value::from(location.column()));
    }
    if let Some(thread) = std::thread::current().name() {
        data.insert("thread".to_string(), Value::from(thread));
    }
    data
}

impl Collector for ErrorCollector {
    fn name(&self) -> &'static str {
        "error"
    }

    fn start(&mut self, ctx: CollectorContext) -> Result<(), CollectorError> {
        if self.sink.is_some() {
            return Err(CollectorError::AlreadyRunning(self.name()));
        }
        if self.capture_panics {
            self.install_panic_hook(ctx.sink.clone());
        }
        self.sink = Some(ctx.sink);
        Ok(())
    }

    fn stop(&mut self, _now: Millis) {
        if let Some(active) = &self.hook_active {
            active.store(false, Ordering::SeqCst);
        }
        self.sink = None;
    }

    fn is_running(&self) -> bool {
        self.sink.is_some()
    }

    fn on_signal(&mut self, signal: &Signal, _now: Millis) -> Result<(), CollectorError> {
        match signal {
            Signal::Error(error) => {
                let mut data = EventData::new();
                data.insert("errorType".to_string(), Value::from("error"));
                data.insert("message".to_string(), Value::from(error.message.clone()));
                if let Some(source) = &error.source {
                    data.insert("source".to_string(), Value::from(source.clone()));
                }
                if let Some(line) = error.line {
                    data.insert("line".to_string(), Value::from(line));
                }
                if let Some(column) = error.column {
                    data.insert("column".to_string(), Value::from(column));
                }
                if let Some(stack) = &error.stack {
                    data.insert("stack".to_string(), Value::from(stack.clone()));
                }
                self.report(data);
            }
            Signal::UnhandledRejection(rejection) => {
                let mut data = EventData::new();
                data.insert("errorType".to_string(), Value::from("unhandledrejection"));
                data.insert("message".to_string(), Value::from(rejection.reason.clone()));
                self.report(data);
            }
            _ => {}
        }
        Ok(())
    }
}
