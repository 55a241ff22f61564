//! The tracker: public API and orchestration of the pipeline.
//!
//! ```text
//! Signal ──▶ CollectorRegistry ──▶ EventSink ──▶ record (stamp identity)
//!                                                   │
//!                                                   ▼
//!            Transport ◀── deliver (retry) ◀── EventQueue
//! ```
//!
//! All state sits behind one mutex. Delivery and listener callbacks run with
//! the lock released, so tracking continues while a flush is in flight.

use crate::clock::{Clock, Millis, SharedClock, SystemClock};
use crate::collector::{
    panic_message, ClickCollector, Collector, CollectorContext, CollectorRegistry, ElementInfo,
    EmittedEvent, ErrorCollector, EventSink, ExposureCollector, ExposureId, ExposureOptions,
    InputCollector, NavigationCollector, ObservationHandle, PassiveObserver,
    PerformanceCollector, ScrollCollector, Signal, VisibilityObserver,
};
use crate::config::{as_millis, ConfigError, TrackerConfig};
use crate::core::binding::{TrackBinding, Trigger};
use crate::core::event::{
    infer_event_type, EventData, EventType, Priority, TrackEvent, TrackOptions,
};
use crate::core::exposure::ExposureRecord;
use crate::core::queue::{into_batches, EventQueue, FlushReason, QueueItem};
use crate::core::session::{Page, SessionManager};
use crate::error::TrackerError;
use crate::stats::{SharedTrackerStats, TrackerStats};
use crate::transport::{deliver, encode_batch, DeliveryOutcome, RetryPolicy, Transport};
use crossbeam_channel::Receiver;
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;

/// Longest the driver sleeps before checking its deadlines again.
const IDLE_WAIT: Duration = Duration::from_secs(60);

/// Identifies a listener registered with [`Tracker::on_track`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&TrackEvent) + Send + Sync + 'static>;

/// What one flush did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub reason: FlushReason,
    /// Events taken from the queue
    pub events: usize,
    pub delivered: usize,
    pub dropped: usize,
    pub batches_sent: usize,
    pub batches_failed: usize,
}

impl FlushReport {
    fn new(reason: FlushReason) -> Self {
        Self {
            reason,
            events: 0,
            delivered: 0,
            dropped: 0,
            batches_sent: 0,
            batches_failed: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events == 0
    }
}

struct State {
    installed: bool,
    sessions: SessionManager,
    page: Option<Page>,
    user_id: Option<String>,
    globals: EventData,
    queue: EventQueue,
    registry: CollectorRegistry,
}

/// Captures events, stamps them with identity and ships them in batches.
///
/// Share it as `Arc<Tracker>`; every method takes `&self`.
pub struct Tracker {
    config: TrackerConfig,
    clock: SharedClock,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    stats: SharedTrackerStats,
    sink: EventSink,
    receiver: Receiver<EmittedEvent>,
    state: Mutex<State>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
    wake: Notify,
    /// Held for the whole of a flush, so flushes deliver one after another.
    flushing: tokio::sync::Mutex<()>,
}

impl Tracker {
    /// Tracker with the default HTTP transport and the system clock.
    pub fn new(config: TrackerConfig) -> Result<Self, ConfigError> {
        TrackerBuilder::new(config).build()
    }

    pub fn builder(config: TrackerConfig) -> TrackerBuilder {
        TrackerBuilder::new(config)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn now(&self) -> Millis {
        self.clock.now_ms()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<(ListenerId, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn initial_page(&self) -> Page {
        Page::new(self.config.initial_url.clone(), self.config.referrer.clone())
    }

    /// Start the collectors and open the session and initial page.
    ///
    /// Tracks a pageview when `auto_page_view` is set. Calling it again while
    /// installed does nothing.
    pub fn install(&self) {
        let now = self.now();
        let tracked = {
            let mut state = self.state();
            if state.installed {
                tracing::debug!("Tracker already installed");
                return;
            }
            state.installed = true;
            state.sessions.touch(now);
            if state.page.is_none() {
                state.page = Some(self.initial_page());
            }
            state.registry.start_all(&CollectorContext {
                sink: self.sink.clone(),
                now,
            });

            let mut tracked = self.drain_locked(&mut state, now);
            if self.config.auto_page_view {
                tracked.extend(self.page_view_locked(&mut state, EventData::new(), now));
            }
            tracing::info!(
                collectors = ?state.registry.names(),
                session_id = state.sessions.current().map(|s| s.id.as_str()).unwrap_or_default(),
                "Tracker installed"
            );
            tracked
        };
        self.after_track(tracked);
    }

    /// Stop every collector and send what is still buffered by beacon.
    ///
    /// Safe to call more than once; only the first call flushes.
    pub fn uninstall(&self) {
        let now = self.now();
        let (items, tracked) = {
            let mut state = self.state();
            if !state.installed {
                tracing::debug!("Tracker not installed");
                return;
            }
            state.installed = false;
            // Timers already due fire before teardown cancels them.
            state.registry.poll(now);
            state.registry.stop_all(now);
            let tracked = self.drain_locked(&mut state, now);
            (state.queue.take_all(), tracked)
        };
        self.notify_listeners(&tracked);

        let remaining = items.len();
        self.send_beacons(items);
        tracing::info!(flushed = remaining, "Tracker uninstalled");
    }

    pub fn is_installed(&self) -> bool {
        self.state().installed
    }

    /// Track a custom event with default options.
    pub fn track(&self, name: impl Into<String>, data: EventData) {
        self.track_with(name, data, TrackOptions::default());
    }

    /// Track an event. Never fails: invalid events are dropped and counted.
    pub fn track_with(&self, name: impl Into<String>, data: EventData, options: TrackOptions) {
        let now = self.now();
        let name = name.into();
        let event_type = options
            .event_type
            .unwrap_or_else(|| infer_event_type(&name));
        let priority = options.priority.unwrap_or_default();

        let tracked = {
            let mut state = self.state();
            let mut tracked = self.drain_locked(&mut state, now);
            tracked.extend(self.record_locked(&mut state, name, event_type, data, priority, now));
            tracked
        };
        self.after_track(tracked);
    }

    /// Start a new page and track a `pageview` for it.
    ///
    /// `url` and `referrer` in `data` override the page location; without a
    /// `url` the current page is viewed again under a new id.
    pub fn track_page_view(&self, data: EventData) {
        let now = self.now();
        let url = data.get("url").and_then(Value::as_str).map(str::to_string);
        let referrer = data
            .get("referrer")
            .and_then(Value::as_str)
            .map(str::to_string);

        let tracked = {
            let mut state = self.state();
            let mut tracked = self.drain_locked(&mut state, now);
            let current = state.page.take().unwrap_or_else(|| self.initial_page());
            let next = match url {
                Some(url) => Page::new(url, referrer.unwrap_or_else(|| current.url.clone())),
                None => Page::new(current.url.clone(), referrer.unwrap_or(current.referrer)),
            };
            state.page = Some(next);
            tracked.extend(self.page_view_locked(&mut state, data, now));
            tracked
        };
        self.after_track(tracked);
    }

    /// Attach a user id to events tracked from now on.
    pub fn set_user_id(&self, user_id: impl Into<String>) {
        self.state().user_id = Some(user_id.into());
    }

    pub fn clear_user_id(&self) {
        self.state().user_id = None;
    }

    pub fn user_id(&self) -> Option<String> {
        self.state().user_id.clone()
    }

    /// Merge `properties` into the global properties; later values win.
    pub fn set_global_properties(&self, properties: EventData) {
        self.state().globals.extend(properties);
    }

    pub fn global_properties(&self) -> EventData {
        self.state().globals.clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.state().sessions.current().map(|s| s.id.clone())
    }

    pub fn page_id(&self) -> Option<String> {
        self.state().page.as_ref().map(|p| p.id.clone())
    }

    pub fn page(&self) -> Option<Page> {
        self.state().page.clone()
    }

    /// Feed a raw host signal to the collectors.
    pub fn dispatch(&self, signal: Signal) {
        match signal {
            Signal::Unload => self.handle_unload(),
            Signal::Binding { binding, trigger } => {
                self.fire_binding(&binding, trigger);
            }
            signal => {
                let now = self.now();
                let tracked = {
                    let mut state = self.state();
                    state.registry.dispatch(&signal, now);
                    self.drain_locked(&mut state, now)
                };
                self.after_track(tracked);
            }
        }
    }

    /// Track `binding` if `trigger` is the interaction it listens for.
    pub fn fire_binding(&self, binding: &TrackBinding, trigger: Trigger) -> bool {
        if !binding.matches(trigger) {
            return false;
        }
        let options = TrackOptions {
            priority: None,
            event_type: binding.event_type,
        };
        self.track_with(binding.name.clone(), binding.data.clone(), options);
        true
    }

    /// The page is going away: hand everything buffered to the beacon path.
    pub fn handle_unload(&self) {
        let now = self.now();
        let (items, tracked) = {
            let mut state = self.state();
            let tracked = self.drain_locked(&mut state, now);
            (state.queue.take_all(), tracked)
        };
        self.notify_listeners(&tracked);
        self.send_beacons(items);
    }

    /// Deliver everything buffered now.
    ///
    /// Resolves once every batch was delivered or given up on. A flush already
    /// in flight (from the driver or another caller) finishes first, so the
    /// returned report only covers what this call took from the queue, but
    /// nothing tracked before the call is still pending when it resolves.
    pub async fn flush(&self) -> FlushReport {
        self.flush_with(FlushReason::Manual).await
    }

    /// Run due timers and flush if a trigger fired.
    pub async fn tick(&self) -> Option<FlushReport> {
        let now = self.now();
        let (reason, tracked) = {
            let mut state = self.state();
            state.registry.poll(now);
            let tracked = self.drain_locked(&mut state, now);
            (state.queue.flush_reason(now), tracked)
        };
        self.notify_listeners(&tracked);

        let reason = reason?;
        Some(self.flush_with(reason).await)
    }

    /// Earliest time [`tick`](Self::tick) has work to do.
    pub fn next_deadline(&self) -> Option<Millis> {
        if !self.receiver.is_empty() {
            return Some(self.now());
        }
        let state = self.state();
        [state.registry.next_deadline(), state.queue.next_deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    /// Call `listener` with every event after it was enqueued.
    pub fn on_track<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&TrackEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners().push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Exposure options with the configured defaults.
    pub fn exposure_options(&self) -> ExposureOptions {
        ExposureOptions {
            threshold: self.config.exposure_threshold,
            min_duration_ms: as_millis(self.config.exposure_min_duration),
            ..ExposureOptions::default()
        }
    }

    /// Report an `exposure` event once `element` has been visible long enough.
    pub fn observe_exposure(&self, element: ElementInfo, options: ExposureOptions) -> ExposureId {
        let now = self.now();
        self.state()
            .registry
            .exposure_mut()
            .observe(element, options, now)
    }

    /// Stop observing and return the final record.
    pub fn unobserve_exposure(&self, id: &ExposureId) -> Option<ExposureRecord> {
        let now = self.now();
        self.state().registry.exposure_mut().unobserve(id, now)
    }

    /// Point an observed exposure at another element, keeping its counts.
    pub fn retarget_exposure(&self, id: &ExposureId, element: ElementInfo) -> bool {
        let now = self.now();
        self.state()
            .registry
            .exposure_mut()
            .retarget(id, element, now)
    }

    pub fn exposure_record(&self, id: &ExposureId) -> Option<ExposureRecord> {
        self.state().registry.exposure().record(id)
    }

    /// Handle the host reports [`Signal::Intersection`] entries for.
    pub fn exposure_handle(&self, id: &ExposureId) -> Option<ObservationHandle> {
        self.state().registry.exposure().handle(id)
    }

    /// Add a host-defined collector. It starts right away if installed.
    pub fn register_collector(&self, collector: Box<dyn Collector>) {
        let now = self.now();
        let mut state = self.state();
        state.registry.register(collector);
        if state.installed {
            state.registry.start_all(&CollectorContext {
                sink: self.sink.clone(),
                now,
            });
        }
    }

    pub fn stats(&self) -> &TrackerStats {
        &self.stats
    }

    /// Number of buffered events.
    pub fn pending_events(&self) -> usize {
        self.state().queue.len()
    }

    /// Copies of the buffered events, in enqueue order.
    pub fn queued_events(&self) -> Vec<TrackEvent> {
        self.state().queue.events().cloned().collect()
    }

    /// Run [`tick`](Self::tick) in the background whenever a deadline is due.
    ///
    /// Must be called inside a tokio runtime. Dropping the handle stops the
    /// driver.
    pub fn spawn_driver(self: &Arc<Self>) -> DriverHandle {
        let tracker = Arc::clone(self);
        let (shutdown, mut stopped) = oneshot::channel();
        let task = tokio::spawn(async move {
            tracing::debug!("Tracker driver started");
            loop {
                let wait = match tracker.next_deadline() {
                    Some(deadline) => {
                        let ms = deadline.saturating_sub(tracker.now());
                        Duration::from_millis(u64::try_from(ms).unwrap_or(0)).min(IDLE_WAIT)
                    }
                    None => IDLE_WAIT,
                };
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = tracker.wake.notified() => {}
                    _ = tokio::time::sleep(wait) => {}
                }
                tracker.tick().await;
            }
            tracing::debug!("Tracker driver stopped");
        });
        DriverHandle {
            shutdown: Some(shutdown),
            task,
        }
    }

    /// Stamp and enqueue one event. Returns `None` if it was dropped.
    fn record_locked(
        &self,
        state: &mut State,
        name: String,
        event_type: EventType,
        data: EventData,
        priority: Priority,
        now: Millis,
    ) -> Option<TrackEvent> {
        if name.trim().is_empty() {
            self.stats.record_malformed();
            let error = TrackerError::MalformedEvent("event name is empty".to_string());
            tracing::warn!(error = %error, event_type = event_type.as_str(), "Dropping event");
            return None;
        }

        let session_id = state.sessions.touch(now).id.clone();
        let page_id = state
            .page
            .get_or_insert_with(|| self.initial_page())
            .id
            .clone();

        let mut merged = EventData::new();
        if let Some(app_name) = &self.config.app_name {
            merged.insert("appName".to_string(), Value::from(app_name.clone()));
        }
        merged.extend(state.globals.clone());
        merged.extend(data);

        let event = TrackEvent {
            name,
            event_type,
            data: merged,
            priority,
            timestamp: now,
            session_id,
            page_id,
            user_id: state.user_id.clone(),
        };

        let dropped = state.queue.enqueue(event.clone(), now);
        self.stats.record_tracked();
        if !dropped.is_empty() {
            self.stats.record_overflow(dropped.len() as u64);
            let error = TrackerError::QueueOverflow {
                dropped: dropped.len(),
            };
            for victim in &dropped {
                tracing::warn!(
                    error = %error,
                    event = %victim.name,
                    priority = ?victim.priority,
                    "Dropping buffered event"
                );
            }
        }
        tracing::debug!(
            event = %event.name,
            event_type = event.event_type.as_str(),
            priority = ?event.priority,
            queued = state.queue.len(),
            "Tracked event"
        );
        Some(event)
    }

    fn page_view_locked(
        &self,
        state: &mut State,
        mut data: EventData,
        now: Millis,
    ) -> Option<TrackEvent> {
        let page = state
            .page
            .get_or_insert_with(|| self.initial_page())
            .clone();
        data.entry("url")
            .or_insert_with(|| Value::from(page.url.clone()));
        data.entry("referrer")
            .or_insert_with(|| Value::from(page.referrer.clone()));
        self.record_locked(
            state,
            "pageview".to_string(),
            EventType::Pageview,
            data,
            Priority::Normal,
            now,
        )
    }

    /// Move everything collectors emitted into the queue.
    fn drain_locked(&self, state: &mut State, now: Millis) -> Vec<TrackEvent> {
        let mut tracked = Vec::new();
        while let Ok(emitted) = self.receiver.try_recv() {
            let navigated_to = match emitted.event_type {
                EventType::Navigation => emitted
                    .data
                    .get("to")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            };
            if let Some(url) = &navigated_to {
                let next = match &state.page {
                    Some(page) => page.next(url.clone()),
                    None => Page::new(url.clone(), self.config.referrer.clone()),
                };
                tracing::debug!(page_id = %next.id, url = %next.url, "New page after navigation");
                state.page = Some(next);
            }

            let priority = emitted.priority.unwrap_or_default();
            tracked.extend(self.record_locked(
                state,
                emitted.name,
                emitted.event_type,
                emitted.data,
                priority,
                now,
            ));
            if navigated_to.is_some() && self.config.auto_page_view {
                tracked.extend(self.page_view_locked(state, EventData::new(), now));
            }
        }
        tracked
    }

    fn after_track(&self, tracked: Vec<TrackEvent>) {
        if tracked.is_empty() {
            return;
        }
        self.notify_listeners(&tracked);
        self.wake.notify_one();
    }

    fn notify_listeners(&self, events: &[TrackEvent]) {
        if events.is_empty() {
            return;
        }
        let listeners: Vec<Listener> = self
            .listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for event in events {
            for listener in &listeners {
                if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
                    tracing::warn!(
                        event = %event.name,
                        panic = %panic_message(panic.as_ref()),
                        "on_track listener panicked"
                    );
                }
            }
        }
    }

    async fn flush_with(&self, reason: FlushReason) -> FlushReport {
        let _flushing = self.flushing.lock().await;
        let now = self.now();
        let (items, tracked) = {
            let mut state = self.state();
            let tracked = self.drain_locked(&mut state, now);
            (state.queue.take_all(), tracked)
        };
        self.notify_listeners(&tracked);

        let mut report = FlushReport::new(reason);
        if items.is_empty() {
            return report;
        }
        report.events = items.len();
        tracing::debug!(%reason, events = report.events, "Flushing queue");

        for batch in into_batches(items, self.config.batch_size) {
            let count = batch.len();
            match deliver(self.transport.as_ref(), &self.retry, batch).await {
                DeliveryOutcome::Delivered { .. } => {
                    self.stats.record_delivered(count as u64);
                    report.delivered += count;
                    report.batches_sent += 1;
                }
                DeliveryOutcome::Dropped { .. } => {
                    self.stats.record_transport_drop(count as u64);
                    report.dropped += count;
                    report.batches_failed += 1;
                }
            }
        }
        report
    }

    fn send_beacons(&self, items: Vec<QueueItem>) {
        if items.is_empty() {
            return;
        }
        tracing::debug!(events = items.len(), "Flushing through beacon");
        for batch in into_batches(items, self.config.batch_size) {
            let count = batch.len();
            let result = encode_batch(&batch).and_then(|payload| self.transport.send_beacon(payload));
            match result {
                Ok(()) => self.stats.record_beacon(count as u64),
                Err(e) => {
                    self.stats.record_transport_drop(count as u64);
                    let error = TrackerError::from(e);
                    tracing::warn!(events = count, error = %error, "Beacon hand-off failed, dropping batch");
                }
            }
        }
    }
}

/// Handle to a driver started with [`Tracker::spawn_driver`].
pub struct DriverHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// Stop the driver and wait for it to finish its current tick.
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(error = %e, "Tracker driver task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// Builds a [`Tracker`] with custom ports.
pub struct TrackerBuilder {
    config: TrackerConfig,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<SharedClock>,
    observer: Option<Box<dyn VisibilityObserver>>,
    listeners: Vec<Listener>,
    collectors: Vec<Box<dyn Collector>>,
}

impl TrackerBuilder {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            transport: None,
            clock: None,
            observer: None,
            listeners: Vec::new(),
            collectors: Vec::new(),
        }
    }

    /// Deliver through `transport` instead of HTTP.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Visibility detection for exposures; defaults to [`PassiveObserver`].
    pub fn observer(mut self, observer: impl VisibilityObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Listener registered before anything is tracked.
    pub fn on_track<F>(mut self, listener: F) -> Self
    where
        F: Fn(&TrackEvent) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self
    }

    pub fn collector(mut self, collector: Box<dyn Collector>) -> Self {
        self.collectors.push(collector);
        self
    }

    pub fn build(self) -> Result<Tracker, ConfigError> {
        let config = self.config;
        config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(&config)?,
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let stats: SharedTrackerStats = Arc::new(TrackerStats::new());

        let observer = self
            .observer
            .unwrap_or_else(|| Box::new(PassiveObserver::new()));
        let mut registry = CollectorRegistry::new(
            ExposureCollector::with_boxed_observer(observer),
            stats.clone(),
        );
        registry.set_exposure_enabled(config.sources.exposure);
        for collector in standard_collectors(&config) {
            registry.register(collector);
        }
        for collector in self.collectors {
            registry.register(collector);
        }

        let listeners: Vec<(ListenerId, Listener)> = self
            .listeners
            .into_iter()
            .enumerate()
            .map(|(i, listener)| (ListenerId(i as u64), listener))
            .collect();
        let next_listener = AtomicU64::new(listeners.len() as u64);

        let (sink, receiver) = EventSink::channel();
        let state = State {
            installed: false,
            sessions: SessionManager::new(as_millis(config.session_timeout)),
            page: None,
            user_id: None,
            globals: EventData::new(),
            queue: EventQueue::new(config.queue_policy()),
            registry,
        };

        tracing::debug!(endpoint = %config.endpoint, "Tracker created");
        Ok(Tracker {
            retry: config.retry_policy(),
            config,
            clock,
            transport,
            stats,
            sink,
            receiver,
            state: Mutex::new(state),
            listeners: Mutex::new(listeners),
            next_listener,
            wake: Notify::new(),
            flushing: tokio::sync::Mutex::new(()),
        })
    }
}

fn standard_collectors(config: &TrackerConfig) -> Vec<Box<dyn Collector>> {
    let mut collectors: Vec<Box<dyn Collector>> = Vec::new();
    if config.auto_click {
        collectors.push(Box::new(ClickCollector::new()));
    }
    let sources = &config.sources;
    if sources.scroll {
        collectors.push(Box::new(ScrollCollector::new(
            as_millis(config.scroll_throttle),
            config.initial_url.clone(),
        )));
    }
    if sources.input {
        collectors.push(Box::new(InputCollector::new(as_millis(
            config.input_debounce,
        ))));
    }
    if sources.navigation {
        collectors.push(Box::new(NavigationCollector::new(
            config.initial_url.clone(),
        )));
    }
    if sources.performance {
        collectors.push(Box::new(PerformanceCollector::new(
            as_millis(config.performance_settle),
            config.initial_url.clone(),
        )));
    }
    if sources.errors {
        collectors.push(Box::new(ErrorCollector::new(config.capture_panics)));
    }
    collectors
}

#[cfg(feature = "http")]
fn default_transport(config: &TrackerConfig) -> Result<Arc<dyn Transport>, ConfigError> {
    Ok(Arc::new(crate::transport::HttpTransport::new(config)?))
}

#[cfg(not(feature = "http"))]
fn default_transport(_config: &TrackerConfig) -> Result<Arc<dyn Transport>, ConfigError> {
    Err(ConfigError::Transport(
        "no transport given and the `http` feature is disabled".to_string(),
    ))
}
