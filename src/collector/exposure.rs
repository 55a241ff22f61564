//! Exposure collector.
//!
//! Tracks elements the host asks about and reports an `exposure` event when
//! one has been visible above its threshold for long enough. Visibility is
//! reported through the [`VisibilityObserver`] port; the timing logic lives in
//! [`ExposureStateMachine`].

use crate::clock::Millis;
use crate::collector::types::{ElementInfo, ObservationHandle, Signal};
use crate::collector::{Collector, CollectorContext, CollectorError, EventSink};
use crate::core::event::{EventData, EventType};
use crate::core::exposure::{Exposure, ExposureRecord, ExposureStateMachine};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Port to the host's visibility detection (an `IntersectionObserver`).
///
/// After `observe`, the host reports ratio changes for the returned handle as
/// [`Signal::Intersection`].
pub trait VisibilityObserver: Send {
    fn observe(&mut self, target: &ElementInfo, thresholds: &[f64]) -> ObservationHandle;
    fn unobserve(&mut self, handle: ObservationHandle);
}

/// Observer that only hands out handles.
///
/// For hosts that compute visibility themselves and look up the handle with
/// [`ExposureCollector::handle`].
#[derive(Debug, Default)]
pub struct PassiveObserver {
    next: u64,
    active: HashSet<ObservationHandle>,
}

impl PassiveObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_observing(&self, handle: ObservationHandle) -> bool {
        self.active.contains(&handle)
    }
}

impl VisibilityObserver for PassiveObserver {
    fn observe(&mut self, _target: &ElementInfo, _thresholds: &[f64]) -> ObservationHandle {
        self.next += 1;
        let handle = ObservationHandle(self.next);
        self.active.insert(handle);
        handle
    }

    fn unobserve(&mut self, handle: ObservationHandle) {
        self.active.remove(&handle);
    }
}

/// Identifier of one tracked exposure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExposureId(pub String);

impl std::fmt::Display for ExposureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How one element's exposure is judged and reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureOptions {
    /// Caller-chosen id; generated when absent
    pub id: Option<String>,
    /// Minimum intersection ratio, inclusive
    pub threshold: f64,
    pub min_duration_ms: Millis,
    /// Stop observing after the first exposure
    pub once: bool,
    /// Event name to report
    pub name: String,
    /// Extra data merged into the event
    pub data: EventData,
}

impl Default for ExposureOptions {
    fn default() -> Self {
        Self {
            id: None,
            threshold: 0.5,
            min_duration_ms: 1_000,
            once: true,
            name: "exposure".to_string(),
            data: EventData::new(),
        }
    }
}

struct Target {
    element: ElementInfo,
    options: ExposureOptions,
    machine: ExposureStateMachine,
    handle: Option<ObservationHandle>,
}

pub struct ExposureCollector {
    observer: Box<dyn VisibilityObserver>,
    targets: BTreeMap<ExposureId, Target>,
    by_handle: HashMap<ObservationHandle, ExposureId>,
    sink: Option<EventSink>,
    next_id: u64,
    /// Latest time seen, used to close out visible intervals on stop
    last_now: Millis,
}

impl ExposureCollector {
    pub fn new(observer: impl VisibilityObserver + 'static) -> Self {
        Self::with_boxed_observer(Box::new(observer))
    }

    pub fn with_boxed_observer(observer: Box<dyn VisibilityObserver>) -> Self {
        Self {
            observer,
            targets: BTreeMap::new(),
            by_handle: HashMap::new(),
            sink: None,
            next_id: 0,
            last_now: 0,
        }
    }

    /// Start tracking `element`.
    ///
    /// Reusing an id tears down the previous observation first. Observation
    /// is attached now if the collector is running, otherwise on start.
    pub fn observe(
        &mut self,
        element: ElementInfo,
        options: ExposureOptions,
        now: Millis,
    ) -> ExposureId {
        self.last_now = self.last_now.max(now);
        let id = match &options.id {
            Some(id) => ExposureId(id.clone()),
            None => {
                self.next_id += 1;
                ExposureId(format!("exp-{}", self.next_id))
            }
        };
        if self.targets.contains_key(&id) {
            self.unobserve(&id, now);
        }

        let machine =
            ExposureStateMachine::new(options.threshold, options.min_duration_ms, options.once);
        self.targets.insert(
            id.clone(),
            Target {
                element,
                options,
                machine,
                handle: None,
            },
        );
        if self.sink.is_some() {
            self.attach(&id);
        }
        tracing::debug!(exposure_id = %id, "Observing exposure");
        id
    }

    /// Stop tracking and return the final record. Never emits.
    pub fn unobserve(&mut self, id: &ExposureId, now: Millis) -> Option<ExposureRecord> {
        self.last_now = self.last_now.max(now);
        self.detach(id);
        let mut target = self.targets.remove(id)?;
        target.machine.cancel(now);
        Some(target.machine.record().clone())
    }

    /// Point an existing exposure at a different element.
    ///
    /// The old observation is torn down before the new one is attached and
    /// any pending timer is dropped; counts carry over.
    pub fn retarget(&mut self, id: &ExposureId, element: ElementInfo, now: Millis) -> bool {
        self.last_now = self.last_now.max(now);
        self.detach(id);
        let Some(target) = self.targets.get_mut(id) else {
            return false;
        };
        target.machine.disarm(now);
        target.element = element;
        if self.sink.is_some() {
            self.attach(id);
        }
        true
    }

    pub fn record(&self, id: &ExposureId) -> Option<ExposureRecord> {
        self.targets.get(id).map(|t| t.machine.record().clone())
    }

    /// Handle of the live observation for `id`, if attached.
    pub fn handle(&self, id: &ExposureId) -> Option<ObservationHandle> {
        self.targets.get(id).and_then(|t| t.handle)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn attach(&mut self, id: &ExposureId) {
        let Some(target) = self.targets.get_mut(id) else {
            return;
        };
        if target.handle.is_some() || target.machine.is_finished() {
            return;
        }
        let handle = self
            .observer
            .observe(&target.element, &[target.machine.threshold()]);
        target.handle = Some(handle);
        self.by_handle.insert(handle, id.clone());
    }

    fn detach(&mut self, id: &ExposureId) {
        if let Some(handle) = self.targets.get_mut(id).and_then(|t| t.handle.take()) {
            self.observer.unobserve(handle);
            self.by_handle.remove(&handle);
        }
    }

    fn report(&mut self, id: &ExposureId, exposure: Exposure) {
        let Some(target) = self.targets.get(id) else {
            return;
        };
        if let Some(sink) = &self.sink {
            let mut data = target.options.data.clone();
            target.element.describe_into(&mut data);
            data.insert(
                "intersectionRatio".to_string(),
                Value::from(exposure.intersection_ratio),
            );
            data.insert("duration".to_string(), Value::from(exposure.duration_ms));
            data.insert(
                "isFirstExposure".to_string(),
                Value::from(exposure.is_first_exposure),
            );
            data.insert(
                "exposureCount".to_string(),
                Value::from(exposure.exposure_count),
            );
            data.insert("exposureId".to_string(), Value::from(id.0.clone()));
            sink.emit(target.options.name.clone(), EventType::Exposure, data, None);
        }
        let finished = target.machine.is_finished();
        if finished {
            // once=true: the observer is released for good
            self.detach(id);
        }
    }
}

impl Collector for ExposureCollector {
    fn name(&self) -> &'static str {
        "exposure"
    }

    fn start(&mut self, ctx: CollectorContext) -> Result<(), CollectorError> {
        if self.sink.is_some() {
            return Err(CollectorError::AlreadyRunning(self.name()));
        }
        self.sink = Some(ctx.sink);
        let ids: Vec<ExposureId> = self.targets.keys().cloned().collect();
        for id in &ids {
            self.attach(id);
        }
        Ok(())
    }

    fn stop(&mut self, now: Millis) {
        self.last_now = self.last_now.max(now);
        let ids: Vec<ExposureId> = self.targets.keys().cloned().collect();
        for id in &ids {
            self.detach(id);
            if let Some(target) = self.targets.get_mut(id) {
                // Pending timers must not survive a stop.
                target.machine.disarm(self.last_now);
            }
        }
        self.sink = None;
    }

    fn is_running(&self) -> bool {
        self.sink.is_some()
    }

    fn on_signal(&mut self, signal: &Signal, now: Millis) -> Result<(), CollectorError> {
        let Signal::Intersection(entry) = signal else {
            return Ok(());
        };
        self.last_now = self.last_now.max(now);
        let Some(id) = self.by_handle.get(&entry.handle).cloned() else {
            tracing::trace!(handle = entry.handle.0, "Intersection for unknown handle");
            return Ok(());
        };
        let fired = self
            .targets
            .get_mut(&id)
            .and_then(|t| t.machine.update(entry.ratio, now));
        if let Some(exposure) = fired {
            self.report(&id, exposure);
        }
        Ok(())
    }

    fn poll(&mut self, now: Millis) -> Result<(), CollectorError> {
        self.last_now = self.last_now.max(now);
        let fired: Vec<(ExposureId, Exposure)> = self
            .targets
            .iter_mut()
            .filter(|(_, t)| t.handle.is_some())
            .filter_map(|(id, t)| t.machine.poll(now).map(|e| (id.clone(), e)))
            .collect();
        for (id, exposure) in fired {
            self.report(&id, exposure);
        }
        Ok(())
    }

    fn next_deadline(&self) -> Option<Millis> {
        if self.sink.is_none() {
            return None;
        }
        self.targets
            .values()
            .filter_map(|t| t.machine.deadline())
            .min()
    }
}
