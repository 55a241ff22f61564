//! Core functionality for the tracker.
//!
//! This module contains:
//! - Event and option types that travel through the pipeline
//! - Session and page identity
//! - The event queue (batching, priorities, overflow)
//! - The exposure state machine
//! - Debounce/throttle deadline helpers

pub mod binding;
pub mod event;
pub mod exposure;
pub mod queue;
pub mod session;
pub mod timing;

// Re-export commonly used types
pub use binding::{TrackBinding, Trigger};
pub use event::{infer_event_type, EventData, EventType, Priority, TrackEvent, TrackOptions};
pub use exposure::{Exposure, ExposureRecord, ExposureState, ExposureStateMachine};
pub use queue::{into_batches, EventQueue, FlushReason, QueueItem, QueuePolicy};
pub use session::{Page, Session, SessionManager};
pub use timing::{Debouncer, Throttle};
