//! Synheart Tracker - behavioral event tracking for web-style applications.
//!
//! This library captures user-behavior and runtime-health signals (clicks,
//! scrolling, input, navigation, performance timings, errors, element
//! visibility) and ships them as structured events to a collector endpoint.
//!
//! The host does not link a browser in. It feeds raw [`Signal`]s to the
//! tracker and provides two small ports: a [`VisibilityObserver`] for element
//! visibility and a [`Transport`] for delivery (an HTTP transport ships
//! behind the default `http` feature).
//!
//! # Guarantees
//!
//! - **Never in the way**: tracking calls never return errors or panic into
//!   host code; bad events are dropped and counted
//! - **No input values**: the input collector reports lengths, never content
//! - **Bounded memory**: the queue drops low-priority events first when full
//! - **Best effort**: at-most-once delivery with bounded retry, no persistence
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Synheart Tracker                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │ Collectors  │──▶│   Tracker   │──▶│ EventQueue  │         │
//! │  │ (7 kinds)   │   │  (stamping) │   │ (batching)  │         │
//! │  └─────────────┘   └─────────────┘   └─────────────┘         │
//! │         │                 │                 │                │
//! │         ▼                 ▼                 ▼                │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │  Exposure   │   │    Stats    │   │  Transport  │         │
//! │  │   machine   │   │             │   │ (retry/bcn) │         │
//! │  └─────────────┘   └─────────────┘   └─────────────┘         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use synheart_tracker::{event_data, Tracker, TrackerConfig};
//!
//! # async fn run() -> Result<(), synheart_tracker::ConfigError> {
//! let tracker = Arc::new(Tracker::new(TrackerConfig::new(
//!     "https://collect.example.com/v1/events",
//! ))?);
//! tracker.install();
//! let driver = tracker.spawn_driver();
//!
//! tracker.track("signup", event_data! { "plan" => "pro" });
//!
//! tracker.uninstall();
//! driver.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod collector;
pub mod config;
pub mod core;
pub mod error;
pub mod stats;
pub mod tracker;
pub mod transport;

// Re-export key types at crate root for convenience
pub use clock::{Clock, ManualClock, Millis, SystemClock};
pub use collector::{
    Collector, CollectorContext, CollectorError, ElementInfo, EventSink, ExposureId,
    ExposureOptions, PassiveObserver, Signal, VisibilityObserver,
};
pub use config::{ConfigError, SourceConfig, TrackerConfig};
pub use core::{
    EventData, EventType, ExposureRecord, FlushReason, Page, Priority, Session, TrackBinding,
    TrackEvent, TrackOptions, Trigger,
};
pub use error::TrackerError;
pub use stats::{StatsSnapshot, TrackerStats};
pub use tracker::{DriverHandle, FlushReport, ListenerId, Tracker, TrackerBuilder};
pub use transport::{MemoryTransport, RetryPolicy, Transport, TransportError};

#[cfg(feature = "http")]
pub use transport::HttpTransport;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
