//! Error taxonomy of the tracker.
//!
//! Only configuration errors ever reach the host, from construction. The
//! other kinds are contained inside the pipeline: they are logged, counted in
//! [`TrackerStats`](crate::stats::TrackerStats) and the affected events are
//! dropped.

use crate::collector::CollectorError;
use crate::config::ConfigError;
use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error(transparent)]
    Collector(#[from] CollectorError),
    #[error("malformed event: {0}")]
    MalformedEvent(String),
    #[error("delivery failed: {0}")]
    Transport(#[from] TransportError),
    #[error("queue full, dropped {dropped} event(s)")]
    QueueOverflow { dropped: usize },
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TrackerError::MalformedEvent("event name is empty".to_string());
        assert_eq!(err.to_string(), "malformed event: event name is empty");

        let err: TrackerError = TransportError::Timeout.into();
        assert_eq!(err.to_string(), "delivery failed: request timed out");

        let err: TrackerError = ConfigError::MissingEndpoint.into();
        assert!(err.to_string().contains("endpoint is required"));
    }
}
