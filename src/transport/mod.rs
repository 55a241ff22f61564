//! Delivery of event batches to the collector endpoint.
//!
//! A [`Transport`] moves one serialized payload. Retrying, backoff and the
//! decision to give up live in [`deliver`], so every transport gets the same
//! at-most-once, bounded-retry behavior.

#[cfg(feature = "http")]
pub mod http;
pub mod memory;

use crate::core::queue::QueueItem;
use async_trait::async_trait;
use std::time::Duration;

#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use memory::MemoryTransport;

/// Transport error types.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// Network/HTTP error
    #[error("network error: {0}")]
    Network(String),
    /// Server returned an error response
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("request timed out")]
    Timeout,
}

impl TransportError {
    /// Whether sending the same payload again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(_) | TransportError::Timeout => true,
            TransportError::Server { status, .. } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
            TransportError::Serialization(_) => false,
        }
    }
}

/// Moves serialized payloads to the collector.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one payload and report the outcome.
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError>;

    /// Hand a payload off without waiting for the result.
    ///
    /// Used while the page unloads, when nothing can be awaited.
    fn send_beacon(&self, payload: Vec<u8>) -> Result<(), TransportError>;
}

/// Exponential backoff between delivery attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per batch, the first one included
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let nanos = self.base_delay.as_nanos() as f64 * factor;
        if !nanos.is_finite() || nanos >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        Duration::from_nanos(nanos as u64)
    }
}

/// Result of delivering one batch.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    Delivered { events: usize, attempts: u32 },
    Dropped {
        events: usize,
        attempts: u32,
        error: TransportError,
    },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Serialize a batch into the wire format: a JSON array of events.
pub fn encode_batch(batch: &[QueueItem]) -> Result<Vec<u8>, TransportError> {
    let events: Vec<_> = batch.iter().map(|item| &item.event).collect();
    serde_json::to_vec(&events).map_err(|e| TransportError::Serialization(e.to_string()))
}

/// Deliver one batch, retrying retryable failures with backoff.
///
/// Never returns an error: a batch that cannot be delivered is reported as
/// [`DeliveryOutcome::Dropped`] and forgotten.
pub async fn deliver(
    transport: &dyn Transport,
    policy: &RetryPolicy,
    mut batch: Vec<QueueItem>,
) -> DeliveryOutcome {
    let events = batch.len();
    let payload = match encode_batch(&batch) {
        Ok(payload) => payload,
        Err(error) => {
            tracing::error!(events, error = %error, "Dropping batch that cannot be serialized");
            return DeliveryOutcome::Dropped {
                events,
                attempts: 0,
                error,
            };
        }
    };

    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        for item in batch.iter_mut() {
            item.attempts = attempt;
        }

        match transport.send(&payload).await {
            Ok(()) => {
                tracing::debug!(events, attempt, "Batch delivered");
                return DeliveryOutcome::Delivered {
                    events,
                    attempts: attempt,
                };
            }
            Err(error) if error.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    events,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Delivery failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => {
                tracing::error!(events, attempts = attempt, error = %error, "Dropping batch");
                return DeliveryOutcome::Dropped {
                    events,
                    attempts: attempt,
                    error,
                };
            }
        }
    }
}
