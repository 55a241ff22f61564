//! In-memory transport.
//!
//! Records every delivered payload instead of sending it anywhere. Used by
//! the replay dry run and by tests, which can also make it fail on purpose.

use super::{Transport, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Inner {
    payloads: Vec<Vec<u8>>,
    beacons: Vec<Vec<u8>>,
    attempts: usize,
    /// Failures to return before succeeding again; `None` count means forever
    failure: Option<(Option<usize>, TransportError)>,
}

/// Cloneable handle; clones share the same recordings.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next `count` sends with `error`.
    pub fn fail_next(&self, count: usize, error: TransportError) {
        self.lock().failure = Some((Some(count), error));
    }

    /// Fail every send (and beacon) with `error` until [`recover`](Self::recover).
    pub fn fail_always(&self, error: TransportError) {
        self.lock().failure = Some((None, error));
    }

    pub fn recover(&self) {
        self.lock().failure = None;
    }

    /// Payloads delivered through [`Transport::send`].
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.lock().payloads.clone()
    }

    /// Payloads handed off through [`Transport::send_beacon`].
    pub fn beacons(&self) -> Vec<Vec<u8>> {
        self.lock().beacons.clone()
    }

    /// Send attempts, failed ones included.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    /// Every delivered event, decoded, in delivery order.
    pub fn events(&self) -> Vec<Value> {
        decode_all(&self.payloads())
    }

    /// Every event sent by beacon, decoded.
    pub fn beacon_events(&self) -> Vec<Value> {
        decode_all(&self.beacons())
    }

    fn take_failure(&self) -> Option<TransportError> {
        let mut inner = self.lock();
        let (remaining, error) = inner.failure.clone()?;
        match remaining {
            None => Some(error),
            Some(0) => {
                inner.failure = None;
                None
            }
            Some(1) => {
                inner.failure = None;
                Some(error)
            }
            Some(n) => {
                inner.failure = Some((Some(n - 1), error.clone()));
                Some(error)
            }
        }
    }
}

fn decode_all(payloads: &[Vec<u8>]) -> Vec<Value> {
    payloads
        .iter()
        .filter_map(|payload| serde_json::from_slice::<Vec<Value>>(payload).ok())
        .flatten()
        .collect()
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        self.lock().attempts += 1;
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        self.lock().payloads.push(payload.to_vec());
        Ok(())
    }

    fn send_beacon(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        self.lock().beacons.push(payload);
        Ok(())
    }
}
