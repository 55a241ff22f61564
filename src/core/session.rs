//! Session and page identity.
//!
//! A session groups activity until a gap longer than the configured
//! inactivity timeout; the next activity after such a gap starts a new one.
//! A page is one navigation unit inside a session.

use crate::clock::Millis;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A logical browsing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub started_at: Millis,
    pub last_activity_at: Millis,
}

impl Session {
    fn new(now: Millis) -> Self {
        Self {
            id: format!("sess-{}", Uuid::new_v4().simple()),
            started_at: now,
            last_activity_at: now,
        }
    }
}

/// A navigation unit within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub url: String,
    pub referrer: String,
}

impl Page {
    pub fn new(url: impl Into<String>, referrer: impl Into<String>) -> Self {
        Self {
            id: format!("page-{}", Uuid::new_v4().simple()),
            url: url.into(),
            referrer: referrer.into(),
        }
    }

    /// The page that follows this one after navigating to `url`.
    pub fn next(&self, url: impl Into<String>) -> Self {
        Self::new(url, self.url.clone())
    }
}

/// Owns the current session and rotates it after inactivity.
#[derive(Debug)]
pub struct SessionManager {
    timeout_ms: Millis,
    current: Option<Session>,
}

impl SessionManager {
    pub fn new(timeout_ms: Millis) -> Self {
        Self {
            timeout_ms,
            current: None,
        }
    }

    /// The session that activity at `now` belongs to, without recording it.
    ///
    /// Creates the first session lazily and replaces an expired one.
    pub fn ensure(&mut self, now: Millis) -> &Session {
        let expired = match &self.current {
            Some(session) => now - session.last_activity_at > self.timeout_ms,
            None => true,
        };
        if expired {
            if let Some(old) = &self.current {
                tracing::debug!(
                    old_session = %old.id,
                    idle_ms = now - old.last_activity_at,
                    "Session expired after inactivity"
                );
            }
            self.current = Some(Session::new(now));
        }
        self.current.get_or_insert_with(|| Session::new(now))
    }

    /// Record activity at `now` and return the active session.
    pub fn touch(&mut self, now: Millis) -> &Session {
        self.ensure(now);
        let session = self.current.get_or_insert_with(|| Session::new(now));
        session.last_activity_at = session.last_activity_at.max(now);
        session
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_created_lazily() {
        let mut manager = SessionManager::new(1_000);
        assert!(manager.current().is_none());
        let id = manager.touch(10).id.clone();
        assert!(!id.is_empty());
        assert_eq!(manager.current().map(|s| s.started_at), Some(10));
    }

    #[test]
    fn test_session_survives_activity_within_timeout() {
        let mut manager = SessionManager::new(1_000);
        let first = manager.touch(0).id.clone();
        let second = manager.touch(900).id.clone();
        let third = manager.touch(1_800).id.clone();
        assert_eq!(first, second);
        assert_eq!(second, third);
        assert_eq!(manager.current().map(|s| s.last_activity_at), Some(1_800));
    }

    #[test]
    fn test_session_rotates_after_inactivity() {
        let mut manager = SessionManager::new(1_000);
        let first = manager.touch(0).id.clone();
        let second = manager.touch(1_001).id.clone();
        assert_ne!(first, second);
        assert_eq!(manager.current().map(|s| s.started_at), Some(1_001));
    }

    #[test]
    fn test_page_next_keeps_referrer_chain() {
        let home = Page::new("https://example.com/", "");
        let pricing = home.next("https://example.com/pricing");
        assert_ne!(home.id, pricing.id);
        assert_eq!(pricing.referrer, "https://example.com/");
    }
}
