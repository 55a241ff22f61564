//! Event types delivered to the collector endpoint.

use crate::clock::Millis;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form event payload.
pub type EventData = Map<String, Value>;

/// Category of a tracked event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Pageview,
    Click,
    Scroll,
    Input,
    Navigation,
    Performance,
    Error,
    Exposure,
    Custom,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Pageview => "pageview",
            EventType::Click => "click",
            EventType::Scroll => "scroll",
            EventType::Input => "input",
            EventType::Navigation => "navigation",
            EventType::Performance => "performance",
            EventType::Error => "error",
            EventType::Exposure => "exposure",
            EventType::Custom => "custom",
        }
    }
}

/// How aggressively an event should be flushed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

/// A normalized event as it sits in the queue and goes over the wire.
///
/// Built only by the tracker, which stamps the session and page identity
/// before the event is enqueued. Nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEvent {
    pub name: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: EventData,
    pub priority: Priority,
    pub timestamp: Millis,
    pub session_id: String,
    pub page_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Per-call overrides for [`Tracker::track_with`](crate::Tracker::track_with).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackOptions {
    pub priority: Option<Priority>,
    pub event_type: Option<EventType>,
}

impl TrackOptions {
    pub fn priority(priority: Priority) -> Self {
        Self {
            priority: Some(priority),
            event_type: None,
        }
    }

    pub fn with_type(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }
}

/// Infer the event type from well-known event names.
pub fn infer_event_type(name: &str) -> EventType {
    match name {
        "pageview" | "page_view" => EventType::Pageview,
        "click" => EventType::Click,
        "scroll" => EventType::Scroll,
        "input" => EventType::Input,
        "navigation" => EventType::Navigation,
        "performance" => EventType::Performance,
        "error" => EventType::Error,
        "exposure" => EventType::Exposure,
        _ => EventType::Custom,
    }
}

/// Build an [`EventData`] map from `key => value` pairs.
#[macro_export]
macro_rules! event_data {
    () => {
        $crate::EventData::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut data = $crate::EventData::new();
        $( data.insert(($key).to_string(), ::serde_json::json!($value)); )+
        data
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TrackEvent {
        TrackEvent {
            name: "signup".to_string(),
            event_type: EventType::Custom,
            data: crate::event_data! { "plan" => "pro" },
            priority: Priority::High,
            timestamp: 1_700_000_000_000,
            session_id: "s-1".to_string(),
            page_id: "p-1".to_string(),
            user_id: None,
        }
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["type"], "custom");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["sessionId"], "s-1");
        assert_eq!(json["pageId"], "p-1");
        assert_eq!(json["data"]["plan"], "pro");
        assert!(json.get("userId").is_none());
    }

    #[test]
    fn test_user_id_serialized_when_present() {
        let mut event = sample();
        event.user_id = Some("u1".to_string());
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["userId"], "u1");
    }

    #[test]
    fn test_priority_ordering_and_parsing() {
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_infer_event_type() {
        assert_eq!(infer_event_type("pageview"), EventType::Pageview);
        assert_eq!(infer_event_type("exposure"), EventType::Exposure);
        assert_eq!(infer_event_type("add_to_cart"), EventType::Custom);
    }
}
