//! Declarative tracking descriptors.
//!
//! UI layers attach a [`TrackBinding`] to an element and report interactions
//! with [`Tracker::fire_binding`](crate::Tracker::fire_binding); the tracker
//! turns matching interactions into a `track()` call.

use crate::core::event::{EventData, EventType};
use serde::{Deserialize, Serialize};

/// Interaction that fires a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    #[default]
    Click,
    MouseEnter,
    MouseLeave,
    Focus,
    Blur,
}

impl std::str::FromStr for Trigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "click" => Ok(Trigger::Click),
            "mouseenter" => Ok(Trigger::MouseEnter),
            "mouseleave" => Ok(Trigger::MouseLeave),
            "focus" => Ok(Trigger::Focus),
            "blur" => Ok(Trigger::Blur),
            other => Err(format!("unknown trigger '{other}'")),
        }
    }
}

/// `{ name, type?, data?, trigger }` descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackBinding {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
    #[serde(default)]
    pub data: EventData,
    #[serde(default)]
    pub trigger: Trigger,
}

impl TrackBinding {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            event_type: None,
            data: EventData::new(),
            trigger: Trigger::Click,
        }
    }

    pub fn on(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_data(mut self, data: EventData) -> Self {
        self.data = data;
        self
    }

    pub fn with_type(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    pub fn matches(&self, trigger: Trigger) -> bool {
        self.trigger == trigger
    }
}
