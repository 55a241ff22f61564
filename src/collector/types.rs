//! Raw signals delivered by the host environment.
//!
//! These mirror the browser events the collectors listen to. They carry only
//! what the collectors need: element descriptors, scroll geometry, value
//! lengths. Input values and cursor coordinates are never part of a signal.

use crate::core::binding::{TrackBinding, Trigger};
use crate::core::event::EventData;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum length of element text attached to click events.
pub const MAX_TEXT_LEN: usize = 50;

/// Description of a DOM element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
}

impl ElementInfo {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_input_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = Some(input_type.into());
        self
    }

    /// Stable key used to keep per-element state apart.
    pub fn key(&self) -> String {
        match (&self.id, &self.name, &self.class_name) {
            (Some(id), _, _) if !id.is_empty() => format!("#{id}"),
            (_, Some(name), _) if !name.is_empty() => format!("{}[name={name}]", self.tag),
            (_, _, Some(class)) if !class.is_empty() => format!("{}.{class}", self.tag),
            _ => self.tag.clone(),
        }
    }

    /// Insert `elementTag`, `elementId` and `elementClass` into `data`.
    pub fn describe_into(&self, data: &mut EventData) {
        data.insert("elementTag".to_string(), Value::from(self.tag.clone()));
        data.insert(
            "elementId".to_string(),
            Value::from(self.id.clone().unwrap_or_default()),
        );
        data.insert(
            "elementClass".to_string(),
            Value::from(self.class_name.clone().unwrap_or_default()),
        );
    }

    /// Element text with whitespace collapsed, cut to [`MAX_TEXT_LEN`] chars.
    pub fn text_snippet(&self) -> String {
        let collapsed = self
            .text
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        collapsed.chars().take(MAX_TEXT_LEN).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickSignal {
    pub target: ElementInfo,
}

/// Scroll position of the document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollSignal {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub viewport_height: f64,
}

impl ScrollSignal {
    /// How far down the document the viewport bottom reaches, 0–100.
    pub fn depth_percent(&self) -> f64 {
        if self.scroll_height <= 0.0 {
            return 0.0;
        }
        let seen = (self.scroll_top + self.viewport_height) / self.scroll_height * 100.0;
        seen.clamp(0.0, 100.0)
    }
}

/// An edit in a form field. Only the resulting value length is reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSignal {
    pub target: ElementInfo,
    pub value_length: usize,
}

/// How the location changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationKind {
    Push,
    Replace,
    Pop,
    Hash,
}

impl NavigationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationKind::Push => "push",
            NavigationKind::Replace => "replace",
            NavigationKind::Pop => "pop",
            NavigationKind::Hash => "hash",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationSignal {
    pub kind: NavigationKind,
    pub url: String,
}

/// Navigation timing of the current document, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationTiming {
    pub dns: f64,
    pub tcp: f64,
    pub ttfb: f64,
    pub dom_content_loaded: f64,
    pub load: f64,
}

/// A paint timing entry (`first-paint`, `first-contentful-paint`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaintTiming {
    pub name: String,
    pub start_time: f64,
}

/// An uncaught error reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSignal {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// An unhandled promise rejection reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionSignal {
    pub reason: String,
}

/// Identifies one observation registered with a
/// [`VisibilityObserver`](crate::collector::exposure::VisibilityObserver).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObservationHandle(pub u64);

/// An intersection observer entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntersectionEntry {
    pub handle: ObservationHandle,
    pub ratio: f64,
}

/// Everything the host can report to the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Signal {
    Click(ClickSignal),
    Scroll(ScrollSignal),
    Input(InputSignal),
    Navigation(NavigationSignal),
    NavigationTiming(NavigationTiming),
    Paint(PaintTiming),
    Error(ErrorSignal),
    UnhandledRejection(RejectionSignal),
    Intersection(IntersectionEntry),
    /// An interaction on an element carrying a declarative binding
    Binding {
        binding: TrackBinding,
        trigger: Trigger,
    },
    /// The page is going away; only the beacon path is reliable now
    Unload,
}

impl Signal {
    pub fn kind(&self) -> &'static str {
        match self {
            Signal::Click(_) => "click",
            Signal::Scroll(_) => "scroll",
            Signal::Input(_) => "input",
            Signal::Navigation(_) => "navigation",
            Signal::NavigationTiming(_) => "navigation_timing",
            Signal::Paint(_) => "paint",
            Signal::Error(_) => "error",
            Signal::UnhandledRejection(_) => "unhandled_rejection",
            Signal::Intersection(_) => "intersection",
            Signal::Binding { .. } => "binding",
            Signal::Unload => "unload",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_snippet_truncates_and_collapses() {
        let long = "Buy   now\n".repeat(20);
        let element = ElementInfo::new("BUTTON").with_text(long);
        let snippet = element.text_snippet();
        assert_eq!(snippet.chars().count(), MAX_TEXT_LEN);
        assert!(snippet.starts_with("Buy now Buy now"));
        assert_eq!(element.tag, "button");
    }

    #[test]
    fn test_text_snippet_respects_char_boundaries() {
        let element = ElementInfo::new("span").with_text("é".repeat(80));
        assert_eq!(element.text_snippet().chars().count(), MAX_TEXT_LEN);
    }

    #[test]
    fn test_element_key_preference() {
        assert_eq!(ElementInfo::new("input").with_id("email").key(), "#email");
        assert_eq!(
            ElementInfo::new("input").with_name("q").with_class("search").key(),
            "input[name=q]"
        );
        assert_eq!(ElementInfo::new("div").with_class("card").key(), "div.card");
        assert_eq!(ElementInfo::new("div").key(), "div");
    }

    #[test]
    fn test_scroll_depth() {
        let signal = ScrollSignal {
            scroll_top: 500.0,
            scroll_height: 2_000.0,
            viewport_height: 500.0,
        };
        assert!((signal.depth_percent() - 50.0).abs() < 1e-9);

        let empty = ScrollSignal {
            scroll_top: 0.0,
            scroll_height: 0.0,
            viewport_height: 800.0,
        };
        assert_eq!(empty.depth_percent(), 0.0);
    }

    #[test]
    fn test_signal_json_shape() {
        let signal: Signal = serde_json::from_str(
            r#"{"kind":"click","target":{"tag":"a","id":"home","text":"Home"}}"#,
        )
        .unwrap();
        match signal {
            Signal::Click(click) => assert_eq!(click.target.id.as_deref(), Some("home")),
            other => panic!("unexpected signal {other:?}"),
        }

        let unload: Signal = serde_json::from_str(r#"{"kind":"unload"}"#).unwrap();
        assert_eq!(unload, Signal::Unload);
    }
}
