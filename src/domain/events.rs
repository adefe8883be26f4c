//! Notifications raised to collaborators after a page changes.
//!
//! Events fire after the state change and the persistence attempt, whether or
//! not persistence succeeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::Asset;

/// A single change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEvent {
    /// When this event occurred
    pub timestamp: DateTime<Utc>,

    /// Page the change happened in
    pub page: String,

    /// What changed
    #[serde(flatten)]
    pub kind: LibraryEventKind,
}

impl LibraryEvent {
    pub fn new(page: impl Into<String>, kind: LibraryEventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            page: page.into(),
            kind,
        }
    }
}

/// Types of library events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum LibraryEventKind {
    /// A new asset was written into the page
    AssetAdded { asset: Asset },

    /// An asset was deleted from the page
    AssetRemoved { asset: Asset },

    /// The manual order was replaced; names in display order
    OrderChanged { order: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_event_serialization() {
        let event = LibraryEvent::new(
            "Default",
            LibraryEventKind::OrderChanged {
                order: vec!["b.png".to_string(), "a.png".to_string()],
            },
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["page"], "Default");
        assert_eq!(json["event_type"], "order_changed");
        assert_eq!(json["order"][0], "b.png");

        let parsed: LibraryEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_asset_event_carries_asset() {
        let asset = crate::domain::Asset::new(PathBuf::from("/lib/Default/cat.png"));
        let event = LibraryEvent::new("Default", LibraryEventKind::AssetAdded { asset });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"asset_added\""));
        assert!(json.contains("cat.png"));
    }
}
