use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::EventSubscription;

/// Server-pushed notification.
///
/// `event_intent` is the subscription category the event belongs to; `event_data`
/// is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_type: String,
    pub event_intent: EventSubscription,
    #[serde(default)]
    pub event_data: Value,
}

impl Event {
    pub fn new(
        event_type: impl Into<String>,
        event_intent: EventSubscription,
        event_data: Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            event_intent,
            event_data,
        }
    }
}
