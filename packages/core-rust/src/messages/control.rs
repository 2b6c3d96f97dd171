//! Payloads of the built-in control services every site answers.
//!
//! Field names follow the wire format peers already speak: snake_case
//! request/response fields, with the topic descriptor's id carried as
//! `message_id`.

use serde::{Deserialize, Serialize};

use super::snapshot::{SubscriberRecord, TopicSubscribers};

// ---------------------------------------------------------------------------
// Topic catalog
// ---------------------------------------------------------------------------

/// A topic this site is willing to accept subscriptions for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDescriptor {
    /// Topic id used in `subscribe_message` and in published envelopes.
    #[serde(rename = "message_id")]
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// Free-form description.
    pub summary: String,
}

impl TopicDescriptor {
    /// Creates a descriptor whose name and summary repeat the id.
    #[must_use]
    pub fn bare(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            summary: id.clone(),
            id,
        }
    }

    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            summary: summary.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Request body of `subscribe_message` / `unsubscribe_message`.
///
/// The subscriber's ip is not part of the body; the receiving site takes it
/// from the transport's remote address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// Port the subscriber's control endpoint listens on.
    pub port: u16,
    /// Topic ids to (un)subscribe.
    pub message_list: Vec<String>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// `response` payload of `get_service_list`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceListResponse {
    pub service_list: Vec<String>,
}

/// `response` payload of `get_message_list`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageListResponse {
    pub message_list: Vec<TopicDescriptor>,
}

/// `response` payload of `debug`: the subscription index and the full
/// endpoint table with live delivery counters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DebugResponse {
    pub message_subscriber_list: Vec<TopicSubscribers>,
    pub message_subscriber_site_handle_list: Vec<SubscriberRecord>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn bare_descriptor_repeats_id() {
        let topic = TopicDescriptor::bare("alerts");
        assert_eq!(topic.name, "alerts");
        assert_eq!(topic.summary, "alerts");
    }

    #[test]
    fn descriptor_uses_message_id_on_the_wire() {
        let topic = TopicDescriptor::new("alerts", "Alerts", "fire alarms");
        assert_eq!(
            serde_json::to_value(&topic).unwrap(),
            json!({"message_id": "alerts", "name": "Alerts", "summary": "fire alarms"})
        );
    }

    #[test]
    fn subscription_request_shape() {
        let req = SubscriptionRequest {
            port: 9001,
            message_list: vec!["alerts".to_string()],
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"port": 9001, "message_list": ["alerts"]})
        );
    }

    #[test]
    fn message_list_response_parses_remote_catalog() {
        let parsed: MessageListResponse = serde_json::from_value(json!({
            "message_list": [{"message_id": "a", "name": "A", "summary": "s"}]
        }))
        .unwrap();
        assert_eq!(parsed.message_list[0].id, "a");
    }
}
