//! Subscription snapshot records.
//!
//! The same shapes are written to the per-site snapshot file and returned by
//! the `debug` service. `sendRetryCount` and `isStop` are informational: a
//! restored snapshot only contributes its `(topic, ip, port)` triples.

use serde::{Deserialize, Serialize};

/// One subscribed endpoint as seen in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberRecord {
    pub ip: String,
    pub port: u16,
    #[serde(rename = "sendRetryCount", default)]
    pub retry_count: u32,
    #[serde(rename = "isStop", default)]
    pub is_stop: bool,
}

/// The ordered subscriber list of one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSubscribers {
    #[serde(rename = "messageId")]
    pub topic_id: String,
    #[serde(rename = "site_handle_list")]
    pub subscribers: Vec<SubscriberRecord>,
}

/// A full registry snapshot, topics in first-subscription order.
pub type Snapshot = Vec<TopicSubscribers>;
