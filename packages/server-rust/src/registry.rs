//! Subscription registry: topic id to the deduplicated delivery pipelines of
//! its subscribers.
//!
//! Pipelines live in an arena owned by the registry and are identified by
//! `(ip, port)`. A pipeline is shared by every topic its endpoint subscribes
//! to and is never removed, so unsubscribing only drops the topic's handle.
//! All index mutations happen under one lock; payloads are enqueued after
//! the lock is released.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use sitelink_core::messages::{DebugResponse, Snapshot, SubscriberRecord, TopicSubscribers};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::config::DeliveryConfig;
use crate::delivery::{Connector, EndpointKey, SubscriberEndpoint};
use crate::error::SnapshotError;
use crate::snapshot::SnapshotStore;

/// Index of a pipeline in the registry's endpoint arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(usize);

#[derive(Debug)]
struct TopicEntry {
    topic_id: String,
    members: Vec<EndpointId>,
}

#[derive(Debug, Default)]
struct RegistryState {
    endpoints: Vec<Arc<SubscriberEndpoint>>,
    by_key: HashMap<EndpointKey, EndpointId>,
    topics: Vec<TopicEntry>,
}

impl RegistryState {
    fn topic(&self, topic_id: &str) -> Option<&TopicEntry> {
        self.topics.iter().find(|t| t.topic_id == topic_id)
    }

    fn topic_mut(&mut self, topic_id: &str) -> Option<&mut TopicEntry> {
        self.topics.iter_mut().find(|t| t.topic_id == topic_id)
    }

    fn snapshot(&self) -> Snapshot {
        self.topics
            .iter()
            .map(|topic| TopicSubscribers {
                topic_id: topic.topic_id.clone(),
                subscribers: topic
                    .members
                    .iter()
                    .map(|id| self.endpoints[id.0].record())
                    .collect(),
            })
            .collect()
    }
}

pub struct SubscriptionRegistry {
    known_topics: HashSet<String>,
    connector: Arc<dyn Connector>,
    delivery: DeliveryConfig,
    /// Runtime the delivery workers are spawned on.
    runtime: Handle,
    store: Option<SnapshotStore>,
    state: Mutex<RegistryState>,
    /// Serializes snapshot writes so the last write carries the latest state.
    persist_lock: Mutex<()>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry accepting subscriptions to `known_topics`.
    /// Delivery workers run on `runtime`, so subscriptions may be added from
    /// threads outside it. `store` of `None` disables persistence.
    pub fn new(
        known_topics: impl IntoIterator<Item = String>,
        connector: Arc<dyn Connector>,
        delivery: DeliveryConfig,
        runtime: Handle,
        store: Option<SnapshotStore>,
    ) -> Self {
        Self {
            known_topics: known_topics.into_iter().collect(),
            connector,
            delivery,
            runtime,
            store,
            state: Mutex::new(RegistryState::default()),
            persist_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn is_known_topic(&self, topic_id: &str) -> bool {
        self.known_topics.contains(topic_id)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Subscribes `(ip, port)` to `topic_id` without persisting.
    ///
    /// Returns `true` when the subscription is new and the snapshot needs to
    /// be rewritten. Unknown topics are ignored. Any accepted subscription,
    /// new or repeated, resumes the endpoint's pipeline and resets its retry
    /// counter.
    pub fn subscribe(&self, topic_id: &str, ip: &str, port: u16) -> bool {
        if !self.is_known_topic(topic_id) {
            debug!(topic = topic_id, ip, port, "subscribe to unknown topic ignored");
            return false;
        }

        let key = EndpointKey::new(ip, port);
        let mut state = self.state.lock();

        let id = if let Some(&id) = state.by_key.get(&key) {
            id
        } else {
            let id = EndpointId(state.endpoints.len());
            let endpoint = SubscriberEndpoint::spawn(
                key.clone(),
                Arc::clone(&self.connector),
                &self.delivery,
                &self.runtime,
            );
            state.endpoints.push(endpoint);
            state.by_key.insert(key, id);
            id
        };

        let added = if let Some(topic) = state.topic_mut(topic_id) {
            if topic.members.contains(&id) {
                false
            } else {
                topic.members.push(id);
                true
            }
        } else {
            state.topics.push(TopicEntry {
                topic_id: topic_id.to_string(),
                members: vec![id],
            });
            true
        };

        state.endpoints[id.0].set_stop(false);
        if added {
            info!(topic = topic_id, ip, port, "subscribed");
        }
        added
    }

    /// Removes `(ip, port)` from `topic_id` without persisting.
    ///
    /// Returns `true` if a subscription was removed. The endpoint's pipeline
    /// stays alive for its other topics.
    pub fn unsubscribe(&self, topic_id: &str, ip: &str, port: u16) -> bool {
        let key = EndpointKey::new(ip, port);
        let mut state = self.state.lock();

        let Some(&id) = state.by_key.get(&key) else {
            return false;
        };
        let Some(topic) = state.topic_mut(topic_id) else {
            return false;
        };
        let Some(pos) = topic.members.iter().position(|m| *m == id) else {
            return false;
        };
        topic.members.remove(pos);

        info!(topic = topic_id, ip, port, "unsubscribed");
        true
    }

    /// Subscribes `(ip, port)` to every topic and persists once if anything
    /// changed. Returns whether anything changed.
    pub fn subscribe_many<'a>(
        &self,
        topic_ids: impl IntoIterator<Item = &'a str>,
        ip: &str,
        port: u16,
    ) -> bool {
        let mut changed = false;
        for topic_id in topic_ids {
            changed |= self.subscribe(topic_id, ip, port);
        }
        if changed {
            self.persist();
        }
        changed
    }

    /// Unsubscribes `(ip, port)` from every topic and persists once if
    /// anything changed. Returns whether anything changed.
    pub fn unsubscribe_many<'a>(
        &self,
        topic_ids: impl IntoIterator<Item = &'a str>,
        ip: &str,
        port: u16,
    ) -> bool {
        let mut changed = false;
        for topic_id in topic_ids {
            changed |= self.unsubscribe(topic_id, ip, port);
        }
        if changed {
            self.persist();
        }
        changed
    }

    // -----------------------------------------------------------------------
    // Publish
    // -----------------------------------------------------------------------

    /// Enqueues `payload` on every pipeline subscribed to `topic_id`.
    ///
    /// Returns the number of pipelines the payload was offered to. Delivery
    /// outcomes are never reported back.
    pub fn publish(&self, topic_id: &str, payload: &str) -> usize {
        let targets: Vec<Arc<SubscriberEndpoint>> = {
            let state = self.state.lock();
            let Some(topic) = state.topic(topic_id) else {
                return 0;
            };
            topic
                .members
                .iter()
                .map(|id| Arc::clone(&state.endpoints[id.0]))
                .collect()
        };

        for endpoint in &targets {
            endpoint.enqueue(payload);
        }
        targets.len()
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Current `(topic, subscribers)` lists in first-subscription order.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.state.lock().snapshot()
    }

    /// Writes the current state to the snapshot file.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the file cannot be written.
    pub fn save(&self) -> Result<(), SnapshotError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock();
        let snapshot = self.snapshot();
        store.save(&snapshot)
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            warn!(error = %e, "failed to persist subscriptions");
        }
    }

    /// Replays the snapshot file through [`subscribe`](Self::subscribe).
    ///
    /// The whole file is parsed before anything is replayed. Returns the
    /// number of subscriptions restored.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the file is unreadable, truncated or
    /// malformed. The registry is left untouched in that case.
    pub fn load(&self) -> Result<usize, SnapshotError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let Some(snapshot) = store.load()? else {
            debug!(path = %store.path().display(), "no subscription snapshot");
            return Ok(0);
        };

        let mut restored = 0;
        for topic in &snapshot {
            for subscriber in &topic.subscribers {
                if self.subscribe(&topic.topic_id, &subscriber.ip, subscriber.port) {
                    restored += 1;
                }
            }
        }
        info!(restored, path = %store.path().display(), "subscriptions restored");
        Ok(restored)
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Every pipeline ever created, in creation order.
    #[must_use]
    pub fn endpoint_records(&self) -> Vec<SubscriberRecord> {
        self.state
            .lock()
            .endpoints
            .iter()
            .map(|endpoint| endpoint.record())
            .collect()
    }

    #[must_use]
    pub fn debug_snapshot(&self) -> DebugResponse {
        let state = self.state.lock();
        DebugResponse {
            message_subscriber_list: state.snapshot(),
            message_subscriber_site_handle_list: state
                .endpoints
                .iter()
                .map(|endpoint| endpoint.record())
                .collect(),
        }
    }

    /// The pipeline of `(ip, port)`, if one was ever created.
    #[must_use]
    pub fn endpoint(&self, ip: &str, port: u16) -> Option<Arc<SubscriberEndpoint>> {
        let state = self.state.lock();
        state
            .by_key
            .get(&EndpointKey::new(ip, port))
            .map(|id| Arc::clone(&state.endpoints[id.0]))
    }
}
