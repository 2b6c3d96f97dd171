//! The site node: one value owning the topic catalog, dispatcher,
//! subscription registry and site client.
//!
//! A node is assembled with [`SiteNodeBuilder`], shared as `Arc<SiteNode>`
//! and handed to handlers as `&SiteNode`.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use serde::Serialize;
use sitelink_core::messages::TopicDescriptor;
use sitelink_core::{encode_message, service_ids};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::SiteConfig;
use crate::control::{
    DebugSnapshot, GetMessageList, GetServiceList, SubscribeMessage, UnsubscribeMessage,
};
use crate::delivery::{Connector, HttpConnector};
use crate::discovery::SiteClient;
use crate::dispatch::{Dispatcher, InboundRequest, MessageHandler, ServiceHandler};
use crate::error::HandlerError;
use crate::lifecycle;
use crate::network::ControlServer;
use crate::registry::SubscriptionRegistry;
use crate::snapshot::SnapshotStore;

pub struct SiteNode {
    config: SiteConfig,
    topics: Vec<TopicDescriptor>,
    dispatcher: Dispatcher,
    registry: SubscriptionRegistry,
    client: SiteClient,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl SiteNode {
    #[must_use]
    pub fn builder(config: SiteConfig) -> SiteNodeBuilder {
        SiteNodeBuilder::new(config)
    }

    #[must_use]
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Topics this site accepts subscriptions for, in registration order.
    #[must_use]
    pub fn topics(&self) -> &[TopicDescriptor] {
        &self.topics
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Client speaking the site protocol under this node's identity.
    #[must_use]
    pub fn client(&self) -> &SiteClient {
        &self.client
    }

    /// Queues `payload` for every current subscriber of `topic_id` and
    /// returns how many pipelines it was offered to.
    pub fn publish(&self, topic_id: &str, payload: &str) -> usize {
        self.registry.publish(topic_id, payload)
    }

    /// Wraps `request` in a `{"message_id": topic_id, "request": ...}`
    /// envelope and publishes it, so that subscribing sites route it to
    /// their message handler for `topic_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if `request` cannot be serialized.
    pub fn publish_message<T: Serialize>(
        &self,
        topic_id: &str,
        request: &T,
    ) -> Result<usize, serde_json::Error> {
        let payload = encode_message(topic_id, Some(request))?;
        Ok(self.publish(topic_id, &payload))
    }

    /// Decodes and answers one control request.
    pub async fn handle(&self, body: &[u8], remote_ip: &str) -> String {
        self.dispatcher.dispatch(self, body, remote_ip).await
    }

    /// Replays the subscription snapshot. A corrupt snapshot is logged and
    /// the node carries on without it.
    pub fn restore(&self) {
        if let Err(e) = self.registry.load() {
            warn!(error = %e, kind = ?e.kind(), "subscription snapshot ignored");
        }
    }

    // -----------------------------------------------------------------------
    // Startup
    // -----------------------------------------------------------------------

    /// Restores subscriptions and serves the control endpoint without
    /// contacting the discovery site. Returns only if serving fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the control port cannot be bound.
    pub async fn start(self: &Arc<Self>) -> anyhow::Result<()> {
        self.restore();
        self.listen(std::future::pending()).await
    }

    /// Joins the discovery site, retrying until it answers, then restores
    /// subscriptions and serves the control endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the control port cannot be bound.
    pub async fn start_by_register(self: &Arc<Self>) -> anyhow::Result<()> {
        self.start_by_register_until(std::future::pending()).await
    }

    /// [`start_by_register`](Self::start_by_register) with a shutdown signal
    /// for the control endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the control port cannot be bound.
    pub async fn start_by_register_until(
        self: &Arc<Self>,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let heartbeat = lifecycle::join_discovery(self).await;
        if let Some(previous) = self.heartbeat.lock().replace(heartbeat) {
            previous.abort();
        }
        self.restore();
        self.listen(shutdown).await
    }

    /// Serves the control endpoint until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the control port cannot be bound.
    pub async fn listen(
        self: &Arc<Self>,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let mut server = ControlServer::new(Arc::clone(self));
        let port = server.start().await?;
        info!(site_id = %self.config.site_id, port, "control endpoint listening");
        server.serve(shutdown).await
    }
}

impl Drop for SiteNode {
    fn drop(&mut self) {
        if let Some(heartbeat) = self.heartbeat.get_mut().take() {
            heartbeat.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects the catalog and handlers of a [`SiteNode`].
///
/// The five built-in services are always registered ahead of any service
/// added here, so they cannot be shadowed.
pub struct SiteNodeBuilder {
    config: SiteConfig,
    topics: Vec<TopicDescriptor>,
    services: Vec<(String, Arc<dyn ServiceHandler>)>,
    messages: Vec<(String, Arc<dyn MessageHandler>)>,
    connector: Option<Arc<dyn Connector>>,
}

impl SiteNodeBuilder {
    fn new(config: SiteConfig) -> Self {
        Self {
            config,
            topics: Vec::new(),
            services: Vec::new(),
            messages: Vec::new(),
            connector: None,
        }
    }

    /// Offers a topic whose display name and summary repeat its id.
    #[must_use]
    pub fn topic(self, id: impl Into<String>) -> Self {
        self.topic_with(TopicDescriptor::bare(id))
    }

    #[must_use]
    pub fn topic_with(mut self, topic: TopicDescriptor) -> Self {
        self.topics.push(topic);
        self
    }

    #[must_use]
    pub fn service(mut self, service_id: impl Into<String>, handler: impl ServiceHandler) -> Self {
        self.services.push((service_id.into(), Arc::new(handler)));
        self
    }

    /// Registers a synchronous service closure.
    #[must_use]
    pub fn service_fn<F>(self, service_id: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&SiteNode, &InboundRequest) -> Result<String, HandlerError> + Send + Sync + 'static,
    {
        self.service(service_id, handler)
    }

    #[must_use]
    pub fn message_handler(
        mut self,
        message_id: impl Into<String>,
        handler: impl MessageHandler,
    ) -> Self {
        self.messages.push((message_id.into(), Arc::new(handler)));
        self
    }

    /// Registers a synchronous message closure.
    #[must_use]
    pub fn message_handler_fn<F>(self, message_id: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&SiteNode, &InboundRequest) + Send + Sync + 'static,
    {
        self.message_handler(message_id, handler)
    }

    /// Replaces the HTTP connector used by delivery pipelines.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Assembles the node.
    ///
    /// # Errors
    ///
    /// Returns an error if called outside a Tokio runtime or if the outbound
    /// HTTP client cannot be constructed.
    pub fn build(self) -> anyhow::Result<Arc<SiteNode>> {
        let config = self.config;
        let runtime =
            Handle::try_current().context("SiteNode must be built inside a Tokio runtime")?;

        let dispatcher = Dispatcher::new();
        dispatcher.add_service(service_ids::GET_SERVICE_LIST, Arc::new(GetServiceList));
        dispatcher.add_service(service_ids::GET_MESSAGE_LIST, Arc::new(GetMessageList));
        dispatcher.add_service(service_ids::SUBSCRIBE_MESSAGE, Arc::new(SubscribeMessage));
        dispatcher.add_service(service_ids::UNSUBSCRIBE_MESSAGE, Arc::new(UnsubscribeMessage));
        dispatcher.add_service(service_ids::DEBUG, Arc::new(DebugSnapshot));
        for (id, handler) in self.services {
            dispatcher.add_service(id, handler);
        }
        for (id, handler) in self.messages {
            dispatcher.add_message_handler(id, handler);
        }

        let connector = self
            .connector
            .unwrap_or_else(|| {
                Arc::new(HttpConnector::new(
                    config.delivery.connect_timeout,
                    config.delivery.read_timeout,
                ))
            });
        let store = config
            .persistence
            .snapshot_dir
            .as_ref()
            .map(|dir| SnapshotStore::new(dir, &config.site_id));
        let registry = SubscriptionRegistry::new(
            self.topics.iter().map(|t| t.id.clone()),
            connector,
            config.delivery.clone(),
            runtime,
            store,
        );
        let client = SiteClient::new(&config)?;

        Ok(Arc::new(SiteNode {
            config,
            topics: self.topics,
            dispatcher,
            registry,
            client,
            heartbeat: Mutex::new(None),
        }))
    }
}
