//! Joining the discovery site: registration, the re-register subscription
//! and the heartbeat.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sitelink_core::message_ids;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::discovery::SiteClient;
use crate::dispatch::{InboundRequest, MessageHandler};
use crate::error::RequestError;
use crate::node::SiteNode;

/// Runs `attempt` until it succeeds, sleeping `delay` after each failure.
pub async fn retry_until_ok<F, Fut>(what: &str, delay: Duration, mut attempt: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), RequestError>>,
{
    loop {
        match attempt().await {
            Ok(()) => return,
            Err(e) => {
                warn!(what, code = e.code(), error = %e, "retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Registers with the discovery site and subscribes to its re-register
/// topic, retrying each step until it succeeds. Then installs the
/// re-register handler and returns the running heartbeat.
pub async fn join_discovery(node: &SiteNode) -> JoinHandle<()> {
    let client = node.client();
    let discovery = &node.config().discovery;

    retry_until_ok("site_register", discovery.retry_delay, move || client.register_site()).await;
    info!(site_id = %node.config().site_id, "registered with discovery site");

    let topics = &[message_ids::REGISTER_AGAIN.to_string()];
    retry_until_ok("subscribe register-again", discovery.retry_delay, move || {
        client.subscribe(&discovery.ip, discovery.port, topics)
    })
    .await;

    node.dispatcher()
        .add_message_handler(message_ids::REGISTER_AGAIN, Arc::new(RegisterAgain));

    spawn_heartbeat(client.clone(), discovery.ping_interval)
}

/// Pings the discovery site every `interval`, starting immediately.
/// Failures are logged by the client and otherwise ignored.
pub fn spawn_heartbeat(client: SiteClient, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let _ = client.ping().await;
        }
    })
}

/// Handles the discovery site's request to register again.
pub struct RegisterAgain;

#[async_trait]
impl MessageHandler for RegisterAgain {
    async fn handle(&self, node: &SiteNode, _req: &InboundRequest) {
        match node.client().register_site().await {
            Ok(()) => info!(site_id = %node.config().site_id, "registered again"),
            Err(e) => warn!(code = e.code(), error = %e, "re-registration failed"),
        }
    }
}
