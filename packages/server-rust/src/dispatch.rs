//! Routes decoded control envelopes to service and message handlers.
//!
//! Handlers are kept in registration order and matched by linear scan, first
//! match wins. Registration is append-only. The dispatcher never fails: every
//! outcome, including a panicking handler, maps to a response body.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use sitelink_core::{canned, Envelope};
use tracing::{debug, error, warn};

use crate::error::HandlerError;
use crate::node::SiteNode;

/// A decoded inbound call as seen by a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundRequest {
    /// The envelope's nested `request` object, if present.
    pub request: Option<Value>,
    /// Address of the peer that sent the call.
    pub remote_ip: String,
}

/// Answers a named request/response service.
#[async_trait]
pub trait ServiceHandler: Send + Sync + 'static {
    /// Returns the full response body.
    ///
    /// # Errors
    ///
    /// An error is answered with the canned handler-error body.
    async fn handle(&self, node: &SiteNode, req: &InboundRequest) -> Result<String, HandlerError>;
}

/// Consumes a named one-way message.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, node: &SiteNode, req: &InboundRequest);
}

#[async_trait]
impl<F> ServiceHandler for F
where
    F: Fn(&SiteNode, &InboundRequest) -> Result<String, HandlerError> + Send + Sync + 'static,
{
    async fn handle(&self, node: &SiteNode, req: &InboundRequest) -> Result<String, HandlerError> {
        self(node, req)
    }
}

#[async_trait]
impl<F> MessageHandler for F
where
    F: Fn(&SiteNode, &InboundRequest) + Send + Sync + 'static,
{
    async fn handle(&self, node: &SiteNode, req: &InboundRequest) {
        self(node, req);
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Dispatcher {
    services: RwLock<Vec<(String, Arc<dyn ServiceHandler>)>>,
    messages: RwLock<Vec<(String, Arc<dyn MessageHandler>)>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_service(&self, service_id: impl Into<String>, handler: Arc<dyn ServiceHandler>) {
        self.services.write().push((service_id.into(), handler));
    }

    pub fn add_message_handler(
        &self,
        message_id: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) {
        self.messages.write().push((message_id.into(), handler));
    }

    /// Registered service ids in registration order, duplicates included.
    #[must_use]
    pub fn service_ids(&self) -> Vec<String> {
        self.services.read().iter().map(|(id, _)| id.clone()).collect()
    }

    fn find_service(&self, service_id: &str) -> Option<Arc<dyn ServiceHandler>> {
        self.services
            .read()
            .iter()
            .find(|(id, _)| id == service_id)
            .map(|(_, h)| Arc::clone(h))
    }

    fn find_message(&self, message_id: &str) -> Option<Arc<dyn MessageHandler>> {
        self.messages
            .read()
            .iter()
            .find(|(id, _)| id == message_id)
            .map(|(_, h)| Arc::clone(h))
    }

    /// Decodes `body` and runs the matching handler, returning the response
    /// body to send back.
    pub async fn dispatch(&self, node: &SiteNode, body: &[u8], remote_ip: &str) -> String {
        let envelope = match Envelope::decode(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(remote_ip, error = %e, "rejecting undecodable body");
                return canned::JSON_FORMAT.to_string();
            }
        };

        match envelope {
            Envelope::Service {
                service_id,
                request,
            } => {
                let Some(handler) = self.find_service(&service_id) else {
                    debug!(service_id = %service_id, remote_ip, "no service handler");
                    return canned::NO_REQUEST_HANDLER_MATCH.to_string();
                };
                let req = InboundRequest {
                    request,
                    remote_ip: remote_ip.to_string(),
                };
                match AssertUnwindSafe(handler.handle(node, &req))
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(response)) => response,
                    Ok(Err(e)) => {
                        error!(service_id = %service_id, remote_ip, error = %e, "service handler failed");
                        canned::REQUEST_HANDLER_ERROR.to_string()
                    }
                    Err(_) => {
                        error!(service_id = %service_id, remote_ip, "service handler panicked");
                        canned::REQUEST_HANDLER_ERROR.to_string()
                    }
                }
            }
            Envelope::Message {
                message_id,
                request,
            } => {
                let Some(handler) = self.find_message(&message_id) else {
                    debug!(message_id = %message_id, remote_ip, "no message handler");
                    return canned::NO_MESSAGE_HANDLER_MATCH.to_string();
                };
                let req = InboundRequest {
                    request,
                    remote_ip: remote_ip.to_string(),
                };
                if AssertUnwindSafe(handler.handle(node, &req))
                    .catch_unwind()
                    .await
                    .is_err()
                {
                    warn!(message_id = %message_id, remote_ip, "message handler panicked");
                }
                canned::MESSAGE_ACK.to_string()
            }
            Envelope::Unrouted => canned::NOT_SERVICE_OR_MESSAGE.to_string(),
        }
    }
}
