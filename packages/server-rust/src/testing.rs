//! Test doubles: an in-memory connector and a fake peer site.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use parking_lot::Mutex;
use serde_json::Value;
use sitelink_core::canned;
use tokio::net::TcpListener;

use crate::delivery::{Connection, Connector, DeliveryError, EndpointKey};

/// Records posted payloads and answers from a script: `true` succeeds,
/// `false` breaks the connection. An exhausted script succeeds.
#[derive(Default)]
pub(crate) struct ScriptedConnector {
    pub(crate) delivered: Arc<Mutex<Vec<String>>>,
    pub(crate) targets: Arc<Mutex<Vec<EndpointKey>>>,
    pub(crate) script: Arc<Mutex<VecDeque<bool>>>,
    pub(crate) attempts: Arc<AtomicUsize>,
    pub(crate) opens: AtomicUsize,
}

impl ScriptedConnector {
    pub(crate) fn scripted(script: impl IntoIterator<Item = bool>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            ..Self::default()
        }
    }
}

impl Connector for ScriptedConnector {
    fn open(&self, target: &EndpointKey) -> Result<Box<dyn Connection>, DeliveryError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedConnection {
            target: target.clone(),
            delivered: Arc::clone(&self.delivered),
            targets: Arc::clone(&self.targets),
            script: Arc::clone(&self.script),
            attempts: Arc::clone(&self.attempts),
            open: true,
        }))
    }
}

struct ScriptedConnection {
    target: EndpointKey,
    delivered: Arc<Mutex<Vec<String>>>,
    targets: Arc<Mutex<Vec<EndpointKey>>>,
    script: Arc<Mutex<VecDeque<bool>>>,
    attempts: Arc<AtomicUsize>,
    open: bool,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn post(&mut self, payload: &str) -> Result<(), DeliveryError> {
        let ok = self.script.lock().pop_front().unwrap_or(true);
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if ok {
            self.delivered.lock().push(payload.to_string());
            self.targets.lock().push(self.target.clone());
            Ok(())
        } else {
            self.open = false;
            Err(DeliveryError::Status(503))
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

// ---------------------------------------------------------------------------
// Fake peer site
// ---------------------------------------------------------------------------

type Reply = dyn Fn(&Value) -> (StatusCode, String) + Send + Sync;

/// Loopback HTTP site that records every body posted to `/` and answers
/// through `reply`. Non-JSON bodies are recorded as strings.
pub(crate) struct FakeSite {
    pub(crate) addr: SocketAddr,
    pub(crate) received: Arc<Mutex<Vec<Value>>>,
}

impl FakeSite {
    pub(crate) async fn spawn(
        reply: impl Fn(&Value) -> (StatusCode, String) + Send + Sync + 'static,
    ) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let reply: Arc<Reply> = Arc::new(reply);
        let sink = Arc::clone(&received);
        let router = Router::new().route(
            "/",
            post(move |body: String| {
                let sink = Arc::clone(&sink);
                let reply = Arc::clone(&reply);
                async move {
                    let value = serde_json::from_str(&body).unwrap_or(Value::String(body));
                    let answer = reply(&value);
                    sink.lock().push(value);
                    answer
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await });
        Self { addr, received }
    }

    /// Answers every call with the canned OK body.
    pub(crate) async fn ok() -> Self {
        Self::spawn(|_| (StatusCode::OK, canned::OK.to_string())).await
    }

    pub(crate) fn ip(&self) -> String {
        self.addr.ip().to_string()
    }

    pub(crate) fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Recorded bodies naming `id` as their service or message id.
    pub(crate) fn calls(&self, id: &str) -> Vec<Value> {
        self.received
            .lock()
            .iter()
            .filter(|v| v["service_id"] == id || v["message_id"] == id)
            .cloned()
            .collect()
    }
}

/// A loopback address nothing listens on.
pub(crate) async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
