//! Outbound connections used by delivery workers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;

use super::EndpointKey;

/// Failure of one delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("failed to build client for {addr}: {source}")]
    Build {
        addr: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("subscriber answered with http status {0}")]
    Status(u16),
}

/// Opens connections to subscriber endpoints.
pub trait Connector: Send + Sync + 'static {
    /// Prepares a connection to `target`. Does not contact the peer.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Build`] if the client cannot be constructed.
    fn open(&self, target: &EndpointKey) -> Result<Box<dyn Connection>, DeliveryError>;
}

/// A connection to one subscriber, owned by that subscriber's worker.
#[async_trait]
pub trait Connection: Send {
    /// POSTs `payload` to the subscriber's root path.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-200 status.
    async fn post(&mut self, payload: &str) -> Result<(), DeliveryError>;

    /// `false` once a transport failure broke the connection.
    fn is_open(&self) -> bool;
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Keep-alive HTTP connector backed by `reqwest`.
///
/// Every attempt is bounded by `connect_timeout + read_timeout`; a peer that
/// accepts the connection but never answers fails the attempt.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl HttpConnector {
    #[must_use]
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            read_timeout,
        }
    }
}

impl Connector for HttpConnector {
    fn open(&self, target: &EndpointKey) -> Result<Box<dyn Connection>, DeliveryError> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.connect_timeout + self.read_timeout)
            .pool_max_idle_per_host(1)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|source| DeliveryError::Build {
                addr: target.to_string(),
                source,
            })?;

        Ok(Box::new(HttpConnection {
            client,
            url: target.root_url(),
            open: true,
        }))
    }
}

struct HttpConnection {
    client: reqwest::Client,
    url: String,
    open: bool,
}

#[async_trait]
impl Connection for HttpConnection {
    async fn post(&mut self, payload: &str) -> Result<(), DeliveryError> {
        let result = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "text/plain")
            .body(payload.to_owned())
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.open = false;
                return Err(DeliveryError::Transport(e));
            }
        };

        let status = response.status();
        // Drain the body so the pooled connection can be reused.
        if let Err(e) = response.bytes().await {
            self.open = false;
            return Err(DeliveryError::Transport(e));
        }

        if status == StatusCode::OK {
            Ok(())
        } else {
            Err(DeliveryError::Status(status.as_u16()))
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
