//! Control endpoint with a deferred startup lifecycle.
//!
//! `new()` captures the node, `start()` binds the TCP listener and
//! `serve()` accepts connections until shutdown. Splitting bind from
//! serve lets the caller learn the OS-assigned port before any request
//! is answered.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use super::handlers::control_handler;
use super::middleware::build_http_layers;
use crate::node::SiteNode;

/// The HTTP server answering control requests for one [`SiteNode`].
pub struct ControlServer {
    node: Arc<SiteNode>,
    listener: Option<TcpListener>,
}

impl ControlServer {
    /// Creates the server without binding any port.
    #[must_use]
    pub fn new(node: Arc<SiteNode>) -> Self {
        Self {
            node,
            listener: None,
        }
    }

    /// Assembles the router.
    ///
    /// Routes:
    /// - `POST /` -- the control envelope
    pub fn build_router(&self) -> Router {
        let layers = build_http_layers(self.node.config().request_timeout);

        Router::new()
            .route("/", post(control_handler))
            .layer(layers)
            .with_state(Arc::clone(&self.node))
    }

    /// Binds the listener to the node's configured host and port and
    /// returns the bound port, which differs from the configured one when
    /// that is 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let config = self.node.config();
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind control endpoint on {addr}"))?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves connections until `shutdown` resolves, then lets in-flight
    /// requests finish.
    ///
    /// # Errors
    ///
    /// Returns an error if [`start`](Self::start) was not called first or
    /// the server hits a fatal I/O error.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.build_router();
        let listener = self
            .listener
            .context("start() must be called before serve()")?;

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        info!("control endpoint stopped");
        Ok(())
    }
}
