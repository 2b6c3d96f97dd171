//! `POST /` handler: one JSON envelope in, one JSON body out.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use bytes::Bytes;

use crate::node::SiteNode;

/// Hands the raw body to the node's dispatcher.
///
/// The answer is always HTTP 200; failures are reported through the
/// `code` field of the body. The peer address is passed along so that
/// `subscribe_message` can record where to deliver.
pub async fn control_handler(
    State(node): State<Arc<SiteNode>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> impl IntoResponse {
    let remote_ip = peer.ip().to_canonical().to_string();
    let reply = node.handle(&body, &remote_ip).await;
    ([(CONTENT_TYPE, "text/plain")], reply)
}
