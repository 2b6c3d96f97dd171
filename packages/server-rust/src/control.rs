//! Built-in control services answered by every site.

use async_trait::async_trait;
use serde_json::Value;
use sitelink_core::messages::{MessageListResponse, ServiceListResponse};
use sitelink_core::{canned, encode_ok};

use crate::dispatch::{InboundRequest, ServiceHandler};
use crate::error::HandlerError;
use crate::node::SiteNode;

/// `get_service_list`: every registered service id.
pub struct GetServiceList;

#[async_trait]
impl ServiceHandler for GetServiceList {
    async fn handle(&self, node: &SiteNode, _req: &InboundRequest) -> Result<String, HandlerError> {
        Ok(encode_ok(&ServiceListResponse {
            service_list: node.dispatcher().service_ids(),
        }))
    }
}

/// `get_message_list`: the topic catalog.
pub struct GetMessageList;

#[async_trait]
impl ServiceHandler for GetMessageList {
    async fn handle(&self, node: &SiteNode, _req: &InboundRequest) -> Result<String, HandlerError> {
        Ok(encode_ok(&MessageListResponse {
            message_list: node.topics().to_vec(),
        }))
    }
}

/// `subscribe_message`: subscribes the caller's `ip` and the requested port.
pub struct SubscribeMessage;

#[async_trait]
impl ServiceHandler for SubscribeMessage {
    async fn handle(&self, node: &SiteNode, req: &InboundRequest) -> Result<String, HandlerError> {
        let Some((port, topics)) = parse_subscription(req.request.as_ref()) else {
            return Ok(canned::REQUEST_ILLEGAL.to_string());
        };
        node.registry().subscribe_many(topics, &req.remote_ip, port);
        Ok(canned::OK.to_string())
    }
}

/// `unsubscribe_message`: the inverse of [`SubscribeMessage`].
pub struct UnsubscribeMessage;

#[async_trait]
impl ServiceHandler for UnsubscribeMessage {
    async fn handle(&self, node: &SiteNode, req: &InboundRequest) -> Result<String, HandlerError> {
        let Some((port, topics)) = parse_subscription(req.request.as_ref()) else {
            return Ok(canned::REQUEST_ILLEGAL.to_string());
        };
        node.registry().unsubscribe_many(topics, &req.remote_ip, port);
        Ok(canned::OK.to_string())
    }
}

/// `debug`: subscriptions and live pipeline counters.
pub struct DebugSnapshot;

#[async_trait]
impl ServiceHandler for DebugSnapshot {
    async fn handle(&self, node: &SiteNode, _req: &InboundRequest) -> Result<String, HandlerError> {
        Ok(encode_ok(&node.registry().debug_snapshot()))
    }
}

/// Extracts `port` and the string entries of `message_list`.
///
/// Returns `None` when the request is missing, `port` is not an integer in
/// `0..=65535`, or `message_list` is not an array. Non-string topic entries
/// are skipped.
fn parse_subscription(request: Option<&Value>) -> Option<(u16, impl Iterator<Item = &str>)> {
    let request = request?;
    let port = u16::try_from(request.get("port")?.as_u64()?).ok()?;
    let topics = request.get("message_list")?.as_array()?;
    Some((port, topics.iter().filter_map(Value::as_str)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};
    use sitelink_core::messages::TopicDescriptor;
    use sitelink_core::service_ids;

    use super::*;
    use crate::config::{PersistenceConfig, SiteConfig};

    fn node() -> Arc<SiteNode> {
        let config = SiteConfig {
            persistence: PersistenceConfig { snapshot_dir: None },
            ..SiteConfig::default()
        };
        SiteNode::builder(config)
            .topic("alerts")
            .topic_with(TopicDescriptor::new("metrics", "Metrics", "host metrics"))
            .service_fn("testService", |_, _| Ok(canned::OK.to_string()))
            .build()
            .unwrap()
    }

    async fn call(node: &SiteNode, body: Value, remote_ip: &str) -> Value {
        let raw = node
            .dispatcher()
            .dispatch(node, body.to_string().as_bytes(), remote_ip)
            .await;
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn parse_accepts_well_formed_requests() {
        let req = json!({"port": 9001, "message_list": ["a", 3, "b"]});
        let (port, topics) = parse_subscription(Some(&req)).unwrap();
        assert_eq!(port, 9001);
        assert_eq!(topics.collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn parse_rejects_illegal_requests() {
        assert!(parse_subscription(None).is_none());
        for req in [
            json!({"message_list": []}),
            json!({"port": "9001", "message_list": []}),
            json!({"port": 70000, "message_list": []}),
            json!({"port": -1, "message_list": []}),
            json!({"port": 9001}),
            json!({"port": 9001, "message_list": "alerts"}),
        ] {
            assert!(parse_subscription(Some(&req)).is_none(), "{req}");
        }
    }

    #[tokio::test]
    async fn service_list_has_builtins_then_registered_services() {
        let node = node();
        let resp = call(&node, json!({"service_id": "get_service_list"}), "10.0.0.2").await;
        assert_eq!(resp["code"], 0);
        assert_eq!(
            resp["response"]["service_list"],
            json!([
                service_ids::GET_SERVICE_LIST,
                service_ids::GET_MESSAGE_LIST,
                service_ids::SUBSCRIBE_MESSAGE,
                service_ids::UNSUBSCRIBE_MESSAGE,
                service_ids::DEBUG,
                "testService"
            ])
        );
    }

    #[tokio::test]
    async fn message_list_returns_the_catalog() {
        let node = node();
        let resp = call(&node, json!({"service_id": "get_message_list"}), "10.0.0.2").await;
        assert_eq!(
            resp["response"]["message_list"],
            json!([
                {"message_id": "alerts", "name": "alerts", "summary": "alerts"},
                {"message_id": "metrics", "name": "Metrics", "summary": "host metrics"}
            ])
        );
    }

    #[tokio::test]
    async fn subscribe_uses_the_remote_address() {
        let node = node();
        let raw = node
            .dispatcher()
            .dispatch(
                &node,
                br#"{"service_id":"subscribe_message","request":{"port":9001,"message_list":["alerts"]}}"#,
                "10.0.0.2",
            )
            .await;
        assert_eq!(raw, canned::OK);

        let debug = node.registry().debug_snapshot();
        assert_eq!(debug.message_subscriber_site_handle_list.len(), 1);
        assert_eq!(debug.message_subscriber_list[0].topic_id, "alerts");
        let record = &debug.message_subscriber_list[0].subscribers[0];
        assert_eq!((record.ip.as_str(), record.port), ("10.0.0.2", 9001));
    }

    #[tokio::test]
    async fn subscribe_with_unknown_topics_still_answers_ok() {
        let node = node();
        let resp = call(
            &node,
            json!({"service_id": "subscribe_message", "request": {"port": 9001, "message_list": ["nope"]}}),
            "10.0.0.2",
        )
        .await;
        assert_eq!(resp["code"], 0);
        assert!(node.registry().snapshot().is_empty());
    }

    #[tokio::test]
    async fn illegal_subscription_request() {
        let node = node();
        for body in [
            json!({"service_id": "subscribe_message"}),
            json!({"service_id": "unsubscribe_message", "request": {"port": "x", "message_list": []}}),
        ] {
            let raw = node
                .dispatcher()
                .dispatch(&node, body.to_string().as_bytes(), "10.0.0.2")
                .await;
            assert_eq!(raw, canned::REQUEST_ILLEGAL);
        }
    }

    #[tokio::test]
    async fn unsubscribe_removes_only_the_named_topics() {
        let node = node();
        let sub = json!({"service_id": "subscribe_message",
                         "request": {"port": 9001, "message_list": ["alerts", "metrics"]}});
        let unsub = json!({"service_id": "unsubscribe_message",
                           "request": {"port": 9001, "message_list": ["alerts"]}});
        call(&node, sub, "10.0.0.2").await;
        call(&node, unsub, "10.0.0.2").await;

        let snapshot = node.registry().snapshot();
        assert!(snapshot[0].subscribers.is_empty());
        assert_eq!(snapshot[1].subscribers.len(), 1);
    }

    #[tokio::test]
    async fn debug_reports_live_counters() {
        let node = node();
        call(
            &node,
            json!({"service_id": "subscribe_message", "request": {"port": 9001, "message_list": ["alerts"]}}),
            "10.0.0.2",
        )
        .await;

        let resp = call(&node, json!({"service_id": "debug"}), "10.0.0.9").await;
        assert_eq!(
            resp["response"],
            json!({
                "message_subscriber_list": [{
                    "messageId": "alerts",
                    "site_handle_list": [
                        {"ip": "10.0.0.2", "port": 9001, "sendRetryCount": 0, "isStop": false}
                    ]
                }],
                "message_subscriber_site_handle_list": [
                    {"ip": "10.0.0.2", "port": 9001, "sendRetryCount": 0, "isStop": false}
                ]
            })
        );
    }
}
