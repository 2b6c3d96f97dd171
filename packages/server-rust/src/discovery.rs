//! Outbound control calls against the discovery site and peer sites.
//!
//! Every call is a single attempt. A reply counts as successful only if it
//! arrives with HTTP 200, parses as JSON, carries an integer `code` equal to
//! zero and, where the call expects one, a well-formed `response` object.

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sitelink_core::messages::{
    MessageListResponse, ResponseEnvelope, ServiceListResponse, SiteInfo, SiteListResponse,
    SitePingRequest, SiteQueryRequest, SiteRegisterRequest, SubscriptionRequest, TopicDescriptor,
};
use sitelink_core::{encode_service, service_ids};
use tracing::{debug, warn};

use crate::config::{DiscoveryConfig, SiteConfig};
use crate::error::RequestError;

/// Client for the site protocol, bound to one site's identity.
#[derive(Debug, Clone)]
pub struct SiteClient {
    http: reqwest::Client,
    site_id: String,
    summary: String,
    port: u16,
    discovery: DiscoveryConfig,
}

impl SiteClient {
    /// Builds a client announcing `config`'s identity and listen port.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &SiteConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.discovery.connect_timeout)
            .timeout(config.discovery.connect_timeout + config.discovery.read_timeout)
            .build()?;
        Ok(Self {
            http,
            site_id: config.site_id.clone(),
            summary: config.summary.clone(),
            port: config.port,
            discovery: config.discovery.clone(),
        })
    }

    // -----------------------------------------------------------------------
    // Discovery site
    // -----------------------------------------------------------------------

    /// Registers this site with the discovery site.
    ///
    /// # Errors
    ///
    /// Returns the [`RequestError`] of the failed attempt.
    pub async fn register_site(&self) -> Result<(), RequestError> {
        let request = SiteRegisterRequest {
            site_id: self.site_id.clone(),
            summary: self.summary.clone(),
            port: self.port,
        };
        self.call_discovery(service_ids::SITE_REGISTER, Some(&request))
            .await
            .map(drop)
    }

    /// Sends one heartbeat.
    ///
    /// # Errors
    ///
    /// Returns the [`RequestError`] of the failed attempt.
    pub async fn ping(&self) -> Result<(), RequestError> {
        let request = SitePingRequest {
            site_id: self.site_id.clone(),
        };
        self.call_discovery(service_ids::SITE_PING, Some(&request))
            .await
            .map(drop)
    }

    /// Lists every site known to the discovery site.
    ///
    /// # Errors
    ///
    /// Returns the [`RequestError`] of the failed attempt.
    pub async fn query_sites(&self) -> Result<Vec<SiteInfo>, RequestError> {
        self.query(None).await
    }

    /// Lists the sites registered under `site_id`.
    ///
    /// # Errors
    ///
    /// Returns the [`RequestError`] of the failed attempt.
    pub async fn query_sites_by_id(&self, site_id: &str) -> Result<Vec<SiteInfo>, RequestError> {
        self.query(Some(&SiteQueryRequest {
            site_id: site_id.to_string(),
        }))
        .await
    }

    async fn query(&self, filter: Option<&SiteQueryRequest>) -> Result<Vec<SiteInfo>, RequestError> {
        let response = self.call_discovery(service_ids::SITE_QUERY, filter).await?;
        let list: SiteListResponse = expect_response(response, "site_list")?;

        // Peers are reached through the discovery host.
        Ok(list
            .site_list
            .into_iter()
            .map(|site| SiteInfo {
                ip: self.discovery.ip.clone(),
                ..site
            })
            .collect())
    }

    async fn call_discovery<T: Serialize>(
        &self,
        service_id: &str,
        request: Option<&T>,
    ) -> Result<Option<Value>, RequestError> {
        self.call(&self.discovery.ip, self.discovery.port, service_id, request)
            .await
    }

    // -----------------------------------------------------------------------
    // Any site
    // -----------------------------------------------------------------------

    /// Subscribes this site's listen port to `topics` at `ip:port`.
    ///
    /// # Errors
    ///
    /// Returns the [`RequestError`] of the failed attempt.
    pub async fn subscribe(&self, ip: &str, port: u16, topics: &[String]) -> Result<(), RequestError> {
        let request = SubscriptionRequest {
            port: self.port,
            message_list: topics.to_vec(),
        };
        self.call(ip, port, service_ids::SUBSCRIBE_MESSAGE, Some(&request))
            .await
            .map(drop)
    }

    /// Cancels this site's subscription to `topics` at `ip:port`.
    ///
    /// # Errors
    ///
    /// Returns the [`RequestError`] of the failed attempt.
    pub async fn unsubscribe(
        &self,
        ip: &str,
        port: u16,
        topics: &[String],
    ) -> Result<(), RequestError> {
        let request = SubscriptionRequest {
            port: self.port,
            message_list: topics.to_vec(),
        };
        self.call(ip, port, service_ids::UNSUBSCRIBE_MESSAGE, Some(&request))
            .await
            .map(drop)
    }

    /// Services offered by the site at `ip:port`.
    ///
    /// # Errors
    ///
    /// Returns the [`RequestError`] of the failed attempt.
    pub async fn service_list(&self, ip: &str, port: u16) -> Result<Vec<String>, RequestError> {
        let response = self
            .call::<()>(ip, port, service_ids::GET_SERVICE_LIST, None)
            .await?;
        let list: ServiceListResponse = expect_response(response, "service_list")?;
        Ok(list.service_list)
    }

    /// Topics offered by the site at `ip:port`.
    ///
    /// # Errors
    ///
    /// Returns the [`RequestError`] of the failed attempt.
    pub async fn message_list(
        &self,
        ip: &str,
        port: u16,
    ) -> Result<Vec<TopicDescriptor>, RequestError> {
        let response = self
            .call::<()>(ip, port, service_ids::GET_MESSAGE_LIST, None)
            .await?;
        let list: MessageListResponse = expect_response(response, "message_list")?;
        Ok(list.message_list)
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    /// Posts one service call and returns the reply's `response` value.
    async fn call<T: Serialize>(
        &self,
        ip: &str,
        port: u16,
        service_id: &str,
        request: Option<&T>,
    ) -> Result<Option<Value>, RequestError> {
        let result = self.exchange(ip, port, service_id, request).await;
        match &result {
            Ok(_) => debug!(ip, port, service_id, "control call succeeded"),
            Err(e) => warn!(ip, port, service_id, code = e.code(), error = %e, "control call failed"),
        }
        result
    }

    async fn exchange<T: Serialize>(
        &self,
        ip: &str,
        port: u16,
        service_id: &str,
        request: Option<&T>,
    ) -> Result<Option<Value>, RequestError> {
        let addr = if ip.contains(':') {
            format!("[{ip}]:{port}")
        } else {
            format!("{ip}:{port}")
        };
        let body = encode_service(service_id, request).map_err(|_| RequestError::Format("request"))?;

        let response = self
            .http
            .post(format!("http://{addr}/"))
            .header(CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
            .map_err(|source| RequestError::Connect {
                addr: addr.clone(),
                source,
            })?;

        if response.status() != StatusCode::OK {
            return Err(RequestError::Status(response.status().as_u16()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|source| RequestError::Connect { addr, source })?;

        let value: Value = serde_json::from_slice(&bytes).map_err(|_| RequestError::NotJson)?;
        let envelope: ResponseEnvelope =
            serde_json::from_value(value).map_err(|_| RequestError::Format("code"))?;
        match envelope.code {
            None => Err(RequestError::Format("code")),
            Some(0) => Ok(envelope.response),
            Some(code) => Err(RequestError::Code(code)),
        }
    }
}

/// Decodes a required `response` object.
fn expect_response<T: DeserializeOwned>(
    response: Option<Value>,
    field: &'static str,
) -> Result<T, RequestError> {
    let response = response.ok_or(RequestError::Format("response"))?;
    serde_json::from_value(response).map_err(|_| RequestError::Format(field))
}
