//! Discovery-site protocol payloads.
//!
//! Every site registers with a well-known discovery site, pings it
//! periodically, and may query it for the addresses of its peers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body of `site_register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRegisterRequest {
    pub site_id: String,
    pub summary: String,
    pub port: u16,
}

/// Request body of `site_ping`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitePingRequest {
    pub site_id: String,
}

/// Optional filter of `site_query`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteQueryRequest {
    pub site_id: String,
}

/// One entry of a `site_query` answer. All four fields are mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteInfo {
    pub site_id: String,
    pub summary: String,
    pub ip: String,
    pub port: u16,
}

/// `response` payload of `site_query`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SiteListResponse {
    pub site_list: Vec<SiteInfo>,
}

/// Generic response envelope returned by any site's control endpoint.
///
/// Every field is optional here so the caller can tell a missing `code`
/// apart from a malformed body.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub response: Option<Value>,
}
