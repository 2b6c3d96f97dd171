//! Configuration types for a site node.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration of one site.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Identifier this site registers under. Also keys the snapshot file.
    pub site_id: String,
    /// Human-readable description sent to the discovery site.
    pub summary: String,
    /// Bind address of the control endpoint.
    pub host: String,
    /// Port of the control endpoint. 0 means OS-assigned.
    pub port: u16,
    /// Maximum time a single control request may take.
    pub request_timeout: Duration,
    /// Discovery-site address and lifecycle timings.
    pub discovery: DiscoveryConfig,
    /// Per-subscriber delivery policy.
    pub delivery: DeliveryConfig,
    /// Subscription snapshot location.
    pub persistence: PersistenceConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_id: "site".to_string(),
            summary: String::new(),
            host: "0.0.0.0".to_string(),
            port: 9001,
            request_timeout: Duration::from_secs(30),
            discovery: DiscoveryConfig::default(),
            delivery: DeliveryConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

/// Where the discovery site lives and how often this site talks to it.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub ip: String,
    pub port: u16,
    /// Delay between failed registration / subscription attempts at startup.
    pub retry_delay: Duration,
    /// Interval between `site_ping` heartbeats.
    pub ping_interval: Duration,
    /// Connect timeout of one outbound control call.
    pub connect_timeout: Duration,
    /// Read timeout of one outbound control call.
    pub read_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::LOCALHOST.to_string(),
            port: 9000,
            retry_delay: Duration::from_secs(2),
            ping_interval: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(2),
        }
    }
}

/// Queueing and retry policy shared by every delivery pipeline.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// A pipeline whose queue holds more than this many payloads drops its
    /// whole backlog before accepting the next one.
    pub max_queue_size: usize,
    /// Consecutive failures after which the retry counter wraps to zero.
    pub max_send_retry: u32,
    /// Connect timeout of one delivery attempt.
    pub connect_timeout: Duration,
    /// Time a connected subscriber has to answer one delivery. Together
    /// with `connect_timeout` it bounds an attempt, and must stay well below
    /// the control endpoint's `request_timeout`.
    pub read_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            max_send_retry: 10,
            connect_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(5),
        }
    }
}

/// Location of the subscription snapshot.
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Directory holding `<site_id>_message_subscriber.json`. Created on
    /// first save. `None` disables persistence.
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: Some(PathBuf::from("/var/lib/sitelink")),
        }
    }
}
