//! Per-subscriber delivery pipelines.
//!
//! Every subscribed `(ip, port)` gets one [`SubscriberEndpoint`]: a bounded
//! queue drained by a dedicated worker task that POSTs each payload to the
//! subscriber's control endpoint. Pipelines are independent, so a slow or
//! dead subscriber only ever fills its own queue.

pub mod connector;
pub mod endpoint;
pub mod queue;

use std::fmt;

pub use connector::{Connection, Connector, DeliveryError, HttpConnector};
pub use endpoint::SubscriberEndpoint;
pub use queue::{DeliveryQueue, EnqueueOutcome};

/// Identity of a subscriber endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey {
    pub ip: String,
    pub port: u16,
}

impl EndpointKey {
    #[must_use]
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }

    /// URL of the subscriber's control endpoint.
    #[must_use]
    pub fn root_url(&self) -> String {
        if self.ip.contains(':') {
            format!("http://[{}]:{}/", self.ip, self.port)
        } else {
            format!("http://{}:{}/", self.ip, self.port)
        }
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_url_brackets_ipv6() {
        assert_eq!(
            EndpointKey::new("10.0.0.2", 9001).root_url(),
            "http://10.0.0.2:9001/"
        );
        assert_eq!(EndpointKey::new("::1", 80).root_url(), "http://[::1]:80/");
    }

    #[test]
    fn identity_is_ip_and_port() {
        assert_eq!(EndpointKey::new("a", 1), EndpointKey::new("a", 1));
        assert_ne!(EndpointKey::new("a", 1), EndpointKey::new("a", 2));
        assert_eq!(EndpointKey::new("a", 1).to_string(), "a:1");
    }
}
