//! `sitelink` server: an embeddable pub/sub site node.
//!
//! A [`SiteNode`] answers JSON control requests over HTTP, keeps a
//! subscription registry of remote endpoints and pushes published
//! payloads to each of them through its own delivery pipeline. It can
//! register itself with a discovery site and keep that registration
//! alive with a heartbeat.

pub mod config;
pub mod control;
pub mod delivery;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod network;
pub mod node;
pub mod registry;
pub mod snapshot;

#[cfg(test)]
mod testing;

pub use config::{DeliveryConfig, DiscoveryConfig, PersistenceConfig, SiteConfig};
pub use delivery::{Connection, Connector, EndpointKey, HttpConnector, SubscriberEndpoint};
pub use discovery::SiteClient;
pub use dispatch::{Dispatcher, InboundRequest, MessageHandler, ServiceHandler};
pub use error::{ErrorKind, HandlerError, RequestError, SnapshotError};
pub use network::ControlServer;
pub use node::{SiteNode, SiteNodeBuilder};
pub use registry::SubscriptionRegistry;
pub use snapshot::SnapshotStore;
