//! Wire payloads exchanged between sites.
//!
//! Each submodule covers one protocol domain: the built-in control services,
//! the discovery-site protocol, and the subscription snapshot format.

pub mod control;
pub mod discovery;
pub mod snapshot;

pub use control::{
    DebugResponse, MessageListResponse, ServiceListResponse, SubscriptionRequest, TopicDescriptor,
};
pub use discovery::{
    ResponseEnvelope, SiteInfo, SiteListResponse, SitePingRequest, SiteQueryRequest,
    SiteRegisterRequest,
};
pub use snapshot::{Snapshot, SubscriberRecord, TopicSubscribers};

/// Well-known service ids.
pub mod service_ids {
    pub const GET_SERVICE_LIST: &str = "get_service_list";
    pub const GET_MESSAGE_LIST: &str = "get_message_list";
    pub const SUBSCRIBE_MESSAGE: &str = "subscribe_message";
    pub const UNSUBSCRIBE_MESSAGE: &str = "unsubscribe_message";
    pub const DEBUG: &str = "debug";

    /// Discovery-site services.
    pub const SITE_REGISTER: &str = "site_register";
    pub const SITE_PING: &str = "site_ping";
    pub const SITE_QUERY: &str = "site_query";
}

/// Well-known message ids.
pub mod message_ids {
    /// Published by the discovery site when it wants every site to register again.
    pub const REGISTER_AGAIN: &str = "register2QuerySiteAgain";
}
