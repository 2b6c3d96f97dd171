//! `sitelink` core: control envelope codec, canned responses, and the wire
//! payloads of the control, discovery and snapshot formats.

pub mod envelope;
pub mod messages;

pub use envelope::{canned, encode_message, encode_ok, encode_service, DecodeError, Envelope};
pub use messages::{message_ids, service_ids, TopicDescriptor};
