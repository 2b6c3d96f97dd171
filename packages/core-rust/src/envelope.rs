//! Control envelope codec.
//!
//! Every body exchanged over a site's control endpoint is a JSON object
//! naming either a `service_id` (request/response) or a `message_id`
//! (one-way), optionally carrying a nested `request` object. Responses are
//! `{"code", "error", "response"?}` objects; the error shapes are fixed
//! strings so that peers can compare them byte for byte.

use serde::Serialize;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Canned response bodies
// ---------------------------------------------------------------------------

/// Fixed response bodies returned by the dispatcher and control handlers.
pub mod canned {
    /// Generic success without a payload.
    pub const OK: &str = "{\"code\": 0, \"error\": \"ok\"}";
    /// Body was not valid JSON.
    pub const JSON_FORMAT: &str = "{\"code\": -2, \"error\": \"json format error\"}";
    /// Body named neither a service nor a message.
    pub const NOT_SERVICE_OR_MESSAGE: &str =
        "{\"code\": -3, \"error\": \"not service or message\"}";
    /// A success response could not be rendered.
    pub const RESPONSE_IS_NULL: &str = "{\"code\": -4, \"error\": \"response is null\"}";
    /// The matched service handler failed.
    pub const REQUEST_HANDLER_ERROR: &str =
        "{\"code\": -5, \"error\": \"request handler error\"}";
    /// No service handler is registered under the requested id.
    pub const NO_REQUEST_HANDLER_MATCH: &str =
        "{\"code\": -6, \"error\": \"no request handler match\"}";
    /// The `request` object is missing required fields.
    pub const REQUEST_ILLEGAL: &str = "{\"code\": -7, \"error\": \"request illegal\"}";
    /// No message handler is registered under the requested id.
    pub const NO_MESSAGE_HANDLER_MATCH: &str =
        "{\"code\": -8, \"error\": \"no message handler match\"}";
    /// Acknowledgement body for a handled one-way message.
    pub const MESSAGE_ACK: &str = "{}";
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Error returned when an inbound body cannot be decoded at all.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("body is not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),
}

/// A decoded control envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Request/response call to a named service.
    Service {
        service_id: String,
        request: Option<Value>,
    },
    /// One-way message.
    Message {
        message_id: String,
        request: Option<Value>,
    },
    /// Valid JSON that names neither a service nor a message.
    Unrouted,
}

impl Envelope {
    /// Decodes a raw body.
    ///
    /// `service_id` takes precedence over `message_id` when both are present.
    /// A non-object document, or an id that is not a string, decodes to
    /// [`Envelope::Unrouted`].
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::NotJson`] if the body is not valid JSON.
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_slice(body)?;
        Ok(Self::from_value(value))
    }

    fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::Unrouted;
        };
        let request = map.remove("request").filter(|r| !r.is_null());

        match map.remove("service_id") {
            Some(Value::String(service_id)) => {
                return Self::Service {
                    service_id,
                    request,
                }
            }
            Some(Value::Null) | None => {}
            Some(_) => return Self::Unrouted,
        }

        match map.remove("message_id") {
            Some(Value::String(message_id)) => Self::Message {
                message_id,
                request,
            },
            _ => Self::Unrouted,
        }
    }

    /// Returns the nested `request` object, if any.
    #[must_use]
    pub fn request(&self) -> Option<&Value> {
        match self {
            Self::Service { request, .. } | Self::Message { request, .. } => request.as_ref(),
            Self::Unrouted => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct OkResponse<'a, T: Serialize> {
    code: i64,
    error: &'a str,
    response: &'a T,
}

#[derive(Serialize)]
struct ServiceRequest<'a, T: Serialize> {
    service_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request: Option<&'a T>,
}

#[derive(Serialize)]
struct MessageRequest<'a, T: Serialize> {
    message_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request: Option<&'a T>,
}

/// Renders `{"code":0,"error":"ok","response":<response>}`.
///
/// Falls back to [`canned::RESPONSE_IS_NULL`] if the payload cannot be
/// serialized.
#[must_use]
pub fn encode_ok<T: Serialize>(response: &T) -> String {
    serde_json::to_string(&OkResponse {
        code: 0,
        error: "ok",
        response,
    })
    .unwrap_or_else(|_| canned::RESPONSE_IS_NULL.to_string())
}

/// Renders an outbound service call envelope.
///
/// # Errors
///
/// Returns an error if `request` cannot be serialized.
pub fn encode_service<T: Serialize>(
    service_id: &str,
    request: Option<&T>,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ServiceRequest {
        service_id,
        request,
    })
}

/// Renders an outbound one-way message envelope.
///
/// # Errors
///
/// Returns an error if `request` cannot be serialized.
pub fn encode_message<T: Serialize>(
    message_id: &str,
    request: Option<&T>,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&MessageRequest {
        message_id,
        request,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn decode_service_with_request() {
        let env = Envelope::decode(br#"{"service_id":"debug","request":{"a":1}}"#).unwrap();
        assert_eq!(
            env,
            Envelope::Service {
                service_id: "debug".to_string(),
                request: Some(json!({"a": 1})),
            }
        );
        assert_eq!(env.request(), Some(&json!({"a": 1})));
    }

    #[test]
    fn decode_message_without_request() {
        let env = Envelope::decode(br#"{"message_id":"alerts"}"#).unwrap();
        assert_eq!(
            env,
            Envelope::Message {
                message_id: "alerts".to_string(),
                request: None,
            }
        );
    }

    #[test]
    fn service_id_wins_over_message_id() {
        let env = Envelope::decode(br#"{"message_id":"m","service_id":"s"}"#).unwrap();
        assert!(matches!(env, Envelope::Service { service_id, .. } if service_id == "s"));
    }

    #[test]
    fn null_service_id_falls_through_to_message() {
        let env = Envelope::decode(br#"{"service_id":null,"message_id":"m"}"#).unwrap();
        assert!(matches!(env, Envelope::Message { message_id, .. } if message_id == "m"));
    }

    #[test]
    fn non_string_ids_are_unrouted() {
        assert_eq!(
            Envelope::decode(br#"{"service_id":7}"#).unwrap(),
            Envelope::Unrouted
        );
        assert_eq!(
            Envelope::decode(br#"{"message_id":["x"]}"#).unwrap(),
            Envelope::Unrouted
        );
    }

    #[test]
    fn non_object_documents_are_unrouted() {
        assert_eq!(Envelope::decode(b"[1,2]").unwrap(), Envelope::Unrouted);
        assert_eq!(Envelope::decode(b"42").unwrap(), Envelope::Unrouted);
        assert_eq!(Envelope::decode(b"{}").unwrap(), Envelope::Unrouted);
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(matches!(
            Envelope::decode(b"{not json"),
            Err(DecodeError::NotJson(_))
        ));
        assert!(Envelope::decode(b"").is_err());
    }

    #[test]
    fn null_request_is_treated_as_absent() {
        let env = Envelope::decode(br#"{"service_id":"s","request":null}"#).unwrap();
        assert!(env.request().is_none());
    }

    #[test]
    fn encode_ok_wraps_response() {
        let body = encode_ok(&json!({"service_list": ["debug"]}));
        assert_eq!(
            body,
            r#"{"code":0,"error":"ok","response":{"service_list":["debug"]}}"#
        );
    }

    #[test]
    fn encode_service_omits_absent_request() {
        let body = encode_service::<()>("get_service_list", None).unwrap();
        assert_eq!(body, r#"{"service_id":"get_service_list"}"#);

        let body = encode_service("site_ping", Some(&json!({"site_id": "a"}))).unwrap();
        assert_eq!(body, r#"{"service_id":"site_ping","request":{"site_id":"a"}}"#);
    }

    #[test]
    fn encode_message_round_trips_through_decode() {
        let body = encode_message::<()>("register2QuerySiteAgain", None).unwrap();
        let env = Envelope::decode(body.as_bytes()).unwrap();
        assert!(
            matches!(env, Envelope::Message { message_id, .. } if message_id == "register2QuerySiteAgain")
        );
    }

    #[test]
    fn canned_bodies_are_valid_json_with_codes() {
        let cases = [
            (canned::OK, 0),
            (canned::JSON_FORMAT, -2),
            (canned::NOT_SERVICE_OR_MESSAGE, -3),
            (canned::RESPONSE_IS_NULL, -4),
            (canned::REQUEST_HANDLER_ERROR, -5),
            (canned::NO_REQUEST_HANDLER_MATCH, -6),
            (canned::REQUEST_ILLEGAL, -7),
            (canned::NO_MESSAGE_HANDLER_MATCH, -8),
        ];
        for (body, code) in cases {
            let value: Value = serde_json::from_str(body).unwrap();
            assert_eq!(value["code"], code, "{body}");
        }
    }

    proptest! {
        #[test]
        fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = Envelope::decode(&bytes);
        }

        #[test]
        fn any_string_service_id_routes(id in "[a-z_]{1,24}") {
            let body = encode_service::<()>(&id, None).unwrap();
            let env = Envelope::decode(body.as_bytes()).unwrap();
            prop_assert_eq!(env, Envelope::Service { service_id: id, request: None });
        }
    }
}
