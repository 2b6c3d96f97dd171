//! Error taxonomy shared by the server modules.
//!
//! Outbound control calls report a [`RequestError`] whose numeric
//! [`code`](RequestError::code) is what lifecycle loops log while retrying.
//! Delivery failures never leave the pipeline worker, and a corrupt snapshot
//! only prevents restoring subscriptions.

/// Broad classification of every failure the node can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connect/read/write failure.
    Transport,
    /// Non-200 status, non-JSON body, malformed or non-zero `code`.
    Protocol,
    /// Unknown topic, malformed persisted snapshot.
    Config,
    /// Delivery queue overflow. Absorbed by draining the queue.
    Capacity,
}

/// Numeric return codes of outbound control calls.
pub mod codes {
    pub const REQ_CONN: i32 = -1;
    pub const REQ_STATUS_CODE: i32 = -2;
    pub const REQ_NOT_JSON: i32 = -3;
    pub const REQ_JSON_FORMAT: i32 = -4;
    pub const REQ_CODE: i32 = -5;
}

// ---------------------------------------------------------------------------
// RequestError
// ---------------------------------------------------------------------------

/// Failure of one outbound control call against another site.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected http status {0}")]
    Status(u16),
    #[error("response body is not JSON")]
    NotJson,
    #[error("response is missing or has a malformed `{0}`")]
    Format(&'static str),
    #[error("remote site answered with code {0}")]
    Code(i64),
}

impl RequestError {
    /// Numeric code reported to callers that retry.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Connect { .. } => codes::REQ_CONN,
            Self::Status(_) => codes::REQ_STATUS_CODE,
            Self::NotJson => codes::REQ_NOT_JSON,
            Self::Format(_) => codes::REQ_JSON_FORMAT,
            Self::Code(_) => codes::REQ_CODE,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connect { .. } => ErrorKind::Transport,
            _ => ErrorKind::Protocol,
        }
    }
}

// ---------------------------------------------------------------------------
// SnapshotError
// ---------------------------------------------------------------------------

/// Failure to read or write the subscription snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot reached the {limit} byte read limit and is treated as truncated")]
    TooLarge { limit: usize },
    #[error("snapshot is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl SnapshotError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Config
    }
}

// ---------------------------------------------------------------------------
// HandlerError
// ---------------------------------------------------------------------------

/// Failure of a service handler. The dispatcher answers it with the canned
/// handler-error body.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}
