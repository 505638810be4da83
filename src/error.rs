//! Error types
//!
//! Every failure a request can hit is one of the `GatewayError` kinds below.
//! Each kind knows its HTTP status and the message a client is allowed to see;
//! full detail stays in the server-side error log.

use hyper::StatusCode;
use thiserror::Error;

/// Errors raised while loading configuration or wiring the process at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Missing required setting '{setting}' for the {backend} backend")]
    MissingSetting {
        backend: &'static str,
        setting: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Key-value store error: {0}")]
    Kv(#[from] KvError),
}

/// Key-value store errors
#[derive(Error, Debug)]
pub enum KvError {
    #[error("Invalid key: '{0}'")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Request validation failures, safe to show to the client verbatim
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("❌ Missing file or bot token.")]
    MissingFields,

    #[error("❌ File ID is required.")]
    MissingFileId,

    #[error("❌ File too large (max {max_mb}MB).")]
    TooLarge { max_mb: u64 },

    #[error("❌ File type '{0}' is not allowed.")]
    BadType(String),

    #[error("❌ A file named '{0}' already exists.")]
    DuplicateName(String),

    #[error("❌ Invalid file name '{0}'.")]
    InvalidName(String),

    #[error("❌ Invalid request body: {0}")]
    MalformedBody(String),
}

impl ValidationError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::DuplicateName(_) => StatusCode::CONFLICT,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Failures talking to a storage backend
///
/// `backend` names the provider and `phase` names the step of its protocol
/// that failed, so a multi-step upload reports how far it got.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("{backend} {phase}: request failed: {message}")]
    Transport {
        backend: &'static str,
        phase: &'static str,
        message: String,
    },

    #[error("{backend} {phase}: upstream returned {status}: {body}")]
    Upstream {
        backend: &'static str,
        phase: &'static str,
        status: u16,
        body: String,
    },

    #[error("{backend} {phase}: malformed response: {message}")]
    Malformed {
        backend: &'static str,
        phase: &'static str,
        message: String,
    },

    #[error("{backend} {phase}: store error: {source}")]
    Store {
        backend: &'static str,
        phase: &'static str,
        #[source]
        source: KvError,
    },

    #[error("{backend} does not support {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    #[error("{backend}: caller is not permitted to modify '{id}'")]
    Forbidden { backend: &'static str, id: String },

    #[error("{backend}: no file with id '{id}'")]
    NotFound { backend: &'static str, id: String },

    #[error("{backend}: listing returned no files array")]
    EmptyListing { backend: &'static str },

    #[error("{backend}: missing credential '{setting}'")]
    NotConfigured {
        backend: &'static str,
        setting: &'static str,
    },
}

impl BackendError {
    /// HTTP status reported to the client; mirrors the upstream status when there is one
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Upstream { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::Unsupported { .. } => StatusCode::NOT_IMPLEMENTED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } | Self::EmptyListing { .. } => StatusCode::NOT_FOUND,
            Self::Transport { .. }
            | Self::Malformed { .. }
            | Self::Store { .. }
            | Self::NotConfigured { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Transport failures and upstream 5xx/429 may succeed on a second attempt
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Upstream { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Short description for the client body
    ///
    /// Upstream error text is included (JSON `error.message`/`message` when the
    /// provider sends one); transport and local store errors are not.
    pub fn client_detail(&self) -> String {
        match self {
            Self::Upstream { body, status, .. } => {
                let text = upstream_message(body);
                if text.is_empty() {
                    format!("upstream returned status {status}")
                } else {
                    text
                }
            }
            Self::Transport { backend, .. } => format!("could not reach {backend}"),
            Self::Malformed { backend, .. } => format!("unexpected response from {backend}"),
            Self::Store { .. } => "storage error".to_string(),
            Self::Unsupported { backend, operation } => {
                format!("{operation} is not supported by the {backend} backend")
            }
            Self::Forbidden { .. } => "you are not allowed to modify this file".to_string(),
            Self::NotFound { id, .. } => format!("no file with id '{id}'"),
            Self::EmptyListing { .. } => "no files found in the folder".to_string(),
            Self::NotConfigured { backend, .. } => format!("the {backend} backend is not configured"),
        }
    }
}

const MAX_UPSTREAM_MESSAGE: usize = 200;

/// Pull a readable message out of an upstream error body
fn upstream_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let from_json = parsed.as_ref().and_then(|v| {
        v.pointer("/error/message")
            .or_else(|| v.get("message"))
            .or_else(|| v.get("error"))
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string)
    });
    let text = from_json.unwrap_or_else(|| body.trim().to_string());
    text.chars().take(MAX_UPSTREAM_MESSAGE).collect()
}

/// Everything a dynamic route can fail with
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("bot token rejected")]
    Auth,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(e) => e.status(),
            Self::Auth => StatusCode::FORBIDDEN,
            Self::Backend(e) => e.status(),
        }
    }

    /// Client-facing message; `failure_prefix` describes the action that failed
    pub fn client_message(&self, failure_prefix: &str) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::Auth => "❌ Incorrect bot token.".to_string(),
            Self::Backend(BackendError::EmptyListing { .. }) => {
                "❌ No files found in the folder.".to_string()
            }
            Self::Backend(e) => format!("{failure_prefix}: {}", e.client_detail()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_statuses() {
        assert_eq!(ValidationError::MissingFields.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ValidationError::TooLarge { max_mb: 50 }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ValidationError::DuplicateName("a.png".to_string()).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_upstream_status_is_mirrored() {
        let err = BackendError::Upstream {
            backend: "b2",
            phase: "get_upload_url",
            status: 401,
            body: String::new(),
        };
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let odd = BackendError::Upstream {
            backend: "b2",
            phase: "upload_file",
            status: 302,
            body: String::new(),
        };
        assert_eq!(odd.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_upstream_message_extraction() {
        let err = BackendError::Upstream {
            backend: "google-drive",
            phase: "upload",
            status: 403,
            body: r#"{"error":{"code":403,"message":"Insufficient Permission"}}"#.to_string(),
        };
        assert_eq!(err.client_detail(), "Insufficient Permission");

        let plain = BackendError::Upstream {
            backend: "file.io",
            phase: "upload",
            status: 500,
            body: "  boom  ".to_string(),
        };
        assert_eq!(plain.client_detail(), "boom");
    }

    #[test]
    fn test_retryable() {
        let transport = BackendError::Transport {
            backend: "b2",
            phase: "authorize_account",
            message: "reset".to_string(),
        };
        assert!(transport.is_retryable());
        let bad_request = BackendError::Upstream {
            backend: "b2",
            phase: "authorize_account",
            status: 400,
            body: String::new(),
        };
        assert!(!bad_request.is_retryable());
    }

    #[test]
    fn test_auth_message_does_not_echo_token() {
        let msg = GatewayError::Auth.client_message("❌ Upload failed");
        assert_eq!(msg, "❌ Incorrect bot token.");
    }
}
