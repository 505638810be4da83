// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;
use std::fmt;
use subtle::ConstantTimeEq;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub assets: AssetsConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub drive: DriveConfig,
    pub b2: B2Config,
    pub fileio: FileIoConfig,
    #[serde(default)]
    pub kv: KvBackendConfig,
}

/// A credential string that never shows up in `Debug` output
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_set(&self) -> bool {
        !self.0.is_empty()
    }

    /// Constant-time comparison; an unset secret never matches
    pub fn matches(&self, candidate: &str) -> bool {
        self.is_set() && bool::from(self.0.as_bytes().ct_eq(candidate.as_bytes()))
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_set() {
            f.write_str("Secret([redacted])")
        } else {
            f.write_str("Secret(<unset>)")
        }
    }
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub max_body_size: u64,
    pub enable_debug: bool,
}

/// Static asset store configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AssetsConfig {
    /// Directory holding published assets; no static serving when unset
    #[serde(default)]
    pub dir: Option<String>,
    pub default_document: String,
    /// Serve assets only: dynamic routes are disabled and a miss is a 404
    pub static_only: bool,
}

/// Shared-token configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub bot_token: Secret,
}

/// Which storage provider this deployment drives
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Drive,
    B2,
    #[serde(rename = "fileio")]
    FileIo,
    Kv,
}

impl BackendKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Drive => "drive",
            Self::B2 => "b2",
            Self::FileIo => "fileio",
            Self::Kv => "kv",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage backend selection and call policy
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub retry: RetryConfig,
}

/// Timeout/retry policy around backend calls
#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// Per-call timeout in seconds, 0 disables it
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

/// Upload validation settings
///
/// The `enforce_*` overrides are optional; when unset the selected backend's
/// profile decides (see [`UploadConfig::profile_for`]).
#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    pub max_file_size: u64,
    pub allowed_types: Vec<String>,
    #[serde(default)]
    pub enforce_size_limit: Option<bool>,
    #[serde(default)]
    pub enforce_type_allow_list: Option<bool>,
    #[serde(default)]
    pub enforce_unique_names: Option<bool>,
}

/// Validation steps active for one deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationProfile {
    pub max_file_size: Option<u64>,
    pub allowed_types: Option<Vec<String>>,
    pub unique_names: bool,
}

impl UploadConfig {
    /// Resolve which validation steps run for `backend`
    ///
    /// Drive checks size, type and duplicate names; B2 checks size and type;
    /// file.io and the bundled KV store check neither.
    pub fn profile_for(&self, backend: BackendKind) -> ValidationProfile {
        let (size, types, unique) = match backend {
            BackendKind::Drive => (true, true, true),
            BackendKind::B2 => (true, true, false),
            BackendKind::FileIo | BackendKind::Kv => (false, false, false),
        };

        ValidationProfile {
            max_file_size: self
                .enforce_size_limit
                .unwrap_or(size)
                .then_some(self.max_file_size),
            allowed_types: self
                .enforce_type_allow_list
                .unwrap_or(types)
                .then(|| self.allowed_types.clone()),
            unique_names: self.enforce_unique_names.unwrap_or(unique),
        }
    }
}

/// Google Drive credentials
#[derive(Debug, Deserialize, Clone)]
pub struct DriveConfig {
    pub folder_id: String,
    /// Read-only key used for listing when set
    pub api_key: Secret,
    /// OAuth bearer token for upload and delete
    pub access_token: Secret,
    pub api_base: String,
    pub upload_base: String,
}

/// Backblaze B2 credentials
#[derive(Debug, Deserialize, Clone)]
pub struct B2Config {
    pub key_id: String,
    pub application_key: Secret,
    pub bucket_name: String,
    /// Resolved from `bucket_name` at upload time when unset
    #[serde(default)]
    pub bucket_id: Option<String>,
    pub api_base: String,
    /// Send `do_not_verify` instead of a SHA-1 of the content
    pub skip_content_sha1: bool,
}

/// file.io settings
#[derive(Debug, Deserialize, Clone)]
pub struct FileIoConfig {
    pub endpoint: String,
    /// Expiry passed through to file.io (e.g. "14d")
    #[serde(default)]
    pub expires: Option<String>,
}

/// Bundled key-value backend settings
#[derive(Debug, Default, Deserialize, Clone)]
pub struct KvBackendConfig {
    /// Directory for uploaded files and their tokens; in-memory when unset
    #[serde(default)]
    pub dir: Option<String>,
}
