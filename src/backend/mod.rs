//! Storage backend module
//!
//! One `StorageBackend` implementation per provider. The router and the
//! upload gateway only see the trait; `build` picks the implementation named
//! by `storage.backend`.

mod b2;
mod drive;
mod fileio;
mod kv;
mod policy;

pub use b2::B2Backend;
pub use drive::DriveBackend;
pub use fileio::FileIoBackend;
pub use kv::KvBackend;
pub use policy::CallPolicy;

use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::config::{BackendKind, Config, Secret};
use crate::error::{BackendError, ConfigError};
use crate::kv::{DirKv, KvStore, MemoryKv};

/// One validated file on its way to a backend
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Bytes,
    pub file_name: String,
    pub mime_type: String,
    pub supplied_token: Secret,
}

impl UploadRequest {
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// What a backend hands back after a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub id: String,
    pub name: String,
    /// Public URL, for backends that issue one
    pub url: Option<String>,
}

/// Backend-reported file metadata, re-fetched on every list request
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RemoteFileEntry {
    pub id: String,
    pub name: String,
}

/// Who may delete a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteAuthority {
    /// Holders of the shared bot token, checked before the backend is called
    SharedToken,
    /// Only the token that uploaded the file, checked by the backend itself
    PerFileToken,
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Provider name used in logs and error messages
    fn name(&self) -> &'static str;

    fn delete_authority(&self) -> DeleteAuthority {
        DeleteAuthority::SharedToken
    }

    async fn upload(&self, file: &UploadRequest) -> Result<StoredFile, BackendError>;

    /// List the backend's configured folder or bucket
    async fn list(&self) -> Result<Vec<RemoteFileEntry>, BackendError>;

    async fn delete(&self, id: &str, credentials: &Secret) -> Result<(), BackendError>;
}

/// Build the backend selected by configuration
pub fn build(
    config: &Config,
    http: reqwest::Client,
) -> Result<Arc<dyn StorageBackend>, ConfigError> {
    let backend: Arc<dyn StorageBackend> = match config.storage.backend {
        BackendKind::Drive => Arc::new(DriveBackend::new(http, config.drive.clone())),
        BackendKind::B2 => Arc::new(B2Backend::new(http, config.b2.clone())),
        BackendKind::FileIo => Arc::new(FileIoBackend::new(http, config.fileio.clone())),
        BackendKind::Kv => {
            let (files, tokens): (Arc<dyn KvStore>, Arc<dyn KvStore>) =
                match config.kv.dir.as_deref() {
                    Some(dir) => {
                        let root = std::path::Path::new(dir);
                        (
                            Arc::new(DirKv::open(root.join("files"))?),
                            Arc::new(DirKv::open(root.join("tokens"))?),
                        )
                    }
                    None => (Arc::new(MemoryKv::new()), Arc::new(MemoryKv::new())),
                };
            Arc::new(KvBackend::new(files, tokens))
        }
    };
    Ok(backend)
}

/// Characters left unescaped in a URL path segment or B2 file name header
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub(crate) fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Map a reqwest failure to a transport error without leaking the request URL
///
/// Drive listing carries its API key in the query string.
pub(crate) fn transport_error(
    backend: &'static str,
    phase: &'static str,
    err: reqwest::Error,
) -> BackendError {
    BackendError::Transport {
        backend,
        phase,
        message: err.without_url().to_string(),
    }
}

/// Check status, then decode a JSON body
pub(crate) async fn read_json<T: DeserializeOwned>(
    backend: &'static str,
    phase: &'static str,
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let response = ensure_success(backend, phase, response).await?;
    response
        .json()
        .await
        .map_err(|e| BackendError::Malformed {
            backend,
            phase,
            message: e.without_url().to_string(),
        })
}

/// Turn a non-2xx response into an `Upstream` error carrying its body
pub(crate) async fn ensure_success(
    backend: &'static str,
    phase: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Upstream {
        backend,
        phase,
        status: status.as_u16(),
        body,
    })
}
