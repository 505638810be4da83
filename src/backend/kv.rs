//! Bundled key-value backend
//!
//! Files are stored under their own name. Alongside each file the store keeps
//! the token that uploaded it; only that token may replace or delete it.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use super::{DeleteAuthority, RemoteFileEntry, StorageBackend, StoredFile, UploadRequest};
use crate::config::Secret;
use crate::error::{BackendError, KvError};
use crate::kv::KvStore;
use crate::logger;

const NAME: &str = "kv";

pub struct KvBackend {
    files: Arc<dyn KvStore>,
    tokens: Arc<dyn KvStore>,
}

fn store_error(phase: &'static str) -> impl FnOnce(KvError) -> BackendError {
    move |source| BackendError::Store {
        backend: NAME,
        phase,
        source,
    }
}

impl KvBackend {
    pub fn new(files: Arc<dyn KvStore>, tokens: Arc<dyn KvStore>) -> Self {
        Self { files, tokens }
    }

    /// Token that owns `name`, if the file exists
    ///
    /// A token record without a file is left over from an interrupted delete
    /// and owns nothing.
    async fn owner(&self, name: &str, phase: &'static str) -> Result<Option<Secret>, BackendError> {
        let Some(raw) = self.tokens.get(name).await.map_err(store_error(phase))? else {
            return Ok(None);
        };
        if self.files.get(name).await.map_err(store_error(phase))?.is_none() {
            return Ok(None);
        }
        Ok(Some(Secret::new(String::from_utf8_lossy(&raw).into_owned())))
    }
}

#[async_trait]
impl StorageBackend for KvBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn delete_authority(&self) -> DeleteAuthority {
        DeleteAuthority::PerFileToken
    }

    async fn upload(&self, file: &UploadRequest) -> Result<StoredFile, BackendError> {
        let owner = self.owner(&file.file_name, "upload").await?;
        if let Some(owner) = &owner {
            if !owner.matches(file.supplied_token.expose()) {
                return Err(BackendError::Forbidden {
                    backend: NAME,
                    id: file.file_name.clone(),
                });
            }
        }

        // Token first: a file record never exists without its owner
        self.tokens
            .put(
                &file.file_name,
                Bytes::copy_from_slice(file.supplied_token.expose().as_bytes()),
            )
            .await
            .map_err(store_error("upload"))?;
        if let Err(e) = self.files.put(&file.file_name, file.bytes.clone()).await {
            if owner.is_none() {
                if let Err(cleanup) = self.tokens.delete(&file.file_name).await {
                    logger::log_warning(&format!(
                        "kv: could not remove token for failed upload '{}': {cleanup}",
                        file.file_name
                    ));
                }
            }
            return Err(store_error("upload")(e));
        }

        Ok(StoredFile {
            id: file.file_name.clone(),
            name: file.file_name.clone(),
            url: None,
        })
    }

    async fn list(&self) -> Result<Vec<RemoteFileEntry>, BackendError> {
        let keys = self.files.list_keys().await.map_err(store_error("list"))?;
        Ok(keys
            .into_iter()
            .map(|key| RemoteFileEntry {
                id: key.clone(),
                name: key,
            })
            .collect())
    }

    async fn delete(&self, id: &str, credentials: &Secret) -> Result<(), BackendError> {
        let Some(owner) = self.owner(id, "delete").await? else {
            return Err(BackendError::NotFound {
                backend: NAME,
                id: id.to_string(),
            });
        };
        if !owner.matches(credentials.expose()) {
            return Err(BackendError::Forbidden {
                backend: NAME,
                id: id.to_string(),
            });
        }

        // File first: a leftover token without its file is ignored by `owner`
        self.files.delete(id).await.map_err(store_error("delete"))?;
        if let Err(e) = self.tokens.delete(id).await {
            logger::log_warning(&format!("kv: stale token left for '{id}': {e}"));
        }
        Ok(())
    }
}
