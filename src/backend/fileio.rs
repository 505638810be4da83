//! file.io backend
//!
//! Anonymous, upload-only. file.io has no listing or delete API for
//! anonymous uploads, so those operations report "not implemented".

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use super::{read_json, transport_error, RemoteFileEntry, StorageBackend, StoredFile, UploadRequest};
use crate::config::{FileIoConfig, Secret};
use crate::error::BackendError;

const NAME: &str = "file.io";

#[derive(Debug, Deserialize)]
struct FileIoResponse {
    success: bool,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub struct FileIoBackend {
    http: Client,
    config: FileIoConfig,
}

impl FileIoBackend {
    pub const fn new(http: Client, config: FileIoConfig) -> Self {
        Self { http, config }
    }

    fn form(&self, file: &UploadRequest) -> Result<Form, BackendError> {
        let part = Part::stream_with_length(file.bytes.clone(), file.size_bytes())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| transport_error(NAME, "upload", e))?;

        let mut form = Form::new().part("file", part);
        if let Some(expires) = &self.config.expires {
            form = form.text("expires", expires.clone());
        }
        Ok(form)
    }
}

#[async_trait]
impl StorageBackend for FileIoBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn upload(&self, file: &UploadRequest) -> Result<StoredFile, BackendError> {
        let response = self
            .http
            .post(&self.config.endpoint)
            .multipart(self.form(file)?)
            .send()
            .await
            .map_err(|e| transport_error(NAME, "upload", e))?;

        let reply: FileIoResponse = read_json(NAME, "upload", response).await?;
        match (reply.success, reply.key, reply.link) {
            (true, Some(key), Some(link)) => Ok(StoredFile {
                id: key,
                name: reply.name.unwrap_or_else(|| file.file_name.clone()),
                url: Some(link),
            }),
            (true, ..) => Err(BackendError::Malformed {
                backend: NAME,
                phase: "upload",
                message: "response is missing key or link".to_string(),
            }),
            (false, ..) => Err(BackendError::Upstream {
                backend: NAME,
                phase: "upload",
                status: 502,
                body: reply
                    .message
                    .unwrap_or_else(|| "upload rejected".to_string()),
            }),
        }
    }

    async fn list(&self) -> Result<Vec<RemoteFileEntry>, BackendError> {
        Err(BackendError::Unsupported {
            backend: NAME,
            operation: "list",
        })
    }

    async fn delete(&self, _id: &str, _credentials: &Secret) -> Result<(), BackendError> {
        Err(BackendError::Unsupported {
            backend: NAME,
            operation: "delete",
        })
    }
}
