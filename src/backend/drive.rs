//! Google Drive backend.
//!
//! Upload and delete need an OAuth bearer token; listing uses the read-only
//! API key when one is configured and falls back to the bearer token.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;

use super::{
    encode_component, ensure_success, read_json, transport_error, RemoteFileEntry,
    StorageBackend, StoredFile, UploadRequest,
};
use crate::config::{DriveConfig, Secret};
use crate::error::BackendError;

const NAME: &str = "google-drive";

const MULTIPART_BOUNDARY: &str = "file_gateway_drive_boundary";

/// Drive file metadata as returned with `fields=id,name`
#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

/// `files.list` response; `files` is absent on some error payloads
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    files: Option<Vec<DriveFile>>,
    #[serde(default)]
    next_page_token: Option<String>,
}

pub struct DriveBackend {
    http: Client,
    config: DriveConfig,
}

impl DriveBackend {
    pub const fn new(http: Client, config: DriveConfig) -> Self {
        Self { http, config }
    }

    fn bearer(&self) -> Result<String, BackendError> {
        if self.config.access_token.is_set() {
            Ok(format!("Bearer {}", self.config.access_token.expose()))
        } else {
            Err(BackendError::NotConfigured {
                backend: NAME,
                setting: "drive.access_token",
            })
        }
    }

    /// `multipart/related` body: JSON metadata part, then the content part
    fn related_body(&self, file: &UploadRequest) -> Result<Vec<u8>, BackendError> {
        let metadata = serde_json::json!({
            "name": file.file_name,
            "parents": [self.config.folder_id],
        });
        let metadata_json = serde_json::to_string(&metadata).map_err(|e| BackendError::Malformed {
            backend: NAME,
            phase: "upload",
            message: format!("failed to encode metadata: {e}"),
        })?;

        let mut body = Vec::with_capacity(file.bytes.len() + metadata_json.len() + 256);
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(metadata_json.as_bytes());
        body.extend_from_slice(b"\r\n");

        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file.mime_type).as_bytes());
        body.extend_from_slice(&file.bytes);
        body.extend_from_slice(b"\r\n");

        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--").as_bytes());
        Ok(body)
    }
}

#[async_trait]
impl StorageBackend for DriveBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn upload(&self, file: &UploadRequest) -> Result<StoredFile, BackendError> {
        let auth = self.bearer()?;
        let url = format!("{}/upload/drive/v3/files", self.config.upload_base);
        let body = self.related_body(file)?;

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .query(&[("uploadType", "multipart"), ("fields", "id,name")])
            .body(body)
            .send()
            .await
            .map_err(|e| transport_error(NAME, "upload", e))?;

        let created: DriveFile = read_json(NAME, "upload", response).await?;
        Ok(StoredFile {
            id: created.id,
            name: created.name,
            url: None,
        })
    }

    async fn list(&self) -> Result<Vec<RemoteFileEntry>, BackendError> {
        let url = format!("{}/drive/v3/files", self.config.api_base);
        let query = format!("'{}' in parents and trashed = false", self.config.folder_id);
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(&url).query(&[
                ("q", query.as_str()),
                ("fields", "nextPageToken, files(id, name)"),
                ("pageSize", "1000"),
            ]);
            request = if self.config.api_key.is_set() {
                request.query(&[("key", self.config.api_key.expose())])
            } else {
                request.header(header::AUTHORIZATION, self.bearer()?)
            };
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| transport_error(NAME, "list", e))?;
            let page: FileListResponse = read_json(NAME, "list", response).await?;

            let Some(files) = page.files else {
                return Err(BackendError::EmptyListing { backend: NAME });
            };
            entries.extend(files.into_iter().map(|f| RemoteFileEntry {
                id: f.id,
                name: f.name,
            }));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(entries)
    }

    /// The shared-token check has already happened; `_credentials` is unused here
    async fn delete(&self, id: &str, _credentials: &Secret) -> Result<(), BackendError> {
        let auth = self.bearer()?;
        let url = format!(
            "{}/drive/v3/files/{}",
            self.config.api_base,
            encode_component(id)
        );

        let response = self
            .http
            .delete(&url)
            .header(header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| transport_error(NAME, "delete", e))?;

        ensure_success(NAME, "delete", response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use wiremock::matchers::{header as header_eq, method, path, query_param};
    use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n00";

    /// Matches a request body containing every listed byte sequence
    struct BodyContainsBytes(Vec<Vec<u8>>);

    impl Match for BodyContainsBytes {
        fn matches(&self, request: &Request) -> bool {
            self.0.iter().all(|needle| {
                request
                    .body
                    .windows(needle.len())
                    .any(|window| window == needle.as_slice())
            })
        }
    }

    fn drive_config(server: &MockServer, api_key: &str, access_token: &str) -> DriveConfig {
        DriveConfig {
            folder_id: "folder123".to_string(),
            api_key: Secret::new(api_key),
            access_token: Secret::new(access_token),
            api_base: server.uri(),
            upload_base: server.uri(),
        }
    }

    fn png(name: &str) -> UploadRequest {
        UploadRequest {
            bytes: Bytes::from_static(PNG_BYTES),
            file_name: name.to_string(),
            mime_type: "image/png".to_string(),
            supplied_token: Secret::new("bot"),
        }
    }

    #[tokio::test]
    async fn test_upload_sends_related_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .and(query_param("uploadType", "multipart"))
            .and(header_eq("authorization", "Bearer tok"))
            .and(BodyContainsBytes(vec![
                b"\"parents\":[\"folder123\"]".to_vec(),
                b"Content-Type: image/png\r\n\r\n".to_vec(),
                PNG_BYTES.to_vec(),
            ]))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "drive-id-1", "name": "cat.png"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let backend = DriveBackend::new(Client::new(), drive_config(&server, "", "tok"));
        let stored = backend.upload(&png("cat.png")).await.unwrap();
        assert_eq!(stored.id, "drive-id-1");
        assert_eq!(stored.name, "cat.png");
    }

    #[tokio::test]
    async fn test_upload_without_access_token_is_not_configured() {
        let server = MockServer::start().await;
        let backend = DriveBackend::new(Client::new(), drive_config(&server, "key", ""));
        let err = backend.upload(&png("cat.png")).await.unwrap_err();
        assert!(matches!(err, BackendError::NotConfigured { .. }));
    }

    #[tokio::test]
    async fn test_list_uses_api_key_and_follows_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param("key", "apikey"))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [{"id": "2", "name": "b.pdf"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param("key", "apikey"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [{"id": "1", "name": "a.png"}],
                "nextPageToken": "p2"
            })))
            .mount(&server)
            .await;

        let backend = DriveBackend::new(Client::new(), drive_config(&server, "apikey", ""));
        let files = backend.list().await.unwrap();
        assert_eq!(
            files,
            vec![
                RemoteFileEntry {
                    id: "1".to_string(),
                    name: "a.png".to_string()
                },
                RemoteFileEntry {
                    id: "2".to_string(),
                    name: "b.pdf".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_list_without_files_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let backend = DriveBackend::new(Client::new(), drive_config(&server, "apikey", ""));
        let err = backend.list().await.unwrap_err();
        assert!(matches!(err, BackendError::EmptyListing { .. }));
    }

    #[tokio::test]
    async fn test_delete_maps_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/drive/v3/files/abc"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {"code": 404, "message": "File not found: abc."}
            })))
            .mount(&server)
            .await;

        let backend = DriveBackend::new(Client::new(), drive_config(&server, "", "tok"));
        let err = backend
            .delete("abc", &Secret::new("bot"))
            .await
            .unwrap_err();
        assert_eq!(err.status().as_u16(), 404);
        assert_eq!(err.client_detail(), "File not found: abc.");
    }

    #[tokio::test]
    async fn test_delete_success() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/drive/v3/files/abc"))
            .and(header_eq("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let backend = DriveBackend::new(Client::new(), drive_config(&server, "", "tok"));
        backend.delete("abc", &Secret::new("bot")).await.unwrap();
    }
}
