//! Backblaze B2 backend.
//!
//! Every operation starts with `b2_authorize_account`. An upload then runs
//! authorize → (resolve bucket) → get upload URL → upload; each step is a
//! separate fallible call and the first failure ends the pipeline, tagged
//! with the step's name.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use super::{
    encode_component, read_json, transport_error, RemoteFileEntry, StorageBackend, StoredFile,
    UploadRequest,
};
use crate::config::{B2Config, Secret};
use crate::error::BackendError;

const NAME: &str = "b2";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Authorization {
    account_id: String,
    api_url: String,
    authorization_token: String,
    #[serde(default)]
    allowed: Option<Allowed>,
}

/// Restrictions on the application key; a bucket-scoped key names its bucket here
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Allowed {
    #[serde(default)]
    bucket_id: Option<String>,
    #[serde(default)]
    bucket_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Bucket {
    bucket_id: String,
    bucket_name: String,
}

#[derive(Debug, Deserialize)]
struct BucketList {
    buckets: Vec<Bucket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrl {
    upload_url: String,
    authorization_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct B2File {
    file_id: String,
    file_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileNameList {
    files: Vec<B2File>,
    #[serde(default)]
    next_file_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListFileNamesRequest<'a> {
    bucket_id: &'a str,
    max_file_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_file_name: Option<&'a str>,
}

pub struct B2Backend {
    http: Client,
    config: B2Config,
}

impl B2Backend {
    pub const fn new(http: Client, config: B2Config) -> Self {
        Self { http, config }
    }

    async fn authorize(&self) -> Result<Authorization, BackendError> {
        let url = format!("{}/b2api/v2/b2_authorize_account", self.config.api_base);
        let response = self
            .http
            .get(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.application_key.expose()),
            )
            .send()
            .await
            .map_err(|e| transport_error(NAME, "authorize_account", e))?;
        read_json(NAME, "authorize_account", response).await
    }

    /// POST a JSON body to an authorized B2 API call
    async fn call<B, T>(
        &self,
        auth: &Authorization,
        phase: &'static str,
        body: &B,
    ) -> Result<T, BackendError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/b2api/v2/b2_{phase}", auth.api_url);
        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, &auth.authorization_token)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(NAME, phase, e))?;
        read_json(NAME, phase, response).await
    }

    async fn bucket_id(&self, auth: &Authorization) -> Result<String, BackendError> {
        if let Some(id) = &self.config.bucket_id {
            return Ok(id.clone());
        }
        if let Some(Allowed {
            bucket_id: Some(id),
            bucket_name: Some(name),
        }) = &auth.allowed
        {
            if *name == self.config.bucket_name {
                return Ok(id.clone());
            }
        }

        let list: BucketList = self
            .call(
                auth,
                "list_buckets",
                &serde_json::json!({
                    "accountId": auth.account_id,
                    "bucketName": self.config.bucket_name,
                }),
            )
            .await?;
        list.buckets
            .into_iter()
            .find(|b| b.bucket_name == self.config.bucket_name)
            .map(|b| b.bucket_id)
            .ok_or_else(|| BackendError::Malformed {
                backend: NAME,
                phase: "list_buckets",
                message: format!("bucket '{}' is not visible to this key", self.config.bucket_name),
            })
    }

    fn content_sha1(&self, file: &UploadRequest) -> String {
        if self.config.skip_content_sha1 {
            "do_not_verify".to_string()
        } else {
            format!("{:x}", Sha1::digest(&file.bytes))
        }
    }
}

#[async_trait]
impl StorageBackend for B2Backend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn upload(&self, file: &UploadRequest) -> Result<StoredFile, BackendError> {
        let auth = self.authorize().await?;
        let bucket_id = self.bucket_id(&auth).await?;
        let target: UploadUrl = self
            .call(
                &auth,
                "get_upload_url",
                &serde_json::json!({ "bucketId": bucket_id }),
            )
            .await?;

        let response = self
            .http
            .post(&target.upload_url)
            .header(header::AUTHORIZATION, &target.authorization_token)
            .header("X-Bz-File-Name", encode_component(&file.file_name))
            .header(header::CONTENT_TYPE, &file.mime_type)
            .header("X-Bz-Content-Sha1", self.content_sha1(file))
            .body(file.bytes.clone())
            .send()
            .await
            .map_err(|e| transport_error(NAME, "upload_file", e))?;

        let created: B2File = read_json(NAME, "upload_file", response).await?;
        Ok(StoredFile {
            id: created.file_id,
            name: created.file_name,
            url: None,
        })
    }

    async fn list(&self) -> Result<Vec<RemoteFileEntry>, BackendError> {
        let auth = self.authorize().await?;
        let bucket_id = self.bucket_id(&auth).await?;
        let mut entries = Vec::new();
        let mut start: Option<String> = None;

        loop {
            let page: FileNameList = self
                .call(
                    &auth,
                    "list_file_names",
                    &ListFileNamesRequest {
                        bucket_id: &bucket_id,
                        max_file_count: 1000,
                        start_file_name: start.as_deref(),
                    },
                )
                .await?;
            entries.extend(page.files.into_iter().map(|f| RemoteFileEntry {
                id: f.file_id,
                name: f.file_name,
            }));

            match page.next_file_name {
                Some(next) => start = Some(next),
                None => break,
            }
        }

        Ok(entries)
    }

    /// Looks up the file name for `id`, then deletes that version
    async fn delete(&self, id: &str, _credentials: &Secret) -> Result<(), BackendError> {
        let auth = self.authorize().await?;
        let info: B2File = self
            .call(&auth, "get_file_info", &serde_json::json!({ "fileId": id }))
            .await?;
        let _: B2File = self
            .call(
                &auth,
                "delete_file_version",
                &serde_json::json!({ "fileName": info.file_name, "fileId": info.file_id }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use wiremock::matchers::{body_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn b2_config(server: &MockServer) -> B2Config {
        B2Config {
            key_id: "keyid".to_string(),
            application_key: Secret::new("appkey"),
            bucket_name: "uploads".to_string(),
            bucket_id: None,
            api_base: server.uri(),
            skip_content_sha1: true,
        }
    }

    async fn mount_authorize(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/b2api/v2/b2_authorize_account"))
            // base64("keyid:appkey")
            .and(header_eq("authorization", "Basic a2V5aWQ6YXBwa2V5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "accountId": "acct",
                "apiUrl": server.uri(),
                "authorizationToken": "account-token",
                "allowed": {"bucketId": "bucket-1", "bucketName": "uploads"}
            })))
            .mount(server)
            .await;
    }

    fn pdf() -> UploadRequest {
        UploadRequest {
            bytes: Bytes::from_static(b"%PDF-1.7"),
            file_name: "report 1.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            supplied_token: Secret::new("bot"),
        }
    }

    #[tokio::test]
    async fn test_upload_runs_all_phases() {
        let server = MockServer::start().await;
        mount_authorize(&server).await;
        Mock::given(method("POST"))
            .and(path("/b2api/v2/b2_get_upload_url"))
            .and(header_eq("authorization", "account-token"))
            .and(body_json(serde_json::json!({"bucketId": "bucket-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "uploadUrl": format!("{}/upload-target", server.uri()),
                "authorizationToken": "upload-token"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload-target"))
            .and(header_eq("authorization", "upload-token"))
            .and(header_eq("x-bz-file-name", "report%201.pdf"))
            .and(header_eq("x-bz-content-sha1", "do_not_verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "fileId": "4_z123",
                "fileName": "report 1.pdf"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = B2Backend::new(Client::new(), b2_config(&server));
        let stored = backend.upload(&pdf()).await.unwrap();
        assert_eq!(stored.id, "4_z123");
        assert_eq!(stored.name, "report 1.pdf");
    }

    #[tokio::test]
    async fn test_upload_url_failure_stops_pipeline() {
        let server = MockServer::start().await;
        mount_authorize(&server).await;
        Mock::given(method("POST"))
            .and(path("/b2api/v2/b2_get_upload_url"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "status": 503, "code": "service_unavailable", "message": "try later"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload-target"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let backend = B2Backend::new(Client::new(), b2_config(&server));
        match backend.upload(&pdf()).await.unwrap_err() {
            BackendError::Upstream { phase, status, .. } => {
                assert_eq!(phase, "get_upload_url");
                assert_eq!(status, 503);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_authorize_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/b2api/v2/b2_authorize_account"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "status": 401, "code": "unauthorized", "message": "bad key"
            })))
            .mount(&server)
            .await;

        let backend = B2Backend::new(Client::new(), b2_config(&server));
        let err = backend.list().await.unwrap_err();
        assert_eq!(err.status().as_u16(), 401);
        assert_eq!(err.client_detail(), "bad key");
    }

    #[tokio::test]
    async fn test_sha1_when_verification_enabled() {
        let server = MockServer::start().await;
        let mut cfg = b2_config(&server);
        cfg.skip_content_sha1 = false;
        let backend = B2Backend::new(Client::new(), cfg);
        let file = UploadRequest {
            bytes: Bytes::from_static(b"abc"),
            file_name: "a.png".to_string(),
            mime_type: "image/png".to_string(),
            supplied_token: Secret::new("bot"),
        };
        assert_eq!(
            backend.content_sha1(&file),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[tokio::test]
    async fn test_delete_resolves_file_name() {
        let server = MockServer::start().await;
        mount_authorize(&server).await;
        Mock::given(method("POST"))
            .and(path("/b2api/v2/b2_get_file_info"))
            .and(body_json(serde_json::json!({"fileId": "4_z123"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "fileId": "4_z123", "fileName": "report.pdf"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/b2api/v2/b2_delete_file_version"))
            .and(body_json(
                serde_json::json!({"fileName": "report.pdf", "fileId": "4_z123"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "fileId": "4_z123", "fileName": "report.pdf"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = B2Backend::new(Client::new(), b2_config(&server));
        backend.delete("4_z123", &Secret::new("bot")).await.unwrap();
    }
}
