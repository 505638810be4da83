//! Upload gateway
//!
//! Validates uploads and deletes, checks the shared token and calls the
//! configured backend through the call policy. Checks run in a fixed order
//! and the first failure wins:
//!
//! 1. file and token present
//! 2. token matches
//! 3. size limit (profile)
//! 4. type allow-list (profile)
//! 5. file name is a plain name
//! 6. no existing file with the same name (profile)
//! 7. backend upload

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

use super::form::{self, DeleteForm, UploadForm};
use crate::backend::{
    CallPolicy, DeleteAuthority, RemoteFileEntry, StorageBackend, StoredFile, UploadRequest,
};
use crate::config::{AppState, Secret, ValidationProfile};
use crate::error::{BackendError, GatewayError, ValidationError};
use crate::http::{self, mime, EnvelopeData, ResponseEnvelope};
use crate::logger;

const MIB: u64 = 1024 * 1024;

pub struct UploadGateway<'a> {
    backend: &'a dyn StorageBackend,
    profile: &'a ValidationProfile,
    token: &'a Secret,
    policy: CallPolicy,
}

impl<'a> UploadGateway<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            backend: state.backend.as_ref(),
            profile: &state.profile,
            token: &state.config.auth.bot_token,
            policy: state.policy,
        }
    }

    pub async fn upload(&self, form: UploadForm) -> Result<StoredFile, GatewayError> {
        let (Some(file), Some(supplied)) = (form.file, form.bot_token.filter(|t| !t.is_empty()))
        else {
            return Err(ValidationError::MissingFields.into());
        };
        if !self.token.matches(&supplied) {
            return Err(GatewayError::Auth);
        }

        let size = file.bytes.len() as u64;
        if let Some(max) = self.profile.max_file_size {
            if size > max {
                return Err(ValidationError::TooLarge { max_mb: max / MIB }.into());
            }
        }

        let mime_type = file
            .content_type
            .as_deref()
            .map(mime::essence)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| mime::essence(mime::content_type_for(&file.file_name)));
        if let Some(allowed) = &self.profile.allowed_types {
            if !allowed.iter().any(|a| mime::essence(a) == mime_type) {
                return Err(ValidationError::BadType(mime_type).into());
            }
        }

        if !is_plain_name(&file.file_name) {
            return Err(ValidationError::InvalidName(file.file_name).into());
        }

        if self.profile.unique_names && self.name_taken(&file.file_name).await? {
            return Err(ValidationError::DuplicateName(file.file_name).into());
        }

        let request = UploadRequest {
            bytes: file.bytes,
            file_name: file.file_name,
            mime_type,
            supplied_token: Secret::new(supplied),
        };
        let stored = self
            .policy
            .run(self.backend.name(), "upload", || self.backend.upload(&request))
            .await?;
        Ok(stored)
    }

    async fn name_taken(&self, name: &str) -> Result<bool, GatewayError> {
        match self.list_remote().await {
            Ok(entries) => Ok(entries.iter().any(|e| e.name == name)),
            // An empty folder has nothing to collide with
            Err(BackendError::EmptyListing { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_remote(&self) -> Result<Vec<RemoteFileEntry>, BackendError> {
        self.policy
            .run(self.backend.name(), "list", || self.backend.list())
            .await
    }

    pub async fn list(&self) -> Result<Vec<RemoteFileEntry>, GatewayError> {
        Ok(self.list_remote().await?)
    }

    pub async fn delete(&self, form: DeleteForm) -> Result<String, GatewayError> {
        let Some(file_id) = form.file_id.filter(|id| !id.is_empty()) else {
            return Err(ValidationError::MissingFileId.into());
        };
        let supplied = Secret::new(form.bot_token.unwrap_or_default());

        if self.backend.delete_authority() == DeleteAuthority::SharedToken
            && !self.token.matches(supplied.expose())
        {
            return Err(GatewayError::Auth);
        }

        self.policy
            .run(self.backend.name(), "delete", || {
                self.backend.delete(&file_id, &supplied)
            })
            .await?;
        Ok(file_id)
    }
}

/// A single path segment: no separators, no dot segments, no NUL
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Log a failed request at a level matching its cause
fn log_failure(route: &str, err: &GatewayError) {
    match err {
        GatewayError::Backend(_) => logger::log_error(&format!("{route} failed: {err}")),
        GatewayError::Auth => logger::log_warning(&format!("{route} rejected: bot token mismatch")),
        GatewayError::Validation(_) => logger::log_debug(&format!("{route} rejected: {err}")),
    }
}

fn failure_response(route: &str, prefix: &str, err: &GatewayError) -> Response<Full<Bytes>> {
    log_failure(route, err);
    http::build_json_response(
        err.status(),
        &ResponseEnvelope::failure(err.client_message(prefix)),
    )
}

pub async fn handle_upload(
    state: &AppState,
    content_type: Option<&str>,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let outcome = match form::parse_upload_form(content_type, body).await {
        Ok(form) => UploadGateway::new(state).upload(form).await,
        Err(e) => Err(e.into()),
    };

    match outcome {
        Ok(stored) => {
            logger::log_info(&format!(
                "Uploaded '{}' to {} as {}",
                stored.name,
                state.backend.name(),
                stored.id
            ));
            http::build_json_response(
                StatusCode::OK,
                &ResponseEnvelope::success(
                    "✅ File uploaded successfully!",
                    EnvelopeData {
                        file_id: Some(stored.id),
                        file_url: stored.url,
                        file_name: Some(stored.name),
                        files: None,
                    },
                ),
            )
        }
        Err(e) => failure_response("Upload", "❌ Upload failed", &e),
    }
}

pub async fn handle_list(state: &AppState) -> Response<Full<Bytes>> {
    match UploadGateway::new(state).list().await {
        Ok(files) => http::build_json_response(
            StatusCode::OK,
            &ResponseEnvelope::success(
                format!("✅ Retrieved {} files.", files.len()),
                EnvelopeData {
                    files: Some(files),
                    ..EnvelopeData::default()
                },
            ),
        ),
        Err(e) => failure_response("List", "❌ Failed to fetch files", &e),
    }
}

pub async fn handle_delete(state: &AppState, body: &[u8]) -> Response<Full<Bytes>> {
    let outcome = match form::parse_delete_form(body) {
        Ok(form) => UploadGateway::new(state).delete(form).await,
        Err(e) => Err(e.into()),
    };

    match outcome {
        Ok(file_id) => {
            logger::log_info(&format!(
                "Deleted {file_id} from {}",
                state.backend.name()
            ));
            http::build_json_response(
                StatusCode::OK,
                &ResponseEnvelope::success("✅ File deleted successfully!", EnvelopeData::default()),
            )
        }
        Err(e) => failure_response("Delete", "❌ Failed to delete file", &e),
    }
}
