//! Request body parsing for the upload and delete routes

use bytes::Bytes;
use serde::Deserialize;
use std::convert::Infallible;

use crate::error::ValidationError;

/// The `file` part of an upload form
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: String,
    /// Declared part Content-Type, if the client sent one
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Fields of `multipart/form-data` upload; either may be missing
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<FilePart>,
    pub bot_token: Option<String>,
}

/// `{"fileId": ..., "bot_token": ...}`
#[derive(Debug, Default, Deserialize)]
pub struct DeleteForm {
    #[serde(rename = "fileId", default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub bot_token: Option<String>,
}

/// Parse a fully buffered multipart body
///
/// A `file` part with an empty file name counts as absent, like a browser
/// form submitted without choosing a file.
pub async fn parse_upload_form(
    content_type: Option<&str>,
    body: Bytes,
) -> Result<UploadForm, ValidationError> {
    let boundary = content_type
        .and_then(|ct| multer::parse_boundary(ct).ok())
        .ok_or_else(|| {
            ValidationError::MalformedBody("expected multipart/form-data".to_string())
        })?;

    let stream = futures::stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(ToString::to_string);
                let bytes = field.bytes().await.map_err(malformed)?;
                if !file_name.is_empty() {
                    form.file = Some(FilePart {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            Some("bot_token") => {
                form.bot_token = Some(field.text().await.map_err(malformed)?);
            }
            _ => {}
        }
    }

    Ok(form)
}

pub fn parse_delete_form(body: &[u8]) -> Result<DeleteForm, ValidationError> {
    serde_json::from_slice(body).map_err(|e| ValidationError::MalformedBody(e.to_string()))
}

fn malformed(err: multer::Error) -> ValidationError {
    ValidationError::MalformedBody(err.to_string())
}
