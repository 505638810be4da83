//! JSON envelope returned by every dynamic route

use serde::Serialize;

use crate::backend::RemoteFileEntry;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResponseEnvelope {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub data: EnvelopeData,
}

/// Optional payload fields; absent ones are omitted from the JSON
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<RemoteFileEntry>>,
}

impl ResponseEnvelope {
    pub fn success(message: impl Into<String>, data: EnvelopeData) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }

    /// Failure envelope; a failure always carries a message
    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            message: if message.is_empty() {
                "❌ Request failed.".to_string()
            } else {
                message
            },
            data: EnvelopeData::default(),
        }
    }
}
