//! Static asset resolution
//!
//! Assets live in a key-value store. Lookup is two-tier: an exact key match,
//! then a scan for the first key that starts with the requested path, so
//! content-hashed names such as `app.3f2a.js` are reachable as `app`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use percent_encoding::percent_decode_str;

use crate::error::KvError;
use crate::http::{self, mime};
use crate::kv::KvStore;
use crate::logger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticAsset {
    /// Store key that satisfied the lookup
    pub key: String,
    pub bytes: Bytes,
    pub content_type: &'static str,
}

/// Map a request path to a store key
///
/// Strips the leading `/` and decodes percent escapes; the root and any
/// path ending in `/` get `default_document` appended.
pub fn asset_key(path: &str, default_document: &str) -> String {
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    let trimmed = decoded.trim_start_matches('/');
    if trimmed.is_empty() || trimmed.ends_with('/') {
        format!("{trimmed}{default_document}")
    } else {
        trimmed.to_string()
    }
}

pub async fn resolve(
    store: &dyn KvStore,
    path: &str,
    default_document: &str,
) -> Result<Option<StaticAsset>, KvError> {
    let key = asset_key(path, default_document);

    if let Some(bytes) = store.get(&key).await? {
        return Ok(Some(StaticAsset {
            content_type: mime::content_type_for(&key),
            key,
            bytes,
        }));
    }

    // O(n) over stored keys; asset stores are small
    let Some(candidate) = store
        .list_keys()
        .await?
        .into_iter()
        .find(|k| k.starts_with(&key))
    else {
        return Ok(None);
    };

    Ok(store.get(&candidate).await?.map(|bytes| StaticAsset {
        content_type: mime::content_type_for(&candidate),
        key: candidate,
        bytes,
    }))
}

/// Answer from the asset store, or `None` to let dynamic routes try
///
/// A store failure is answered here with a fixed 500; the cause goes to the
/// error log only.
pub async fn serve(
    store: &dyn KvStore,
    path: &str,
    default_document: &str,
    is_head: bool,
) -> Option<Response<Full<Bytes>>> {
    match resolve(store, path, default_document).await {
        Ok(Some(asset)) => Some(http::build_asset_response(
            asset.bytes,
            asset.content_type,
            is_head,
        )),
        Ok(None) => None,
        Err(e) => {
            logger::log_error(&format!("Failed to read static asset for '{path}': {e}"));
            Some(http::build_text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "❌ Error loading static files.",
            ))
        }
    }
}
