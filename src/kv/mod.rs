//! Key-value store module
//!
//! The asset store and the bundled upload backend both sit on this small
//! async interface. Keys are relative, `/`-separated names such as
//! `index.html` or `css/site.3f2a.css`.

mod dir;
mod memory;

pub use dir::DirKv;
pub use memory::MemoryKv;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::KvError;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, KvError>;

    async fn put(&self, key: &str, value: Bytes) -> Result<(), KvError>;

    /// Returns whether the key existed
    async fn delete(&self, key: &str) -> Result<bool, KvError>;

    /// All keys, sorted
    async fn list_keys(&self) -> Result<Vec<String>, KvError>;
}

/// Reject keys that could escape the store or address nothing
pub fn validate_key(key: &str) -> Result<(), KvError> {
    let bad_segment = key
        .split('/')
        .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if key.is_empty() || key.contains('\\') || key.contains('\0') || bad_segment {
        return Err(KvError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("index.html").is_ok());
        assert!(validate_key("css/site.css").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("../secret").is_err());
        assert!(validate_key("a//b").is_err());
        assert!(validate_key("a\\b").is_err());
    }
}
