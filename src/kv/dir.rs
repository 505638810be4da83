//! Directory-backed key-value store
//!
//! Each key is a file path relative to the root directory.

use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{validate_key, KvStore};
use crate::error::KvError;

pub struct DirKv {
    root: PathBuf,
}

impl DirKv {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open(root: impl AsRef<Path>) -> Result<Self, KvError> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, KvError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl KvStore for DirKv {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, KvError> {
        let Ok(path) = self.path_for(key) else {
            return Ok(None);
        };
        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            // A directory or missing file is simply not a value
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::IsADirectory) => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<(), KvError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, KvError> {
        let Ok(path) = self.path_for(key) else {
            return Ok(false);
        };
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>, KvError> {
        let mut keys = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];

        while let Some((dir, prefix)) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let Some(name) = entry.file_name().to_str().map(ToString::to_string) else {
                    continue;
                };
                let key = format!("{prefix}{name}");
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push((entry.path(), format!("{key}/")));
                } else if file_type.is_file() {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let kv = DirKv::open(tmp.path()).unwrap();

        kv.put("css/site.css", Bytes::from_static(b"body{}"))
            .await
            .unwrap();
        kv.put("index.html", Bytes::from_static(b"<html>"))
            .await
            .unwrap();

        assert_eq!(
            kv.list_keys().await.unwrap(),
            vec!["css/site.css", "index.html"]
        );
        assert_eq!(
            kv.get("css/site.css").await.unwrap(),
            Some(Bytes::from_static(b"body{}"))
        );
        assert!(tmp.path().join("css").join("site.css").is_file());
    }

    #[tokio::test]
    async fn test_missing_and_directory_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let kv = DirKv::open(tmp.path()).unwrap();
        kv.put("css/site.css", Bytes::from_static(b"x")).await.unwrap();

        assert_eq!(kv.get("nope.txt").await.unwrap(), None);
        assert_eq!(kv.get("css").await.unwrap(), None);
        assert_eq!(kv.get("../escape").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let kv = DirKv::open(tmp.path()).unwrap();
        kv.put("a.bin", Bytes::from_static(b"1")).await.unwrap();
        assert!(kv.delete("a.bin").await.unwrap());
        assert!(!kv.delete("a.bin").await.unwrap());
    }
}
