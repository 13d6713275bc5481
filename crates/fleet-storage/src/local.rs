//! Local-filesystem [`ObjectStore`] backend.

use crate::{ObjectStore, StorageValue};
use async_trait::async_trait;
use fleet_error::{ErrorCode, FleetError};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Stores every key as a file under `root/<prefix>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    prefix: String,
}

impl LocalStore {
    /// Create a store rooted at `root`, scoped to `prefix`.
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
        }
    }

    fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.prefix)
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.bucket_dir().join(key)
    }

    fn to_not_found(key: &str, err: std::io::Error) -> FleetError {
        if err.kind() == std::io::ErrorKind::NotFound {
            FleetError::new(ErrorCode::NotFound, format!("no such key: {key}"))
        } else {
            FleetError::internal(format!("io error for {key}: {err}"))
        }
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, value: StorageValue) -> Result<(), FleetError> {
        let path = self.file_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FleetError::internal(format!("mkdir {}: {e}", parent.display())))?;
        }
        fs::write(&path, value.to_bytes())
            .await
            .map_err(|e| FleetError::internal(format!("write {key}: {e}")))
    }

    async fn get(&self, key: &str) -> Result<StorageValue, FleetError> {
        let path = self.file_path(key);
        let bytes = fs::read(&path).await.map_err(|e| Self::to_not_found(key, e))?;
        StorageValue::decode(key, bytes)
    }

    async fn delete(&self, key: &str) -> Result<(), FleetError> {
        let path = self.file_path(key);
        fs::remove_file(&path)
            .await
            .map_err(|e| Self::to_not_found(key, e))
    }

    async fn exists(&self, key: &str) -> Result<bool, FleetError> {
        Ok(fs::metadata(self.file_path(key)).await.is_ok())
    }

    async fn append(&self, key: &str, value: Value) -> Result<(), FleetError> {
        let path = self.file_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FleetError::internal(format!("mkdir {}: {e}", parent.display())))?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| FleetError::internal(format!("open {key}: {e}")))?;
        file.write_all(&StorageValue::line_bytes(&value))
            .await
            .map_err(|e| FleetError::internal(format!("append {key}: {e}")))
    }

    async fn append_many(&self, key: &str, values: Vec<Value>) -> Result<(), FleetError> {
        let path = self.file_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FleetError::internal(format!("mkdir {}: {e}", parent.display())))?;
        }
        let mut bytes = Vec::new();
        for value in &values {
            bytes.extend(StorageValue::line_bytes(value));
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| FleetError::internal(format!("open {key}: {e}")))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| FleetError::internal(format!("append {key}: {e}")))
    }

    async fn list(&self) -> Result<Vec<String>, FleetError> {
        let dir = self.bucket_dir();
        if fs::metadata(&dir).await.is_err() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        collect_files(&dir, &dir, &mut entries)
            .await
            .map_err(|e| FleetError::internal(format!("list {}: {e}", dir.display())))?;
        entries.sort_by_key(|(_, created)| *created);
        Ok(entries.into_iter().map(|(key, _)| key).collect())
    }

    fn path(&self, key: &str) -> String {
        self.file_path(key).display().to_string()
    }

    async fn ensure_bucket(&self) -> Result<(), FleetError> {
        fs::create_dir_all(self.bucket_dir())
            .await
            .map_err(|e| FleetError::internal(format!("ensure_bucket: {e}")))
    }

    async fn bucket_exists(&self) -> Result<bool, FleetError> {
        Ok(fs::metadata(self.bucket_dir()).await.is_ok())
    }

    async fn is_healthy(&self) -> bool {
        fs::metadata(&self.root).await.is_ok()
    }
}

fn collect_files<'a>(
    root: &'a Path,
    dir: &'a Path,
    out: &'a mut Vec<(String, std::time::SystemTime)>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut read_dir = fs::read_dir(dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                collect_files(root, &path, out).await?;
            } else {
                let created = metadata
                    .created()
                    .or_else(|_| metadata.modified())
                    .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
                let rel = path
                    .strip_prefix(root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace(std::path::MAIN_SEPARATOR, "/");
                out.push((rel, created));
            }
        }
        Ok(())
    })
}
