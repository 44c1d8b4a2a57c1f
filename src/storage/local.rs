use std::path::PathBuf;

use async_trait::async_trait;

use super::{validate_path, FileStore, StorageError};
use crate::types::TenantId;

/// Files on the local filesystem under `<root>/<tenant>/<path>`
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, tenant: &TenantId, path: &str) -> Result<PathBuf, StorageError> {
        validate_path(path)?;
        validate_path(tenant.as_str())?;
        Ok(self.root.join(tenant.as_str()).join(path))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn put(&self, tenant: &TenantId, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let full = self.resolve(tenant, path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        tracing::debug!("Stored file {}", full.display());
        Ok(())
    }

    async fn get(&self, tenant: &TenantId, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(tenant, path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound(path.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, tenant: &TenantId, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(tenant, path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
