use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{validate_path, FileStore, StorageError};
use crate::types::TenantId;

/// In-process file store for tests and local runs
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: RwLock<HashMap<(TenantId, String), Vec<u8>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, tenant: &TenantId, path: &str) -> bool {
        self.files.read().await.contains_key(&(tenant.clone(), path.to_string()))
    }

    pub async fn file_count(&self) -> usize {
        self.files.read().await.len()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn put(&self, tenant: &TenantId, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        validate_path(path)?;
        self.files.write().await.insert((tenant.clone(), path.to_string()), bytes);
        Ok(())
    }

    async fn get(&self, tenant: &TenantId, path: &str) -> Result<Vec<u8>, StorageError> {
        self.files
            .read()
            .await
            .get(&(tenant.clone(), path.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn delete(&self, tenant: &TenantId, path: &str) -> Result<(), StorageError> {
        self.files.write().await.remove(&(tenant.clone(), path.to_string()));
        Ok(())
    }
}
