//! Blob storage for submitted task files.
//!
//! Paths are relative, `/`-separated and scoped under the tenant. The core
//! only ever stores the returned path on the task row.

pub mod local;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::TenantId;

pub use local::LocalFileStore;
pub use memory::MemoryFileStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn put(&self, tenant: &TenantId, path: &str, bytes: Vec<u8>) -> Result<(), StorageError>;

    async fn get(&self, tenant: &TenantId, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove a stored file. Deleting a missing file succeeds.
    async fn delete(&self, tenant: &TenantId, path: &str) -> Result<(), StorageError>;
}

/// Reject absolute paths and any `..` or empty segment
pub fn validate_path(path: &str) -> Result<(), StorageError> {
    let bad = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        Err(StorageError::InvalidPath(path.to_string()))
    } else {
        Ok(())
    }
}

/// Reduce a client-supplied file name to a single safe path segment
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "upload.bin".to_string()
    } else {
        trimmed.to_string()
    }
}
