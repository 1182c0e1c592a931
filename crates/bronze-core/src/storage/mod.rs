//! Storage capability over the locations raw exports are uploaded to.
//!
//! Keys are `/`-separated paths relative to the storage root, e.g.
//! `airbnb/05_2020.csv`. Processed files move to a sibling `archive/`
//! directory under the same prefix.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::config::{StorageConfig, StorageKind};

mod local;
#[cfg(feature = "runtime")]
mod s3;

pub use local::LocalStorage;
#[cfg(feature = "runtime")]
pub use s3::S3Storage;

pub const ARCHIVE_DIR: &str = "archive";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("invalid key '{0}'")]
    InvalidKey(String),
    #[error("I/O error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sdk error: {0}")]
    Sdk(String),
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Human-readable location, used in log lines.
    fn describe(&self) -> String;

    /// Keys of the files directly under `prefix`. A missing location lists as
    /// empty.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    async fn read(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Moves an object. Backends without an atomic rename copy then delete.
    async fn move_object(&self, from: &str, to: &str) -> Result<(), StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

pub fn join_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

pub fn parent_prefix(key: &str) -> &str {
    key.rsplit_once('/').map_or("", |(parent, _)| parent)
}

/// `airbnb/05_2020.csv` → `airbnb/archive/05_2020.csv`.
pub fn archive_key(key: &str) -> String {
    join_key(
        &join_key(parent_prefix(key), ARCHIVE_DIR),
        file_name(key),
    )
}

/// Builds the storage backend named by the configuration.
pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    match config.kind {
        StorageKind::Local => Ok(Arc::new(LocalStorage::new(&config.root))),
        #[cfg(feature = "runtime")]
        StorageKind::S3 => {
            let store = S3Storage::new(config.clone()).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "runtime"))]
        StorageKind::S3 => Err(StorageError::Configuration(
            "S3 storage requires the `runtime` feature".into(),
        )
        .into()),
    }
}
