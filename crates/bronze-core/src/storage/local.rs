use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use super::{join_key, Storage, StorageError};

/// Files under a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key.trim_start_matches('/'));
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
        {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(key: &str, source: std::io::Error) -> StorageError {
    if source.kind() == ErrorKind::NotFound {
        StorageError::NotFound(key.to_string())
    } else {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.resolve(prefix)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_error(prefix, err)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| io_error(prefix, err))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|err| io_error(prefix, err))?;
            if !file_type.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                keys.push(join_key(prefix, name));
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn read(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.resolve(key)?;
        let contents = fs::read(&path).await.map_err(|err| io_error(key, err))?;
        Ok(Bytes::from(contents))
    }

    async fn move_object(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let source = self.resolve(from)?;
        let destination = self.resolve(to)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| io_error(to, err))?;
        }
        fs::rename(&source, &destination)
            .await
            .map_err(|err| io_error(from, err))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        fs::remove_file(&path)
            .await
            .map_err(|err| io_error(key, err))
    }
}
