use tracing::info;

use crate::storage::{archive_key, Storage, StorageError};

/// Moves a processed file into the `archive/` directory next to it and
/// returns its new key. An existing archived file of the same name is
/// replaced.
pub async fn archive_file(storage: &dyn Storage, key: &str) -> Result<String, StorageError> {
    let destination = archive_key(key);
    storage.move_object(key, &destination).await?;
    info!(from = key, to = %destination, "Archived source file");
    Ok(destination)
}
