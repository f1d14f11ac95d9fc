//! One-file-per-operation JSON store
//!
//! Each operation lives in `<dir>/<id>.json`. Writes go to `<id>.json.tmp`,
//! are fsynced and then renamed over the target, so a crash leaves either
//! the old or the new record, never a torn one. A single async mutex
//! serializes writers; that is what makes `update_if_status` a
//! compare-and-swap.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use repsync_core::offline_queue::{Operation, OperationStatus, PersistentStore, QueueResult};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::errors::{InfraError, InfraResult};

const RECORD_EXTENSION: &str = "json";
const TEMP_SUFFIX: &str = ".json.tmp";

/// File-backed operation store
#[derive(Debug)]
pub struct FileOperationStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileOperationStore {
    /// Open (creating if needed) a store rooted at `dir`
    ///
    /// Temp files left by an interrupted write are removed.
    #[instrument(skip_all)]
    pub async fn open(dir: impl AsRef<Path>) -> InfraResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await.map_err(|e| InfraError::io(&dir, e))?;

        let store = Self { dir, write_lock: Mutex::new(()) };
        let removed = store.remove_stale_temp_files().await?;
        if removed > 0 {
            warn!(removed, dir = %store.dir.display(), "Removed temp files from an interrupted write");
        }
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> InfraResult<PathBuf> {
        let valid = !id.is_empty()
            && id != "."
            && id != ".."
            && id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(InfraError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.{RECORD_EXTENSION}")))
    }

    async fn remove_stale_temp_files(&self) -> InfraResult<usize> {
        let mut entries = fs::read_dir(&self.dir).await.map_err(|e| InfraError::io(&self.dir, e))?;
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await.map_err(|e| InfraError::io(&self.dir, e))? {
            let path = entry.path();
            if path.to_string_lossy().ends_with(TEMP_SUFFIX) {
                fs::remove_file(&path).await.map_err(|e| InfraError::io(&path, e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn read_record(&self, path: &Path) -> InfraResult<Option<Operation>> {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(InfraError::io(path, e)),
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }

    /// Atomic replace; caller holds `write_lock`
    async fn write_record(&self, operation: &Operation) -> InfraResult<()> {
        let path = self.record_path(&operation.id)?;
        let temp_path = self.dir.join(format!("{}{TEMP_SUFFIX}", operation.id));
        let data = serde_json::to_vec(operation)?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .await
            .map_err(|e| InfraError::io(&temp_path, e))?;
        file.write_all(&data).await.map_err(|e| InfraError::io(&temp_path, e))?;
        file.sync_all().await.map_err(|e| InfraError::io(&temp_path, e))?;
        drop(file);

        fs::rename(&temp_path, &path).await.map_err(|e| InfraError::io(&path, e))?;
        debug!(operation_id = %operation.id, bytes = data.len(), "Persisted operation");
        Ok(())
    }

    async fn load_all(&self) -> InfraResult<Vec<Operation>> {
        let mut entries = fs::read_dir(&self.dir).await.map_err(|e| InfraError::io(&self.dir, e))?;
        let mut operations = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(|e| InfraError::io(&self.dir, e))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            match self.read_record(&path).await {
                Ok(Some(op)) => operations.push(op),
                Ok(None) => {}
                // A corrupt record must not hide every other operation
                Err(InfraError::Common(e)) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable operation record");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(operations)
    }
}

#[async_trait]
impl PersistentStore for FileOperationStore {
    async fn put(&self, operation: &Operation) -> QueueResult<()> {
        let _guard = self.write_lock.lock().await;
        Ok(self.write_record(operation).await?)
    }

    async fn get(&self, id: &str) -> QueueResult<Option<Operation>> {
        let path = self.record_path(id)?;
        Ok(self.read_record(&path).await?)
    }

    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn get_all(&self) -> QueueResult<Vec<Operation>> {
        Ok(self.load_all().await?)
    }

    async fn delete(&self, id: &str) -> QueueResult<bool> {
        let path = self.record_path(id)?;
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(InfraError::io(&path, e).into()),
        }
    }

    async fn update_if_status(
        &self,
        id: &str,
        expected: OperationStatus,
        operation: &Operation,
    ) -> QueueResult<bool> {
        let path = self.record_path(id)?;
        let _guard = self.write_lock.lock().await;

        match self.read_record(&path).await? {
            Some(current) if current.status == expected => {
                self.write_record(operation).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count(&self) -> QueueResult<usize> {
        let mut entries = fs::read_dir(&self.dir).await.map_err(|e| InfraError::io(&self.dir, e))?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await.map_err(|e| InfraError::io(&self.dir, e))? {
            if entry.path().extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION) {
                count += 1;
            }
        }
        Ok(count)
    }
}
