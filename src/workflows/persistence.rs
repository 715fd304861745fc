use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use super::types::WorkflowContext;

/// Schema tag written into the controller metadata block
pub const SCHEMA_VERSION: &str = "1";

/// Errors that can occur while reading or writing workflow state
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid storage key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Invalid workflow record {key:?}: {reason}")]
    InvalidRecord { key: String, reason: String },
}

/// Advisory controller data stored next to the context.
/// Never required for a successful load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerMetadata {
    pub schema_version: String,
    pub actors: Vec<String>,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub hostname: String,
}

impl ControllerMetadata {
    pub fn new(actors: Vec<String>, saved_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            actors,
            saved_at,
            hostname: hostname::get()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
        }
    }
}

/// One persisted workflow instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedWorkflow {
    pub context: WorkflowContext,
    #[serde(default)]
    pub metadata: Option<ControllerMetadata>,
}

/// Storage capability for workflow records, one record per key
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn write(&self, key: &str, record: &PersistedWorkflow) -> Result<(), PersistenceError>;

    /// Returns `Ok(None)` when nothing has been stored under `key`
    async fn read(&self, key: &str) -> Result<Option<PersistedWorkflow>, PersistenceError>;
}

/// Keys become file names, so only a conservative character set is allowed
fn validate_key(key: &str) -> Result<(), PersistenceError> {
    let invalid = |reason: &str| PersistenceError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("key must not be empty"));
    }
    if key.starts_with('.') {
        return Err(invalid("key must not start with '.'"));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(invalid("only ASCII letters, digits, '-', '_' and '.' are allowed"));
    }
    Ok(())
}

/// JSON files under a state directory, `<dir>/<key>.state.json`
#[derive(Debug, Clone)]
pub struct FileSystemStore {
    directory: PathBuf,
}

impl FileSystemStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &PathBuf {
        &self.directory
    }

    fn state_file_path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{key}.state.json"))
    }
}

#[async_trait]
impl PersistenceStore for FileSystemStore {
    async fn write(&self, key: &str, record: &PersistedWorkflow) -> Result<(), PersistenceError> {
        validate_key(key)?;
        fs::create_dir_all(&self.directory).await?;

        let state_file = self.state_file_path(key);
        let serialized = serde_json::to_string_pretty(record)?;

        // Write to temporary file first, then rename
        let temp_file = self.directory.join(format!("{key}.state.json.tmp"));
        fs::write(&temp_file, serialized).await?;
        fs::rename(&temp_file, &state_file).await?;

        info!(
            key = %key,
            state = %record.context.state,
            file = ?state_file,
            "Workflow state saved"
        );
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<PersistedWorkflow>, PersistenceError> {
        validate_key(key)?;
        let state_file = self.state_file_path(key);

        if !fs::try_exists(&state_file).await? {
            debug!(key = %key, file = ?state_file, "No existing state file found");
            return Ok(None);
        }

        let mut file = fs::File::open(&state_file).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;

        let record: PersistedWorkflow = serde_json::from_str(&contents)?;
        info!(
            key = %key,
            state = %record.context.state,
            "Workflow state loaded"
        );
        Ok(Some(record))
    }
}

/// In-memory store for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, PersistedWorkflow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn write(&self, key: &str, record: &PersistedWorkflow) -> Result<(), PersistenceError> {
        validate_key(key)?;
        self.records
            .write()
            .await
            .insert(key.to_string(), record.clone());
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<PersistedWorkflow>, PersistenceError> {
        validate_key(key)?;
        Ok(self.records.read().await.get(key).cloned())
    }
}
