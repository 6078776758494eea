//! Persistence sinks for deployment output.

use std::{
    collections::BTreeMap,
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use rand::Rng;

/// A failed sink write.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to write '{key}'")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid sink key '{key}'")]
    InvalidKey { key: String },
}

/// A key-value store whose writes atomically replace the previous value.
///
/// Readers must observe either the previous value or the complete new one.
pub trait Sink: Send + Sync {
    fn write(&self, key: &str, value: &[u8]) -> Result<(), SinkError>;
}

/// Writes each key as a file inside a directory.
///
/// The directory is created on first write. Values are written to a temporary sibling
/// file, synced, then renamed over the destination.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the value of `key` is stored at.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn write_atomic(&self, key: &str, value: &[u8]) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let target = self.path_for(key);
        let suffix: u32 = rand::rng().random();
        let tmp = self.dir.join(format!(".{key}.{suffix:08x}.tmp"));

        let result = (|| {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(value)?;
            file.sync_all()?;
            std::fs::rename(&tmp, &target)
        })();

        if result.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        result.map(|()| target)
    }
}

impl Sink for FileSink {
    fn write(&self, key: &str, value: &[u8]) -> Result<(), SinkError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(SinkError::InvalidKey {
                key: key.to_string(),
            });
        }

        let path = self.write_atomic(key, value).map_err(|source| SinkError::Io {
            key: key.to_string(),
            source,
        })?;

        tracing::debug!(path = %path.display(), bytes = value.len(), "Sink value written");
        Ok(())
    }
}

/// Keeps written values in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    values: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last value written under `key`.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// All keys written so far, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl Sink for MemorySink {
    fn write(&self, key: &str, value: &[u8]) -> Result<(), SinkError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
