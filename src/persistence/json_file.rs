// SPDX-License-Identifier: Apache-2.0

//! JSON file-based persistence with atomic writes.
//!
//! All scopes share one JSON document on disk. Writes are atomic using a
//! write-to-temp-then-rename strategy.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use super::store::Persister;
use crate::error::{Error, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct DatabaseState {
    scopes: HashMap<String, HashMap<String, serde_json::Value>>,
}

/// A shared JSON file database handle
#[derive(Clone)]
pub struct JsonFileDatabase {
    path: PathBuf,
    state: Arc<RwLock<DatabaseState>>,
}

impl JsonFileDatabase {
    /// Open or create a database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let state = if path.exists() {
            let file = File::open(&path)
                .map_err(|e| Error::Persistence(format!("failed to open database: {}", e)))?;
            serde_json::from_reader(BufReader::new(file))
                .map_err(|e| Error::Persistence(format!("failed to parse database: {}", e)))?
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent).map_err(|e| {
                        Error::Persistence(format!("failed to create database directory: {}", e))
                    })?;
                }
            }
            DatabaseState::default()
        };

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Create an in-memory database (useful for testing)
    pub fn open_memory() -> Self {
        Self {
            path: PathBuf::new(),
            state: Arc::new(RwLock::new(DatabaseState::default())),
        }
    }

    /// Create a persister scoped to one consumer
    pub fn persister(&self, scope: impl Into<String>) -> JsonFilePersister {
        JsonFilePersister {
            path: self.path.clone(),
            state: self.state.clone(),
            scope: scope.into(),
            cache: HashMap::new(),
        }
    }
}

/// A persister backed by a JSON file, scoped to a particular consumer.
pub struct JsonFilePersister {
    path: PathBuf,
    state: Arc<RwLock<DatabaseState>>,
    scope: String,
    cache: HashMap<String, serde_json::Value>,
}

impl Persister for JsonFilePersister {
    fn load(&mut self) -> Result<()> {
        let state = self
            .state
            .read()
            .map_err(|e| Error::Persistence(e.to_string()))?;

        self.cache = state.scopes.get(&self.scope).cloned().unwrap_or_default();
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        {
            let mut state = self
                .state
                .write()
                .map_err(|e| Error::Persistence(e.to_string()))?;
            state.scopes.insert(self.scope.clone(), self.cache.clone());
        }

        // In-memory mode
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }

        let state = self
            .state
            .read()
            .map_err(|e| Error::Persistence(e.to_string()))?;

        atomic_write(&self.path, &state)
    }

    fn set_raw_json_value(&mut self, key: &str, value: serde_json::Value) {
        self.cache.insert(key.to_string(), value);
    }

    fn get_raw_json_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.cache.get(key)
    }
}

/// Write state to file atomically (write to temp, then rename)
fn atomic_write(path: &Path, state: &DatabaseState) -> Result<()> {
    use portable_atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    // Process ID plus a counter keeps concurrent writers off each other's temp file
    let unique_id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let temp_path = path.with_extension(format!("tmp.{}.{}", std::process::id(), unique_id));

    let file = File::create(&temp_path)
        .map_err(|e| Error::Persistence(format!("failed to create temp file: {}", e)))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, state)
        .map_err(|e| Error::Persistence(format!("failed to write database: {}", e)))?;
    writer
        .flush()
        .map_err(|e| Error::Persistence(format!("failed to flush database: {}", e)))?;
    drop(writer);

    fs::rename(&temp_path, path)
        .map_err(|e| Error::Persistence(format!("failed to rename database file: {}", e)))?;

    Ok(())
}
