// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Key/value storage for checkpoint state.
///
/// Values are held as raw JSON so the stored file stays readable. Reads and
/// writes go through an in-memory view; `load` refreshes it from storage and
/// `sync` writes it back.
pub trait Persister: Send {
    fn load(&mut self) -> Result<()>;

    fn sync(&self) -> Result<()>;

    fn set_raw_json_value(&mut self, key: &str, value: serde_json::Value);

    fn get_raw_json_value(&self, key: &str) -> Option<&serde_json::Value>;
}

/// Typed access on top of any [`Persister`].
pub trait PersisterExt: Persister {
    fn set_raw_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| Error::Persistence(format!("failed to serialize to JSON: {}", e)))?;
        self.set_raw_json_value(key, json_value);
        Ok(())
    }

    /// Ok(None) if the key doesn't exist, Err if it exists but doesn't
    /// deserialize into `T`.
    fn try_get_raw_json<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> std::result::Result<Option<T>, serde_json::Error> {
        match self.get_raw_json_value(key) {
            None => Ok(None),
            Some(v) => T::deserialize(v).map(Some),
        }
    }
}

impl<P: Persister + ?Sized> PersisterExt for P {}

/// Mock persister for testing
#[cfg(test)]
#[derive(Default)]
pub struct MockPersister {
    data: std::collections::HashMap<String, serde_json::Value>,
}

#[cfg(test)]
impl MockPersister {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl Persister for MockPersister {
    fn load(&mut self) -> Result<()> {
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }

    fn set_raw_json_value(&mut self, key: &str, value: serde_json::Value) {
        self.data.insert(key.to_string(), value);
    }

    fn get_raw_json_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }
}
