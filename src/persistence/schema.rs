// SPDX-License-Identifier: Apache-2.0

//! Persisted checkpoint layout.
//!
//! ```json
//! { "version": 1, "files": [ { "fingerprint": "...", "offset": 42, ... } ] }
//! ```

use serde::{Deserialize, Serialize};

use crate::input::Metadata;

/// Key used to store known files state in the persister
pub const KNOWN_FILES_KEY: &str = "knownFiles";

/// Current schema version for persisted state
pub const PERSISTED_STATE_VERSION: u8 = 1;

/// Persisted state for all known files
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedState {
    /// Schema version
    pub version: u8,
    pub files: Vec<Metadata>,
}

impl PersistedState {
    pub fn new(files: Vec<Metadata>) -> Self {
        Self {
            version: PERSISTED_STATE_VERSION,
            files,
        }
    }
}

impl Default for PersistedState {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
