// SPDX-License-Identifier: Apache-2.0

//! Save and restore the consumer's known files.

use super::schema::{KNOWN_FILES_KEY, PERSISTED_STATE_VERSION, PersistedState};
use super::store::{Persister, PersisterExt};
use crate::error::{Error, Result};
use crate::input::Metadata;

/// Store `metadata` under the known files key and flush it to storage.
pub fn save(persister: &mut dyn Persister, metadata: Vec<Metadata>) -> Result<()> {
    persister.set_raw_json(KNOWN_FILES_KEY, &PersistedState::new(metadata))?;
    persister.sync()
}

/// Restore previously saved metadata. A store that never saw a checkpoint
/// yields an empty list.
pub fn load(persister: &mut dyn Persister) -> Result<Vec<Metadata>> {
    persister.load()?;

    let state: Option<PersistedState> = persister
        .try_get_raw_json(KNOWN_FILES_KEY)
        .map_err(|e| Error::Persistence(format!("failed to decode known files: {}", e)))?;

    match state {
        None => Ok(Vec::new()),
        Some(state) if state.version != PERSISTED_STATE_VERSION => Err(Error::Persistence(
            format!("unsupported checkpoint version {}", state.version),
        )),
        Some(state) => Ok(state.files),
    }
}
