// SPDX-License-Identifier: Apache-2.0

//! Persistence for storing file metadata between restarts.
//!
//! Uses JSON file storage with atomic writes. The consumer stores its list of
//! known files under [`KNOWN_FILES_KEY`] through the [`checkpoint`] helpers.

pub mod checkpoint;
mod json_file;
mod schema;
mod store;

pub use json_file::{JsonFileDatabase, JsonFilePersister};
pub use schema::{KNOWN_FILES_KEY, PERSISTED_STATE_VERSION, PersistedState};
#[cfg(test)]
pub use store::MockPersister;
pub use store::{Persister, PersisterExt};
