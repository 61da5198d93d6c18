// SPDX-License-Identifier: Apache-2.0

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::fingerprint::Fingerprint;
use crate::attrs::Attributes;
use crate::split::{FlushState, TokenLenState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    #[default]
    Plain,
    Gzip,
}

/// Everything needed to resume reading a file, and what gets checkpointed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub fingerprint: Fingerprint,
    /// Bytes consumed so far; for gzip files, the compressed size read
    pub offset: u64,
    #[serde(default)]
    pub record_num: u64,
    #[serde(default)]
    pub file_attributes: Attributes,
    #[serde(default)]
    pub header_finalized: bool,
    #[serde(default)]
    pub token_len_state: TokenLenState,
    #[serde(default)]
    pub flush_state: FlushState,
    #[serde(default)]
    pub file_type: FileType,
}

impl Metadata {
    pub fn new(fingerprint: Fingerprint) -> Self {
        Self {
            fingerprint,
            offset: 0,
            record_num: 0,
            file_attributes: Attributes::new(),
            header_finalized: false,
            token_len_state: TokenLenState::default(),
            flush_state: FlushState::new(Utc::now()),
            file_type: FileType::Plain,
        }
    }
}
