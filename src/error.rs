// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use thiserror::Error;
use tower::BoxError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(String),

    #[error("Regex error: {0}")]
    Regex(String),

    #[error("Header error: {0}")]
    Header(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Split error: {0}")]
    Split(String),

    #[error("reread fingerprint: {0}")]
    RereadFingerprint(#[source] std::io::Error),

    #[error("stat: {0}")]
    Stat(#[source] std::io::Error),

    #[error("File was truncated: {0}")]
    FileTruncated(PathBuf),

    #[error("Reader is closed: {0}")]
    ReaderClosed(PathBuf),

    #[error("Emit error: {0}")]
    Emit(BoxError),
}

pub type Result<T> = std::result::Result<T, Error>;
