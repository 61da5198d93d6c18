// SPDX-License-Identifier: Apache-2.0

//! Polling file tailer that tracks file identity by content fingerprint.
//!
//! Each poll discovers files by glob, resolves every path to a [`Reader`]
//! through the [`ReaderFactory`], reconciles the result against the previous
//! poll so that rotated files are drained before their replacements are read,
//! and checkpoints per-file [`Metadata`] so a restart resumes where it left
//! off.
//!
//! [`Reader`]: input::Reader
//! [`ReaderFactory`]: input::ReaderFactory
//! [`Metadata`]: input::Metadata

pub mod attrs;
pub mod bufpool;
pub mod config;
pub mod decode;
pub mod emit;
pub mod error;
pub mod header;
pub mod init;
pub mod input;
pub mod manager;
pub mod persistence;
pub mod split;
pub mod telemetry;
pub mod tracker;

pub use config::{Compression, FileConsumerConfig, StartAt};
pub use emit::{Emitter, RecordOffset, Token};
pub use error::{Error, Result};
pub use manager::Manager;
