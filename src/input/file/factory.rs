// SPDX-License-Identifier: Apache-2.0

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::fingerprint::Fingerprint;
use super::metadata::{FileType, Metadata};
use super::reader::{HeaderPhase, Reader, ReaderSettings};
use crate::attrs::AttributeResolver;
use crate::bufpool::BufferPool;
use crate::config::{FileConsumerConfig, StartAt};
use crate::emit::Emitter;
use crate::error::{Error, Result};
use crate::header::HeaderConfig;
use crate::split::{self, ContentSplit, SplitFuncFactory, TrimMode};

/// Builds readers for newly seen files and rebuilds them from metadata.
pub struct ReaderFactory {
    from_beginning: bool,
    fingerprint_size: usize,
    flush_period: Duration,
    trim: TrimMode,
    header: Option<HeaderConfig>,
    split_func: SplitFuncFactory,
    attributes: Arc<dyn AttributeResolver>,
    settings: Arc<ReaderSettings>,
}

impl ReaderFactory {
    pub fn new(
        config: &FileConsumerConfig,
        emitter: Arc<dyn Emitter>,
        buf_pool: Arc<BufferPool>,
    ) -> Self {
        let settings = ReaderSettings {
            fingerprint_size: config.fingerprint_size,
            initial_buffer_size: config.initial_buffer_size,
            max_log_size: config.max_log_size,
            encoding: config.encoding,
            delete_at_eof: config.delete_at_eof,
            compression: config.compression,
            acquire_fs_lock: config.acquire_fs_lock,
            include_file_record_number: config.include_file_record_number,
            include_file_record_offset: config.include_file_record_offset,
            emitter,
            buf_pool,
        };

        Self {
            from_beginning: config.start_at == StartAt::Beginning,
            fingerprint_size: config.fingerprint_size,
            flush_period: config.force_flush_period(),
            trim: config.trim,
            header: config.header.clone(),
            split_func: split::newline_factory(),
            attributes: Arc::new(config.attributes.clone()) as Arc<dyn AttributeResolver>,
            settings: Arc::new(settings),
        }
    }

    /// Replace the base split function, one is created per reader.
    pub fn with_split_func(mut self, split_func: SplitFuncFactory) -> Self {
        self.split_func = split_func;
        self
    }

    pub fn with_attribute_resolver(mut self, resolver: Arc<dyn AttributeResolver>) -> Self {
        self.attributes = resolver;
        self
    }

    pub fn from_beginning(&self) -> bool {
        self.from_beginning
    }

    pub fn set_from_beginning(&mut self, from_beginning: bool) {
        self.from_beginning = from_beginning;
    }

    pub fn delete_at_eof(&self) -> bool {
        self.settings.delete_at_eof
    }

    pub fn fingerprint_size(&self) -> usize {
        self.fingerprint_size
    }

    pub fn new_fingerprint(&self, file: &File) -> io::Result<Fingerprint> {
        Fingerprint::new_from_file(file, self.fingerprint_size, self.settings.decompress())
    }

    /// Reader for a file with no history.
    pub fn new_reader(&self, file: File, path: PathBuf, fingerprint: Fingerprint) -> Result<Reader> {
        let mut metadata = Metadata::new(fingerprint);
        metadata.file_attributes = self.attributes.resolve(&path)?;
        if path.extension().is_some_and(|ext| ext == "gz") {
            metadata.file_type = FileType::Gzip;
        }
        self.new_reader_from_metadata(file, path, metadata)
    }

    /// Reader that continues from previously recorded metadata.
    pub fn new_reader_from_metadata(
        &self,
        file: File,
        path: PathBuf,
        mut metadata: Metadata,
    ) -> Result<Reader> {
        // The configured size shrank since the metadata was recorded
        if metadata.fingerprint.len() > self.fingerprint_size {
            let shorter = self
                .new_fingerprint(&file)
                .map_err(Error::RereadFingerprint)?;
            if !metadata.fingerprint.starts_with(&shorter) {
                return Err(Error::FileTruncated(path));
            }
            metadata.fingerprint = shorter;
        }

        let size = file.metadata().map_err(Error::Stat)?.len();
        if metadata.offset > size {
            warn!(
                path = ?path,
                offset = metadata.offset,
                size,
                "File is smaller than the recorded offset, likely copytruncate rotation; reading from the start"
            );
            metadata.offset = 0;
        } else if metadata.offset == 0 && !self.from_beginning {
            metadata.offset = size;
        }

        let content_split = ContentSplit::new(
            (self.split_func)(),
            metadata.token_len_state,
            metadata.flush_state,
            self.flush_period,
            self.settings.max_log_size,
            self.trim,
        );

        let header = match &self.header {
            Some(config) if !metadata.header_finalized => {
                Some(HeaderPhase::new(config, self.settings.max_log_size)?)
            }
            _ => None,
        };

        let attributes = self.attributes.resolve(&path)?;
        metadata.file_attributes.extend(attributes);

        Ok(Reader::from_parts(
            file,
            path,
            metadata,
            content_split,
            header,
            Arc::clone(&self.settings),
        ))
    }
}
