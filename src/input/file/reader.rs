// SPDX-License-Identifier: Apache-2.0

use flate2::read::MultiGzDecoder;
use std::fs::{self, File};
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::fingerprint::Fingerprint;
use super::lock::FileLock;
use super::metadata::{FileType, Metadata};
use super::scanner::Scanner;
use crate::attrs::{Attributes, LOG_FILE_RECORD_NUMBER, LOG_FILE_RECORD_OFFSET};
use crate::bufpool::BufferPool;
use crate::config::Compression;
use crate::decode::Encoding;
use crate::emit::{Emitter, RecordOffset, Token};
use crate::error::{Error, Result};
use crate::header::{HeaderConfig, HeaderLine, HeaderReader};
use crate::split::{ContentSplit, NewlineSplit, ToLength, Trim, TrimMode};

/// Settings shared by every reader a factory produces.
#[derive(Clone)]
pub(crate) struct ReaderSettings {
    pub(crate) fingerprint_size: usize,
    pub(crate) initial_buffer_size: usize,
    pub(crate) max_log_size: usize,
    pub(crate) encoding: Encoding,
    pub(crate) delete_at_eof: bool,
    pub(crate) compression: Compression,
    pub(crate) acquire_fs_lock: bool,
    pub(crate) include_file_record_number: bool,
    pub(crate) include_file_record_offset: bool,
    pub(crate) emitter: Arc<dyn Emitter>,
    pub(crate) buf_pool: Arc<BufferPool>,
}

impl ReaderSettings {
    pub(crate) fn decompress(&self) -> bool {
        self.compression != Compression::None
    }

    fn max_buffer_size(&self) -> usize {
        self.max_log_size.saturating_mul(2)
    }
}

/// Header lines still being consumed.
pub(crate) struct HeaderPhase {
    reader: HeaderReader,
    split: Trim<ToLength<NewlineSplit>>,
}

impl HeaderPhase {
    pub(crate) fn new(config: &HeaderConfig, max_log_size: usize) -> Result<Self> {
        Ok(Self {
            reader: HeaderReader::new(config)?,
            split: Trim::new(
                ToLength::new(NewlineSplit::default(), max_log_size),
                TrimMode::Whitespace,
            ),
        })
    }
}

/// How a read burst ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadOutcome {
    Eof,
    Cancelled,
}

/// Reads one file from its offset to EOF, emitting a record per token.
///
/// A reader exclusively owns its file handle. Reading takes `&mut self`, so
/// one reader is never driven by two workers at once.
pub struct Reader {
    file: Option<File>,
    file_name: PathBuf,
    fingerprint: Fingerprint,
    offset: u64,
    record_num: u64,
    file_attributes: Attributes,
    header_finalized: bool,
    file_type: FileType,
    content_split: ContentSplit,
    header: Option<HeaderPhase>,
    settings: Arc<ReaderSettings>,
}

impl Reader {
    pub(crate) fn from_parts(
        file: File,
        file_name: PathBuf,
        metadata: Metadata,
        content_split: ContentSplit,
        header: Option<HeaderPhase>,
        settings: Arc<ReaderSettings>,
    ) -> Self {
        Self {
            file: Some(file),
            file_name,
            fingerprint: metadata.fingerprint,
            offset: metadata.offset,
            record_num: metadata.record_num,
            file_attributes: metadata.file_attributes,
            header_finalized: metadata.header_finalized,
            file_type: metadata.file_type,
            content_split,
            header,
            settings,
        }
    }

    pub fn file_name(&self) -> &Path {
        &self.file_name
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn record_num(&self) -> u64 {
        self.record_num
    }

    pub fn file_attributes(&self) -> &Attributes {
        &self.file_attributes
    }

    pub fn header_finalized(&self) -> bool {
        self.header_finalized
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    /// Whether both readers were opened through the same path.
    pub fn name_equals(&self, other: &Reader) -> bool {
        self.file_name == other.file_name
    }

    /// Snapshot of everything needed to resume this file later.
    pub fn metadata(&self) -> Metadata {
        Metadata {
            fingerprint: self.fingerprint.clone(),
            offset: self.offset,
            record_num: self.record_num,
            file_attributes: self.file_attributes.clone(),
            header_finalized: self.header_finalized,
            token_len_state: self.content_split.token_len_state(),
            flush_state: self.content_split.flush_state(),
            file_type: self.file_type,
        }
    }

    /// Release the file handle, keeping only the metadata.
    pub fn close(self) -> Metadata {
        self.metadata()
    }

    /// Whether the open handle still shows the content this reader was
    /// tracking. False means the file was truncated or rewritten in place.
    pub fn validate(&self) -> bool {
        let Some(file) = self.file.as_ref() else {
            return false;
        };

        match Fingerprint::new_from_file(
            file,
            self.settings.fingerprint_size,
            self.settings.decompress(),
        ) {
            Ok(fresh) => fresh.starts_with(&self.fingerprint),
            Err(e) => {
                debug!(path = ?self.file_name, error = %e, "Failed to re-read fingerprint");
                false
            }
        }
    }

    /// Close the handle and remove the file from disk.
    pub fn delete(&mut self) {
        self.file = None;
        match fs::remove_file(&self.file_name) {
            Ok(()) => info!(path = ?self.file_name, "Deleted file after reading to end"),
            Err(e) => error!(path = ?self.file_name, error = %e, "Failed to delete file"),
        }
    }

    /// Read from the current offset to EOF as of this call, emitting every
    /// complete record. An unterminated trailing record stays unread until
    /// it is completed or the flush period forces it out.
    ///
    /// Cancellation is checked before each record; the offset always sits on
    /// the boundary after the last emitted record.
    pub fn read_to_end(&mut self, cancel: &CancellationToken) -> Result<()> {
        let Some(file) = self.file.as_ref() else {
            return Err(Error::ReaderClosed(self.file_name.clone()));
        };

        let lock = if self.settings.acquire_fs_lock {
            match FileLock::exclusive(file) {
                Ok(lock) => Some(lock),
                Err(e) => {
                    warn!(path = ?self.file_name, error = %e, "Failed to lock file, skipping read");
                    return Ok(());
                }
            }
        } else {
            None
        };

        let outcome = if self.is_gzip() {
            self.read_gzip(cancel)
        } else {
            self.read_plain(cancel)
        };

        self.update_fingerprint();
        drop(lock);

        if outcome? == ReadOutcome::Eof && self.settings.delete_at_eof {
            self.delete_if_unchanged();
        }

        Ok(())
    }

    fn is_gzip(&self) -> bool {
        match self.settings.compression {
            Compression::Gzip => true,
            Compression::Auto => self.file_type == FileType::Gzip,
            Compression::None => false,
        }
    }

    fn read_plain(&mut self, cancel: &CancellationToken) -> Result<ReadOutcome> {
        if let Some(outcome) = self.read_header(cancel)? {
            return Ok(outcome);
        }
        self.read_contents(cancel)
    }

    /// Consume header lines. Returns `None` once the header is finalized and
    /// content reading should continue in the same burst.
    fn read_header(&mut self, cancel: &CancellationToken) -> Result<Option<ReadOutcome>> {
        let Reader {
            file,
            file_name,
            offset,
            file_attributes,
            header,
            header_finalized,
            settings,
            ..
        } = self;

        let Some(phase) = header.as_mut() else {
            return Ok(None);
        };

        let mut source = file
            .as_ref()
            .ok_or_else(|| Error::ReaderClosed(file_name.clone()))?;
        source.seek(SeekFrom::Start(*offset))?;

        let mut scanner = Scanner::new(
            source,
            settings.buf_pool.get(settings.initial_buffer_size),
            settings.max_buffer_size(),
            *offset,
        );

        loop {
            if cancel.is_cancelled() {
                return Ok(Some(ReadOutcome::Cancelled));
            }

            let token = match scanner.scan(&mut phase.split)? {
                Some(token) => token,
                None => return Ok(Some(ReadOutcome::Eof)),
            };
            let end = token.end;

            let line = match settings.encoding.decode(token.bytes) {
                Ok(line) => line,
                Err(e) => {
                    warn!(path = ?file_name, error = %e, "Failed to decode header line");
                    *offset = end;
                    continue;
                }
            };

            match phase
                .reader
                .process(&String::from_utf8_lossy(&line), file_attributes)
            {
                Ok(HeaderLine::End) => break,
                Ok(HeaderLine::Consumed) => {}
                Err(e) => warn!(path = ?file_name, error = %e, "Failed to parse header line"),
            }
            *offset = end;
        }

        *header = None;
        *header_finalized = true;
        debug!(path = ?file_name, offset = *offset, "Header finalized");

        Ok(None)
    }

    fn read_contents(&mut self, cancel: &CancellationToken) -> Result<ReadOutcome> {
        let Reader {
            file,
            file_name,
            offset,
            record_num,
            file_attributes,
            content_split,
            settings,
            ..
        } = self;

        let mut source = file
            .as_ref()
            .ok_or_else(|| Error::ReaderClosed(file_name.clone()))?;
        source.seek(SeekFrom::Start(*offset))?;

        let buffer_size = settings
            .initial_buffer_size
            .max(content_split.token_len_state().minimum_length);
        let mut scanner = Scanner::new(
            source,
            settings.buf_pool.get(buffer_size),
            settings.max_buffer_size(),
            *offset,
        );

        loop {
            if cancel.is_cancelled() {
                return Ok(ReadOutcome::Cancelled);
            }

            match scanner.scan(content_split)? {
                Some(token) => {
                    let location = RecordOffset {
                        offset: token.begin,
                        len: token.end - token.begin,
                    };
                    emit_record(
                        settings,
                        file_name,
                        file_attributes,
                        record_num,
                        token.bytes,
                        location,
                    );
                    *offset = token.end;
                }
                None => {
                    *offset = scanner.pos();
                    return Ok(ReadOutcome::Eof);
                }
            }
        }
    }

    /// Gzip files are decompressed from the stored offset, which counts
    /// compressed bytes. Once the stream is drained the offset moves to the
    /// compressed size observed before reading.
    fn read_gzip(&mut self, cancel: &CancellationToken) -> Result<ReadOutcome> {
        let Reader {
            file,
            file_name,
            offset,
            record_num,
            file_attributes,
            content_split,
            settings,
            ..
        } = self;

        let mut source = file
            .as_ref()
            .ok_or_else(|| Error::ReaderClosed(file_name.clone()))?;
        let current_eof = source.metadata().map_err(Error::Stat)?.len();
        if *offset >= current_eof {
            return Ok(ReadOutcome::Eof);
        }
        source.seek(SeekFrom::Start(*offset))?;

        let mut scanner = Scanner::new(
            MultiGzDecoder::new(source),
            settings.buf_pool.get(settings.initial_buffer_size),
            settings.max_buffer_size(),
            0,
        );

        let result = loop {
            if cancel.is_cancelled() {
                return Ok(ReadOutcome::Cancelled);
            }

            match scanner.scan(content_split) {
                Ok(Some(token)) => {
                    let location = RecordOffset {
                        offset: token.begin,
                        len: token.end - token.begin,
                    };
                    emit_record(
                        settings,
                        file_name,
                        file_attributes,
                        record_num,
                        token.bytes,
                        location,
                    );
                }
                Ok(None) => break Ok(ReadOutcome::Eof),
                Err(e) => break Err(e),
            }
        };

        *offset = current_eof;
        result
    }

    /// Extend a fingerprint that is still shorter than the configured size.
    fn update_fingerprint(&mut self) {
        if self.fingerprint.len() >= self.settings.fingerprint_size {
            return;
        }
        let Some(file) = self.file.as_ref() else {
            return;
        };

        match Fingerprint::new_from_file(
            file,
            self.settings.fingerprint_size,
            self.settings.decompress(),
        ) {
            Ok(fresh) if self.fingerprint.is_empty() || fresh.starts_with(&self.fingerprint) => {
                self.fingerprint = fresh;
            }
            Ok(_) => {
                debug!(path = ?self.file_name, "File content no longer matches fingerprint, keeping it")
            }
            Err(e) => debug!(path = ?self.file_name, error = %e, "Failed to refresh fingerprint"),
        }
    }

    fn delete_if_unchanged(&mut self) {
        let size = match self.file.as_ref().map(File::metadata) {
            Some(Ok(metadata)) => metadata.len(),
            Some(Err(e)) => {
                warn!(path = ?self.file_name, error = %e, "Failed to stat file before delete");
                return;
            }
            None => return,
        };

        if size > self.offset {
            debug!(path = ?self.file_name, size, offset = self.offset, "File grew while reading, not deleting");
            return;
        }

        self.delete();
    }
}

fn emit_record(
    settings: &ReaderSettings,
    file_name: &Path,
    file_attributes: &mut Attributes,
    record_num: &mut u64,
    raw: &[u8],
    location: RecordOffset,
) {
    let body = match settings.encoding.decode(raw) {
        Ok(body) => body,
        Err(e) => {
            warn!(path = ?file_name, offset = location.offset, error = %e, "Failed to decode record, skipping");
            return;
        }
    };

    if body.is_empty() {
        return;
    }

    *record_num += 1;
    if settings.include_file_record_number {
        file_attributes.insert(LOG_FILE_RECORD_NUMBER.to_string(), (*record_num).into());
    }

    let mut attributes = file_attributes.clone();
    if settings.include_file_record_offset {
        attributes.insert(LOG_FILE_RECORD_OFFSET.to_string(), location.offset.into());
    }

    let token = Token {
        body,
        attributes,
        offset: location,
    };
    if let Err(e) = settings.emitter.emit(token) {
        error!(path = ?file_name, error = %e, "Failed to emit record");
    }
}
