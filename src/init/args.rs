// SPDX-License-Identifier: Apache-2.0

use clap::{Args, ValueEnum};
use std::path::PathBuf;

use crate::attrs::Resolver;
use crate::config::{Compression, FileConsumerConfig, StartAt};
use crate::decode::Encoding;
use crate::header::HeaderConfig;
use crate::split::TrimMode;

/// Where to start reading files
#[derive(Copy, Clone, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum StartAtArg {
    /// Start at the beginning of the file
    Beginning,
    /// Start at the end of the file (tail mode)
    #[default]
    End,
}

impl From<StartAtArg> for StartAt {
    fn from(s: StartAtArg) -> Self {
        match s {
            StartAtArg::Beginning => StartAt::Beginning,
            StartAtArg::End => StartAt::End,
        }
    }
}

/// Character encoding of the files
#[derive(Copy, Clone, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum EncodingArg {
    /// Pass bytes through untouched
    Nop,
    /// UTF-8, invalid sequences replaced
    #[default]
    #[value(name = "utf-8", alias = "utf8")]
    Utf8,
    /// UTF-8, records with invalid sequences dropped
    #[value(name = "utf-8-strict")]
    Utf8Strict,
    Ascii,
}

impl From<EncodingArg> for Encoding {
    fn from(e: EncodingArg) -> Self {
        match e {
            EncodingArg::Nop => Encoding::Nop,
            EncodingArg::Utf8 => Encoding::Utf8,
            EncodingArg::Utf8Strict => Encoding::Utf8Strict,
            EncodingArg::Ascii => Encoding::Ascii,
        }
    }
}

/// Whitespace trimming applied to every record
#[derive(Copy, Clone, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum TrimArg {
    Nop,
    Leading,
    Trailing,
    #[default]
    Whitespace,
}

impl From<TrimArg> for TrimMode {
    fn from(t: TrimArg) -> Self {
        match t {
            TrimArg::Nop => TrimMode::Nop,
            TrimArg::Leading => TrimMode::Leading,
            TrimArg::Trailing => TrimMode::Trailing,
            TrimArg::Whitespace => TrimMode::Whitespace,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum CompressionArg {
    #[default]
    None,
    Gzip,
    /// Gzip for `.gz` files only
    Auto,
}

impl From<CompressionArg> for Compression {
    fn from(c: CompressionArg) -> Self {
        match c {
            CompressionArg::None => Compression::None,
            CompressionArg::Gzip => Compression::Gzip,
            CompressionArg::Auto => Compression::Auto,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct FileConsumerArgs {
    /// Comma-separated glob patterns for files to include (e.g., "/var/log/*.log,/tmp/*.log")
    #[arg(long, env = "FILECONSUMER_INCLUDE", value_delimiter = ',')]
    pub include: Vec<String>,

    /// Comma-separated glob patterns for files to exclude
    #[arg(long, env = "FILECONSUMER_EXCLUDE", value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Where to start reading files seen for the first time
    #[arg(value_enum, long, env = "FILECONSUMER_START_AT", default_value = "end")]
    pub start_at: StartAtArg,

    /// Poll interval in milliseconds
    #[arg(long, env = "FILECONSUMER_POLL_INTERVAL_MS", default_value = "200")]
    pub poll_interval_ms: u64,

    /// Number of leading bytes used to identify a file
    #[arg(long, env = "FILECONSUMER_FINGERPRINT_SIZE", default_value = "1000")]
    pub fingerprint_size: usize,

    /// Maximum record size in bytes, longer records are split
    #[arg(long, env = "FILECONSUMER_MAX_LOG_SIZE", default_value = "1048576")]
    pub max_log_size: usize,

    /// Maximum number of files read concurrently
    #[arg(long, env = "FILECONSUMER_MAX_CONCURRENT_FILES", default_value = "1024")]
    pub max_concurrent_files: usize,

    /// Maximum number of batches per poll, 0 for no limit
    #[arg(long, env = "FILECONSUMER_MAX_BATCHES", default_value = "0")]
    pub max_batches: usize,

    /// Milliseconds after which an unterminated trailing record is emitted anyway
    #[arg(long, env = "FILECONSUMER_FORCE_FLUSH_PERIOD_MS", default_value = "500")]
    pub force_flush_period_ms: u64,

    #[arg(value_enum, long, env = "FILECONSUMER_ENCODING", default_value = "utf-8")]
    pub encoding: EncodingArg,

    #[arg(value_enum, long, env = "FILECONSUMER_TRIM", default_value = "whitespace")]
    pub trim: TrimArg,

    /// Include file name as a record attribute
    #[arg(long, env = "FILECONSUMER_INCLUDE_FILE_NAME", default_value = "true")]
    pub include_file_name: bool,

    /// Include full file path as a record attribute
    #[arg(long, env = "FILECONSUMER_INCLUDE_FILE_PATH")]
    pub include_file_path: bool,

    /// Include the symlink-resolved file name as a record attribute
    #[arg(long, env = "FILECONSUMER_INCLUDE_FILE_NAME_RESOLVED")]
    pub include_file_name_resolved: bool,

    /// Include the symlink-resolved file path as a record attribute
    #[arg(long, env = "FILECONSUMER_INCLUDE_FILE_PATH_RESOLVED")]
    pub include_file_path_resolved: bool,

    /// Include the 1-based record number as a record attribute
    #[arg(long, env = "FILECONSUMER_INCLUDE_FILE_RECORD_NUMBER")]
    pub include_file_record_number: bool,

    /// Include the record's byte offset as a record attribute
    #[arg(long, env = "FILECONSUMER_INCLUDE_FILE_RECORD_OFFSET")]
    pub include_file_record_offset: bool,

    /// Regex matching header lines at the start of each file
    #[arg(long, env = "FILECONSUMER_HEADER_PATTERN")]
    pub header_pattern: Option<String>,

    /// Regex with named groups extracting attributes from header lines
    #[arg(long, env = "FILECONSUMER_HEADER_METADATA_PATTERN")]
    pub header_metadata_pattern: Option<String>,

    /// Delete files once they have been read to the end
    #[arg(long, env = "FILECONSUMER_DELETE_AT_EOF")]
    pub delete_at_eof: bool,

    #[arg(value_enum, long, env = "FILECONSUMER_COMPRESSION", default_value = "none")]
    pub compression: CompressionArg,

    /// Hold an exclusive advisory lock on each file while reading it
    #[arg(long, env = "FILECONSUMER_ACQUIRE_FS_LOCK")]
    pub acquire_fs_lock: bool,

    /// Path to store file offsets for persistence across restarts
    #[arg(long, env = "FILECONSUMER_OFFSETS_PATH")]
    pub offsets_path: Option<PathBuf>,
}

impl Default for FileConsumerArgs {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            start_at: StartAtArg::End,
            poll_interval_ms: 200,
            fingerprint_size: 1000,
            max_log_size: 1024 * 1024,
            max_concurrent_files: 1024,
            max_batches: 0,
            force_flush_period_ms: 500,
            encoding: EncodingArg::Utf8,
            trim: TrimArg::Whitespace,
            include_file_name: true,
            include_file_path: false,
            include_file_name_resolved: false,
            include_file_path_resolved: false,
            include_file_record_number: false,
            include_file_record_offset: false,
            header_pattern: None,
            header_metadata_pattern: None,
            delete_at_eof: false,
            compression: CompressionArg::None,
            acquire_fs_lock: false,
            offsets_path: None,
        }
    }
}

impl FileConsumerArgs {
    /// Build the consumer config from command line args
    pub fn build_config(&self) -> Result<FileConsumerConfig, String> {
        let header = match (&self.header_pattern, &self.header_metadata_pattern) {
            (Some(pattern), Some(metadata_pattern)) => Some(HeaderConfig {
                pattern: pattern.clone(),
                metadata_pattern: metadata_pattern.clone(),
            }),
            (None, None) => None,
            _ => {
                return Err(
                    "header_pattern and header_metadata_pattern must be set together".to_string(),
                );
            }
        };

        Ok(FileConsumerConfig {
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            poll_interval_ms: self.poll_interval_ms,
            start_at: self.start_at.into(),
            fingerprint_size: self.fingerprint_size,
            max_log_size: self.max_log_size,
            max_concurrent_files: self.max_concurrent_files,
            max_batches: self.max_batches,
            force_flush_period_ms: self.force_flush_period_ms,
            encoding: self.encoding.into(),
            trim: self.trim.into(),
            attributes: Resolver {
                include_file_name: self.include_file_name,
                include_file_path: self.include_file_path,
                include_file_name_resolved: self.include_file_name_resolved,
                include_file_path_resolved: self.include_file_path_resolved,
            },
            include_file_record_number: self.include_file_record_number,
            include_file_record_offset: self.include_file_record_offset,
            header,
            delete_at_eof: self.delete_at_eof,
            compression: self.compression.into(),
            acquire_fs_lock: self.acquire_fs_lock,
            offsets_path: self.offsets_path.clone(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        args: FileConsumerArgs,
    }

    #[test]
    fn test_defaults_match_config_defaults() {
        let cli = TestCli::try_parse_from(["test", "--include", "/var/log/*.log"]).unwrap();
        let config = cli.args.build_config().unwrap();
        let defaults = FileConsumerConfig::default();

        assert_eq!(config.include, vec!["/var/log/*.log"]);
        assert_eq!(config.poll_interval_ms, defaults.poll_interval_ms);
        assert_eq!(config.fingerprint_size, defaults.fingerprint_size);
        assert_eq!(config.max_log_size, defaults.max_log_size);
        assert_eq!(config.max_concurrent_files, defaults.max_concurrent_files);
        assert_eq!(config.start_at, StartAt::End);
        assert_eq!(config.encoding, Encoding::Utf8);
        assert!(config.attributes.include_file_name);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_options() {
        let cli = TestCli::try_parse_from([
            "test",
            "--include",
            "/a/*.log,/b/*.log",
            "--start-at",
            "beginning",
            "--encoding",
            "utf-8-strict",
            "--compression",
            "auto",
            "--delete-at-eof",
            "--offsets-path",
            "/tmp/offsets.json",
        ])
        .unwrap();
        let config = cli.args.build_config().unwrap();

        assert_eq!(config.include, vec!["/a/*.log", "/b/*.log"]);
        assert_eq!(config.start_at, StartAt::Beginning);
        assert_eq!(config.encoding, Encoding::Utf8Strict);
        assert_eq!(config.compression, Compression::Auto);
        assert!(config.delete_at_eof);
        assert_eq!(config.offsets_path, Some(PathBuf::from("/tmp/offsets.json")));
    }

    #[test]
    fn test_header_patterns_must_pair() {
        let args = FileConsumerArgs {
            header_pattern: Some("^#".to_string()),
            ..Default::default()
        };
        assert!(args.build_config().is_err());

        let args = FileConsumerArgs {
            header_pattern: Some("^#".to_string()),
            header_metadata_pattern: Some("^# (?P<key>\\w+)".to_string()),
            ..Default::default()
        };
        assert!(args.build_config().unwrap().header.is_some());
    }
}
