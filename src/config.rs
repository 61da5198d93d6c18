// SPDX-License-Identifier: Apache-2.0

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::attrs::Resolver;
use crate::decode::Encoding;
use crate::header::HeaderConfig;
use crate::split::TrimMode;

/// Where to start reading from when a file is first discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartAt {
    /// Start reading from the beginning of the file
    Beginning,
    /// Start reading from the end of the file (only new content)
    #[default]
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    /// Gzip for files with a `.gz` extension, plain otherwise
    Auto,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileConsumerConfig {
    /// Glob patterns for files to include
    pub include: Vec<String>,

    /// Glob patterns for files to exclude
    #[serde(default)]
    pub exclude: Vec<String>,

    /// How often to poll for file changes (in milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Where to start reading files seen for the first time
    #[serde(default)]
    pub start_at: StartAt,

    /// Size of fingerprint to use for file identification (in bytes)
    #[serde(default = "default_fingerprint_size")]
    pub fingerprint_size: usize,

    /// Maximum size of a single log entry (in bytes)
    #[serde(default = "default_max_log_size")]
    pub max_log_size: usize,

    /// Initial size of a read buffer (in bytes)
    #[serde(default = "default_initial_buffer_size")]
    pub initial_buffer_size: usize,

    /// Maximum number of files to read concurrently; each poll consumes
    /// files in batches of half this size
    #[serde(default = "default_max_concurrent_files")]
    pub max_concurrent_files: usize,

    /// Stop a poll after this many batches, 0 for no limit
    #[serde(default)]
    pub max_batches: usize,

    /// Emit an unterminated trailing record after it has not grown for this
    /// long (in milliseconds), 0 to never flush
    #[serde(default = "default_force_flush_period_ms")]
    pub force_flush_period_ms: u64,

    #[serde(default)]
    pub encoding: Encoding,

    #[serde(default)]
    pub trim: TrimMode,

    #[serde(flatten)]
    pub attributes: Resolver,

    /// Add a 1-based `log.file.record_number` attribute to every record
    #[serde(default)]
    pub include_file_record_number: bool,

    /// Add a `log.file.record_offset` attribute to every record
    #[serde(default)]
    pub include_file_record_offset: bool,

    #[serde(default)]
    pub header: Option<HeaderConfig>,

    /// Delete files once they have been read to the end
    #[serde(default)]
    pub delete_at_eof: bool,

    #[serde(default)]
    pub compression: Compression,

    /// Hold an exclusive advisory lock on the file while reading
    #[serde(default)]
    pub acquire_fs_lock: bool,

    /// Where to checkpoint file offsets, in-memory only when unset
    #[serde(default)]
    pub offsets_path: Option<PathBuf>,
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_fingerprint_size() -> usize {
    1000
}

fn default_max_log_size() -> usize {
    1024 * 1024 // 1MB
}

fn default_initial_buffer_size() -> usize {
    16 * 1024
}

fn default_max_concurrent_files() -> usize {
    1024
}

fn default_force_flush_period_ms() -> u64 {
    500
}

impl Default for FileConsumerConfig {
    fn default() -> Self {
        Self {
            include: vec![],
            exclude: vec![],
            poll_interval_ms: default_poll_interval_ms(),
            start_at: StartAt::default(),
            fingerprint_size: default_fingerprint_size(),
            max_log_size: default_max_log_size(),
            initial_buffer_size: default_initial_buffer_size(),
            max_concurrent_files: default_max_concurrent_files(),
            max_batches: 0,
            force_flush_period_ms: default_force_flush_period_ms(),
            encoding: Encoding::default(),
            trim: TrimMode::default(),
            attributes: Resolver::default(),
            include_file_record_number: false,
            include_file_record_offset: false,
            header: None,
            delete_at_eof: false,
            compression: Compression::default(),
            acquire_fs_lock: false,
            offsets_path: None,
        }
    }
}

impl FileConsumerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn force_flush_period(&self) -> Duration {
        Duration::from_millis(self.force_flush_period_ms)
    }

    /// Files consumed per batch within one poll
    pub fn max_batch_files(&self) -> usize {
        self.max_concurrent_files / 2
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.include.is_empty() {
            return Err("include patterns cannot be empty".to_string());
        }

        if self.fingerprint_size < 16 {
            return Err("fingerprint_size must be at least 16 bytes".to_string());
        }

        if self.max_log_size == 0 {
            return Err("max_log_size must be positive".to_string());
        }

        if self.max_concurrent_files < 2 {
            return Err("max_concurrent_files must be at least 2".to_string());
        }

        if self.header.is_some() && self.start_at == StartAt::End {
            return Err("header requires start_at = beginning".to_string());
        }

        if self.delete_at_eof && self.start_at == StartAt::End {
            return Err("delete_at_eof requires start_at = beginning".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> FileConsumerConfig {
        FileConsumerConfig {
            include: vec!["/var/log/*.log".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = FileConsumerConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(200));
        assert_eq!(config.fingerprint_size, 1000);
        assert_eq!(config.max_log_size, 1024 * 1024);
        assert_eq!(config.initial_buffer_size, 16 * 1024);
        assert_eq!(config.force_flush_period(), Duration::from_millis(500));
        assert_eq!(config.max_batch_files(), 512);
        assert_eq!(config.start_at, StartAt::End);
        assert_eq!(config.encoding, Encoding::Utf8);
        assert_eq!(config.compression, Compression::None);
    }

    #[test]
    fn test_config_validation() {
        assert!(valid().validate().is_ok());

        let mut config = valid();
        config.include = vec![];
        assert!(config.validate().is_err());

        let mut config = valid();
        config.fingerprint_size = 8;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.max_log_size = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.max_concurrent_files = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_header_and_delete_require_beginning() {
        let mut config = valid();
        config.header = Some(HeaderConfig {
            pattern: "^#".to_string(),
            metadata_pattern: "^#(?P<k>.*)".to_string(),
        });
        assert!(config.validate().is_err());
        config.start_at = StartAt::Beginning;
        assert!(config.validate().is_ok());

        let mut config = valid();
        config.delete_at_eof = true;
        assert!(config.validate().is_err());
        config.start_at = StartAt::Beginning;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_json() {
        let config: FileConsumerConfig = serde_json::from_str(
            r#"{
                "include": ["/tmp/*.log"],
                "start_at": "beginning",
                "encoding": "nop",
                "compression": "auto",
                "include_file_path": true,
                "trim": "trailing"
            }"#,
        )
        .unwrap();

        assert_eq!(config.start_at, StartAt::Beginning);
        assert_eq!(config.encoding, Encoding::Nop);
        assert_eq!(config.compression, Compression::Auto);
        assert_eq!(config.trim, TrimMode::Trailing);
        assert!(config.attributes.include_file_name);
        assert!(config.attributes.include_file_path);
        assert_eq!(config.fingerprint_size, 1000);
    }
}
