// SPDX-License-Identifier: Apache-2.0

//! File-level attributes attached to every record read from a file.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::Result;

pub const LOG_FILE_NAME: &str = "log.file.name";
pub const LOG_FILE_PATH: &str = "log.file.path";
pub const LOG_FILE_NAME_RESOLVED: &str = "log.file.name_resolved";
pub const LOG_FILE_PATH_RESOLVED: &str = "log.file.path_resolved";
pub const LOG_FILE_RECORD_NUMBER: &str = "log.file.record_number";
pub const LOG_FILE_RECORD_OFFSET: &str = "log.file.record_offset";

pub type Attributes = HashMap<String, serde_json::Value>;

/// Computes the attributes for a file path.
pub trait AttributeResolver: Send + Sync {
    fn resolve(&self, path: &Path) -> Result<Attributes>;
}

/// Resolves name and path attributes, optionally following symlinks.
#[derive(Debug, Clone, Deserialize)]
pub struct Resolver {
    #[serde(default = "default_true")]
    pub include_file_name: bool,

    #[serde(default)]
    pub include_file_path: bool,

    #[serde(default)]
    pub include_file_name_resolved: bool,

    #[serde(default)]
    pub include_file_path_resolved: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Resolver {
    fn default() -> Self {
        Self {
            include_file_name: true,
            include_file_path: false,
            include_file_name_resolved: false,
            include_file_path_resolved: false,
        }
    }
}

impl AttributeResolver for Resolver {
    fn resolve(&self, path: &Path) -> Result<Attributes> {
        let mut attributes = Attributes::new();

        if self.include_file_name {
            attributes.insert(LOG_FILE_NAME.to_string(), file_name(path).into());
        }
        if self.include_file_path {
            attributes.insert(
                LOG_FILE_PATH.to_string(),
                path.to_string_lossy().into_owned().into(),
            );
        }

        if !self.include_file_name_resolved && !self.include_file_path_resolved {
            return Ok(attributes);
        }

        let resolved = fs::canonicalize(path)?;
        if self.include_file_name_resolved {
            attributes.insert(
                LOG_FILE_NAME_RESOLVED.to_string(),
                file_name(&resolved).into(),
            );
        }
        if self.include_file_path_resolved {
            attributes.insert(
                LOG_FILE_PATH_RESOLVED.to_string(),
                resolved.to_string_lossy().into_owned().into(),
            );
        }

        Ok(attributes)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_resolver_only_names() {
        let attrs = Resolver::default()
            .resolve(Path::new("/var/log/app.log"))
            .unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[LOG_FILE_NAME], "app.log");
    }

    #[test]
    fn test_resolver_path() {
        let resolver = Resolver {
            include_file_name: false,
            include_file_path: true,
            ..Default::default()
        };
        let attrs = resolver.resolve(Path::new("/var/log/app.log")).unwrap();
        assert_eq!(attrs[LOG_FILE_PATH], "/var/log/app.log");
        assert!(!attrs.contains_key(LOG_FILE_NAME));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolver_follows_symlinks() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("target.log");
        let link = dir.path().join("link.log");
        fs::write(&target, "x\n").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let resolver = Resolver {
            include_file_name_resolved: true,
            include_file_path_resolved: true,
            ..Default::default()
        };
        let attrs = resolver.resolve(&link).unwrap();
        assert_eq!(attrs[LOG_FILE_NAME], "link.log");
        assert_eq!(attrs[LOG_FILE_NAME_RESOLVED], "target.log");
        let canonical = fs::canonicalize(&target).unwrap();
        assert_eq!(
            attrs[LOG_FILE_PATH_RESOLVED],
            canonical.to_string_lossy().into_owned()
        );
    }

    #[test]
    fn test_resolver_missing_file_fails_when_resolving() {
        let resolver = Resolver {
            include_file_path_resolved: true,
            ..Default::default()
        };
        assert!(resolver.resolve(Path::new("/does/not/exist.log")).is_err());
    }
}
