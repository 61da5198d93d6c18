// SPDX-License-Identifier: Apache-2.0

use glob::{Pattern, glob};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{Error, Result};

/// FileFinder finds files matching include patterns while excluding others
#[derive(Debug, Clone)]
pub struct FileFinder {
    include: Vec<String>,
    exclude: Vec<Pattern>,
}

impl FileFinder {
    /// Create a new FileFinder. Invalid patterns are rejected here rather
    /// than on every poll.
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Result<Self> {
        for pattern in &include {
            Pattern::new(pattern)
                .map_err(|e| Error::InvalidGlob(format!("{}: {}", pattern, e)))?;
        }

        let exclude = exclude
            .iter()
            .map(|p| Pattern::new(p).map_err(|e| Error::InvalidGlob(format!("{}: {}", p, e))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { include, exclude })
    }

    /// Regular files matching any include pattern and no exclude pattern,
    /// deduplicated and in sorted order so every poll sees a stable sequence.
    pub fn find_files(&self) -> Result<Vec<PathBuf>> {
        let mut paths = BTreeSet::new();

        for pattern in &self.include {
            let matches = glob(pattern).map_err(|e| Error::InvalidGlob(e.to_string()))?;

            for entry in matches {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        // Unreadable directories along the way are not fatal
                        debug!(path = ?e.path(), error = %e.error(), "Skipping unreadable glob entry");
                        continue;
                    }
                };

                if !path.is_file() {
                    continue;
                }

                if self.exclude.iter().any(|p| p.matches_path(&path)) {
                    continue;
                }

                paths.insert(path);
            }
        }

        Ok(paths.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_test_files(dir: &TempDir) {
        for name in ["test1.log", "test2.log", "other.txt", "ignored.log"] {
            fs::write(dir.path().join(name), format!("content of {}", name)).unwrap();
        }
        fs::create_dir(dir.path().join("nested.log")).unwrap();
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_finder_sorted_files_only() {
        let dir = TempDir::new().unwrap();
        setup_test_files(&dir);

        let pattern = format!("{}/*.log", dir.path().display());
        let finder = FileFinder::new(vec![pattern], vec![]).unwrap();

        let files = finder.find_files().unwrap();
        assert_eq!(names(&files), vec!["ignored.log", "test1.log", "test2.log"]);
    }

    #[test]
    fn test_finder_with_exclude() {
        let dir = TempDir::new().unwrap();
        setup_test_files(&dir);

        let include = format!("{}/*.log", dir.path().display());
        let exclude = format!("{}/ignored.*", dir.path().display());
        let finder = FileFinder::new(vec![include], vec![exclude]).unwrap();

        let files = finder.find_files().unwrap();
        assert_eq!(names(&files), vec!["test1.log", "test2.log"]);
    }

    #[test]
    fn test_finder_no_duplicates_across_patterns() {
        let dir = TempDir::new().unwrap();
        setup_test_files(&dir);

        let logs = format!("{}/*.log", dir.path().display());
        let tests = format!("{}/test*", dir.path().display());
        let finder = FileFinder::new(vec![tests, logs], vec![]).unwrap();

        let files = finder.find_files().unwrap();
        assert_eq!(names(&files), vec!["ignored.log", "test1.log", "test2.log"]);
    }

    #[test]
    fn test_finder_invalid_patterns() {
        assert!(matches!(
            FileFinder::new(vec!["/var/log/[".to_string()], vec![]),
            Err(Error::InvalidGlob(_))
        ));
        assert!(matches!(
            FileFinder::new(vec!["/var/log/*.log".to_string()], vec!["[".to_string()]),
            Err(Error::InvalidGlob(_))
        ));
    }

    #[test]
    fn test_finder_discovers_new_files() {
        let dir = TempDir::new().unwrap();
        let pattern = format!("{}/*.log", dir.path().display());
        let finder = FileFinder::new(vec![pattern], vec![]).unwrap();

        assert!(finder.find_files().unwrap().is_empty());

        fs::write(dir.path().join("first.log"), "first log entry").unwrap();
        let files = finder.find_files().unwrap();
        assert_eq!(names(&files), vec!["first.log"]);
    }
}
