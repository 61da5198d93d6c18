// SPDX-License-Identifier: Apache-2.0

//! Leading header lines whose content becomes file attributes.
//!
//! While a file's header is open, each line is checked against the header
//! pattern. A matching line is parsed with the metadata pattern and its named
//! captures are merged into the file attributes. The first line that does not
//! match ends the header and is read again as regular content.

use regex::Regex;
use serde::Deserialize;

use crate::attrs::Attributes;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct HeaderConfig {
    /// Lines matching this pattern belong to the header
    pub pattern: String,
    /// Named capture groups of this pattern become file attributes
    pub metadata_pattern: String,
}

/// What the header reader did with a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLine {
    Consumed,
    End,
}

pub struct HeaderReader {
    pattern: Regex,
    metadata: Regex,
    group_names: Vec<String>,
}

impl HeaderReader {
    pub fn new(config: &HeaderConfig) -> Result<Self> {
        let pattern = Regex::new(&config.pattern)
            .map_err(|e| Error::Regex(format!("invalid header pattern: {}", e)))?;
        let metadata = Regex::new(&config.metadata_pattern)
            .map_err(|e| Error::Regex(format!("invalid header metadata pattern: {}", e)))?;

        let group_names: Vec<String> = metadata
            .capture_names()
            .skip(1)
            .filter_map(|name| name.map(|s| s.to_string()))
            .collect();

        if group_names.is_empty() {
            return Err(Error::Header(
                "metadata pattern must contain at least one named capture group (use (?P<name>...) syntax)".to_string(),
            ));
        }

        Ok(Self {
            pattern,
            metadata,
            group_names,
        })
    }

    /// Process one header line.
    ///
    /// Returns `HeaderLine::End` without touching `attributes` if the line is
    /// not part of the header. A header line the metadata pattern can't parse
    /// is still consumed, the error is returned for logging.
    pub fn process(&self, line: &str, attributes: &mut Attributes) -> Result<HeaderLine> {
        if !self.pattern.is_match(line) {
            return Ok(HeaderLine::End);
        }

        let Some(caps) = self.metadata.captures(line) else {
            return Err(Error::Header(format!(
                "header line did not match metadata pattern: {}",
                line
            )));
        };

        for name in &self.group_names {
            if let Some(m) = caps.name(name) {
                attributes.insert(name.clone(), m.as_str().into());
            }
        }

        Ok(HeaderLine::Consumed)
    }
}
