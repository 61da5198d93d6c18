// SPDX-License-Identifier: Apache-2.0

use serde::Deserialize;
use std::ops::Range;

use super::{Split, SplitFunc, SplitResult};

const WHITESPACE: &[u8] = b"\r\n\t ";

/// Emits the first `max_length` bytes as a token when the buffer holds more
/// than that without a boundary.
pub struct ToLength<S> {
    inner: S,
    max_length: usize,
}

impl<S> ToLength<S> {
    pub fn new(inner: S, max_length: usize) -> Self {
        Self { inner, max_length }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: SplitFunc> SplitFunc for ToLength<S> {
    fn split(&mut self, data: &[u8], at_eof: bool) -> SplitResult {
        if self.max_length > 0 && data.len() > self.max_length {
            return Ok(Split::token(self.max_length, 0..self.max_length));
        }
        self.inner.split(data, at_eof)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrimMode {
    /// Leave tokens untouched
    Nop,
    Leading,
    Trailing,
    #[default]
    Whitespace,
}

impl TrimMode {
    pub fn apply(&self, data: &[u8], token: Range<usize>) -> Range<usize> {
        let bytes = &data[token.clone()];
        let mut start = 0;
        let mut end = bytes.len();

        if matches!(self, TrimMode::Leading | TrimMode::Whitespace) {
            while start < end && WHITESPACE.contains(&bytes[start]) {
                start += 1;
            }
        }
        if matches!(self, TrimMode::Trailing | TrimMode::Whitespace) {
            while end > start && WHITESPACE.contains(&bytes[end - 1]) {
                end -= 1;
            }
        }

        token.start + start..token.start + end
    }
}

/// Applies a [`TrimMode`] to every token the inner split produces.
pub struct Trim<S> {
    inner: S,
    mode: TrimMode,
}

impl<S> Trim<S> {
    pub fn new(inner: S, mode: TrimMode) -> Self {
        Self { inner, mode }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: SplitFunc> SplitFunc for Trim<S> {
    fn split(&mut self, data: &[u8], at_eof: bool) -> SplitResult {
        let mut result = self.inner.split(data, at_eof)?;
        if let Some(token) = result.token.take() {
            result.token = Some(self.mode.apply(data, token));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::NewlineSplit;

    #[test]
    fn test_to_length_caps() {
        let mut split = ToLength::new(NewlineSplit::default(), 3);
        assert_eq!(split.split(b"abcdef", false).unwrap(), Split::token(3, 0..3));
        assert_eq!(split.split(b"ab\n", false).unwrap(), Split::token(3, 0..2));
        assert_eq!(split.split(b"abc", false).unwrap(), Split::need_more());
    }

    #[test]
    fn test_trim_modes() {
        let data = b" \t value \r";
        let all = 0..data.len();

        assert_eq!(&data[TrimMode::Nop.apply(data, all.clone())], data);
        assert_eq!(&data[TrimMode::Leading.apply(data, all.clone())], b"value \r");
        assert_eq!(&data[TrimMode::Trailing.apply(data, all.clone())], b" \t value");
        assert_eq!(&data[TrimMode::Whitespace.apply(data, all)], b"value");
    }

    #[test]
    fn test_trim_all_whitespace_is_empty() {
        let data = b"xx   ";
        let range = TrimMode::Whitespace.apply(data, 2..5);
        assert!(range.is_empty());
    }

    #[test]
    fn test_trim_wraps_split() {
        let mut split = Trim::new(NewlineSplit::default(), TrimMode::Whitespace);
        let data = b"  hi \nnext";
        let result = split.split(data, false).unwrap();
        assert_eq!(result.advance, 6);
        assert_eq!(&data[result.token.unwrap()], b"hi");
    }
}
