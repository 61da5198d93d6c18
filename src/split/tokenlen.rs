// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use super::{SplitFunc, SplitResult};

/// How many bytes the last unfinished token had already accumulated.
///
/// Persisted with the file metadata so the next read burst starts with a
/// buffer large enough to hold the pending token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLenState {
    pub minimum_length: usize,
}

pub struct TokenLen<S> {
    inner: S,
    state: TokenLenState,
}

impl<S> TokenLen<S> {
    pub fn new(inner: S, state: TokenLenState) -> Self {
        Self { inner, state }
    }

    pub fn state(&self) -> TokenLenState {
        self.state
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: SplitFunc> SplitFunc for TokenLen<S> {
    fn split(&mut self, data: &[u8], at_eof: bool) -> SplitResult {
        let result = self.inner.split(data, at_eof)?;

        if data.is_empty() {
            return Ok(result);
        }

        if result.advance == 0 && result.token.is_none() {
            self.state.minimum_length = data.len();
        } else {
            self.state.minimum_length = 0;
        }

        Ok(result)
    }
}
