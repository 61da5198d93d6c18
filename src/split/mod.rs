// SPDX-License-Identifier: Apache-2.0

//! Tokenization of raw file bytes into records.
//!
//! A base [`SplitFunc`] finds token boundaries. The content pipeline wraps it
//! in decorator stages, innermost first: [`TokenLen`] remembers how much data
//! an unfinished token needed, [`Flush`] forces out a partial token that has
//! stopped growing, [`ToLength`] caps tokens at the maximum record size and
//! [`Trim`] strips the emitted bytes.

mod flush;
mod newline;
mod tokenlen;
mod trim;

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

pub use flush::{Flush, FlushState};
pub use newline::NewlineSplit;
pub use tokenlen::{TokenLen, TokenLenState};
pub use trim::{ToLength, Trim, TrimMode};

/// Outcome of one split call over the buffered bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    /// Bytes consumed from the front of the buffer.
    pub advance: usize,
    /// Token location within the buffer.
    pub token: Option<Range<usize>>,
}

impl Split {
    /// No token yet, more data is needed.
    pub fn need_more() -> Self {
        Self::default()
    }

    pub fn token(advance: usize, token: Range<usize>) -> Self {
        Self {
            advance,
            token: Some(token),
        }
    }

    /// Consume bytes without producing a token.
    pub fn skip(advance: usize) -> Self {
        Self {
            advance,
            token: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SplitError(pub String);

pub type SplitResult = Result<Split, SplitError>;

/// Finds the next token boundary in `data`.
///
/// `at_eof` is set once the source has no more bytes to offer, so the
/// remaining data is all there is.
pub trait SplitFunc {
    fn split(&mut self, data: &[u8], at_eof: bool) -> SplitResult;
}

pub type BoxSplitFunc = Box<dyn SplitFunc + Send>;

/// Produces a fresh base split function for each reader.
pub type SplitFuncFactory = Arc<dyn Fn() -> BoxSplitFunc + Send + Sync>;

impl SplitFunc for BoxSplitFunc {
    fn split(&mut self, data: &[u8], at_eof: bool) -> SplitResult {
        (**self).split(data, at_eof)
    }
}

/// Adapts a closure into a [`SplitFunc`].
pub struct FnSplit<F>(F);

pub fn from_fn<F>(f: F) -> FnSplit<F>
where
    F: FnMut(&[u8], bool) -> SplitResult,
{
    FnSplit(f)
}

impl<F> SplitFunc for FnSplit<F>
where
    F: FnMut(&[u8], bool) -> SplitResult,
{
    fn split(&mut self, data: &[u8], at_eof: bool) -> SplitResult {
        (self.0)(data, at_eof)
    }
}

/// The default base split, one record per line.
pub fn newline_factory() -> SplitFuncFactory {
    Arc::new(|| Box::new(NewlineSplit::default()) as BoxSplitFunc)
}

/// The composed per-reader content pipeline.
pub struct ContentSplit {
    stages: Trim<ToLength<Flush<TokenLen<BoxSplitFunc>>>>,
}

impl ContentSplit {
    pub fn new(
        base: BoxSplitFunc,
        token_len: TokenLenState,
        flush: FlushState,
        flush_period: Duration,
        max_length: usize,
        trim: TrimMode,
    ) -> Self {
        let token_len = TokenLen::new(base, token_len);
        let flush = Flush::new(token_len, flush, flush_period);
        let to_length = ToLength::new(flush, max_length);
        Self {
            stages: Trim::new(to_length, trim),
        }
    }

    pub fn token_len_state(&self) -> TokenLenState {
        self.stages.inner().inner().inner().state()
    }

    pub fn flush_state(&self) -> FlushState {
        self.stages.inner().inner().state()
    }
}

impl SplitFunc for ContentSplit {
    fn split(&mut self, data: &[u8], at_eof: bool) -> SplitResult {
        self.stages.split(data, at_eof)
    }
}
