// SPDX-License-Identifier: Apache-2.0

use std::io::{self, Read};

use crate::bufpool::PooledBuffer;
use crate::error::{Error, Result};
use crate::split::{Split, SplitFunc};

const MIN_BUFFER_SIZE: usize = 256;
const MAX_EMPTY_TOKENS: usize = 100;

/// A token and the source span consumed to produce it.
pub(crate) struct Scanned<'a> {
    pub(crate) bytes: &'a [u8],
    pub(crate) begin: u64,
    pub(crate) end: u64,
}

/// Pulls tokens out of a byte source with a [`SplitFunc`], tracking the
/// position of the last consumed byte.
pub(crate) struct Scanner<R> {
    source: R,
    buf: PooledBuffer,
    start: usize,
    end: usize,
    max_size: usize,
    pos: u64,
    eof: bool,
    empties: usize,
}

impl<R: Read> Scanner<R> {
    /// `pos` is the source position of the first byte `source` will yield.
    pub(crate) fn new(source: R, mut buf: PooledBuffer, max_size: usize, pos: u64) -> Self {
        if buf.is_empty() {
            buf.resize(MIN_BUFFER_SIZE.min(max_size.max(1)), 0);
        }
        Self {
            source,
            buf,
            start: 0,
            end: 0,
            max_size,
            pos,
            eof: false,
            empties: 0,
        }
    }

    /// Position just past the last consumed byte.
    pub(crate) fn pos(&self) -> u64 {
        self.pos
    }

    /// Next token, or `None` once the source is exhausted and the split
    /// function wants more data than there is.
    pub(crate) fn scan<S: SplitFunc + ?Sized>(
        &mut self,
        split: &mut S,
    ) -> Result<Option<Scanned<'_>>> {
        loop {
            if self.end > self.start || self.eof {
                let data = &self.buf[self.start..self.end];
                let len = data.len();
                let Split { advance, token } = split
                    .split(data, self.eof)
                    .map_err(|e| Error::Split(e.0))?;

                if advance > len {
                    return Err(Error::Split(format!(
                        "split advanced {} bytes with only {} buffered",
                        advance, len
                    )));
                }

                if let Some(token) = token {
                    if token.start > token.end || token.end > len {
                        return Err(Error::Split(format!(
                            "token {:?} outside of {} buffered bytes",
                            token, len
                        )));
                    }

                    if advance == 0 {
                        self.empties += 1;
                        if self.empties > MAX_EMPTY_TOKENS {
                            return Err(Error::Split(
                                "too many tokens without progressing".to_string(),
                            ));
                        }
                    } else {
                        self.empties = 0;
                    }

                    let begin = self.pos;
                    let range = self.start + token.start..self.start + token.end;
                    self.start += advance;
                    self.pos += advance as u64;
                    return Ok(Some(Scanned {
                        bytes: &self.buf[range],
                        begin,
                        end: self.pos,
                    }));
                }

                if advance > 0 {
                    self.start += advance;
                    self.pos += advance as u64;
                    continue;
                }

                if self.eof {
                    return Ok(None);
                }
            }

            self.fill()?;
        }
    }

    fn fill(&mut self) -> Result<()> {
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }

        if self.end == self.buf.len() {
            if self.buf.len() >= self.max_size {
                return Err(Error::Split(format!(
                    "token exceeds maximum buffer size of {} bytes",
                    self.max_size
                )));
            }
            let grown = (self.buf.len() * 2).max(MIN_BUFFER_SIZE).min(self.max_size);
            self.buf.resize(grown, 0);
        }

        loop {
            match self.source.read(&mut self.buf[self.end..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.end += n;
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
