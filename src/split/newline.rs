// SPDX-License-Identifier: Apache-2.0

use super::{Split, SplitFunc, SplitResult};

/// Splits on `\n`. The newline is consumed but not part of the token.
///
/// An unterminated trailing line is only returned at EOF when
/// `flush_at_eof` is set; otherwise it waits for more data or for the flush
/// stage to force it out.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewlineSplit {
    flush_at_eof: bool,
}

impl NewlineSplit {
    pub fn new(flush_at_eof: bool) -> Self {
        Self { flush_at_eof }
    }
}

impl SplitFunc for NewlineSplit {
    fn split(&mut self, data: &[u8], at_eof: bool) -> SplitResult {
        if data.is_empty() {
            return Ok(Split::need_more());
        }

        if let Some(i) = data.iter().position(|&b| b == b'\n') {
            return Ok(Split::token(i + 1, 0..i));
        }

        if at_eof && self.flush_at_eof {
            return Ok(Split::token(data.len(), 0..data.len()));
        }

        Ok(Split::need_more())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newline_split() {
        let mut split = NewlineSplit::default();
        assert_eq!(split.split(b"ab\ncd\n", false).unwrap(), Split::token(3, 0..2));
        assert_eq!(split.split(b"\n", false).unwrap(), Split::token(1, 0..0));
    }

    #[test]
    fn test_newline_split_partial() {
        let mut split = NewlineSplit::default();
        assert_eq!(split.split(b"abc", false).unwrap(), Split::need_more());
        assert_eq!(split.split(b"abc", true).unwrap(), Split::need_more());
        assert_eq!(split.split(b"", true).unwrap(), Split::need_more());
    }

    #[test]
    fn test_newline_split_flush_at_eof() {
        let mut split = NewlineSplit::new(true);
        assert_eq!(split.split(b"abc", false).unwrap(), Split::need_more());
        assert_eq!(split.split(b"abc", true).unwrap(), Split::token(3, 0..3));
    }
}
