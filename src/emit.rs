// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;
use flume::Sender;
use tower::BoxError;

use crate::attrs::Attributes;

/// Location of a record in its source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOffset {
    /// Byte offset where the record begins
    pub offset: u64,
    /// Bytes consumed by the record, delimiter included
    pub len: u64,
}

/// A decoded record ready for the pipeline.
#[derive(Debug, Clone)]
pub struct Token {
    pub body: Bytes,
    pub attributes: Attributes,
    pub offset: RecordOffset,
}

/// Receives every record a reader produces, one call per record.
///
/// Errors are logged by the reader and the record is not retried.
pub trait Emitter: Send + Sync {
    fn emit(&self, token: Token) -> Result<(), BoxError>;
}

/// Adapts a closure into an [`Emitter`].
pub struct FnEmitter<F>(F);

pub fn from_fn<F>(f: F) -> FnEmitter<F>
where
    F: Fn(Token) -> Result<(), BoxError> + Send + Sync,
{
    FnEmitter(f)
}

impl<F> Emitter for FnEmitter<F>
where
    F: Fn(Token) -> Result<(), BoxError> + Send + Sync,
{
    fn emit(&self, token: Token) -> Result<(), BoxError> {
        (self.0)(token)
    }
}

/// Emitter that hands records to an async consumer over a bounded channel.
///
/// Readers run on OS threads, so a full channel blocks the reading thread
/// until the consumer catches up.
pub struct ChannelEmitter {
    tx: Sender<Token>,
}

impl ChannelEmitter {
    pub fn new(tx: Sender<Token>) -> Self {
        Self { tx }
    }
}

impl Emitter for ChannelEmitter {
    fn emit(&self, token: Token) -> Result<(), BoxError> {
        self.tx
            .send(token)
            .map_err(|_| "record channel disconnected".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn token(body: &'static str) -> Token {
        Token {
            body: Bytes::from_static(body.as_bytes()),
            attributes: Attributes::new(),
            offset: RecordOffset { offset: 0, len: 1 },
        }
    }

    #[test]
    fn test_fn_emitter() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let emitter = from_fn(move |t: Token| {
            sink.lock().unwrap().push(t.body);
            Ok(())
        });

        emitter.emit(token("a")).unwrap();
        emitter.emit(token("b")).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_channel_emitter() {
        let (tx, rx) = flume::bounded(2);
        let emitter = ChannelEmitter::new(tx);

        emitter.emit(token("a")).unwrap();
        assert_eq!(rx.recv().unwrap().body, "a");

        drop(rx);
        assert!(emitter.emit(token("b")).is_err());
    }
}
