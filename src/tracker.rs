// SPDX-License-Identifier: Apache-2.0

//! Bookkeeping of which files the consumer knows about across polls.
//!
//! Readers matched in the poll being processed live in the current set, the
//! readers from the poll before live in the previous set. Files that dropped
//! out of both are kept as closed [`Metadata`] for a few more polls so that a
//! file reappearing after a slow rotation resumes instead of starting over.
//!
//! ## Generations
//!
//! Closed metadata is kept in three generations. Readers closed at the end
//! of a consume land in generation 0, and every finished poll shifts the
//! generations by one, dropping the oldest.

use std::mem;

use crate::input::{Fingerprint, Metadata, Reader};

const KNOWN_GENERATIONS: usize = 3;

pub struct Tracker {
    current_poll_files: Vec<Reader>,
    previous_poll_files: Vec<Reader>,
    known_files: Vec<Vec<Metadata>>,
}

impl Tracker {
    pub fn new() -> Self {
        Self {
            current_poll_files: Vec::new(),
            previous_poll_files: Vec::new(),
            known_files: (0..KNOWN_GENERATIONS).map(|_| Vec::new()).collect(),
        }
    }

    /// Append a reader to the current poll.
    pub fn add(&mut self, reader: Reader) {
        self.current_poll_files.push(reader);
    }

    /// Take a reader from the current poll with exactly this fingerprint.
    ///
    /// Two matched paths with identical content show up during copytruncate
    /// rotation, between the copy and the truncate.
    pub fn get_current_file(&mut self, fp: &Fingerprint) -> Option<Reader> {
        let idx = self
            .current_poll_files
            .iter()
            .position(|r| r.fingerprint() == fp)?;
        Some(self.current_poll_files.remove(idx))
    }

    /// Take a previous-poll reader whose fingerprint is a prefix of `fp`.
    pub fn get_open_file(&mut self, fp: &Fingerprint) -> Option<Reader> {
        let idx = self
            .previous_poll_files
            .iter()
            .position(|r| fp.starts_with(r.fingerprint()))?;
        Some(self.previous_poll_files.remove(idx))
    }

    /// Take closed metadata whose fingerprint is a prefix of `fp`, newest
    /// generation first.
    pub fn get_closed_file(&mut self, fp: &Fingerprint) -> Option<Metadata> {
        for generation in self.known_files.iter_mut() {
            if let Some(idx) = generation.iter().position(|m| fp.starts_with(&m.fingerprint)) {
                return Some(generation.remove(idx));
            }
        }
        None
    }

    /// Everything worth checkpointing: readers still open from the previous
    /// poll and every known closed file.
    pub fn get_metadata(&self) -> Vec<Metadata> {
        self.previous_poll_files
            .iter()
            .map(Reader::metadata)
            .chain(self.known_files.iter().flatten().cloned())
            .collect()
    }

    /// Seed the newest generation from a restored checkpoint.
    pub fn load_metadata(&mut self, metadata: Vec<Metadata>) {
        self.known_files[0].extend(metadata);
    }

    pub fn current_poll_files(&self) -> &[Reader] {
        &self.current_poll_files
    }

    pub fn current_poll_files_mut(&mut self) -> &mut [Reader] {
        &mut self.current_poll_files
    }

    pub fn previous_poll_files(&self) -> &[Reader] {
        &self.previous_poll_files
    }

    /// Both sets at once, so lost readers can be drained while the current
    /// poll is inspected.
    pub fn poll_files_mut(&mut self) -> (&mut [Reader], &[Reader]) {
        (&mut self.previous_poll_files, &self.current_poll_files)
    }

    /// Close every previous-poll reader into generation 0, returning how
    /// many were closed.
    pub fn close_previous_files(&mut self) -> usize {
        let previous = mem::take(&mut self.previous_poll_files);
        let closed = previous.len();
        self.known_files[0].extend(previous.into_iter().map(Reader::close));
        closed
    }

    /// Finish a consume: leftovers of the previous poll are closed and the
    /// current poll becomes the previous one.
    pub fn end_consume(&mut self) {
        self.close_previous_files();
        self.previous_poll_files = mem::take(&mut self.current_poll_files);
    }

    /// Age the closed generations, dropping the oldest.
    pub fn end_poll(&mut self) {
        self.known_files.pop();
        self.known_files.insert(0, Vec::new());
    }

    pub fn total_readers(&self) -> usize {
        self.current_poll_files.len() + self.previous_poll_files.len()
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}
