//! Streamed-import chunk protocol: sequencing rules and record reassembly.
//!
//! Chunks arrive as opaque byte fragments. [`ChunkSequence`] enforces the
//! ordering contract and [`ChunkAssembler`] turns fragments back into whole
//! CSV records, carrying any partial record over to the next chunk.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One fragment of a streamed import payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportChunk {
    pub session_id: String,
    pub payload: Vec<u8>,
    /// 1-based, strictly consecutive.
    pub sequence: u64,
    pub is_last: bool,
}

/// Tracks the expected next chunk of one stream.
#[derive(Debug, Default)]
pub struct ChunkSequence {
    session_id: Option<String>,
    accepted: u64,
    finished: bool,
}

impl ChunkSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `chunk` against the stream so far and advance on success.
    pub fn accept(&mut self, chunk: &ImportChunk) -> Result<(), CoreError> {
        let session_id = chunk.session_id.trim();
        if session_id.is_empty() {
            return Err(CoreError::Validation(
                "chunk session id must not be empty".into(),
            ));
        }
        if self.finished {
            return Err(CoreError::Validation(format!(
                "chunk {} received after the last chunk",
                chunk.sequence
            )));
        }
        if let Some(expected) = &self.session_id {
            if expected != session_id {
                return Err(CoreError::Validation(format!(
                    "chunk session id '{session_id}' does not match stream session '{expected}'"
                )));
            }
        }
        let expected = self.accepted + 1;
        if chunk.sequence != expected {
            return Err(CoreError::Validation(format!(
                "chunk sequence {} is out of order, expected {expected}",
                chunk.sequence
            )));
        }

        self.session_id
            .get_or_insert_with(|| session_id.to_string());
        self.accepted = expected;
        self.finished = chunk.is_last;
        Ok(())
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Reassembles CSV records split across chunk boundaries.
///
/// Only bytes up to the last newline outside a quoted field are released;
/// the tail is held until more data arrives or [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    buffer: Vec<u8>,
    scanned: usize,
    in_quotes: bool,
    received_bytes: u64,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return every complete record it closes.
    pub fn push(&mut self, payload: &[u8]) -> Vec<u8> {
        self.received_bytes += payload.len() as u64;
        self.buffer.extend_from_slice(payload);

        let mut cut = None;
        for (offset, byte) in self.buffer[self.scanned..].iter().enumerate() {
            match byte {
                b'"' => self.in_quotes = !self.in_quotes,
                b'\n' if !self.in_quotes => cut = Some(self.scanned + offset + 1),
                _ => {}
            }
        }
        self.scanned = self.buffer.len();

        match cut {
            Some(end) => {
                let rest = self.buffer.split_off(end);
                self.scanned -= end;
                std::mem::replace(&mut self.buffer, rest)
            }
            None => Vec::new(),
        }
    }

    /// Release whatever is left, complete or not.
    pub fn finish(&mut self) -> Vec<u8> {
        self.scanned = 0;
        self.in_quotes = false;
        std::mem::take(&mut self.buffer)
    }

    pub fn received_bytes(&self) -> u64 {
        self.received_bytes
    }

    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}
