//! Response accumulation
//!
//! The daemon writes exactly one JSON message per command but the socket may
//! deliver it in several chunks. Bytes are appended to a growing buffer and
//! the whole buffer is re-decoded after every chunk; a decode failure only
//! means the message is not complete yet.

use serde_json::Value;

#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the message once the buffer decodes
    ///
    /// Trailing bytes after the first complete message are not checked for.
    pub fn push(&mut self, chunk: &[u8]) -> Option<Value> {
        self.buf.extend_from_slice(chunk);
        serde_json::from_slice(&self.buf).ok()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
