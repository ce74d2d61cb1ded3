//! In-memory serial stream for exercising the transport without hardware.

use crate::error::Result;
use crate::frame;
use crate::transport::ByteStream;
use std::collections::VecDeque;
use std::io::{self, Read, Write};

/// Scripted stream: each queued chunk arrives at exactly one poll.
///
/// Chunks sit in `script` until a poll finds the input buffer empty, then
/// move to `input`. Only `input` is dropped by `clear_input`, like bytes
/// the port has already received.
#[derive(Debug, Default)]
pub struct MockSerial {
    script: VecDeque<Vec<u8>>,
    input: VecDeque<Vec<u8>>,
    written: Vec<u8>,
}

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw encoded bytes for one poll.
    pub fn queue_chunk(&mut self, bytes: &[u8]) {
        self.script.push_back(bytes.to_vec());
    }

    /// Queue a complete reply frame carrying `payload`.
    pub fn queue_reply(&mut self, payload: &[u8]) {
        self.queue_chunk(&frame::encode(payload));
    }

    /// Place bytes straight into the input buffer, as if they had arrived
    /// while nobody was reading.
    pub fn receive_now(&mut self, bytes: &[u8]) {
        self.input.push_back(bytes.to_vec());
    }

    /// Everything the transport has written so far.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Split the written bytes back into request payloads.
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.written
            .split_inclusive(|&b| b == crate::constants::ETX)
            .map(frame::decode)
            .collect()
    }

    /// Chunks not yet consumed.
    pub fn pending(&self) -> usize {
        self.script.len() + self.input.len()
    }

    fn arrive(&mut self) {
        if self.input.is_empty() {
            if let Some(chunk) = self.script.pop_front() {
                self.input.push_back(chunk);
            }
        }
    }
}

impl Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.arrive();
        let Some(mut chunk) = self.input.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            chunk.drain(..n);
            self.input.push_front(chunk);
        }
        Ok(n)
    }
}

impl Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ByteStream for MockSerial {
    fn available(&mut self) -> Result<usize> {
        self.arrive();
        Ok(self.input.front().map_or(0, Vec::len))
    }

    fn clear_input(&mut self) -> Result<()> {
        self.input.clear();
        Ok(())
    }
}
