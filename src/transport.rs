//! Synchronous command/response exchange over a byte stream.

use crate::constants::*;
use crate::error::{Alc8500Error, Result};
use crate::frame;
use log::{debug, trace};
use serialport::{ClearBuffer, SerialPort};
use std::io::{Read, Write};
use std::thread;
use std::time::{Duration, Instant};

/// Bidirectional byte stream the transport talks through.
///
/// Implemented for an open serial port; tests substitute an in-memory
/// stream.
pub trait ByteStream: Read + Write {
    /// Number of bytes that can be read without blocking.
    fn available(&mut self) -> Result<usize>;

    /// Discard bytes received but not yet read.
    fn clear_input(&mut self) -> Result<()>;
}

impl ByteStream for Box<dyn SerialPort> {
    fn available(&mut self) -> Result<usize> {
        Ok((**self).bytes_to_read()? as usize)
    }

    fn clear_input(&mut self) -> Result<()> {
        (**self).clear(ClearBuffer::Input)?;
        Ok(())
    }
}

/// A single request argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Integer, sent as one byte up to 255 and as a big-endian word above
    Int(u16),
    /// Bytes sent verbatim
    Raw(Vec<u8>),
}

impl Arg {
    fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Arg::Int(v) if *v > 0xFF => out.extend_from_slice(&v.to_be_bytes()),
            Arg::Int(v) => out.push(*v as u8),
            Arg::Raw(bytes) => out.extend_from_slice(bytes),
        }
    }
}

impl From<u8> for Arg {
    fn from(v: u8) -> Self {
        Arg::Int(v as u16)
    }
}

impl From<u16> for Arg {
    fn from(v: u16) -> Self {
        Arg::Int(v)
    }
}

impl From<&[u8]> for Arg {
    fn from(v: &[u8]) -> Self {
        Arg::Raw(v.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Arg {
    fn from(v: [u8; N]) -> Self {
        Arg::Raw(v.to_vec())
    }
}

/// An opcode plus its arguments, ready to be framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    bytes: Vec<u8>,
}

impl Request {
    /// Start a request for the given opcode
    pub fn new(opcode: u8) -> Self {
        Request { bytes: vec![opcode] }
    }

    /// Append an argument
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        arg.into().write_to(&mut self.bytes);
        self
    }

    /// Command opcode
    pub fn opcode(&self) -> u8 {
        self.bytes[0]
    }

    /// Unframed request bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Runtime transport settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Delay between polls for reply bytes
    pub poll_interval: Duration,
    /// Upper bound for one exchange; `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
            timeout: Some(Duration::from_millis(RESPONSE_TIMEOUT_MS)),
        }
    }
}

/// Command transport owning the byte stream.
pub struct Transport<S: ByteStream> {
    stream: S,
    config: TransportConfig,
}

impl<S: ByteStream> Transport<S> {
    /// Wrap an already-open stream
    pub fn new(stream: S, config: TransportConfig) -> Self {
        Transport { stream, config }
    }

    /// Current settings
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Replace the settings used for subsequent exchanges
    pub fn set_config(&mut self, config: TransportConfig) {
        self.config = config;
    }

    /// Access the underlying stream
    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Consume the transport and return the stream
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Send a request and block until its reply frame is complete.
    ///
    /// Anything left in the input buffer, such as the tail of a reply that
    /// arrived after a timeout, is discarded before the request goes out.
    /// Returns the unescaped reply payload.
    pub fn send(&mut self, request: &Request) -> Result<Vec<u8>> {
        self.stream.clear_input()?;

        let framed = frame::encode(request.as_bytes());
        debug!("Request:  {}", frame::hex(request.as_bytes()));
        self.stream.write_all(&framed)?;
        self.stream.flush()?;

        let started = Instant::now();
        let mut response = Vec::new();
        loop {
            thread::sleep(self.config.poll_interval);

            let waiting = self.stream.available()?;
            if waiting > 0 {
                let mut buf = vec![0u8; waiting];
                let read = self.stream.read(&mut buf)?;
                response.extend_from_slice(&buf[..read]);
                trace!("Poll read {} bytes ({} total)", read, response.len());
            }

            if frame::is_complete(&response) {
                break;
            }

            if let Some(timeout) = self.config.timeout {
                let elapsed = started.elapsed();
                if elapsed >= timeout {
                    return Err(Alc8500Error::Timeout {
                        elapsed,
                        received: response.len(),
                    });
                }
            }
        }

        let payload = frame::decode(&response);
        debug!("Response: {}", frame::hex(&payload));
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_serial::MockSerial;

    fn fast_config() -> TransportConfig {
        TransportConfig {
            poll_interval: Duration::from_millis(1),
            timeout: Some(Duration::from_millis(200)),
        }
    }

    #[test]
    fn test_request_small_ints_are_single_bytes() {
        let req = Request::new(GET_CH_PARAM).arg(3u8);
        assert_eq!(req.as_bytes(), &[0x70, 0x03]);
        assert_eq!(req.opcode(), GET_CH_PARAM);
    }

    #[test]
    fn test_request_large_ints_are_big_endian_words() {
        let req = Request::new(GET_CH_LOG).arg(0u8).arg(0x1234u16);
        assert_eq!(req.as_bytes(), &[0x62, 0x00, 0x12, 0x34]);

        // 255 still fits a byte, 256 does not
        assert_eq!(Request::new(0x01).arg(255u16).as_bytes(), &[0x01, 0xFF]);
        assert_eq!(Request::new(0x01).arg(256u16).as_bytes(), &[0x01, 0x01, 0x00]);
    }

    #[test]
    fn test_request_raw_bytes() {
        let req = Request::new(GET_LOG_BLK).arg(1u8).arg(7u16.to_be_bytes());
        assert_eq!(req.as_bytes(), &[0x76, 0x01, 0x00, 0x07]);
    }

    #[test]
    fn test_send_writes_encoded_frame() {
        let mut transport = Transport::new(MockSerial::new(), fast_config());
        transport.stream_mut().queue_reply(&[b'a', 0x00, 0x00]);

        transport
            .send(&Request::new(GET_CH_FUN).arg(0x02u8))
            .unwrap();

        assert_eq!(
            transport.stream_mut().written(),
            &[0x02, 0x61, 0x05, 0x12, 0x03]
        );
    }

    #[test]
    fn test_send_returns_decoded_payload() {
        let mut transport = Transport::new(MockSerial::new(), fast_config());
        transport.stream_mut().queue_reply(&[b'm', 0x03, 0x05, 0x02]);

        let payload = transport.send(&Request::new(GET_CH_MEASURE)).unwrap();
        assert_eq!(payload, vec![b'm', 0x03, 0x05, 0x02]);
    }

    #[test]
    fn test_escaped_etx_does_not_end_read_early() {
        let mut transport = Transport::new(MockSerial::new(), fast_config());
        // Split right after the escaped ETX so one poll ends on 0x13
        let encoded = frame::encode(&[b't', 0x03, 0x03, 0x10]);
        let split = encoded.iter().position(|&b| b == 0x13).unwrap() + 1;
        transport.stream_mut().queue_chunk(&encoded[..split]);
        transport.stream_mut().queue_chunk(&encoded[split..]);

        let payload = transport.send(&Request::new(GET_TEMP)).unwrap();
        assert_eq!(payload, vec![b't', 0x03, 0x03, 0x10]);
    }

    #[test]
    fn test_reply_split_across_polls() {
        let mut transport = Transport::new(MockSerial::new(), fast_config());
        let encoded = frame::encode(b"u\x68 1.23");
        for chunk in encoded.chunks(2) {
            transport.stream_mut().queue_chunk(chunk);
        }

        let payload = transport.send(&Request::new(GET_FW)).unwrap();
        assert_eq!(payload, b"u\x68 1.23".to_vec());
    }

    #[test]
    fn test_timeout_when_frame_never_ends() {
        let mut transport = Transport::new(MockSerial::new(), fast_config());
        transport.stream_mut().queue_chunk(&[0x02, b't', 0x05]);

        match transport.send(&Request::new(GET_TEMP)) {
            Err(Alc8500Error::Timeout { received, .. }) => assert_eq!(received, 3),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_late_reply_discarded_before_next_request() {
        let mut transport = Transport::new(MockSerial::new(), fast_config());
        let late = frame::encode(&[b't', 0x09, 0xC4, 0x09, 0xC4, 0x09, 0xC4]);
        transport.stream_mut().queue_chunk(&late[..4]);
        assert!(matches!(
            transport.send(&Request::new(GET_TEMP)),
            Err(Alc8500Error::Timeout { received: 4, .. })
        ));

        // Rest of the first reply shows up before the next request
        transport.stream_mut().receive_now(&late[4..]);
        transport.stream_mut().queue_reply(&[b'a', 0x00, 0x2F]);

        let payload = transport.send(&Request::new(GET_CH_FUN).arg(0u8)).unwrap();
        assert_eq!(payload, vec![b'a', 0x00, 0x2F]);
        assert_eq!(transport.stream_mut().pending(), 0);
    }

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(200));
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }
}
