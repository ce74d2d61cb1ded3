//! Error types for ALC 8500 protocol operations.

use crate::chemistry::ConfigPageKind;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for ALC 8500 operations.
pub type Result<T> = std::result::Result<T, Alc8500Error>;

/// Error types for ALC 8500 charger communication.
#[derive(Error, Debug)]
pub enum Alc8500Error {
    /// Serial port communication error
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No charger found among the available serial ports
    #[error("ALC8500 not found")]
    DeviceNotFound,

    /// Reply did not complete within the configured timeout
    #[error("Communication timeout after {elapsed:?} ({received} bytes received)")]
    Timeout {
        /// Time spent waiting
        elapsed: Duration,
        /// Encoded bytes received before giving up
        received: usize,
    },

    /// Channel number outside 1..=4
    #[error("Channel/port number should be between 1 and 4, got {0}")]
    InvalidChannel(u8),

    /// Database slot outside 0..40
    #[error("Database slot should be between 0 and 39, got {0}")]
    InvalidSlot(u8),

    /// Log block number outside 0..=650
    #[error("Log block should be between 0 and 650, got {0}")]
    InvalidLogBlock(u16),

    /// Configuration finalized before every page was supplied
    #[error("Missing configuration pages: {0:?}")]
    MissingConfigPages(Vec<ConfigPageKind>),

    /// Log index layout that cannot be put back in order
    #[error(
        "Log index reconstruction not supported for this layout \
         (rotation index {rotation_index:?})"
    )]
    UnsupportedLogLayout {
        /// Rotation index of a full ring, `None` if the ring was not full or
        /// its wrap point was not found
        rotation_index: Option<usize>,
    },
}
