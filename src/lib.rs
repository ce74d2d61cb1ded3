//! # ALC 8500 Protocol Library
//!
//! A Rust library for reading ELV/Voltcraft ALC 8500 battery chargers via
//! their USB serial link. The charger answers single-byte commands with
//! framed binary replies, which this library decodes into structured data.
//!
//! ## Features
//!
//! - Byte-stuffed frame codec and a blocking command/response transport
//! - Firmware, temperature, battery database and channel read-outs
//! - Chemistry configuration merged from the five configuration pages
//! - Chronological reconstruction of the circular channel log index
//! - Start/stop of the programmed channel function
//!
//! ## Example
//!
//! ```no_run
//! use alc8500_protocol::Alc8500;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut alc = Alc8500::connect()?;
//!     if let Some(m) = alc.channel_measurement(1)? {
//!         println!("Channel 1: {:.3}V {:.1}mA", m.voltage, m.current_ma);
//!     }
//!     Ok(())
//! }
//! ```

pub mod chemistry;
pub mod constants;
pub mod decode;
pub mod error;
pub mod frame;
pub mod log_index;
pub mod protocol;
pub mod transport;
pub mod types;

#[cfg(test)]
mod mock_serial;

pub use chemistry::{ChemistryConfigBuilder, ConfigPage, ConfigPageKind};
pub use decode::Reply;
pub use error::{Alc8500Error, Result};
pub use protocol::Alc8500;
pub use transport::{Arg, ByteStream, Request, Transport, TransportConfig};
pub use types::*;
