//! Channel Control Example
//!
//! Demonstrates per-channel operations:
//! - Starting and stopping the programmed function
//! - Reading the reconstructed log index
//! - Debug output for protocol analysis
//!
//! Usage:
//!   cargo run --example channel_control -- /dev/ttyUSB0 2 stop
//!   cargo run --example channel_control -- /dev/ttyUSB0 2 start
//!   cargo run --example channel_control -- /dev/ttyUSB0 2 log
//!
//! Set RUST_LOG=debug to see request and response frames.

use alc8500_protocol::{Alc8500, Alc8500Error, Result};
use log::{error, info, warn};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let port_name = match args.next() {
        Some(name) => name,
        None => Alc8500::find_port()?,
    };
    let channel: u8 = args.next().and_then(|c| c.parse().ok()).unwrap_or(1);
    let action = args.next().unwrap_or_else(|| "log".to_string());

    info!("Connecting to ALC8500 on {}...", port_name);
    let mut alc = Alc8500::new(&port_name)?;

    match action.as_str() {
        "start" | "stop" => {
            let status = if action == "start" {
                alc.start_channel(channel)?
            } else {
                alc.stop_channel(channel)?
            };
            match status {
                Some(s) => info!("Channel {} is now: {}", channel, s.state),
                None => warn!("Channel {} did not report its status", channel),
            }
        }
        "log" => match alc.log_index(channel) {
            Ok(Some(index)) => {
                info!("Log addresses: {:?}", index.addresses);
                for (i, block) in index.blocks.iter().enumerate() {
                    info!(
                        "{:2}: addr {:5} size {:5} ({} blocks + {})",
                        i, block.address, block.size, block.block_count, block.remainder
                    );
                }
            }
            Ok(None) => warn!("No log index returned for channel {}", channel),
            Err(Alc8500Error::UnsupportedLogLayout { rotation_index }) => {
                warn!("Log layout not supported (rotation index {:?})", rotation_index)
            }
            Err(e) => return Err(e),
        },
        other => error!("Unknown action '{}', expected start, stop or log", other),
    }

    Ok(())
}
