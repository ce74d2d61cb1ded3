//! Protocol constants for ALC 8500 communication.
//!
//! This module defines the constants used on the charger's serial link,
//! including frame control bytes, command opcodes, timing parameters and
//! serial port configuration.

/// Start-of-frame delimiter
pub const STX: u8 = 0x02;

/// End-of-frame delimiter
pub const ETX: u8 = 0x03;

/// Escape marker introducing a two-byte substitution
pub const ESC: u8 = 0x05;

/// Substitute for an escaped `ESC` byte
pub const ESC_ESC: u8 = 0x15;

/// Substitute for an escaped `STX` byte
pub const ESC_STX: u8 = 0x12;

/// Substitute for an escaped `ETX` byte
pub const ESC_ETX: u8 = 0x13;

// Read commands
/// Read channel function (status)
pub const GET_CH_FUN: u8 = 0x61;
/// Read log data at address
pub const GET_CH_LOG: u8 = 0x62;
/// Read database record (40 records)
pub const GET_DB_REC: u8 = 0x64;
/// Read channel logging indexes
pub const GET_LOG_IDX: u8 = 0x69;
/// Read logging data block
pub const GET_LOG_BLK: u8 = 0x76;
/// Read channel measurement
pub const GET_CH_MEASURE: u8 = 0x6D;
/// Read channel parameters
pub const GET_CH_PARAM: u8 = 0x70;
/// Read temperatures
pub const GET_TEMP: u8 = 0x74;
/// Read firmware version and serial number
pub const GET_FW: u8 = 0x75;
/// Read configuration page 0
pub const GET_CFG_ADD0: u8 = 0x65;
/// Read configuration page 1
pub const GET_CFG_ADD1: u8 = 0x67;
/// Read configuration page 2
pub const GET_CFG_ADD2: u8 = 0x68;
/// Read configuration page 3
pub const GET_CFG_ADD3: u8 = 0x6A;
/// Read configuration page 4
pub const GET_CFG_ADD4: u8 = 0x7A;

// Write commands
/// Delete channel logging
pub const DEL_CH_LOG: u8 = 0x4C;
/// Write channel parameters
pub const SET_CH_PARAM: u8 = 0x50;
/// Write database record
pub const SET_AKKU: u8 = 0x44;
/// Set channel function
pub const SET_CH_FUN: u8 = 0x41;
/// Write configuration page 0
pub const SET_CFG_ADD0: u8 = 0x45;
/// Write configuration page 1
pub const SET_CFG_ADD1: u8 = 0x47;
/// Write configuration page 2
pub const SET_CFG_ADD2: u8 = 0x48;
/// Write configuration page 3
pub const SET_CFG_ADD3: u8 = 0x4A;
/// Write configuration page 4
pub const SET_CFG_ADD4: u8 = 0x5A;

/// Channel function argument that starts the programmed function
pub const CH_FUN_START: u8 = 0x00;

/// Channel function argument that stops the running function
pub const CH_FUN_STOP: u8 = 0x01;

/// Number of charging channels
pub const CHANNEL_COUNT: u8 = 4;

/// Number of battery database slots
pub const DB_SLOTS: u8 = 40;

/// Highest addressable log block
pub const MAX_LOG_BLOCK: u16 = 650;

/// Chemistry byte marking an unused database slot
pub const EMPTY_SLOT: u8 = 0xFF;

/// Temperature byte reported when the external sensor is unplugged
pub const SENSOR_NOT_CONNECTED: u8 = 0xAB;

/// Log address marking an unused index entry
pub const UNUSED_LOG_ADDRESS: u16 = 0xFFFF;

/// Number of entries in a fully populated log index
pub const LOG_INDEX_ENTRIES: usize = 12;

/// Entries per log block
pub const LOG_BLOCK_SIZE: u16 = 100;

/// USB product string used to find the charger
pub const USB_PRODUCT: &str = "ALC8500";

/// Baud rate (38400 bps)
pub const BAUD_RATE: u32 = 38_400;

/// Parity configuration (even parity required)
pub const PARITY: serialport::Parity = serialport::Parity::Even;

/// Flow control configuration
pub const FLOW_CONTROL: serialport::FlowControl = serialport::FlowControl::None;

/// Interval between polls for reply bytes
pub const POLL_INTERVAL_MS: u64 = 200;

/// Time allowed for a complete reply to arrive
pub const RESPONSE_TIMEOUT_MS: u64 = 5000;

/// Read timeout handed to the serial driver
pub const PORT_TIMEOUT_MS: u64 = 100;
