//! Fixed-layout decoders for reply payloads.
//!
//! Every reply starts with an ASCII tag naming its kind. A decoder only
//! looks past the tag when it is the one it expects and the payload is long
//! enough for every field it reads; otherwise it produces no record.

use crate::chemistry::{self, ConfigPage};
use crate::constants::{EMPTY_SLOT, SENSOR_NOT_CONNECTED};
use crate::log_index;
use crate::types::*;
use std::ops::Range;

/// Firmware reply tag
pub const TAG_FIRMWARE: u8 = b'u';
/// Temperature reply tag
pub const TAG_TEMPERATURE: u8 = b't';
/// Database record reply tag
pub const TAG_DATABASE: u8 = b'd';
/// Channel parameters reply tag
pub const TAG_CHANNEL_PARAMS: u8 = b'p';
/// Channel measurement reply tag
pub const TAG_MEASUREMENT: u8 = b'm';
/// Channel function reply tag
pub const TAG_CHANNEL_STATUS: u8 = b'a';
/// Log index reply tag
pub const TAG_LOG_INDEX: u8 = b'i';

const FIRMWARE_LEN: usize = 22;
const TEMPERATURE_LEN: usize = 7;
const DATABASE_LEN: usize = 26;
const CHANNEL_PARAMS_LEN: usize = 22;
const MEASUREMENT_LEN: usize = 10;
const CHANNEL_STATUS_LEN: usize = 3;

/// Payload whose first byte is `tag` and which holds at least `len` bytes
fn tagged(payload: &[u8], tag: u8, len: usize) -> Option<&[u8]> {
    (payload.first() == Some(&tag) && payload.len() >= len).then_some(payload)
}

pub(crate) fn be_u16(p: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([p[offset], p[offset + 1]])
}

fn be_i32(p: &[u8], offset: usize) -> i32 {
    i32::from_be_bytes([p[offset], p[offset + 1], p[offset + 2], p[offset + 3]])
}

fn ascii(p: &[u8], range: Range<usize>) -> String {
    String::from_utf8_lossy(&p[range]).into_owned()
}

/// `u <0x68> <firmware version> <0xFF> <0xFF> <serial>`
pub fn decode_firmware(payload: &[u8]) -> Option<FirmwareInfo> {
    let p = tagged(payload, TAG_FIRMWARE, FIRMWARE_LEN)?;
    Some(FirmwareInfo {
        fw_version: ascii(p, 2..10).trim_start().to_string(),
        serial: ascii(p, 12..22),
    })
}

/// `t <ext. sensor> <power supply> <cooler>`
pub fn decode_temperatures(payload: &[u8]) -> Option<Temperatures> {
    let p = tagged(payload, TAG_TEMPERATURE, TEMPERATURE_LEN)?;
    let sensor = if p[1] == SENSOR_NOT_CONNECTED {
        SensorReading::NotConnected
    } else {
        SensorReading::Celsius(be_u16(p, 1) as f64 / 100.0)
    };
    Some(Temperatures {
        sensor,
        power: be_u16(p, 3) as f64 / 100.0,
        cooler: be_u16(p, 5) as f64 / 100.0,
    })
}

/// Whether a database reply describes an unused slot
pub fn is_empty_slot(payload: &[u8]) -> bool {
    tagged(payload, TAG_DATABASE, 12).is_some_and(|p| p[11] == EMPTY_SLOT)
}

/// `d <number> <name> <type> <cells> <capacity> <discharge current>
/// <charge current> <delay C/D> <flags> <full factor> <function>`
///
/// Empty slots decode to `None`.
pub fn decode_battery_profile(payload: &[u8]) -> Option<BatteryProfile> {
    let p = tagged(payload, TAG_DATABASE, DATABASE_LEN)?;
    if p[11] == EMPTY_SLOT {
        return None;
    }
    Some(BatteryProfile {
        slot: p[1],
        name: ascii(p, 2..11),
        chemistry: Chemistry::from_byte(p[11]),
        cells: p[12],
        capacity_mah: be_i32(p, 13) as f64 / 10000.0,
        discharge_ma: be_u16(p, 17) as f64 / 10.0,
        charge_ma: be_u16(p, 19) as f64 / 10.0,
        delay_minutes: be_u16(p, 21) as f64 / 60.0,
        flags: p[23],
        charge_factor_percent: p[24],
        function_release: p[25],
    })
}

/// `p <channel> <battery slot> <type> <cells> <discharge current>
/// <charge current> <capacity> <program> <forming current> <delay C/D>
/// <flags> <measure end> <full factor>`
pub fn decode_channel_parameters(payload: &[u8]) -> Option<ChannelParameters> {
    let p = tagged(payload, TAG_CHANNEL_PARAMS, CHANNEL_PARAMS_LEN)?;
    Some(ChannelParameters {
        channel: p[1].wrapping_add(1),
        battery_slot: p[2],
        chemistry: Chemistry::from_byte(p[3]),
        cells: p[4],
        discharge_ma: be_u16(p, 5) as f64 / 10.0,
        charge_ma: be_u16(p, 7) as f64 / 10.0,
        capacity_mah: be_i32(p, 9) as f64 / 10000.0,
        program: Program::from_byte(p[13]),
        forming_charge_ma: be_u16(p, 14) as f64 / 60.0,
        delay_minutes: be_u16(p, 16) as f64 / 60.0,
        flags: p[18],
        measure_end: be_u16(p, 19),
        charge_factor_percent: p[21],
    })
}

/// `m <channel> <voltage> <current> <capacity>`
pub fn decode_channel_measurement(payload: &[u8]) -> Option<ChannelMeasurement> {
    let p = tagged(payload, TAG_MEASUREMENT, MEASUREMENT_LEN)?;
    Some(ChannelMeasurement {
        channel: p[1].wrapping_add(1),
        voltage: be_u16(p, 2) as f64 / 1000.0,
        current_ma: be_u16(p, 4) as f64 / 10.0,
        capacity_mah: be_i32(p, 6) as f64 / 10000.0,
    })
}

/// `a <channel> <function>`
pub fn decode_channel_status(payload: &[u8]) -> Option<ChannelStatus> {
    let p = tagged(payload, TAG_CHANNEL_STATUS, CHANNEL_STATUS_LEN)?;
    Some(ChannelStatus {
        channel: p[1].wrapping_add(1),
        state: ChannelState::from_byte(p[2]),
    })
}

/// `i <channel> <address>...` as the channel number and raw address list
pub fn decode_log_addresses(payload: &[u8]) -> Option<(u8, Vec<u16>)> {
    let p = tagged(payload, TAG_LOG_INDEX, 2)?;
    Some((p[1].wrapping_add(1), log_index::parse_addresses(&p[2..])))
}

/// Every reply kind the charger sends, keyed by its tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Firmware(FirmwareInfo),
    Temperatures(Temperatures),
    BatteryProfile(BatteryProfile),
    /// Database slot with no stored battery
    EmptySlot { slot: u8 },
    ChannelParameters(ChannelParameters),
    ChannelMeasurement(ChannelMeasurement),
    ChannelStatus(ChannelStatus),
    ConfigPage(ConfigPage),
    LogIndex { channel: u8, addresses: Vec<u16> },
    /// Known tag, too few bytes for its layout
    Truncated { tag: u8, len: usize },
    /// Empty payload or a tag with no decoder
    Unrecognized { tag: Option<u8> },
}

impl Reply {
    /// Decode a payload by its leading tag.
    pub fn decode(payload: &[u8]) -> Reply {
        let Some(&tag) = payload.first() else {
            return Reply::Unrecognized { tag: None };
        };

        let decoded = match tag {
            TAG_FIRMWARE => decode_firmware(payload).map(Reply::Firmware),
            TAG_TEMPERATURE => decode_temperatures(payload).map(Reply::Temperatures),
            TAG_DATABASE if is_empty_slot(payload) => Some(Reply::EmptySlot { slot: payload[1] }),
            TAG_DATABASE => decode_battery_profile(payload).map(Reply::BatteryProfile),
            TAG_CHANNEL_PARAMS => decode_channel_parameters(payload).map(Reply::ChannelParameters),
            TAG_MEASUREMENT => decode_channel_measurement(payload).map(Reply::ChannelMeasurement),
            TAG_CHANNEL_STATUS => decode_channel_status(payload).map(Reply::ChannelStatus),
            TAG_LOG_INDEX => decode_log_addresses(payload)
                .map(|(channel, addresses)| Reply::LogIndex { channel, addresses }),
            _ if chemistry::ConfigPageKind::from_tag(tag).is_some() => {
                chemistry::decode_page(payload).map(Reply::ConfigPage)
            }
            _ => return Reply::Unrecognized { tag: Some(tag) },
        };

        decoded.unwrap_or(Reply::Truncated {
            tag,
            len: payload.len(),
        })
    }

    /// Short name for log messages
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Firmware(_) => "firmware",
            Reply::Temperatures(_) => "temperatures",
            Reply::BatteryProfile(_) => "battery profile",
            Reply::EmptySlot { .. } => "empty slot",
            Reply::ChannelParameters(_) => "channel parameters",
            Reply::ChannelMeasurement(_) => "channel measurement",
            Reply::ChannelStatus(_) => "channel status",
            Reply::ConfigPage(_) => "configuration page",
            Reply::LogIndex { .. } => "log index",
            Reply::Truncated { .. } => "truncated",
            Reply::Unrecognized { .. } => "unrecognized",
        }
    }
}
