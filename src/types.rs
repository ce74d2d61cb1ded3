use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

use crate::constants::CHANNEL_COUNT;
use crate::error::{Alc8500Error, Result};

/// Charger channel, validated to 1..=4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Channel(u8);

impl Channel {
    pub fn new(number: u8) -> Result<Self> {
        if (1..=CHANNEL_COUNT).contains(&number) {
            Ok(Channel(number))
        } else {
            Err(Alc8500Error::InvalidChannel(number))
        }
    }

    /// All four channels in order
    pub fn all() -> impl Iterator<Item = Channel> {
        (1..=CHANNEL_COUNT).map(Channel)
    }

    /// User-facing channel number (1-based)
    pub fn number(self) -> u8 {
        self.0
    }

    /// Channel byte sent on the wire (0-based)
    pub fn wire(self) -> u8 {
        self.0 - 1
    }
}

impl TryFrom<u8> for Channel {
    type Error = Alc8500Error;

    fn try_from(number: u8) -> Result<Self> {
        Channel::new(number)
    }
}

impl From<Channel> for u8 {
    fn from(channel: Channel) -> u8 {
        channel.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Battery chemistry as stored in database records and channel parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chemistry {
    NiCd,
    NiMH,
    LiIon41,
    LiPo42,
    Pb,
    LiFePo4,
    LiPoPlus435,
    NiZn,
    AgmCa,
    Unknown(u8),
}

impl Chemistry {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Chemistry::NiCd,
            1 => Chemistry::NiMH,
            2 => Chemistry::LiIon41,
            3 => Chemistry::LiPo42,
            4 => Chemistry::Pb,
            5 => Chemistry::LiFePo4,
            6 => Chemistry::LiPoPlus435,
            7 => Chemistry::NiZn,
            8 => Chemistry::AgmCa,
            other => Chemistry::Unknown(other),
        }
    }

    /// Display label used by the charger menus
    pub fn label(&self) -> String {
        match self {
            Chemistry::NiCd => "NiCd".to_string(),
            Chemistry::NiMH => "NiMH".to_string(),
            Chemistry::LiIon41 => "Li-Ion 4.1".to_string(),
            Chemistry::LiPo42 => "Li-Pol 4.2".to_string(),
            Chemistry::Pb => "Pb".to_string(),
            Chemistry::LiFePo4 => "LiFePo4".to_string(),
            Chemistry::LiPoPlus435 => "LiPo+ 4.35".to_string(),
            Chemistry::NiZn => "NiZn".to_string(),
            Chemistry::AgmCa => "AGM/CA".to_string(),
            Chemistry::Unknown(b) => format!("unknown ({:#04x})", b),
        }
    }
}

impl fmt::Display for Chemistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Program a channel is set up to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Program {
    Charge,
    Discharge,
    DischargeCharge,
    Test,
    Service,
    Forming,
    Cycle,
    Refresh,
    Unknown(u8),
}

impl Program {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            1 => Program::Charge,
            2 => Program::Discharge,
            3 => Program::DischargeCharge,
            4 => Program::Test,
            5 => Program::Service,
            6 => Program::Forming,
            7 => Program::Cycle,
            8 => Program::Refresh,
            other => Program::Unknown(other),
        }
    }
}

/// What a channel is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    Idle,
    Discharge,
    Charge,
    Pause,
    TrickleCharge,
    Unknown(u8),
}

/// Status byte ranges, inclusive. Values outside every range are unknown.
const STATUS_RANGES: [(RangeInclusive<u8>, ChannelState); 5] = [
    (0x00..=0x00, ChannelState::Idle),
    (0x0A..=0x0A, ChannelState::Pause),
    (0x2F..=0x2F, ChannelState::Discharge),
    (0x50..=0x50, ChannelState::Charge),
    (0x7A..=0x7A, ChannelState::TrickleCharge),
];

impl ChannelState {
    pub fn from_byte(byte: u8) -> Self {
        STATUS_RANGES
            .iter()
            .find(|(range, _)| range.contains(&byte))
            .map(|(_, state)| *state)
            .unwrap_or(ChannelState::Unknown(byte))
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChannelState::Idle => "Idle",
            ChannelState::Discharge => "Discharge",
            ChannelState::Charge => "Charge",
            ChannelState::Pause => "Pause",
            ChannelState::TrickleCharge => "Trickle charge",
            ChannelState::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Firmware and identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmwareInfo {
    pub fw_version: String,
    pub serial: String,
}

/// External sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorReading {
    Celsius(f64),
    NotConnected,
}

impl SensorReading {
    pub fn celsius(&self) -> Option<f64> {
        match self {
            SensorReading::Celsius(t) => Some(*t),
            SensorReading::NotConnected => None,
        }
    }
}

/// Device temperatures in degrees Celsius
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperatures {
    pub sensor: SensorReading,
    pub power: f64,
    pub cooler: f64,
}

/// Stored battery database record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryProfile {
    pub slot: u8,
    pub name: String,
    pub chemistry: Chemistry,
    pub cells: u8,
    pub capacity_mah: f64,
    pub discharge_ma: f64,
    pub charge_ma: f64,
    pub delay_minutes: f64,
    pub flags: u8,
    pub charge_factor_percent: u8,
    pub function_release: u8,
}

/// Parameters a channel is programmed with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelParameters {
    pub channel: u8,
    pub battery_slot: u8,
    pub chemistry: Chemistry,
    pub cells: u8,
    pub discharge_ma: f64,
    pub charge_ma: f64,
    pub capacity_mah: f64,
    pub program: Program,
    pub forming_charge_ma: f64,
    pub delay_minutes: f64,
    pub flags: u8,
    pub measure_end: u16,
    pub charge_factor_percent: u8,
}

/// Last measurement taken on a channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelMeasurement {
    pub channel: u8,
    pub voltage: f64,
    pub current_ma: f64,
    pub capacity_mah: f64,
}

/// Running state of a channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub channel: u8,
    pub state: ChannelState,
}

/// Backlight timeout selected in the device menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayMode {
    Off,
    On,
    OneMinute,
    FiveMinutes,
    TenMinutes,
    ThirtyMinutes,
    SixtyMinutes,
    Unknown(u8),
}

impl DisplayMode {
    /// Decode from the low three bits of the display byte
    pub fn from_bits(byte: u8) -> Self {
        match byte & 0x07 {
            0 => DisplayMode::Off,
            1 => DisplayMode::On,
            2 => DisplayMode::OneMinute,
            3 => DisplayMode::FiveMinutes,
            4 => DisplayMode::TenMinutes,
            5 => DisplayMode::ThirtyMinutes,
            6 => DisplayMode::SixtyMinutes,
            other => DisplayMode::Unknown(other),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DisplayMode::Off => "Off",
            DisplayMode::On => "On",
            DisplayMode::OneMinute => "1min",
            DisplayMode::FiveMinutes => "5min",
            DisplayMode::TenMinutes => "10min",
            DisplayMode::ThirtyMinutes => "30min",
            DisplayMode::SixtyMinutes => "60min",
            DisplayMode::Unknown(_) => "unknown",
        }
    }
}

/// Audible alert bits in the device flags byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeepFlag {
    /// Bit 3
    AlarmBeep,
    /// Bit 4
    ButtonBeep,
}

impl BeepFlag {
    pub const ALL: [BeepFlag; 2] = [BeepFlag::AlarmBeep, BeepFlag::ButtonBeep];

    pub fn bit(self) -> u8 {
        match self {
            BeepFlag::AlarmBeep => 3,
            BeepFlag::ButtonBeep => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BeepFlag::AlarmBeep => "ALBEEP_EN",
            BeepFlag::ButtonBeep => "BUBEEP_EN",
        }
    }
}

/// Display and beeper configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub contrast: u8,
    pub mode: DisplayMode,
    pub beeps: Vec<BeepFlag>,
}

impl DisplayConfig {
    /// Build from the display byte and the flags byte
    pub fn from_bytes(display: u8, flags: u8) -> Self {
        let beeps = BeepFlag::ALL
            .into_iter()
            .filter(|flag| flags & (1 << flag.bit()) != 0)
            .collect();
        DisplayConfig {
            contrast: display,
            mode: DisplayMode::from_bits(display),
            beeps,
        }
    }

    /// Mode followed by any enabled beep flags, comma separated
    pub fn description(&self) -> String {
        let mut parts = vec![self.mode.label()];
        parts.extend(self.beeps.iter().map(|flag| flag.label()));
        parts.join(",")
    }
}

/// Device-wide settings found in the configuration pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSettings {
    pub low_batt_cut_voltage: f64,
    pub display: DisplayConfig,
}

/// One chemistry's charge/discharge configuration.
///
/// Fields are `None` when no configuration page carries them for this
/// chemistry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemistryConfig {
    pub chemistry: Chemistry,
    pub final_discharge_voltage: Option<f64>,
    pub loading_voltage: Option<f64>,
    pub trickle_voltage: Option<f64>,
    pub storage_voltage: Option<f64>,
    pub delay: Option<u8>,
    pub cycle_count: Option<u8>,
    pub cycle_forming: Option<u8>,
    pub charge_cut_off: Option<u16>,
}

impl ChemistryConfig {
    pub fn new(chemistry: Chemistry) -> Self {
        ChemistryConfig {
            chemistry,
            final_discharge_voltage: None,
            loading_voltage: None,
            trickle_voltage: None,
            storage_voltage: None,
            delay: None,
            cycle_count: None,
            cycle_forming: None,
            charge_cut_off: None,
        }
    }
}

/// Complete chemistry table plus device settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfiguration {
    pub chemistries: Vec<ChemistryConfig>,
    pub settings: DeviceSettings,
}

impl DeviceConfiguration {
    pub fn chemistry(&self, chemistry: Chemistry) -> Option<&ChemistryConfig> {
        self.chemistries.iter().find(|c| c.chemistry == chemistry)
    }
}

/// Boundaries of one log block run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogBlock {
    pub address: u16,
    pub size: u16,
    pub block_count: u16,
    pub remainder: u16,
}

/// Reconstructed log index for one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogIndex {
    pub channel: u8,
    pub addresses: Vec<u16>,
    pub blocks: Vec<LogBlock>,
}

/// Point-in-time snapshot of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub channel: u8,
    pub status: Option<ChannelStatus>,
    pub measurement: Option<ChannelMeasurement>,
    pub parameters: Option<ChannelParameters>,
}

/// Full device read-out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub timestamp: DateTime<Utc>,
    pub usb_port: String,
    pub firmware: Option<FirmwareInfo>,
    pub temperatures: Option<Temperatures>,
    pub configuration: Option<DeviceConfiguration>,
    pub channels: Vec<ChannelSnapshot>,
}
