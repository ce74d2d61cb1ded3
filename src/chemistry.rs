//! Chemistry configuration pages and the builder that merges them.
//!
//! The charger spreads its per-chemistry settings over five configuration
//! pages. Each page carries a few fields for several chemistries; the
//! complete table only exists once all five have been read.

use crate::constants::*;
use crate::decode::be_u16;
use crate::error::{Alc8500Error, Result};
use crate::types::{Chemistry, ChemistryConfig, DeviceConfiguration, DeviceSettings, DisplayConfig};
use serde::{Deserialize, Serialize};

/// Chemistries covered by the configuration pages, in output order
pub const CONFIGURED_CHEMISTRIES: [Chemistry; 8] = [
    Chemistry::LiPo42,
    Chemistry::LiIon41,
    Chemistry::LiFePo4,
    Chemistry::AgmCa,
    Chemistry::NiZn,
    Chemistry::NiMH,
    Chemistry::NiCd,
    Chemistry::Pb,
];

/// The five configuration pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigPageKind {
    Page0,
    Page1,
    Page2,
    Page3,
    Page4,
}

impl ConfigPageKind {
    pub const ALL: [ConfigPageKind; 5] = [
        ConfigPageKind::Page0,
        ConfigPageKind::Page1,
        ConfigPageKind::Page2,
        ConfigPageKind::Page3,
        ConfigPageKind::Page4,
    ];

    /// Opcode that reads this page
    pub fn opcode(self) -> u8 {
        match self {
            ConfigPageKind::Page0 => GET_CFG_ADD0,
            ConfigPageKind::Page1 => GET_CFG_ADD1,
            ConfigPageKind::Page2 => GET_CFG_ADD2,
            ConfigPageKind::Page3 => GET_CFG_ADD3,
            ConfigPageKind::Page4 => GET_CFG_ADD4,
        }
    }

    /// Reply tag the page comes back with
    pub fn tag(self) -> u8 {
        match self {
            ConfigPageKind::Page0 => b'e',
            ConfigPageKind::Page1 => b'g',
            ConfigPageKind::Page2 => b'h',
            ConfigPageKind::Page3 => b'j',
            ConfigPageKind::Page4 => b'z',
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Shortest payload holding every field read from this page
    fn min_len(self) -> usize {
        match self {
            ConfigPageKind::Page0 => 22,
            ConfigPageKind::Page1 => 22,
            ConfigPageKind::Page2 => 23,
            ConfigPageKind::Page3 => 11,
            ConfigPageKind::Page4 => 9,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Fields carried by one decoded configuration page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigPage {
    pub kind: ConfigPageKind,
    pub entries: Vec<ChemistryConfig>,
    pub low_batt_cut_voltage: Option<f64>,
    pub display: Option<DisplayConfig>,
}

fn volts(p: &[u8], offset: usize) -> f64 {
    be_u16(p, offset) as f64 / 1000.0
}

/// Chemistry entry carrying final discharge, delay, loading and trickle
/// values at consecutive offsets starting at `at`
fn page0_block(p: &[u8], chemistry: Chemistry, at: usize) -> ChemistryConfig {
    ChemistryConfig {
        final_discharge_voltage: Some(volts(p, at)),
        delay: Some(p[at + 2]),
        loading_voltage: Some(volts(p, at + 3)),
        trickle_voltage: Some(volts(p, at + 5)),
        ..ChemistryConfig::new(chemistry)
    }
}

fn decode_page0(p: &[u8]) -> ConfigPage {
    ConfigPage {
        kind: ConfigPageKind::Page0,
        entries: vec![
            page0_block(p, Chemistry::LiPo42, 1),
            page0_block(p, Chemistry::NiZn, 8),
            page0_block(p, Chemistry::AgmCa, 15),
        ],
        low_batt_cut_voltage: None,
        display: None,
    }
}

fn decode_page1(p: &[u8]) -> ConfigPage {
    let nickel = |chemistry: Chemistry,
                  fdv: usize,
                  cycles: usize,
                  forming: usize,
                  delay: usize,
                  cut_off: usize| ChemistryConfig {
        final_discharge_voltage: Some(volts(p, fdv)),
        cycle_count: Some(p[cycles]),
        cycle_forming: Some(p[forming]),
        delay: Some(p[delay]),
        charge_cut_off: Some(p[cut_off] as u16),
        ..ChemistryConfig::new(chemistry)
    };
    let simple = |chemistry: Chemistry, fdv: usize, delay: usize| ChemistryConfig {
        final_discharge_voltage: Some(volts(p, fdv)),
        delay: Some(p[delay]),
        ..ChemistryConfig::new(chemistry)
    };

    ConfigPage {
        kind: ConfigPageKind::Page1,
        entries: vec![
            nickel(Chemistry::NiCd, 1, 11, 13, 15, 20),
            nickel(Chemistry::NiMH, 3, 12, 14, 16, 21),
            simple(Chemistry::LiIon41, 5, 17),
            simple(Chemistry::LiPo42, 7, 17),
            simple(Chemistry::Pb, 9, 18),
        ],
        low_batt_cut_voltage: None,
        display: None,
    }
}

fn decode_page2(p: &[u8]) -> ConfigPage {
    let charge = |chemistry: Chemistry, at: usize| ChemistryConfig {
        loading_voltage: Some(volts(p, at)),
        trickle_voltage: Some(volts(p, at + 2)),
        ..ChemistryConfig::new(chemistry)
    };

    ConfigPage {
        kind: ConfigPageKind::Page2,
        entries: vec![
            charge(Chemistry::LiIon41, 9),
            charge(Chemistry::LiPo42, 13),
            charge(Chemistry::Pb, 17),
        ],
        low_batt_cut_voltage: Some(volts(p, 21)),
        display: None,
    }
}

fn decode_page3(p: &[u8]) -> ConfigPage {
    let lifepo4 = ChemistryConfig {
        charge_cut_off: Some(be_u16(p, 1)),
        delay: Some(p[3]),
        loading_voltage: Some(volts(p, 4)),
        ..ChemistryConfig::new(Chemistry::LiFePo4)
    };

    ConfigPage {
        kind: ConfigPageKind::Page3,
        entries: vec![lifepo4],
        low_batt_cut_voltage: None,
        display: Some(DisplayConfig::from_bytes(p[10], p[9])),
    }
}

fn decode_page4(p: &[u8]) -> ConfigPage {
    let storage = |chemistry: Chemistry, at: usize| ChemistryConfig {
        storage_voltage: Some(volts(p, at)),
        ..ChemistryConfig::new(chemistry)
    };

    ConfigPage {
        kind: ConfigPageKind::Page4,
        entries: vec![
            storage(Chemistry::LiIon41, 1),
            storage(Chemistry::LiPo42, 3),
            storage(Chemistry::LiFePo4, 5),
            storage(Chemistry::NiZn, 7),
        ],
        low_batt_cut_voltage: None,
        display: None,
    }
}

/// Decode any configuration page by its tag.
///
/// Returns `None` for other tags or payloads too short for the page.
pub fn decode_page(payload: &[u8]) -> Option<ConfigPage> {
    let kind = ConfigPageKind::from_tag(*payload.first()?)?;
    decode_config_page(kind, payload)
}

/// Decode a payload expected to be page `kind`.
pub fn decode_config_page(kind: ConfigPageKind, payload: &[u8]) -> Option<ConfigPage> {
    if payload.first() != Some(&kind.tag()) || payload.len() < kind.min_len() {
        return None;
    }
    Some(match kind {
        ConfigPageKind::Page0 => decode_page0(payload),
        ConfigPageKind::Page1 => decode_page1(payload),
        ConfigPageKind::Page2 => decode_page2(payload),
        ConfigPageKind::Page3 => decode_page3(payload),
        ConfigPageKind::Page4 => decode_page4(payload),
    })
}

/// Overwrite every field `from` carries
fn merge(into: &mut ChemistryConfig, from: &ChemistryConfig) {
    macro_rules! take {
        ($($field:ident),*) => {
            $(if from.$field.is_some() { into.$field = from.$field; })*
        };
    }
    take!(
        final_discharge_voltage,
        loading_voltage,
        trickle_voltage,
        storage_voltage,
        delay,
        cycle_count,
        cycle_forming,
        charge_cut_off
    );
}

/// Collects configuration pages into a complete [`DeviceConfiguration`].
///
/// Pages may arrive in any order; fields from a later page replace those
/// already set by an earlier one.
#[derive(Debug, Clone)]
pub struct ChemistryConfigBuilder {
    records: Vec<ChemistryConfig>,
    received: [bool; 5],
    low_batt_cut_voltage: Option<f64>,
    display: Option<DisplayConfig>,
}

impl Default for ChemistryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChemistryConfigBuilder {
    pub fn new() -> Self {
        ChemistryConfigBuilder {
            records: CONFIGURED_CHEMISTRIES
                .into_iter()
                .map(ChemistryConfig::new)
                .collect(),
            received: [false; 5],
            low_batt_cut_voltage: None,
            display: None,
        }
    }

    /// Merge one decoded page
    pub fn add_page(&mut self, page: ConfigPage) -> &mut Self {
        for entry in &page.entries {
            if let Some(record) = self
                .records
                .iter_mut()
                .find(|r| r.chemistry == entry.chemistry)
            {
                merge(record, entry);
            }
        }
        if page.low_batt_cut_voltage.is_some() {
            self.low_batt_cut_voltage = page.low_batt_cut_voltage;
        }
        if page.display.is_some() {
            self.display = page.display;
        }
        self.received[page.kind.index()] = true;
        self
    }

    /// Pages not yet supplied
    pub fn missing(&self) -> Vec<ConfigPageKind> {
        ConfigPageKind::ALL
            .into_iter()
            .filter(|kind| !self.received[kind.index()])
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.received.iter().all(|&r| r)
    }

    /// Finish the table; fails unless all five pages were added
    pub fn build(self) -> Result<DeviceConfiguration> {
        let missing = self.missing();
        match (self.low_batt_cut_voltage, self.display) {
            (Some(low_batt_cut_voltage), Some(display)) if missing.is_empty() => {
                Ok(DeviceConfiguration {
                    chemistries: self.records,
                    settings: DeviceSettings {
                        low_batt_cut_voltage,
                        display,
                    },
                })
            }
            _ => Err(Alc8500Error::MissingConfigPages(missing)),
        }
    }
}
