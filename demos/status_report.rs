//! Status Report Example
//!
//! Reads everything the charger exposes and prints it, then dumps the
//! structured report as JSON:
//! - Automatic charger discovery, interactive port selection, or a
//!   command-line argument
//! - Firmware, temperatures and chemistry configuration
//! - Per-channel status, measurement and parameters
//! - Stored battery database
//!
//! Usage:
//!   cargo run --example status_report              # Auto-detect / interactive
//!   cargo run --example status_report -- COM3      # Specify port
//!   cargo run --example status_report -- /dev/ttyUSB0
//!
//! Set RUST_LOG environment variable to control logging:
//!   RUST_LOG=debug cargo run --example status_report

use alc8500_protocol::{Alc8500, Result, SensorReading};
use inquire::Select;
use log::{error, info};
use serialport::{SerialPortInfo, SerialPortType};

/// Label for a port in the picker, with the USB product string if any
fn describe(port: &SerialPortInfo) -> String {
    match &port.port_type {
        SerialPortType::UsbPort(usb) => format!(
            "{} - USB {}",
            port.port_name,
            usb.product.as_deref().unwrap_or("unknown device")
        ),
        other => format!("{} - {:?}", port.port_name, other),
    }
}

/// Let the user pick a port, chargers listed first
fn select_port() -> Result<String> {
    let mut ports = Alc8500::list_ports()?;
    if ports.is_empty() {
        eprintln!("No serial ports found!");
        std::process::exit(1);
    }
    ports.sort_by_key(|port| !Alc8500::is_charger_port(port));

    let labels: Vec<String> = ports.iter().map(describe).collect();
    let selection = Select::new("Select the ALC8500 port:", labels.clone())
        .prompt()
        .map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Selection cancelled: {}", e),
            )
        })?;

    let index = labels.iter().position(|l| *l == selection).unwrap_or_default();
    Ok(ports[index].port_name.clone())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let port_name = match std::env::args().nth(1) {
        Some(name) => name,
        None => Alc8500::find_port().or_else(|_| select_port())?,
    };

    info!("Connecting to ALC8500 on {}...", port_name);
    let mut alc = Alc8500::new(&port_name)?;

    let report = match alc.status_report() {
        Ok(report) => report,
        Err(e) => {
            error!("Failed to read charger status: {}", e);
            error!("Check that the charger is switched on and the USB cable is connected");
            return Err(e);
        }
    };

    info!("=== ALC8500 Status Report ===");
    if let Some(fw) = &report.firmware {
        info!("Firmware: {}  Serial: {}", fw.fw_version, fw.serial);
    }
    if let Some(t) = &report.temperatures {
        match t.sensor {
            SensorReading::Celsius(c) => info!("Sensor: {:.2}°C", c),
            SensorReading::NotConnected => info!("Sensor: n.c."),
        }
        info!("Power supply: {:.2}°C  Cooler: {:.2}°C", t.power, t.cooler);
    }
    if let Some(config) = &report.configuration {
        info!(
            "Low battery cutoff: {:.3}V  Display: {}",
            config.settings.low_batt_cut_voltage,
            config.settings.display.description()
        );
        for chem in &config.chemistries {
            info!(
                "{:<11} discharge {:?}V  load {:?}V  trickle {:?}V  storage {:?}V",
                chem.chemistry.label(),
                chem.final_discharge_voltage,
                chem.loading_voltage,
                chem.trickle_voltage,
                chem.storage_voltage
            );
        }
    }

    for snapshot in &report.channels {
        let state = snapshot
            .status
            .map(|s| s.state.label())
            .unwrap_or("no data");
        match snapshot.measurement {
            Some(m) => info!(
                "Channel {}: {:<14} {:.3}V {:.1}mA {:.1}mAh",
                snapshot.channel, state, m.voltage, m.current_ma, m.capacity_mah
            ),
            None => info!("Channel {}: {}", snapshot.channel, state),
        }
    }

    info!("=== Battery Database ===");
    for profile in alc.battery_database()? {
        info!(
            "{:02} {:<9} {:<10} {} cells {:.0}mAh",
            profile.slot,
            profile.name.trim_end(),
            profile.chemistry.label(),
            profile.cells,
            profile.capacity_mah
        );
    }

    if let Ok(json) = serde_json::to_string_pretty(&report) {
        info!("JSON Export:");
        info!("{}", json);
    }

    Ok(())
}
