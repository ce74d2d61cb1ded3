use crate::chemistry::{decode_config_page, ChemistryConfigBuilder, ConfigPage, ConfigPageKind};
use crate::constants::*;
use crate::decode::Reply;
use crate::error::{Alc8500Error, Result};
use crate::log_index;
use crate::transport::{ByteStream, Request, Transport, TransportConfig};
use crate::types::*;
use chrono::Utc;
use log::{debug, info, warn};
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::time::Duration;

/// Main ALC 8500 protocol interface
pub struct Alc8500<S: ByteStream = Box<dyn SerialPort>> {
    transport: Transport<S>,
    port_name: String,
}

impl Alc8500 {
    /// Open the charger on the given serial port
    pub fn new(port_name: &str) -> Result<Self> {
        Self::with_config(port_name, TransportConfig::default())
    }

    /// Open the charger with custom transport settings
    pub fn with_config(port_name: &str, config: TransportConfig) -> Result<Self> {
        let port = serialport::new(port_name, BAUD_RATE)
            .parity(PARITY)
            .flow_control(FLOW_CONTROL)
            .timeout(Duration::from_millis(PORT_TIMEOUT_MS))
            .open()?;

        info!("Opened {} at {} baud", port_name, BAUD_RATE);
        let mut alc = Alc8500::from_stream(port, config);
        alc.port_name = port_name.to_string();
        Ok(alc)
    }

    /// Find the charger and open it
    pub fn connect() -> Result<Self> {
        let port_name = Self::find_port()?;
        Self::new(&port_name)
    }

    /// List available serial ports
    pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
        Ok(serialport::available_ports()?)
    }

    /// Whether a port is a USB serial port reporting an ALC 8500
    pub fn is_charger_port(port: &SerialPortInfo) -> bool {
        match &port.port_type {
            SerialPortType::UsbPort(usb) => usb
                .product
                .as_deref()
                .is_some_and(|product| product.contains(USB_PRODUCT)),
            _ => false,
        }
    }

    /// Name of the first USB serial port reporting an ALC 8500
    pub fn find_port() -> Result<String> {
        Self::list_ports()?
            .into_iter()
            .find(Self::is_charger_port)
            .map(|port| port.port_name)
            .ok_or(Alc8500Error::DeviceNotFound)
    }
}

impl<S: ByteStream> Alc8500<S> {
    /// Drive the charger over an already open stream
    pub fn from_stream(stream: S, config: TransportConfig) -> Self {
        Alc8500 {
            transport: Transport::new(stream, config),
            port_name: String::new(),
        }
    }

    /// Port the session was opened on, empty for a supplied stream
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Access the command transport
    pub fn transport_mut(&mut self) -> &mut Transport<S> {
        &mut self.transport
    }

    /// Send a request and return the raw reply payload
    pub fn send(&mut self, request: &Request) -> Result<Vec<u8>> {
        self.transport.send(request)
    }

    /// Send a request and decode the reply by its tag
    pub fn query(&mut self, request: &Request) -> Result<Reply> {
        let payload = self.transport.send(request)?;
        Ok(Reply::decode(&payload))
    }

    fn no_data<T>(opcode: u8, reply: &Reply) -> Result<Option<T>> {
        warn!(
            "No data for command {:#04x}: got {} reply",
            opcode,
            reply.kind()
        );
        Ok(None)
    }

    /// Firmware version and serial number
    pub fn firmware(&mut self) -> Result<Option<FirmwareInfo>> {
        match self.query(&Request::new(GET_FW))? {
            Reply::Firmware(info) => Ok(Some(info)),
            other => Self::no_data(GET_FW, &other),
        }
    }

    /// External sensor, power supply and cooler temperatures
    pub fn temperatures(&mut self) -> Result<Option<Temperatures>> {
        match self.query(&Request::new(GET_TEMP))? {
            Reply::Temperatures(t) => Ok(Some(t)),
            other => Self::no_data(GET_TEMP, &other),
        }
    }

    /// One battery database slot; `None` when the slot is empty
    pub fn battery_profile(&mut self, slot: u8) -> Result<Option<BatteryProfile>> {
        if slot >= DB_SLOTS {
            return Err(Alc8500Error::InvalidSlot(slot));
        }
        match self.query(&Request::new(GET_DB_REC).arg(slot))? {
            Reply::BatteryProfile(profile) => Ok(Some(profile)),
            Reply::EmptySlot { .. } => Ok(None),
            other => Self::no_data(GET_DB_REC, &other),
        }
    }

    /// Every stored battery profile, skipping empty slots
    pub fn battery_database(&mut self) -> Result<Vec<BatteryProfile>> {
        let mut profiles = Vec::new();
        for slot in 0..DB_SLOTS {
            if let Some(profile) = self.battery_profile(slot)? {
                profiles.push(profile);
            }
        }
        debug!("Read {} battery profiles", profiles.len());
        Ok(profiles)
    }

    /// Read one configuration page
    pub fn config_page(&mut self, kind: ConfigPageKind) -> Result<Option<ConfigPage>> {
        let payload = self.send(&Request::new(kind.opcode()))?;
        match decode_config_page(kind, &payload) {
            Some(page) => Ok(Some(page)),
            None => Self::no_data(kind.opcode(), &Reply::decode(&payload)),
        }
    }

    /// Chemistry table and device settings from all five configuration
    /// pages
    pub fn configuration(&mut self) -> Result<DeviceConfiguration> {
        let mut builder = ChemistryConfigBuilder::new();
        for kind in ConfigPageKind::ALL {
            if let Some(page) = self.config_page(kind)? {
                builder.add_page(page);
            }
        }
        builder.build()
    }

    /// Parameters a channel is programmed with
    pub fn channel_parameters(&mut self, channel: u8) -> Result<Option<ChannelParameters>> {
        let channel = Channel::new(channel)?;
        match self.query(&Request::new(GET_CH_PARAM).arg(channel.wire()))? {
            Reply::ChannelParameters(params) => Ok(Some(params)),
            other => Self::no_data(GET_CH_PARAM, &other),
        }
    }

    /// Last measurement values of a channel
    pub fn channel_measurement(&mut self, channel: u8) -> Result<Option<ChannelMeasurement>> {
        let channel = Channel::new(channel)?;
        match self.query(&Request::new(GET_CH_MEASURE).arg(channel.wire()))? {
            Reply::ChannelMeasurement(m) => Ok(Some(m)),
            other => Self::no_data(GET_CH_MEASURE, &other),
        }
    }

    /// What a channel is currently doing
    pub fn channel_status(&mut self, channel: u8) -> Result<Option<ChannelStatus>> {
        let channel = Channel::new(channel)?;
        match self.query(&Request::new(GET_CH_FUN).arg(channel.wire()))? {
            Reply::ChannelStatus(status) => Ok(Some(status)),
            other => Self::no_data(GET_CH_FUN, &other),
        }
    }

    /// Chronologically ordered log blocks of a channel
    pub fn log_index(&mut self, channel: u8) -> Result<Option<LogIndex>> {
        let channel = Channel::new(channel)?;
        match self.query(&Request::new(GET_LOG_IDX).arg(channel.wire()))? {
            Reply::LogIndex { addresses, .. } => {
                log_index::reconstruct(channel.number(), &addresses).map(Some)
            }
            other => Self::no_data(GET_LOG_IDX, &other),
        }
    }

    /// Raw contents of a logging block (0..=650)
    pub fn log_block(&mut self, channel: u8, block: u16) -> Result<Option<Vec<u8>>> {
        let channel = Channel::new(channel)?;
        if block > MAX_LOG_BLOCK {
            return Err(Alc8500Error::InvalidLogBlock(block));
        }
        let request = Request::new(GET_LOG_BLK)
            .arg(channel.wire())
            .arg(block.to_be_bytes());
        self.raw_reply(&request)
    }

    /// Raw battery and function data of the log entry at `address`
    pub fn log_entry(&mut self, channel: u8, address: u16) -> Result<Option<Vec<u8>>> {
        let channel = Channel::new(channel)?;
        let request = Request::new(GET_CH_LOG).arg(channel.wire()).arg(address);
        self.raw_reply(&request)
    }

    /// Reply payload if it is tagged with the request's opcode
    fn raw_reply(&mut self, request: &Request) -> Result<Option<Vec<u8>>> {
        let payload = self.send(request)?;
        if payload.first() == Some(&request.opcode()) {
            Ok(Some(payload))
        } else {
            Self::no_data(request.opcode(), &Reply::decode(&payload))
        }
    }

    /// Start the programmed function on a channel, then read its status
    pub fn start_channel(&mut self, channel: u8) -> Result<Option<ChannelStatus>> {
        self.set_channel_function(channel, CH_FUN_START)
    }

    /// Stop the running function on a channel, then read its status
    pub fn stop_channel(&mut self, channel: u8) -> Result<Option<ChannelStatus>> {
        self.set_channel_function(channel, CH_FUN_STOP)
    }

    fn set_channel_function(&mut self, channel: u8, function: u8) -> Result<Option<ChannelStatus>> {
        let ch = Channel::new(channel)?;
        info!("Setting channel {} function to {}", ch, function);
        self.send(&Request::new(SET_CH_FUN).arg(ch.wire()).arg(function))?;
        self.channel_status(channel)
    }

    /// Read firmware, temperatures, configuration and every channel
    pub fn status_report(&mut self) -> Result<StatusReport> {
        let firmware = self.firmware()?;
        let temperatures = self.temperatures()?;
        let configuration = match self.configuration() {
            Ok(config) => Some(config),
            Err(Alc8500Error::MissingConfigPages(missing)) => {
                warn!("Configuration incomplete, missing {:?}", missing);
                None
            }
            Err(e) => return Err(e),
        };

        let mut channels = Vec::new();
        for channel in Channel::all() {
            let n = channel.number();
            channels.push(ChannelSnapshot {
                channel: n,
                status: self.channel_status(n)?,
                measurement: self.channel_measurement(n)?,
                parameters: self.channel_parameters(n)?,
            });
        }

        Ok(StatusReport {
            timestamp: Utc::now(),
            usb_port: self.port_name.clone(),
            firmware,
            temperatures,
            configuration,
            channels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chemistry::tests::{page0, page1, page2, page3, page4};
    use crate::frame;
    use crate::mock_serial::MockSerial;

    fn session() -> Alc8500<MockSerial> {
        let config = TransportConfig {
            poll_interval: Duration::from_millis(1),
            timeout: Some(Duration::from_millis(100)),
        };
        Alc8500::from_stream(MockSerial::new(), config)
    }

    fn mock(alc: &mut Alc8500<MockSerial>) -> &mut MockSerial {
        alc.transport_mut().stream_mut()
    }

    fn profile(slot: u8, chemistry: u8) -> Vec<u8> {
        let mut p = vec![b'd', slot];
        p.extend_from_slice(b"Pack     ");
        p.extend_from_slice(&[chemistry, 3]);
        p.extend_from_slice(&250_000i32.to_be_bytes());
        p.extend_from_slice(&[0x03, 0xE8, 0x07, 0xD0, 0x02, 0x58, 0x00, 100, 0x00]);
        p
    }

    fn usb_port(name: &str, product: Option<&str>) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::UsbPort(serialport::UsbPortInfo {
                vid: 0x18EF,
                pid: 0xE00F,
                serial_number: None,
                manufacturer: Some("ELV".to_string()),
                product: product.map(str::to_string),
            }),
        }
    }

    #[test]
    fn test_charger_port_matches_usb_product() {
        assert!(Alc8500::is_charger_port(&usb_port(
            "/dev/ttyUSB0",
            Some("ALC8500 Expert")
        )));
        assert!(!Alc8500::is_charger_port(&usb_port("/dev/ttyUSB1", Some("FT232R"))));
        assert!(!Alc8500::is_charger_port(&usb_port("/dev/ttyUSB2", None)));
        assert!(!Alc8500::is_charger_port(&SerialPortInfo {
            port_name: "/dev/ttyS0".to_string(),
            port_type: SerialPortType::Unknown,
        }));
    }

    #[test]
    fn test_invalid_channel_sends_nothing() {
        let mut alc = session();
        for channel in [0u8, 5] {
            assert!(matches!(
                alc.channel_status(channel),
                Err(Alc8500Error::InvalidChannel(c)) if c == channel
            ));
            assert!(alc.channel_measurement(channel).is_err());
            assert!(alc.channel_parameters(channel).is_err());
            assert!(alc.log_index(channel).is_err());
            assert!(alc.stop_channel(channel).is_err());
        }
        assert!(mock(&mut alc).written().is_empty());
    }

    #[test]
    fn test_channel_is_sent_zero_based() {
        let mut alc = session();
        for channel in 1..=4u8 {
            mock(&mut alc).queue_reply(&[b'a', channel - 1, 0x2F]);
            let status = alc.channel_status(channel).unwrap().unwrap();
            assert_eq!(status.channel, channel);
            assert_eq!(status.state, ChannelState::Discharge);
        }
        assert_eq!(
            mock(&mut alc).requests(),
            vec![vec![0x61, 0x00], vec![0x61, 0x01], vec![0x61, 0x02], vec![0x61, 0x03]]
        );
    }

    #[test]
    fn test_wrong_tag_is_no_data() {
        let mut alc = session();
        let mut p = vec![b'u'];
        p.extend_from_slice(&[0x09, 0xC4, 0x09, 0xC4, 0x09, 0xC4]);
        mock(&mut alc).queue_reply(&p);
        assert_eq!(alc.temperatures().unwrap(), None);
    }

    #[test]
    fn test_session_stays_in_step_after_timeout() {
        let mut alc = session();
        let late = frame::encode(&[b't', 0x09, 0xC4, 0x09, 0xC4, 0x09, 0xC4]);
        mock(&mut alc).queue_chunk(&late[..4]);
        assert!(matches!(
            alc.temperatures(),
            Err(Alc8500Error::Timeout { received: 4, .. })
        ));

        mock(&mut alc).receive_now(&late[4..]);
        mock(&mut alc).queue_reply(&[b'a', 0x00, 0x2F]);
        mock(&mut alc).queue_reply(&[b'm', 0x00, 0x04, 0xB0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

        let status = alc.channel_status(1).unwrap().unwrap();
        assert_eq!(status.state, ChannelState::Discharge);
        let measurement = alc.channel_measurement(1).unwrap().unwrap();
        assert_eq!(measurement.voltage, 1.2);
        assert_eq!(mock(&mut alc).pending(), 0);
    }

    #[test]
    fn test_battery_database_skips_empty_slots() {
        let mut alc = session();
        for slot in 0..DB_SLOTS {
            let chemistry = if slot % 10 == 0 { 1 } else { EMPTY_SLOT };
            mock(&mut alc).queue_reply(&profile(slot, chemistry));
        }

        let profiles = alc.battery_database().unwrap();
        assert_eq!(
            profiles.iter().map(|p| p.slot).collect::<Vec<_>>(),
            vec![0, 10, 20, 30]
        );
        assert!(profiles.iter().all(|p| p.capacity_mah == 25.0));
        assert_eq!(profiles[0].discharge_ma, 100.0);
        assert_eq!(profiles[0].charge_ma, 200.0);
        assert_eq!(profiles[0].delay_minutes, 10.0);
        assert_eq!(mock(&mut alc).requests().len(), 40);
    }

    #[test]
    fn test_battery_profile_slot_range() {
        let mut alc = session();
        assert!(matches!(
            alc.battery_profile(40),
            Err(Alc8500Error::InvalidSlot(40))
        ));
        assert!(mock(&mut alc).written().is_empty());
    }

    #[test]
    fn test_configuration_requests_all_pages() {
        let mut alc = session();
        for page in [page0(), page1(), page2(), page3(), page4()] {
            mock(&mut alc).queue_reply(&page);
        }

        let config = alc.configuration().unwrap();
        assert_eq!(config.chemistries.len(), 8);
        assert_eq!(config.settings.display.description(), "On,ALBEEP_EN");
        assert_eq!(
            mock(&mut alc).requests(),
            vec![vec![0x65], vec![0x67], vec![0x68], vec![0x6A], vec![0x7A]]
        );
    }

    #[test]
    fn test_configuration_with_bad_page_fails() {
        let mut alc = session();
        let mut bad = page2();
        bad[0] = b'x';
        for page in [page0(), page1(), bad, page3(), page4()] {
            mock(&mut alc).queue_reply(&page);
        }

        match alc.configuration() {
            Err(Alc8500Error::MissingConfigPages(missing)) => {
                assert_eq!(missing, vec![ConfigPageKind::Page2])
            }
            other => panic!("expected missing page, got {:?}", other),
        }
    }

    #[test]
    fn test_log_index_reconstructed() {
        let mut alc = session();
        let ring: [u16; 12] = [1000, 800, 900, 1000, 1100, 100, 200, 300, 400, 500, 600, 700];
        let mut p = vec![b'i', 0x01];
        for addr in ring {
            p.extend_from_slice(&addr.to_be_bytes());
        }
        mock(&mut alc).queue_reply(&p);

        let index = alc.log_index(2).unwrap().unwrap();
        assert_eq!(index.channel, 2);
        assert_eq!(index.addresses[0], 100);
        assert_eq!(index.blocks.len(), 10);
        assert_eq!(mock(&mut alc).requests(), vec![vec![0x69, 0x01]]);
    }

    #[test]
    fn test_log_block_request() {
        let mut alc = session();
        mock(&mut alc).queue_reply(&[b'v', 0x00, 0xAA, 0xBB]);

        let raw = alc.log_block(1, 3).unwrap();
        assert_eq!(raw, Some(vec![b'v', 0x00, 0xAA, 0xBB]));
        assert_eq!(mock(&mut alc).requests(), vec![vec![0x76, 0x00, 0x00, 0x03]]);

        assert!(matches!(
            alc.log_block(1, 651),
            Err(Alc8500Error::InvalidLogBlock(651))
        ));
    }

    #[test]
    fn test_log_entry_request() {
        let mut alc = session();
        mock(&mut alc).queue_reply(&[b'b', 0x02, 0x10]);

        let raw = alc.log_entry(3, 0x0400).unwrap();
        assert_eq!(raw, Some(vec![b'b', 0x02, 0x10]));
        assert_eq!(mock(&mut alc).requests(), vec![vec![0x62, 0x02, 0x04, 0x00]]);
    }

    #[test]
    fn test_stop_channel_then_reads_status() {
        let mut alc = session();
        mock(&mut alc).queue_reply(&[b'A', 0x00]);
        mock(&mut alc).queue_reply(&[b'a', 0x00, 0x00]);

        let status = alc.stop_channel(1).unwrap().unwrap();
        assert_eq!(status.state, ChannelState::Idle);
        assert_eq!(
            mock(&mut alc).requests(),
            vec![vec![0x41, 0x00, 0x01], vec![0x61, 0x00]]
        );
    }

    #[test]
    fn test_start_channel_argument() {
        let mut alc = session();
        mock(&mut alc).queue_reply(&[b'A', 0x03]);
        mock(&mut alc).queue_reply(&[b'a', 0x03, 0x50]);

        let status = alc.start_channel(4).unwrap().unwrap();
        assert_eq!(status.state, ChannelState::Charge);
        assert_eq!(mock(&mut alc).requests()[0], vec![0x41, 0x03, 0x00]);
    }

    #[test]
    fn test_status_report() {
        let mut alc = session();
        let m = mock(&mut alc);

        let mut fw = vec![b'u', 0x68];
        fw.extend_from_slice(b"   V2.05");
        fw.extend_from_slice(&[0xFF, 0xFF]);
        fw.extend_from_slice(b"0123456789");
        m.queue_reply(&fw);
        m.queue_reply(&[b't', 0xAB, 0xAB, 0x09, 0xC4, 0x09, 0xC4]);
        for page in [page0(), page1(), page2(), page3(), page4()] {
            m.queue_reply(&page);
        }
        for ch in 0..4u8 {
            m.queue_reply(&[b'a', ch, 0x00]);
            m.queue_reply(&[b'm', ch, 0x04, 0xB0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
            // Truncated parameters reply
            m.queue_reply(&[b'p', ch]);
        }

        let report = alc.status_report().unwrap();
        assert_eq!(report.firmware.as_ref().unwrap().fw_version, "V2.05");
        assert_eq!(
            report.temperatures.unwrap().sensor,
            SensorReading::NotConnected
        );
        assert!(report.configuration.is_some());
        assert_eq!(report.channels.len(), 4);
        for (i, snapshot) in report.channels.iter().enumerate() {
            assert_eq!(snapshot.channel as usize, i + 1);
            assert_eq!(snapshot.measurement.unwrap().voltage, 1.2);
            assert!(snapshot.parameters.is_none());
        }
        assert_eq!(mock(&mut alc).pending(), 0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["channels"][0]["status"]["state"], "Idle");
    }
}
