use std::time::Duration;
use serialport::SerialPortType;

use super::link::SerialLink;
use super::{Result, SerialError, SerialDeviceInfo};

// Espressif USB identifiers (ESP32-S3 built-in USB Serial/JTAG)
pub const ESPRESSIF_VID: u16 = 0x303A;
pub const USB_SERIAL_JTAG_PID: u16 = 0x1001;
pub const BAUD_RATE: u32 = 115200;

/// How a port is opened.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub baud_rate: u32,
    /// Upper bound for a single blocking read.
    pub read_timeout: Duration,
    /// Opening the port resets the board; wait this long before talking to it.
    pub open_settle: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            baud_rate: BAUD_RATE,
            read_timeout: Duration::from_millis(1000),
            open_settle: Duration::from_millis(2000),
        }
    }
}

pub struct SerialInterface {
    link: Option<Box<dyn SerialLink>>,
    device_info: Option<SerialDeviceInfo>,
}

impl SerialInterface {
    pub fn new() -> Self {
        Self {
            link: None,
            device_info: None,
        }
    }

    /// Wrap an already open link (a port opened elsewhere, or a test double).
    pub fn from_link(link: Box<dyn SerialLink>) -> Self {
        Self {
            link: Some(link),
            device_info: None,
        }
    }

    /// List USB serial ports that belong to Espressif boards
    pub fn discover_devices() -> Result<Vec<SerialDeviceInfo>> {
        let ports = serialport::available_ports()?;
        let mut devices = ports
            .into_iter()
            .map(|port| SerialDeviceInfo::from_port(&port.port_name, &port.port_type))
            .filter(|device| device.vid == Some(ESPRESSIF_VID))
            .collect::<Vec<_>>();
        // Built-in USB Serial/JTAG ports first, then external USB-UART bridges
        devices.sort_by_key(|device| !device.is_usb_serial_jtag());
        Ok(devices)
    }

    /// Open `port_name` and wait for the board to come out of reset
    pub fn connect(&mut self, port_name: &str, settings: &ConnectionSettings) -> Result<()> {
        let port = serialport::new(port_name, settings.baud_rate)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice
                | serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                    SerialError::PortNotFound(port_name.to_string())
                }
                _ => SerialError::ConnectionFailed(format!("{}: {}", port_name, e)),
            })?;

        // Not every adapter shows up in the port list (e.g. pseudo terminals)
        let device_info = serialport::available_ports()
            .ok()
            .and_then(|ports| ports.into_iter().find(|p| p.port_name == port_name))
            .map(|p| SerialDeviceInfo::from_port(&p.port_name, &p.port_type))
            .unwrap_or_else(|| SerialDeviceInfo::from_port(port_name, &SerialPortType::Unknown));

        if !settings.open_settle.is_zero() {
            log::debug!("Waiting {:?} for the board on {} to boot", settings.open_settle, port_name);
            std::thread::sleep(settings.open_settle);
        }

        self.link = Some(Box::new(port));
        self.device_info = Some(device_info);

        log::info!("Connected to board on {} at {} baud", port_name, settings.baud_rate);
        Ok(())
    }

    /// Disconnect from the current device
    pub fn disconnect(&mut self) {
        if let Some(device) = &self.device_info {
            log::info!("Disconnecting from {}", device.port_name);
        }
        self.link = None;
        self.device_info = None;
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn device_info(&self) -> Option<&SerialDeviceInfo> {
        self.device_info.as_ref()
    }

    pub fn link_mut(&mut self) -> Result<&mut dyn SerialLink> {
        match self.link.as_mut() {
            Some(link) => Ok(link.as_mut()),
            None => Err(SerialError::NotConnected),
        }
    }
}

impl Default for SerialInterface {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::ScriptedLink;

    #[test]
    fn test_new_interface_is_disconnected() {
        let mut interface = SerialInterface::new();
        assert!(!interface.is_connected());
        assert!(interface.device_info().is_none());
        assert!(matches!(interface.link_mut(), Err(SerialError::NotConnected)));
    }

    #[test]
    fn test_from_link_and_disconnect() {
        let mut interface = SerialInterface::from_link(Box::new(ScriptedLink::new()));
        assert!(interface.is_connected());
        assert!(interface.link_mut().is_ok());

        interface.disconnect();
        assert!(!interface.is_connected());
    }

    #[test]
    fn test_connect_to_missing_port_fails() {
        let mut interface = SerialInterface::new();
        let settings = ConnectionSettings { open_settle: Duration::ZERO, ..Default::default() };
        let err = interface.connect("/dev/does-not-exist-mask-bridge", &settings).unwrap_err();
        assert!(matches!(err, SerialError::PortNotFound(_) | SerialError::ConnectionFailed(_)));
        assert!(!interface.is_connected());
    }

    #[test]
    fn test_usb_serial_jtag_detection() {
        let usb = |vid, pid| SerialPortType::UsbPort(serialport::UsbPortInfo {
            vid,
            pid,
            serial_number: None,
            manufacturer: Some("Espressif".into()),
            product: None,
        });
        assert!(SerialDeviceInfo::from_port("/dev/ttyACM0", &usb(ESPRESSIF_VID, USB_SERIAL_JTAG_PID)).is_usb_serial_jtag());
        assert!(!SerialDeviceInfo::from_port("/dev/ttyUSB0", &usb(ESPRESSIF_VID, 0x1002)).is_usb_serial_jtag());
        assert!(!SerialDeviceInfo::from_port("/dev/ttyS0", &SerialPortType::Unknown).is_usb_serial_jtag());
    }
}
