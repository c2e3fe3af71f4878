pub mod bridge;
pub mod classifier;
pub mod frame;
pub mod interface;
pub mod lines;
pub mod link;
pub mod scripted;
pub mod transmit;
pub mod types;

pub use bridge::{BridgeConfig, ProtocolBridge};
pub use classifier::{LineKind, MalformedResult, ResponseClassifier};
pub use frame::{FrameError, ImageBuffer, ImageShape};
pub use interface::{ConnectionSettings, SerialInterface};
pub use link::SerialLink;
pub use scripted::ScriptedLink;
pub use transmit::{TransmissionProgress, TransmitError};
pub use types::{ClassificationResult, ClassificationSummary, ExchangeOutcome};

use serde::{Deserialize, Serialize};
use serialport::SerialPortType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialDeviceInfo {
    pub port_name: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl SerialDeviceInfo {
    pub fn from_port(port_name: &str, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb_info) => Self {
                port_name: port_name.to_string(),
                vid: Some(usb_info.vid),
                pid: Some(usb_info.pid),
                serial_number: usb_info.serial_number.clone(),
                manufacturer: usb_info.manufacturer.clone(),
                product: usb_info.product.clone(),
            },
            _ => Self {
                port_name: port_name.to_string(),
                vid: None,
                pid: None,
                serial_number: None,
                manufacturer: None,
                product: None,
            },
        }
    }

    /// The ESP32-S3's built-in USB Serial/JTAG port.
    pub fn is_usb_serial_jtag(&self) -> bool {
        self.vid == Some(interface::ESPRESSIF_VID) && self.pid == Some(interface::USB_SERIAL_JTAG_PID)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialport error: {0}")]
    SerialportError(#[from] serialport::Error),
}

pub type Result<T> = std::result::Result<T, SerialError>;

/// Everything that can end an exchange without a result.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error(transparent)]
    InvalidBufferShape(#[from] FrameError),

    #[error("Serial stream unavailable: {0}")]
    StreamUnavailable(String),

    #[error("Transmission failed: {0}")]
    Transmission(#[from] TransmitError),

    #[error("No result line from the board in time (last line: {})", .last_line.as_deref().unwrap_or("<none>"))]
    Timeout { last_line: Option<String> },

    #[error(transparent)]
    MalformedResult(#[from] MalformedResult),

    #[error("Serial read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Exchange aborted: {0}")]
    Aborted(String),
}
