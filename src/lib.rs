//! Host-side bridge to the ESP32-S3 mask classifier.
//!
//! A request is one *exchange*: a 96x96 RGB frame goes out over the serial
//! link in fixed-size chunks and the board answers with a single
//! `M:<masked> S:<unmasked>` line, buried among its own log output.
//! [`serial::ProtocolBridge`] drives that exchange; [`device::DeviceSession`]
//! shares one bridge between async callers.

pub mod config;
pub mod device;
pub mod image_source;
pub mod serial;

pub use serial::{
    BridgeConfig, ClassificationResult, ClassificationSummary, ExchangeError, ExchangeOutcome, ImageBuffer,
    ImageShape, ProtocolBridge, SerialInterface,
};
