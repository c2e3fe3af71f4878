use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::serial::classifier::{DEFAULT_HEADER_ECHO_MARKER, DEFAULT_LOG_PREFIX};
use crate::serial::interface::BAUD_RATE;
use crate::serial::transmit::DEFAULT_CHUNK_SIZE;
use crate::serial::{BridgeConfig, ConnectionSettings, ImageShape};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SerialConfig {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_open_settle_ms")]
    pub open_settle_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Unset means the caller's own budget, see [`Config::response_timeout_or`].
    #[serde(default)]
    pub response_timeout_ms: Option<u64>,
    #[serde(default = "default_log_prefixes")]
    pub log_prefixes: Vec<String>,
    #[serde(default = "default_header_echo_marker")]
    pub header_echo_marker: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_width")]
    pub width: u16,
    #[serde(default = "default_height")]
    pub height: u16,
    #[serde(default = "default_channels")]
    pub channels: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            open_settle_ms: default_open_settle_ms(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            settle_delay_ms: default_settle_delay_ms(),
            response_timeout_ms: None,
            log_prefixes: default_log_prefixes(),
            header_echo_marker: default_header_echo_marker(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            channels: default_channels(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol.chunk_size == 0 {
            return Err(ConfigError::Invalid("protocol.chunk_size must be positive".into()));
        }
        if self.protocol.response_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid("protocol.response_timeout_ms must be positive".into()));
        }
        if self.serial.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid("serial.read_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            baud_rate: self.serial.baud_rate,
            read_timeout: Duration::from_millis(self.serial.read_timeout_ms),
            open_settle: Duration::from_millis(self.serial.open_settle_ms),
        }
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            chunk_size: self.protocol.chunk_size,
            settle_delay: Duration::from_millis(self.protocol.settle_delay_ms),
            response_timeout: self.response_timeout_or(Duration::from_millis(default_response_timeout_ms())),
            read_timeout: Duration::from_millis(self.serial.read_timeout_ms),
            log_prefixes: self.protocol.log_prefixes.clone(),
            header_echo_marker: self.protocol.header_echo_marker.clone(),
        }
    }

    /// Response budget from the file, or `fallback` when the file leaves it out.
    pub fn response_timeout_or(&self, fallback: Duration) -> Duration {
        self.protocol.response_timeout_ms.map_or(fallback, Duration::from_millis)
    }

    pub fn image_shape(&self) -> ImageShape {
        ImageShape::new(self.image.width, self.image.height, self.image.channels)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_port() -> String {
    if cfg!(windows) { "COM5".into() } else { "/dev/ttyACM0".into() }
}
fn default_baud_rate() -> u32 {
    BAUD_RATE
}
fn default_read_timeout_ms() -> u64 {
    1000
}
fn default_open_settle_ms() -> u64 {
    2000
}
fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_settle_delay_ms() -> u64 {
    50
}
fn default_response_timeout_ms() -> u64 {
    5000
}
fn default_log_prefixes() -> Vec<String> {
    vec![DEFAULT_LOG_PREFIX.into()]
}
fn default_header_echo_marker() -> String {
    DEFAULT_HEADER_ECHO_MARKER.into()
}
fn default_width() -> u16 {
    96
}
fn default_height() -> u16 {
    96
}
fn default_channels() -> u8 {
    3
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.protocol.chunk_size, 1024);
        assert_eq!(config.image_shape(), ImageShape::new(96, 96, 3));
        assert_eq!(config.logging.level, "info");

        let bridge = config.bridge_config();
        assert_eq!(bridge.response_timeout, Duration::from_secs(5));
        assert_eq!(bridge.settle_delay, Duration::from_millis(50));
        assert_eq!(bridge.log_prefixes, vec!["I (".to_string()]);
        assert_eq!(bridge.header_echo_marker, "Cabeçalho");
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
            [serial]
            port = "/dev/ttyUSB1"
            open_settle_ms = 0

            [protocol]
            response_timeout_ms = 20000
            log_prefixes = ["I (", "W ("]
            "#,
        )
        .unwrap();

        assert_eq!(config.serial.port, "/dev/ttyUSB1");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.connection_settings().open_settle, Duration::ZERO);
        assert_eq!(config.bridge_config().response_timeout, Duration::from_secs(20));
        assert_eq!(config.protocol.log_prefixes.len(), 2);
        assert_eq!(config.protocol.chunk_size, 1024);
    }

    #[test]
    fn test_unset_response_timeout_falls_back() {
        let config = Config::parse("[serial]\nport = \"/dev/ttyUSB0\"\n").unwrap();
        assert_eq!(config.protocol.response_timeout_ms, None);
        assert_eq!(config.response_timeout_or(Duration::from_secs(20)), Duration::from_secs(20));

        let config = Config::parse("[protocol]\nresponse_timeout_ms = 750\n").unwrap();
        assert_eq!(config.response_timeout_or(Duration::from_secs(20)), Duration::from_millis(750));
    }

    #[test]
    fn test_rejects_zero_response_timeout() {
        let err = Config::parse("[protocol]\nresponse_timeout_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        let err = Config::parse("[protocol]\nchunk_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_bad_toml() {
        assert!(matches!(Config::parse("[serial\nport = 1"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/mask-bridge.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile(_, _)));
    }
}
