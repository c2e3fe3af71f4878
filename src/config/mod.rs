pub mod settings;

pub use settings::{Config, ConfigError, ImageConfig, LoggingConfig, ProtocolConfig, SerialConfig};
