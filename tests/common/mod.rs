#![allow(dead_code)]

use std::time::Duration;

use mask_bridge_lib::serial::{BridgeConfig, ProtocolBridge, ScriptedLink, SerialInterface};

/// Bridge over `link` with delays shrunk so timeouts resolve quickly.
pub fn bridge_over(link: &ScriptedLink, response_timeout_ms: u64) -> ProtocolBridge {
    let config = BridgeConfig {
        settle_delay: Duration::ZERO,
        response_timeout: Duration::from_millis(response_timeout_ms),
        read_timeout: Duration::from_millis(10),
        ..BridgeConfig::default()
    };
    ProtocolBridge::new(SerialInterface::from_link(Box::new(link.clone())), config)
}

pub fn model_pixels() -> Vec<u8> {
    (0..96 * 96 * 3).map(|i| (i % 251) as u8).collect()
}
