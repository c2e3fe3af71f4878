use std::sync::Arc;
use tokio::sync::Mutex;

use crate::serial::{
    ConnectionSettings, ExchangeError, ExchangeOutcome, ImageBuffer, ProtocolBridge, SerialDeviceInfo,
};
use super::{DeviceError, Result};

/// Shared handle to one board for async callers (e.g. an HTTP front end).
///
/// The bridge itself has no locking; this wrapper holds the lock for the
/// whole exchange so frames and replies from different requests never
/// interleave on the wire. Blocking serial I/O runs on the blocking pool.
#[derive(Clone)]
pub struct DeviceSession {
    bridge: Arc<Mutex<ProtocolBridge>>,
}

impl DeviceSession {
    pub fn new(bridge: ProtocolBridge) -> Self {
        Self {
            bridge: Arc::new(Mutex::new(bridge)),
        }
    }

    /// Open `port_name`, replacing any current connection
    pub async fn connect(&self, port_name: &str, settings: &ConnectionSettings) -> Result<()> {
        let mut bridge = self.bridge.clone().lock_owned().await;
        let port_name = port_name.to_string();
        let settings = settings.clone();

        tokio::task::spawn_blocking(move || {
            let interface = bridge.interface_mut();
            if interface.is_connected() {
                interface.disconnect();
            }
            interface.connect(&port_name, &settings)
        })
        .await
        .map_err(|e| DeviceError::TaskFailed(e.to_string()))??;
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<()> {
        let mut bridge = self.bridge.lock().await;
        if !bridge.interface().is_connected() {
            return Err(DeviceError::NotConnected);
        }
        bridge.interface_mut().disconnect();
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.bridge.lock().await.interface().is_connected()
    }

    pub async fn device_info(&self) -> Option<SerialDeviceInfo> {
        self.bridge.lock().await.interface().device_info().cloned()
    }

    /// Run one exchange; waits for any exchange already in flight.
    pub async fn exchange(&self, image: ImageBuffer) -> ExchangeOutcome {
        let mut bridge = self.bridge.clone().lock_owned().await;

        match tokio::task::spawn_blocking(move || bridge.exchange_image(&image)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Exchange task failed: {}", e);
                ExchangeOutcome::ProtocolError(ExchangeError::Aborted(e.to_string()))
            }
        }
    }
}
