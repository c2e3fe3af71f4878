pub mod session;

pub use session::DeviceSession;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Device not connected")]
    NotConnected,

    #[error("Serial communication error: {0}")]
    SerialError(#[from] crate::serial::SerialError),

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
