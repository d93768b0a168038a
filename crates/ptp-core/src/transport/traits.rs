//! USB channel abstraction.
//!
//! Defines the `UsbChannel` trait the PTP transport drives, allowing
//! different implementations (nusb, mock, etc.). PTP needs three
//! endpoints: bulk-out for commands/data, bulk-in for data/responses,
//! interrupt-in for events.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("device not found (filter: VID={vid:?} PID={pid:?})")]
    DeviceNotFound { vid: Option<u16>, pid: Option<u16> },

    #[error("failed to open device: {0}")]
    OpenFailed(String),

    #[error("failed to claim interface {interface}: {message}")]
    ClaimInterfaceFailed { interface: u8, message: String },

    #[error("endpoint not found: type={ep_type}, direction={direction}")]
    EndpointNotFound { ep_type: String, direction: String },

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("device disconnected")]
    Disconnected,

    #[error("timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abstract three-endpoint USB channel.
///
/// This trait enables:
/// - Production implementation using nusb
/// - Mock implementation for unit testing
/// - Future alternative backends
pub trait UsbChannel: Send + Sync {
    /// Write raw bytes to the bulk-out endpoint.
    fn bulk_write(&self, data: &[u8]) -> Result<usize, TransportError>;

    /// Read raw bytes from the bulk-in endpoint.
    fn bulk_read(&self, max_len: usize) -> Result<Vec<u8>, TransportError>;

    /// Read raw bytes from the interrupt-in endpoint, waiting at most
    /// `timeout`. Expiry surfaces as [`TransportError::Timeout`].
    fn interrupt_read(&self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    /// Get the current VID.
    fn vendor_id(&self) -> u16;

    /// Get the current PID.
    fn product_id(&self) -> u16;
}
