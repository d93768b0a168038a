//! PTP-Core: USB Picture Transfer Protocol with Canon EOS extensions.
//!
//! This crate drives PTP still-image cameras over USB bulk/interrupt
//! endpoints: session management, capture, object download, device
//! property access, and the Canon EOS vendor operations (remote-control
//! handshake, vendor capture, live view).
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Container codec, opcodes/codes, property value formats
//! - **Unpack**: Sequential reader for DATA-phase payloads
//! - **Descriptor**: DeviceInfo, ObjectInfo, property descriptors
//! - **Transport**: USB channel abstraction (nusb, mock) plus the
//!   transaction engine
//! - **Session**: Operation catalog with transaction-id bookkeeping
//! - **Camera**: Generic and EOS facades
//!
//! # Example
//!
//! ```no_run
//! use ptp_core::camera::{Camera, EosCamera};
//! use ptp_core::config::CameraConfig;
//! use ptp_core::session::PtpSession;
//! use ptp_core::transport::{NusbChannel, PtpTransport};
//!
//! let config = CameraConfig::default();
//! let channel = NusbChannel::open(&config).expect("no PTP camera found");
//! let transport = PtpTransport::new(channel, config.max_bulk_read);
//! let mut session = PtpSession::new(transport, config.event_timeout());
//! session.open_session().expect("OpenSession failed");
//!
//! let mut camera = EosCamera::new(session);
//! camera.connect().expect("remote control handshake failed");
//! let jpeg = camera.capture().expect("capture failed");
//! std::fs::write("capture.jpg", jpeg).expect("write failed");
//! ```

pub mod camera;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod unpack;

// Re-exports for convenience
pub use camera::{Camera, EosCamera, GenericCamera};
pub use config::CameraConfig;
pub use descriptor::{DeviceInfo, DevicePropertyInfo, EosDeviceInfo, ObjectInfo, PropertyForm};
pub use error::PtpError;
pub use protocol::container::{ContainerType, Event, Request, Response};
pub use protocol::format::{SimpleForm, Value};
pub use session::PtpSession;
pub use transport::{MockChannel, NusbChannel, PtpTransport, TransportError, UsbChannel};
