//! Transport layer module.

pub mod mock;
pub mod nusb;
pub mod ptp;
pub mod traits;

pub use mock::MockChannel;
pub use nusb::NusbChannel;
pub use ptp::{DataPhase, PtpTransport};
pub use traits::{TransportError, UsbChannel};
