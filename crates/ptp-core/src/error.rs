//! Unifying error type for session-level operations.
//!
//! Every failure is recoverable at the call site: protocol anomalies
//! surface as values, never as panics, so callers like the capture
//! sequence can abort and report upward.

use thiserror::Error;

use crate::descriptor::DescriptorError;
use crate::protocol::container::ContainerError;
use crate::transport::traits::TransportError;
use crate::unpack::UnpackError;

#[derive(Error, Debug)]
pub enum PtpError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Unpack(#[from] UnpackError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// The device answered, but not with OK.
    #[error("operation 0x{opcode:04X} failed with response code 0x{respcode:04X}")]
    CommandFailed { opcode: u16, respcode: u16 },

    /// No event arrived within the configured wait.
    #[error("no event within {timeout_ms}ms")]
    EventTimeout { timeout_ms: u64 },

    /// An event arrived, but not the one the capture sequence needs.
    #[error("unexpected event 0x{eventcode:04X} while waiting for ObjectAdded")]
    UnexpectedEvent { eventcode: u16 },
}
