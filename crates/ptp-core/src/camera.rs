//! Camera facades over a session.
//!
//! The session exposes the full operation catalog; these types pin down
//! which opcodes a given family of hardware answers to.

use tracing::{info, instrument};

use crate::error::PtpError;
use crate::protocol::values::{EOS_OP_CAPTURE, OP_INITIATE_CAPTURE};
use crate::session::PtpSession;
use crate::transport::traits::UsbChannel;

/// Anything that can take a picture and hand back the bytes.
pub trait Camera {
    fn capture(&mut self) -> Result<Vec<u8>, PtpError>;
}

/// Baseline PTP camera. Uses the standard InitiateCapture opcode and
/// nothing vendor-specific.
pub struct GenericCamera<C: UsbChannel> {
    session: PtpSession<C>,
}

impl<C: UsbChannel> GenericCamera<C> {
    pub fn new(session: PtpSession<C>) -> Self {
        Self { session }
    }

    pub fn session(&mut self) -> &mut PtpSession<C> {
        &mut self.session
    }
}

impl<C: UsbChannel> Camera for GenericCamera<C> {
    fn capture(&mut self) -> Result<Vec<u8>, PtpError> {
        self.session.capture(OP_INITIATE_CAPTURE)
    }
}

/// Canon EOS camera. Captures through the vendor opcode and gates
/// remote control behind the SetPcConnectMode/SetEventMode handshake.
pub struct EosCamera<C: UsbChannel> {
    session: PtpSession<C>,
}

impl<C: UsbChannel> EosCamera<C> {
    pub fn new(session: PtpSession<C>) -> Self {
        Self { session }
    }

    pub fn session(&mut self) -> &mut PtpSession<C> {
        &mut self.session
    }

    /// Put the camera under PC control. Required once per session
    /// before capture or live view respond.
    #[instrument(skip(self))]
    pub fn connect(&mut self) -> Result<(), PtpError> {
        self.session.set_pc_connect_mode(1)?;
        self.session.set_event_mode(1)?;
        info!("EOS remote control enabled");
        Ok(())
    }

    pub fn live_view(&mut self) -> Result<Vec<u8>, PtpError> {
        self.session.live_view()
    }
}

impl<C: UsbChannel> Camera for EosCamera<C> {
    fn capture(&mut self) -> Result<Vec<u8>, PtpError> {
        self.session.capture(EOS_OP_CAPTURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::values::*;
    use crate::transport::mock::MockChannel;
    use crate::transport::ptp::PtpTransport;
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::time::Duration;

    fn ok_response(transaction_id: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(12).unwrap();
        buf.write_u16::<LittleEndian>(3).unwrap();
        buf.write_u16::<LittleEndian>(RSP_OK).unwrap();
        buf.write_u32::<LittleEndian>(transaction_id).unwrap();
        buf
    }

    fn opened_session() -> (PtpSession<MockChannel>, MockChannel) {
        let mock = MockChannel::new();
        let transport = PtpTransport::new(mock.clone(), 1 << 20);
        let mut session = PtpSession::new(transport, Duration::from_millis(100));
        mock.queue_bulk(ok_response(0));
        session.open_session().unwrap();
        mock.clear_writes();
        (session, mock)
    }

    fn sent_opcode(write: &[u8]) -> u16 {
        u16::from_le_bytes([write[6], write[7]])
    }

    #[test]
    fn generic_camera_captures_with_initiate_capture() {
        let (session, mock) = opened_session();
        let mut camera = GenericCamera::new(session);

        mock.queue_bulk(ok_response(1));
        // Leave the event queue empty; the opcode on the wire is what
        // this test is about.
        let _ = camera.capture();
        assert_eq!(sent_opcode(&mock.writes()[0]), OP_INITIATE_CAPTURE);
    }

    #[test]
    fn eos_camera_captures_with_vendor_opcode() {
        let (session, mock) = opened_session();
        let mut camera = EosCamera::new(session);

        mock.queue_bulk(ok_response(1));
        let _ = camera.capture();
        assert_eq!(sent_opcode(&mock.writes()[0]), EOS_OP_CAPTURE);
    }

    #[test]
    fn eos_connect_sends_both_mode_commands_in_order() {
        let (session, mock) = opened_session();
        let mut camera = EosCamera::new(session);

        mock.queue_bulk(ok_response(1));
        mock.queue_bulk(ok_response(2));
        camera.connect().unwrap();

        let writes = mock.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(sent_opcode(&writes[0]), EOS_OP_SET_PC_CONNECT_MODE);
        assert_eq!(sent_opcode(&writes[1]), EOS_OP_SET_EVENT_MODE);
    }
}
