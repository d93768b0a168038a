//! PTP container transport over a raw USB channel.
//!
//! Owns the session counter and implements the request / data / response
//! / event container primitives plus the composite two-phase transaction
//! every PTP operation is built from.

use std::time::Duration;
use tracing::{debug, instrument, trace, warn};

use super::traits::{TransportError, UsbChannel};
use crate::error::PtpError;
use crate::protocol::container::{
    CONTAINER_HEADER_SIZE, ContainerError, ContainerHeader, ContainerType, Event, Request,
    Response, decode_event, decode_response, encode_data,
};

/// Outcome of one bulk-in read during the data phase.
#[derive(Debug)]
pub enum DataPhase {
    /// The device skipped the data phase and answered directly.
    Response(Response),
    /// A DATA container matching the outstanding request.
    Data {
        /// Payload length declared by the container header.
        declared_len: u32,
        payload: Vec<u8>,
    },
    /// Some other container; returned undecoded for caller inspection.
    Other { container_type: u16, raw: Vec<u8> },
}

/// PTP transport bound to one USB channel.
///
/// The session counter is strictly increasing and never reused; one
/// transport must only be driven by one session at a time.
pub struct PtpTransport<C: UsbChannel> {
    channel: C,
    session_counter: u32,
    max_bulk_read: usize,
}

impl<C: UsbChannel> PtpTransport<C> {
    pub fn new(channel: C, max_bulk_read: usize) -> Self {
        Self {
            channel,
            session_counter: 0,
            max_bulk_read,
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Allocate the next session id.
    pub fn new_session(&mut self) -> u32 {
        self.session_counter += 1;
        self.session_counter
    }

    /// Frame and write one COMMAND container.
    #[instrument(level = "debug", skip(self, request), fields(opcode = %format!("0x{:04X}", request.opcode), txn = request.transaction_id))]
    pub fn send_request(&self, request: &Request) -> Result<(), PtpError> {
        let buf = request.encode();
        trace!(len = buf.len(), "Sending command container");
        self.channel.bulk_write(&buf)?;
        Ok(())
    }

    /// Frame and write one host-to-device DATA container.
    pub fn send_data(&self, request: &Request, payload: &[u8]) -> Result<(), PtpError> {
        let buf = encode_data(request.opcode, request.transaction_id, payload);
        trace!(len = buf.len(), "Sending data container");
        self.channel.bulk_write(&buf)?;
        Ok(())
    }

    /// One bulk-in read decoded as the terminating RESPONSE container.
    pub fn read_response(&self, request: &Request) -> Result<Response, PtpError> {
        let buf = self.channel.bulk_read(self.max_bulk_read)?;
        let response = decode_response(request, &buf)?;
        debug!(
            respcode = %format!("0x{:04X}", response.respcode),
            txn = response.transaction_id,
            "Response received"
        );
        Ok(response)
    }

    /// One bulk-in read that may be the data phase or the response.
    ///
    /// A DATA container is validated against the outstanding request's
    /// opcode and transaction id; anything that is neither DATA nor
    /// RESPONSE comes back raw.
    pub fn read_data_or_response(&self, request: &Request) -> Result<DataPhase, PtpError> {
        let buf = self.channel.bulk_read(self.max_bulk_read)?;
        let header = ContainerHeader::decode(&buf)?;

        match ContainerType::from_u16(header.container_type) {
            Some(ContainerType::Response) => {
                Ok(DataPhase::Response(decode_response(request, &buf)?))
            }
            Some(ContainerType::Data) => {
                if header.code != request.opcode || header.transaction_id != request.transaction_id
                {
                    return Err(ContainerError::UnexpectedFrame {
                        code: header.code,
                        transaction_id: header.transaction_id,
                    }
                    .into());
                }
                let declared_len = header.total_length.saturating_sub(CONTAINER_HEADER_SIZE as u32);
                let mut payload = buf[CONTAINER_HEADER_SIZE..].to_vec();
                if payload.len() as u32 > declared_len {
                    payload.truncate(declared_len as usize);
                }
                debug!(
                    declared = declared_len,
                    received = payload.len(),
                    "Data phase received"
                );
                Ok(DataPhase::Data {
                    declared_len,
                    payload,
                })
            }
            _ => {
                warn!(
                    container_type = header.container_type,
                    "Unrecognized container during data phase"
                );
                Ok(DataPhase::Other {
                    container_type: header.container_type,
                    raw: buf,
                })
            }
        }
    }

    /// One interrupt-in read decoded as an EVENT container.
    ///
    /// Waits at most `timeout`; a silent device surfaces as
    /// [`PtpError::EventTimeout`] instead of hanging.
    pub fn read_event(&self, session_id: u32, timeout: Duration) -> Result<Event, PtpError> {
        let buf = self
            .channel
            .interrupt_read(self.max_bulk_read, timeout)
            .map_err(|e| match e {
                TransportError::Timeout { timeout_ms } => PtpError::EventTimeout { timeout_ms },
                other => PtpError::Transport(other),
            })?;
        let event = decode_event(session_id, &buf)?;
        debug!(
            eventcode = %format!("0x{:04X}", event.eventcode),
            params = ?event.params,
            "Event received"
        );
        Ok(event)
    }

    /// The fundamental two-phase PTP transaction: COMMAND, optional
    /// host-to-device DATA, optional device-to-host DATA, terminating
    /// RESPONSE.
    ///
    /// If the send fails no further I/O is attempted. When `expect_data`
    /// is set and the device answers with a RESPONSE directly, the
    /// transaction completes without a payload.
    pub fn simple_transaction(
        &self,
        request: &Request,
        tx_data: Option<&[u8]>,
        expect_data: bool,
    ) -> Result<(Response, Option<Vec<u8>>), PtpError> {
        self.send_request(request)?;

        if let Some(payload) = tx_data {
            self.send_data(request, payload)?;
        }

        if !expect_data {
            return Ok((self.read_response(request)?, None));
        }

        match self.read_data_or_response(request)? {
            DataPhase::Response(response) => Ok((response, None)),
            DataPhase::Data { payload, .. } => {
                let response = self.read_response(request)?;
                Ok((response, Some(payload)))
            }
            DataPhase::Other { container_type, .. } => {
                Err(ContainerError::UnexpectedContainerType {
                    expected: ContainerType::Data as u16,
                    actual: container_type,
                }
                .into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::values::{OP_GET_DEVICE_INFO, OP_OPEN_SESSION, RSP_OK};
    use crate::transport::mock::MockChannel;
    use byteorder::{LittleEndian, WriteBytesExt};

    fn response_container(respcode: u16, transaction_id: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(12).unwrap();
        buf.write_u16::<LittleEndian>(3).unwrap();
        buf.write_u16::<LittleEndian>(respcode).unwrap();
        buf.write_u32::<LittleEndian>(transaction_id).unwrap();
        buf
    }

    fn data_container(opcode: u16, transaction_id: u32, payload: &[u8]) -> Vec<u8> {
        encode_data(opcode, transaction_id, payload)
    }

    fn event_container(eventcode: u16, transaction_id: u32, params: &[u32]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>((12 + 4 * params.len()) as u32)
            .unwrap();
        buf.write_u16::<LittleEndian>(4).unwrap();
        buf.write_u16::<LittleEndian>(eventcode).unwrap();
        buf.write_u32::<LittleEndian>(transaction_id).unwrap();
        for &p in params {
            buf.write_u32::<LittleEndian>(p).unwrap();
        }
        buf
    }

    fn transport() -> (PtpTransport<MockChannel>, MockChannel) {
        let mock = MockChannel::new();
        (PtpTransport::new(mock.clone(), 1 << 20), mock)
    }

    #[test]
    fn session_ids_are_strictly_increasing() {
        let (mut t, _mock) = transport();
        assert_eq!(t.new_session(), 1);
        assert_eq!(t.new_session(), 2);
        assert_eq!(t.new_session(), 3);
    }

    #[test]
    fn non_data_transaction_writes_command_and_reads_response() {
        let (t, mock) = transport();
        mock.queue_bulk(response_container(RSP_OK, 0));
        let request = Request::new(OP_OPEN_SESSION, 1, 0, vec![1]);

        let (response, payload) = t.simple_transaction(&request, None, false).unwrap();
        assert_eq!(response.respcode, RSP_OK);
        assert!(payload.is_none());

        let writes = mock.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(
            writes[0],
            vec![16, 0, 0, 0, 1, 0, 0x02, 0x10, 0, 0, 0, 0, 1, 0, 0, 0]
        );
    }

    #[test]
    fn data_transaction_collects_payload_then_response() {
        let (t, mock) = transport();
        let request = Request::new(OP_GET_DEVICE_INFO, 1, 3, vec![]);
        mock.queue_bulk(data_container(OP_GET_DEVICE_INFO, 3, b"payload"));
        mock.queue_bulk(response_container(RSP_OK, 3));

        let (response, payload) = t.simple_transaction(&request, None, true).unwrap();
        assert_eq!(response.respcode, RSP_OK);
        assert_eq!(payload.unwrap(), b"payload");
    }

    #[test]
    fn device_may_skip_the_data_phase() {
        let (t, mock) = transport();
        let request = Request::new(OP_GET_DEVICE_INFO, 1, 3, vec![]);
        mock.queue_bulk(response_container(0x2005, 3));

        let (response, payload) = t.simple_transaction(&request, None, true).unwrap();
        assert_eq!(response.respcode, 0x2005);
        assert!(payload.is_none());
        assert_eq!(mock.reads_attempted(), 1);
    }

    #[test]
    fn failed_send_stops_the_transaction() {
        let (t, mock) = transport();
        mock.fail_writes();
        let request = Request::new(OP_OPEN_SESSION, 1, 0, vec![1]);

        let err = t.simple_transaction(&request, None, true).unwrap_err();
        assert!(matches!(err, PtpError::Transport(_)));
        assert_eq!(mock.reads_attempted(), 0);
    }

    #[test]
    fn outgoing_data_phase_is_framed_as_data_container() {
        let (t, mock) = transport();
        let request = Request::new(0x1016, 1, 4, vec![0x5007]);
        mock.queue_bulk(response_container(RSP_OK, 4));

        let value = 400u32.to_le_bytes();
        t.simple_transaction(&request, Some(&value), false).unwrap();

        let writes = mock.writes();
        assert_eq!(writes.len(), 2);
        // DATA container: length 16, type 2, code 0x1016, txn 4, payload.
        assert_eq!(writes[1][..12], [16, 0, 0, 0, 2, 0, 0x16, 0x10, 4, 0, 0, 0]);
        assert_eq!(&writes[1][12..], value);
    }

    #[test]
    fn mismatched_data_frame_is_rejected() {
        let (t, mock) = transport();
        let request = Request::new(OP_GET_DEVICE_INFO, 1, 3, vec![]);
        mock.queue_bulk(data_container(0x9999, 3, b"zz"));

        let err = t.read_data_or_response(&request).unwrap_err();
        assert!(matches!(
            err,
            PtpError::Container(ContainerError::UnexpectedFrame { code: 0x9999, .. })
        ));
    }

    #[test]
    fn event_read_decodes_interrupt_container() {
        let (t, mock) = transport();
        mock.queue_event(event_container(0x4002, 7, &[42]));
        let event = t.read_event(1, Duration::from_millis(100)).unwrap();
        assert_eq!(event.eventcode, 0x4002);
        assert_eq!(event.params, vec![42]);
    }

    #[test]
    fn silent_interrupt_endpoint_times_out() {
        let (t, _mock) = transport();
        let err = t.read_event(1, Duration::from_millis(250)).unwrap_err();
        assert!(matches!(err, PtpError::EventTimeout { timeout_ms: 250 }));
    }
}
