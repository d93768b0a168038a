//! PTP session - operation catalog over one transport.
//!
//! A session owns its transport for the conversation's lifetime, issues
//! requests with an auto-incrementing transaction id, and decodes DATA
//! payloads through the unpacker and descriptor decoders. Only one
//! operation may be in flight at a time; the container stream on the
//! shared endpoints desynchronizes otherwise.

use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::descriptor::{DeviceInfo, DevicePropertyInfo, EosDeviceInfo, ObjectInfo};
use crate::error::PtpError;
use crate::protocol::container::{Event, Request, Response};
use crate::protocol::format::{SimpleForm, Value};
use crate::protocol::values::*;
use crate::transport::ptp::{DataPhase, PtpTransport};
use crate::transport::traits::UsbChannel;
use crate::unpack::Unpacker;

/// Progress of one capture sequence. Terminal states are `ObjectReady`
/// and `CaptureFailed`; nothing retries automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Idle,
    CaptureSent,
    AwaitingEvent,
    ObjectReady,
    CaptureFailed,
}

/// One logical PTP conversation.
pub struct PtpSession<C: UsbChannel> {
    transport: PtpTransport<C>,
    session_id: u32,
    transaction_id: u32,
    event_timeout: Duration,
}

impl<C: UsbChannel> PtpSession<C> {
    pub fn new(transport: PtpTransport<C>, event_timeout: Duration) -> Self {
        Self {
            transport,
            session_id: 0,
            transaction_id: 0,
            event_timeout,
        }
    }

    pub fn transport(&self) -> &PtpTransport<C> {
        &self.transport
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    /// Pre-increment and return; requests after OpenSession start at 1.
    fn new_transaction(&mut self) -> u32 {
        self.transaction_id += 1;
        self.transaction_id
    }

    fn request(&mut self, opcode: u16, params: Vec<u32>) -> Request {
        let transaction_id = self.new_transaction();
        Request::new(opcode, self.session_id, transaction_id, params)
    }

    fn check_ok(request: &Request, response: &Response) -> Result<(), PtpError> {
        if response.respcode != RSP_OK {
            return Err(PtpError::CommandFailed {
                opcode: request.opcode,
                respcode: response.respcode,
            });
        }
        Ok(())
    }

    /// Open a new session. Obtains a fresh session id from the transport
    /// and resets the transaction counter; OpenSession itself goes out
    /// with transaction id 0.
    #[instrument(skip(self))]
    pub fn open_session(&mut self) -> Result<(), PtpError> {
        self.session_id = self.transport.new_session();
        self.transaction_id = 0;
        let request = Request::new(OP_OPEN_SESSION, self.session_id, 0, vec![self.session_id]);
        let (response, _) = self.transport.simple_transaction(&request, None, false)?;
        Self::check_ok(&request, &response)?;
        info!(session_id = self.session_id, "Session opened");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn close_session(&mut self) -> Result<(), PtpError> {
        let request = self.request(OP_CLOSE_SESSION, vec![]);
        let (response, _) = self.transport.simple_transaction(&request, None, false)?;
        Self::check_ok(&request, &response)
    }

    pub fn get_device_info(&mut self) -> Result<DeviceInfo, PtpError> {
        let payload = self.data_transaction(OP_GET_DEVICE_INFO, vec![])?;
        Ok(DeviceInfo::decode(&payload)?)
    }

    pub fn get_eos_device_info(&mut self) -> Result<EosDeviceInfo, PtpError> {
        let payload = self.data_transaction(EOS_OP_GET_DEVICE_INFO, vec![])?;
        Ok(EosDeviceInfo::decode(&payload)?)
    }

    pub fn get_object_info(&mut self, object_id: u32) -> Result<ObjectInfo, PtpError> {
        let payload = self.data_transaction(OP_GET_OBJECT_INFO, vec![object_id])?;
        Ok(ObjectInfo::decode(&payload)?)
    }

    /// Fetch an object's bytes. The preceding GetObjectInfo confirms the
    /// object exists; the declared compressed size is logged but not
    /// enforced against the transfer.
    #[instrument(skip(self))]
    pub fn get_object(&mut self, object_id: u32) -> Result<Vec<u8>, PtpError> {
        let info = self.get_object_info(object_id)?;
        debug!(
            object_id,
            size = info.object_compressed_size,
            format = %format!("0x{:04X}", info.object_format),
            "Fetching object"
        );

        // Driven by hand rather than via simple_transaction: the raw
        // payload is the result here, not a decodable descriptor.
        let request = self.request(OP_GET_OBJECT, vec![object_id]);
        self.transport.send_request(&request)?;
        match self.transport.read_data_or_response(&request)? {
            DataPhase::Data { payload, .. } => {
                let response = self.transport.read_response(&request)?;
                Self::check_ok(&request, &response)?;
                Ok(payload)
            }
            DataPhase::Response(response) => {
                Self::check_ok(&request, &response)?;
                warn!(object_id, "Device produced no data phase for GetObject");
                Ok(Vec::new())
            }
            DataPhase::Other { container_type, .. } => {
                Err(crate::protocol::container::ContainerError::UnexpectedContainerType {
                    expected: crate::protocol::container::ContainerType::Data as u16,
                    actual: container_type,
                }
                .into())
            }
        }
    }

    /// Wait for one event on the interrupt endpoint.
    pub fn check_for_event(&self) -> Result<Event, PtpError> {
        self.transport.read_event(self.session_id, self.event_timeout)
    }

    /// EOS cameras deliver most notifications via the GetEvent data
    /// transaction instead of the interrupt endpoint. Returns the raw
    /// event buffer for the caller to pick apart.
    pub fn check_for_eos_event(&mut self) -> Result<Vec<u8>, PtpError> {
        self.data_transaction(EOS_OP_GET_EVENT, vec![])
    }

    pub fn get_device_prop_value(
        &mut self,
        property_id: u16,
        is_array: bool,
        form: SimpleForm,
    ) -> Result<Value, PtpError> {
        let payload =
            self.data_transaction(OP_GET_DEVICE_PROP_VALUE, vec![u32::from(property_id)])?;
        let mut unpacker = Unpacker::new(&payload);
        Ok(unpacker.read_simple(is_array, form)?)
    }

    pub fn get_device_prop_info(
        &mut self,
        property_id: u16,
    ) -> Result<DevicePropertyInfo, PtpError> {
        let payload =
            self.data_transaction(OP_GET_DEVICE_PROP_DESC, vec![u32::from(property_id)])?;
        Ok(DevicePropertyInfo::decode(&payload)?)
    }

    /// Standard SetDevicePropValue: the value travels as a 4-byte
    /// little-endian data phase.
    pub fn set_device_prop_value(&mut self, property_id: u16, value: u32) -> Result<(), PtpError> {
        let request = self.request(OP_SET_DEVICE_PROP_VALUE, vec![u32::from(property_id)]);
        let payload = value.to_le_bytes();
        let (response, _) = self
            .transport
            .simple_transaction(&request, Some(&payload), false)?;
        Self::check_ok(&request, &response)
    }

    /// EOS SetDevicePropValueEx: 12-byte {length=12, property, value}
    /// envelope as the data phase, no request parameters.
    pub fn set_eos_device_prop_value(
        &mut self,
        property_id: u16,
        value: u32,
    ) -> Result<(), PtpError> {
        let request = self.request(EOS_OP_SET_DEVICE_PROP_VALUE, vec![]);
        let mut payload = Vec::with_capacity(12);
        payload.extend_from_slice(&12u32.to_le_bytes());
        payload.extend_from_slice(&u32::from(property_id).to_le_bytes());
        payload.extend_from_slice(&value.to_le_bytes());
        let (response, _) = self
            .transport
            .simple_transaction(&request, Some(&payload), false)?;
        Self::check_ok(&request, &response)
    }

    pub fn get_battery_level(&mut self) -> Result<u8, PtpError> {
        match self.get_device_prop_value(PROP_BATTERY_LEVEL, false, SimpleForm::U8)? {
            Value::U8(level) => Ok(level),
            other => Ok(other.as_u32().unwrap_or(0) as u8),
        }
    }

    pub fn get_device_friendly_name(&mut self) -> Result<String, PtpError> {
        let value =
            self.get_device_prop_value(PROP_DEVICE_FRIENDLY_NAME, false, SimpleForm::Str)?;
        Ok(value.as_str().unwrap_or_default().to_owned())
    }

    pub fn get_output_value(&mut self) -> Result<DevicePropertyInfo, PtpError> {
        self.get_device_prop_info(EOS_PROP_EVF_OUTPUT_DEVICE)
    }

    pub fn set_output_value(&mut self, value: u32) -> Result<(), PtpError> {
        self.set_eos_device_prop_value(EOS_PROP_EVF_OUTPUT_DEVICE, value)
    }

    pub fn get_capture_destination(&mut self) -> Result<DevicePropertyInfo, PtpError> {
        self.get_device_prop_info(EOS_PROP_CAPTURE_DESTINATION)
    }

    pub fn set_capture_destination(&mut self, value: u32) -> Result<(), PtpError> {
        self.set_eos_device_prop_value(EOS_PROP_CAPTURE_DESTINATION, value)
    }

    /// Gate the camera into remote-control mode. Must succeed (along
    /// with set_event_mode) before capture or live view mean anything.
    pub fn set_pc_connect_mode(&mut self, mode: u32) -> Result<(), PtpError> {
        let request = self.request(EOS_OP_SET_PC_CONNECT_MODE, vec![mode]);
        let (response, _) = self.transport.simple_transaction(&request, None, false)?;
        Self::check_ok(&request, &response)
    }

    pub fn set_event_mode(&mut self, mode: u32) -> Result<(), PtpError> {
        let request = self.request(EOS_OP_SET_EVENT_MODE, vec![mode]);
        let (response, _) = self.transport.simple_transaction(&request, None, false)?;
        Self::check_ok(&request, &response)
    }

    /// Trigger a capture with the given opcode and fetch the resulting
    /// object.
    ///
    /// Sequence: Idle -> CaptureSent -> AwaitingEvent -> ObjectReady on
    /// an ObjectAdded event, or CaptureFailed on a non-OK response, any
    /// other event, or an event read failure.
    #[instrument(skip(self), fields(opcode = %format!("0x{:04X}", capture_opcode)))]
    pub fn capture(&mut self, capture_opcode: u16) -> Result<Vec<u8>, PtpError> {
        let mut phase = CapturePhase::Idle;
        debug!(?phase, "Starting capture");

        let request = self.request(capture_opcode, vec![]);
        phase = CapturePhase::CaptureSent;
        let result = self.transport.simple_transaction(&request, None, false);

        let response = match result {
            Ok((response, _)) => response,
            Err(e) => {
                debug!(?phase, "Capture failed before response");
                return Err(e);
            }
        };
        if let Err(e) = Self::check_ok(&request, &response) {
            debug!(?phase, respcode = %format!("0x{:04X}", response.respcode), "Capture rejected");
            return Err(e);
        }

        phase = CapturePhase::AwaitingEvent;
        let event = match self.check_for_event() {
            Ok(event) => event,
            Err(e) => {
                debug!(?phase, "No event after capture");
                return Err(e);
            }
        };

        if event.eventcode != EVT_OBJECT_ADDED {
            debug!(
                ?phase,
                eventcode = %format!("0x{:04X}", event.eventcode),
                "Event is not ObjectAdded"
            );
            return Err(PtpError::UnexpectedEvent {
                eventcode: event.eventcode,
            });
        }
        let object_id = event
            .params
            .first()
            .copied()
            .ok_or(PtpError::UnexpectedEvent {
                eventcode: event.eventcode,
            })?;

        let bytes = self.get_object(object_id)?;
        phase = CapturePhase::ObjectReady;
        info!(?phase, object_id, len = bytes.len(), "Capture complete");
        Ok(bytes)
    }

    /// Fetch one viewfinder frame. Success is strictly `respcode == OK`;
    /// ObjectNotReady (the frame not being available yet) is a failure
    /// the caller may poll past.
    pub fn live_view(&mut self) -> Result<Vec<u8>, PtpError> {
        let request = self.request(EOS_OP_LIVE_VIEW, vec![EOS_LIVE_VIEW_PARAM]);
        let (response, payload) = self.transport.simple_transaction(&request, None, true)?;
        Self::check_ok(&request, &response)?;
        Ok(payload.unwrap_or_default())
    }

    /// Issue a data-expecting transaction and return the payload once
    /// the terminating response checks out.
    fn data_transaction(&mut self, opcode: u16, params: Vec<u32>) -> Result<Vec<u8>, PtpError> {
        let request = self.request(opcode, params);
        let (response, payload) = self.transport.simple_transaction(&request, None, true)?;
        Self::check_ok(&request, &response)?;
        Ok(payload.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::container::encode_data;
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

    fn object_info_payload(size: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(0x0001_0001).unwrap();
        buf.write_u16::<LittleEndian>(FMT_EXIF_JPEG).unwrap();
        buf.write_u16::<LittleEndian>(0).unwrap();
        buf.write_u32::<LittleEndian>(size).unwrap();
        buf
    }

    fn session() -> (PtpSession<MockChannel>, MockChannel) {
        let mock = MockChannel::new();
        let transport = PtpTransport::new(mock.clone(), 1 << 20);
        (
            PtpSession::new(transport, Duration::from_millis(100)),
            mock,
        )
    }

    fn opened_session() -> (PtpSession<MockChannel>, MockChannel) {
        let (mut s, mock) = session();
        mock.queue_bulk(response_container(RSP_OK, 0));
        s.open_session().unwrap();
        mock.clear_writes();
        (s, mock)
    }

    fn sent_opcode(write: &[u8]) -> u16 {
        u16::from_le_bytes([write[6], write[7]])
    }

    fn sent_transaction_id(write: &[u8]) -> u32 {
        u32::from_le_bytes([write[8], write[9], write[10], write[11]])
    }

    fn sent_param(write: &[u8], index: usize) -> u32 {
        let at = 12 + 4 * index;
        u32::from_le_bytes([write[at], write[at + 1], write[at + 2], write[at + 3]])
    }

    #[test]
    fn open_session_sends_golden_bytes() {
        let (mut s, mock) = session();
        mock.queue_bulk(response_container(RSP_OK, 0));
        s.open_session().unwrap();
        assert_eq!(
            mock.writes()[0],
            vec![16, 0, 0, 0, 1, 0, 0x02, 0x10, 0, 0, 0, 0, 1, 0, 0, 0]
        );
        assert_eq!(s.session_id(), 1);
    }

    #[test]
    fn transaction_ids_increase_by_one_from_one() {
        let (mut s, mock) = opened_session();
        mock.queue_bulk(response_container(RSP_OK, 1));
        mock.queue_bulk(response_container(RSP_OK, 2));
        mock.queue_bulk(response_container(RSP_OK, 3));
        s.set_event_mode(1).unwrap();
        s.set_pc_connect_mode(1).unwrap();
        s.set_event_mode(0).unwrap();

        let writes = mock.writes();
        assert_eq!(writes.len(), 3);
        assert_eq!(sent_transaction_id(&writes[0]), 1);
        assert_eq!(sent_transaction_id(&writes[1]), 2);
        assert_eq!(sent_transaction_id(&writes[2]), 3);
    }

    #[test]
    fn capture_fetches_object_named_by_object_added_event() {
        let (mut s, mock) = opened_session();

        // Capture (txn 1): OK response, then ObjectAdded event for 42.
        mock.queue_bulk(response_container(RSP_OK, 1));
        mock.queue_event(event_container(EVT_OBJECT_ADDED, 1, &[42]));
        // GetObjectInfo (txn 2): data + response.
        mock.queue_bulk(encode_data(OP_GET_OBJECT_INFO, 2, &object_info_payload(3)));
        mock.queue_bulk(response_container(RSP_OK, 2));
        // GetObject (txn 3): data + response.
        mock.queue_bulk(encode_data(OP_GET_OBJECT, 3, b"jpg"));
        mock.queue_bulk(response_container(RSP_OK, 3));

        let bytes = s.capture(EOS_OP_CAPTURE).unwrap();
        assert_eq!(bytes, b"jpg");

        let writes = mock.writes();
        assert_eq!(sent_opcode(&writes[0]), EOS_OP_CAPTURE);
        assert_eq!(sent_opcode(&writes[1]), OP_GET_OBJECT_INFO);
        assert_eq!(sent_param(&writes[1], 0), 42);
        assert_eq!(sent_opcode(&writes[2]), OP_GET_OBJECT);
        assert_eq!(sent_param(&writes[2], 0), 42);
    }

    #[test]
    fn capture_with_wrong_event_issues_no_get_object() {
        let (mut s, mock) = opened_session();
        mock.queue_bulk(response_container(RSP_OK, 1));
        mock.queue_event(event_container(0x4006, 1, &[7])); // DevicePropChanged

        let err = s.capture(EOS_OP_CAPTURE).unwrap_err();
        assert!(matches!(
            err,
            PtpError::UnexpectedEvent { eventcode: 0x4006 }
        ));
        assert_eq!(mock.writes().len(), 1, "only the capture command went out");
    }

    #[test]
    fn capture_with_non_ok_response_fails_without_event_wait() {
        let (mut s, mock) = opened_session();
        mock.queue_bulk(response_container(0x2019, 1)); // DeviceBusy

        let err = s.capture(EOS_OP_CAPTURE).unwrap_err();
        assert!(matches!(
            err,
            PtpError::CommandFailed {
                opcode: EOS_OP_CAPTURE,
                respcode: 0x2019
            }
        ));
    }

    #[test]
    fn capture_times_out_on_silent_device() {
        let (mut s, mock) = opened_session();
        mock.queue_bulk(response_container(RSP_OK, 1));
        // no event queued -> interrupt read times out

        assert!(matches!(
            s.capture(EOS_OP_CAPTURE).unwrap_err(),
            PtpError::EventTimeout { .. }
        ));
    }

    #[test]
    fn live_view_returns_frame_on_ok() {
        let (mut s, mock) = opened_session();
        mock.queue_bulk(encode_data(EOS_OP_LIVE_VIEW, 1, b"frame"));
        mock.queue_bulk(response_container(RSP_OK, 1));

        let frame = s.live_view().unwrap();
        assert_eq!(frame, b"frame");
        let writes = mock.writes();
        assert_eq!(sent_opcode(&writes[0]), EOS_OP_LIVE_VIEW);
        assert_eq!(sent_param(&writes[0], 0), EOS_LIVE_VIEW_PARAM);
    }

    #[test]
    fn live_view_object_not_ready_is_a_failure() {
        let (mut s, mock) = opened_session();
        mock.queue_bulk(response_container(RSP_OBJECT_NOT_READY, 1));

        let err = s.live_view().unwrap_err();
        assert!(matches!(
            err,
            PtpError::CommandFailed {
                respcode: RSP_OBJECT_NOT_READY,
                ..
            }
        ));
    }

    #[test]
    fn set_device_prop_value_carries_four_byte_data_phase() {
        let (mut s, mock) = opened_session();
        mock.queue_bulk(response_container(RSP_OK, 1));
        s.set_device_prop_value(0x5007, 560).unwrap();

        let writes = mock.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(sent_opcode(&writes[0]), OP_SET_DEVICE_PROP_VALUE);
        assert_eq!(sent_param(&writes[0], 0), 0x5007);
        assert_eq!(&writes[1][12..], 560u32.to_le_bytes());
    }

    #[test]
    fn eos_prop_set_uses_twelve_byte_envelope() {
        let (mut s, mock) = opened_session();
        mock.queue_bulk(response_container(RSP_OK, 1));
        s.set_output_value(2).unwrap();

        let writes = mock.writes();
        assert_eq!(sent_opcode(&writes[0]), EOS_OP_SET_DEVICE_PROP_VALUE);
        let payload = &writes[1][12..];
        assert_eq!(payload.len(), 12);
        assert_eq!(&payload[0..4], 12u32.to_le_bytes());
        assert_eq!(
            &payload[4..8],
            u32::from(EOS_PROP_EVF_OUTPUT_DEVICE).to_le_bytes()
        );
        assert_eq!(&payload[8..12], 2u32.to_le_bytes());
    }

    #[test]
    fn device_prop_value_is_unpacked_per_format() {
        let (mut s, mock) = opened_session();
        mock.queue_bulk(encode_data(OP_GET_DEVICE_PROP_VALUE, 1, &[75]));
        mock.queue_bulk(response_container(RSP_OK, 1));

        let level = s.get_battery_level().unwrap();
        assert_eq!(level, 75);
    }
}
