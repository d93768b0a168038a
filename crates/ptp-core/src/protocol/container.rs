//! USB-PTP container framing.
//!
//! Every bulk/interrupt transfer carries one container: a 12-byte
//! little-endian header (total length, container type, code, transaction
//! id) followed by u32 parameters (COMMAND/RESPONSE/EVENT) or raw payload
//! bytes (DATA).

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;
use thiserror::Error;

/// Fixed container header size.
pub const CONTAINER_HEADER_SIZE: usize = 12;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("malformed container: need at least {expected} bytes, got {actual}")]
    MalformedContainer { expected: usize, actual: usize },

    #[error("transaction id mismatch: container carries {actual}, request was {expected}")]
    TransactionMismatch { expected: u32, actual: u32 },

    #[error("unexpected container type {actual} (expected {expected})")]
    UnexpectedContainerType { expected: u16, actual: u16 },

    #[error("data container (code 0x{code:04X}, txn {transaction_id}) does not match the outstanding request")]
    UnexpectedFrame { code: u16, transaction_id: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Container type codes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ContainerType {
    Command = 1,
    Data = 2,
    Response = 3,
    Event = 4,
}

impl ContainerType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(ContainerType::Command),
            2 => Some(ContainerType::Data),
            3 => Some(ContainerType::Response),
            4 => Some(ContainerType::Event),
            _ => None,
        }
    }
}

/// An outgoing PTP command.
#[derive(Debug, Clone)]
pub struct Request {
    pub opcode: u16,
    pub session_id: u32,
    pub transaction_id: u32,
    /// 0 to 5 u32 parameters.
    pub params: Vec<u32>,
}

impl Request {
    pub fn new(opcode: u16, session_id: u32, transaction_id: u32, params: Vec<u32>) -> Self {
        Self {
            opcode,
            session_id,
            transaction_id,
            params,
        }
    }

    /// Frame as a COMMAND container.
    pub fn encode(&self) -> Vec<u8> {
        let total = CONTAINER_HEADER_SIZE + 4 * self.params.len();
        let mut buf = Vec::with_capacity(total);
        buf.write_u32::<LittleEndian>(total as u32).unwrap();
        buf.write_u16::<LittleEndian>(ContainerType::Command as u16)
            .unwrap();
        buf.write_u16::<LittleEndian>(self.opcode).unwrap();
        buf.write_u32::<LittleEndian>(self.transaction_id).unwrap();
        for &param in &self.params {
            buf.write_u32::<LittleEndian>(param).unwrap();
        }
        buf
    }
}

/// The terminating result of a transaction.
///
/// Trailing response parameters are not decoded; `params` stays `None`
/// even when the device sends them. Operations that return values do so
/// through the DATA phase.
#[derive(Debug, Clone)]
pub struct Response {
    pub respcode: u16,
    pub session_id: u32,
    pub transaction_id: u32,
    pub params: Option<Vec<u32>>,
}

/// An asynchronous notification from the interrupt endpoint.
#[derive(Debug, Clone)]
pub struct Event {
    pub eventcode: u16,
    pub session_id: u32,
    pub transaction_id: u32,
    pub params: Vec<u32>,
}

/// Decoded 12-byte container header.
#[derive(Debug, Clone, Copy)]
pub struct ContainerHeader {
    pub total_length: u32,
    pub container_type: u16,
    pub code: u16,
    pub transaction_id: u32,
}

impl ContainerHeader {
    pub fn decode(buf: &[u8]) -> Result<Self, ContainerError> {
        if buf.len() < CONTAINER_HEADER_SIZE {
            return Err(ContainerError::MalformedContainer {
                expected: CONTAINER_HEADER_SIZE,
                actual: buf.len(),
            });
        }
        let mut cursor = Cursor::new(buf);
        Ok(Self {
            total_length: cursor.read_u32::<LittleEndian>()?,
            container_type: cursor.read_u16::<LittleEndian>()?,
            code: cursor.read_u16::<LittleEndian>()?,
            transaction_id: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// Frame raw payload bytes as a DATA container for the given request.
pub fn encode_data(opcode: u16, transaction_id: u32, payload: &[u8]) -> Vec<u8> {
    let total = CONTAINER_HEADER_SIZE + payload.len();
    let mut buf = Vec::with_capacity(total);
    buf.write_u32::<LittleEndian>(total as u32).unwrap();
    buf.write_u16::<LittleEndian>(ContainerType::Data as u16)
        .unwrap();
    buf.write_u16::<LittleEndian>(opcode).unwrap();
    buf.write_u32::<LittleEndian>(transaction_id).unwrap();
    buf.extend_from_slice(payload);
    buf
}

/// Decode a RESPONSE container against its originating request.
pub fn decode_response(request: &Request, buf: &[u8]) -> Result<Response, ContainerError> {
    let header = ContainerHeader::decode(buf)?;
    if header.transaction_id != request.transaction_id {
        return Err(ContainerError::TransactionMismatch {
            expected: request.transaction_id,
            actual: header.transaction_id,
        });
    }
    if header.container_type != ContainerType::Response as u16 {
        return Err(ContainerError::UnexpectedContainerType {
            expected: ContainerType::Response as u16,
            actual: header.container_type,
        });
    }
    Ok(Response {
        respcode: header.code,
        session_id: request.session_id,
        transaction_id: header.transaction_id,
        params: None,
    })
}

/// Decode an EVENT container read from the interrupt endpoint.
pub fn decode_event(session_id: u32, buf: &[u8]) -> Result<Event, ContainerError> {
    let header = ContainerHeader::decode(buf)?;
    if header.container_type != ContainerType::Event as u16 {
        return Err(ContainerError::UnexpectedContainerType {
            expected: ContainerType::Event as u16,
            actual: header.container_type,
        });
    }
    let param_count = (header.total_length.saturating_sub(CONTAINER_HEADER_SIZE as u32) / 4) as usize;
    let needed = CONTAINER_HEADER_SIZE + 4 * param_count;
    if buf.len() < needed {
        return Err(ContainerError::MalformedContainer {
            expected: needed,
            actual: buf.len(),
        });
    }
    let mut cursor = Cursor::new(&buf[CONTAINER_HEADER_SIZE..]);
    let mut params = Vec::with_capacity(param_count);
    for _ in 0..param_count {
        params.push(cursor.read_u32::<LittleEndian>()?);
    }
    Ok(Event {
        eventcode: header.code,
        session_id,
        transaction_id: header.transaction_id,
        params,
    })
}
