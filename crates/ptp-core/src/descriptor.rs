//! Binary decoders for PTP descriptor payloads.
//!
//! All decoders are pure functions over a DATA payload. DeviceInfo and
//! the EOS variant are immutable capability snapshots; DevicePropertyInfo
//! is form-dependent (plain / range / enumeration); ObjectInfo keeps the
//! positional subset of fields this stack actually uses.

use thiserror::Error;

use crate::protocol::format::{SimpleForm, Value, lookup_data_type};
use crate::unpack::{UnpackError, Unpacker};

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("property descriptor references unregistered data type 0x{data_type:04X}")]
    UnknownPropertyType { data_type: u16 },

    #[error("property descriptor carries unknown form byte {form}")]
    UnknownPropertyForm { form: u8 },

    #[error(transparent)]
    Unpack(#[from] UnpackError),
}

/// Standard DeviceInfo dataset (PIMA 15740 §5.5.1, decoded subset).
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub standard_version: u16,
    pub vendor_extension_id: u32,
    pub vendor_extension_version: u16,
    pub vendor_extension_desc: String,
    pub functional_mode: u16,
    pub operations_supported: Vec<u16>,
    pub events_supported: Vec<u16>,
    pub device_properties_supported: Vec<u16>,
}

impl DeviceInfo {
    pub fn decode(buf: &[u8]) -> Result<Self, DescriptorError> {
        let mut unpacker = Unpacker::new(buf);
        let standard_version = unpacker.read_u16()?;
        let vendor_extension_id = unpacker.read_u32()?;
        let vendor_extension_version = unpacker.read_u16()?;
        let vendor_extension_desc = unpacker.read_string()?;
        let functional_mode = unpacker.read_u16()?;
        let operations_supported = expect_u16_array(unpacker.read_array(SimpleForm::U16)?);
        let events_supported = expect_u16_array(unpacker.read_array(SimpleForm::U16)?);
        let device_properties_supported = expect_u16_array(unpacker.read_array(SimpleForm::U16)?);
        Ok(Self {
            standard_version,
            vendor_extension_id,
            vendor_extension_version,
            vendor_extension_desc,
            functional_mode,
            operations_supported,
            events_supported,
            device_properties_supported,
        })
    }

    pub fn supports_operation(&self, opcode: u16) -> bool {
        self.operations_supported.contains(&opcode)
    }
}

/// Canon EOS GetDeviceInfoEx dataset: a reserved u32 then two u32 arrays.
#[derive(Debug, Clone)]
pub struct EosDeviceInfo {
    pub events_supported: Vec<u32>,
    pub device_properties_supported: Vec<u32>,
}

impl EosDeviceInfo {
    pub fn decode(buf: &[u8]) -> Result<Self, DescriptorError> {
        let mut unpacker = Unpacker::new(buf);
        let _reserved = unpacker.read_u32()?;
        let events_supported = expect_u32_array(unpacker.read_array(SimpleForm::U32)?);
        let device_properties_supported = expect_u32_array(unpacker.read_array(SimpleForm::U32)?);
        Ok(Self {
            events_supported,
            device_properties_supported,
        })
    }
}

/// Metadata for one stored object.
///
/// Only the leading fixed-offset fields are decoded; the rest of the
/// ObjectInfo dataset (filename, capture date, ...) is not needed here.
#[derive(Debug, Clone, Copy)]
pub struct ObjectInfo {
    pub storage_id: u32,
    pub object_format: u16,
    pub protection_status: u16,
    pub object_compressed_size: u32,
}

impl ObjectInfo {
    /// Minimum payload covering the decoded fields.
    pub const MIN_SIZE: usize = 12;

    pub fn decode(buf: &[u8]) -> Result<Self, DescriptorError> {
        if buf.len() < Self::MIN_SIZE {
            return Err(UnpackError::BufferUnderrun {
                offset: 0,
                needed: Self::MIN_SIZE,
                remaining: buf.len(),
            }
            .into());
        }
        Ok(Self {
            storage_id: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            object_format: u16::from_le_bytes([buf[4], buf[5]]),
            protection_status: u16::from_le_bytes([buf[6], buf[7]]),
            object_compressed_size: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }
}

/// The shape of a property's allowed values.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyForm {
    /// Form byte 0: no constraint advertised.
    Plain,
    /// Form byte 1: inclusive range with step.
    Range {
        minimum: Value,
        maximum: Value,
        step: Value,
    },
    /// Form byte 2: explicit list of allowed values.
    Enumeration(Vec<Value>),
}

/// One device property's shape and current state.
#[derive(Debug, Clone)]
pub struct DevicePropertyInfo {
    pub property_code: u16,
    pub data_type: u16,
    /// false = read-only, true = read-write.
    pub read_write: bool,
    pub factory_default: Value,
    pub current: Value,
    pub form: PropertyForm,
}

impl DevicePropertyInfo {
    pub fn decode(buf: &[u8]) -> Result<Self, DescriptorError> {
        let mut unpacker = Unpacker::new(buf);
        let property_code = unpacker.read_u16()?;
        let data_type = unpacker.read_u16()?;
        let read_write = unpacker.read_u8()? != 0;

        let (is_array, form_tag) = lookup_data_type(data_type)
            .ok_or(DescriptorError::UnknownPropertyType { data_type })?;

        let factory_default = unpacker.read_simple(is_array, form_tag)?;
        let current = unpacker.read_simple(is_array, form_tag)?;

        let form = match unpacker.read_u8()? {
            0 => PropertyForm::Plain,
            1 => PropertyForm::Range {
                minimum: unpacker.read_simple(is_array, form_tag)?,
                maximum: unpacker.read_simple(is_array, form_tag)?,
                step: unpacker.read_simple(is_array, form_tag)?,
            },
            2 => {
                let count = unpacker.read_u16()? as usize;
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(unpacker.read_simple(is_array, form_tag)?);
                }
                PropertyForm::Enumeration(values)
            }
            other => return Err(DescriptorError::UnknownPropertyForm { form: other }),
        };

        Ok(Self {
            property_code,
            data_type,
            read_write,
            factory_default,
            current,
            form,
        })
    }
}

fn expect_u16_array(value: Value) -> Vec<u16> {
    match value {
        Value::ArrayU16(items) => items,
        _ => Vec::new(),
    }
}

fn expect_u32_array(value: Value) -> Vec<u32> {
    match value {
        Value::ArrayU32(items) => items,
        _ => Vec::new(),
    }
}
