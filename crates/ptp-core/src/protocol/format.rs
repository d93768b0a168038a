//! Primitive wire formats and the property data-type registry.
//!
//! PTP property descriptors name their value layout with a 16-bit data
//! type code. The registry maps each supported code to a closed
//! [`SimpleForm`] plus an is-array flag; decoding refuses codes it does
//! not know rather than guessing a width.

use byteorder::{LittleEndian, WriteBytesExt};
use std::fmt;

/// Closed enumeration of the scalar wire formats this stack decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleForm {
    U8,
    U16,
    U32,
    Str,
}

/// A decoded property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    Str(String),
    ArrayU16(Vec<u16>),
    ArrayU32(Vec<u32>),
}

impl Value {
    /// Widen any scalar integer value to u32.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U8(v) => Some(u32::from(*v)),
            Value::U16(v) => Some(u32::from(*v)),
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Encode in PTP little-endian wire layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Value::U8(v) => out.push(*v),
            Value::U16(v) => out.write_u16::<LittleEndian>(*v).unwrap(),
            Value::U32(v) => out.write_u32::<LittleEndian>(*v).unwrap(),
            Value::Str(s) => {
                out.push(s.encode_utf16().count() as u8);
                for unit in s.encode_utf16() {
                    out.write_u16::<LittleEndian>(unit).unwrap();
                }
            }
            Value::ArrayU16(items) => {
                out.write_u32::<LittleEndian>(items.len() as u32).unwrap();
                for item in items {
                    out.write_u16::<LittleEndian>(*item).unwrap();
                }
            }
            Value::ArrayU32(items) => {
                out.write_u32::<LittleEndian>(items.len() as u32).unwrap();
                for item in items {
                    out.write_u32::<LittleEndian>(*item).unwrap();
                }
            }
        }
        out
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::U8(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::ArrayU16(items) => write!(f, "{items:?}"),
            Value::ArrayU32(items) => write!(f, "{items:?}"),
        }
    }
}

/// Look up a PTP data type code, yielding `(is_array, form)`.
///
/// Covers the subset of PIMA 15740 data types the session decodes.
pub fn lookup_data_type(data_type: u16) -> Option<(bool, SimpleForm)> {
    match data_type {
        0x0002 => Some((false, SimpleForm::U8)),
        0x0004 => Some((false, SimpleForm::U16)),
        0x0006 => Some((false, SimpleForm::U32)),
        0x4004 => Some((true, SimpleForm::U16)),
        0x4006 => Some((true, SimpleForm::U32)),
        0xFFFF => Some((false, SimpleForm::Str)),
        _ => None,
    }
}
