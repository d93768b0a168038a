//! Sequential little-endian reader for DATA payloads.
//!
//! The cursor only advances on successful reads; a read past the end of
//! the buffer fails with [`UnpackError::BufferUnderrun`] and leaves the
//! cursor where it was.

use thiserror::Error;

use crate::protocol::format::{SimpleForm, Value};

#[derive(Error, Debug)]
pub enum UnpackError {
    #[error("buffer underrun at offset {offset}: need {needed} more bytes, {remaining} left")]
    BufferUnderrun {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("unsupported element format {form:?} for array decode")]
    UnsupportedFormat { form: SimpleForm },
}

/// Cursor-based unpacker over one DATA payload.
pub struct Unpacker<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Unpacker<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], UnpackError> {
        if self.remaining() < len {
            return Err(UnpackError::BufferUnderrun {
                offset: self.offset,
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, UnpackError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, UnpackError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, UnpackError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// One length byte (character count), then that many UTF-16LE code
    /// units. Unpaired surrogates are replaced rather than rejected.
    pub fn read_string(&mut self) -> Result<String, UnpackError> {
        let char_count = self.read_u8()? as usize;
        let bytes = self.take(char_count * 2)?;
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(String::from_utf16_lossy(&units))
    }

    /// One u32 element count, then that many u16 or u32 elements.
    pub fn read_array(&mut self, form: SimpleForm) -> Result<Value, UnpackError> {
        let count = self.read_u32()? as usize;
        match form {
            SimpleForm::U16 => {
                let mut items = Vec::with_capacity(count.min(self.remaining() / 2));
                for _ in 0..count {
                    items.push(self.read_u16()?);
                }
                Ok(Value::ArrayU16(items))
            }
            SimpleForm::U32 => {
                let mut items = Vec::with_capacity(count.min(self.remaining() / 4));
                for _ in 0..count {
                    items.push(self.read_u32()?);
                }
                Ok(Value::ArrayU32(items))
            }
            other => Err(UnpackError::UnsupportedFormat { form: other }),
        }
    }

    /// Dispatch to an array or scalar read by format tag.
    pub fn read_simple(&mut self, is_array: bool, form: SimpleForm) -> Result<Value, UnpackError> {
        if is_array {
            return self.read_array(form);
        }
        match form {
            SimpleForm::U8 => Ok(Value::U8(self.read_u8()?)),
            SimpleForm::U16 => Ok(Value::U16(self.read_u16()?)),
            SimpleForm::U32 => Ok(Value::U32(self.read_u32()?)),
            SimpleForm::Str => Ok(Value::Str(self.read_string()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_advance_the_cursor() {
        let buf = [0x34, 0x12, 0x78, 0x56, 0x00, 0x00];
        let mut unpacker = Unpacker::new(&buf);
        assert_eq!(unpacker.read_u16().unwrap(), 0x1234);
        assert_eq!(unpacker.read_u32().unwrap(), 0x0000_5678);
        assert_eq!(unpacker.remaining(), 0);
    }

    #[test]
    fn underrun_leaves_cursor_in_place() {
        let buf = [0xAB];
        let mut unpacker = Unpacker::new(&buf);
        assert!(matches!(
            unpacker.read_u32().unwrap_err(),
            UnpackError::BufferUnderrun {
                offset: 0,
                needed: 4,
                remaining: 1
            }
        ));
        assert_eq!(unpacker.read_u8().unwrap(), 0xAB);
    }

    #[test]
    fn string_is_length_prefixed_utf16() {
        let buf = [3, b'E', 0, b'O', 0, b'S', 0, 0xFF];
        let mut unpacker = Unpacker::new(&buf);
        assert_eq!(unpacker.read_string().unwrap(), "EOS");
        assert_eq!(unpacker.remaining(), 1);
    }

    #[test]
    fn arrays_are_count_prefixed() {
        let buf = [2, 0, 0, 0, 0x01, 0x10, 0x02, 0x10];
        let mut unpacker = Unpacker::new(&buf);
        assert_eq!(
            unpacker.read_array(SimpleForm::U16).unwrap(),
            Value::ArrayU16(vec![0x1001, 0x1002])
        );
    }

    #[test]
    fn string_arrays_are_unsupported() {
        let buf = [1, 0, 0, 0];
        let mut unpacker = Unpacker::new(&buf);
        assert!(matches!(
            unpacker.read_simple(true, SimpleForm::Str).unwrap_err(),
            UnpackError::UnsupportedFormat {
                form: SimpleForm::Str
            }
        ));
    }

    #[test]
    fn read_simple_dispatches_by_tag() {
        let buf = [5, 0, 0, 0];
        let mut unpacker = Unpacker::new(&buf);
        assert_eq!(
            unpacker.read_simple(false, SimpleForm::U32).unwrap(),
            Value::U32(5)
        );
    }
}
