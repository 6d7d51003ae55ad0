//! Typed body field encoding.
//!
//! Each written value is prefixed by a 1-byte type tag. For the
//! length-prefixed tags (0..=8) the tag also selects the width of the
//! length prefix that follows and whether the payload is raw bytes (odd
//! tag) or UTF-16 wide bytes (even tag); `0` is a bare nil marker with no
//! length or payload. Primitive numeric tags (9 and up) have no length
//! prefix — their width is implied by the tag.

use crate::error::CoreError;

pub const TAG_NIL: u8 = 0;
pub const TAG_BYTES_8: u8 = 1;
pub const TAG_WIDE_8: u8 = 2;
pub const TAG_BYTES_16: u8 = 3;
pub const TAG_WIDE_16: u8 = 4;
pub const TAG_BYTES_32: u8 = 5;
pub const TAG_WIDE_32: u8 = 6;
pub const TAG_BYTES_64: u8 = 7;
pub const TAG_WIDE_64: u8 = 8;
pub const TAG_BOOL: u8 = 9;
pub const TAG_I8: u8 = 10;
pub const TAG_U8: u8 = 11;
pub const TAG_I16: u8 = 12;
pub const TAG_U16: u8 = 13;
pub const TAG_I32: u8 = 14;
pub const TAG_U32: u8 = 15;
pub const TAG_I64: u8 = 16;
pub const TAG_U64: u8 = 17;
pub const TAG_F32: u8 = 18;
pub const TAG_F64: u8 = 19;

/// Largest length-prefixed blob this codec will allocate for on decode.
/// Guards against a malicious/garbled 64-bit length field forcing an
/// unbounded allocation.
pub const MAX_BLOB_LEN: u64 = 64 * 1024 * 1024;

fn is_bytes_tag(tag: u8) -> bool {
    matches!(tag, TAG_BYTES_8 | TAG_BYTES_16 | TAG_BYTES_32 | TAG_BYTES_64)
}

fn is_wide_tag(tag: u8) -> bool {
    matches!(tag, TAG_WIDE_8 | TAG_WIDE_16 | TAG_WIDE_32 | TAG_WIDE_64)
}

/// A decoded field value, mirroring whatever was written.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyValue {
    Nil,
    Bytes(Vec<u8>),
    Wide(Vec<u8>),
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

/// Appends typed fields to a growable buffer.
#[derive(Debug, Default, Clone)]
pub struct BodyWriter {
    buf: Vec<u8>,
}

impl BodyWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    fn write_blob(&mut self, bytes_tag: u8, wide_tag: u8, data: &[u8], wide: bool) {
        let tag = if wide { wide_tag } else { bytes_tag };
        let n = data.len();
        match tag {
            TAG_BYTES_8 | TAG_WIDE_8 => {
                self.buf.push(tag);
                self.buf.push(n as u8);
            }
            TAG_BYTES_16 | TAG_WIDE_16 => {
                self.buf.push(tag);
                self.buf.extend_from_slice(&(n as u16).to_be_bytes());
            }
            TAG_BYTES_32 | TAG_WIDE_32 => {
                self.buf.push(tag);
                self.buf.extend_from_slice(&(n as u32).to_be_bytes());
            }
            _ => {
                self.buf.push(tag);
                self.buf.extend_from_slice(&(n as u64).to_be_bytes());
            }
        }
        self.buf.extend_from_slice(data);
    }

    /// Pick the smallest length-prefix width that fits `len`.
    fn width_tags_for(len: usize) -> (u8, u8) {
        if len <= u8::MAX as usize {
            (TAG_BYTES_8, TAG_WIDE_8)
        } else if len <= u16::MAX as usize {
            (TAG_BYTES_16, TAG_WIDE_16)
        } else if len <= u32::MAX as usize {
            (TAG_BYTES_32, TAG_WIDE_32)
        } else {
            (TAG_BYTES_64, TAG_WIDE_64)
        }
    }

    pub fn write_nil(&mut self) {
        self.buf.push(TAG_NIL);
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        let (b, w) = Self::width_tags_for(data.len());
        self.write_blob(b, w, data, false);
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    /// Writes a string as UTF-16LE wide bytes, e.g. for embedders that need
    /// to talk to wide-string APIs (spec's "Strings share the bytes
    /// encoding" only covers the plain-bytes case; wide is the distinct
    /// sibling tag).
    pub fn write_wide_string(&mut self, s: &str) {
        let mut wide = Vec::with_capacity(s.len() * 2);
        for unit in s.encode_utf16() {
            wide.extend_from_slice(&unit.to_le_bytes());
        }
        let (b, w) = Self::width_tags_for(wide.len());
        self.write_blob(b, w, &wide, true);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(TAG_BOOL);
        self.buf.push(v as u8);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.buf.push(TAG_I8);
        self.buf.push(v as u8);
    }
    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(TAG_U8);
        self.buf.push(v);
    }
    pub fn write_i16(&mut self, v: i16) {
        self.buf.push(TAG_I16);
        self.buf.extend_from_slice(&v.to_be_bytes());
    }
    pub fn write_u16(&mut self, v: u16) {
        self.buf.push(TAG_U16);
        self.buf.extend_from_slice(&v.to_be_bytes());
    }
    pub fn write_i32(&mut self, v: i32) {
        self.buf.push(TAG_I32);
        self.buf.extend_from_slice(&v.to_be_bytes());
    }
    pub fn write_u32(&mut self, v: u32) {
        self.buf.push(TAG_U32);
        self.buf.extend_from_slice(&v.to_be_bytes());
    }
    pub fn write_i64(&mut self, v: i64) {
        self.buf.push(TAG_I64);
        self.buf.extend_from_slice(&v.to_be_bytes());
    }
    pub fn write_u64(&mut self, v: u64) {
        self.buf.push(TAG_U64);
        self.buf.extend_from_slice(&v.to_be_bytes());
    }
    pub fn write_f32(&mut self, v: f32) {
        self.buf.push(TAG_F32);
        self.buf.extend_from_slice(&v.to_be_bytes());
    }
    pub fn write_f64(&mut self, v: f64) {
        self.buf.push(TAG_F64);
        self.buf.extend_from_slice(&v.to_be_bytes());
    }
}

/// Reads typed fields back out of a byte slice, in order.
pub struct BodyReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CoreError> {
        if self.remaining() < n {
            return Err(CoreError::Malformed("body: truncated read"));
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn read_len(&mut self, tag: u8) -> Result<u64, CoreError> {
        Ok(match tag {
            TAG_BYTES_8 | TAG_WIDE_8 => self.take(1)?[0] as u64,
            TAG_BYTES_16 | TAG_WIDE_16 => u16::from_be_bytes(self.take(2)?.try_into().unwrap()) as u64,
            TAG_BYTES_32 | TAG_WIDE_32 => u32::from_be_bytes(self.take(4)?.try_into().unwrap()) as u64,
            TAG_BYTES_64 | TAG_WIDE_64 => u64::from_be_bytes(self.take(8)?.try_into().unwrap()),
            _ => return Err(CoreError::Malformed("body: not a length-prefixed tag")),
        })
    }

    /// Reads one typed value, mirroring the writer exactly. An unknown tag
    /// is a hard error.
    pub fn read_any(&mut self) -> Result<BodyValue, CoreError> {
        let tag = self.take(1)?[0];
        match tag {
            TAG_NIL => Ok(BodyValue::Nil),
            t if is_bytes_tag(t) => {
                let len = self.read_len(t)?;
                if len > MAX_BLOB_LEN {
                    return Err(CoreError::Limit("body blob exceeds max length"));
                }
                Ok(BodyValue::Bytes(self.take(len as usize)?.to_vec()))
            }
            t if is_wide_tag(t) => {
                let len = self.read_len(t)?;
                if len > MAX_BLOB_LEN {
                    return Err(CoreError::Limit("body blob exceeds max length"));
                }
                Ok(BodyValue::Wide(self.take(len as usize)?.to_vec()))
            }
            TAG_BOOL => Ok(BodyValue::Bool(self.take(1)?[0] != 0)),
            TAG_I8 => Ok(BodyValue::I8(self.take(1)?[0] as i8)),
            TAG_U8 => Ok(BodyValue::U8(self.take(1)?[0])),
            TAG_I16 => Ok(BodyValue::I16(i16::from_be_bytes(self.take(2)?.try_into().unwrap()))),
            TAG_U16 => Ok(BodyValue::U16(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))),
            TAG_I32 => Ok(BodyValue::I32(i32::from_be_bytes(self.take(4)?.try_into().unwrap()))),
            TAG_U32 => Ok(BodyValue::U32(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))),
            TAG_I64 => Ok(BodyValue::I64(i64::from_be_bytes(self.take(8)?.try_into().unwrap()))),
            TAG_U64 => Ok(BodyValue::U64(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))),
            TAG_F32 => Ok(BodyValue::F32(f32::from_be_bytes(self.take(4)?.try_into().unwrap()))),
            TAG_F64 => Ok(BodyValue::F64(f64::from_be_bytes(self.take(8)?.try_into().unwrap()))),
            _ => Err(CoreError::Malformed("body: unknown type tag")),
        }
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, CoreError> {
        match self.read_any()? {
            BodyValue::Bytes(b) => Ok(b),
            _ => Err(CoreError::Malformed("body: expected bytes")),
        }
    }

    pub fn read_string(&mut self) -> Result<String, CoreError> {
        let b = self.read_bytes()?;
        String::from_utf8(b).map_err(|_| CoreError::Malformed("body: invalid utf8"))
    }

    pub fn read_u8(&mut self) -> Result<u8, CoreError> {
        match self.read_any()? {
            BodyValue::U8(v) => Ok(v),
            _ => Err(CoreError::Malformed("body: expected u8")),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16, CoreError> {
        match self.read_any()? {
            BodyValue::U16(v) => Ok(v),
            _ => Err(CoreError::Malformed("body: expected u16")),
        }
    }

    pub fn read_u32(&mut self) -> Result<u32, CoreError> {
        match self.read_any()? {
            BodyValue::U32(v) => Ok(v),
            _ => Err(CoreError::Malformed("body: expected u32")),
        }
    }

    pub fn read_u64(&mut self) -> Result<u64, CoreError> {
        match self.read_any()? {
            BodyValue::U64(v) => Ok(v),
            _ => Err(CoreError::Malformed("body: expected u64")),
        }
    }

    pub fn read_bool(&mut self) -> Result<bool, CoreError> {
        match self.read_any()? {
            BodyValue::Bool(v) => Ok(v),
            _ => Err(CoreError::Malformed("body: expected bool")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_mixed_fields() {
        let mut w = BodyWriter::new();
        w.write_string("hello");
        w.write_u32(0xDEADBEEF);
        w.write_bool(true);
        w.write_nil();
        w.write_f64(3.5);
        let buf = w.into_inner();

        let mut r = BodyReader::new(&buf);
        assert_eq!(r.read_string().unwrap(), "hello");
        assert_eq!(r.read_u32().unwrap(), 0xDEADBEEF);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_any().unwrap(), BodyValue::Nil);
        assert_eq!(r.read_any().unwrap(), BodyValue::F64(3.5));
        assert!(r.is_empty());
    }

    #[test]
    fn wide_string_roundtrip() {
        let mut w = BodyWriter::new();
        w.write_wide_string("hi");
        let buf = w.into_inner();
        let mut r = BodyReader::new(&buf);
        match r.read_any().unwrap() {
            BodyValue::Wide(bytes) => {
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect();
                assert_eq!(String::from_utf16(&units).unwrap(), "hi");
            }
            other => panic!("expected wide, got {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_is_malformed() {
        let buf = [0xFFu8];
        let mut r = BodyReader::new(&buf);
        assert!(matches!(r.read_any(), Err(CoreError::Malformed(_))));
    }

    #[test]
    fn truncated_read_is_malformed() {
        let mut w = BodyWriter::new();
        w.write_u32(1);
        let mut buf = w.into_inner();
        buf.truncate(2);
        let mut r = BodyReader::new(&buf);
        assert!(matches!(r.read_any(), Err(CoreError::Malformed(_))));
    }

    #[test]
    fn length_width_picked_by_size() {
        let mut w = BodyWriter::new();
        w.write_bytes(&vec![0u8; 300]);
        let buf = w.into_inner();
        assert_eq!(buf[0], TAG_BYTES_16);
    }
}
