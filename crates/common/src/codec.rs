// Variable-length binary primitives (lib0-compatible).
//
// Integers are encoded 7 bits per byte, least significant group first,
// with the continuation bit (0x80) set on every byte except the last.
// Byte arrays and strings are length-prefixed with a varuint.

use thiserror::Error;

/// Decode failure for a binary frame. Callers treat every variant as
/// "drop this frame"; a malformed frame never tears down a connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer ended mid-varint")]
    TruncatedVarInt,

    #[error("varint exceeds 64 bits")]
    VarIntOverflow,

    #[error("buffer ended mid-payload: need {needed} bytes, have {available}")]
    TruncatedPayload { needed: usize, available: usize },

    #[error("length-prefixed string is not valid utf-8")]
    InvalidUtf8,

    #[error("unknown message tag {0}")]
    UnknownTag(u64),
}

/// Append-only frame writer.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_var_uint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.push(0x80 | (value as u8 & 0x7f));
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    pub fn write_var_bytes(&mut self, bytes: &[u8]) {
        self.write_var_uint(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_var_string(&mut self, value: &str) {
        self.write_var_bytes(value.as_bytes());
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a received frame. Reads exactly what it needs; trailing
/// bytes are left unread (the original decoder behaves the same way).
#[derive(Debug)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_var_uint(&mut self) -> Result<u64, CodecError> {
        let mut value: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = *self.buf.get(self.pos).ok_or(CodecError::TruncatedVarInt)?;
            self.pos += 1;
            if shift > 63 || (shift == 63 && byte & 0x7f > 1) {
                return Err(CodecError::VarIntOverflow);
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    pub fn read_var_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.read_var_uint()? as usize;
        let available = self.remaining();
        if len > available {
            return Err(CodecError::TruncatedPayload { needed: len, available });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_var_string(&mut self) -> Result<&'a str, CodecError> {
        let bytes = self.read_var_bytes()?;
        std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_uint(value: u64) {
        let mut encoder = Encoder::new();
        encoder.write_var_uint(value);
        let bytes = encoder.into_bytes();
        let mut decoder = Decoder::new(&bytes);
        assert_eq!(decoder.read_var_uint().unwrap(), value);
        assert_eq!(decoder.remaining(), 0);
    }

    #[test]
    fn var_uint_roundtrips_boundary_values() {
        for value in [0, 1, 0x7f, 0x80, 0x3fff, 0x4000, u32::MAX as u64, u64::MAX] {
            roundtrip_uint(value);
        }
    }

    #[test]
    fn var_uint_small_values_are_one_byte() {
        let mut encoder = Encoder::new();
        encoder.write_var_uint(0x7f);
        assert_eq!(encoder.into_bytes(), vec![0x7f]);
    }

    #[test]
    fn var_uint_continuation_bit_layout() {
        // 300 = 0b100101100 -> low 7 bits 0x2c with continuation, then 0x02.
        let mut encoder = Encoder::new();
        encoder.write_var_uint(300);
        assert_eq!(encoder.into_bytes(), vec![0xac, 0x02]);
    }

    #[test]
    fn truncated_varint_is_an_error() {
        let mut decoder = Decoder::new(&[0x80]);
        assert_eq!(decoder.read_var_uint(), Err(CodecError::TruncatedVarInt));
    }

    #[test]
    fn overlong_varint_is_an_error() {
        let bytes = [0xff; 11];
        let mut decoder = Decoder::new(&bytes);
        assert_eq!(decoder.read_var_uint(), Err(CodecError::VarIntOverflow));
    }

    #[test]
    fn var_bytes_roundtrip() {
        let payload = b"doc update bytes";
        let mut encoder = Encoder::new();
        encoder.write_var_bytes(payload);
        let bytes = encoder.into_bytes();
        let mut decoder = Decoder::new(&bytes);
        assert_eq!(decoder.read_var_bytes().unwrap(), payload);
    }

    #[test]
    fn var_bytes_truncated_payload_is_an_error() {
        let mut encoder = Encoder::new();
        encoder.write_var_bytes(b"hello");
        let mut bytes = encoder.into_bytes();
        bytes.truncate(bytes.len() - 2);
        let mut decoder = Decoder::new(&bytes);
        assert_eq!(
            decoder.read_var_bytes(),
            Err(CodecError::TruncatedPayload { needed: 5, available: 3 })
        );
    }

    #[test]
    fn var_string_roundtrip() {
        let mut encoder = Encoder::new();
        encoder.write_var_string("Ann ✎");
        let bytes = encoder.into_bytes();
        let mut decoder = Decoder::new(&bytes);
        assert_eq!(decoder.read_var_string().unwrap(), "Ann ✎");
    }

    #[test]
    fn var_string_rejects_invalid_utf8() {
        let mut encoder = Encoder::new();
        encoder.write_var_bytes(&[0xff, 0xfe]);
        let bytes = encoder.into_bytes();
        let mut decoder = Decoder::new(&bytes);
        assert_eq!(decoder.read_var_string(), Err(CodecError::InvalidUtf8));
    }
}
