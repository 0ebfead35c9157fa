use crate::error::{Error, Result};

/// Sequential little-endian reader over one save-file image.
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn short_read(&self, needed: usize) -> Error {
        Error::TruncatedInput {
            offset: self.pos,
            needed: needed - self.remaining(),
        }
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(self.short_read(n));
        }
        self.pos += n;
        Ok(())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(self.short_read(n));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        if self.remaining() < 1 {
            return Err(self.short_read(1));
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Read a length-prefixed string. The prefix escalates: one byte, or
    /// 0xFF followed by a u16, or 0xFF 0xFFFF followed by a u32. The length
    /// counts raw bytes; there is no terminator.
    pub fn read_string(&mut self) -> Result<String> {
        let mut len = self.read_u8()? as u32;
        if len == 0xff {
            len = self.read_u16()? as u32;
            if len == 0xffff {
                len = self.read_u32()?;
            }
        }
        let bytes = self.read_bytes(len as usize)?;
        Ok(latin1(bytes))
    }
}

/// Decode raw bytes as Latin-1. The format predates UTF-8; this keeps every
/// byte value representable and string equality stable.
pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Latin-1 decode, truncated at the first NUL. Fixed-width string fields
/// are NUL-padded C strings.
pub fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    latin1(&bytes[..end])
}
