//! Serialization contexts used by every codec step.
//!
//! A context lives for exactly one encode or one decode pass over a single
//! message and is never shared between messages. Besides the byte cursor it
//! carries the name-compression table: domain suffixes registered together
//! with the absolute offset at which they were written or read, so that later
//! names can be emitted as (or resolved from) 14-bit back-pointers.
use std::collections::HashMap;
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{DNSError, DNSResult};

// a compression pointer only holds 14 bits of offset
pub const MAX_POINTER_OFFSET: usize = 0x3FFF;

/// Context owned by one encode pass. The output buffer doubles as the
/// cursor: the current offset is always the number of bytes written so far.
#[derive(Debug, Default)]
pub struct EncodeCtx {
    buffer: Vec<u8>,
    domain_idx: HashMap<String, u16>,
}

impl EncodeCtx {
    pub fn new() -> Self {
        EncodeCtx::default()
    }

    /// Absolute offset the next byte will be written at.
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    pub fn pack_u8(&mut self, value: u8) -> DNSResult<usize> {
        self.buffer.write_u8(value)?;
        Ok(1)
    }

    pub fn pack_u16(&mut self, value: u16) -> DNSResult<usize> {
        self.buffer.write_u16::<BigEndian>(value)?;
        Ok(2)
    }

    pub fn pack_u32(&mut self, value: u32) -> DNSResult<usize> {
        self.buffer.write_u32::<BigEndian>(value)?;
        Ok(4)
    }

    // 48-bit integers only appear in the TSIG time-signed field
    pub fn pack_u48(&mut self, value: u64) -> DNSResult<usize> {
        self.buffer.write_u48::<BigEndian>(value)?;
        Ok(6)
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> DNSResult<usize> {
        self.buffer.extend_from_slice(data);
        Ok(data.len())
    }

    /// Overwrite two bytes written earlier. Used to back-patch the rdlength
    /// field once a record's content has been encoded.
    pub fn patch_u16(&mut self, offset: usize, value: u16) -> DNSResult<()> {
        if offset + 2 > self.buffer.len() {
            return Err(DNSError::malformed("length patch beyond buffer"));
        }
        self.buffer[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Remember that `name` starts at the current offset. Offsets beyond the
    /// 14-bit pointer range are not registered: they could never be the
    /// target of a pointer.
    pub fn register_name(&mut self, name: &str) {
        let offset = self.offset();
        if offset <= MAX_POINTER_OFFSET && !self.domain_idx.contains_key(name) {
            self.domain_idx.insert(name.to_string(), offset as u16);
        }
    }

    pub fn name_offset(&self, name: &str) -> Option<u16> {
        self.domain_idx.get(name).copied()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

/// Context owned by one decode pass over a complete message.
#[derive(Debug)]
pub struct DecodeCtx<'a> {
    cursor: Cursor<&'a [u8]>,
    idx_domain: HashMap<u16, String>,
}

impl<'a> DecodeCtx<'a> {
    pub fn new(raw: &'a [u8]) -> Self {
        DecodeCtx {
            cursor: Cursor::new(raw),
            idx_domain: HashMap::new(),
        }
    }

    /// Absolute offset of the next byte to be read.
    pub fn offset(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len() - self.offset()
    }

    pub fn unpack_u8(&mut self) -> DNSResult<u8> {
        self.cursor
            .read_u8()
            .map_err(|_| DNSError::malformed("packet truncated"))
    }

    pub fn unpack_u16(&mut self) -> DNSResult<u16> {
        self.cursor
            .read_u16::<BigEndian>()
            .map_err(|_| DNSError::malformed("packet truncated"))
    }

    pub fn unpack_u32(&mut self) -> DNSResult<u32> {
        self.cursor
            .read_u32::<BigEndian>()
            .map_err(|_| DNSError::malformed("packet truncated"))
    }

    pub fn unpack_u48(&mut self) -> DNSResult<u64> {
        self.cursor
            .read_u48::<BigEndian>()
            .map_err(|_| DNSError::malformed("packet truncated"))
    }

    /// Read exactly `n` bytes, failing with a truncation error when fewer
    /// are left.
    pub fn read_bytes(&mut self, n: usize) -> DNSResult<Vec<u8>> {
        if self.remaining() < n {
            return Err(DNSError::malformed("packet truncated"));
        }
        let start = self.offset();
        let data = self.cursor.get_ref()[start..start + n].to_vec();
        self.cursor.set_position((start + n) as u64);
        Ok(data)
    }

    /// Remember that `name` was read starting at `offset`, so later
    /// compression pointers can resolve to it.
    pub fn register_name(&mut self, offset: usize, name: &str) {
        if offset <= MAX_POINTER_OFFSET && !self.idx_domain.contains_key(&(offset as u16)) {
            self.idx_domain.insert(offset as u16, name.to_string());
        }
    }

    pub fn name_at(&self, offset: u16) -> Option<&str> {
        self.idx_domain.get(&offset).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_primitives() {
        let mut ctx = EncodeCtx::new();
        ctx.pack_u8(0x12).unwrap();
        ctx.pack_u16(0x3456).unwrap();
        ctx.pack_u32(0x789abcde).unwrap();
        ctx.pack_u48(0x0102_0304_0506).unwrap();
        assert_eq!(ctx.offset(), 13);
        assert_eq!(
            ctx.bytes(),
            &[0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]
        );
    }

    #[test]
    fn decode_primitives() {
        let raw = [0x12u8, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let mut ctx = DecodeCtx::new(&raw);
        assert_eq!(ctx.unpack_u8().unwrap(), 0x12);
        assert_eq!(ctx.unpack_u16().unwrap(), 0x3456);
        assert_eq!(ctx.unpack_u32().unwrap(), 0x789abcde);
        assert_eq!(ctx.unpack_u48().unwrap(), 0x0102_0304_0506);
        assert_eq!(ctx.remaining(), 0);
        assert!(ctx.unpack_u8().is_err());
    }

    #[test]
    fn bounded_reads() {
        let raw = [1u8, 2, 3];
        let mut ctx = DecodeCtx::new(&raw);
        assert_eq!(ctx.read_bytes(2).unwrap(), vec![1, 2]);
        assert!(ctx.read_bytes(2).is_err());
    }

    #[test]
    fn patching() {
        let mut ctx = EncodeCtx::new();
        ctx.pack_u16(0).unwrap();
        ctx.pack_u8(0xff).unwrap();
        ctx.patch_u16(0, 0xabcd).unwrap();
        assert_eq!(ctx.bytes(), &[0xab, 0xcd, 0xff]);
        assert!(ctx.patch_u16(2, 0).is_err());
    }

    #[test]
    fn name_registry() {
        let mut ctx = EncodeCtx::new();
        ctx.register_name("example.com");
        ctx.pack_u32(0).unwrap();
        // first registration wins
        ctx.register_name("example.com");
        assert_eq!(ctx.name_offset("example.com"), Some(0));
        assert_eq!(ctx.name_offset("com"), None);
    }
}
