//! Domain-name wire codec with RFC 1035 §4.1.4 compression.
//!
//! The compression scheme allows a domain name in a message to be
//! represented as either:
//!   - a sequence of labels ending in a zero octet
//!   - a pointer
//!   - a sequence of labels ending with a pointer
//!
//! The pointer takes the form of a two octet sequence:
//!
//! ```text
//! +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//! | 1  1|                OFFSET                   |
//! +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
//! ```
//!
//! The first two bits are ones. This allows a pointer to be distinguished
//! from a label, since the label must begin with two zero bits because
//! labels are restricted to 63 octets or less. The 10 and 01 combinations
//! are reserved for future use. The OFFSET field specifies an offset from
//! the start of the message.
use crate::context::{DecodeCtx, EncodeCtx};
use crate::error::{DNSError, DNSResult, InternalError};
use crate::network_order::{FromNetworkOrder, ToNetworkOrder};
use crate::rfc1035::DomainName;

impl ToNetworkOrder for DomainName {
    /// Walk the name suffix by suffix. The first suffix already registered
    /// in the context is emitted as a back-pointer and ends the name; every
    /// suffix written literally is registered at its offset so later names
    /// can point at it. The root name is the single zero byte.
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
        let mut length = 0usize;

        for i in 0..self.0.len() {
            let suffix = self.suffix(i);

            if let Some(offset) = ctx.name_offset(&suffix) {
                // a registered offset is always behind the write cursor
                length += ctx.pack_u16(0b1100_0000_0000_0000 | offset)?;
                return Ok(length);
            }
            ctx.register_name(&suffix);

            let label = &self.0[i];
            if label.is_empty() || label.len() > 63 {
                return Err(DNSError::DNSInternalError(
                    InternalError::DnsDomainNameTooLong,
                ));
            }
            ctx.pack_u8(label.len() as u8)?;
            ctx.write_bytes(label.as_bytes())?;
            length += 1 + label.len();
        }

        // the root label ends the name
        length += ctx.pack_u8(0)?;
        Ok(length)
    }
}

impl FromNetworkOrder for DomainName {
    /// Read labels until the root label or a pointer. A pointer must target
    /// a name the decoder has already registered: anything else — an offset
    /// beyond the message, a forward reference, the middle of a label, or a
    /// chain that loops back onto itself — fails as a format error without
    /// ever re-walking the buffer.
    fn from_network_bytes(&mut self, ctx: &mut DecodeCtx<'_>) -> DNSResult<()> {
        let mut labels: Vec<String> = Vec::new();
        // absolute offset of each literal label read, for registration
        let mut offsets: Vec<usize> = Vec::new();
        let mut tail: Option<String> = None;

        loop {
            let offset = ctx.offset();
            let length = ctx.unpack_u8()?;

            match length >> 6 {
                0b00 => {
                    if length == 0 {
                        break;
                    }
                    let raw = ctx.read_bytes(length as usize)?;
                    labels.push(String::from_utf8(raw)?);
                    offsets.push(offset);
                }
                0b11 => {
                    let low = ctx.unpack_u8()?;
                    let pointer = ((length & 0b0011_1111) as u16) << 8 | low as u16;
                    let target = ctx.name_at(pointer).ok_or_else(|| {
                        DNSError::malformed("compression pointer to unknown offset")
                    })?;
                    tail = Some(target.to_string());
                    break;
                }
                // the 01 and 10 tags are reserved
                _ => return Err(DNSError::malformed("reserved label tag")),
            }
        }

        // stitch literal labels and the pointed-to remainder together
        if let Some(tail) = tail {
            labels.extend(tail.split('.').map(String::from));
        }

        // register every suffix starting at a literal label, so that later
        // records can compress back to these positions
        for (i, offset) in offsets.iter().enumerate() {
            let suffix = labels[i..].join(".");
            ctx.register_name(*offset, &suffix);
        }

        self.0 = labels;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_name() {
        let dn = DomainName::try_from("www.google.com").unwrap();
        let mut ctx = EncodeCtx::new();
        assert_eq!(dn.to_network_bytes(&mut ctx).unwrap(), 16);
        assert_eq!(
            ctx.bytes(),
            &[
                0x03, 0x77, 0x77, 0x77, 0x06, 0x67, 0x6f, 0x6f, 0x67, 0x6c, 0x65, 0x03, 0x63,
                0x6f, 0x6d, 0x00
            ]
        );
    }

    #[test]
    fn root_name() {
        let mut ctx = EncodeCtx::new();
        assert_eq!(DomainName::root().to_network_bytes(&mut ctx).unwrap(), 1);
        assert_eq!(ctx.bytes(), &[0x00]);

        let raw = [0x00u8];
        let mut ctx = DecodeCtx::new(&raw);
        let mut dn = DomainName::default();
        dn.from_network_bytes(&mut ctx).unwrap();
        assert!(dn.is_root());
    }

    #[test]
    fn suffix_compression_on_encode() {
        let mut ctx = EncodeCtx::new();

        let first = DomainName::try_from("www.example.com").unwrap();
        assert_eq!(first.to_network_bytes(&mut ctx).unwrap(), 17);

        // "example.com" was registered at offset 4 while writing the first
        // name, so the second name collapses into a single pointer
        let second = DomainName::try_from("example.com").unwrap();
        assert_eq!(second.to_network_bytes(&mut ctx).unwrap(), 2);

        let third = DomainName::try_from("example.com").unwrap();
        assert_eq!(third.to_network_bytes(&mut ctx).unwrap(), 2);

        let bytes = ctx.into_bytes();
        assert_eq!(&bytes[17..19], &[0xc0, 0x04]);
        assert_eq!(&bytes[19..21], &[0xc0, 0x04]);
    }

    #[test]
    fn partial_compression_on_encode() {
        let mut ctx = EncodeCtx::new();

        let first = DomainName::try_from("example.com").unwrap();
        first.to_network_bytes(&mut ctx).unwrap();

        // shares the "example.com" suffix: one literal label plus a pointer
        let second = DomainName::try_from("mail.example.com").unwrap();
        assert_eq!(second.to_network_bytes(&mut ctx).unwrap(), 7);
        assert_eq!(&ctx.bytes()[13..20], &[0x04, b'm', b'a', b'i', b'l', 0xc0, 0x00]);
    }

    #[test]
    fn decode_with_pointers() {
        // example.com | www + pointer | bare pointer
        let raw = [
            0x07, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0x03, b'c', b'o', b'm', 0x00, //
            0x03, b'w', b'w', b'w', 0xc0, 0x00, //
            0xc0, 0x00,
        ];
        let mut ctx = DecodeCtx::new(&raw);

        let mut first = DomainName::default();
        first.from_network_bytes(&mut ctx).unwrap();
        assert_eq!(first.to_string(), "example.com");

        let mut second = DomainName::default();
        second.from_network_bytes(&mut ctx).unwrap();
        assert_eq!(second.to_string(), "www.example.com");

        let mut third = DomainName::default();
        third.from_network_bytes(&mut ctx).unwrap();
        assert_eq!(third.to_string(), "example.com");

        assert_eq!(ctx.remaining(), 0);
    }

    #[test]
    fn inner_suffixes_are_registered() {
        // decoding a.b.c also registers b.c and c, so a pointer may target
        // the middle of an earlier name
        let raw = [
            0x01, b'a', 0x01, b'b', 0x01, b'c', 0x00, //
            0xc0, 0x02,
        ];
        let mut ctx = DecodeCtx::new(&raw);

        let mut first = DomainName::default();
        first.from_network_bytes(&mut ctx).unwrap();
        assert_eq!(first.to_string(), "a.b.c");

        let mut second = DomainName::default();
        second.from_network_bytes(&mut ctx).unwrap();
        assert_eq!(second.to_string(), "b.c");
    }

    #[test]
    fn pointer_out_of_range() {
        // offset 0x10 is beyond the two-byte message
        let raw = [0xc0, 0x10];
        let mut ctx = DecodeCtx::new(&raw);
        let mut dn = DomainName::default();
        assert!(dn.from_network_bytes(&mut ctx).is_err());
    }

    #[test]
    fn pointer_cycle() {
        // a name that points at its own first byte
        let raw = [0xc0, 0x00];
        let mut ctx = DecodeCtx::new(&raw);
        let mut dn = DomainName::default();
        assert!(dn.from_network_bytes(&mut ctx).is_err());
    }

    #[test]
    fn mutual_pointer_cycle() {
        // two pointers chasing each other never resolve to a name
        let raw = [
            0x01, b'x', 0xc0, 0x04, //
            0x01, b'y', 0xc0, 0x00,
        ];
        let mut ctx = DecodeCtx::new(&raw);
        let mut dn = DomainName::default();
        assert!(dn.from_network_bytes(&mut ctx).is_err());
    }

    #[test]
    fn reserved_tags_rejected() {
        for first in [0b0100_0000u8, 0b1000_0000] {
            let raw = [first, 0x00];
            let mut ctx = DecodeCtx::new(&raw);
            let mut dn = DomainName::default();
            assert!(dn.from_network_bytes(&mut ctx).is_err());
        }
    }

    #[test]
    fn truncated_label() {
        let raw = [0x05, b'a', b'b'];
        let mut ctx = DecodeCtx::new(&raw);
        let mut dn = DomainName::default();
        assert!(dn.from_network_bytes(&mut ctx).is_err());
    }
}
