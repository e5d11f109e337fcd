//! Wire-codec implementations for the primitive building blocks: fixed-width
//! network-order integers, raw addresses and length-prefixed byte blobs.
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::context::{DecodeCtx, EncodeCtx};
use crate::error::{DNSError, DNSResult, InternalError};
use crate::network_order::{FromNetworkOrder, ToNetworkOrder};
use crate::rfc1035::CharacterString;

/// Width of the length prefix carried in front of a sized byte blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthWidth {
    U8,
    U16,
    U32,
}

/// Write a byte blob behind its length prefix. A blob longer than the
/// prefix can express is refused.
///
/// ```
/// use dnsgate::context::EncodeCtx;
/// use dnsgate::network_order::primitive::{pack_sized_bytes, LengthWidth};
///
/// let mut ctx = EncodeCtx::new();
/// assert_eq!(pack_sized_bytes(&mut ctx, LengthWidth::U16, &[0xaa, 0xbb]).unwrap(), 4);
/// assert_eq!(ctx.bytes(), &[0x00, 0x02, 0xaa, 0xbb]);
/// ```
pub fn pack_sized_bytes(ctx: &mut EncodeCtx, width: LengthWidth, data: &[u8]) -> DNSResult<usize> {
    let fits = match width {
        LengthWidth::U8 => data.len() <= u8::MAX as usize,
        LengthWidth::U16 => data.len() <= u16::MAX as usize,
        LengthWidth::U32 => data.len() <= u32::MAX as usize,
    };
    if !fits {
        return Err(DNSError::DNSInternalError(InternalError::BlobTooLong));
    }

    let prefix = match width {
        LengthWidth::U8 => ctx.pack_u8(data.len() as u8)?,
        LengthWidth::U16 => ctx.pack_u16(data.len() as u16)?,
        LengthWidth::U32 => ctx.pack_u32(data.len() as u32)?,
    };
    ctx.write_bytes(data)?;
    Ok(prefix + data.len())
}

/// Read a byte blob behind its length prefix. The read is bounded to the
/// announced length and fails with a truncation error when the packet holds
/// less than that.
///
/// ```
/// use dnsgate::context::DecodeCtx;
/// use dnsgate::network_order::primitive::{unpack_sized_bytes, LengthWidth};
///
/// let b = vec![0x00, 0x02, 0xaa, 0xbb];
/// let mut ctx = DecodeCtx::new(b.as_slice());
/// assert_eq!(unpack_sized_bytes(&mut ctx, LengthWidth::U16).unwrap(), vec![0xaa, 0xbb]);
/// ```
pub fn unpack_sized_bytes(ctx: &mut DecodeCtx<'_>, width: LengthWidth) -> DNSResult<Vec<u8>> {
    let size = match width {
        LengthWidth::U8 => ctx.unpack_u8()? as usize,
        LengthWidth::U16 => ctx.unpack_u16()? as usize,
        LengthWidth::U32 => ctx.unpack_u32()? as usize,
    };
    ctx.read_bytes(size)
}

impl ToNetworkOrder for u8 {
    /// ```
    /// use dnsgate::context::EncodeCtx;
    /// use dnsgate::network_order::ToNetworkOrder;
    ///
    /// let mut ctx = EncodeCtx::new();
    /// assert!(255_u8.to_network_bytes(&mut ctx).is_ok());
    /// assert_eq!(ctx.bytes(), &[0xFF]);
    /// ```
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
        ctx.pack_u8(*self)
    }
}

impl FromNetworkOrder for u8 {
    /// ```
    /// use dnsgate::context::DecodeCtx;
    /// use dnsgate::network_order::FromNetworkOrder;
    ///
    /// let b = vec![0xFF];
    /// let mut ctx = DecodeCtx::new(b.as_slice());
    /// let mut v = 0u8;
    /// assert!(v.from_network_bytes(&mut ctx).is_ok());
    /// assert_eq!(v, 255);
    /// ```
    fn from_network_bytes(&mut self, ctx: &mut DecodeCtx<'_>) -> DNSResult<()> {
        *self = ctx.unpack_u8()?;
        Ok(())
    }
}

impl ToNetworkOrder for u16 {
    /// ```
    /// use dnsgate::context::EncodeCtx;
    /// use dnsgate::network_order::ToNetworkOrder;
    ///
    /// let mut ctx = EncodeCtx::new();
    /// assert!(0x1234_u16.to_network_bytes(&mut ctx).is_ok());
    /// assert_eq!(ctx.bytes(), &[0x12, 0x34]);
    /// ```
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
        ctx.pack_u16(*self)
    }
}

impl FromNetworkOrder for u16 {
    /// ```
    /// use dnsgate::context::DecodeCtx;
    /// use dnsgate::network_order::FromNetworkOrder;
    ///
    /// let b = vec![0x12, 0x34];
    /// let mut ctx = DecodeCtx::new(b.as_slice());
    /// let mut v = 0u16;
    /// assert!(v.from_network_bytes(&mut ctx).is_ok());
    /// assert_eq!(v, 0x1234);
    /// ```
    fn from_network_bytes(&mut self, ctx: &mut DecodeCtx<'_>) -> DNSResult<()> {
        *self = ctx.unpack_u16()?;
        Ok(())
    }
}

impl ToNetworkOrder for u32 {
    /// ```
    /// use dnsgate::context::EncodeCtx;
    /// use dnsgate::network_order::ToNetworkOrder;
    ///
    /// let mut ctx = EncodeCtx::new();
    /// assert!(0x12345678_u32.to_network_bytes(&mut ctx).is_ok());
    /// assert_eq!(ctx.bytes(), &[0x12, 0x34, 0x56, 0x78]);
    /// ```
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
        ctx.pack_u32(*self)
    }
}

impl FromNetworkOrder for u32 {
    /// ```
    /// use dnsgate::context::DecodeCtx;
    /// use dnsgate::network_order::FromNetworkOrder;
    ///
    /// let b = vec![0x12, 0x34, 0x56, 0x78];
    /// let mut ctx = DecodeCtx::new(b.as_slice());
    /// let mut v = 0u32;
    /// assert!(v.from_network_bytes(&mut ctx).is_ok());
    /// assert_eq!(v, 0x12345678);
    /// ```
    fn from_network_bytes(&mut self, ctx: &mut DecodeCtx<'_>) -> DNSResult<()> {
        *self = ctx.unpack_u32()?;
        Ok(())
    }
}

impl ToNetworkOrder for Ipv4Addr {
    /// ```
    /// use std::net::Ipv4Addr;
    /// use dnsgate::context::EncodeCtx;
    /// use dnsgate::network_order::ToNetworkOrder;
    ///
    /// let mut ctx = EncodeCtx::new();
    /// assert_eq!(Ipv4Addr::new(1, 2, 3, 4).to_network_bytes(&mut ctx).unwrap(), 4);
    /// assert_eq!(ctx.bytes(), &[1, 2, 3, 4]);
    /// ```
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
        ctx.write_bytes(&self.octets())
    }
}

impl FromNetworkOrder for Ipv4Addr {
    /// ```
    /// use std::net::Ipv4Addr;
    /// use dnsgate::context::DecodeCtx;
    /// use dnsgate::network_order::FromNetworkOrder;
    ///
    /// let b = vec![1, 2, 3, 4];
    /// let mut ctx = DecodeCtx::new(b.as_slice());
    /// let mut ip = Ipv4Addr::UNSPECIFIED;
    /// assert!(ip.from_network_bytes(&mut ctx).is_ok());
    /// assert_eq!(ip, Ipv4Addr::new(1, 2, 3, 4));
    /// ```
    fn from_network_bytes(&mut self, ctx: &mut DecodeCtx<'_>) -> DNSResult<()> {
        let raw = ctx.read_bytes(4)?;
        let octets: [u8; 4] = [raw[0], raw[1], raw[2], raw[3]];
        *self = Ipv4Addr::from(octets);
        Ok(())
    }
}

impl ToNetworkOrder for Ipv6Addr {
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
        ctx.write_bytes(&self.octets())
    }
}

impl FromNetworkOrder for Ipv6Addr {
    /// ```
    /// use std::net::Ipv6Addr;
    /// use dnsgate::context::DecodeCtx;
    /// use dnsgate::network_order::FromNetworkOrder;
    ///
    /// let b = vec![0u8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
    /// let mut ctx = DecodeCtx::new(b.as_slice());
    /// let mut ip = Ipv6Addr::UNSPECIFIED;
    /// assert!(ip.from_network_bytes(&mut ctx).is_ok());
    /// assert_eq!(ip, Ipv6Addr::LOCALHOST);
    /// ```
    fn from_network_bytes(&mut self, ctx: &mut DecodeCtx<'_>) -> DNSResult<()> {
        let raw = ctx.read_bytes(16)?;
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&raw);
        *self = Ipv6Addr::from(octets);
        Ok(())
    }
}

impl ToNetworkOrder for CharacterString {
    /// ```
    /// use dnsgate::context::EncodeCtx;
    /// use dnsgate::network_order::ToNetworkOrder;
    /// use dnsgate::rfc1035::CharacterString;
    ///
    /// let mut ctx = EncodeCtx::new();
    /// let cs = CharacterString::from("www");
    /// assert_eq!(cs.to_network_bytes(&mut ctx).unwrap(), 4);
    /// assert_eq!(ctx.bytes(), &[0x03, 0x77, 0x77, 0x77]);
    /// ```
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
        pack_sized_bytes(ctx, LengthWidth::U8, self.0.as_bytes())
    }
}

impl FromNetworkOrder for CharacterString {
    /// ```
    /// use dnsgate::context::DecodeCtx;
    /// use dnsgate::network_order::FromNetworkOrder;
    /// use dnsgate::rfc1035::CharacterString;
    ///
    /// let b = vec![0x06, 0x67, 0x6f, 0x6f, 0x67, 0x6c, 0x65];
    /// let mut ctx = DecodeCtx::new(b.as_slice());
    /// let mut cs = CharacterString::default();
    /// assert!(cs.from_network_bytes(&mut ctx).is_ok());
    /// assert_eq!(cs.to_string(), "google");
    /// ```
    fn from_network_bytes(&mut self, ctx: &mut DecodeCtx<'_>) -> DNSResult<()> {
        let raw = unpack_sized_bytes(ctx, LengthWidth::U8)?;
        self.0 = String::from_utf8(raw)?;
        Ok(())
    }
}

impl<T: ToNetworkOrder> ToNetworkOrder for Option<T> {
    /// ```
    /// use dnsgate::context::EncodeCtx;
    /// use dnsgate::network_order::ToNetworkOrder;
    ///
    /// let mut ctx = EncodeCtx::new();
    /// assert_eq!(Some(0xFF_u8).to_network_bytes(&mut ctx).unwrap(), 1);
    /// assert_eq!(ctx.bytes(), &[0xFF]);
    ///
    /// let mut ctx = EncodeCtx::new();
    /// let r: Option<u8> = None;
    /// assert_eq!(r.to_network_bytes(&mut ctx).unwrap(), 0);
    /// assert!(ctx.bytes().is_empty());
    /// ```
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
        match self {
            None => Ok(0),
            Some(value) => value.to_network_bytes(ctx),
        }
    }
}

impl<T: FromNetworkOrder> FromNetworkOrder for Option<T> {
    /// ```
    /// use dnsgate::context::DecodeCtx;
    /// use dnsgate::network_order::FromNetworkOrder;
    ///
    /// let b = vec![0x12, 0x34, 0x56, 0x78];
    /// let mut ctx = DecodeCtx::new(b.as_slice());
    /// let mut v: Option<u32> = Some(0u32);
    /// assert!(v.from_network_bytes(&mut ctx).is_ok());
    /// assert_eq!(v.unwrap(), 0x12345678);
    /// ```
    fn from_network_bytes(&mut self, ctx: &mut DecodeCtx<'_>) -> DNSResult<()> {
        match self {
            None => Ok(()),
            Some(value) => value.from_network_bytes(ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sized_bytes_round_trip() {
        let payload = [0xde, 0xad, 0xbe, 0xef];
        for width in [LengthWidth::U8, LengthWidth::U16, LengthWidth::U32] {
            let mut ctx = EncodeCtx::new();
            let prefix = match width {
                LengthWidth::U8 => 1,
                LengthWidth::U16 => 2,
                LengthWidth::U32 => 4,
            };
            assert_eq!(
                pack_sized_bytes(&mut ctx, width, &payload).unwrap(),
                prefix + payload.len()
            );

            let bytes = ctx.into_bytes();
            let mut ctx = DecodeCtx::new(&bytes);
            assert_eq!(unpack_sized_bytes(&mut ctx, width).unwrap(), payload);
            assert_eq!(ctx.remaining(), 0);
        }
    }

    #[test]
    fn sized_bytes_empty() {
        let mut ctx = EncodeCtx::new();
        assert_eq!(pack_sized_bytes(&mut ctx, LengthWidth::U16, &[]).unwrap(), 2);
        assert_eq!(ctx.bytes(), &[0x00, 0x00]);
    }

    #[test]
    fn sized_bytes_prefix_overflow() {
        // 256 bytes cannot sit behind a one-byte length
        let blob = vec![0u8; 256];
        let mut ctx = EncodeCtx::new();
        assert!(pack_sized_bytes(&mut ctx, LengthWidth::U8, &blob).is_err());

        let mut ctx = EncodeCtx::new();
        assert!(pack_sized_bytes(&mut ctx, LengthWidth::U16, &blob).is_ok());
    }

    #[test]
    fn sized_bytes_truncated() {
        // length prefix promises more than the packet holds
        let raw = [0x00u8, 0x08, 0x01, 0x02];
        let mut ctx = DecodeCtx::new(&raw);
        assert!(unpack_sized_bytes(&mut ctx, LengthWidth::U16).is_err());
    }

    #[test]
    fn character_string_too_long() {
        let cs = CharacterString(String::from_utf8(vec![b'a'; 256]).unwrap());
        let mut ctx = EncodeCtx::new();
        assert!(cs.to_network_bytes(&mut ctx).is_err());
    }

    #[test]
    fn character_string_truncated() {
        // length byte promises more than the packet holds
        let raw = [5u8, b'a', b'b'];
        let mut ctx = DecodeCtx::new(&raw);
        let mut cs = CharacterString::default();
        assert!(cs.from_network_bytes(&mut ctx).is_err());
    }

    #[test]
    fn addresses_round_trip() {
        let ip4 = Ipv4Addr::new(192, 0, 2, 7);
        let ip6: Ipv6Addr = "2001:db8::7".parse().unwrap();

        let mut ctx = EncodeCtx::new();
        ip4.to_network_bytes(&mut ctx).unwrap();
        ip6.to_network_bytes(&mut ctx).unwrap();
        let bytes = ctx.into_bytes();
        assert_eq!(bytes.len(), 20);

        let mut ctx = DecodeCtx::new(&bytes);
        let mut out4 = Ipv4Addr::UNSPECIFIED;
        let mut out6 = Ipv6Addr::UNSPECIFIED;
        out4.from_network_bytes(&mut ctx).unwrap();
        out6.from_network_bytes(&mut ctx).unwrap();
        assert_eq!(out4, ip4);
        assert_eq!(out6, ip6);
    }
}
