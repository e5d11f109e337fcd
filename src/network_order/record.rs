//! Wire codecs for questions, resource records, per-type record contents,
//! the NSEC type bitmap and the EDNS OPT pseudo-record.
//!
//! Encoding a record reserves the two rdlength bytes, encodes the content,
//! then back-patches the length. Decoding restricts each content codec to
//! the rdlength-sized slice that follows the record header; a content codec
//! that consumes more or less than that is a format error.
use std::collections::BTreeSet;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::context::{DecodeCtx, EncodeCtx};
use crate::derive_enum;
use crate::error::{DNSError, DNSResult};
use crate::network_order::primitive::{pack_sized_bytes, unpack_sized_bytes, LengthWidth};
use crate::network_order::{FromNetworkOrder, ToNetworkOrder};
use crate::rfc1035::{
    CharacterString, DNSKeyFlags, DNSResourceRecord, DomainName, EDNSRecord, EdnsOption, QClass,
    QType, RData, DNSKEY, DS, MX, NSEC, RRSIG, SOA, SRV, TSIG,
};

// Impl QType & QClass enums
derive_enum!(QType, u16);
derive_enum!(QClass, u16);

//------------------------------------------------------------------------
// resource record framing: (name, type, class, ttl, rdlength, rdata)
//------------------------------------------------------------------------
impl ToNetworkOrder for DNSResourceRecord {
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
        let mut length = self.name.to_network_bytes(ctx)?;
        length += ctx.pack_u16(self.rtype())?;
        length += self.class.to_network_bytes(ctx)?;
        length += ctx.pack_u32(self.ttl)?;

        // reserve the rdlength field, encode the content, then patch
        let patch_offset = ctx.offset();
        ctx.pack_u16(0)?;
        let rd_length = self.rdata.to_network_bytes(ctx)?;
        ctx.patch_u16(patch_offset, rd_length as u16)?;

        Ok(length + 2 + rd_length)
    }
}

impl FromNetworkOrder for DNSResourceRecord {
    fn from_network_bytes(&mut self, ctx: &mut DecodeCtx<'_>) -> DNSResult<()> {
        self.name.from_network_bytes(ctx)?;
        let rtype = ctx.unpack_u16()?;
        self.decode_after_type(rtype, ctx)
    }
}

impl DNSResourceRecord {
    /// Decode the record fields following the owner name and numeric type.
    /// Split out because the message codec has to look at the type before it
    /// can tell a plain record from the OPT pseudo-record.
    pub(crate) fn decode_after_type(&mut self, rtype: u16, ctx: &mut DecodeCtx<'_>) -> DNSResult<()> {
        self.class.from_network_bytes(ctx)?;
        self.ttl = ctx.unpack_u32()?;

        let rd_length = ctx.unpack_u16()? as usize;
        if ctx.remaining() < rd_length {
            return Err(DNSError::malformed("packet truncated"));
        }

        let start = ctx.offset();
        self.rdata = RData::from_wire(rtype, rd_length, ctx)?;
        if ctx.offset() - start != rd_length {
            return Err(DNSError::malformed("rdata length mismatch"));
        }
        Ok(())
    }
}

//------------------------------------------------------------------------
// record contents
//------------------------------------------------------------------------
impl ToNetworkOrder for RData {
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
        match self {
            RData::A(ip) => ip.to_network_bytes(ctx),
            RData::AAAA(ip) => ip.to_network_bytes(ctx),
            RData::NS(dn) | RData::CNAME(dn) | RData::PTR(dn) => dn.to_network_bytes(ctx),
            RData::MX(mx) => mx.to_network_bytes(ctx),
            RData::SOA(soa) => soa.to_network_bytes(ctx),
            RData::TXT(text) => text.to_network_bytes(ctx),
            RData::SRV(srv) => srv.to_network_bytes(ctx),
            RData::TSIG(tsig) => tsig.to_network_bytes(ctx),
            RData::DS(ds) => ds.to_network_bytes(ctx),
            RData::RRSIG(rrsig) => rrsig.to_network_bytes(ctx),
            RData::NSEC(nsec) => nsec.to_network_bytes(ctx),
            RData::DNSKEY(dnskey) => dnskey.to_network_bytes(ctx),
            // sentinels used by dynamic update carry no payload
            RData::NULL | RData::ANY => Ok(0),
            RData::Unknown(_, data) => ctx.write_bytes(data),
        }
    }
}

impl RData {
    /// Type dispatch for decoding. Types outside the fixed table, and the
    /// sentinel types arriving with unexpected payload, are preserved as
    /// `Unknown` so the record still round-trips byte for byte.
    pub(crate) fn from_wire(rtype: u16, rd_length: usize, ctx: &mut DecodeCtx<'_>) -> DNSResult<RData> {
        let rdata = match QType::try_from(rtype) {
            Ok(QType::A) => {
                let mut ip = Ipv4Addr::UNSPECIFIED;
                ip.from_network_bytes(ctx)?;
                RData::A(ip)
            }
            Ok(QType::AAAA) => {
                let mut ip = Ipv6Addr::UNSPECIFIED;
                ip.from_network_bytes(ctx)?;
                RData::AAAA(ip)
            }
            Ok(QType::NS) => {
                let mut dn = DomainName::default();
                dn.from_network_bytes(ctx)?;
                RData::NS(dn)
            }
            Ok(QType::CNAME) => {
                let mut dn = DomainName::default();
                dn.from_network_bytes(ctx)?;
                RData::CNAME(dn)
            }
            Ok(QType::PTR) => {
                let mut dn = DomainName::default();
                dn.from_network_bytes(ctx)?;
                RData::PTR(dn)
            }
            Ok(QType::MX) => {
                let mut mx = MX::default();
                mx.from_network_bytes(ctx)?;
                RData::MX(mx)
            }
            Ok(QType::SOA) => {
                let mut soa = SOA::default();
                soa.from_network_bytes(ctx)?;
                RData::SOA(soa)
            }
            Ok(QType::TXT) => {
                let mut text = CharacterString::default();
                text.from_network_bytes(ctx)?;
                RData::TXT(text)
            }
            Ok(QType::SRV) => {
                let mut srv = SRV::default();
                srv.from_network_bytes(ctx)?;
                RData::SRV(srv)
            }
            Ok(QType::TSIG) => {
                let mut tsig = TSIG::default();
                tsig.from_network_bytes(ctx)?;
                RData::TSIG(tsig)
            }
            Ok(QType::DS) => RData::DS(DS::decode_sized(rd_length, ctx)?),
            Ok(QType::RRSIG) => RData::RRSIG(RRSIG::decode_sized(rd_length, ctx)?),
            Ok(QType::NSEC) => RData::NSEC(NSEC::decode_sized(rd_length, ctx)?),
            Ok(QType::DNSKEY) => RData::DNSKEY(DNSKEY::decode_sized(rd_length, ctx)?),
            Ok(QType::NULL) if rd_length == 0 => RData::NULL,
            Ok(QType::ANY) if rd_length == 0 => RData::ANY,
            _ => RData::Unknown(rtype, ctx.read_bytes(rd_length)?),
        };
        Ok(rdata)
    }
}

//------------------------------------------------------------------------
// TSIG: https://datatracker.ietf.org/doc/html/rfc8945#section-4.2
// time_signed is 48 bits wide; mac and other_data carry 16-bit lengths
//------------------------------------------------------------------------
impl ToNetworkOrder for TSIG {
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
        let mut length = self.algorithm_name.to_network_bytes(ctx)?;
        length += ctx.pack_u48(self.time_signed)?;
        length += ctx.pack_u16(self.fudge)?;
        length += pack_sized_bytes(ctx, LengthWidth::U16, &self.mac)?;
        length += ctx.pack_u16(self.original_id)?;
        length += ctx.pack_u16(self.error)?;
        length += pack_sized_bytes(ctx, LengthWidth::U16, &self.other_data)?;
        Ok(length)
    }
}

impl FromNetworkOrder for TSIG {
    fn from_network_bytes(&mut self, ctx: &mut DecodeCtx<'_>) -> DNSResult<()> {
        self.algorithm_name.from_network_bytes(ctx)?;
        self.time_signed = ctx.unpack_u48()?;
        self.fudge = ctx.unpack_u16()?;
        self.mac = unpack_sized_bytes(ctx, LengthWidth::U16)?;
        self.original_id = ctx.unpack_u16()?;
        self.error = ctx.unpack_u16()?;
        self.other_data = unpack_sized_bytes(ctx, LengthWidth::U16)?;
        Ok(())
    }
}

//------------------------------------------------------------------------
// DNSSEC contents: https://datatracker.ietf.org/doc/html/rfc4034
// Their trailing fields (digest, signature, key) have no length of their
// own: they run to the end of the rdata, so decoding needs the rdlength.
//------------------------------------------------------------------------
impl ToNetworkOrder for DS {
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
        let mut length = ctx.pack_u16(self.key_tag)?;
        length += ctx.pack_u8(self.algorithm)?;
        length += ctx.pack_u8(self.digest_type)?;
        length += ctx.write_bytes(&self.digest)?;
        Ok(length)
    }
}

impl DS {
    fn decode_sized(rd_length: usize, ctx: &mut DecodeCtx<'_>) -> DNSResult<Self> {
        if rd_length < 4 {
            return Err(DNSError::malformed("DS rdata too short"));
        }
        Ok(DS {
            key_tag: ctx.unpack_u16()?,
            algorithm: ctx.unpack_u8()?,
            digest_type: ctx.unpack_u8()?,
            digest: ctx.read_bytes(rd_length - 4)?,
        })
    }
}

impl ToNetworkOrder for RRSIG {
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
        let mut length = ctx.pack_u16(self.type_covered)?;
        length += ctx.pack_u8(self.algorithm)?;
        length += ctx.pack_u8(self.labels)?;
        length += ctx.pack_u32(self.original_ttl)?;
        length += ctx.pack_u32(self.expiration)?;
        length += ctx.pack_u32(self.inception)?;
        length += ctx.pack_u16(self.key_tag)?;
        length += self.signer_name.to_network_bytes(ctx)?;
        length += ctx.write_bytes(&self.signature)?;
        Ok(length)
    }
}

impl RRSIG {
    fn decode_sized(rd_length: usize, ctx: &mut DecodeCtx<'_>) -> DNSResult<Self> {
        let start = ctx.offset();
        let mut rrsig = RRSIG {
            type_covered: ctx.unpack_u16()?,
            algorithm: ctx.unpack_u8()?,
            labels: ctx.unpack_u8()?,
            original_ttl: ctx.unpack_u32()?,
            expiration: ctx.unpack_u32()?,
            inception: ctx.unpack_u32()?,
            key_tag: ctx.unpack_u16()?,
            ..RRSIG::default()
        };
        rrsig.signer_name.from_network_bytes(ctx)?;

        let consumed = ctx.offset() - start;
        if rd_length < consumed {
            return Err(DNSError::malformed("RRSIG rdata too short"));
        }
        rrsig.signature = ctx.read_bytes(rd_length - consumed)?;
        Ok(rrsig)
    }
}

impl ToNetworkOrder for NSEC {
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
        let mut length = self.next_domain.to_network_bytes(ctx)?;
        length += ctx.write_bytes(&types_to_bitmap(&self.record_types))?;
        Ok(length)
    }
}

impl NSEC {
    fn decode_sized(rd_length: usize, ctx: &mut DecodeCtx<'_>) -> DNSResult<Self> {
        let start = ctx.offset();
        let mut nsec = NSEC::default();
        nsec.next_domain.from_network_bytes(ctx)?;

        let consumed = ctx.offset() - start;
        if rd_length < consumed {
            return Err(DNSError::malformed("NSEC rdata too short"));
        }
        let bitmap = ctx.read_bytes(rd_length - consumed)?;
        nsec.record_types = bitmap_to_types(&bitmap);
        Ok(nsec)
    }
}

impl ToNetworkOrder for DNSKeyFlags {
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
        ctx.pack_u8(self.zone_key as u8)?;
        ctx.pack_u8((self.revoked as u8) << 7 | self.secure_entry_point as u8)?;
        Ok(2)
    }
}

impl FromNetworkOrder for DNSKeyFlags {
    fn from_network_bytes(&mut self, ctx: &mut DecodeCtx<'_>) -> DNSResult<()> {
        let zone_key = ctx.unpack_u8()?;
        let other = ctx.unpack_u8()?;
        self.zone_key = zone_key & 1 == 1;
        self.revoked = other & 0b1000_0000 > 0;
        self.secure_entry_point = other & 1 == 1;
        Ok(())
    }
}

impl ToNetworkOrder for DNSKEY {
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
        let mut length = self.flags.to_network_bytes(ctx)?;
        length += ctx.pack_u8(self.protocol)?;
        length += ctx.pack_u8(self.algorithm)?;
        length += ctx.write_bytes(&self.public_key)?;
        Ok(length)
    }
}

impl DNSKEY {
    fn decode_sized(rd_length: usize, ctx: &mut DecodeCtx<'_>) -> DNSResult<Self> {
        if rd_length < 4 {
            return Err(DNSError::malformed("DNSKEY rdata too short"));
        }
        let mut dnskey = DNSKEY::default();
        dnskey.flags.from_network_bytes(ctx)?;
        dnskey.protocol = ctx.unpack_u8()?;
        dnskey.algorithm = ctx.unpack_u8()?;
        dnskey.public_key = ctx.read_bytes(rd_length - 4)?;
        Ok(dnskey)
    }
}

//------------------------------------------------------------------------
// NSEC type bitmap: bit k set <=> record type k present. Trailing zero
// bytes are stripped on encode and logically reinstated on decode. A
// single contiguous window covers the type codes this library carries.
//------------------------------------------------------------------------
pub fn types_to_bitmap(record_types: &BTreeSet<u16>) -> Vec<u8> {
    let mut bitmap: Vec<u8> = Vec::new();
    for &rtype in record_types {
        let index = (rtype / 8) as usize;
        if index >= bitmap.len() {
            bitmap.resize(index + 1, 0);
        }
        bitmap[index] |= 0b1000_0000 >> (rtype % 8);
    }
    while bitmap.last() == Some(&0) {
        bitmap.pop();
    }
    bitmap
}

pub fn bitmap_to_types(raw: &[u8]) -> BTreeSet<u16> {
    let mut record_types = BTreeSet::new();
    for (index, byte) in raw.iter().enumerate() {
        for bit in 0..8u16 {
            if byte & (0b1000_0000 >> bit) != 0 {
                record_types.insert(index as u16 * 8 + bit);
            }
        }
    }
    record_types
}

//------------------------------------------------------------------------
// OPT pseudo-record: class carries the udp payload size, ttl carries
// (extended rcode, version, flags). Never handled by the generic record
// codec above.
//------------------------------------------------------------------------
impl ToNetworkOrder for EDNSRecord {
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
        let mut length = ctx.pack_u8(0)?; // owner name is always root
        length += ctx.pack_u16(QType::OPT as u16)?;
        length += ctx.pack_u16(self.udp_payload_size)?;
        length += ctx.pack_u8(self.extended_rcode)?;
        length += ctx.pack_u8(self.version)?;
        length += ctx.pack_u16((self.dnssec_ok as u16) << 15)?;

        let patch_offset = ctx.offset();
        ctx.pack_u16(0)?;
        let mut rd_length = 0usize;
        for option in &self.options {
            rd_length += ctx.pack_u16(option.code)?;
            rd_length += pack_sized_bytes(ctx, LengthWidth::U16, &option.data)?;
        }
        ctx.patch_u16(patch_offset, rd_length as u16)?;

        Ok(length + 2 + rd_length)
    }
}

impl EDNSRecord {
    /// Decode the OPT fields following the (root) owner name and the type.
    /// Options are read back to back until the rdata is exhausted.
    pub(crate) fn decode_after_type(ctx: &mut DecodeCtx<'_>) -> DNSResult<Self> {
        let udp_payload_size = ctx.unpack_u16()?;
        let extended_rcode = ctx.unpack_u8()?;
        let version = ctx.unpack_u8()?;
        let flags = ctx.unpack_u16()?;
        let rd_length = ctx.unpack_u16()? as usize;
        if ctx.remaining() < rd_length {
            return Err(DNSError::malformed("packet truncated"));
        }

        let end = ctx.offset() + rd_length;
        let mut options = Vec::new();
        while ctx.offset() < end {
            options.push(EdnsOption {
                code: ctx.unpack_u16()?,
                data: unpack_sized_bytes(ctx, LengthWidth::U16)?,
            });
        }
        if ctx.offset() != end {
            return Err(DNSError::malformed("EDNS option overruns rdata"));
        }

        Ok(EDNSRecord {
            udp_payload_size,
            extended_rcode,
            version,
            dnssec_ok: flags & 0b1000_0000_0000_0000 > 0,
            options,
        })
    }
}
