//! Wire codecs for the two-byte flags field, the twelve-byte header and the
//! complete message.
//!
//! Section counts live only on the wire: the header is framed from the
//! section vectors on encode and drives the section loops on decode. When
//! the opcode is UPDATE the very same wire shapes are read; the caller
//! interprets them through the message's zone/prerequisite/update views.
use crate::context::{DecodeCtx, EncodeCtx};
use crate::error::{DNSError, DNSResult};
use crate::network_order::{FromNetworkOrder, ToNetworkOrder};
use crate::rfc1035::{
    DNSMessage, DNSPacketFlags, DNSPacketHeader, DNSQuestion, DNSResourceRecord, DomainName,
    EDNSRecord, OpCode, PacketType, QType, ResponseCode,
};

impl ToNetworkOrder for DNSPacketFlags {
    /// ```
    /// use dnsgate::context::EncodeCtx;
    /// use dnsgate::network_order::ToNetworkOrder;
    /// use dnsgate::rfc1035::{DNSPacketFlags, OpCode, PacketType, ResponseCode};
    ///
    /// let flags = DNSPacketFlags {
    ///     packet_type: PacketType::Response,
    ///     op_code: OpCode::Query,
    ///     recursion_desired: true,
    ///     recursion_available: true,
    ///     ..DNSPacketFlags::default()
    /// };
    ///
    /// let mut ctx = EncodeCtx::new();
    /// assert!(flags.to_network_bytes(&mut ctx).is_ok());
    /// assert_eq!(ctx.bytes(), &[0b1000_0001, 0b1000_0000]);
    /// ```
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
        // combine all flags according to structure
        //  0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
        // +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
        // |QR|   Opcode  |AA|TC|RD|RA| Z|AD|CD|   RCODE   |
        // +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
        let byte1 = (self.packet_type as u8) << 7
            | (self.op_code as u8) << 3
            | (self.authoritative_answer as u8) << 2
            | (self.truncated as u8) << 1
            | self.recursion_desired as u8;
        // the reserved bit is always written as zero
        let byte2 = (self.recursion_available as u8) << 7
            | (self.authentic_data as u8) << 5
            | (self.checking_disabled as u8) << 4
            | (self.response_code as u16 & 0b1111) as u8;

        ctx.pack_u8(byte1)?;
        ctx.pack_u8(byte2)?;
        Ok(2)
    }
}

impl FromNetworkOrder for DNSPacketFlags {
    /// ```
    /// use dnsgate::context::DecodeCtx;
    /// use dnsgate::network_order::FromNetworkOrder;
    /// use dnsgate::rfc1035::{DNSPacketFlags, OpCode, PacketType, ResponseCode};
    ///
    /// let b = vec![0b1000_0001, 0b1000_0000];
    /// let mut ctx = DecodeCtx::new(b.as_slice());
    /// let mut flags = DNSPacketFlags::default();
    /// assert!(flags.from_network_bytes(&mut ctx).is_ok());
    /// assert_eq!(flags.packet_type, PacketType::Response);
    /// assert_eq!(flags.op_code, OpCode::Query);
    /// assert!(flags.recursion_desired);
    /// assert!(flags.recursion_available);
    /// assert_eq!(flags.response_code, ResponseCode::NoError);
    /// ```
    fn from_network_bytes(&mut self, ctx: &mut DecodeCtx<'_>) -> DNSResult<()> {
        let byte1 = ctx.unpack_u8()?;
        let byte2 = ctx.unpack_u8()?;

        self.packet_type = PacketType::try_from(byte1 >> 7)?;
        self.op_code = OpCode::try_from((byte1 >> 3) & 0b1111)?;
        self.authoritative_answer = (byte1 >> 2) & 1 == 1;
        self.truncated = (byte1 >> 1) & 1 == 1;
        self.recursion_desired = byte1 & 1 == 1;

        self.recursion_available = (byte2 >> 7) & 1 == 1;
        // preserved for inspection, never propagated into a response
        self.z = (byte2 >> 6) & 1 == 1;
        self.authentic_data = (byte2 >> 5) & 1 == 1;
        self.checking_disabled = (byte2 >> 4) & 1 == 1;
        self.response_code = ResponseCode::try_from((byte2 & 0b1111) as u16)?;

        Ok(())
    }
}

impl ToNetworkOrder for DNSMessage {
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
        // counts are derived here and nowhere else
        let header = DNSPacketHeader {
            id: self.id,
            flags: self.flags,
            qd_count: self.questions.len() as u16,
            an_count: self.answers.len() as u16,
            ns_count: self.authority.len() as u16,
            ar_count: (self.additional.len() + self.edns.is_some() as usize) as u16,
        };

        let mut length = header.to_network_bytes(ctx)?;
        for question in &self.questions {
            length += question.to_network_bytes(ctx)?;
        }
        for record in &self.answers {
            length += record.to_network_bytes(ctx)?;
        }
        for record in &self.authority {
            length += record.to_network_bytes(ctx)?;
        }
        for record in &self.additional {
            length += record.to_network_bytes(ctx)?;
        }
        if let Some(edns) = &self.edns {
            length += edns.to_network_bytes(ctx)?;
        }
        Ok(length)
    }
}

impl DNSMessage {
    /// Encode into a fresh buffer with a fresh compression table.
    pub fn to_bytes(&self) -> DNSResult<Vec<u8>> {
        let mut ctx = EncodeCtx::new();
        self.to_network_bytes(&mut ctx)?;
        Ok(ctx.into_bytes())
    }

    /// Strict decode: every byte after the header must be consumed by the
    /// declared section counts.
    pub fn from_bytes(raw: &[u8]) -> DNSResult<Self> {
        Self::decode(raw, true)
    }

    /// Lenient decode: surplus bytes after the last section are ignored.
    pub fn from_bytes_partial(raw: &[u8]) -> DNSResult<Self> {
        Self::decode(raw, false)
    }

    fn decode(raw: &[u8], strict: bool) -> DNSResult<Self> {
        let mut ctx = DecodeCtx::new(raw);

        let mut header = DNSPacketHeader::default();
        header.from_network_bytes(&mut ctx)?;

        let mut message = DNSMessage {
            id: header.id,
            flags: header.flags,
            ..DNSMessage::default()
        };

        // zone entries under UPDATE are question-shaped, prerequisite and
        // update entries are record-shaped: one decode path serves both
        for _ in 0..header.qd_count {
            let mut question = DNSQuestion::default();
            question.from_network_bytes(&mut ctx)?;
            message.questions.push(question);
        }
        for _ in 0..header.an_count {
            let mut record = DNSResourceRecord::default();
            record.from_network_bytes(&mut ctx)?;
            message.answers.push(record);
        }
        for _ in 0..header.ns_count {
            let mut record = DNSResourceRecord::default();
            record.from_network_bytes(&mut ctx)?;
            message.authority.push(record);
        }

        // the additional section is the only place the OPT pseudo-record may
        // appear; it must not reach the generic record decoder
        for _ in 0..header.ar_count {
            let mut name = DomainName::default();
            name.from_network_bytes(&mut ctx)?;
            let rtype = ctx.unpack_u16()?;
            if rtype == QType::OPT as u16 {
                if !name.is_root() {
                    return Err(DNSError::malformed("OPT owner name must be root"));
                }
                if message.edns.is_some() {
                    return Err(DNSError::malformed("more than one OPT record"));
                }
                message.edns = Some(EDNSRecord::decode_after_type(&mut ctx)?);
            } else {
                let mut record = DNSResourceRecord {
                    name,
                    ..DNSResourceRecord::default()
                };
                record.decode_after_type(rtype, &mut ctx)?;
                message.additional.push(record);
            }
        }

        if strict && ctx.remaining() > 0 {
            return Err(DNSError::malformed("surplus bytes after last section"));
        }
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::rfc1035::{EdnsOption, QClass, RData};
    use crate::{test_from_network, test_to_network};

    #[test]
    fn dns_packet_header() {
        const PACKET: &str = r#"
0000   5c 7d 81 80 00 01 00 00 00 00 00 00
        "#;

        // from
        let header = test_from_network!(PACKET, DNSPacketHeader);
        assert_eq!(header.id, 0x5c7d);
        assert_eq!(header.flags.packet_type, PacketType::Response);
        assert_eq!(header.flags.op_code, OpCode::Query);
        assert!(!header.flags.authoritative_answer);
        assert!(!header.flags.truncated);
        assert!(header.flags.recursion_desired);
        assert!(header.flags.recursion_available);
        assert!(!header.flags.z);
        assert_eq!(header.flags.response_code, ResponseCode::NoError);
        assert_eq!(header.qd_count, 1);
        assert_eq!(header.an_count, 0);
        assert_eq!(header.ns_count, 0);
        assert_eq!(header.ar_count, 0);

        // to
        let values = test_to_network!(header);
        assert_eq!(values.0, crate::util::get_sample_slice(PACKET));
        assert_eq!(values.1, 12);
    }

    #[test]
    fn flags_reject_unknown_opcode() {
        // opcode 7 is unassigned
        let raw = [0b0011_1000u8, 0x00];
        let mut ctx = DecodeCtx::new(&raw);
        let mut flags = DNSPacketFlags::default();
        assert!(flags.from_network_bytes(&mut ctx).is_err());
    }

    #[test]
    fn query_encoding() {
        let mut query = DNSMessage::query();
        query.id = 0x1234;
        query.push_question(DNSQuestion::new("www.google.com", QType::A, None).unwrap());

        let bytes = query.to_bytes().unwrap();
        assert_eq!(bytes.len(), 32);
        // header
        assert_eq!(&bytes[..4], &[0x12, 0x34, 0x01, 0x00]);
        assert_eq!(&bytes[4..12], &[0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        // question
        assert_eq!(
            &bytes[12..],
            &[
                0x03, 0x77, 0x77, 0x77, 0x06, 0x67, 0x6f, 0x6f, 0x67, 0x6c, 0x65, 0x03, 0x63,
                0x6f, 0x6d, 0x00, 0x00, 0x01, 0x00, 0x01
            ]
        );
    }

    #[test]
    fn compression_across_records() {
        let mut message = DNSMessage::default();
        message.id = 1;
        for name in ["www.example.com", "example.com", "example.com"] {
            message.answers.push(
                DNSResourceRecord::new(
                    name,
                    60,
                    RData::NS(DomainName::try_from("ns1.example.net").unwrap()),
                )
                .unwrap(),
            );
        }

        let bytes = message.to_bytes().unwrap();

        // first owner is spelled out at offset 12, "example.com" starts at 16
        assert_eq!(&bytes[12..17], &[0x03, b'w', b'w', b'w', 0x07]);
        // second and third owners collapse into pointers to offset 16
        let first_len = 12 + 17 + 10 + 17; // header + owner + fixed fields + ns1.example.net
        assert_eq!(&bytes[first_len..first_len + 2], &[0xc0, 0x10]);

        let decoded = DNSMessage::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.answers[0].name.to_string(), "www.example.com");
        assert_eq!(decoded.answers[1].name.to_string(), "example.com");
        assert_eq!(decoded.answers[2].name.to_string(), "example.com");
        assert_eq!(decoded, message);
    }

    #[test]
    fn full_message_round_trip() {
        let mut message = DNSMessage::default();
        message.id = 0xbeef;
        message.flags.packet_type = PacketType::Response;
        message.flags.recursion_desired = true;
        message.flags.recursion_available = true;
        message.push_question(DNSQuestion::new("example.com", QType::ANY, None).unwrap());
        message.answers.push(
            DNSResourceRecord::new("example.com", 30, RData::A(Ipv4Addr::new(1, 2, 3, 4))).unwrap(),
        );
        message.answers.push(
            DNSResourceRecord::new(
                "example.com",
                30,
                RData::MX(crate::rfc1035::MX {
                    preference: 10,
                    exchange: DomainName::try_from("mx.example.com").unwrap(),
                }),
            )
            .unwrap(),
        );
        message.authority.push(
            DNSResourceRecord::new(
                "example.com",
                300,
                RData::NS(DomainName::try_from("ns1.example.com").unwrap()),
            )
            .unwrap(),
        );
        message.additional.push(
            DNSResourceRecord::new("ns1.example.com", 300, RData::A(Ipv4Addr::new(10, 0, 0, 53)))
                .unwrap(),
        );
        message.edns = Some(EDNSRecord {
            udp_payload_size: 1232,
            extended_rcode: 0,
            version: 0,
            dnssec_ok: false,
            options: vec![EdnsOption::cookie([9, 9, 9, 9, 9, 9, 9, 9], None)],
        });

        let bytes = message.to_bytes().unwrap();
        let decoded = DNSMessage::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, message);

        // counts are re-derived, so a second encode is identical
        assert_eq!(decoded.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn update_message_round_trip() {
        // zone example.com/SOA/IN, one update record host.example.com A 10.0.0.1
        let mut message = DNSMessage::default();
        message.id = 0x2136;
        message.flags.op_code = OpCode::Update;
        message.push_question(DNSQuestion::new("example.com", QType::SOA, None).unwrap());
        message.answers.push(
            DNSResourceRecord::prerequisite("host.example.com", QClass::ANY).unwrap(),
        );
        message.authority.push(
            DNSResourceRecord::new("host.example.com", 300, RData::A(Ipv4Addr::new(10, 0, 0, 1)))
                .unwrap(),
        );

        let bytes = message.to_bytes().unwrap();
        let decoded = DNSMessage::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.to_bytes().unwrap(), bytes);

        // section rebinding under the UPDATE opcode
        assert!(decoded.is_update());
        assert_eq!(decoded.zones()[0].r#type, QType::SOA);
        assert_eq!(decoded.prerequisites()[0].class, QClass::ANY);
        assert_eq!(decoded.prerequisites()[0].ttl, 0);
        assert_eq!(decoded.updates()[0].name.to_string(), "host.example.com");
        assert_eq!(
            decoded.updates()[0].rdata,
            RData::A(Ipv4Addr::new(10, 0, 0, 1))
        );
    }

    #[test]
    fn surplus_bytes_strict_vs_partial() {
        let mut query = DNSMessage::query();
        query.push_question(DNSQuestion::new("example.com", QType::A, None).unwrap());
        let mut bytes = query.to_bytes().unwrap();
        bytes.extend_from_slice(&[0xde, 0xad]);

        assert!(DNSMessage::from_bytes(&bytes).is_err());

        let partial = DNSMessage::from_bytes_partial(&bytes).unwrap();
        assert_eq!(partial.questions.len(), 1);
    }

    #[test]
    fn truncated_section_rejected() {
        let mut query = DNSMessage::query();
        query.push_question(DNSQuestion::new("example.com", QType::A, None).unwrap());
        let mut bytes = query.to_bytes().unwrap();
        // promise a second question that is not there
        bytes[5] = 2;

        assert!(DNSMessage::from_bytes(&bytes).is_err());
    }

    #[test]
    fn opt_captured_in_edns_slot() {
        let mut message = DNSMessage::query();
        message.push_question(DNSQuestion::new("example.com", QType::A, None).unwrap());
        message.edns = Some(EDNSRecord::default());

        let bytes = message.to_bytes().unwrap();
        let decoded = DNSMessage::from_bytes(&bytes).unwrap();

        assert!(decoded.additional.is_empty());
        let edns = decoded.edns.expect("OPT record lost");
        assert_eq!(edns.udp_payload_size, 4096);
        assert_eq!(edns.version, 0);
        assert!(!edns.dnssec_ok);
    }

    #[test]
    fn duplicate_opt_rejected() {
        let mut message = DNSMessage::query();
        message.push_question(DNSQuestion::new("example.com", QType::A, None).unwrap());
        message.edns = Some(EDNSRecord::default());

        let mut bytes = message.to_bytes().unwrap();
        // duplicate the 11-byte OPT record and bump arcount
        let opt = bytes[bytes.len() - 11..].to_vec();
        bytes.extend_from_slice(&opt);
        bytes[11] = 2;

        assert!(DNSMessage::from_bytes(&bytes).is_err());
    }

    #[test]
    fn extended_rcode_read_back() {
        let mut message = DNSMessage::default();
        message.id = 7;
        message.flags.packet_type = PacketType::Response;
        message.edns = Some(EDNSRecord::default());
        message.set_response_code(ResponseCode::BadOPTVersion).unwrap();

        let bytes = message.to_bytes().unwrap();
        let decoded = DNSMessage::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.flags.response_code, ResponseCode::NoError);
        assert_eq!(decoded.response_code(), ResponseCode::BadOPTVersion as u16);
    }
}
