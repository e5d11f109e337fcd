//! Base structures for DNS messages. Taken from https://datatracker.ietf.org/doc/html/rfc1035
//! plus the extensions found on today's wire: EDNS(0) (RFC 6891), dynamic
//! update (RFC 2136), TSIG (RFC 2845) and the DNSSEC record types (RFC 4034).
//!
//! The DnsStruct procedural macro defines the wire-codec trait impls for
//! structs whose layout is a plain field sequence. The DnsEnum procedural
//! macro implements Default, FromStr, TryFrom<u8> and TryFrom<u16> for the
//! code-carrying enums.
use std::collections::BTreeSet;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use rand::Rng;

use crate::context::{DecodeCtx, EncodeCtx};
use crate::error::{DNSError, DNSResult, InternalError};
use crate::network_order::{FromNetworkOrder, ToNetworkOrder};

use dns_derive::{DnsEnum, DnsStruct};

/// Largest datagram a client without EDNS may receive (RFC 1035 §2.3.4).
pub const MAX_DNS_PACKET_SIZE: usize = 512;

/// Payload size this implementation advertises in its own OPT records.
pub const DEFAULT_EDNS_PAYLOAD_SIZE: u16 = 4096;

/// EDNS option code for DNS cookies (RFC 7873).
pub const EDNS_COOKIE: u16 = 10;

// DNS packets are called "messages" in RFC1035:
// "All communications inside of the domain protocol are carried in a single
// format called a message". Section counts are never stored here: they are
// derived from the section vectors when the header is framed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DNSMessage {
    pub id: u16,
    pub flags: DNSPacketFlags,
    pub questions: Vec<DNSQuestion>,
    pub answers: Vec<DNSResourceRecord>,
    pub authority: Vec<DNSResourceRecord>,
    pub additional: Vec<DNSResourceRecord>,
    // the OPT pseudo-record travels in the additional section but is kept in
    // its own slot: its class and ttl fields do not mean what they mean on a
    // plain record
    pub edns: Option<EDNSRecord>,
}

impl DNSMessage {
    /// A fresh query with a random transaction id and recursion desired.
    pub fn query() -> Self {
        let mut message = DNSMessage::default();

        // create a random ID
        let mut rng = rand::thread_rng();
        message.id = rng.gen::<u16>();

        message.flags.packet_type = PacketType::Query;
        message.flags.op_code = OpCode::Query;
        message.flags.recursion_desired = true;

        message
    }

    // As counts are derived from the sections, pushing is all there is to it
    pub fn push_question(&mut self, question: DNSQuestion) {
        self.questions.push(question);
    }

    pub fn is_update(&self) -> bool {
        self.flags.op_code == OpCode::Update
    }

    /// UPDATE view: the question section carries the zone designations.
    pub fn zones(&self) -> &[DNSQuestion] {
        &self.questions
    }

    /// UPDATE view: the answer section carries the prerequisites.
    pub fn prerequisites(&self) -> &[DNSResourceRecord] {
        &self.answers
    }

    /// UPDATE view: the authority section carries the updates themselves.
    pub fn updates(&self) -> &[DNSResourceRecord] {
        &self.authority
    }

    /// Effective response code per RFC 6891 §6.1.3: the OPT extended rcode
    /// forms the upper 8 bits, the header rcode the lower 4.
    pub fn response_code(&self) -> u16 {
        let base = self.flags.response_code as u16 & 0b1111;
        match &self.edns {
            Some(edns) => (edns.extended_rcode as u16) << 4 | base,
            None => base,
        }
    }

    /// Store a response code, splitting it between the header and the OPT
    /// record when it does not fit in four bits.
    pub fn set_response_code(&mut self, code: ResponseCode) -> DNSResult<()> {
        let value = code as u16;
        if value <= 0b1111 {
            self.flags.response_code = code;
            if let Some(edns) = self.edns.as_mut() {
                edns.extended_rcode = 0;
            }
            return Ok(());
        }
        match self.edns.as_mut() {
            Some(edns) => {
                edns.extended_rcode = (value >> 4) as u8;
                self.flags.response_code = ResponseCode::try_from(value & 0b1111)?;
                Ok(())
            }
            None => Err(DNSError::from(InternalError::ExtendedRcodeWithoutOpt)),
        }
    }
}

impl fmt::Display for DNSMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id=0x{:04x} {} questions={} answers={} authority={} additional={}",
            self.id,
            self.flags,
            self.questions.len(),
            self.answers.len(),
            self.authority.len(),
            self.additional.len() + self.edns.is_some() as usize
        )
    }
}

// DNS packet header: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.1
// Only the codec frames this struct; the message itself never stores counts.
#[derive(Debug, Default, Clone, PartialEq, DnsStruct)]
pub struct DNSPacketHeader {
    pub id: u16, // identifier copied into the reply to match up transactions
    pub flags: DNSPacketFlags,
    pub qd_count: u16, // number of entries in the question section
    pub an_count: u16, // number of resource records in the answer section
    pub ns_count: u16, // number of records in the authority section
    pub ar_count: u16, // number of records in the additional section
}

// Flags: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.1
//
//  0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
// |QR|   Opcode  |AA|TC|RD|RA| Z|AD|CD|   RCODE   |
// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct DNSPacketFlags {
    pub packet_type: PacketType, // whether this message is a query or a response
    pub op_code: OpCode,         // kind of query, set by the originator
    pub authoritative_answer: bool, // responding name server is an authority
    pub truncated: bool,         // message was cut to fit the transport
    pub recursion_desired: bool, // copied into the response
    pub recursion_available: bool, // meaningful in responses only
    // reserved bit: preserved on decode, always written as zero, never
    // copied into a response
    pub z: bool,
    pub authentic_data: bool,    // DNSSEC: responses were validated
    pub checking_disabled: bool, // DNSSEC: validation not wanted
    pub response_code: ResponseCode,
}

impl fmt::Display for DNSPacketFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} op={:?} aa={} tc={} rd={} ra={} rcode={:?}",
            self.packet_type,
            self.op_code,
            self.authoritative_answer as u8,
            self.truncated as u8,
            self.recursion_desired as u8,
            self.recursion_available as u8,
            self.response_code
        )
    }
}

/// The flags' first bit is 0 or 1 meaning a query or a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DnsEnum)]
#[repr(u8)]
pub enum PacketType {
    Query = 0,
    Response = 1,
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PacketType::Query => write!(f, "QUERY"),
            PacketType::Response => write!(f, "RESPONSE"),
        }
    }
}

// op codes: https://www.iana.org/assignments/dns-parameters/dns-parameters.xhtml#dns-parameters-5
#[derive(Debug, Clone, Copy, PartialEq, Eq, DnsEnum)]
#[repr(u8)]
pub enum OpCode {
    Query = 0,        // [RFC1035]
    InverseQuery = 1, // (OBSOLETE) [RFC3425]
    Status = 2,       // [RFC1035]
    Notify = 4,       // [RFC1996]
    Update = 5,       // [RFC2136]
}

// response codes: https://www.iana.org/assignments/dns-parameters/dns-parameters.xhtml#dns-parameters-6
// Codes 16 and up never fit the 4-bit header field: they are composed with
// the extended rcode byte of the OPT record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DnsEnum)]
#[repr(u16)]
pub enum ResponseCode {
    NoError = 0,       // [RFC1035]
    FormatError = 1,   // [RFC1035]
    ServerFailure = 2, // [RFC1035]
    NXDomain = 3,      // Non-Existent Domain [RFC1035]
    NotImplemented = 4, // [RFC1035]
    Refused = 5,       // [RFC1035]
    YXDomain = 6,      // Name Exists when it should not [RFC2136]
    YXRRSet = 7,       // RR Set Exists when it should not [RFC2136]
    NXRRSet = 8,       // RR Set that should exist does not [RFC2136]
    NotAuthorized = 9, // [RFC2136][RFC8945]
    NotInZone = 10,    // Name not contained in zone [RFC2136]
    BadOPTVersion = 16, // [RFC6891]; 16 doubles as BADSIG for TSIG [RFC8945]
    BadKey = 17,       // Key not recognized [RFC8945]
    BadTime = 18,      // Signature out of time window [RFC8945]
    BadMode = 19,      // Bad TKEY Mode [RFC2930]
    BadName = 20,      // Duplicate key name [RFC2930]
    BadAlgorithm = 21, // Algorithm not supported [RFC2930]
}

// RR type codes: https://www.iana.org/assignments/dns-parameters/dns-parameters.xhtml#dns-parameters-4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DnsEnum)]
#[repr(u16)]
pub enum QType {
    A = 1,       // a host address [RFC1035]
    NS = 2,      // an authoritative name server [RFC1035]
    CNAME = 5,   // the canonical name for an alias [RFC1035]
    SOA = 6,     // marks the start of a zone of authority [RFC1035]
    NULL = 10,   // a null RR [RFC1035]
    PTR = 12,    // a domain name pointer [RFC1035]
    MX = 15,     // mail exchange [RFC1035]
    TXT = 16,    // text strings [RFC1035]
    AAAA = 28,   // IP6 address [RFC3596]
    SRV = 33,    // server selection [RFC2782]
    OPT = 41,    // EDNS pseudo-record [RFC6891]
    DS = 43,     // delegation signer [RFC4034]
    RRSIG = 46,  // [RFC4034]
    NSEC = 47,   // [RFC4034]
    DNSKEY = 48, // [RFC4034]
    TSIG = 250,  // transaction signature [RFC8945]
    AXFR = 252,  // transfer of an entire zone [RFC1035]
    MAILB = 253, // mailbox-related RRs [RFC1035]
    MAILA = 254, // mail agent RRs (OBSOLETE) [RFC1035]
    ANY = 255,   // a request for all records the server has [RFC1035]
}

// RR class values: https://datatracker.ietf.org/doc/html/rfc1035#section-3.2.4
// NONE and ANY appear in UPDATE prerequisites [RFC2136]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DnsEnum)]
#[repr(u16)]
pub enum QClass {
    IN = 1, // the Internet
    CS = 2, // the CSNET class (obsolete)
    CH = 3, // the CHAOS class
    HS = 4, // Hesiod
    NONE = 254,
    ANY = 255,
}

// Character string as described in: https://datatracker.ietf.org/doc/html/rfc1035#section-3.3
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CharacterString(pub String);

/// ```
/// use dnsgate::rfc1035::CharacterString;
///
/// let cs = CharacterString::from("www");
/// assert_eq!(cs.0.len(), 3);
/// assert_eq!(cs.to_string(), "www");
/// ```
impl From<&str> for CharacterString {
    fn from(s: &str) -> Self {
        CharacterString(String::from(s))
    }
}

impl fmt::Display for CharacterString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Domain name: https://datatracker.ietf.org/doc/html/rfc1035#section-3.1
// Kept as its label vector; the empty vector is the root name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct DomainName(pub Vec<String>);

impl DomainName {
    pub fn root() -> Self {
        DomainName(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The suffix starting at label `i`, as a dotted string.
    pub fn suffix(&self, i: usize) -> String {
        self.0[i..].join(".")
    }
}

/// ```
/// use dnsgate::rfc1035::DomainName;
///
/// let dn = DomainName::try_from("www.example.com").unwrap();
/// assert_eq!(dn.0, &["www", "example", "com"]);
/// assert_eq!(dn.to_string(), "www.example.com");
///
/// let dn = DomainName::try_from("www.google.ie.").unwrap();
/// assert_eq!(dn.to_string(), "www.google.ie");
///
/// let dn = DomainName::try_from(".").unwrap();
/// assert!(dn.is_root());
///
/// assert!(DomainName::try_from("").is_err());
/// ```
impl TryFrom<&str> for DomainName {
    type Error = DNSError;

    fn try_from(domain: &str) -> Result<Self, Self::Error> {
        // safeguard
        if domain.is_empty() {
            return Err(DNSError::DNSInternalError(InternalError::EmptyDomainName));
        }

        // handle case for root domain
        if domain == "." {
            return Ok(DomainName::root());
        }

        let labels: Vec<String> = domain
            .split('.')
            .filter(|x| !x.is_empty())
            .map(String::from)
            .collect();

        // a label is limited to 63 octets, a full name to 255
        if labels.iter().any(|l| l.len() > 63) || domain.len() > 255 {
            return Err(DNSError::DNSInternalError(
                InternalError::DnsDomainNameTooLong,
            ));
        }

        Ok(DomainName(labels))
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, ".")
        } else {
            write!(f, "{}", self.0.join("."))
        }
    }
}

//--------------------------------------------------------------------------------
// Question structure: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.2
// When the opcode is UPDATE the same wire shape designates the zone.
//--------------------------------------------------------------------------------
#[derive(Debug, Default, Clone, PartialEq, DnsStruct)]
pub struct DNSQuestion {
    pub name: DomainName,
    pub r#type: QType,
    pub class: QClass,
}

impl DNSQuestion {
    /// Create a new question. The IN class is used if None is provided
    /// as the qclass parameter.
    pub fn new(domain: &str, qtype: QType, qclass: Option<QClass>) -> DNSResult<Self> {
        let dn = DomainName::try_from(domain)?;
        let question = DNSQuestion {
            name: dn,
            r#type: qtype,
            class: qclass.unwrap_or(QClass::IN),
        };

        Ok(question)
    }
}

impl fmt::Display for DNSQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "class={:?} type={:?} name={}",
            self.class, self.r#type, self.name
        )
    }
}

//------------------------------------------------------------------------
// Definition of a resource record in the RFC1035. The numeric type and the
// rdlength never appear as fields: the type is derived from the content
// variant and the length is framed by the codec.
//------------------------------------------------------------------------
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DNSResourceRecord {
    pub name: DomainName, // owner name, i.e. the node this record pertains to
    pub class: QClass,
    pub ttl: u32, // how long the record may be cached, in seconds
    pub rdata: RData,
}

impl DNSResourceRecord {
    pub fn new(domain: &str, ttl: u32, rdata: RData) -> DNSResult<Self> {
        Ok(DNSResourceRecord {
            name: DomainName::try_from(domain)?,
            class: QClass::IN,
            ttl,
            rdata,
        })
    }

    /// UPDATE prerequisite: ttl forced to zero, content defaults to ANY.
    pub fn prerequisite(domain: &str, class: QClass) -> DNSResult<Self> {
        Ok(DNSResourceRecord {
            name: DomainName::try_from(domain)?,
            class,
            ttl: 0,
            rdata: RData::ANY,
        })
    }

    /// Numeric record type on the wire, derived from the content.
    pub fn rtype(&self) -> u16 {
        self.rdata.rtype()
    }
}

impl fmt::Display for DNSResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name={} type={} class={:?} ttl={}",
            self.name,
            self.rtype(),
            self.class,
            self.ttl
        )
    }
}

//------------------------------------------------------------------------
// Record contents, one variant per supported wire layout. Types outside
// the table below round-trip through the Unknown variant untouched.
//------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
pub enum RData {
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    NS(DomainName),
    CNAME(DomainName),
    PTR(DomainName),
    MX(MX),
    SOA(SOA),
    TXT(CharacterString),
    SRV(SRV),
    TSIG(TSIG),
    DS(DS),
    RRSIG(RRSIG),
    NSEC(NSEC),
    DNSKEY(DNSKEY),
    NULL,
    ANY,
    Unknown(u16, Vec<u8>),
}

impl Default for RData {
    fn default() -> Self {
        RData::NULL
    }
}

impl RData {
    pub fn rtype(&self) -> u16 {
        match self {
            RData::A(_) => QType::A as u16,
            RData::AAAA(_) => QType::AAAA as u16,
            RData::NS(_) => QType::NS as u16,
            RData::CNAME(_) => QType::CNAME as u16,
            RData::PTR(_) => QType::PTR as u16,
            RData::MX(_) => QType::MX as u16,
            RData::SOA(_) => QType::SOA as u16,
            RData::TXT(_) => QType::TXT as u16,
            RData::SRV(_) => QType::SRV as u16,
            RData::TSIG(_) => QType::TSIG as u16,
            RData::DS(_) => QType::DS as u16,
            RData::RRSIG(_) => QType::RRSIG as u16,
            RData::NSEC(_) => QType::NSEC as u16,
            RData::DNSKEY(_) => QType::DNSKEY as u16,
            RData::NULL => QType::NULL as u16,
            RData::ANY => QType::ANY as u16,
            RData::Unknown(rtype, _) => *rtype,
        }
    }
}

// MX RR: https://datatracker.ietf.org/doc/html/rfc1035#section-3.3.9
#[derive(Debug, Default, Clone, PartialEq, DnsStruct)]
pub struct MX {
    pub preference: u16, // lower values are preferred
    pub exchange: DomainName, // host willing to act as a mail exchange
}

// SOA RR: https://datatracker.ietf.org/doc/html/rfc1035#section-3.3.13
#[derive(Debug, Default, Clone, PartialEq, DnsStruct)]
pub struct SOA {
    pub mname: DomainName, // primary source of data for this zone
    pub rname: DomainName, // mailbox of the person responsible for this zone
    pub serial: u32,  // version number of the original copy of the zone
    pub refresh: u32, // interval before the zone should be refreshed
    pub retry: u32,   // interval before a failed refresh should be retried
    pub expire: u32,  // upper limit before the zone is no longer authoritative
    pub minimum: u32, // minimum TTL exported with any RR from this zone
}

// SRV RR: https://datatracker.ietf.org/doc/html/rfc2782
#[derive(Debug, Default, Clone, PartialEq, DnsStruct)]
pub struct SRV {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: DomainName,
}

// TSIG RR: https://datatracker.ietf.org/doc/html/rfc8945#section-4.2
// time_signed is a 48-bit unix second count; mac and other_data carry their
// own 16-bit length prefixes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TSIG {
    pub algorithm_name: DomainName,
    pub time_signed: u64,
    pub fudge: u16,
    pub mac: Vec<u8>,
    pub original_id: u16,
    pub error: u16,
    pub other_data: Vec<u8>,
}

// DS RR: https://datatracker.ietf.org/doc/html/rfc4034#section-5
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DS {
    pub key_tag: u16, // identifier of the DNSKEY RR this digest refers to
    pub algorithm: u8,
    pub digest_type: u8,
    pub digest: Vec<u8>, // fills the rest of the rdata
}

// RRSIG RR: https://datatracker.ietf.org/doc/html/rfc4034#section-3
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RRSIG {
    pub type_covered: u16,
    pub algorithm: u8,
    pub labels: u8, // label count of the owner name
    pub original_ttl: u32,
    pub expiration: u32, // unix seconds, end of signature life
    pub inception: u32,  // unix seconds, start of signature life
    pub key_tag: u16,
    pub signer_name: DomainName,
    pub signature: Vec<u8>, // fills the rest of the rdata
}

// NSEC RR: https://datatracker.ietf.org/doc/html/rfc4034#section-4
// The type set is packed as a bit array on the wire; see the record codec.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NSEC {
    pub next_domain: DomainName, // next owner with authoritative data
    pub record_types: BTreeSet<u16>, // RRset types present at the owner
}

// DNSKEY RR: https://datatracker.ietf.org/doc/html/rfc4034#section-2
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DNSKEY {
    pub flags: DNSKeyFlags,
    pub protocol: u8, // MUST be 3
    pub algorithm: u8,
    pub public_key: Vec<u8>, // fills the rest of the rdata
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DNSKeyFlags {
    pub zone_key: bool,
    pub revoked: bool,
    pub secure_entry_point: bool,
}

//------------------------------------------------------------------------
// OPT pseudo-record: https://datatracker.ietf.org/doc/html/rfc6891#section-6.1.2
//
// +------------+--------------+------------------------------+
// | Field Name | Field Type   | Description                  |
// +------------+--------------+------------------------------+
// | NAME       | domain name  | MUST be 0 (root domain)      |
// | TYPE       | u_int16_t    | OPT (41)                     |
// | CLASS      | u_int16_t    | requestor's UDP payload size |
// | TTL        | u_int32_t    | extended RCODE and flags     |
// | RDLEN      | u_int16_t    | length of all RDATA          |
// | RDATA      | octet stream | {attribute,value} pairs      |
// +------------+--------------+------------------------------+
//------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
pub struct EDNSRecord {
    pub udp_payload_size: u16, // carried in the class field
    pub extended_rcode: u8,    // upper 8 bits of the 12-bit response code
    pub version: u8,           // 0 for full conformance with RFC 6891
    pub dnssec_ok: bool,       // the DO bit
    pub options: Vec<EdnsOption>,
}

impl Default for EDNSRecord {
    fn default() -> Self {
        EDNSRecord {
            udp_payload_size: DEFAULT_EDNS_PAYLOAD_SIZE,
            extended_rcode: 0,
            version: 0,
            dnssec_ok: false,
            options: Vec::new(),
        }
    }
}

// An EDNS option inside the OPT rdata: (code, length, bytes), back to back.
#[derive(Debug, Clone, PartialEq)]
pub struct EdnsOption {
    pub code: u16,
    pub data: Vec<u8>,
}

impl EdnsOption {
    /// DNS cookie option (RFC 7873): 8-byte client cookie, optional server
    /// cookie appended.
    pub fn cookie(client: [u8; 8], server: Option<&[u8]>) -> Self {
        let mut data = client.to_vec();
        if let Some(server) = server {
            data.extend_from_slice(server);
        }
        EdnsOption {
            code: EDNS_COOKIE,
            data,
        }
    }
}
