//! Session glue: decode a request datagram, run the backend chain for each
//! question, assemble and encode the response.
use std::sync::Arc;

use log::{debug, error, info};

use crate::backend::Backend;
use crate::error::{DNSError, DNSException, DNSResult};
use crate::rfc1035::{
    DNSMessage, EDNSRecord, OpCode, PacketType, ResponseCode, DEFAULT_EDNS_PAYLOAD_SIZE,
    MAX_DNS_PACKET_SIZE,
};

pub struct Session {
    backend: Arc<dyn Backend>,
    udp_payload_size: u16,
}

impl Session {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Session {
            backend,
            udp_payload_size: DEFAULT_EDNS_PAYLOAD_SIZE,
        }
    }

    /// Handle one datagram. `None` means no reply goes out: input that does
    /// not even parse is logged and dropped, never answered.
    pub fn handle(&self, raw: &[u8]) -> Option<Vec<u8>> {
        let request = match DNSMessage::from_bytes(raw) {
            Ok(request) => request,
            Err(e) => {
                debug!("failed to parse datagram: {}", e);
                return None;
            }
        };
        debug!("request: {}", request);

        // from here on an id is known, so every failure becomes a response
        // carrying the matching response code
        let limit = match &request.edns {
            Some(edns) => edns.udp_payload_size as usize,
            None => MAX_DNS_PACKET_SIZE,
        };

        let mut response = self.base_response(&request);
        if let Err(e) = self.resolve(&request, &mut response) {
            error!("failed to handle query 0x{:04x}: {}", request.id, e);
            response.answers.clear();
            response.authority.clear();
            response.additional.clear();
            if response.set_response_code(e.response_code()).is_err() {
                response.flags.response_code = ResponseCode::ServerFailure;
            }
        }
        self.encode(response, limit)
    }

    // response skeleton reusing the request id and flags
    fn base_response(&self, request: &DNSMessage) -> DNSMessage {
        let mut response = DNSMessage {
            id: request.id,
            flags: request.flags,
            questions: request.questions.clone(),
            ..DNSMessage::default()
        };
        response.flags.packet_type = PacketType::Response;
        response.flags.recursion_available = self.backend.recursion_available();
        response.flags.response_code = ResponseCode::NoError;
        // the reserved bit never propagates into a response
        response.flags.z = false;

        // echo EDNS with the server's own payload size, options reset
        if request.edns.is_some() {
            response.edns = Some(EDNSRecord {
                udp_payload_size: self.udp_payload_size,
                ..EDNSRecord::default()
            });
        }
        response
    }

    fn resolve(&self, request: &DNSMessage, response: &mut DNSMessage) -> DNSResult<()> {
        // zones are immutable while serving, so UPDATE (and every other
        // non-query opcode) is out
        if request.flags.op_code != OpCode::Query {
            return Err(DNSError::from(DNSException::NotImplemented));
        }

        for question in &request.questions {
            let domain = question.name.to_string();
            let answers = self.backend.get_answers(&domain, question.r#type)?;
            info!(
                "{} -> {} answers from {}",
                question,
                answers.records.len(),
                answers.source
            );
            for record in &answers.records {
                debug!("  {}", record);
            }

            if self.backend.is_authority(&domain) {
                // an authoritative miss is a hard "no such domain"
                if answers.is_empty() {
                    return Err(DNSError::from(DNSException::NoSuchDomain));
                }
                response.flags.authoritative_answer = true;
            }
            response.answers.extend(answers.records);
        }
        Ok(())
    }

    // encode, falling back to an empty truncated reply when the payload
    // exceeds what the client declared it can take
    fn encode(&self, mut response: DNSMessage, limit: usize) -> Option<Vec<u8>> {
        match response.to_bytes() {
            Ok(bytes) if bytes.len() <= limit => Some(bytes),
            Ok(_) => {
                response.answers.clear();
                response.authority.clear();
                response.additional.clear();
                response.flags.truncated = true;
                response.to_bytes().ok()
            }
            Err(e) => {
                error!("unable to encode response: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::net::Ipv4Addr;

    use super::*;
    use crate::backend::{Blacklist, MemoryBackend};
    use crate::rfc1035::{CharacterString, DNSQuestion, QClass, QType, RData};

    fn memory() -> MemoryBackend {
        let mut memory = MemoryBackend::new();
        memory
            .add_record("example.com", 60, RData::A(Ipv4Addr::new(1, 2, 3, 4)))
            .unwrap();
        memory
    }

    fn session(backend: impl Backend + 'static) -> Session {
        Session::new(Arc::new(backend))
    }

    fn query(domain: &str, qtype: QType) -> DNSMessage {
        let mut request = DNSMessage::query();
        request.push_question(DNSQuestion::new(domain, qtype, None).unwrap());
        request
    }

    #[test]
    fn authoritative_answer() {
        let session = session(memory());
        let request = query("example.com", QType::A);
        let raw = request.to_bytes().unwrap();

        let reply = session.handle(&raw).expect("no response");
        let response = DNSMessage::from_bytes(&reply).unwrap();

        assert_eq!(response.id, request.id);
        assert_eq!(response.flags.packet_type, PacketType::Response);
        assert!(response.flags.authoritative_answer);
        assert!(!response.flags.recursion_available);
        assert_eq!(response.flags.response_code, ResponseCode::NoError);
        assert_eq!(response.answers.len(), 1);

        let record = &response.answers[0];
        assert_eq!(record.rtype(), QType::A as u16);
        assert_eq!(record.class, QClass::IN);
        assert_eq!(record.rdata, RData::A(Ipv4Addr::new(1, 2, 3, 4)));
    }

    #[test]
    fn authoritative_miss_is_nxdomain() {
        let session = session(memory());
        let raw = query("example.com", QType::AAAA).to_bytes().unwrap();

        let reply = session.handle(&raw).unwrap();
        let response = DNSMessage::from_bytes(&reply).unwrap();
        assert_eq!(response.flags.response_code, ResponseCode::NXDomain);
        assert!(response.answers.is_empty());
    }

    #[test]
    fn non_authoritative_miss_is_noerror() {
        let session = session(memory());
        let raw = query("other.org", QType::A).to_bytes().unwrap();

        let reply = session.handle(&raw).unwrap();
        let response = DNSMessage::from_bytes(&reply).unwrap();
        assert_eq!(response.flags.response_code, ResponseCode::NoError);
        assert!(response.answers.is_empty());
        assert!(!response.flags.authoritative_answer);
    }

    #[test]
    fn blocked_domain_answers_empty() {
        let blocked: HashSet<String> = ["ads.net".to_string()].into_iter().collect();
        let chain = Blacklist::new(Box::new(memory()), blocked, HashSet::new(), None);
        let session = session(chain);

        let raw = query("tracker.ads.net", QType::A).to_bytes().unwrap();
        let reply = session.handle(&raw).unwrap();
        let response = DNSMessage::from_bytes(&reply).unwrap();

        assert_eq!(response.flags.response_code, ResponseCode::NoError);
        assert!(response.answers.is_empty());
    }

    #[test]
    fn update_opcode_not_implemented() {
        let session = session(memory());
        let mut request = query("example.com", QType::SOA);
        request.flags.op_code = OpCode::Update;

        let reply = session.handle(&request.to_bytes().unwrap()).unwrap();
        let response = DNSMessage::from_bytes(&reply).unwrap();
        assert_eq!(response.flags.response_code, ResponseCode::NotImplemented);
    }

    #[test]
    fn garbage_is_dropped() {
        let session = session(memory());
        assert!(session.handle(&[0xff, 0x00, 0x01]).is_none());
    }

    #[test]
    fn edns_echoed_with_server_size() {
        let session = session(memory());
        let mut request = query("example.com", QType::A);
        request.edns = Some(EDNSRecord {
            udp_payload_size: 1232,
            options: vec![crate::rfc1035::EdnsOption::cookie([1; 8], None)],
            ..EDNSRecord::default()
        });

        let reply = session.handle(&request.to_bytes().unwrap()).unwrap();
        let response = DNSMessage::from_bytes(&reply).unwrap();

        let edns = response.edns.expect("EDNS slot lost");
        assert_eq!(edns.udp_payload_size, DEFAULT_EDNS_PAYLOAD_SIZE);
        assert!(edns.options.is_empty());
    }

    #[test]
    fn no_edns_when_request_has_none() {
        let session = session(memory());
        let raw = query("example.com", QType::A).to_bytes().unwrap();
        let reply = session.handle(&raw).unwrap();
        let response = DNSMessage::from_bytes(&reply).unwrap();
        assert!(response.edns.is_none());
    }

    #[test]
    fn oversized_reply_is_truncated() {
        let mut memory = MemoryBackend::new();
        let long = "x".repeat(120);
        for _ in 0..6 {
            memory
                .add_record(
                    "big.example.com",
                    60,
                    RData::TXT(CharacterString(long.clone())),
                )
                .unwrap();
        }
        let session = session(memory);

        // no EDNS in the request, so the classic 512-byte limit applies
        let raw = query("big.example.com", QType::TXT).to_bytes().unwrap();
        let reply = session.handle(&raw).unwrap();
        assert!(reply.len() <= MAX_DNS_PACKET_SIZE);

        let response = DNSMessage::from_bytes(&reply).unwrap();
        assert!(response.flags.truncated);
        assert!(response.answers.is_empty());
    }

    #[test]
    fn reserved_bit_never_propagates() {
        let session = session(memory());
        let mut raw = query("example.com", QType::A).to_bytes().unwrap();
        // force the Z bit on the wire
        raw[3] |= 0b0100_0000;

        let reply = session.handle(&raw).unwrap();
        let response = DNSMessage::from_bytes(&reply).unwrap();
        assert!(!response.flags.z);
    }
}
