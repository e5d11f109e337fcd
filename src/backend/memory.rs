//! Authoritative in-memory zone store.
use std::collections::HashMap;

use crate::backend::{Answers, Backend};
use crate::error::DNSResult;
use crate::rfc1035::{DNSResourceRecord, QType, RData};

/// Static authoritative store keyed by exact domain and record type. Zones
/// are populated before serving starts and never change afterwards, which
/// is what lets the server share it between workers without locking.
/// Matching is exact: no wildcards, no CNAME chasing. A miss returns empty
/// answers; the session, not this backend, decides whether empty means
/// NXDOMAIN.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    zones: HashMap<String, HashMap<u16, Vec<DNSResourceRecord>>>,
}

impl MemoryBackend {
    pub const SOURCE: &'static str = "MemoryBackend";

    pub fn new() -> Self {
        MemoryBackend::default()
    }

    /// Add one record under its owner domain.
    pub fn add_record(&mut self, domain: &str, ttl: u32, rdata: RData) -> DNSResult<()> {
        let record = DNSResourceRecord::new(domain, ttl, rdata)?;
        self.zones
            .entry(domain.to_string())
            .or_default()
            .entry(record.rtype())
            .or_default()
            .push(record);
        Ok(())
    }
}

impl Backend for MemoryBackend {
    fn get_answers(&self, domain: &str, qtype: QType) -> DNSResult<Answers> {
        let records = match self.zones.get(domain) {
            Some(by_type) if qtype == QType::ANY => {
                by_type.values().flatten().cloned().collect()
            }
            Some(by_type) => by_type
                .get(&(qtype as u16))
                .cloned()
                .unwrap_or_default(),
            None => Vec::new(),
        };
        Ok(Answers::new(records, Self::SOURCE))
    }

    fn is_authority(&self, domain: &str) -> bool {
        self.zones.contains_key(domain)
    }

    // a static zone store performs no recursion of its own
    fn recursion_available(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::rfc1035::QClass;

    fn backend() -> MemoryBackend {
        let mut backend = MemoryBackend::new();
        backend
            .add_record("example.com", 60, RData::A(Ipv4Addr::new(1, 2, 3, 4)))
            .unwrap();
        backend
            .add_record(
                "example.com",
                60,
                RData::MX(crate::rfc1035::MX {
                    preference: 1,
                    exchange: crate::rfc1035::DomainName::try_from("mx.example.com").unwrap(),
                }),
            )
            .unwrap();
        backend
    }

    #[test]
    fn exact_hit() {
        let backend = backend();
        let answers = backend.get_answers("example.com", QType::A).unwrap();
        assert_eq!(answers.source, MemoryBackend::SOURCE);
        assert_eq!(answers.records.len(), 1);

        let record = &answers.records[0];
        assert_eq!(record.rtype(), QType::A as u16);
        assert_eq!(record.class, QClass::IN);
        assert_eq!(record.rdata, RData::A(Ipv4Addr::new(1, 2, 3, 4)));
    }

    #[test]
    fn any_returns_all_types() {
        let backend = backend();
        let answers = backend.get_answers("example.com", QType::ANY).unwrap();
        assert_eq!(answers.records.len(), 2);
    }

    #[test]
    fn miss_is_empty_not_error() {
        let backend = backend();
        assert!(backend.get_answers("example.com", QType::AAAA).unwrap().is_empty());
        assert!(backend.get_answers("other.org", QType::A).unwrap().is_empty());
    }

    #[test]
    fn exact_match_only() {
        let backend = backend();
        // no wildcard expansion on lookups
        assert!(backend.get_answers("www.example.com", QType::A).unwrap().is_empty());
        assert!(backend.is_authority("example.com"));
        assert!(!backend.is_authority("www.example.com"));
    }
}
