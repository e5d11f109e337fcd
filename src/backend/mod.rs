//! Query-resolution backends.
//!
//! A backend answers (domain, record type) lookups. Backends compose by
//! wrapping: the blacklist wraps the cache, the cache wraps the forwarder,
//! the forwarder wraps the authoritative store. Within a single query the
//! layers are consulted strictly in wrapping order, outermost first.
use crate::error::DNSResult;
use crate::rfc1035::{DNSResourceRecord, QType};

pub mod blacklist;
pub mod cache;
pub mod forward;
pub mod memory;

pub use blacklist::Blacklist;
pub use cache::Cache;
pub use forward::{Forwarder, UdpClient};
pub use memory::MemoryBackend;

/// Records returned for a query, tagged with the name of the layer that
/// produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct Answers {
    pub records: Vec<DNSResourceRecord>,
    pub source: &'static str,
}

impl Answers {
    pub fn new(records: Vec<DNSResourceRecord>, source: &'static str) -> Self {
        Answers { records, source }
    }

    pub fn empty(source: &'static str) -> Self {
        Answers {
            records: Vec::new(),
            source,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Common query contract shared by all layers.
pub trait Backend: Send + Sync {
    /// Answer records for the domain/type pair. An empty answer set is not
    /// an error: the session decides whether it means NXDOMAIN or nothing.
    fn get_answers(&self, domain: &str, qtype: QType) -> DNSResult<Answers>;

    /// True if this chain is authoritative for the domain.
    fn is_authority(&self, domain: &str) -> bool;

    /// Copied by the session into the RA response flag.
    fn recursion_available(&self) -> bool;
}
