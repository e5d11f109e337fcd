//! TTL-respecting response cache.
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use log::debug;

use crate::backend::{Answers, Backend};
use crate::error::{DNSError, DNSException, DNSResult};
use crate::rfc1035::{DNSResourceRecord, QType};

pub const CACHE_MIN_TTL: u32 = 10;
pub const CACHE_MAX_TTL: u32 = 86_400;
// empty upstream responses are remembered briefly to damp retry storms
pub const NEGATIVE_TTL: u32 = 30;
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub min_ttl: u32,
    pub max_ttl: u32,
    pub negative_ttl: u32,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            min_ttl: CACHE_MIN_TTL,
            max_ttl: CACHE_MAX_TTL,
            negative_ttl: NEGATIVE_TTL,
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    records: Vec<DNSResourceRecord>,
    expires: Instant,
}

/// Bounded cache layered over another backend. An entry lives for the
/// smallest TTL among its records, clamped into [min_ttl, max_ttl]; empty
/// answer sets are cached for `negative_ttl`. Expired entries are evicted
/// lazily when next touched, and insertion keeps the map under its capacity
/// by dropping the entries closest to expiry.
pub struct Cache {
    backend: Box<dyn Backend>,
    config: CacheConfig,
    entries: RwLock<HashMap<(String, u16), CacheEntry>>,
}

impl Cache {
    pub const SOURCE: &'static str = "Cache";

    pub fn new(backend: Box<dyn Backend>) -> Self {
        Cache::with_config(backend, CacheConfig::default())
    }

    pub fn with_config(backend: Box<dyn Backend>, config: CacheConfig) -> Self {
        Cache {
            backend,
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn entry_ttl(&self, answers: &Answers) -> u32 {
        if answers.is_empty() {
            return self.config.negative_ttl;
        }
        answers
            .records
            .iter()
            .map(|r| r.ttl)
            .min()
            .unwrap_or(0)
            .clamp(self.config.min_ttl, self.config.max_ttl)
    }

    fn store(&self, key: (String, u16), answers: &Answers, now: Instant) -> DNSResult<()> {
        let ttl = self.entry_ttl(answers);
        let mut entries = self
            .entries
            .write()
            .map_err(|_| DNSError::from(DNSException::ServerFailure))?;

        entries.remove(&key);
        if entries.len() >= self.config.capacity {
            // expired entries go first, then whatever expires soonest
            entries.retain(|_, entry| now < entry.expires);
        }
        if entries.len() >= self.config.capacity {
            let closest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.expires)
                .map(|(key, _)| key.clone());
            if let Some(closest) = closest {
                entries.remove(&closest);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                records: answers.records.clone(),
                expires: now + Duration::from_secs(ttl as u64),
            },
        );
        Ok(())
    }
}

impl Backend for Cache {
    fn get_answers(&self, domain: &str, qtype: QType) -> DNSResult<Answers> {
        let key = (domain.to_string(), qtype as u16);
        let now = Instant::now();

        {
            let entries = self
                .entries
                .read()
                .map_err(|_| DNSError::from(DNSException::ServerFailure))?;
            if let Some(entry) = entries.get(&key) {
                if now < entry.expires {
                    return Ok(Answers::new(entry.records.clone(), Self::SOURCE));
                }
            }
        }

        debug!("cache miss for {} {:?}", domain, qtype);
        let answers = self.backend.get_answers(domain, qtype)?;
        self.store(key, &answers, now)?;
        Ok(answers)
    }

    fn is_authority(&self, domain: &str) -> bool {
        self.backend.is_authority(domain)
    }

    fn recursion_available(&self) -> bool {
        self.backend.recursion_available()
    }
}
