//! Domain blacklist backend: wildcard/subdomain matching over in-memory
//! sets, with an optional persistent key-value store for blocklists too
//! large to hold in memory. Hits from the store are memoized into the
//! in-memory sets.
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::RwLock;
use std::time::UNIX_EPOCH;

use log::{debug, info};
use regex::Regex;

use crate::backend::{Answers, Backend};
use crate::error::{DNSError, DNSException, DNSResult};
use crate::rfc1035::QType;

// RFC 1035 label syntax extended with underscores, as seen in blocklists
const DOMAIN_EXPR: &str = r"(?:[a-zA-Z0-9_](?:[a-zA-Z0-9_-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z0-9][A-Za-z0-9_-]{0,61}[A-Za-z]\.?";

// reserved key listing the ingested source names, comma-joined
pub const SOURCES_KEY: &str = "__sources";

/// Whether a parsed rule blocks or allows its domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleStatus {
    Whitelist,
    Blacklist,
}

/// One rule parsed from a blocklist file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRule {
    pub status: RuleStatus,
    pub domain: String,
}

/// The ordered list of proper suffixes of a query name, longest first:
/// `www.example.com` gives `[www.example.com, example.com]`. Splitting
/// stops once no dot remains, so bare labels never match anything.
pub fn split_domains(domain: &str) -> Vec<String> {
    let mut domains = Vec::new();
    let mut rest = domain;
    loop {
        match rest.find('.') {
            Some(index) => {
                domains.push(rest.to_string());
                rest = &rest[index + 1..];
            }
            None => break,
        }
    }
    domains
}

/// Blocklist file parser. Understands plain domain-per-line files,
/// hosts-file lines, adblock `||domain^` rules and `@@` whitelist markers.
#[derive(Debug)]
pub struct RulesetParser {
    find: Regex,
    exact: Regex,
}

impl RulesetParser {
    pub fn new() -> DNSResult<Self> {
        Ok(RulesetParser {
            find: Regex::new(DOMAIN_EXPR)?,
            exact: Regex::new(&format!("^{}$", DOMAIN_EXPR))?,
        })
    }

    /// True if the whole string is a single well-formed domain.
    pub fn is_domain(&self, value: &str) -> bool {
        self.exact.is_match(value)
    }

    // adguard path/rule specific blocks carry no plain domain to extract
    fn ignore_line(line: &str) -> bool {
        if line.contains('/') || line.contains('#') || line.starts_with('^') {
            return true;
        }
        if line.starts_with("||") && !line.ends_with('^') {
            return true;
        }
        false
    }

    /// Extract the domain a blocklist line talks about, if any.
    pub fn find_domain<'a>(&self, line: &'a str) -> Option<&'a str> {
        let line = line.trim();
        // skip commented lines
        if ['!', '#', '-', '/'].iter().any(|c| line.starts_with(*c)) {
            return None;
        }
        // skip ignored lines and lines naming several domains at once
        let mut domains = self.find.find_iter(line);
        let first = domains.next()?;
        if domains.next().is_some() || Self::ignore_line(line) {
            return None;
        }
        Some(first.as_str())
    }

    /// Parse a whole ruleset file into rules.
    pub fn parse_ruleset(&self, text: &str) -> Vec<DomainRule> {
        let mut rules = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            let domain = match self.find_domain(line) {
                Some(domain) => domain.trim_end_matches('.'),
                None => continue,
            };
            let status = if line.starts_with("@@") {
                RuleStatus::Whitelist
            } else {
                RuleStatus::Blacklist
            };
            rules.push(DomainRule {
                status,
                domain: domain.to_string(),
            });
        }
        rules
    }
}

/// Persistent store for blocklists too large to keep in memory. Keys are
/// exact domains, values are `b` (block) or `w` (allow).
pub trait BlockDB: Send + Sync {
    /// Look up one exact domain.
    fn match_exact(&self, domain: &str) -> DNSResult<Option<bool>>;

    /// Walk the domain's suffixes; the first hit decides.
    fn match_domain(&self, domain: &str) -> DNSResult<Option<bool>> {
        for candidate in split_domains(domain) {
            if let Some(blocked) = self.match_exact(&candidate)? {
                return Ok(Some(blocked));
            }
        }
        Ok(None)
    }
}

/// sled-backed implementation of [`BlockDB`]. Besides the domain keys it
/// keeps the `__sources` bookkeeping key and one key per ingested file path
/// holding the file's last seen mtime as a decimal string.
pub struct SledBlockDB {
    db: sled::Db,
    parser: RulesetParser,
}

impl SledBlockDB {
    pub fn open(path: &Path) -> DNSResult<Self> {
        Ok(SledBlockDB {
            db: sled::open(path)?,
            parser: RulesetParser::new()?,
        })
    }

    pub fn from_db(db: sled::Db) -> DNSResult<Self> {
        Ok(SledBlockDB {
            db,
            parser: RulesetParser::new()?,
        })
    }

    /// Names of the sources ingested so far.
    pub fn sources(&self) -> DNSResult<HashSet<String>> {
        let raw = match self.db.get(SOURCES_KEY)? {
            Some(raw) => raw,
            None => return Ok(HashSet::new()),
        };
        Ok(String::from_utf8_lossy(&raw)
            .split(',')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect())
    }

    /// Write rules one by one into the store, then record the source name.
    pub fn ingest<I>(&self, name: &str, rules: I, validate: bool) -> DNSResult<()>
    where
        I: IntoIterator<Item = DomainRule>,
    {
        let mut written = 0usize;
        for rule in rules {
            if validate && !self.parser.is_domain(&rule.domain) {
                continue;
            }
            let value: &[u8] = match rule.status {
                RuleStatus::Blacklist => b"b",
                RuleStatus::Whitelist => b"w",
            };
            self.db.insert(rule.domain.as_bytes(), value)?;
            written += 1;
        }
        self.db.flush()?;

        let mut sources = self.sources()?;
        sources.insert(name.to_string());
        let joined = sources.into_iter().collect::<Vec<_>>().join(",");
        self.db.insert(SOURCES_KEY, joined.as_bytes())?;

        debug!("ingested {} rules from source {}", written, name);
        Ok(())
    }

    /// Ingest a blocklist file, skipping it entirely when its mtime has not
    /// moved since the last ingestion.
    pub fn ingest_file(&self, path: &Path, name: Option<&str>) -> DNSResult<()> {
        let mtime = fs::metadata(path)?
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map_err(|_| DNSError::malformed("file mtime before epoch"))?
            .as_secs();

        let path_key = path.to_string_lossy().to_string();
        if let Some(last) = self.db.get(path_key.as_bytes())? {
            if String::from_utf8_lossy(&last) == mtime.to_string() {
                debug!("skipping unchanged blocklist {}", path_key);
                return Ok(());
            }
        }

        let name = match name {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| path_key.clone()),
        };
        let text = fs::read_to_string(path)?;
        let rules = self.parser.parse_ruleset(&text);
        info!("ingesting {} rules from {}", rules.len(), path_key);

        // rules from files went through the domain regex already
        self.ingest(&name, rules, false)?;
        self.db
            .insert(path_key.as_bytes(), mtime.to_string().as_bytes())?;
        Ok(())
    }

    /// Add a single rule by hand.
    pub fn add(&self, rule: DomainRule) -> DNSResult<()> {
        self.ingest("_manual", std::iter::once(rule), true)
    }

    /// Remove a domain; true if it was present.
    pub fn remove(&self, domain: &str) -> DNSResult<bool> {
        Ok(self.db.remove(domain.as_bytes())?.is_some())
    }
}

impl BlockDB for SledBlockDB {
    fn match_exact(&self, domain: &str) -> DNSResult<Option<bool>> {
        Ok(self
            .db
            .get(domain.as_bytes())?
            .map(|value| value.as_ref() == b"b"))
    }
}

/// Backend layer short-circuiting blocked domains with an empty answer set.
///
/// Matching walks the query name's suffixes against the whitelist first,
/// then the blacklist, then (on no decision) the persistent store. The walk
/// is linear in the label count; wildcard entries are plain set entries
/// reached through the same walk, which keeps the structure a pair of flat
/// sets instead of a prefix tree.
pub struct Blacklist {
    backend: Box<dyn Backend>,
    blacklist: RwLock<HashSet<String>>,
    whitelist: RwLock<HashSet<String>>,
    database: Option<Box<dyn BlockDB>>,
}

impl Blacklist {
    pub const SOURCE: &'static str = "Blacklist";

    pub fn new(
        backend: Box<dyn Backend>,
        blacklist: HashSet<String>,
        whitelist: HashSet<String>,
        database: Option<Box<dyn BlockDB>>,
    ) -> Self {
        // whitelist dominates: normalize so the sets stay disjoint
        let blacklist = &blacklist - &whitelist;
        Blacklist {
            backend,
            blacklist: RwLock::new(blacklist),
            whitelist: RwLock::new(whitelist),
            database,
        }
    }

    /// Check if the following domain is blocked.
    pub fn is_blocked(&self, domain: &str) -> DNSResult<bool> {
        let domains = split_domains(domain);

        {
            let whitelist = self
                .whitelist
                .read()
                .map_err(|_| DNSError::from(DNSException::ServerFailure))?;
            if domains.iter().any(|m| whitelist.contains(m)) {
                return Ok(false);
            }
            let blacklist = self
                .blacklist
                .read()
                .map_err(|_| DNSError::from(DNSException::ServerFailure))?;
            if domains.iter().any(|m| blacklist.contains(m)) {
                return Ok(true);
            }
        }

        // undecided: probe the persistent store, memoizing the verdict so
        // the next lookup stays in memory
        if let Some(database) = &self.database {
            for candidate in &domains {
                match database.match_exact(candidate)? {
                    Some(true) => {
                        let mut blacklist = self
                            .blacklist
                            .write()
                            .map_err(|_| DNSError::from(DNSException::ServerFailure))?;
                        blacklist.insert(domain.to_string());
                        blacklist.insert(candidate.clone());
                        return Ok(true);
                    }
                    Some(false) => {
                        let mut whitelist = self
                            .whitelist
                            .write()
                            .map_err(|_| DNSError::from(DNSException::ServerFailure))?;
                        whitelist.insert(domain.to_string());
                        whitelist.insert(candidate.clone());
                        return Ok(false);
                    }
                    None => {}
                }
            }
        }
        Ok(false)
    }
}

impl Backend for Blacklist {
    fn get_answers(&self, domain: &str, qtype: QType) -> DNSResult<Answers> {
        if self.is_blocked(domain)? {
            debug!("blocked lookup for {}", domain);
            return Ok(Answers::empty(Self::SOURCE));
        }
        self.backend.get_answers(domain, qtype)
    }

    fn is_authority(&self, domain: &str) -> bool {
        self.backend.is_authority(domain)
    }

    fn recursion_available(&self) -> bool {
        self.backend.recursion_available()
    }
}
