//! dnsgated: a forwarding DNS server with domain blacklisting and caching.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use dnsgate::backend::blacklist::{BlockDB, RuleStatus, RulesetParser, SledBlockDB};
use dnsgate::backend::{Backend, Blacklist, Cache, Forwarder, MemoryBackend, UdpClient};
use dnsgate::backend::cache::CacheConfig;
use dnsgate::error::DNSResult;
use dnsgate::server::{Session, UdpServer};

mod args;
use args::CliOptions;

#[tokio::main]
async fn main() -> DNSResult<()> {
    // manage arguments from command line
    let options = CliOptions::options()?;

    let mut logger = env_logger::Builder::from_default_env();
    if options.debug {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();
    debug!("options: {:?}", &options);

    // innermost layer: the authoritative store, empty unless populated
    let memory = MemoryBackend::new();

    // wrap with the forwarder talking to the upstream resolvers
    let client = UdpClient::new(
        options.upstreams.clone(),
        Duration::from_secs(options.timeout),
        options.pool_size,
    )?;
    let mut chain: Box<dyn Backend> = Box::new(Forwarder::new(Box::new(memory), client));

    // wrap with the cache
    let config = CacheConfig {
        capacity: options.cache_size,
        ..CacheConfig::default()
    };
    chain = Box::new(Cache::with_config(chain, config));

    // outermost layer: the blacklist. Blocklist files land in the on-disk
    // database when one is configured, in the in-memory sets otherwise.
    let mut blacklist: HashSet<String> = options.block.iter().cloned().collect();
    let mut whitelist: HashSet<String> = options.allow.iter().cloned().collect();
    let database: Option<Box<dyn BlockDB>> = match &options.block_db {
        Some(path) => {
            let db = SledBlockDB::open(path)?;
            for file in &options.blocklists {
                db.ingest_file(file, None)?;
            }
            Some(Box::new(db))
        }
        None => {
            let parser = RulesetParser::new()?;
            for file in &options.blocklists {
                let text = std::fs::read_to_string(file)?;
                for rule in parser.parse_ruleset(&text) {
                    match rule.status {
                        RuleStatus::Blacklist => blacklist.insert(rule.domain),
                        RuleStatus::Whitelist => whitelist.insert(rule.domain),
                    };
                }
            }
            None
        }
    };
    chain = Box::new(Blacklist::new(chain, blacklist, whitelist, database));

    let session = Session::new(Arc::from(chain));
    let server = UdpServer::new(options.listen, session);
    server.run().await
}
