//! Manage command line arguments here.
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{App, Arg};

use dnsgate::error::{DNSError, DNSResult};

/// This structure holds the command line arguments.
#[derive(Debug)]
pub struct CliOptions {
    pub listen: SocketAddr,
    pub upstreams: Vec<SocketAddr>,
    pub timeout: u64,
    pub pool_size: i32,
    pub cache_size: usize,
    pub blocklists: Vec<PathBuf>,
    pub block: Vec<String>,
    pub allow: Vec<String>,
    pub block_db: Option<PathBuf>,
    pub debug: bool,
}

impl CliOptions {
    pub fn options() -> DNSResult<Self> {
        let matches = App::new("dnsgated")
            .version("0.1")
            .about(
                r#"A forwarding DNS server with domain blacklisting and caching

            Queries are answered from the local zone, the cache or the
            configured upstream resolvers, unless the domain is blocked.
            "#,
            )
            .arg(
                Arg::new("listen")
                    .short('l')
                    .long("listen")
                    .takes_value(true)
                    .default_value("0.0.0.0:53")
                    .long_help("Address to serve DNS on"),
            )
            .arg(
                Arg::new("upstream")
                    .short('u')
                    .long("upstream")
                    .takes_value(true)
                    .multiple_occurrences(true)
                    .default_value("8.8.8.8:53")
                    .long_help("Upstream resolver address; repeat to add fallbacks"),
            )
            .arg(
                Arg::new("timeout")
                    .short('t')
                    .long("timeout")
                    .takes_value(true)
                    .default_value("5")
                    .long_help("Per-upstream timeout in seconds"),
            )
            .arg(
                Arg::new("pool-size")
                    .short('p')
                    .long("pool-size")
                    .takes_value(true)
                    .default_value("0")
                    .long_help("Size of the upstream socket pool; 0 spawns a socket per query"),
            )
            .arg(
                Arg::new("cache-size")
                    .short('c')
                    .long("cache-size")
                    .takes_value(true)
                    .default_value("4096")
                    .long_help("Maximum number of cached answers"),
            )
            .arg(
                Arg::new("blocklist")
                    .short('b')
                    .long("blocklist")
                    .takes_value(true)
                    .multiple_occurrences(true)
                    .long_help("Blocklist file to ingest; repeat for several"),
            )
            .arg(
                Arg::new("block")
                    .long("block")
                    .takes_value(true)
                    .multiple_occurrences(true)
                    .long_help("Block a single domain and all of its subdomains"),
            )
            .arg(
                Arg::new("allow")
                    .long("allow")
                    .takes_value(true)
                    .multiple_occurrences(true)
                    .long_help("Allow a single domain, overriding any block"),
            )
            .arg(
                Arg::new("block-db")
                    .long("block-db")
                    .takes_value(true)
                    .long_help("Path of the on-disk blocklist database"),
            )
            .arg(
                Arg::new("debug")
                    .short('g')
                    .long("debug")
                    .takes_value(false)
                    .long_help("Debug mode"),
            )
            .get_matches();

        let listen = matches
            .value_of("listen")
            .unwrap()
            .parse::<SocketAddr>()
            .map_err(|e| DNSError::Malformed(format!("bad listen address: {}", e)))?;

        let upstreams = matches
            .values_of("upstream")
            .unwrap()
            .map(|v| {
                v.parse::<SocketAddr>()
                    .map_err(|e| DNSError::Malformed(format!("bad upstream address {}: {}", v, e)))
            })
            .collect::<DNSResult<Vec<_>>>()?;

        let timeout = matches
            .value_of("timeout")
            .unwrap()
            .parse::<u64>()
            .map_err(|e| DNSError::Malformed(format!("bad timeout: {}", e)))?;

        let pool_size = matches
            .value_of("pool-size")
            .unwrap()
            .parse::<i32>()
            .map_err(|e| DNSError::Malformed(format!("bad pool size: {}", e)))?;

        let cache_size = matches
            .value_of("cache-size")
            .unwrap()
            .parse::<usize>()
            .map_err(|e| DNSError::Malformed(format!("bad cache size: {}", e)))?;

        let blocklists = matches
            .values_of("blocklist")
            .map(|values| values.map(PathBuf::from).collect())
            .unwrap_or_default();

        let block = matches
            .values_of("block")
            .map(|values| values.map(String::from).collect())
            .unwrap_or_default();

        let allow = matches
            .values_of("allow")
            .map(|values| values.map(String::from).collect())
            .unwrap_or_default();

        Ok(CliOptions {
            listen,
            upstreams,
            timeout,
            pool_size,
            cache_size,
            blocklists,
            block,
            allow,
            block_db: matches.value_of("block-db").map(PathBuf::from),
            debug: matches.is_present("debug"),
        })
    }
}
