//! Recursive forwarder: a pooled UDP client plus the backend layer that
//! consults it whenever the wrapped backend has nothing to say.
use std::collections::VecDeque;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::backend::{Answers, Backend};
use crate::error::{DNSError, DNSException, DNSResult};
use crate::rfc1035::{DNSMessage, DNSQuestion, QType, DEFAULT_EDNS_PAYLOAD_SIZE};
use crate::util::hex_buffer;

pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

// a socket plus its birth time: sockets outlive the timeout and are retired
// at the next checkout
#[derive(Debug)]
struct Connector {
    socket: UdpSocket,
    created: Instant,
}

impl Connector {
    fn new(timeout: Duration) -> DNSResult<Self> {
        // bind to an ephemeral local port
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_read_timeout(Some(timeout))?;
        Ok(Connector {
            socket,
            created: Instant::now(),
        })
    }
}

// Bounded pool of datagram sockets. Checkout blocks until a socket is
// available, so the pool is safe under concurrent callers.
#[derive(Debug)]
struct SocketPool {
    connectors: Mutex<VecDeque<Connector>>,
    available: Condvar,
}

impl SocketPool {
    fn new(size: usize, timeout: Duration) -> DNSResult<Self> {
        let mut connectors = VecDeque::with_capacity(size);
        for _ in 0..size {
            connectors.push_back(Connector::new(timeout)?);
        }
        Ok(SocketPool {
            connectors: Mutex::new(connectors),
            available: Condvar::new(),
        })
    }

    fn checkout(&self, timeout: Duration) -> DNSResult<Connector> {
        let mut connectors = self
            .connectors
            .lock()
            .map_err(|_| DNSError::from(DNSException::ServerFailure))?;
        loop {
            if let Some(connector) = connectors.pop_front() {
                // a socket older than the timeout may hold a stale reply
                // from a cancelled exchange: retire it
                if connector.created.elapsed() > timeout {
                    return Connector::new(timeout);
                }
                return Ok(connector);
            }
            connectors = self
                .available
                .wait(connectors)
                .map_err(|_| DNSError::from(DNSException::ServerFailure))?;
        }
    }

    fn checkin(&self, connector: Connector) {
        if let Ok(mut connectors) = self.connectors.lock() {
            connectors.push_back(connector);
        }
        self.available.notify_one();
    }
}

/// Connection-pooled DNS client over UDP.
///
/// Upstreams are tried in order; a timeout, a parse failure or a transaction
/// id mismatch moves on to the next address. With `pool_size <= 0` a fresh
/// socket is spawned and closed per query.
#[derive(Debug)]
pub struct UdpClient {
    addrs: Vec<SocketAddr>,
    timeout: Duration,
    pool: Option<SocketPool>,
}

impl UdpClient {
    pub fn new(addrs: Vec<SocketAddr>, timeout: Duration, pool_size: i32) -> DNSResult<Self> {
        let pool = if pool_size > 0 {
            Some(SocketPool::new(pool_size as usize, timeout)?)
        } else {
            None
        };
        Ok(UdpClient {
            addrs,
            timeout,
            pool,
        })
    }

    fn checkout(&self) -> DNSResult<Connector> {
        match &self.pool {
            Some(pool) => pool.checkout(self.timeout),
            None => Connector::new(self.timeout),
        }
    }

    fn checkin(&self, connector: Connector) {
        // without a pool the socket simply drops closed
        if let Some(pool) = &self.pool {
            pool.checkin(connector);
        }
    }

    /// Send one question upstream and return the first matching response.
    pub fn query(&self, question: DNSQuestion) -> DNSResult<DNSMessage> {
        let mut request = DNSMessage::query();
        request.push_question(question);
        let bytes = request.to_bytes()?;
        debug!("query buffer: {}", hex_buffer(&bytes));

        for addr in &self.addrs {
            let connector = self.checkout()?;
            let outcome = Self::exchange(&connector, addr, &bytes, request.id);
            self.checkin(connector);

            match outcome {
                Ok(response) => return Ok(response),
                Err(e) => warn!("upstream {} failed: {}", addr, e),
            }
        }
        Err(DNSError::from(DNSException::ServerFailure))
    }

    fn exchange(
        connector: &Connector,
        addr: &SocketAddr,
        bytes: &[u8],
        id: u16,
    ) -> DNSResult<DNSMessage> {
        connector.socket.send_to(bytes, addr)?;

        let mut buf = [0u8; DEFAULT_EDNS_PAYLOAD_SIZE as usize];
        let (received, _) = connector.socket.recv_from(&mut buf)?;
        let response = DNSMessage::from_bytes(&buf[..received])?;

        // a reply to somebody else's transaction counts as no reply at all
        if response.id != id {
            return Err(DNSError::malformed("transaction id mismatch"));
        }
        Ok(response)
    }
}

/// Backend layer delegating misses to the upstream resolvers.
pub struct Forwarder {
    backend: Box<dyn Backend>,
    client: UdpClient,
}

impl Forwarder {
    pub const SOURCE: &'static str = "Forwarder";

    pub fn new(backend: Box<dyn Backend>, client: UdpClient) -> Self {
        Forwarder { backend, client }
    }
}

impl Backend for Forwarder {
    fn get_answers(&self, domain: &str, qtype: QType) -> DNSResult<Answers> {
        // the wrapped backend wins when it has answers
        let inner = self.backend.get_answers(domain, qtype)?;
        if !inner.is_empty() {
            return Ok(inner);
        }

        let question = DNSQuestion::new(domain, qtype, None)?;
        let response = self.client.query(question)?;
        Ok(Answers::new(response.answers, Self::SOURCE))
    }

    fn is_authority(&self, domain: &str) -> bool {
        self.backend.is_authority(domain)
    }

    fn recursion_available(&self) -> bool {
        true
    }
}
