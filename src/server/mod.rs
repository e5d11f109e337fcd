//! UDP server loop: datagrams in, datagrams out. The loop itself is thin
//! glue; everything interesting happens in the session handler.
use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info};
use tokio::net::UdpSocket;

use crate::error::DNSResult;
use crate::rfc1035::DEFAULT_EDNS_PAYLOAD_SIZE;

pub mod session;
pub use session::Session;

pub struct UdpServer {
    address: SocketAddr,
    session: Arc<Session>,
}

impl UdpServer {
    pub fn new(address: SocketAddr, session: Session) -> Self {
        UdpServer {
            address,
            session: Arc::new(session),
        }
    }

    /// Bind the configured address and serve forever.
    pub async fn run(&self) -> DNSResult<()> {
        let socket = UdpSocket::bind(self.address).await?;
        info!("serving DNS on {}", self.address);
        Self::serve(socket, Arc::clone(&self.session)).await
    }

    /// Serve on an already bound socket. Each datagram is dispatched to a
    /// blocking worker, so a slow upstream never stalls the receive loop.
    pub async fn serve(socket: UdpSocket, session: Arc<Session>) -> DNSResult<()> {
        let socket = Arc::new(socket);
        let mut buf = [0u8; DEFAULT_EDNS_PAYLOAD_SIZE as usize];

        loop {
            let (received, peer) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    error!("receive failed: {}", e);
                    continue;
                }
            };

            let data = buf[..received].to_vec();
            let session = Arc::clone(&session);
            let socket = Arc::clone(&socket);
            tokio::spawn(async move {
                match tokio::task::spawn_blocking(move || session.handle(&data)).await {
                    Ok(Some(bytes)) => {
                        if let Err(e) = socket.send_to(&bytes, peer).await {
                            error!("unable to send response to {}: {}", peer, e);
                        }
                    }
                    // unparsable input gets no reply at all
                    Ok(None) => {}
                    Err(e) => error!("worker failed: {}", e),
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::time::Duration;

    use super::*;
    use crate::backend::MemoryBackend;
    use crate::rfc1035::{DNSMessage, DNSQuestion, PacketType, QType, RData};

    #[tokio::test]
    async fn end_to_end_over_udp() {
        let mut memory = MemoryBackend::new();
        memory
            .add_record("example.com", 60, RData::A(Ipv4Addr::new(1, 2, 3, 4)))
            .unwrap();
        let session = Arc::new(Session::new(Arc::new(memory)));

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = socket.local_addr().unwrap();
        tokio::spawn(UdpServer::serve(socket, session));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut request = DNSMessage::query();
        request.push_question(DNSQuestion::new("example.com", QType::A, None).unwrap());
        client
            .send_to(&request.to_bytes().unwrap(), server_addr)
            .await
            .unwrap();

        let mut buf = [0u8; 512];
        let received = tokio::time::timeout(Duration::from_secs(2), client.recv(&mut buf))
            .await
            .expect("no reply within deadline")
            .unwrap();

        let response = DNSMessage::from_bytes(&buf[..received]).unwrap();
        assert_eq!(response.id, request.id);
        assert_eq!(response.flags.packet_type, PacketType::Response);
        assert_eq!(response.answers.len(), 1);
        assert_eq!(response.answers[0].rdata, RData::A(Ipv4Addr::new(1, 2, 3, 4)));
    }
}
