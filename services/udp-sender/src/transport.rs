use gateway_core::session_datagram::DatagramTransport;
use tokio::net::UdpSocket;

/// A UDP socket bound for broadcast or unicast sending, implementing the
/// gateway core's `DatagramTransport` seam.
pub struct UdpBroadcastTransport {
    socket: UdpSocket,
}

impl UdpBroadcastTransport {
    pub async fn bind(host: &str, port: u16, broadcast: bool) -> std::io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.set_broadcast(broadcast)?;
        socket.connect((host, port)).await?;
        Ok(Self { socket })
    }
}

#[async_trait::async_trait]
impl DatagramTransport for UdpBroadcastTransport {
    async fn send(&self, buf: &[u8]) -> std::io::Result<usize> {
        self.socket.send(buf).await
    }
}
