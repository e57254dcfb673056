use std::{net::SocketAddr, sync::Arc};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use tracing::debug;

use crate::{
    common::errors::{VoiceError, VoiceResult},
    gateway::constants::{
        DISCOVERY_DELAY_MS, DISCOVERY_IP_OFFSET, DISCOVERY_PACKET_LEN, DISCOVERY_SSRC_OFFSET,
    },
};

/// The UDP media path: one socket per session, pointed at the voice server's
/// media endpoint. Sends the discovery probe and outgoing media packets.
///
/// Inbound traffic is read exactly once, for the discovery reply. Nothing
/// else on this socket is ever parsed — this client does not receive voice.
pub struct UdpLink {
    socket: Arc<tokio::net::UdpSocket>,
    address: SocketAddr,
}

impl UdpLink {
    /// Binds an ephemeral local socket and resolves the remote media endpoint.
    pub async fn open(host: &str, port: u16) -> VoiceResult<Self> {
        let socket = tokio::net::UdpSocket::bind("0.0.0.0:0").await?;
        let address = tokio::net::lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| VoiceError::Transport(format!("cannot resolve voice host '{host}'")))?;

        debug!("udp link open: local={:?} remote={}", socket.local_addr(), address);

        Ok(Self {
            socket: Arc::new(socket),
            address,
        })
    }

    /// Runs IP discovery: waits the fixed post-open delay, sends the probe,
    /// and parses the first inbound datagram as the reply. Must be called at
    /// most once per link.
    pub async fn discover(&self, ssrc: u32) -> VoiceResult<(String, u16)> {
        tokio::time::sleep(tokio::time::Duration::from_millis(DISCOVERY_DELAY_MS)).await;

        self.socket
            .send_to(&discovery_probe(ssrc), self.address)
            .await?;

        let mut buf = [0u8; 128];
        let n = self.socket.recv(&mut buf).await?;
        parse_discovery_reply(&buf[..n])
    }

    /// Writes one packet to the media endpoint.
    pub async fn send(&self, packet: &[u8]) -> VoiceResult<()> {
        self.socket.send_to(packet, self.address).await?;
        Ok(())
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.address
    }
}

/// Builds the 70-byte discovery probe: zero-filled, ssrc big-endian at
/// byte offset 3.
pub fn discovery_probe(ssrc: u32) -> [u8; DISCOVERY_PACKET_LEN] {
    let mut probe = [0u8; DISCOVERY_PACKET_LEN];
    BigEndian::write_u32(
        &mut probe[DISCOVERY_SSRC_OFFSET..DISCOVERY_SSRC_OFFSET + 4],
        ssrc,
    );
    probe
}

/// Parses a discovery reply: bytes from offset 4 up to the first NUL are the
/// ASCII external IP; the last two bytes are the little-endian external port.
pub fn parse_discovery_reply(buf: &[u8]) -> VoiceResult<(String, u16)> {
    if buf.len() < DISCOVERY_IP_OFFSET + 2 {
        return Err(VoiceError::Transport(format!(
            "discovery reply too short: {} bytes",
            buf.len()
        )));
    }

    let ip_field = &buf[DISCOVERY_IP_OFFSET..buf.len() - 2];
    let end = ip_field
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(ip_field.len());
    let address = std::str::from_utf8(&ip_field[..end])
        .map_err(|_| VoiceError::Transport("discovery reply IP is not valid UTF-8".into()))?
        .to_string();
    let port = LittleEndian::read_u16(&buf[buf.len() - 2..]);

    Ok((address, port))
}
