use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    common::types::{GuildId, SessionId, UserId},
    gateway::{opcodes::VoiceOp, rtp::TransmitMode},
};

/// Asynchronous notifications emitted by the session, decoupled from any
/// in-flight request's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    /// The handshake completed; the media path is usable.
    Ready,
    /// A signaling or UDP failure. The session is not reconnected; the
    /// instance must be reconstructed.
    TransportError(String),
}

/// One signaling frame: integer opcode plus a free-form JSON payload.
#[derive(Serialize, Deserialize, Debug)]
pub struct VoiceGatewayMessage {
    pub op: u8,
    pub d: Value,
}

/// Connection data handed to the client by the platform when the user joins
/// a voice channel. Opaque to this crate except for the endpoint hostname.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Voice endpoint hostname, optionally with a `:port` suffix (stripped
    /// for the UDP path).
    pub endpoint: String,
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub session_id: SessionId,
    pub token: String,
}

impl ConnectionInfo {
    /// The endpoint hostname without any port suffix.
    pub fn host(&self) -> &str {
        self.endpoint.split(':').next().unwrap_or(&self.endpoint)
    }
}

/// Negotiated session state. The handshake fields are write-once: Hello fills
/// ssrc/port/interval, Ready fills the mode; nothing mutates them afterwards.
#[derive(Debug)]
pub struct VoiceSession {
    pub info: ConnectionInfo,
    pub ssrc: u32,
    pub udp_port: u16,
    pub heartbeat_interval_ms: u64,
    pub mode: Option<TransmitMode>,
}

impl VoiceSession {
    pub fn new(info: ConnectionInfo) -> Self {
        Self {
            info,
            ssrc: 0,
            udp_port: 0,
            heartbeat_interval_ms: 0,
            mode: None,
        }
    }

    pub fn apply_hello(&mut self, hello: &HelloPayload) {
        self.udp_port = hello.port;
        self.heartbeat_interval_ms = hello.heartbeat_interval;
        self.ssrc = hello.ssrc;
    }

    pub fn apply_ready(&mut self, mode: TransmitMode) {
        self.mode = Some(mode);
    }

    /// Whether every field required for media transmission is populated.
    pub fn can_transmit(&self) -> bool {
        self.mode.is_some() && self.ssrc != 0 && self.udp_port != 0
    }
}

/// Payload of the inbound Hello frame (op 2).
#[derive(Debug, Deserialize)]
pub struct HelloPayload {
    pub port: u16,
    pub heartbeat_interval: u64,
    pub ssrc: u32,
}

/// Payload of the inbound Ready frame (op 4).
#[derive(Debug, Deserialize)]
pub struct ReadyPayload {
    pub mode: String,
}

pub fn identify_message(info: &ConnectionInfo) -> VoiceGatewayMessage {
    VoiceGatewayMessage {
        op: VoiceOp::Identify.as_u8(),
        d: serde_json::json!({
            "server_id": info.guild_id,
            "user_id": info.user_id.to_string(),
            "session_id": info.session_id,
            "token": info.token,
        }),
    }
}

pub fn select_protocol_message(address: &str, port: u16, mode: TransmitMode) -> VoiceGatewayMessage {
    VoiceGatewayMessage {
        op: VoiceOp::SelectProtocol.as_u8(),
        d: serde_json::json!({
            "protocol": "udp",
            "data": {
                "address": address,
                "port": port,
                "mode": mode.wire_name(),
            }
        }),
    }
}

pub fn heartbeat_message() -> VoiceGatewayMessage {
    VoiceGatewayMessage {
        op: VoiceOp::Heartbeat.as_u8(),
        d: Value::Null,
    }
}

pub fn speaking_message(speaking: bool) -> VoiceGatewayMessage {
    VoiceGatewayMessage {
        op: VoiceOp::Speaking.as_u8(),
        d: serde_json::json!({
            "speaking": speaking,
            "delay": 0,
        }),
    }
}

#[cfg(test)]
pub(crate) fn test_connection_info() -> ConnectionInfo {
    ConnectionInfo {
        endpoint: "voice.example.gg:443".to_string(),
        guild_id: GuildId("81384788765712384".to_string()),
        user_id: UserId(103735883630395392),
        session_id: SessionId("3d4b5a2f1c".to_string()),
        token: "secret-token".to_string(),
    }
}
