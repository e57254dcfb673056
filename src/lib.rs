//! Voice transport client for the platform's voice protocol.
//!
//! Negotiates a session over the signaling WebSocket, learns its external
//! address via UDP IP discovery, keeps the session alive with heartbeats, and
//! streams encoded audio as paced, sequenced RTP packets.
//!
//! ```no_run
//! use voicelink::{Config, ConnectionInfo, VoiceClient};
//! use voicelink::common::types::{GuildId, SessionId, UserId};
//!
//! # async fn run() -> voicelink::VoiceResult<()> {
//! let info = ConnectionInfo {
//!     endpoint: "voice.example.gg:443".into(),
//!     guild_id: GuildId("81384788765712384".into()),
//!     user_id: UserId(103735883630395392),
//!     session_id: SessionId("3d4b5a2f1c".into()),
//!     token: "token".into(),
//! };
//! let client = VoiceClient::new(info, &Config::load()?)?;
//! client.connect().await?;
//! client.play_file("music.mp3").await?;
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod client;
pub mod common;
pub mod config;
pub mod gateway;
pub mod player;

pub use client::VoiceClient;
pub use common::errors::{VoiceError, VoiceResult};
pub use config::Config;
pub use gateway::rtp::TransmitMode;
pub use gateway::session::types::{ConnectionInfo, VoiceEvent};
