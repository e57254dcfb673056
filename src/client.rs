use std::{path::Path, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    audio::binaries::Binaries,
    common::{
        errors::{VoiceError, VoiceResult},
        types::Shared,
    },
    config::Config,
    gateway::{
        session::VoiceGateway,
        session::types::{ConnectionInfo, VoiceEvent, VoiceSession},
        udp_link::UdpLink,
    },
    player::Player,
};

/// One voice connection: signaling channel, UDP media path and frame pump
/// behind a single handle.
///
/// The instance is single-use — construct, `connect`, stream, then drop. A
/// failed transport leaves it unusable; there is no reconnect, a fresh client
/// is constructed instead.
pub struct VoiceClient {
    gateway: Arc<VoiceGateway>,
    binaries: Binaries,
    player: Shared<Player>,
    cancel: CancellationToken,
    playback_cancel: parking_lot::Mutex<CancellationToken>,
    events_rx: parking_lot::Mutex<Option<tokio::sync::mpsc::UnboundedReceiver<VoiceEvent>>>,
}

impl VoiceClient {
    /// Builds a client from the platform-supplied connection data. Fails fast
    /// with [`VoiceError::MissingDependency`] when the external audio
    /// binaries are absent — before any connection is attempted.
    pub fn new(info: ConnectionInfo, config: &Config) -> VoiceResult<Self> {
        let binaries = Binaries::detect(&config.binaries)?;

        let session = Arc::new(parking_lot::Mutex::new(VoiceSession::new(info)));
        let udp: Shared<Option<UdpLink>> = Arc::new(tokio::sync::Mutex::new(None));
        let (event_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let gateway = Arc::new(VoiceGateway::new(
            session.clone(),
            udp.clone(),
            event_tx.clone(),
            cancel.clone(),
        ));
        let player = Arc::new(tokio::sync::Mutex::new(Player::new(session, udp, event_tx)));

        Ok(Self {
            gateway,
            binaries,
            player,
            cancel,
            playback_cancel: parking_lot::Mutex::new(CancellationToken::new()),
            events_rx: parking_lot::Mutex::new(Some(events_rx)),
        })
    }

    /// Runs the handshake to completion: dial, Identify, Hello, IP discovery,
    /// SelectProtocol, Ready. Resolves once the session can transmit.
    pub async fn connect(&self) -> VoiceResult<()> {
        let ready = self.gateway.connect().await?;
        ready.await.map_err(|_| {
            VoiceError::Transport("signaling channel closed before ready".into())
        })?;
        Ok(())
    }

    /// Streams a local audio file with the default stereo channel layout.
    pub async fn play_file(&self, path: impl AsRef<Path>) -> VoiceResult<()> {
        self.play_file_with_channels(path, 2).await
    }

    /// Streams a local audio file. Rejects with
    /// [`VoiceError::PlaybackInProgress`] while another playback is running —
    /// overlapping requests are never interleaved.
    pub async fn play_file_with_channels(
        &self,
        path: impl AsRef<Path>,
        channels: u32,
    ) -> VoiceResult<()> {
        let mut player = self
            .player
            .try_lock()
            .map_err(|_| VoiceError::PlaybackInProgress)?;

        let ws_tx = self.gateway.sender().ok_or(VoiceError::NotReady)?;
        let token = self.cancel.child_token();
        *self.playback_cancel.lock() = token.clone();

        player
            .play_file(&self.binaries, path.as_ref(), channels, ws_tx, token)
            .await
    }

    /// Intentional stub: live byte-stream input to the encoder is not
    /// implemented.
    pub async fn play_raw_stream(&self) -> VoiceResult<()> {
        let mut player = self
            .player
            .try_lock()
            .map_err(|_| VoiceError::PlaybackInProgress)?;
        player.play_raw_stream().await
    }

    /// Sends one already-encoded frame immediately, advancing the counters.
    pub async fn send_buffer(&self, bytes: &[u8]) -> VoiceResult<()> {
        let mut player = self
            .player
            .try_lock()
            .map_err(|_| VoiceError::PlaybackInProgress)?;
        player.send_buffer(bytes).await
    }

    /// Stops the in-flight playback, if any: halts the pump loop, kills the
    /// encoder process and clears the speaking flag.
    pub fn stop(&self) {
        debug!("stopping current playback");
        self.playback_cancel.lock().cancel();
    }

    /// Takes the event receiver carrying ready/transport-error notifications.
    /// Yields `None` after the first call.
    pub fn take_events(&self) -> Option<tokio::sync::mpsc::UnboundedReceiver<VoiceEvent>> {
        self.events_rx.lock().take()
    }

    /// Tears the session down: heartbeat, signaling tasks and any playback.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for VoiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceClient").finish_non_exhaustive()
    }
}

impl Drop for VoiceClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
