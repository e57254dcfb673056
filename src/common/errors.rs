use thiserror::Error;

/// Errors surfaced by the voice client.
///
/// Transport failures that happen outside an in-flight request (signaling
/// socket drops, UDP send errors mid-stream) are delivered on the client's
/// event channel instead, decoupled from any request's own result.
#[derive(Debug, Error)]
pub enum VoiceError {
    /// The playback source path does not exist.
    #[error("playback source not found: {0}")]
    SourceNotFound(String),

    /// The requested operation is not implemented by this client.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// The external encoder process exited with a nonzero status.
    #[error("encoder process exited with status {0}")]
    EncoderProcessFailed(i32),

    /// Signaling or UDP socket failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// A required external binary was not found on this host.
    #[error("missing dependency: '{0}' was not found on PATH")]
    MissingDependency(&'static str),

    /// A playback is already running on this client instance.
    #[error("a playback is already in progress")]
    PlaybackInProgress,

    /// The voice handshake has not completed yet.
    #[error("voice session is not ready for transmission")]
    NotReady,

    /// The configuration file could not be parsed.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl From<std::io::Error> for VoiceError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for VoiceError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for VoiceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Transport(format!("signaling frame codec error: {}", e))
    }
}

/// A convenient Result alias returning `VoiceError`.
pub type VoiceResult<T> = std::result::Result<T, VoiceError>;
