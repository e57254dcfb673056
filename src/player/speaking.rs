use tokio_tungstenite::tungstenite::protocol::Message;

use crate::{
    common::errors::{VoiceError, VoiceResult},
    gateway::session::types::speaking_message,
};

/// Tracks the transmit flag and announces transitions.
///
/// A transition sends exactly one op-5 control frame; repeated calls with an
/// unchanged flag send nothing. The frame pump owns the tracker, so mutation
/// is serialized with packet sends.
#[derive(Debug, Default)]
pub struct SpeakingTracker {
    speaking: bool,
}

impl SpeakingTracker {
    pub fn new() -> Self {
        Self { speaking: false }
    }

    pub fn get(&self) -> bool {
        self.speaking
    }

    /// Sets the flag, emitting the control frame only when it changes.
    /// Returns the resulting state.
    pub fn set(
        &mut self,
        speaking: bool,
        tx: &tokio::sync::mpsc::UnboundedSender<Message>,
    ) -> VoiceResult<bool> {
        if speaking == self.speaking {
            return Ok(self.speaking);
        }

        let json = serde_json::to_string(&speaking_message(speaking))?;
        tx.send(Message::Text(json.into()))
            .map_err(|_| VoiceError::Transport("signaling writer closed".into()))?;

        self.speaking = speaking;
        Ok(self.speaking)
    }
}
