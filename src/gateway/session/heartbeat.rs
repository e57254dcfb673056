use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::gateway::session::types::heartbeat_message;

/// Spawns the keep-alive task: one `{op:3, d:null}` frame per interval tick.
///
/// No acknowledgment tracking and no drift correction — the server only needs
/// to see traffic. The task ends when the writer channel closes or the
/// session's cancellation token fires.
pub fn spawn_heartbeat(
    tx: tokio::sync::mpsc::UnboundedSender<Message>,
    interval_ms: u64,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_millis(interval_ms.max(1)));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("heartbeat task cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Ok(json) = serde_json::to_string(&heartbeat_message()) {
                        if tx.send(Message::Text(json.into())).is_err() {
                            break; // Channel closed — session ending
                        }
                    }
                }
            }
        }
    })
}
