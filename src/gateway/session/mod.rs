use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures::{SinkExt, StreamExt, stream::SplitStream};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::protocol::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub mod heartbeat;
pub mod types;

use crate::{
    common::{
        errors::{VoiceError, VoiceResult},
        types::{GuildId, Shared},
    },
    gateway::{
        constants::VOICE_GATEWAY_VERSION, opcodes::VoiceOp, rtp::TransmitMode, udp_link::UdpLink,
    },
};

use self::types::{
    HelloPayload, ReadyPayload, VoiceEvent, VoiceGatewayMessage, VoiceSession, identify_message,
    select_protocol_message,
};

type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// The signaling channel and handshake driver.
///
/// Owns the WebSocket to the voice endpoint and walks the session through
/// Identify → Hello → IP discovery → SelectProtocol → Ready. After Ready the
/// channel only carries heartbeats and speaking transitions; the media flows
/// over the [`UdpLink`] this negotiator installs.
pub struct VoiceGateway {
    guild_id: GuildId,
    session: Arc<parking_lot::Mutex<VoiceSession>>,
    udp: Shared<Option<UdpLink>>,
    event_tx: tokio::sync::mpsc::UnboundedSender<VoiceEvent>,
    cancel: CancellationToken,
    /// Identify fires at most once per instance lifetime, never reset.
    /// Sessions are single-use: construct → connect → terminal.
    identified: AtomicBool,
    ws_tx: parking_lot::Mutex<Option<tokio::sync::mpsc::UnboundedSender<Message>>>,
}

impl VoiceGateway {
    pub fn new(
        session: Arc<parking_lot::Mutex<VoiceSession>>,
        udp: Shared<Option<UdpLink>>,
        event_tx: tokio::sync::mpsc::UnboundedSender<VoiceEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let guild_id = session.lock().info.guild_id.clone();
        Self {
            guild_id,
            session,
            udp,
            event_tx,
            cancel,
            identified: AtomicBool::new(false),
            ws_tx: parking_lot::Mutex::new(None),
        }
    }

    /// The writer handle for outgoing control frames, available once
    /// [`connect`] has run.
    ///
    /// [`connect`]: Self::connect
    pub fn sender(&self) -> Option<tokio::sync::mpsc::UnboundedSender<Message>> {
        self.ws_tx.lock().clone()
    }

    /// Dials the voice endpoint, sends Identify (guarded to once per
    /// lifetime), and spawns the writer task and the dispatch loop. The
    /// returned receiver resolves when the Ready frame lands.
    pub async fn connect(self: &Arc<Self>) -> VoiceResult<tokio::sync::oneshot::Receiver<()>> {
        let endpoint = { self.session.lock().info.endpoint.clone() };
        let url = format!("wss://{}/?v={}", endpoint, VOICE_GATEWAY_VERSION);
        debug!("[{}] connecting to voice gateway: {}", self.guild_id, url);

        let (ws_stream, _) = tokio_tungstenite::connect_async(&url).await?;
        let (mut write, read) = ws_stream.split();

        if !self.identified.swap(true, Ordering::SeqCst) {
            let info = { self.session.lock().info.clone() };
            let json = serde_json::to_string(&identify_message(&info))?;
            write.send(Message::Text(json.into())).await?;
        }

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Message>();
        *self.ws_tx.lock() = Some(tx.clone());

        let cancel = self.cancel.clone();
        let guild_id = self.guild_id.clone();
        let _write_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    msg = rx.recv() => {
                        let Some(msg) = msg else { break };
                        if let Err(e) = write.send(msg).await {
                            warn!("[{}] WS write error: {}", guild_id, e);
                            break;
                        }
                    }
                }
            }
        });

        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
        let _read_task = tokio::spawn(self.clone().read_loop(read, tx, ready_tx));

        Ok(ready_rx)
    }

    async fn read_loop(
        self: Arc<Self>,
        mut read: WsRead,
        tx: tokio::sync::mpsc::UnboundedSender<Message>,
        ready_tx: tokio::sync::oneshot::Sender<()>,
    ) {
        let mut ready_tx = Some(ready_tx);
        let mut hello_seen = false;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                msg = read.next() => {
                    let msg = match msg {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) => {
                            warn!("[{}] WS read error: {}", self.guild_id, e);
                            self.emit(VoiceEvent::TransportError(e.to_string()));
                            break;
                        }
                        None => {
                            debug!("[{}] WS stream ended", self.guild_id);
                            self.emit(VoiceEvent::TransportError("signaling stream ended".into()));
                            break;
                        }
                    };

                    match msg {
                        Message::Text(text) => {
                            if let Err(e) = self
                                .handle_frame(text.as_str(), &tx, &mut hello_seen, &mut ready_tx)
                                .await
                            {
                                error!("[{}] handshake error: {}", self.guild_id, e);
                                self.emit(VoiceEvent::TransportError(e.to_string()));
                            }
                        }
                        Message::Close(frame) => {
                            let (code, reason) = frame
                                .map(|cf| (u16::from(cf.code), cf.reason.to_string()))
                                .unwrap_or((1000u16, "No reason".into()));
                            info!(
                                "[{}] WS closed: code={}, reason='{}'",
                                self.guild_id, code, reason
                            );
                            self.emit(VoiceEvent::TransportError(format!(
                                "signaling channel closed: {code} {reason}"
                            )));
                            break;
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Decodes one signaling frame and dispatches on its opcode. Only Hello
    /// and Ready carry handshake semantics; everything else is ignored —
    /// this client implements the transmit subset only.
    async fn handle_frame(
        &self,
        text: &str,
        tx: &tokio::sync::mpsc::UnboundedSender<Message>,
        hello_seen: &mut bool,
        ready_tx: &mut Option<tokio::sync::oneshot::Sender<()>>,
    ) -> VoiceResult<()> {
        let msg: VoiceGatewayMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                warn!("[{}] failed to parse signaling frame: {}", self.guild_id, e);
                return Ok(());
            }
        };

        match VoiceOp::from_u8(msg.op) {
            VoiceOp::Hello => {
                // One-shot: a duplicate Hello must not re-run discovery.
                if *hello_seen {
                    debug!("[{}] ignoring duplicate hello", self.guild_id);
                    return Ok(());
                }
                *hello_seen = true;

                let hello: HelloPayload = serde_json::from_value(msg.d)?;
                info!(
                    "[{}] voice hello: udp_port={} heartbeat={}ms ssrc={}",
                    self.guild_id, hello.port, hello.heartbeat_interval, hello.ssrc
                );
                self.session.lock().apply_hello(&hello);

                let _heartbeat = heartbeat::spawn_heartbeat(
                    tx.clone(),
                    hello.heartbeat_interval,
                    self.cancel.clone(),
                );
                self.negotiate_udp(tx, &hello).await?;
            }
            VoiceOp::Ready => {
                let ready: ReadyPayload = serde_json::from_value(msg.d)?;
                let mode = TransmitMode::from_wire(&ready.mode).ok_or_else(|| {
                    VoiceError::Transport(format!(
                        "server selected unsupported transmit mode '{}'",
                        ready.mode
                    ))
                })?;
                self.session.lock().apply_ready(mode);
                info!("[{}] voice ready: mode={}", self.guild_id, mode.wire_name());

                if let Some(ready_tx) = ready_tx.take() {
                    let _ = ready_tx.send(());
                }
                self.emit(VoiceEvent::Ready);
            }
            other => {
                debug!("[{}] ignoring voice op {:?}", self.guild_id, other);
            }
        }

        Ok(())
    }

    /// The UDP phase: open the media socket, run IP discovery against the
    /// first inbound datagram, then announce the external address via
    /// SelectProtocol. The link is installed for the frame pump afterwards.
    async fn negotiate_udp(
        &self,
        tx: &tokio::sync::mpsc::UnboundedSender<Message>,
        hello: &HelloPayload,
    ) -> VoiceResult<()> {
        let host = { self.session.lock().info.host().to_string() };

        let link = UdpLink::open(&host, hello.port).await?;
        let (address, port) = link.discover(hello.ssrc).await?;
        info!(
            "[{}] discovered external address {}:{}",
            self.guild_id, address, port
        );

        let select = select_protocol_message(&address, port, TransmitMode::Plain);
        let json = serde_json::to_string(&select)?;
        tx.send(Message::Text(json.into()))
            .map_err(|_| VoiceError::Transport("signaling writer closed".into()))?;

        *self.udp.lock().await = Some(link);
        Ok(())
    }

    fn emit(&self, event: VoiceEvent) {
        let _ = self.event_tx.send(event);
    }
}
