use std::{path::Path, sync::Arc};

use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub mod speaking;

use crate::{
    audio::{binaries::Binaries, encoder::EncoderProcess, encoder::FrameSource},
    common::{
        errors::{VoiceError, VoiceResult},
        types::Shared,
    },
    gateway::{
        constants::FRAME_DURATION_MS,
        rtp::RtpPacketBuilder,
        session::types::{VoiceEvent, VoiceSession},
        udp_link::UdpLink,
    },
};

use self::speaking::SpeakingTracker;

/// How a pump run ended.
enum PumpOutcome {
    /// The stream drained naturally; carries the number of frames sent.
    Completed(u64),
    /// The playback was stopped via its cancellation token.
    Stopped,
}

/// The audio frame pump: reads the encoder's length-prefixed frame stream,
/// paces one frame every 20 ms, and drives the packet builder, counters,
/// speaking tracker and UDP link per frame.
///
/// Exactly one playback runs at a time; the client front-end rejects
/// overlapping requests before they reach this type. Counters persist across
/// playbacks on the same session.
pub struct Player {
    session: Arc<parking_lot::Mutex<VoiceSession>>,
    udp: Shared<Option<UdpLink>>,
    builder: RtpPacketBuilder,
    speaking: SpeakingTracker,
    event_tx: tokio::sync::mpsc::UnboundedSender<VoiceEvent>,
}

impl Player {
    pub fn new(
        session: Arc<parking_lot::Mutex<VoiceSession>>,
        udp: Shared<Option<UdpLink>>,
        event_tx: tokio::sync::mpsc::UnboundedSender<VoiceEvent>,
    ) -> Self {
        Self {
            session,
            udp,
            builder: RtpPacketBuilder::new(),
            speaking: SpeakingTracker::new(),
            event_tx,
        }
    }

    /// Encodes and streams a local file. Resolves when the stream drains and
    /// the encoder exits cleanly; a nonzero encoder exit fails the request.
    pub async fn play_file(
        &mut self,
        binaries: &Binaries,
        path: &Path,
        channels: u32,
        ws_tx: tokio::sync::mpsc::UnboundedSender<Message>,
        cancel: CancellationToken,
    ) -> VoiceResult<()> {
        if !path.exists() {
            return Err(VoiceError::SourceNotFound(path.display().to_string()));
        }
        if !self.session.lock().can_transmit() {
            return Err(VoiceError::NotReady);
        }

        let mut encoder = EncoderProcess::spawn(binaries, path, channels)?;

        if let Err(e) = self.speaking.set(true, &ws_tx) {
            self.emit_transport(&e);
        }

        let outcome = self.run_stream(&mut encoder.stream, &ws_tx, &cancel).await;

        if let Err(e) = self.speaking.set(false, &ws_tx) {
            self.emit_transport(&e);
        }

        match outcome {
            PumpOutcome::Completed(frames) => {
                info!("playback drained after {} frames", frames);
                encoder.wait().await
            }
            PumpOutcome::Stopped => {
                debug!("playback stopped");
                encoder.kill();
                Ok(())
            }
        }
    }

    /// Piping a live byte stream into the encoder is not implemented; this
    /// fails unconditionally.
    pub async fn play_raw_stream(&mut self) -> VoiceResult<()> {
        Err(VoiceError::UnsupportedOperation("raw stream playback"))
    }

    /// Low-level escape hatch: builds and sends one media packet immediately
    /// from caller-supplied bytes, advancing the counters.
    pub async fn send_buffer(&mut self, bytes: &[u8]) -> VoiceResult<()> {
        self.send_frame(bytes).await
    }

    /// The frame loop. Each iteration reads one `u16le length` header plus
    /// payload, sends it, and sleeps to the frame's absolute deadline
    /// (`stream_start + frame_index * 20ms`) so per-iteration processing time
    /// does not accumulate as drift.
    ///
    /// End-of-stream detection is debounced: only the second *consecutive*
    /// failed read of the same kind (header or payload) drains the pump; a
    /// single miss schedules a short retry, bridging transient gaps in the
    /// encoder's output.
    async fn run_stream<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        ws_tx: &tokio::sync::mpsc::UnboundedSender<Message>,
        cancel: &CancellationToken,
    ) -> PumpOutcome {
        let start = tokio::time::Instant::now();
        let retry = tokio::time::Duration::from_millis(FRAME_DURATION_MS) / 100;
        let mut frame_index: u64 = 0;
        let mut header_misses = 0u8;
        let mut payload_misses = 0u8;

        'frames: loop {
            if cancel.is_cancelled() {
                return PumpOutcome::Stopped;
            }

            let len = tokio::select! {
                _ = cancel.cancelled() => return PumpOutcome::Stopped,
                len = source.next_len() => len,
            };
            let Some(len) = len else {
                header_misses += 1;
                if header_misses >= 2 {
                    break 'frames;
                }
                tokio::time::sleep(retry).await;
                continue 'frames;
            };
            header_misses = 0;

            let len = len as usize;
            let mut payload = vec![0u8; len];
            let read = if len == 0 {
                0
            } else {
                loop {
                    match source.read_frame(len, &mut payload).await {
                        Some(n) => {
                            payload_misses = 0;
                            break n;
                        }
                        None => {
                            payload_misses += 1;
                            if payload_misses >= 2 {
                                break 'frames;
                            }
                            tokio::time::sleep(retry).await;
                        }
                    }
                }
            };
            if read < len {
                // Short read: the zero-initialized tail of `payload` pads the
                // frame out to its declared length.
                debug!("short frame read: {} of {} bytes", read, len);
            }

            // The flag can drift false mid-stream; announce before sending.
            if !self.speaking.get() {
                if let Err(e) = self.speaking.set(true, ws_tx) {
                    self.emit_transport(&e);
                }
            }

            if let Err(e) = self.send_frame(&payload).await {
                self.emit_transport(&e);
            }

            frame_index += 1;
            let deadline =
                start + tokio::time::Duration::from_millis(FRAME_DURATION_MS * frame_index);
            tokio::time::sleep_until(deadline).await;
        }

        PumpOutcome::Completed(frame_index)
    }

    /// Builds one media packet, sends it, then advances the counters. Frames
    /// go out strictly in read order, one in flight at a time.
    async fn send_frame(&mut self, payload: &[u8]) -> VoiceResult<()> {
        let (ssrc, mode) = {
            let session = self.session.lock();
            (session.ssrc, session.mode.ok_or(VoiceError::NotReady)?)
        };

        let udp = self.udp.lock().await;
        let link = udp.as_ref().ok_or(VoiceError::NotReady)?;

        let packet = self.builder.build(ssrc, mode, payload);
        link.send(packet).await?;
        self.builder.advance();
        Ok(())
    }

    /// Transport failures during playback go to the event channel, not the
    /// in-flight request's result. The two channels stay independent.
    fn emit_transport(&self, e: &VoiceError) {
        let _ = self
            .event_tx
            .send(VoiceEvent::TransportError(e.to_string()));
    }

    #[cfg(test)]
    fn builder(&self) -> &RtpPacketBuilder {
        &self.builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use async_trait::async_trait;

    use crate::gateway::{
        rtp::TransmitMode,
        session::types::{HelloPayload, test_connection_info},
    };

    /// Scripted frame source: headers and payload reads are popped from
    /// queues, `None` entries model reads that return no bytes.
    struct ScriptedSource {
        headers: VecDeque<Option<u16>>,
        payloads: VecDeque<Option<Vec<u8>>>,
    }

    #[async_trait]
    impl FrameSource for ScriptedSource {
        async fn next_len(&mut self) -> Option<u16> {
            self.headers.pop_front().flatten()
        }

        async fn read_frame(&mut self, len: usize, buf: &mut [u8]) -> Option<usize> {
            let bytes = self.payloads.pop_front().flatten()?;
            let n = bytes.len().min(len);
            buf[..n].copy_from_slice(&bytes[..n]);
            Some(n)
        }
    }

    fn frames(source_frames: &[&[u8]]) -> ScriptedSource {
        ScriptedSource {
            headers: source_frames
                .iter()
                .map(|f| Some(f.len() as u16))
                .collect(),
            payloads: source_frames.iter().map(|f| Some(f.to_vec())).collect(),
        }
    }

    struct Fixture {
        player: Player,
        receiver: tokio::net::UdpSocket,
        ws_rx: tokio::sync::mpsc::UnboundedReceiver<Message>,
        ws_tx: tokio::sync::mpsc::UnboundedSender<Message>,
        events_rx: tokio::sync::mpsc::UnboundedReceiver<VoiceEvent>,
    }

    async fn ready_fixture() -> Fixture {
        let receiver = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();
        let link = UdpLink::open("127.0.0.1", port).await.unwrap();

        let mut session = VoiceSession::new(test_connection_info());
        session.apply_hello(&HelloPayload {
            port,
            heartbeat_interval: 5500,
            ssrc: 4242,
        });
        session.apply_ready(TransmitMode::Plain);

        let session = Arc::new(parking_lot::Mutex::new(session));
        let udp: Shared<Option<UdpLink>> = Arc::new(tokio::sync::Mutex::new(Some(link)));
        let (event_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
        let (ws_tx, ws_rx) = tokio::sync::mpsc::unbounded_channel();

        Fixture {
            player: Player::new(session, udp, event_tx),
            receiver,
            ws_rx,
            ws_tx,
            events_rx,
        }
    }

    async fn recv_packet(receiver: &tokio::net::UdpSocket) -> Vec<u8> {
        let mut buf = [0u8; 1500];
        let n = receiver.recv(&mut buf).await.unwrap();
        buf[..n].to_vec()
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_sends_frames_in_order_with_advancing_counters() {
        let mut fx = ready_fixture().await;
        let mut source = frames(&[&[0xAA, 0xBB], &[0xCC]]);
        let cancel = CancellationToken::new();

        let outcome = fx
            .player
            .run_stream(&mut source, &fx.ws_tx, &cancel)
            .await;
        assert!(matches!(outcome, PumpOutcome::Completed(2)));

        let first = recv_packet(&fx.receiver).await;
        assert_eq!(&first[..2], &[0x80, 0x78]);
        assert_eq!(&first[2..4], &0u16.to_be_bytes()); // sequence 0
        assert_eq!(&first[4..8], &0u32.to_be_bytes()); // timestamp 0
        assert_eq!(&first[8..12], &4242u32.to_be_bytes());
        assert_eq!(&first[12..], &[0xAA, 0xBB]);

        let second = recv_packet(&fx.receiver).await;
        assert_eq!(&second[2..4], &1u16.to_be_bytes());
        assert_eq!(&second[4..8], &960u32.to_be_bytes());
        assert_eq!(&second[12..], &[0xCC]);

        // The defensive speaking-true transition fired exactly once.
        assert!(fx.ws_rx.try_recv().is_ok());
        assert!(fx.ws_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_header_miss_does_not_end_the_stream() {
        let mut fx = ready_fixture().await;
        let mut source = ScriptedSource {
            headers: VecDeque::from([None, Some(1), None, None]),
            payloads: VecDeque::from([Some(vec![0xEE])]),
        };

        let outcome = fx
            .player
            .run_stream(&mut source, &fx.ws_tx, &CancellationToken::new())
            .await;
        assert!(matches!(outcome, PumpOutcome::Completed(1)));

        let packet = recv_packet(&fx.receiver).await;
        assert_eq!(&packet[12..], &[0xEE]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_consecutive_header_misses_drain_the_stream() {
        let mut fx = ready_fixture().await;
        let mut source = ScriptedSource {
            headers: VecDeque::from([None, None]),
            payloads: VecDeque::new(),
        };

        let outcome = fx
            .player
            .run_stream(&mut source, &fx.ws_tx, &CancellationToken::new())
            .await;
        assert!(matches!(outcome, PumpOutcome::Completed(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_payload_miss_debounce_is_independent_and_retries() {
        let mut fx = ready_fixture().await;
        // Header succeeds, first payload read returns nothing, retry delivers.
        let mut source = ScriptedSource {
            headers: VecDeque::from([Some(2), None, None]),
            payloads: VecDeque::from([None, Some(vec![0xAB, 0xCD])]),
        };

        let outcome = fx
            .player
            .run_stream(&mut source, &fx.ws_tx, &CancellationToken::new())
            .await;
        assert!(matches!(outcome, PumpOutcome::Completed(1)));

        let packet = recv_packet(&fx.receiver).await;
        assert_eq!(&packet[12..], &[0xAB, 0xCD]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_payload_is_zero_padded_to_declared_length() {
        let mut fx = ready_fixture().await;
        let mut source = ScriptedSource {
            headers: VecDeque::from([Some(4), None, None]),
            payloads: VecDeque::from([Some(vec![0xAA])]),
        };

        let outcome = fx
            .player
            .run_stream(&mut source, &fx.ws_tx, &CancellationToken::new())
            .await;
        assert!(matches!(outcome, PumpOutcome::Completed(1)));

        let packet = recv_packet(&fx.receiver).await;
        assert_eq!(&packet[12..], &[0xAA, 0x00, 0x00, 0x00]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_pump_stops_immediately() {
        let mut fx = ready_fixture().await;
        let mut source = frames(&[&[0xAA]]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = fx.player.run_stream(&mut source, &fx.ws_tx, &cancel).await;
        assert!(matches!(outcome, PumpOutcome::Stopped));
    }

    #[tokio::test]
    async fn test_play_file_missing_source_fails_before_spawning() {
        let mut fx = ready_fixture().await;
        let binaries = Binaries {
            encoder: "/bin/sh".into(),
            transcoder: "/bin/sh".into(),
        };

        let err = fx
            .player
            .play_file(
                &binaries,
                Path::new("/nonexistent/audio.mp3"),
                2,
                fx.ws_tx.clone(),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VoiceError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_play_file_requires_a_ready_session() {
        let session = Arc::new(parking_lot::Mutex::new(VoiceSession::new(
            test_connection_info(),
        )));
        let udp: Shared<Option<UdpLink>> = Arc::new(tokio::sync::Mutex::new(None));
        let (event_tx, _events_rx) = tokio::sync::mpsc::unbounded_channel();
        let (ws_tx, _ws_rx) = tokio::sync::mpsc::unbounded_channel();
        let mut player = Player::new(session, udp, event_tx);

        let binaries = Binaries {
            encoder: "/bin/sh".into(),
            transcoder: "/bin/sh".into(),
        };
        let err = player
            .play_file(
                &binaries,
                Path::new("/bin/sh"), // exists, so the readiness check is what fails
                2,
                ws_tx,
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VoiceError::NotReady));
    }

    #[tokio::test]
    async fn test_play_raw_stream_is_always_unsupported() {
        let mut fx = ready_fixture().await;
        let err = fx.player.play_raw_stream().await.unwrap_err();
        assert!(matches!(err, VoiceError::UnsupportedOperation(_)));
    }

    #[tokio::test]
    async fn test_send_buffer_sends_one_packet_and_advances() {
        let mut fx = ready_fixture().await;

        fx.player.send_buffer(&[1, 2, 3]).await.unwrap();
        fx.player.send_buffer(&[4]).await.unwrap();

        assert_eq!(fx.player.builder().sequence(), 2);
        assert_eq!(fx.player.builder().timestamp(), 1920);

        let first = recv_packet(&fx.receiver).await;
        assert_eq!(&first[12..], &[1, 2, 3]);
        let second = recv_packet(&fx.receiver).await;
        assert_eq!(&second[12..], &[4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_udp_failure_goes_to_the_event_channel() {
        let mut fx = ready_fixture().await;
        // Drop the link: send_frame now fails, but the pump result must not.
        *fx.player.udp.lock().await = None;

        let mut source = frames(&[&[0xAA]]);
        let outcome = fx
            .player
            .run_stream(&mut source, &fx.ws_tx, &CancellationToken::new())
            .await;
        assert!(matches!(outcome, PumpOutcome::Completed(1)));

        let event = fx.events_rx.try_recv().unwrap();
        assert!(matches!(event, VoiceEvent::TransportError(_)));
    }
}
