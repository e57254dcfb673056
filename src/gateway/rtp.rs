use bytes::BytesMut;

use crate::gateway::constants::{
    RTP_HEADER_LEN, RTP_OPUS_PAYLOAD_TYPE, RTP_TIMESTAMP_STEP, RTP_VERSION_BYTE,
    SEQUENCE_ROLLOVER, TIMESTAMP_ROLLOVER, UDP_PACKET_BUF_CAPACITY,
};

/// 16-bit RTP sequence counter.
///
/// Advancing resets to 0 when the next value would reach 65535, so the cycle
/// is [0, 65534] — one value short of true 16-bit wraparound. The protocol
/// peer has always seen this cycle; it is load-bearing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceCounter(u16);

impl SequenceCounter {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn get(self) -> u16 {
        self.0
    }

    pub fn advance(&mut self) {
        self.0 = if self.0 + 1 < SEQUENCE_ROLLOVER {
            self.0 + 1
        } else {
            0
        };
    }
}

/// 32-bit RTP timestamp counter, stepping one 20 ms frame (960 samples at
/// 48 kHz) per packet. Same reset-instead-of-wrap rule as the sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampCounter(u32);

impl TimestampCounter {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn advance(&mut self) {
        self.0 = match self.0.checked_add(RTP_TIMESTAMP_STEP) {
            Some(next) if next < TIMESTAMP_ROLLOVER => next,
            _ => 0,
        };
    }
}

/// Payload transmit mode — exactly one is active per session.
///
/// The mode owns the payload transform, so packet building and pacing stay
/// untouched when a new (e.g. encrypted) variant is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitMode {
    /// Payload bytes go on the wire verbatim.
    Plain,
}

impl TransmitMode {
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Plain => "plain",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "plain" => Some(Self::Plain),
            _ => None,
        }
    }

    /// Appends the transformed payload to `out`. The header is passed in for
    /// the benefit of future modes that bind it into the transform.
    fn seal(self, _header: &[u8; RTP_HEADER_LEN], payload: &[u8], out: &mut BytesMut) {
        match self {
            Self::Plain => out.extend_from_slice(payload),
        }
    }
}

/// Builds outgoing media packets, owning the sequence/timestamp pair and a
/// reusable packet buffer (allocated once, cleared per frame).
pub struct RtpPacketBuilder {
    sequence: SequenceCounter,
    timestamp: TimestampCounter,
    packet_buf: BytesMut,
}

impl Default for RtpPacketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RtpPacketBuilder {
    pub fn new() -> Self {
        Self {
            sequence: SequenceCounter::new(),
            timestamp: TimestampCounter::new(),
            packet_buf: BytesMut::with_capacity(UDP_PACKET_BUF_CAPACITY),
        }
    }

    /// Composes the 12-byte RTP header plus the sealed payload and returns
    /// the wire bytes. Counters are not touched; call [`advance`] after a
    /// successful send.
    ///
    /// [`advance`]: Self::advance
    pub fn build(&mut self, ssrc: u32, mode: TransmitMode, payload: &[u8]) -> &[u8] {
        let mut header = [0u8; RTP_HEADER_LEN];
        header[0] = RTP_VERSION_BYTE;
        header[1] = RTP_OPUS_PAYLOAD_TYPE;
        header[2..4].copy_from_slice(&self.sequence.get().to_be_bytes());
        header[4..8].copy_from_slice(&self.timestamp.get().to_be_bytes());
        header[8..12].copy_from_slice(&ssrc.to_be_bytes());

        self.packet_buf.clear();
        self.packet_buf.extend_from_slice(&header);
        mode.seal(&header, payload, &mut self.packet_buf);

        &self.packet_buf
    }

    /// Steps both counters per their rollover rules.
    pub fn advance(&mut self) {
        self.sequence.advance();
        self.timestamp.advance();
    }

    pub fn sequence(&self) -> u16 {
        self.sequence.get()
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_advances_by_one() {
        let mut seq = SequenceCounter::new();
        assert_eq!(seq.get(), 0);
        seq.advance();
        assert_eq!(seq.get(), 1);
        seq.advance();
        assert_eq!(seq.get(), 2);
    }

    #[test]
    fn test_sequence_resets_one_short_of_u16_max() {
        let mut seq = SequenceCounter(65533);
        seq.advance();
        assert_eq!(seq.get(), 65534);
        // 65534 + 1 would reach 65535 — reset, never emit 65535.
        seq.advance();
        assert_eq!(seq.get(), 0);
    }

    #[test]
    fn test_timestamp_advances_by_frame_step() {
        let mut ts = TimestampCounter::new();
        ts.advance();
        assert_eq!(ts.get(), 960);
        ts.advance();
        assert_eq!(ts.get(), 1920);
    }

    #[test]
    fn test_timestamp_resets_when_next_would_reach_u32_max() {
        // 4294966335 + 960 == 4294967295 exactly — reset.
        let mut ts = TimestampCounter(4_294_966_335);
        ts.advance();
        assert_eq!(ts.get(), 0);

        // One step below still advances normally.
        let mut ts = TimestampCounter(4_294_965_375);
        ts.advance();
        assert_eq!(ts.get(), 4_294_966_335);

        // Values whose next step would overflow u32 also reset.
        let mut ts = TimestampCounter(u32::MAX - 100);
        ts.advance();
        assert_eq!(ts.get(), 0);
    }

    #[test]
    fn test_packet_layout_matches_wire_format() {
        let mut builder = RtpPacketBuilder::new();
        // One advance puts the counters at sequence=1, timestamp=960.
        builder.advance();

        let packet = builder
            .build(1000, TransmitMode::Plain, &[0xAA, 0xBB])
            .to_vec();

        assert_eq!(
            packet,
            vec![
                0x80, 0x78, // version/flags, payload type
                0x00, 0x01, // sequence 1, big-endian
                0x00, 0x00, 0x03, 0xC0, // timestamp 960, big-endian
                0x00, 0x00, 0x03, 0xE8, // ssrc 1000, big-endian
                0xAA, 0xBB, // payload, verbatim
            ]
        );
    }

    #[test]
    fn test_builder_reuses_buffer_across_frames() {
        let mut builder = RtpPacketBuilder::new();
        let first = builder.build(1, TransmitMode::Plain, &[1, 2, 3, 4]).to_vec();
        builder.advance();
        let second = builder.build(1, TransmitMode::Plain, &[9]).to_vec();

        assert_eq!(first.len(), RTP_HEADER_LEN + 4);
        assert_eq!(second.len(), RTP_HEADER_LEN + 1);
        assert_eq!(second[RTP_HEADER_LEN], 9);
    }

    #[test]
    fn test_transmit_mode_wire_names() {
        assert_eq!(TransmitMode::Plain.wire_name(), "plain");
        assert_eq!(TransmitMode::from_wire("plain"), Some(TransmitMode::Plain));
        assert_eq!(TransmitMode::from_wire("aead_aes256_gcm"), None);
    }
}
