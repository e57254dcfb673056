/// Voice gateway version to use in the WebSocket URL.
pub const VOICE_GATEWAY_VERSION: u8 = 3;

/// Audio sample rate (48 kHz) used by the voice protocol.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// First byte of every RTP header (version 2, no padding/extension/CSRC).
pub const RTP_VERSION_BYTE: u8 = 0x80;

/// RTP payload type for Opus voice data.
pub const RTP_OPUS_PAYLOAD_TYPE: u8 = 0x78;

/// Fixed RTP header length in bytes.
pub const RTP_HEADER_LEN: usize = 12;

/// Timestamp increment per frame: one 20 ms frame at 48 kHz.
pub const RTP_TIMESTAMP_STEP: u32 = 960;

/// The sequence counter resets to 0 when advancing would reach this value,
/// giving a [0, 65534] cycle rather than the natural 16-bit one. The remote
/// end has always been fed this cycle; keep it.
pub const SEQUENCE_ROLLOVER: u16 = u16::MAX;

/// Same rollover rule for the 32-bit timestamp counter.
pub const TIMESTAMP_ROLLOVER: u32 = u32::MAX;

/// Duration of one Opus frame in milliseconds.
pub const FRAME_DURATION_MS: u64 = 20;

/// Size of the IP discovery probe datagram.
pub const DISCOVERY_PACKET_LEN: usize = 70;

/// Byte offset of the big-endian ssrc inside the discovery probe.
pub const DISCOVERY_SSRC_OFFSET: usize = 3;

/// Byte offset where the NUL-terminated ASCII IP starts in the reply.
pub const DISCOVERY_IP_OFFSET: usize = 4;

/// Delay (ms) between opening the UDP socket and sending the probe.
pub const DISCOVERY_DELAY_MS: u64 = 100;

/// Capacity of the reusable outgoing packet buffer.
pub const UDP_PACKET_BUF_CAPACITY: usize = 1460;
