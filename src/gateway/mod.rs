pub mod constants;
pub mod opcodes;
pub mod rtp;
pub mod session;
pub mod udp_link;

pub use rtp::{RtpPacketBuilder, TransmitMode};
pub use session::VoiceGateway;
pub use udp_link::UdpLink;
