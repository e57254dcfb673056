/// Voice gateway opcodes.
///
/// The full opcode byte space maps through this enum so that dispatch is a
/// type-checked match; opcodes this client does not act on land in the
/// explicit `Unknown` arm and are ignored at the dispatch site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceOp {
    /// Out: authenticate the session.
    Identify,
    /// Out: announce the discovered external address and transmit mode.
    SelectProtocol,
    /// In: server handshake data (udp port, heartbeat interval, ssrc).
    Hello,
    /// Out: periodic keep-alive.
    Heartbeat,
    /// In: handshake complete, carries the accepted transmit mode.
    Ready,
    /// Out: speaking-state transition.
    Speaking,
    /// Any opcode this client does not handle.
    Unknown(u8),
}

impl VoiceOp {
    pub fn from_u8(op: u8) -> Self {
        match op {
            0 => Self::Identify,
            1 => Self::SelectProtocol,
            2 => Self::Hello,
            3 => Self::Heartbeat,
            4 => Self::Ready,
            5 => Self::Speaking,
            other => Self::Unknown(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Identify => 0,
            Self::SelectProtocol => 1,
            Self::Hello => 2,
            Self::Heartbeat => 3,
            Self::Ready => 4,
            Self::Speaking => 5,
            Self::Unknown(other) => other,
        }
    }
}
