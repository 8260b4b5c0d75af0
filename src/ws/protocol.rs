use std::fmt::{Display, Formatter};

pub const FIN_MASK: u8 = 0b1000_0000;
pub const RSV1_MASK: u8 = 0b0100_0000;
pub const RSV2_MASK: u8 = 0b0010_0000;
pub const RSV3_MASK: u8 = 0b0001_0000;
pub const OP_CODE_MASK: u8 = 0b0000_1111;
pub const MASK_MASK: u8 = 0b1000_0000;
pub const PAYLOAD_LENGTH_MASK: u8 = 0b0111_1111;

/// Length code announcing a 16-bit extended payload length.
pub const EXTENDED_PAYLOAD_LENGTH_2: u8 = 126;
/// Length code announcing a 64-bit extended payload length.
pub const EXTENDED_PAYLOAD_LENGTH_8: u8 = 127;

/// Largest payload a control frame may carry.
pub const MAX_CONTROL_PAYLOAD: usize = 125;

pub mod op {
    pub const CONTINUATION_FRAME: u8 = 0x0;
    pub const TEXT_FRAME: u8 = 0x1;
    pub const BINARY_FRAME: u8 = 0x2;
    pub const CONNECTION_CLOSE: u8 = 0x8;
    pub const PING: u8 = 0x9;
    pub const PONG: u8 = 0xA;
}

/// Frame type carried in the low nibble of the first header byte.
///
/// Values `0x3..=0x7` and `0xB..=0xF` are kept as [`OpCode::Reserved`] so that lax
/// generation can put them on the wire and lax parsing can surface them. Strict mode
/// rejects them on both sides.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    Reserved(u8),
}

impl OpCode {
    /// Decodes the low nibble of `byte`.
    #[inline]
    pub const fn from_nibble(byte: u8) -> OpCode {
        match byte & OP_CODE_MASK {
            op::CONTINUATION_FRAME => OpCode::Continuation,
            op::TEXT_FRAME => OpCode::Text,
            op::BINARY_FRAME => OpCode::Binary,
            op::CONNECTION_CLOSE => OpCode::Close,
            op::PING => OpCode::Ping,
            op::PONG => OpCode::Pong,
            other => OpCode::Reserved(other),
        }
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        match self {
            OpCode::Continuation => op::CONTINUATION_FRAME,
            OpCode::Text => op::TEXT_FRAME,
            OpCode::Binary => op::BINARY_FRAME,
            OpCode::Close => op::CONNECTION_CLOSE,
            OpCode::Ping => op::PING,
            OpCode::Pong => op::PONG,
            OpCode::Reserved(value) => value & OP_CODE_MASK,
        }
    }

    /// Close, ping, pong and the reserved control range `0xB..=0xF`.
    #[inline]
    pub const fn is_control(self) -> bool {
        self.as_u8() & 0x08 != 0
    }

    /// Text, binary and continuation.
    #[inline]
    pub const fn is_data(self) -> bool {
        matches!(self, OpCode::Continuation | OpCode::Text | OpCode::Binary)
    }

    #[inline]
    pub const fn is_reserved(self) -> bool {
        matches!(self, OpCode::Reserved(_))
    }
}

impl From<u8> for OpCode {
    fn from(value: u8) -> Self {
        OpCode::from_nibble(value)
    }
}

impl From<OpCode> for u8 {
    fn from(value: OpCode) -> Self {
        value.as_u8()
    }
}

impl Display for OpCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OpCode::Continuation => f.write_str("CONTINUATION"),
            OpCode::Text => f.write_str("TEXT"),
            OpCode::Binary => f.write_str("BINARY"),
            OpCode::Close => f.write_str("CLOSE"),
            OpCode::Ping => f.write_str("PING"),
            OpCode::Pong => f.write_str("PONG"),
            OpCode::Reserved(value) => write!(f, "RESERVED({:#x})", value & OP_CODE_MASK),
        }
    }
}

/// Close status code as carried in the first two bytes of a close frame payload.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const NORMAL: StatusCode = StatusCode(1000);
    pub const SHUTDOWN: StatusCode = StatusCode(1001);
    pub const PROTOCOL: StatusCode = StatusCode(1002);
    pub const BAD_DATA: StatusCode = StatusCode(1003);
    /// Reserved, never sent.
    pub const UNDEFINED: StatusCode = StatusCode(1004);
    /// Reported locally when a close frame carried no status. Never sent.
    pub const NO_CODE: StatusCode = StatusCode(1005);
    /// Reported locally when the transport dropped without a close frame. Never sent.
    pub const NO_CLOSE: StatusCode = StatusCode(1006);
    pub const BAD_PAYLOAD: StatusCode = StatusCode(1007);
    pub const POLICY_VIOLATION: StatusCode = StatusCode(1008);
    pub const MESSAGE_TOO_LARGE: StatusCode = StatusCode(1009);
    pub const REQUIRED_EXTENSION: StatusCode = StatusCode(1010);
    pub const SERVER_ERROR: StatusCode = StatusCode(1011);

    #[inline]
    pub const fn new(code: u16) -> StatusCode {
        StatusCode(code)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Whether the code may appear in a close frame on the wire: the assigned codes
    /// `1000..=1003`, `1007..=1011` and the registered range `3000..=4999`.
    #[inline]
    pub const fn is_valid_on_wire(self) -> bool {
        matches!(self.0, 1000..=1003 | 1007..=1011 | 3000..=4999)
    }

    /// Codes that exist only to report a condition locally.
    #[inline]
    pub const fn is_reserved(self) -> bool {
        matches!(self.0, 1004..=1006)
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> Self {
        code.0
    }
}

impl Display for StatusCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
