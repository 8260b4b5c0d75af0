use smallstr::SmallString;

use crate::ws::protocol::MAX_CONTROL_PAYLOAD;
use crate::ws::{Error, Frame, OpCode, StatusCode};

/// Longest reason that fits next to the status code in a close frame.
pub const MAX_REASON_LENGTH: usize = MAX_CONTROL_PAYLOAD - 2;

type Reason = SmallString<[u8; 32]>;

/// Status code and optional reason carried by a close frame.
///
/// ```
/// use wsframe::ws::{CloseInfo, StatusCode};
///
/// let frame = CloseInfo::new(StatusCode::NORMAL).with_reason("bye").as_frame().unwrap();
/// let close = CloseInfo::from_frame(&frame).unwrap();
/// assert_eq!(StatusCode::NORMAL, close.status_code());
/// assert_eq!(Some("bye"), close.reason());
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CloseInfo {
    status_code: StatusCode,
    reason: Option<Reason>,
}

impl CloseInfo {
    pub fn new(status_code: impl Into<StatusCode>) -> CloseInfo {
        Self {
            status_code: status_code.into(),
            reason: None,
        }
    }

    pub fn with_reason(self, reason: &str) -> CloseInfo {
        Self {
            reason: Some(Reason::from_str(reason)),
            ..self
        }
    }

    #[inline]
    pub const fn status_code(&self) -> StatusCode {
        self.status_code
    }

    #[inline]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Builds the close frame. Fails if the status code may not be sent or the payload
    /// does not fit in a control frame.
    pub fn as_frame(&self) -> Result<Frame, Error> {
        if !self.status_code.is_valid_on_wire() {
            return Err(Error::Validation("status code cannot be sent in a close frame"));
        }
        let reason = self.reason().unwrap_or_default().as_bytes();
        if reason.len() > MAX_REASON_LENGTH {
            return Err(Error::Validation("close reason does not fit in a control frame"));
        }
        let mut payload = Vec::with_capacity(2 + reason.len());
        payload.extend_from_slice(&self.status_code.as_u16().to_be_bytes());
        payload.extend_from_slice(reason);
        Ok(Frame::new(OpCode::Close).with_payload(payload))
    }

    /// Decodes a close frame payload. An empty payload yields [`StatusCode::NO_CODE`].
    pub fn from_payload(payload: &[u8]) -> Result<CloseInfo, Error> {
        match payload.len() {
            0 => return Ok(CloseInfo::new(StatusCode::NO_CODE)),
            1 => return Err(Error::Protocol("close payload of a single byte")),
            len if len > MAX_CONTROL_PAYLOAD => return Err(Error::Protocol("close payload too long")),
            _ => {}
        }
        let (status_code, reason) = payload.split_at(size_of::<u16>());
        let status_code = StatusCode::new(u16::from_be_bytes([status_code[0], status_code[1]]));
        if !status_code.is_valid_on_wire() {
            return Err(Error::Protocol("invalid close status code"));
        }
        let reason = match reason {
            [] => None,
            reason => {
                let reason =
                    std::str::from_utf8(reason).map_err(|_| Error::BadPayload("close reason is not valid UTF-8"))?;
                Some(Reason::from_str(reason))
            }
        };
        Ok(Self { status_code, reason })
    }

    pub fn from_frame(frame: &Frame) -> Result<CloseInfo, Error> {
        if frame.op_code() != OpCode::Close {
            return Err(Error::Validation("not a close frame"));
        }
        Self::from_payload(frame.payload())
    }
}

impl From<StatusCode> for CloseInfo {
    fn from(status_code: StatusCode) -> Self {
        CloseInfo::new(status_code)
    }
}
