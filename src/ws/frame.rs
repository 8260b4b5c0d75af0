use std::fmt::{Debug, Formatter};

use crate::ws::OpCode;

/// One websocket frame.
///
/// A frame is assembled by value and validated once, when it reaches the
/// [`Generator`](crate::ws::Generator). Nothing stops a caller from assembling a frame
/// that violates the protocol; strict generation rejects it, lax generation puts it on
/// the wire as is.
///
/// ```
/// use wsframe::ws::{Frame, OpCode};
///
/// let frame = Frame::new(OpCode::Text).with_payload("Hi").with_rsv1(true);
/// assert!(frame.fin());
/// assert!(frame.rsv1());
/// assert_eq!(b"Hi", frame.payload());
/// ```
#[derive(Clone, Eq, PartialEq)]
pub struct Frame {
    fin: bool,
    rsv1: bool,
    rsv2: bool,
    rsv3: bool,
    op_code: OpCode,
    masked: bool,
    mask: Option<[u8; 4]>,
    payload: Vec<u8>,
}

impl Frame {
    /// Creates a final, unmasked frame with an empty payload.
    pub const fn new(op_code: OpCode) -> Frame {
        Self {
            fin: true,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            op_code,
            masked: false,
            mask: None,
            payload: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Frame {
        Self::new(OpCode::Text).with_payload(text.into())
    }

    pub fn binary(payload: impl Into<Vec<u8>>) -> Frame {
        Self::new(OpCode::Binary).with_payload(payload)
    }

    pub fn continuation(fin: bool, payload: impl Into<Vec<u8>>) -> Frame {
        Self::new(OpCode::Continuation).with_fin(fin).with_payload(payload)
    }

    pub fn ping(payload: impl Into<Vec<u8>>) -> Frame {
        Self::new(OpCode::Ping).with_payload(payload)
    }

    pub fn pong(payload: impl Into<Vec<u8>>) -> Frame {
        Self::new(OpCode::Pong).with_payload(payload)
    }

    pub fn with_fin(self, fin: bool) -> Frame {
        Self { fin, ..self }
    }

    pub fn with_rsv1(self, rsv1: bool) -> Frame {
        Self { rsv1, ..self }
    }

    pub fn with_rsv2(self, rsv2: bool) -> Frame {
        Self { rsv2, ..self }
    }

    pub fn with_rsv3(self, rsv3: bool) -> Frame {
        Self { rsv3, ..self }
    }

    pub fn with_op_code(self, op_code: OpCode) -> Frame {
        Self { op_code, ..self }
    }

    pub fn with_payload(self, payload: impl Into<Vec<u8>>) -> Frame {
        Self {
            payload: payload.into(),
            ..self
        }
    }

    /// Masks the frame with `key`. Sets both the mask bit and the key.
    pub fn with_mask(self, key: [u8; 4]) -> Frame {
        Self {
            masked: true,
            mask: Some(key),
            ..self
        }
    }

    /// Removes the mask bit and the key.
    pub fn without_mask(self) -> Frame {
        Self {
            masked: false,
            mask: None,
            ..self
        }
    }

    /// Sets the mask bit alone, leaving the key untouched. A masked frame without a
    /// key gets a fresh key from the generator in lax mode; strict mode rejects it,
    /// as it does a key without the mask bit.
    pub fn with_mask_bit(self, masked: bool) -> Frame {
        Self { masked, ..self }
    }

    #[inline]
    pub const fn fin(&self) -> bool {
        self.fin
    }

    #[inline]
    pub const fn rsv1(&self) -> bool {
        self.rsv1
    }

    #[inline]
    pub const fn rsv2(&self) -> bool {
        self.rsv2
    }

    #[inline]
    pub const fn rsv3(&self) -> bool {
        self.rsv3
    }

    #[inline]
    pub const fn op_code(&self) -> OpCode {
        self.op_code
    }

    #[inline]
    pub const fn is_masked(&self) -> bool {
        self.masked
    }

    #[inline]
    pub const fn mask(&self) -> Option<[u8; 4]> {
        self.mask
    }

    /// Payload in clear text.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Payload as UTF-8, if it is valid.
    pub fn payload_as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    #[inline]
    pub const fn is_control(&self) -> bool {
        self.op_code.is_control()
    }

    #[inline]
    pub const fn is_data(&self) -> bool {
        self.op_code.is_data()
    }

    /// Whether any of the extension bits is set.
    #[inline]
    pub const fn has_rsv(&self) -> bool {
        self.rsv1 || self.rsv2 || self.rsv3
    }

    pub(crate) fn from_parts(
        fin: bool,
        rsv: [bool; 3],
        op_code: OpCode,
        mask: Option<[u8; 4]>,
        payload: Vec<u8>,
    ) -> Frame {
        Self {
            fin,
            rsv1: rsv[0],
            rsv2: rsv[1],
            rsv3: rsv[2],
            op_code,
            masked: mask.is_some(),
            mask,
            payload,
        }
    }
}

impl Debug for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("op_code", &self.op_code)
            .field("fin", &self.fin)
            .field("rsv", &[self.rsv1, self.rsv2, self.rsv3])
            .field("masked", &self.masked)
            .field("mask", &self.mask)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
