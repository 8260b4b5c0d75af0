use std::io;
use std::io::ErrorKind::{InvalidData, InvalidInput, Other};

use thiserror::Error;

use crate::ws::StatusCode;

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    #[error("invalid frame: {0}")]
    Validation(&'static str),
    #[error("websocket protocol error: {0}")]
    Protocol(&'static str),
    #[error("invalid payload: {0}")]
    BadPayload(&'static str),
    #[error("frame payload of {size} bytes exceeds the limit of {limit} bytes")]
    FrameTooLarge { size: u64, limit: u64 },
    #[error("message of {size} bytes exceeds the limit of {limit} bytes")]
    MessageTooLarge { size: u64, limit: u64 },
    #[error("buffer too small: {required} bytes required, {available} available")]
    BufferOverflow { required: usize, available: usize },
    #[error("the parser has failed and can be dropped")]
    Closed,
}

impl Error {
    /// Status the connection should be closed with after this error, if any. Errors
    /// raised while generating never reach the peer.
    pub const fn close_status(&self) -> Option<StatusCode> {
        match self {
            Error::Protocol(_) => Some(StatusCode::PROTOCOL),
            Error::BadPayload(_) => Some(StatusCode::BAD_PAYLOAD),
            Error::FrameTooLarge { .. } | Error::MessageTooLarge { .. } => Some(StatusCode::MESSAGE_TOO_LARGE),
            Error::Validation(_) | Error::BufferOverflow { .. } | Error::Closed => None,
        }
    }
}

impl From<Error> for io::Error {
    fn from(value: Error) -> Self {
        let kind = match value {
            Error::Validation(_) | Error::BufferOverflow { .. } => InvalidInput,
            Error::Closed => Other,
            _ => InvalidData,
        };
        io::Error::new(kind, value)
    }
}
