//! Websocket frame codec.
//!
//! ## Examples
//!
//! Generate a close frame from a server.
//! ```
//! use wsframe::ws::{CloseInfo, Generator, Policy, StatusCode, OVERHEAD};
//!
//! let mut generator = Generator::new(Policy::server());
//! let frame = CloseInfo::new(StatusCode::NORMAL).as_frame().unwrap();
//! let mut buf = [0u8; 2 + OVERHEAD];
//! let len = generator.generate_whole_frame(&frame, &mut buf).unwrap();
//! assert_eq!(&[0x88, 0x02, 0x03, 0xE8], &buf[..len]);
//! ```
//!
//! Manufacture a frame that breaks the protocol, for robustness testing.
//! ```
//! use wsframe::ws::{Frame, Generator, OpCode, Policy, OVERHEAD};
//!
//! let mut generator = Generator::new(Policy::server().lax());
//! let frame = Frame::new(OpCode::Ping).with_fin(false);
//! let mut buf = [0u8; OVERHEAD];
//! let len = generator.generate_whole_frame(&frame, &mut buf).unwrap();
//! assert_eq!(&[0x09, 0x00], &buf[..len]);
//! ```
//!
//! Parse frames as bytes arrive from the transport.
//! ```
//! use wsframe::ws::{CloseInfo, OpCode, Parser, Policy};
//!
//! fn on_bytes(parser: &mut Parser, chunk: &[u8]) -> Result<(), wsframe::ws::Error> {
//!     for frame in parser.batch_iter(chunk) {
//!         let frame = frame?;
//!         match frame.op_code() {
//!             OpCode::Text => println!("({}) {}", frame.fin(), String::from_utf8_lossy(frame.payload())),
//!             OpCode::Close => println!("closed: {}", CloseInfo::from_frame(&frame)?.status_code()),
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//!
//! let mut parser = Parser::new(Policy::client());
//! on_bytes(&mut parser, &[0x81, 0x02, 0x48]).unwrap();
//! on_bytes(&mut parser, &[0x69]).unwrap();
//! ```

// re-export
pub use crate::ws::close::{CloseInfo, MAX_REASON_LENGTH};
pub use crate::ws::error::Error;
pub use crate::ws::frame::Frame;
pub use crate::ws::generator::{FrameWriter, Generator, OVERHEAD};
pub use crate::ws::mask::apply_mask;
pub use crate::ws::parser::{BatchIter, Parser};
pub use crate::ws::policy::{DEFAULT_MAX_SIZE, Policy, Role, Validation};
pub use crate::ws::protocol::{MAX_CONTROL_PAYLOAD, OpCode, StatusCode};

mod close;
mod error;
mod frame;
mod generator;
mod mask;
mod parser;
mod policy;
pub mod protocol;
