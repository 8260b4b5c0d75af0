//! Wire-level websocket frame codec.
//!
//! [`ws::Generator`] turns frames into bytes and [`ws::Parser`] turns bytes back into
//! frames, both driven by a per-connection [`ws::Policy`]. Output buffers can be
//! checked out from a shared [`buffer::BufferPool`].

pub mod buffer;
mod util;
pub mod ws;
