use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smallvec::SmallVec;

use crate::buffer::{BufferPool, PooledBuffer};
use crate::ws::mask::apply_mask;
use crate::ws::protocol::{self, MAX_CONTROL_PAYLOAD};
use crate::ws::{Error, Frame, Policy};

/// Worst case header size: two base bytes, eight bytes of extended length and the mask
/// key. An output buffer of `payload_len + OVERHEAD` always fits a whole frame.
pub const OVERHEAD: usize = 2 + 8 + 4;

type Header = SmallVec<[u8; OVERHEAD]>;

/// Serializes frames into bytes.
///
/// The policy decides the validation mode. Strict generation refuses frames that break
/// the framing rules; lax generation writes whatever the frame holds.
///
/// ```
/// use wsframe::ws::{Frame, Generator, OpCode, Policy, OVERHEAD};
///
/// let mut generator = Generator::new(Policy::server());
/// let frame = Frame::new(OpCode::Ping);
/// let mut buf = vec![0u8; frame.payload_len() + OVERHEAD];
/// let len = generator.generate_whole_frame(&frame, &mut buf).unwrap();
/// assert_eq!(&[0x89, 0x00], &buf[..len]);
/// ```
#[derive(Debug)]
pub struct Generator {
    policy: Policy,
    rng: StdRng,
}

impl Generator {
    pub fn new(policy: Policy) -> Generator {
        Self {
            policy,
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Uses a deterministic source for generated mask keys.
    pub fn with_seed(self, seed: u64) -> Generator {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ..self
        }
    }

    #[inline]
    pub const fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Draws a fresh mask key.
    pub fn random_mask(&mut self) -> [u8; 4] {
        self.rng.random()
    }

    /// Masks `frame` with a fresh key when the policy expects masked output and the
    /// frame is not masked yet.
    pub fn apply_role_mask(&mut self, frame: Frame) -> Frame {
        if self.policy.expects_masked_output() && !frame.is_masked() {
            let key = self.random_mask();
            return frame.with_mask(key);
        }
        frame
    }

    /// Writes the whole frame into `buf` and returns the number of bytes written.
    pub fn generate_whole_frame(&mut self, frame: &Frame, buf: &mut [u8]) -> Result<usize, Error> {
        let mut writer = self.generate_incremental(frame)?;
        let required = writer.remaining();
        if buf.len() < required {
            return Err(Error::BufferOverflow {
                required,
                available: buf.len(),
            });
        }
        writer.write_to(buf)
    }

    /// Prepares the frame to be written over one or more buffers, for payloads larger
    /// than the output buffer. The frame is validated here.
    pub fn generate_incremental<'a>(&mut self, frame: &'a Frame) -> Result<FrameWriter<'a>, Error> {
        if self.policy.is_strict() {
            self.validate(frame)?;
        }
        let mask = match (frame.is_masked(), frame.mask()) {
            (true, Some(key)) => Some(key),
            (true, None) => Some(self.random_mask()),
            (false, _) => None,
        };
        let header = encode_header(frame, mask);
        Ok(FrameWriter {
            header,
            header_written: 0,
            payload: frame.payload(),
            payload_written: 0,
            mask,
        })
    }

    /// Writes the frame into a buffer of `payload_len + OVERHEAD` bytes taken from
    /// `pool`. The buffer returns to the pool when the result is dropped, or right away
    /// if generation fails.
    pub fn generate_pooled<'p, P: BufferPool>(
        &mut self,
        frame: &Frame,
        pool: &'p P,
    ) -> Result<PooledBuffer<'p, P>, Error> {
        let mut buffer = pool.acquire_scoped(frame.payload_len() + OVERHEAD);
        let len = self.generate_whole_frame(frame, &mut buffer)?;
        buffer.truncate(len);
        Ok(buffer)
    }

    fn validate(&self, frame: &Frame) -> Result<(), Error> {
        let op_code = frame.op_code();
        if op_code.is_reserved() {
            return Err(Error::Validation("reserved op_code"));
        }
        if op_code.is_control() {
            if !frame.fin() {
                return Err(Error::Validation("fragmented control frame"));
            }
            if frame.payload_len() > MAX_CONTROL_PAYLOAD {
                return Err(Error::Validation("control frame payload exceeds 125 bytes"));
            }
        }
        match (frame.is_masked(), frame.mask().is_some()) {
            (true, false) => return Err(Error::Validation("mask bit set without a mask key")),
            (false, true) => return Err(Error::Validation("mask key present without the mask bit")),
            _ => {}
        }
        match (self.policy.expects_masked_output(), frame.is_masked()) {
            (true, false) => Err(Error::Validation("client frames must be masked")),
            (false, true) => Err(Error::Validation("server frames must not be masked")),
            _ => Ok(()),
        }
    }
}

fn encode_header(frame: &Frame, mask: Option<[u8; 4]>) -> Header {
    let mut header = Header::new();

    let mut b = frame.op_code().as_u8();
    if frame.fin() {
        b |= protocol::FIN_MASK;
    }
    if frame.rsv1() {
        b |= protocol::RSV1_MASK;
    }
    if frame.rsv2() {
        b |= protocol::RSV2_MASK;
    }
    if frame.rsv3() {
        b |= protocol::RSV3_MASK;
    }
    header.push(b);

    let mut payload_length = 0u8;
    if mask.is_some() {
        payload_length |= protocol::MASK_MASK;
    }
    let len = frame.payload_len();
    if len <= MAX_CONTROL_PAYLOAD {
        header.push(payload_length | len as u8);
    } else if len <= u16::MAX as usize {
        header.push(payload_length | protocol::EXTENDED_PAYLOAD_LENGTH_2);
        header.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        header.push(payload_length | protocol::EXTENDED_PAYLOAD_LENGTH_8);
        header.extend_from_slice(&(len as u64).to_be_bytes());
    }

    if let Some(key) = mask {
        header.extend_from_slice(&key);
    }

    if (frame.is_control() && (!frame.fin() || len > MAX_CONTROL_PAYLOAD)) || frame.op_code().is_reserved() {
        trace!("encoding invalid {} frame as is: fin={} len={}", frame.op_code(), frame.fin(), len);
    }

    header
}

/// Writes one frame over as many output buffers as it takes.
#[derive(Debug)]
pub struct FrameWriter<'a> {
    header: Header,
    header_written: usize,
    payload: &'a [u8],
    payload_written: usize,
    mask: Option<[u8; 4]>,
}

impl FrameWriter<'_> {
    /// Bytes of header and payload still to be written.
    #[inline]
    pub fn remaining(&self) -> usize {
        (self.header.len() - self.header_written) + (self.payload.len() - self.payload_written)
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    #[inline]
    pub fn header_len(&self) -> usize {
        self.header.len()
    }

    /// Mask key put on the wire, if any.
    #[inline]
    pub const fn mask(&self) -> Option<[u8; 4]> {
        self.mask
    }

    /// Writes as much as fits into `buf` and returns the number of bytes written. The
    /// header is never split: a buffer that cannot hold the rest of it is an error.
    pub fn write_to(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut written = 0;

        let header = &self.header[self.header_written..];
        if !header.is_empty() {
            if buf.len() < header.len() {
                return Err(Error::BufferOverflow {
                    required: header.len(),
                    available: buf.len(),
                });
            }
            buf[..header.len()].copy_from_slice(header);
            written += header.len();
            self.header_written = self.header.len();
        }

        let count = (buf.len() - written).min(self.payload.len() - self.payload_written);
        let chunk = &mut buf[written..written + count];
        chunk.copy_from_slice(&self.payload[self.payload_written..self.payload_written + count]);
        if let Some(key) = self.mask {
            apply_mask(key, chunk, self.payload_written);
        }
        self.payload_written += count;
        written += count;

        Ok(written)
    }
}
