use log::{debug, trace};
use smallvec::SmallVec;

use crate::buffer::{BufferPool, HeapBufferPool};
use crate::util::Utf8Validator;
use crate::ws::mask::apply_mask;
use crate::ws::protocol::{self, MAX_CONTROL_PAYLOAD};
use crate::ws::{CloseInfo, Error, Frame, OpCode, Policy};

/// Upper bound of the payload buffer reserved up front; larger payloads grow as they arrive.
const MAX_PREALLOCATION: usize = 65536;

/// Resumable frame parser.
///
/// Bytes are fed in chunks of any size. The parser consumes as much of each chunk as it
/// can and keeps every partially read header field and payload until the next chunk
/// arrives, so running out of bytes is never an error.
///
/// Payload bytes accumulate in a buffer acquired from the parser's [`BufferPool`] when
/// the frame header is complete. The buffer goes back to the pool when the frame is
/// emitted, when parsing fails, on [`Parser::reset`] and when the parser is dropped.
///
/// ```
/// use wsframe::ws::{OpCode, Parser, Policy};
///
/// let mut parser = Parser::new(Policy::client());
/// let mut input: &[u8] = &[0x89];
/// assert!(parser.parse(&mut input).unwrap().is_none());
///
/// let mut input: &[u8] = &[0x00];
/// let frame = parser.parse(&mut input).unwrap().unwrap();
/// assert_eq!(OpCode::Ping, frame.op_code());
/// ```
#[derive(Debug)]
pub struct Parser<P: BufferPool = HeapBufferPool> {
    policy: Policy,
    pool: P,
    decode_state: DecodeState,
    fin: bool,
    rsv: [bool; 3],
    op_code: OpCode,
    masked: bool,
    mask: [u8; 4],
    payload_length: usize,
    scratch: SmallVec<[u8; 8]>,
    payload: Option<Vec<u8>>,
    message: Option<Message>,
    text_frame: bool,
    utf8: Utf8Validator,
    failed: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum DecodeState {
    ReadingHeader,
    ReadingPayloadLength,
    ReadingExtendedPayloadLength2,
    ReadingExtendedPayloadLength8,
    ReadingMaskingKey,
    ReadingPayload,
}

/// Fragmented message still waiting for its final frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Message {
    op_code: OpCode,
    size: u64,
}

impl Parser {
    pub fn new(policy: Policy) -> Parser {
        Parser::with_pool(policy, HeapBufferPool)
    }
}

impl<P: BufferPool> Parser<P> {
    /// Parser that takes its payload buffers from `pool`.
    pub fn with_pool(policy: Policy, pool: P) -> Parser<P> {
        Self {
            policy,
            pool,
            decode_state: DecodeState::ReadingHeader,
            fin: false,
            rsv: [false; 3],
            op_code: OpCode::Continuation,
            masked: false,
            mask: [0; 4],
            payload_length: 0,
            scratch: SmallVec::new(),
            payload: None,
            message: None,
            text_frame: false,
            utf8: Utf8Validator::default(),
            failed: false,
        }
    }

    #[inline]
    pub const fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Whether the next byte starts a new frame.
    #[inline]
    pub fn is_at_frame_boundary(&self) -> bool {
        self.decode_state == DecodeState::ReadingHeader
    }

    /// Whether a fragmented message has been opened and not finished yet.
    #[inline]
    pub const fn is_message_open(&self) -> bool {
        self.message.is_some()
    }

    /// Discards all state, including a failure, as if the parser was just created.
    pub fn reset(&mut self) {
        self.release_payload();
        self.decode_state = DecodeState::ReadingHeader;
        self.fin = false;
        self.rsv = [false; 3];
        self.op_code = OpCode::Continuation;
        self.masked = false;
        self.mask = [0; 4];
        self.payload_length = 0;
        self.scratch.clear();
        self.message = None;
        self.text_frame = false;
        self.utf8.reset();
        self.failed = false;
    }

    /// Consumes bytes from the front of `input` until a frame completes or the input
    /// runs out. Returns `Ok(None)` when more bytes are needed; `input` is then empty.
    ///
    /// After an error the parser is unusable and every further call fails with
    /// [`Error::Closed`].
    #[inline]
    pub fn parse(&mut self, input: &mut &[u8]) -> Result<Option<Frame>, Error> {
        if self.failed {
            return Err(Error::Closed);
        }
        match self.decode_next(input) {
            Ok(frame) => Ok(frame),
            Err(err) => {
                debug!("rejecting websocket frame: {err}");
                self.release_payload();
                self.failed = true;
                Err(err)
            }
        }
    }

    /// Iterates over every frame completed by `chunk`.
    pub fn batch_iter<'a>(&'a mut self, chunk: &'a [u8]) -> BatchIter<'a, P> {
        BatchIter {
            parser: self,
            input: chunk,
            done: false,
        }
    }

    /// Collects every frame completed by `chunk`.
    pub fn parse_all(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, Error> {
        self.batch_iter(chunk).collect()
    }

    fn decode_next(&mut self, input: &mut &[u8]) -> Result<Option<Frame>, Error> {
        loop {
            match self.decode_state {
                DecodeState::ReadingHeader => {
                    let Some(b) = take_byte(input) else {
                        break;
                    };
                    self.fin = b & protocol::FIN_MASK != 0;
                    self.rsv = [
                        b & protocol::RSV1_MASK != 0,
                        b & protocol::RSV2_MASK != 0,
                        b & protocol::RSV3_MASK != 0,
                    ];
                    self.op_code = OpCode::from_nibble(b);
                    if self.policy.is_strict() {
                        self.validate_op_code()?;
                    }
                    self.decode_state = DecodeState::ReadingPayloadLength;
                }
                DecodeState::ReadingPayloadLength => {
                    let Some(b) = take_byte(input) else {
                        break;
                    };
                    self.masked = b & protocol::MASK_MASK != 0;
                    match b & protocol::PAYLOAD_LENGTH_MASK {
                        protocol::EXTENDED_PAYLOAD_LENGTH_2 => {
                            self.decode_state = DecodeState::ReadingExtendedPayloadLength2
                        }
                        protocol::EXTENDED_PAYLOAD_LENGTH_8 => {
                            self.decode_state = DecodeState::ReadingExtendedPayloadLength8
                        }
                        payload_length => self.on_payload_length(payload_length as u64)?,
                    }
                }
                DecodeState::ReadingExtendedPayloadLength2 => {
                    if !self.fill_scratch(input, 2) {
                        break;
                    }
                    let payload_length = u16::from_be_bytes([self.scratch[0], self.scratch[1]]);
                    self.scratch.clear();
                    self.on_payload_length(payload_length as u64)?;
                }
                DecodeState::ReadingExtendedPayloadLength8 => {
                    if !self.fill_scratch(input, 8) {
                        break;
                    }
                    let mut bytes = [0u8; 8];
                    bytes.copy_from_slice(&self.scratch);
                    self.scratch.clear();
                    let payload_length = u64::from_be_bytes(bytes);
                    if self.policy.is_strict() && payload_length >> 63 != 0 {
                        return Err(Error::Protocol("most significant bit of 64-bit payload length set"));
                    }
                    self.on_payload_length(payload_length)?;
                }
                DecodeState::ReadingMaskingKey => {
                    if !self.fill_scratch(input, 4) {
                        break;
                    }
                    self.mask.copy_from_slice(&self.scratch);
                    self.scratch.clear();
                    self.decode_state = DecodeState::ReadingPayload;
                }
                DecodeState::ReadingPayload => {
                    let payload = self.payload.get_or_insert_with(Vec::new);
                    let start = payload.len();
                    let count = (self.payload_length - start).min(input.len());
                    let (chunk, rest) = input.split_at(count);
                    payload.extend_from_slice(chunk);
                    *input = rest;
                    if self.masked {
                        // offset keeps the key position across chunks
                        apply_mask(self.mask, &mut payload[start..], start);
                    }
                    if payload.len() < self.payload_length {
                        break;
                    }
                    return self.complete_frame().map(Some);
                }
            }
        }

        // await for more data
        Ok(None)
    }

    fn validate_op_code(&self) -> Result<(), Error> {
        match self.op_code {
            OpCode::Reserved(_) => Err(Error::Protocol("reserved op_code")),
            op_code if op_code.is_control() && !self.fin => Err(Error::Protocol("fragmented control frame")),
            OpCode::Continuation if self.message.is_none() => {
                Err(Error::Protocol("continuation frame without a message to continue"))
            }
            OpCode::Text | OpCode::Binary if self.message.is_some() => {
                Err(Error::Protocol("new data frame before the fragmented message has finished"))
            }
            _ => Ok(()),
        }
    }

    fn on_payload_length(&mut self, payload_length: u64) -> Result<(), Error> {
        if self.policy.is_strict() && self.op_code.is_control() && payload_length > MAX_CONTROL_PAYLOAD as u64 {
            return Err(Error::Protocol("control frame payload exceeds 125 bytes"));
        }
        match (self.policy.expects_masked_input(), self.masked) {
            (true, false) => return Err(Error::Protocol("client frame is not masked")),
            (false, true) => return Err(Error::Protocol("masking bit set on the server frame")),
            _ => {}
        }
        self.policy.assert_valid_frame_payload_size(payload_length)?;
        self.on_message_fragment(payload_length)?;

        self.payload_length = usize::try_from(payload_length).map_err(|_| Error::FrameTooLarge {
            size: payload_length,
            limit: usize::MAX as u64,
        })?;
        self.release_payload();
        let mut payload = self.pool.acquire(self.payload_length.min(MAX_PREALLOCATION));
        payload.clear();
        self.payload = Some(payload);
        self.decode_state = if self.masked {
            DecodeState::ReadingMaskingKey
        } else {
            DecodeState::ReadingPayload
        };
        Ok(())
    }

    /// Tracks the message the current data frame belongs to and enforces its size limit.
    fn on_message_fragment(&mut self, payload_length: u64) -> Result<(), Error> {
        let message = match (self.op_code, self.message) {
            (OpCode::Text | OpCode::Binary, _) => {
                self.utf8.reset();
                Message {
                    op_code: self.op_code,
                    size: payload_length,
                }
            }
            (OpCode::Continuation, Some(message)) => Message {
                op_code: message.op_code,
                size: message.size.saturating_add(payload_length),
            },
            // only reachable in lax mode
            (OpCode::Continuation, None) => Message {
                op_code: OpCode::Binary,
                size: payload_length,
            },
            _ => {
                self.text_frame = false;
                return Ok(());
            }
        };

        match message.op_code {
            OpCode::Text => self.policy.assert_valid_text_message_size(message.size)?,
            _ => self.policy.assert_valid_binary_message_size(message.size)?,
        }

        self.text_frame = message.op_code == OpCode::Text;
        self.message = if self.fin { None } else { Some(message) };
        Ok(())
    }

    fn complete_frame(&mut self) -> Result<Frame, Error> {
        self.decode_state = DecodeState::ReadingHeader;
        let payload = match self.payload.take() {
            Some(buffer) => self.pool.release_owned(buffer),
            None => Vec::new(),
        };

        if self.text_frame {
            self.utf8
                .validate(&payload, self.fin)
                .map_err(|_| Error::BadPayload("text message is not valid UTF-8"))?;
        }
        if self.op_code == OpCode::Close {
            if self.policy.is_strict() {
                CloseInfo::from_payload(&payload)?;
            } else if payload.len() > 2 && std::str::from_utf8(&payload[2..]).is_err() {
                return Err(Error::BadPayload("close reason is not valid UTF-8"));
            }
        }

        let mask = self.masked.then_some(self.mask);
        trace!(
            "decoded {} frame: fin={} len={} masked={}",
            self.op_code,
            self.fin,
            payload.len(),
            self.masked
        );
        Ok(Frame::from_parts(self.fin, self.rsv, self.op_code, mask, payload))
    }

    fn release_payload(&mut self) {
        if let Some(payload) = self.payload.take() {
            self.pool.release(payload);
        }
    }

    /// Moves bytes from `input` into the scratch buffer until it holds `len` bytes.
    #[inline]
    fn fill_scratch(&mut self, input: &mut &[u8], len: usize) -> bool {
        let count = (len - self.scratch.len()).min(input.len());
        let (bytes, rest) = input.split_at(count);
        self.scratch.extend_from_slice(bytes);
        *input = rest;
        self.scratch.len() == len
    }
}

impl<P: BufferPool> Drop for Parser<P> {
    fn drop(&mut self) {
        self.release_payload();
    }
}

#[inline]
fn take_byte(input: &mut &[u8]) -> Option<u8> {
    let (&b, rest) = input.split_first()?;
    *input = rest;
    Some(b)
}

/// Frames completed by one chunk of input. Stops after the first error.
pub struct BatchIter<'a, P: BufferPool = HeapBufferPool> {
    parser: &'a mut Parser<P>,
    input: &'a [u8],
    done: bool,
}

impl<P: BufferPool> BatchIter<'_, P> {
    /// Bytes of the chunk not consumed yet.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.input.len()
    }
}

impl<P: BufferPool> Iterator for BatchIter<'_, P> {
    type Item = Result<Frame, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = self.parser.parse(&mut self.input).transpose();
        if !matches!(next, Some(Ok(_))) {
            self.done = true;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BucketBufferPool;
    use crate::ws::{Generator, OVERHEAD, StatusCode};

    const KEY: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Encodes frames the way a client would, without validating them.
    fn client_bytes(frames: &[Frame]) -> Vec<u8> {
        let mut generator = Generator::new(Policy::client().lax());
        let mut bytes = Vec::new();
        for frame in frames {
            let frame = frame.clone().with_mask(KEY);
            let mut buf = vec![0u8; frame.payload_len() + OVERHEAD];
            let len = generator.generate_whole_frame(&frame, &mut buf).unwrap();
            bytes.extend_from_slice(&buf[..len]);
        }
        bytes
    }

    fn server() -> Parser {
        Parser::new(Policy::server())
    }

    #[test]
    fn should_decode_unmasked_server_frames() -> anyhow::Result<()> {
        init_logger();
        let mut parser = Parser::new(Policy::client());
        let frames = parser.parse_all(&[0x89, 0x00, 0x88, 0x02, 0x03, 0xE8, 0x81, 0x02, 0x48, 0x69])?;
        assert_eq!(3, frames.len());
        assert_eq!(Frame::new(OpCode::Ping), frames[0]);
        assert_eq!(StatusCode::NORMAL, CloseInfo::from_frame(&frames[1])?.status_code());
        assert_eq!(Frame::text("Hi"), frames[2]);
        Ok(())
    }

    #[test]
    fn should_pass_rsv_bits_through() -> anyhow::Result<()> {
        let mut parser = Parser::new(Policy::client());
        let frames = parser.parse_all(&[0xC1, 0x02, 0x48, 0x69, 0xA1, 0x02, 0x48, 0x69, 0x91, 0x02, 0x48, 0x69])?;
        assert_eq!(Frame::text("Hi").with_rsv1(true), frames[0]);
        assert_eq!(Frame::text("Hi").with_rsv2(true), frames[1]);
        assert_eq!(Frame::text("Hi").with_rsv3(true), frames[2]);
        Ok(())
    }

    #[test]
    fn should_unmask_client_frames() -> anyhow::Result<()> {
        // RFC 6455 section 5.7, single-frame masked text message
        let mut parser = server();
        let frames = parser.parse_all(&[0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58])?;
        assert_eq!(1, frames.len());
        assert_eq!(Some("Hello"), frames[0].payload_as_str());
        assert_eq!(Some(KEY), frames[0].mask());
        Ok(())
    }

    #[test]
    fn should_suspend_and_resume_on_any_chunk_boundary() -> anyhow::Result<()> {
        init_logger();
        let frames = vec![
            Frame::text("hello"),
            Frame::binary(vec![7u8; 300]),
            Frame::ping(b"ping".to_vec()),
            Frame::binary(vec![1u8; 70_000]),
            CloseInfo::new(StatusCode::SHUTDOWN).with_reason("going away").as_frame()?,
        ];
        let bytes = client_bytes(&frames);
        let policy = Policy::server().with_max_binary_message_size(1 << 20).with_max_frame_payload_size(1 << 20);

        let whole = Parser::new(policy.clone()).parse_all(&bytes)?;
        assert_eq!(frames.len(), whole.len());

        for chunk_size in [1, 2, 3, 5, 7, 13, 4096] {
            let mut parser = Parser::new(policy.clone());
            let mut decoded = Vec::new();
            for chunk in bytes.chunks(chunk_size) {
                for frame in parser.batch_iter(chunk) {
                    decoded.push(frame?);
                }
            }
            assert_eq!(whole, decoded, "chunk_size={chunk_size}");
            assert!(parser.is_at_frame_boundary());
        }

        for (expected, actual) in frames.iter().zip(whole.iter()) {
            assert_eq!(expected.op_code(), actual.op_code());
            assert_eq!(expected.payload(), actual.payload());
        }
        Ok(())
    }

    #[test]
    fn should_report_need_for_more_data() {
        let bytes = client_bytes(&[Frame::text("hello")]);
        let mut parser = server();
        let mut input = &bytes[..bytes.len() - 1];
        assert_eq!(Ok(None), parser.parse(&mut input));
        assert!(input.is_empty());
        assert!(!parser.is_at_frame_boundary());

        let mut input = &bytes[bytes.len() - 1..];
        let frame = parser.parse(&mut input).unwrap().unwrap();
        assert_eq!(Some("hello"), frame.payload_as_str());
    }

    #[test]
    fn should_leave_bytes_of_next_frame_in_input() {
        let bytes = client_bytes(&[Frame::text("a"), Frame::text("b")]);
        let mut parser = server();
        let mut input = &bytes[..];
        let frame = parser.parse(&mut input).unwrap().unwrap();
        assert_eq!(b"a", frame.payload());
        assert_eq!(7, input.len());
    }

    #[test]
    fn should_reassemble_fragments_with_interleaved_control_frames() -> anyhow::Result<()> {
        let bytes = client_bytes(&[
            Frame::text("hel").with_fin(false),
            Frame::ping(b"x".to_vec()),
            Frame::continuation(false, "l"),
            Frame::continuation(true, "o"),
            Frame::binary(b"next".to_vec()),
        ]);
        let mut parser = server();
        let frames = parser.parse_all(&bytes)?;
        let ops: Vec<_> = frames.iter().map(|f| (f.op_code(), f.fin())).collect();
        assert_eq!(
            vec![
                (OpCode::Text, false),
                (OpCode::Ping, true),
                (OpCode::Continuation, false),
                (OpCode::Continuation, true),
                (OpCode::Binary, true),
            ],
            ops
        );
        assert!(!parser.is_message_open());
        Ok(())
    }

    #[test]
    fn should_reject_continuation_without_message() {
        let bytes = client_bytes(&[Frame::continuation(true, "x")]);
        assert_eq!(
            Err(Error::Protocol("continuation frame without a message to continue")),
            server().parse_all(&bytes)
        );
    }

    #[test]
    fn should_reject_new_message_while_fragmented_one_is_open() {
        let bytes = client_bytes(&[Frame::text("a").with_fin(false), Frame::binary(b"b".to_vec())]);
        let mut parser = server();
        let result = parser.parse_all(&bytes);
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn should_accept_illegal_fragmentation_when_lax() -> anyhow::Result<()> {
        let bytes = client_bytes(&[
            Frame::continuation(true, "x"),
            Frame::text("a").with_fin(false),
            Frame::text("b"),
        ]);
        let frames = Parser::new(Policy::server().lax()).parse_all(&bytes)?;
        assert_eq!(3, frames.len());
        Ok(())
    }

    #[test]
    fn should_reject_invalid_control_frames_when_strict() {
        let fragmented = client_bytes(&[Frame::new(OpCode::Ping).with_fin(false)]);
        assert_eq!(Err(Error::Protocol("fragmented control frame")), server().parse_all(&fragmented));

        let oversized = client_bytes(&[Frame::pong(vec![0u8; 126])]);
        assert_eq!(
            Err(Error::Protocol("control frame payload exceeds 125 bytes")),
            server().parse_all(&oversized)
        );
    }

    #[test]
    fn should_accept_invalid_control_frames_when_lax() -> anyhow::Result<()> {
        let bytes = client_bytes(&[Frame::new(OpCode::Close).with_fin(false), Frame::pong(vec![0u8; 126])]);
        let frames = Parser::new(Policy::server().lax()).parse_all(&bytes)?;
        assert!(!frames[0].fin());
        assert_eq!(126, frames[1].payload_len());
        Ok(())
    }

    #[test]
    fn should_reject_reserved_op_code_when_strict() {
        let bytes = client_bytes(&[Frame::new(OpCode::Reserved(0x3))]);
        assert_eq!(Err(Error::Protocol("reserved op_code")), server().parse_all(&bytes));
    }

    #[test]
    fn should_surface_reserved_op_code_when_lax() -> anyhow::Result<()> {
        let bytes = client_bytes(&[Frame::new(OpCode::Reserved(0xB)).with_payload("x")]);
        let frames = Parser::new(Policy::server().lax()).parse_all(&bytes)?;
        assert_eq!(OpCode::Reserved(0xB), frames[0].op_code());
        Ok(())
    }

    #[test]
    fn should_enforce_role_masking_even_when_lax() {
        let unmasked = [0x81, 0x02, 0x48, 0x69];
        assert_eq!(
            Err(Error::Protocol("client frame is not masked")),
            Parser::new(Policy::server().lax()).parse_all(&unmasked)
        );

        let masked = client_bytes(&[Frame::text("Hi")]);
        assert_eq!(
            Err(Error::Protocol("masking bit set on the server frame")),
            Parser::new(Policy::client().lax()).parse_all(&masked)
        );
    }

    #[test]
    fn should_enforce_frame_payload_limit() {
        let bytes = client_bytes(&[Frame::binary(vec![0u8; 11])]);
        let mut parser = Parser::new(Policy::server().with_max_frame_payload_size(10));
        assert_eq!(Err(Error::FrameTooLarge { size: 11, limit: 10 }), parser.parse_all(&bytes));
    }

    #[test]
    fn should_enforce_message_limit_across_fragments() {
        let bytes = client_bytes(&[
            Frame::text("abcd").with_fin(false),
            Frame::continuation(false, "efgh"),
            Frame::continuation(true, "ij"),
        ]);
        let mut parser = Parser::new(Policy::server().with_max_text_message_size(9));
        let err = parser.parse_all(&bytes).unwrap_err();
        assert_eq!(Error::MessageTooLarge { size: 10, limit: 9 }, err);
        assert_eq!(Some(StatusCode::MESSAGE_TOO_LARGE), err.close_status());
    }

    #[test]
    fn should_apply_limit_of_message_type() -> anyhow::Result<()> {
        let policy = Policy::server().with_max_text_message_size(4).with_max_binary_message_size(8);

        let binary = client_bytes(&[
            Frame::binary(vec![0u8; 4]).with_fin(false),
            Frame::continuation(true, vec![0u8; 4]),
        ]);
        assert_eq!(2, Parser::new(policy.clone()).parse_all(&binary)?.len());

        let text = client_bytes(&[Frame::text("ab").with_fin(false), Frame::continuation(true, "abc")]);
        assert!(matches!(Parser::new(policy).parse_all(&text), Err(Error::MessageTooLarge { .. })));
        Ok(())
    }

    #[test]
    fn should_count_lax_continuation_without_message_as_binary() -> anyhow::Result<()> {
        let policy = Policy::server()
            .lax()
            .with_max_text_message_size(100)
            .with_max_binary_message_size(4);

        let fits = client_bytes(&[Frame::continuation(true, vec![0xFFu8; 4])]);
        assert_eq!(1, Parser::new(policy.clone()).parse_all(&fits)?.len());

        let oversized = client_bytes(&[Frame::continuation(true, vec![0u8; 5])]);
        assert_eq!(
            Err(Error::MessageTooLarge { size: 5, limit: 4 }),
            Parser::new(policy).parse_all(&oversized)
        );
        Ok(())
    }

    #[test]
    fn should_reject_invalid_utf8_text() {
        let bytes = client_bytes(&[Frame::new(OpCode::Text).with_payload(vec![0xC3, 0x28])]);
        let err = server().parse_all(&bytes).unwrap_err();
        assert_eq!(Some(StatusCode::BAD_PAYLOAD), err.close_status());
    }

    #[test]
    fn should_accept_code_point_split_across_fragments() -> anyhow::Result<()> {
        let text = "€".as_bytes();
        let bytes = client_bytes(&[
            Frame::new(OpCode::Text).with_fin(false).with_payload(&text[..1]),
            Frame::continuation(true, &text[1..]),
        ]);
        assert_eq!(2, server().parse_all(&bytes)?.len());
        Ok(())
    }

    #[test]
    fn should_reject_message_ending_inside_code_point() {
        let text = "€".as_bytes();
        let bytes = client_bytes(&[
            Frame::new(OpCode::Text).with_fin(false).with_payload(&text[..1]),
            Frame::continuation(true, &text[1..2]),
        ]);
        assert!(matches!(server().parse_all(&bytes), Err(Error::BadPayload(_))));
    }

    #[test]
    fn should_not_validate_binary_payload() -> anyhow::Result<()> {
        let bytes = client_bytes(&[Frame::binary(vec![0xC3, 0x28])]);
        assert_eq!(1, server().parse_all(&bytes)?.len());
        Ok(())
    }

    #[test]
    fn should_validate_close_payload() {
        let single_byte = client_bytes(&[Frame::new(OpCode::Close).with_payload(vec![0x03])]);
        assert!(matches!(server().parse_all(&single_byte), Err(Error::Protocol(_))));

        let reserved_code = client_bytes(&[Frame::new(OpCode::Close).with_payload(1005u16.to_be_bytes().to_vec())]);
        assert!(matches!(server().parse_all(&reserved_code), Err(Error::Protocol(_))));

        let bad_reason = client_bytes(&[Frame::new(OpCode::Close).with_payload(vec![0x03, 0xE8, 0xFF])]);
        assert!(matches!(server().parse_all(&bad_reason), Err(Error::BadPayload(_))));

        let lax_bad_reason = Parser::new(Policy::server().lax()).parse_all(&bad_reason);
        assert!(matches!(lax_bad_reason, Err(Error::BadPayload(_))));
    }

    #[test]
    fn should_accept_malformed_close_codes_when_lax() -> anyhow::Result<()> {
        let bytes = client_bytes(&[
            Frame::new(OpCode::Close).with_payload(vec![0x03]),
            Frame::new(OpCode::Close).with_payload(1005u16.to_be_bytes().to_vec()),
            Frame::new(OpCode::Close).with_payload(vec![0x0B, 0xB8, b'o', b'k']),
        ]);
        let frames = Parser::new(Policy::server().lax()).parse_all(&bytes)?;
        assert_eq!(3, frames.len());
        assert_eq!(&[0x03], frames[0].payload());
        assert_eq!(&[0x03, 0xED], frames[1].payload());
        assert_eq!(&[0x0B, 0xB8, b'o', b'k'], frames[2].payload());
        Ok(())
    }

    #[test]
    fn should_accept_empty_close_payload() -> anyhow::Result<()> {
        let bytes = client_bytes(&[Frame::new(OpCode::Close)]);
        let frames = server().parse_all(&bytes)?;
        assert_eq!(StatusCode::NO_CODE, CloseInfo::from_frame(&frames[0])?.status_code());
        Ok(())
    }

    #[test]
    fn should_reject_64_bit_length_with_most_significant_bit_set() {
        let bytes = [0x82, 0x7F, 0x80, 0, 0, 0, 0, 0, 0, 1];
        let mut parser = Parser::new(Policy::client().with_max_frame_payload_size(u64::MAX));
        assert!(matches!(parser.parse_all(&bytes), Err(Error::Protocol(_))));
    }

    #[test]
    fn should_fail_permanently_after_error() {
        let mut parser = server();
        assert!(parser.parse_all(&[0x81, 0x00]).is_err());
        assert_eq!(Err(Error::Closed), parser.parse_all(&[]));

        parser.reset();
        let bytes = client_bytes(&[Frame::text("ok")]);
        assert_eq!(1, parser.parse_all(&bytes).unwrap().len());
    }

    #[test]
    fn should_stop_batch_after_error() {
        let mut parser = server();
        let mut iter = parser.batch_iter(&[0x81, 0x00, 0x81, 0x00]);
        assert!(matches!(iter.next(), Some(Err(Error::Protocol(_)))));
        assert!(iter.next().is_none());
        assert_eq!(2, iter.remaining());
    }

    #[test]
    fn should_reuse_pooled_payload_buffers() -> anyhow::Result<()> {
        let pool = BucketBufferPool::default();
        let bytes = client_bytes(&[Frame::text("a"), Frame::binary(vec![1u8; 300]), Frame::ping(b"p".to_vec())]);
        let mut parser = Parser::with_pool(Policy::server(), &pool);
        let frames = parser.parse_all(&bytes)?;
        assert_eq!(vec![1u8; 300], frames[1].payload());
        assert_eq!(3, pool.stats().acquired());
        assert_eq!(1, pool.stats().allocated());
        assert_eq!(0, pool.stats().outstanding());
        Ok(())
    }

    #[test]
    fn should_return_payload_buffer_to_pool_on_error() {
        let pool = BucketBufferPool::default();

        let bad_text = client_bytes(&[Frame::new(OpCode::Text).with_payload(vec![0xC3, 0x28])]);
        let mut parser = Parser::with_pool(Policy::server(), &pool);
        assert!(matches!(parser.parse_all(&bad_text), Err(Error::BadPayload(_))));
        assert_eq!(1, pool.stats().acquired());
        assert_eq!(0, pool.stats().outstanding());

        let oversized = client_bytes(&[Frame::text("abcd").with_fin(false), Frame::continuation(true, "efghij")]);
        let mut parser = Parser::with_pool(Policy::server().with_max_text_message_size(9), &pool);
        assert!(matches!(parser.parse_all(&oversized), Err(Error::MessageTooLarge { .. })));
        assert_eq!(0, pool.stats().outstanding());
    }

    #[test]
    fn should_return_payload_buffer_to_pool_on_reset() -> anyhow::Result<()> {
        let pool = BucketBufferPool::default();
        let bytes = client_bytes(&[Frame::binary(vec![1u8; 100])]);
        let mut parser = Parser::with_pool(Policy::server(), &pool);

        assert!(parser.parse_all(&bytes[..50])?.is_empty());
        assert_eq!(1, pool.stats().outstanding());

        parser.reset();
        assert_eq!(0, pool.stats().outstanding());
        assert!(parser.is_at_frame_boundary());

        assert_eq!(1, parser.parse_all(&bytes)?.len());
        assert_eq!(0, pool.stats().outstanding());
        Ok(())
    }

    #[test]
    fn should_return_payload_buffer_to_pool_on_drop() {
        let pool = BucketBufferPool::default();
        let bytes = client_bytes(&[Frame::binary(vec![1u8; 100])]);
        {
            let mut parser = Parser::with_pool(Policy::server(), &pool);
            assert_eq!(Ok(Vec::new()), parser.parse_all(&bytes[..50]));
            assert_eq!(1, pool.stats().outstanding());
        }
        assert_eq!(0, pool.stats().outstanding());
        assert_eq!(1, pool.idle());
    }
}
