//! Binary layout of HTTP/2 frames.
//!
//! Each frame type lives in its own module and implements [`Frame`] for
//! parsing and [`FrameIR`] for serialization. [`parse_frame`] is the
//! incremental entry point used by the connection engine: it consumes at
//! most one frame from the front of the buffer and reports how many bytes
//! are missing when it cannot.

use bytes::Buf;
use bytes::Bytes;
use bytes::BytesMut;

use crate::codec::write_buffer::WriteBuffer;
use crate::wire::error_code::ErrorCode;
use crate::wire::stream_id::StreamId;

pub mod continuation;
pub mod data;
pub mod flags;
pub mod frame_type;
pub mod goaway;
pub mod headers;
pub mod ping;
pub mod priority;
pub mod push_promise;
pub mod rst_stream;
pub mod settings;
pub mod window_update;

pub use self::continuation::ContinuationFlag;
pub use self::continuation::ContinuationFrame;
pub use self::data::split_data;
pub use self::data::DataFlag;
pub use self::data::DataFrame;
pub use self::flags::Flag;
pub use self::flags::Flags;
pub use self::flags::NoFlag;
pub use self::frame_type::HttpFrameType;
pub use self::frame_type::RawHttpFrameType;
pub use self::goaway::GoawayFrame;
pub use self::headers::HeadersFlag;
pub use self::headers::HeadersFrame;
pub use self::ping::PingFlag;
pub use self::ping::PingFrame;
pub use self::priority::PriorityFrame;
pub use self::push_promise::PushPromiseFlag;
pub use self::push_promise::PushPromiseFrame;
pub use self::rst_stream::RstStreamFrame;
pub use self::settings::HttpSetting;
pub use self::settings::HttpSettings;
pub use self::settings::SettingsFlag;
pub use self::settings::SettingsFrame;
pub use self::window_update::WindowUpdateFrame;

use self::continuation::CONTINUATION_FRAME_TYPE;
use self::data::DATA_FRAME_TYPE;
use self::goaway::GOAWAY_FRAME_TYPE;
use self::headers::HEADERS_FRAME_TYPE;
use self::ping::PING_FRAME_TYPE;
use self::priority::PRIORITY_FRAME_TYPE;
use self::push_promise::PUSH_PROMISE_FRAME_TYPE;
use self::rst_stream::RST_STREAM_FRAME_TYPE;
use self::settings::SETTINGS_FRAME_TYPE;
use self::window_update::WINDOW_UPDATE_FRAME_TYPE;

/// Length of the fixed frame header, RFC 7540 section 4.1.
pub const FRAME_HEADER_LEN: usize = 9;

/// The fixed 9-octet header present in every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload length, 24 bits on the wire.
    pub payload_len: u32,
    /// Frame type octet.
    pub frame_type: u8,
    /// Flags octet.
    pub flags: u8,
    /// Stream id with the reserved bit cleared.
    pub stream_id: StreamId,
}

pub fn unpack_header_from_slice(b: &[u8]) -> FrameHeader {
    assert!(b.len() >= FRAME_HEADER_LEN);
    FrameHeader {
        payload_len: ((b[0] as u32) << 16) | ((b[1] as u32) << 8) | (b[2] as u32),
        frame_type: b[3],
        flags: b[4],
        stream_id: u32::from_be_bytes([b[5], b[6], b[7], b[8]]) & 0x7fff_ffff,
    }
}

pub fn pack_header(header: &FrameHeader) -> [u8; FRAME_HEADER_LEN] {
    let l = header.payload_len;
    assert!(l < (1 << 24));
    let s = header.stream_id.to_be_bytes();
    [
        (l >> 16) as u8,
        (l >> 8) as u8,
        l as u8,
        header.frame_type,
        header.flags,
        s[0],
        s[1],
        s[2],
        s[3],
    ]
}

/// An undecoded frame: the raw header and payload bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub raw_content: Bytes,
}

impl RawFrame {
    pub fn header(&self) -> FrameHeader {
        unpack_header_from_slice(&self.raw_content)
    }

    pub fn payload(&self) -> Bytes {
        self.raw_content.slice(FRAME_HEADER_LEN..)
    }
}

impl std::fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("RawFrame")
            .field("header", &self.header())
            .field("payload", &crate::misc::BsDebug(&self.raw_content[FRAME_HEADER_LEN..]))
            .finish()
    }
}

/// Frame decode errors. All of them are fatal for the connection; errors
/// isolated to a stream are reported through [`ParseFrameOutcome::StreamError`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseFrameError {
    #[error("incorrect frame length: {0}")]
    IncorrectFrameLength(u32),
    #[error("frame payload {0} exceeds max_frame_size {1}")]
    PayloadTooLarge(u32, u32),
    #[error("stream id must be non-zero")]
    StreamIdMustBeNonZero,
    #[error("stream id must be zero, got {0}")]
    StreamIdMustBeZero(StreamId),
    #[error("stream depends on itself: {0}")]
    StreamDependencyOnItself(StreamId),
    #[error("SETTINGS payload length {0} is not a multiple of 6")]
    IncorrectSettingsLength(u32),
    #[error("PING payload length must be 8, got {0}")]
    IncorrectPingLength(u32),
    #[error("padding exceeds frame payload")]
    PaddingExceedsPayload,
    #[error("SETTINGS_ENABLE_PUSH must be 0 or 1, got {0}")]
    InvalidEnablePushValue(u32),
    #[error("SETTINGS_MAX_FRAME_SIZE out of range: {0}")]
    InvalidMaxFrameSizeValue(u32),
    #[error("SETTINGS_INITIAL_WINDOW_SIZE too large: {0}")]
    WindowSizeTooLarge(u32),
    #[error("WINDOW_UPDATE with zero increment on the connection")]
    ZeroWindowUpdate,
    #[error("internal error")]
    InternalError,
}

impl ParseFrameError {
    /// The GOAWAY error code this parse error maps to.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ParseFrameError::IncorrectFrameLength(..)
            | ParseFrameError::PayloadTooLarge(..)
            | ParseFrameError::IncorrectSettingsLength(..)
            | ParseFrameError::IncorrectPingLength(..) => ErrorCode::FrameSizeError,
            ParseFrameError::WindowSizeTooLarge(..) => ErrorCode::FlowControlError,
            ParseFrameError::InternalError => ErrorCode::InternalError,
            _ => ErrorCode::ProtocolError,
        }
    }
}

pub type ParseFrameResult<T> = Result<T, ParseFrameError>;

/// A decoded frame.
pub trait Frame: Sized {
    type FlagType: Flag;

    /// Parse the frame from the raw bytes. The caller guarantees the header
    /// frame type matches.
    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<Self>;

    fn flags(&self) -> Flags<Self::FlagType>;

    fn get_stream_id(&self) -> StreamId;

    fn get_header(&self) -> FrameHeader;
}

/// A frame that can be written out.
pub trait FrameIR: std::fmt::Debug {
    fn serialize_into(self, builder: &mut WriteBuffer);

    fn serialize_into_vec(self) -> Vec<u8>
    where
        Self: Sized,
    {
        let mut buf = WriteBuffer::new();
        self.serialize_into(&mut buf);
        buf.into_vec()
    }
}

/// Strip the Pad Length prefix and trailing padding from a padded payload.
pub(crate) fn strip_padding(payload: Bytes) -> ParseFrameResult<Bytes> {
    if payload.is_empty() {
        return Err(ParseFrameError::PaddingExceedsPayload);
    }
    let pad_len = payload[0] as usize;
    let rest = payload.slice(1..);
    if pad_len >= rest.len() + 1 {
        // 6.1: padding that equals or exceeds the remaining payload
        return Err(ParseFrameError::PaddingExceedsPayload);
    }
    Ok(rest.slice(..rest.len() - pad_len))
}

/// Any HTTP/2 frame, tagged by type. Frames of unknown types are preserved
/// raw; RFC 7540 section 4.1 requires them to be ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpFrame {
    Data(DataFrame),
    Headers(HeadersFrame),
    Priority(PriorityFrame),
    RstStream(RstStreamFrame),
    Settings(SettingsFrame),
    PushPromise(PushPromiseFrame),
    Ping(PingFrame),
    Goaway(GoawayFrame),
    WindowUpdate(WindowUpdateFrame),
    Continuation(ContinuationFrame),
    Unknown(RawFrame),
}

impl HttpFrame {
    pub fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<HttpFrame> {
        let frame = match raw_frame.header().frame_type {
            DATA_FRAME_TYPE => HttpFrame::Data(DataFrame::from_raw(raw_frame)?),
            HEADERS_FRAME_TYPE => HttpFrame::Headers(HeadersFrame::from_raw(raw_frame)?),
            PRIORITY_FRAME_TYPE => HttpFrame::Priority(PriorityFrame::from_raw(raw_frame)?),
            RST_STREAM_FRAME_TYPE => HttpFrame::RstStream(RstStreamFrame::from_raw(raw_frame)?),
            SETTINGS_FRAME_TYPE => HttpFrame::Settings(SettingsFrame::from_raw(raw_frame)?),
            PUSH_PROMISE_FRAME_TYPE => {
                HttpFrame::PushPromise(PushPromiseFrame::from_raw(raw_frame)?)
            }
            PING_FRAME_TYPE => HttpFrame::Ping(PingFrame::from_raw(raw_frame)?),
            GOAWAY_FRAME_TYPE => HttpFrame::Goaway(GoawayFrame::from_raw(raw_frame)?),
            WINDOW_UPDATE_FRAME_TYPE => {
                HttpFrame::WindowUpdate(WindowUpdateFrame::from_raw(raw_frame)?)
            }
            CONTINUATION_FRAME_TYPE => {
                HttpFrame::Continuation(ContinuationFrame::from_raw(raw_frame)?)
            }
            _ => HttpFrame::Unknown(raw_frame.clone()),
        };
        Ok(frame)
    }

    pub fn frame_type(&self) -> RawHttpFrameType {
        match self {
            HttpFrame::Data(..) => RawHttpFrameType(DATA_FRAME_TYPE),
            HttpFrame::Headers(..) => RawHttpFrameType(HEADERS_FRAME_TYPE),
            HttpFrame::Priority(..) => RawHttpFrameType(PRIORITY_FRAME_TYPE),
            HttpFrame::RstStream(..) => RawHttpFrameType(RST_STREAM_FRAME_TYPE),
            HttpFrame::Settings(..) => RawHttpFrameType(SETTINGS_FRAME_TYPE),
            HttpFrame::PushPromise(..) => RawHttpFrameType(PUSH_PROMISE_FRAME_TYPE),
            HttpFrame::Ping(..) => RawHttpFrameType(PING_FRAME_TYPE),
            HttpFrame::Goaway(..) => RawHttpFrameType(GOAWAY_FRAME_TYPE),
            HttpFrame::WindowUpdate(..) => RawHttpFrameType(WINDOW_UPDATE_FRAME_TYPE),
            HttpFrame::Continuation(..) => RawHttpFrameType(CONTINUATION_FRAME_TYPE),
            HttpFrame::Unknown(raw) => RawHttpFrameType(raw.header().frame_type),
        }
    }
}

impl FrameIR for HttpFrame {
    fn serialize_into(self, builder: &mut WriteBuffer) {
        match self {
            HttpFrame::Data(f) => f.serialize_into(builder),
            HttpFrame::Headers(f) => f.serialize_into(builder),
            HttpFrame::Priority(..) => unimplemented!("PRIORITY frames are never sent"),
            HttpFrame::RstStream(f) => f.serialize_into(builder),
            HttpFrame::Settings(f) => f.serialize_into(builder),
            HttpFrame::PushPromise(f) => f.serialize_into(builder),
            HttpFrame::Ping(f) => f.serialize_into(builder),
            HttpFrame::Goaway(f) => f.serialize_into(builder),
            HttpFrame::WindowUpdate(f) => f.serialize_into(builder),
            HttpFrame::Continuation(f) => f.serialize_into(builder),
            HttpFrame::Unknown(..) => unimplemented!("unknown frames are never sent"),
        }
    }
}

/// Result of feeding the parser.
#[derive(Debug)]
pub enum ParseFrameOutcome {
    /// One frame split off the front of the buffer.
    Frame(HttpFrame),
    /// Not enough bytes: total buffered bytes required before retrying.
    NeedBytes(usize),
    /// Error isolated to one stream; the frame has been consumed.
    StreamError(StreamId, ErrorCode, &'static str),
    /// Connection-fatal error.
    Error(ParseFrameError),
}

/// Try to consume one frame from the front of `buf`.
pub fn parse_frame(buf: &mut BytesMut, max_frame_size: u32) -> ParseFrameOutcome {
    if buf.len() < FRAME_HEADER_LEN {
        return ParseFrameOutcome::NeedBytes(FRAME_HEADER_LEN);
    }

    let header = unpack_header_from_slice(&buf[..FRAME_HEADER_LEN]);

    if header.payload_len > max_frame_size {
        return ParseFrameOutcome::Error(ParseFrameError::PayloadTooLarge(
            header.payload_len,
            max_frame_size,
        ));
    }

    let total_len = FRAME_HEADER_LEN + header.payload_len as usize;
    if buf.len() < total_len {
        return ParseFrameOutcome::NeedBytes(total_len);
    }

    let raw = RawFrame {
        raw_content: buf.split_to(total_len).freeze(),
    };

    // Errors RFC 7540 scopes to a single stream rather than the connection:
    // PRIORITY with a bad length (6.3) and WINDOW_UPDATE with a zero
    // increment on a stream (6.9).
    if header.frame_type == PRIORITY_FRAME_TYPE
        && header.stream_id != 0
        && header.payload_len != 5
    {
        return ParseFrameOutcome::StreamError(
            header.stream_id,
            ErrorCode::FrameSizeError,
            "PRIORITY frame with incorrect length",
        );
    }
    if header.frame_type == WINDOW_UPDATE_FRAME_TYPE
        && header.stream_id != 0
        && header.payload_len == 4
    {
        let mut payload = raw.payload();
        let increment = payload.get_u32() & 0x7fff_ffff;
        if increment == 0 {
            return ParseFrameOutcome::StreamError(
                header.stream_id,
                ErrorCode::ProtocolError,
                "WINDOW_UPDATE frame with zero increment",
            );
        }
    }

    match HttpFrame::from_raw(&raw) {
        Ok(frame) => ParseFrameOutcome::Frame(frame),
        Err(e) => ParseFrameOutcome::Error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_pack_unpack() {
        let header = FrameHeader {
            payload_len: 0x010203,
            frame_type: 0x4,
            flags: 0x5,
            stream_id: 0x0607_0809,
        };
        let packed = pack_header(&header);
        assert_eq!(
            &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09],
            &packed
        );
        assert_eq!(header, unpack_header_from_slice(&packed));
    }

    #[test]
    fn unpack_clears_reserved_bit() {
        let packed = [0, 0, 0, 0, 0, 0x80, 0, 0, 1];
        assert_eq!(1, unpack_header_from_slice(&packed).stream_id);
    }

    #[test]
    fn parse_needs_header() {
        let mut buf = BytesMut::from(&[0u8, 0, 8][..]);
        match parse_frame(&mut buf, 16384) {
            ParseFrameOutcome::NeedBytes(n) => assert_eq!(FRAME_HEADER_LEN, n),
            o => panic!("unexpected: {:?}", o),
        }
    }

    #[test]
    fn parse_needs_payload() {
        // PING header claiming 8 bytes of payload, none present yet
        let mut buf = BytesMut::from(&pack_header(&FrameHeader {
            payload_len: 8,
            frame_type: PING_FRAME_TYPE,
            flags: 0,
            stream_id: 0,
        })[..]);
        match parse_frame(&mut buf, 16384) {
            ParseFrameOutcome::NeedBytes(n) => assert_eq!(FRAME_HEADER_LEN + 8, n),
            o => panic!("unexpected: {:?}", o),
        }
    }

    #[test]
    fn parse_rejects_oversized_frame() {
        let mut buf = BytesMut::from(&pack_header(&FrameHeader {
            payload_len: 16385,
            frame_type: DATA_FRAME_TYPE,
            flags: 0,
            stream_id: 1,
        })[..]);
        match parse_frame(&mut buf, 16384) {
            ParseFrameOutcome::Error(ParseFrameError::PayloadTooLarge(16385, 16384)) => {}
            o => panic!("unexpected: {:?}", o),
        }
    }

    #[test]
    fn parse_priority_bad_length_is_stream_error() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&pack_header(&FrameHeader {
            payload_len: 4,
            frame_type: PRIORITY_FRAME_TYPE,
            flags: 0,
            stream_id: 7,
        }));
        buf.extend_from_slice(&[0, 0, 0, 0]);
        match parse_frame(&mut buf, 16384) {
            ParseFrameOutcome::StreamError(7, ErrorCode::FrameSizeError, _) => {}
            o => panic!("unexpected: {:?}", o),
        }
        // the malformed frame is consumed
        assert!(buf.is_empty());
    }

    #[test]
    fn parse_unknown_frame_type() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&pack_header(&FrameHeader {
            payload_len: 2,
            frame_type: 0x77,
            flags: 0,
            stream_id: 0,
        }));
        buf.extend_from_slice(&[1, 2]);
        match parse_frame(&mut buf, 16384) {
            ParseFrameOutcome::Frame(HttpFrame::Unknown(raw)) => {
                assert_eq!(0x77, raw.header().frame_type)
            }
            o => panic!("unexpected: {:?}", o),
        }
    }
}
