use bytes::Buf;
use bytes::Bytes;

use crate::codec::write_buffer::WriteBuffer;
use crate::misc::BsDebug;
use crate::wire::frame::flags::Flag;
use crate::wire::frame::flags::Flags;
use crate::wire::frame::pack_header;
use crate::wire::frame::strip_padding;
use crate::wire::frame::Frame;
use crate::wire::frame::FrameHeader;
use crate::wire::frame::FrameIR;
use crate::wire::frame::ParseFrameError;
use crate::wire::frame::ParseFrameResult;
use crate::wire::frame::RawFrame;
use crate::wire::stream_id::StreamId;

pub const HEADERS_FRAME_TYPE: u8 = 0x1;

/// Flags of the `HEADERS` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadersFlag {
    EndStream,
    EndHeaders,
    Padded,
    Priority,
}

impl Flag for HeadersFlag {
    fn bitmask(&self) -> u8 {
        match self {
            HeadersFlag::EndStream => 0x1,
            HeadersFlag::EndHeaders => 0x4,
            HeadersFlag::Padded => 0x8,
            HeadersFlag::Priority => 0x20,
        }
    }

    fn flags() -> &'static [HeadersFlag] {
        &[
            HeadersFlag::EndStream,
            HeadersFlag::EndHeaders,
            HeadersFlag::Padded,
            HeadersFlag::Priority,
        ]
    }
}

/// `HEADERS` frame. The priority fields are parsed past and dropped;
/// padding is stripped. Only the header block fragment is retained.
#[derive(Clone, PartialEq, Eq)]
pub struct HeadersFrame {
    pub stream_id: StreamId,
    pub header_fragment: Bytes,
    pub flags: Flags<HeadersFlag>,
}

impl HeadersFrame {
    pub fn new(header_fragment: Bytes, stream_id: StreamId) -> HeadersFrame {
        HeadersFrame {
            stream_id,
            header_fragment,
            flags: Flags::new(0),
        }
    }

    pub fn set_flag(&mut self, flag: HeadersFlag) {
        self.flags.set(flag);
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.flags.is_set(HeadersFlag::EndStream)
    }

    pub fn is_end_of_headers(&self) -> bool {
        self.flags.is_set(HeadersFlag::EndHeaders)
    }
}

impl Frame for HeadersFrame {
    type FlagType = HeadersFlag;

    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<Self> {
        let FrameHeader {
            flags, stream_id, ..
        } = raw_frame.header();
        if stream_id == 0 {
            return Err(ParseFrameError::StreamIdMustBeNonZero);
        }

        let flags = Flags::<HeadersFlag>::new(flags);

        let mut fragment = if flags.is_set(HeadersFlag::Padded) {
            strip_padding(raw_frame.payload())?
        } else {
            raw_frame.payload()
        };

        if flags.is_set(HeadersFlag::Priority) {
            if fragment.len() < 5 {
                return Err(ParseFrameError::IncorrectFrameLength(
                    raw_frame.header().payload_len,
                ));
            }
            // exclusive bit + stream dependency + weight, all unused
            let stream_dep = fragment.get_u32() & 0x7fff_ffff;
            let _weight = fragment.get_u8();
            if stream_dep == stream_id {
                return Err(ParseFrameError::StreamDependencyOnItself(stream_id));
            }
        }

        Ok(HeadersFrame {
            stream_id,
            header_fragment: fragment,
            flags,
        })
    }

    fn flags(&self) -> Flags<HeadersFlag> {
        self.flags
    }

    fn get_stream_id(&self) -> StreamId {
        self.stream_id
    }

    fn get_header(&self) -> FrameHeader {
        // Padding and priority are never emitted
        FrameHeader {
            payload_len: self.header_fragment.len() as u32,
            frame_type: HEADERS_FRAME_TYPE,
            flags: self.flags.0
                & (HeadersFlag::EndStream.bitmask() | HeadersFlag::EndHeaders.bitmask()),
            stream_id: self.stream_id,
        }
    }
}

impl FrameIR for HeadersFrame {
    fn serialize_into(self, builder: &mut WriteBuffer) {
        builder.extend_from_slice(&pack_header(&self.get_header()));
        builder.extend_from_bytes(self.header_fragment);
    }
}

impl std::fmt::Debug for HeadersFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("HeadersFrame")
            .field("stream_id", &self.stream_id)
            .field("flags", &self.flags)
            .field("header_fragment", &BsDebug(&self.header_fragment))
            .finish()
    }
}
