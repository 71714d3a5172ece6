use bytes::Bytes;

use crate::codec::write_buffer::WriteBuffer;
use crate::misc::BsDebug;
use crate::wire::frame::flags::Flag;
use crate::wire::frame::flags::Flags;
use crate::wire::frame::pack_header;
use crate::wire::frame::Frame;
use crate::wire::frame::FrameHeader;
use crate::wire::frame::FrameIR;
use crate::wire::frame::ParseFrameError;
use crate::wire::frame::ParseFrameResult;
use crate::wire::frame::RawFrame;
use crate::wire::stream_id::StreamId;

pub const CONTINUATION_FRAME_TYPE: u8 = 0x9;

/// Flags of the `CONTINUATION` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuationFlag {
    EndHeaders,
}

impl Flag for ContinuationFlag {
    fn bitmask(&self) -> u8 {
        match self {
            ContinuationFlag::EndHeaders => 0x4,
        }
    }

    fn flags() -> &'static [ContinuationFlag] {
        &[ContinuationFlag::EndHeaders]
    }
}

/// `CONTINUATION` frame carrying one more header block fragment.
#[derive(Clone, PartialEq, Eq)]
pub struct ContinuationFrame {
    pub stream_id: StreamId,
    pub header_fragment: Bytes,
    pub flags: Flags<ContinuationFlag>,
}

impl ContinuationFrame {
    pub fn new(header_fragment: Bytes, stream_id: StreamId) -> ContinuationFrame {
        ContinuationFrame {
            stream_id,
            header_fragment,
            flags: Flags::new(0),
        }
    }

    pub fn set_flag(&mut self, flag: ContinuationFlag) {
        self.flags.set(flag);
    }

    pub fn is_headers_end(&self) -> bool {
        self.flags.is_set(ContinuationFlag::EndHeaders)
    }
}

impl Frame for ContinuationFrame {
    type FlagType = ContinuationFlag;

    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<Self> {
        let FrameHeader {
            flags, stream_id, ..
        } = raw_frame.header();
        if stream_id == 0 {
            return Err(ParseFrameError::StreamIdMustBeNonZero);
        }

        Ok(ContinuationFrame {
            stream_id,
            header_fragment: raw_frame.payload(),
            flags: Flags::new(flags),
        })
    }

    fn flags(&self) -> Flags<ContinuationFlag> {
        self.flags
    }

    fn get_stream_id(&self) -> StreamId {
        self.stream_id
    }

    fn get_header(&self) -> FrameHeader {
        FrameHeader {
            payload_len: self.header_fragment.len() as u32,
            frame_type: CONTINUATION_FRAME_TYPE,
            flags: self.flags.0,
            stream_id: self.stream_id,
        }
    }
}

impl FrameIR for ContinuationFrame {
    fn serialize_into(self, builder: &mut WriteBuffer) {
        builder.extend_from_slice(&pack_header(&self.get_header()));
        builder.extend_from_bytes(self.header_fragment);
    }
}

impl std::fmt::Debug for ContinuationFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ContinuationFrame")
            .field("stream_id", &self.stream_id)
            .field("flags", &self.flags)
            .field("header_fragment", &BsDebug(&self.header_fragment))
            .finish()
    }
}
