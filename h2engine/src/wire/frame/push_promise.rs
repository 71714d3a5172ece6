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

pub const PUSH_PROMISE_FRAME_TYPE: u8 = 0x5;

/// Flags of the `PUSH_PROMISE` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushPromiseFlag {
    EndHeaders,
    Padded,
}

impl Flag for PushPromiseFlag {
    fn bitmask(&self) -> u8 {
        match self {
            PushPromiseFlag::EndHeaders => 0x4,
            PushPromiseFlag::Padded => 0x8,
        }
    }

    fn flags() -> &'static [PushPromiseFlag] {
        &[PushPromiseFlag::EndHeaders, PushPromiseFlag::Padded]
    }
}

/// `PUSH_PROMISE` frame. The server emits these; receiving one is a
/// protocol error handled by the dispatcher.
#[derive(Clone, PartialEq, Eq)]
pub struct PushPromiseFrame {
    pub stream_id: StreamId,
    pub promised_stream_id: StreamId,
    pub header_fragment: Bytes,
    pub flags: Flags<PushPromiseFlag>,
}

impl PushPromiseFrame {
    pub fn new(
        stream_id: StreamId,
        promised_stream_id: StreamId,
        header_fragment: Bytes,
    ) -> PushPromiseFrame {
        let mut flags = Flags::new(0);
        flags.set(PushPromiseFlag::EndHeaders);
        PushPromiseFrame {
            stream_id,
            promised_stream_id,
            header_fragment,
            flags,
        }
    }
}

impl Frame for PushPromiseFrame {
    type FlagType = PushPromiseFlag;

    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<Self> {
        let FrameHeader {
            flags, stream_id, ..
        } = raw_frame.header();
        if stream_id == 0 {
            return Err(ParseFrameError::StreamIdMustBeNonZero);
        }

        let flags = Flags::<PushPromiseFlag>::new(flags);

        let mut fragment = if flags.is_set(PushPromiseFlag::Padded) {
            strip_padding(raw_frame.payload())?
        } else {
            raw_frame.payload()
        };

        if fragment.len() < 4 {
            return Err(ParseFrameError::IncorrectFrameLength(
                raw_frame.header().payload_len,
            ));
        }
        let promised_stream_id = fragment.get_u32() & 0x7fff_ffff;

        Ok(PushPromiseFrame {
            stream_id,
            promised_stream_id,
            header_fragment: fragment,
            flags,
        })
    }

    fn flags(&self) -> Flags<PushPromiseFlag> {
        self.flags
    }

    fn get_stream_id(&self) -> StreamId {
        self.stream_id
    }

    fn get_header(&self) -> FrameHeader {
        FrameHeader {
            payload_len: (4 + self.header_fragment.len()) as u32,
            frame_type: PUSH_PROMISE_FRAME_TYPE,
            flags: self.flags.0 & PushPromiseFlag::EndHeaders.bitmask(),
            stream_id: self.stream_id,
        }
    }
}

impl FrameIR for PushPromiseFrame {
    fn serialize_into(self, builder: &mut WriteBuffer) {
        builder.extend_from_slice(&pack_header(&self.get_header()));
        builder.extend_from_slice(&self.promised_stream_id.to_be_bytes());
        builder.extend_from_bytes(self.header_fragment);
    }
}

impl std::fmt::Debug for PushPromiseFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("PushPromiseFrame")
            .field("stream_id", &self.stream_id)
            .field("promised_stream_id", &self.promised_stream_id)
            .field("flags", &self.flags)
            .field("header_fragment", &BsDebug(&self.header_fragment))
            .finish()
    }
}
