use bytes::Buf;

use crate::wire::frame::flags::Flags;
use crate::wire::frame::flags::NoFlag;
use crate::wire::frame::Frame;
use crate::wire::frame::FrameHeader;
use crate::wire::frame::ParseFrameError;
use crate::wire::frame::ParseFrameResult;
use crate::wire::frame::RawFrame;
use crate::wire::stream_id::StreamId;

pub const PRIORITY_FRAME_TYPE: u8 = 0x2;

/// `PRIORITY` frame. Parsed and validated, otherwise unused: the engine
/// does not implement prioritisation.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct PriorityFrame {
    flags: Flags<NoFlag>,
    pub stream_id: StreamId,
    pub exclusive: bool,
    pub stream_dep: StreamId,
    pub weight: u8,
}

impl Frame for PriorityFrame {
    type FlagType = NoFlag;

    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<Self> {
        let FrameHeader {
            payload_len,
            frame_type,
            flags,
            stream_id,
        } = raw_frame.header();
        if payload_len != 5 {
            return Err(ParseFrameError::IncorrectFrameLength(payload_len));
        }
        if frame_type != PRIORITY_FRAME_TYPE {
            return Err(ParseFrameError::InternalError);
        }
        if stream_id == 0 {
            return Err(ParseFrameError::StreamIdMustBeNonZero);
        }

        let mut payload = &raw_frame.payload()[..];
        let first = payload.get_u32();
        let exclusive = (first & 0x8000_0000) != 0;
        let stream_dep = first & !0x8000_0000;
        let weight = payload.get_u8();

        if stream_dep == stream_id {
            return Err(ParseFrameError::StreamDependencyOnItself(stream_id));
        }

        Ok(PriorityFrame {
            flags: Flags::new(flags),
            stream_id,
            exclusive,
            stream_dep,
            weight,
        })
    }

    fn flags(&self) -> Flags<NoFlag> {
        self.flags
    }

    fn get_stream_id(&self) -> StreamId {
        self.stream_id
    }

    fn get_header(&self) -> FrameHeader {
        FrameHeader {
            payload_len: 5,
            frame_type: PRIORITY_FRAME_TYPE,
            flags: self.flags.0,
            stream_id: self.stream_id,
        }
    }
}
