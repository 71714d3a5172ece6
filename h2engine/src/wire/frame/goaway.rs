use bytes::Buf;
use bytes::Bytes;

use crate::codec::write_buffer::WriteBuffer;
use crate::wire::error_code::ErrorCode;
use crate::wire::frame::flags::Flags;
use crate::wire::frame::flags::NoFlag;
use crate::wire::frame::pack_header;
use crate::wire::frame::Frame;
use crate::wire::frame::FrameHeader;
use crate::wire::frame::FrameIR;
use crate::wire::frame::ParseFrameError;
use crate::wire::frame::ParseFrameResult;
use crate::wire::frame::RawFrame;
use crate::wire::stream_id::StreamId;

pub const GOAWAY_FRAME_TYPE: u8 = 0x7;

/// `GOAWAY` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoawayFrame {
    pub last_stream_id: StreamId,
    pub raw_error_code: u32,
    pub debug_data: Bytes,
    flags: Flags<NoFlag>,
}

impl GoawayFrame {
    pub fn new(last_stream_id: StreamId, error_code: ErrorCode) -> GoawayFrame {
        GoawayFrame {
            last_stream_id,
            raw_error_code: error_code as u32,
            debug_data: Bytes::new(),
            flags: Flags::new(0),
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        self.raw_error_code.into()
    }
}

impl Frame for GoawayFrame {
    type FlagType = NoFlag;

    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<Self> {
        let FrameHeader {
            payload_len,
            flags,
            stream_id,
            ..
        } = raw_frame.header();
        if payload_len < 8 {
            return Err(ParseFrameError::IncorrectFrameLength(payload_len));
        }
        if stream_id != 0 {
            return Err(ParseFrameError::StreamIdMustBeZero(stream_id));
        }

        let payload = raw_frame.payload();
        let mut cursor = &payload[..];
        let last_stream_id = cursor.get_u32() & 0x7fff_ffff;
        let raw_error_code = cursor.get_u32();

        Ok(GoawayFrame {
            last_stream_id,
            raw_error_code,
            debug_data: payload.slice(8..),
            flags: Flags::new(flags),
        })
    }

    fn flags(&self) -> Flags<NoFlag> {
        self.flags
    }

    fn get_stream_id(&self) -> StreamId {
        0
    }

    fn get_header(&self) -> FrameHeader {
        FrameHeader {
            payload_len: (8 + self.debug_data.len()) as u32,
            frame_type: GOAWAY_FRAME_TYPE,
            flags: self.flags.0,
            stream_id: 0,
        }
    }
}

impl FrameIR for GoawayFrame {
    fn serialize_into(self, builder: &mut WriteBuffer) {
        builder.extend_from_slice(&pack_header(&self.get_header()));
        builder.extend_from_slice(&self.last_stream_id.to_be_bytes());
        builder.extend_from_slice(&self.raw_error_code.to_be_bytes());
        builder.extend_from_bytes(self.debug_data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::frame::parse_frame;
    use crate::wire::frame::HttpFrame;
    use crate::wire::frame::ParseFrameOutcome;
    use bytes::BytesMut;

    #[test]
    fn serialize_parse() {
        let frame = GoawayFrame::new(5, ErrorCode::EnhanceYourCalm);
        let mut buf = BytesMut::from(&frame.clone().serialize_into_vec()[..]);
        match parse_frame(&mut buf, 16384) {
            ParseFrameOutcome::Frame(HttpFrame::Goaway(parsed)) => {
                assert_eq!(frame, parsed);
                assert_eq!(5, parsed.last_stream_id);
                assert_eq!(ErrorCode::EnhanceYourCalm, parsed.error_code());
            }
            o => panic!("unexpected: {:?}", o),
        }
    }
}
