use bytes::Buf;

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

pub const RST_STREAM_FRAME_TYPE: u8 = 0x3;

/// `RST_STREAM` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RstStreamFrame {
    pub stream_id: StreamId,
    pub raw_error_code: u32,
    flags: Flags<NoFlag>,
}

impl RstStreamFrame {
    pub fn new(stream_id: StreamId, error_code: ErrorCode) -> RstStreamFrame {
        RstStreamFrame {
            stream_id,
            raw_error_code: error_code as u32,
            flags: Flags::new(0),
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        self.raw_error_code.into()
    }
}

impl Frame for RstStreamFrame {
    type FlagType = NoFlag;

    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<Self> {
        let FrameHeader {
            payload_len,
            flags,
            stream_id,
            ..
        } = raw_frame.header();
        if payload_len != 4 {
            return Err(ParseFrameError::IncorrectFrameLength(payload_len));
        }
        if stream_id == 0 {
            return Err(ParseFrameError::StreamIdMustBeNonZero);
        }

        let mut payload = &raw_frame.payload()[..];
        let raw_error_code = payload.get_u32();

        Ok(RstStreamFrame {
            stream_id,
            raw_error_code,
            flags: Flags::new(flags),
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
            payload_len: 4,
            frame_type: RST_STREAM_FRAME_TYPE,
            flags: self.flags.0,
            stream_id: self.stream_id,
        }
    }
}

impl FrameIR for RstStreamFrame {
    fn serialize_into(self, builder: &mut WriteBuffer) {
        builder.extend_from_slice(&pack_header(&self.get_header()));
        builder.extend_from_slice(&self.raw_error_code.to_be_bytes());
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
        let frame = RstStreamFrame::new(5, ErrorCode::Cancel);
        let mut buf = BytesMut::from(&frame.clone().serialize_into_vec()[..]);
        match parse_frame(&mut buf, 16384) {
            ParseFrameOutcome::Frame(HttpFrame::RstStream(parsed)) => {
                assert_eq!(frame, parsed);
                assert_eq!(ErrorCode::Cancel, parsed.error_code());
            }
            o => panic!("unexpected: {:?}", o),
        }
    }
}
