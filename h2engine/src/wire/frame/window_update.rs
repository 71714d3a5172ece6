use bytes::Buf;

use crate::codec::write_buffer::WriteBuffer;
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

pub const WINDOW_UPDATE_FRAME_TYPE: u8 = 0x8;

/// `WINDOW_UPDATE` frame, for the connection (stream 0) or a stream.
///
/// Accepted and parsed; outbound flow-control accounting is not
/// implemented, so the increment is otherwise unused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowUpdateFrame {
    pub stream_id: StreamId,
    pub increment: u32,
    flags: Flags<NoFlag>,
}

impl WindowUpdateFrame {
    pub fn for_connection(increment: u32) -> WindowUpdateFrame {
        WindowUpdateFrame {
            stream_id: 0,
            increment,
            flags: Flags::new(0),
        }
    }

    pub fn for_stream(stream_id: StreamId, increment: u32) -> WindowUpdateFrame {
        WindowUpdateFrame {
            stream_id,
            increment,
            flags: Flags::new(0),
        }
    }
}

impl Frame for WindowUpdateFrame {
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

        let mut payload = &raw_frame.payload()[..];
        let increment = payload.get_u32() & 0x7fff_ffff;

        // 6.9: a zero increment on the connection is a connection error.
        // The zero-increment stream case is reported by the parser as a
        // stream error before this point.
        if increment == 0 {
            return Err(ParseFrameError::ZeroWindowUpdate);
        }

        Ok(WindowUpdateFrame {
            stream_id,
            increment,
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
            frame_type: WINDOW_UPDATE_FRAME_TYPE,
            flags: self.flags.0,
            stream_id: self.stream_id,
        }
    }
}

impl FrameIR for WindowUpdateFrame {
    fn serialize_into(self, builder: &mut WriteBuffer) {
        builder.extend_from_slice(&pack_header(&self.get_header()));
        builder.extend_from_slice(&self.increment.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::error_code::ErrorCode;
    use crate::wire::frame::parse_frame;
    use crate::wire::frame::HttpFrame;
    use crate::wire::frame::ParseFrameOutcome;
    use bytes::BytesMut;

    #[test]
    fn serialize_parse() {
        let frame = WindowUpdateFrame::for_stream(7, 1024);
        let mut buf = BytesMut::from(&frame.clone().serialize_into_vec()[..]);
        match parse_frame(&mut buf, 16384) {
            ParseFrameOutcome::Frame(HttpFrame::WindowUpdate(parsed)) => assert_eq!(frame, parsed),
            o => panic!("unexpected: {:?}", o),
        }
    }

    #[test]
    fn zero_increment_on_stream_is_stream_error() {
        let frame = WindowUpdateFrame {
            stream_id: 7,
            increment: 0,
            flags: Flags::new(0),
        };
        let mut buf = BytesMut::from(&frame.serialize_into_vec()[..]);
        match parse_frame(&mut buf, 16384) {
            ParseFrameOutcome::StreamError(7, ErrorCode::ProtocolError, _) => {}
            o => panic!("unexpected: {:?}", o),
        }
    }
}
