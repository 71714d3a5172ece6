use bytes::Buf;

use crate::codec::write_buffer::WriteBuffer;
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

pub const PING_FRAME_TYPE: u8 = 0x6;

/// Flags of the `PING` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingFlag {
    Ack,
}

impl Flag for PingFlag {
    fn bitmask(&self) -> u8 {
        match self {
            PingFlag::Ack => 0x1,
        }
    }

    fn flags() -> &'static [PingFlag] {
        &[PingFlag::Ack]
    }
}

/// `PING` frame with its 8 bytes of opaque data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingFrame {
    pub opaque_data: u64,
    pub flags: Flags<PingFlag>,
}

impl PingFrame {
    pub fn new(opaque_data: u64) -> PingFrame {
        PingFrame {
            opaque_data,
            flags: Flags::new(0),
        }
    }

    /// The reply to a received `PING`: same opaque data, ack flag set.
    pub fn new_ack(opaque_data: u64) -> PingFrame {
        let mut flags = Flags::new(0);
        flags.set(PingFlag::Ack);
        PingFrame { opaque_data, flags }
    }

    pub fn is_ack(&self) -> bool {
        self.flags.is_set(PingFlag::Ack)
    }
}

impl Frame for PingFrame {
    type FlagType = PingFlag;

    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<Self> {
        let FrameHeader {
            payload_len,
            flags,
            stream_id,
            ..
        } = raw_frame.header();
        if payload_len != 8 {
            return Err(ParseFrameError::IncorrectPingLength(payload_len));
        }
        if stream_id != 0 {
            return Err(ParseFrameError::StreamIdMustBeZero(stream_id));
        }

        let mut payload = &raw_frame.payload()[..];
        let opaque_data = payload.get_u64();

        Ok(PingFrame {
            opaque_data,
            flags: Flags::new(flags),
        })
    }

    fn flags(&self) -> Flags<PingFlag> {
        self.flags
    }

    fn get_stream_id(&self) -> StreamId {
        0
    }

    fn get_header(&self) -> FrameHeader {
        FrameHeader {
            payload_len: 8,
            frame_type: PING_FRAME_TYPE,
            flags: self.flags.0,
            stream_id: 0,
        }
    }
}

impl FrameIR for PingFrame {
    fn serialize_into(self, builder: &mut WriteBuffer) {
        builder.extend_from_slice(&pack_header(&self.get_header()));
        builder.extend_from_slice(&self.opaque_data.to_be_bytes());
    }
}
