use bytes::Bytes;

use crate::codec::write_buffer::WriteBuffer;
use crate::misc::BsDebug;
use crate::wire::end_stream::EndStream;
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

pub const DATA_FRAME_TYPE: u8 = 0x0;

/// Flags of the `DATA` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFlag {
    EndStream,
    Padded,
}

impl Flag for DataFlag {
    fn bitmask(&self) -> u8 {
        match self {
            DataFlag::EndStream => 0x1,
            DataFlag::Padded => 0x8,
        }
    }

    fn flags() -> &'static [DataFlag] {
        &[DataFlag::EndStream, DataFlag::Padded]
    }
}

/// `DATA` frame. Padding is stripped on parse and never emitted.
#[derive(Clone, PartialEq, Eq)]
pub struct DataFrame {
    pub stream_id: StreamId,
    pub data: Bytes,
    pub flags: Flags<DataFlag>,
}

impl DataFrame {
    pub fn new(stream_id: StreamId) -> DataFrame {
        DataFrame {
            stream_id,
            data: Bytes::new(),
            flags: Flags::new(0),
        }
    }

    pub fn with_data(stream_id: StreamId, data: Bytes) -> DataFrame {
        DataFrame {
            stream_id,
            data,
            flags: Flags::new(0),
        }
    }

    pub fn set_flag(&mut self, flag: DataFlag) {
        self.flags.set(flag);
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.flags.is_set(DataFlag::EndStream)
    }

    pub fn payload_len(&self) -> u32 {
        self.data.len() as u32
    }
}

impl Frame for DataFrame {
    type FlagType = DataFlag;

    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<Self> {
        let FrameHeader {
            flags, stream_id, ..
        } = raw_frame.header();
        if stream_id == 0 {
            return Err(ParseFrameError::StreamIdMustBeNonZero);
        }

        let flags = Flags::<DataFlag>::new(flags);
        let data = if flags.is_set(DataFlag::Padded) {
            strip_padding(raw_frame.payload())?
        } else {
            raw_frame.payload()
        };

        Ok(DataFrame {
            stream_id,
            data,
            flags,
        })
    }

    fn flags(&self) -> Flags<DataFlag> {
        self.flags
    }

    fn get_stream_id(&self) -> StreamId {
        self.stream_id
    }

    fn get_header(&self) -> FrameHeader {
        // Padded flag never survives to serialization
        FrameHeader {
            payload_len: self.payload_len(),
            frame_type: DATA_FRAME_TYPE,
            flags: self.flags.0 & DataFlag::EndStream.bitmask(),
            stream_id: self.stream_id,
        }
    }
}

impl FrameIR for DataFrame {
    fn serialize_into(self, builder: &mut WriteBuffer) {
        builder.extend_from_slice(&pack_header(&self.get_header()));
        builder.extend_from_bytes(self.data);
    }
}

impl std::fmt::Debug for DataFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("DataFrame")
            .field("stream_id", &self.stream_id)
            .field("flags", &self.flags)
            .field("data", &BsDebug(&self.data))
            .finish()
    }
}

/// Split a payload into a sequence of `DATA` frames, each at most
/// `max_frame_size` long. Exactly one frame carries `END_STREAM` iff
/// `end_stream` is requested; an empty payload with `END_STREAM` produces
/// one empty frame.
pub fn split_data(
    stream_id: StreamId,
    data: Bytes,
    end_stream: EndStream,
    max_frame_size: u32,
) -> Vec<DataFrame> {
    let max_frame_size = max_frame_size as usize;
    let mut frames = Vec::new();

    if data.is_empty() {
        if end_stream == EndStream::Yes {
            let mut frame = DataFrame::new(stream_id);
            frame.set_flag(DataFlag::EndStream);
            frames.push(frame);
        }
        return frames;
    }

    let mut pos = 0;
    while pos < data.len() {
        let end = std::cmp::min(data.len(), pos + max_frame_size);
        let mut frame = DataFrame::with_data(stream_id, data.slice(pos..end));
        if end == data.len() && end_stream == EndStream::Yes {
            frame.set_flag(DataFlag::EndStream);
        }
        frames.push(frame);
        pos = end;
    }

    frames
}
