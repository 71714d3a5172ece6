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
use crate::wire::DEFAULT_SETTINGS;

pub const SETTINGS_FRAME_TYPE: u8 = 0x4;

/// Flags of the `SETTINGS` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFlag {
    Ack,
}

impl Flag for SettingsFlag {
    fn bitmask(&self) -> u8 {
        match self {
            SettingsFlag::Ack => 0x1,
        }
    }

    fn flags() -> &'static [SettingsFlag] {
        &[SettingsFlag::Ack]
    }
}

/// One setting carried in a `SETTINGS` frame, RFC 7540 section 6.5.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpSetting {
    HeaderTableSize(u32),
    EnablePush(bool),
    MaxConcurrentStreams(u32),
    InitialWindowSize(u32),
    MaxFrameSize(u32),
    MaxHeaderListSize(u32),
}

impl HttpSetting {
    fn from_id(id: u16, value: u32) -> ParseFrameResult<Option<HttpSetting>> {
        Ok(Some(match id {
            0x1 => HttpSetting::HeaderTableSize(value),
            0x2 => match value {
                0 => HttpSetting::EnablePush(false),
                1 => HttpSetting::EnablePush(true),
                _ => return Err(ParseFrameError::InvalidEnablePushValue(value)),
            },
            0x3 => HttpSetting::MaxConcurrentStreams(value),
            0x4 => {
                if value > 0x7fff_ffff {
                    return Err(ParseFrameError::WindowSizeTooLarge(value));
                }
                HttpSetting::InitialWindowSize(value)
            }
            0x5 => {
                if !(16_384..=16_777_215).contains(&value) {
                    return Err(ParseFrameError::InvalidMaxFrameSizeValue(value));
                }
                HttpSetting::MaxFrameSize(value)
            }
            0x6 => HttpSetting::MaxHeaderListSize(value),
            // 6.5.2: unknown or unsupported identifiers must be ignored
            _ => return Ok(None),
        }))
    }

    fn id(&self) -> u16 {
        match self {
            HttpSetting::HeaderTableSize(..) => 0x1,
            HttpSetting::EnablePush(..) => 0x2,
            HttpSetting::MaxConcurrentStreams(..) => 0x3,
            HttpSetting::InitialWindowSize(..) => 0x4,
            HttpSetting::MaxFrameSize(..) => 0x5,
            HttpSetting::MaxHeaderListSize(..) => 0x6,
        }
    }

    fn value(&self) -> u32 {
        match *self {
            HttpSetting::HeaderTableSize(v) => v,
            HttpSetting::EnablePush(v) => v as u32,
            HttpSetting::MaxConcurrentStreams(v) => v,
            HttpSetting::InitialWindowSize(v) => v,
            HttpSetting::MaxFrameSize(v) => v,
            HttpSetting::MaxHeaderListSize(v) => v,
        }
    }
}

/// The full settings state of one side of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    pub header_table_size: u32,
    pub enable_push: bool,
    pub max_concurrent_streams: u32,
    pub initial_window_size: u32,
    pub max_frame_size: u32,
    pub max_header_list_size: u32,
}

impl HttpSettings {
    pub fn apply(&mut self, setting: HttpSetting) {
        match setting {
            HttpSetting::HeaderTableSize(v) => self.header_table_size = v,
            HttpSetting::EnablePush(v) => self.enable_push = v,
            HttpSetting::MaxConcurrentStreams(v) => self.max_concurrent_streams = v,
            HttpSetting::InitialWindowSize(v) => self.initial_window_size = v,
            HttpSetting::MaxFrameSize(v) => self.max_frame_size = v,
            HttpSetting::MaxHeaderListSize(v) => self.max_header_list_size = v,
        }
    }

    pub fn apply_from_frame(&mut self, frame: &SettingsFrame) {
        for setting in &frame.settings {
            self.apply(*setting);
        }
    }

    /// The settings of `self` that differ from the defaults, in frame form.
    pub fn diff_from_default(&self) -> Vec<HttpSetting> {
        let mut settings = Vec::new();
        if self.header_table_size != DEFAULT_SETTINGS.header_table_size {
            settings.push(HttpSetting::HeaderTableSize(self.header_table_size));
        }
        if self.enable_push != DEFAULT_SETTINGS.enable_push {
            settings.push(HttpSetting::EnablePush(self.enable_push));
        }
        if self.max_concurrent_streams != DEFAULT_SETTINGS.max_concurrent_streams {
            settings.push(HttpSetting::MaxConcurrentStreams(self.max_concurrent_streams));
        }
        if self.initial_window_size != DEFAULT_SETTINGS.initial_window_size {
            settings.push(HttpSetting::InitialWindowSize(self.initial_window_size));
        }
        if self.max_frame_size != DEFAULT_SETTINGS.max_frame_size {
            settings.push(HttpSetting::MaxFrameSize(self.max_frame_size));
        }
        if self.max_header_list_size != DEFAULT_SETTINGS.max_header_list_size {
            settings.push(HttpSetting::MaxHeaderListSize(self.max_header_list_size));
        }
        settings
    }
}

/// `SETTINGS` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsFrame {
    pub settings: Vec<HttpSetting>,
    pub flags: Flags<SettingsFlag>,
}

impl SettingsFrame {
    /// A non-ack frame carrying no settings.
    pub fn new() -> SettingsFrame {
        SettingsFrame {
            settings: Vec::new(),
            flags: Flags::new(0),
        }
    }

    pub fn new_ack() -> SettingsFrame {
        let mut flags = Flags::new(0);
        flags.set(SettingsFlag::Ack);
        SettingsFrame {
            settings: Vec::new(),
            flags,
        }
    }

    pub fn from_settings(settings: Vec<HttpSetting>) -> SettingsFrame {
        SettingsFrame {
            settings,
            flags: Flags::new(0),
        }
    }

    pub fn is_ack(&self) -> bool {
        self.flags.is_set(SettingsFlag::Ack)
    }
}

impl Default for SettingsFrame {
    fn default() -> Self {
        SettingsFrame::new()
    }
}

impl Frame for SettingsFrame {
    type FlagType = SettingsFlag;

    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<Self> {
        let FrameHeader {
            payload_len,
            flags,
            stream_id,
            ..
        } = raw_frame.header();
        if stream_id != 0 {
            return Err(ParseFrameError::StreamIdMustBeZero(stream_id));
        }

        let flags = Flags::<SettingsFlag>::new(flags);

        if flags.is_set(SettingsFlag::Ack) {
            if payload_len != 0 {
                return Err(ParseFrameError::IncorrectFrameLength(payload_len));
            }
            return Ok(SettingsFrame {
                settings: Vec::new(),
                flags,
            });
        }

        if payload_len % 6 != 0 {
            return Err(ParseFrameError::IncorrectSettingsLength(payload_len));
        }

        let mut payload = &raw_frame.payload()[..];
        let mut settings = Vec::with_capacity(payload.len() / 6);
        while payload.has_remaining() {
            let id = payload.get_u16();
            let value = payload.get_u32();
            if let Some(setting) = HttpSetting::from_id(id, value)? {
                settings.push(setting);
            }
        }

        Ok(SettingsFrame { settings, flags })
    }

    fn flags(&self) -> Flags<SettingsFlag> {
        self.flags
    }

    fn get_stream_id(&self) -> StreamId {
        0
    }

    fn get_header(&self) -> FrameHeader {
        FrameHeader {
            payload_len: (self.settings.len() * 6) as u32,
            frame_type: SETTINGS_FRAME_TYPE,
            flags: self.flags.0,
            stream_id: 0,
        }
    }
}

impl FrameIR for SettingsFrame {
    fn serialize_into(self, builder: &mut WriteBuffer) {
        builder.extend_from_slice(&pack_header(&self.get_header()));
        for setting in &self.settings {
            builder.extend_from_slice(&setting.id().to_be_bytes());
            builder.extend_from_slice(&setting.value().to_be_bytes());
        }
    }
}
