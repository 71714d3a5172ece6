//! The framing layer of HTTP/2: frame types, their binary encoding,
//! and the incremental parser consumed by the connection engine.

use crate::wire::frame::HttpSettings;

pub(crate) mod end_stream;
pub(crate) mod error_code;
pub mod frame;
pub(crate) mod stream_id;

/// Default settings.
// 6.5.2 Defined SETTINGS Parameters
pub const DEFAULT_SETTINGS: HttpSettings = HttpSettings {
    header_table_size: 4_096,
    enable_push: true,
    max_concurrent_streams: u32::MAX,
    initial_window_size: 65_535,
    max_frame_size: 16_384,
    max_header_list_size: u32::MAX,
};

/// The client connection preface, RFC 7540 section 3.5.
pub const PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";
