/// Whether the frame (or the piece of response) is the last one in its
/// direction of the stream, i. e. whether it carries the `END_STREAM` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndStream {
    /// Yes, end of stream
    Yes,
    /// No, not end of stream
    No,
}

impl EndStream {
    pub fn from_bool(end: bool) -> EndStream {
        match end {
            true => EndStream::Yes,
            false => EndStream::No,
        }
    }
}
