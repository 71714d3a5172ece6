use std::io;

use crate::hpack::DecoderError;
use crate::wire::error_code::ErrorCode;
use crate::wire::frame::ParseFrameError;
use crate::wire::frame::RawHttpFrameType;
use crate::wire::stream_id::StreamId;

/// An enum representing errors that can arise when driving an HTTP/2
/// connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    IoError(#[source] io::Error),
    #[error("HTTP/2 error code: {0}")]
    CodeError(ErrorCode),
    #[error("failed to parse frame: {0}")]
    ParseFrameError(ParseFrameError),
    #[error("failed to decode header block: {0}")]
    CompressionError(DecoderError),
    #[error("invalid connection preface")]
    InvalidPreface,
    #[error("expecting SETTINGS after preface, got {0}")]
    ExpectedSettingsAfterPreface(RawHttpFrameType),
    #[error("expecting CONTINUATION frame, got {0}")]
    ExpectingContinuationGot(RawHttpFrameType),
    #[error("CONTINUATION frame without preceding HEADERS")]
    ContinuationFrameWithoutHeaders,
    #[error("expecting CONTINUATION for stream {0}, got stream {1}")]
    ExpectingContinuationGotDifferentStreamId(StreamId, StreamId),
    #[error("client initiated stream with server id {0}")]
    InitiatedStreamWithServerIdFromClient(StreamId),
    #[error("stream id {0} not greater than existing stream id {1}")]
    StreamIdLeExistingStream(StreamId, StreamId),
    #[error("got SETTINGS ack without SETTINGS sent")]
    SettingsAckWithoutSettingsSent,
    #[error("received PUSH_PROMISE, a server never accepts push")]
    UnexpectedPushPromise,
    #[error("timed out waiting for connection preface")]
    PrefaceTimeout,
    #[error("timed out waiting for SETTINGS ack")]
    SettingsAckTimeout,
    #[error("connection idle timeout")]
    IdleTimeout,
    #[error("EOF from stream")]
    EofFromStream,
    #[error("connection died")]
    ConnDied,
    #[error("request handler failed: {0}")]
    HandlerError(String),
    #[error("user error: {0}")]
    User(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

impl From<ParseFrameError> for Error {
    fn from(e: ParseFrameError) -> Self {
        Error::ParseFrameError(e)
    }
}

impl From<DecoderError> for Error {
    fn from(e: DecoderError) -> Self {
        Error::CompressionError(e)
    }
}
