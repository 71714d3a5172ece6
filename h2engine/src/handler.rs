use std::any::Any;

use bytes::Bytes;

use crate::command::Commands;
use crate::req::ServerRequest;
use crate::wire::error_code::ErrorCode;
use crate::wire::stream_id::StreamId;

/// An out-of-band message delivered to a stream through
/// [`crate::ServerConn::stream_message`]; typically sent by a worker task
/// registered with `Command::Spawn`.
pub type InfoMessage = Box<dyn Any + Send>;

/// Whether the received body chunk was the last one. The total body
/// length is only known once the stream is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFin {
    Nofin,
    Fin { body_length: u64 },
}

/// Why a stream was taken down.
#[derive(Debug, Clone)]
pub enum TerminateReason {
    /// Graceful completion.
    Normal,
    /// Reset, either by the peer (RST_STREAM) or by the engine.
    StreamError(ErrorCode),
    /// Handler fault or executor fault.
    InternalError(String),
    /// The whole connection failed with the given code.
    ConnectionError(ErrorCode),
    /// The transport died.
    SocketError,
    /// The peer asked for connection shutdown (GOAWAY).
    Stop,
}

/// Server request callback.
///
/// One value serves the whole connection; per-stream state lives in
/// `State`. All calls for one connection happen on the connection task,
/// in program order, and must not block: long work goes to worker tasks
/// registered via `Command::Spawn`.
///
/// An `Err` return or a panic resets the stream with `INTERNAL_ERROR`
/// and is otherwise contained.
pub trait StreamHandler: Send + Sync + 'static {
    type State: Send + 'static;

    /// A request has arrived: headers are complete, the body (if any)
    /// follows through [`StreamHandler::data`].
    fn init(
        &self,
        stream_id: StreamId,
        req: ServerRequest,
    ) -> crate::Result<(Commands, Self::State)>;

    /// A chunk of request body.
    fn data(
        &self,
        stream_id: StreamId,
        fin: DataFin,
        data: Bytes,
        state: &mut Self::State,
    ) -> crate::Result<Commands>;

    /// An out-of-band message addressed to this stream.
    fn info(
        &self,
        stream_id: StreamId,
        message: InfoMessage,
        state: &mut Self::State,
    ) -> crate::Result<Commands>;

    /// The stream is gone. Called exactly once per stream that was
    /// initialised, whatever the cause. `state` is `None` when `init`
    /// itself failed.
    fn terminate(&self, stream_id: StreamId, reason: &TerminateReason, state: Option<Self::State>);
}
