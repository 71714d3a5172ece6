//! Commands are the only way a stream handler affects the connection:
//! the handler returns a sequence of them and the engine executes the
//! sequence in order against the wire.

use std::path::PathBuf;

use bytes::Bytes;
use tokio::task::JoinHandle;

use crate::headers::Headers;
use crate::wire::end_stream::EndStream;

/// A worker task registered against a stream. The task is aborted when
/// its stream terminates, or with every other child when the connection
/// goes down.
#[derive(Debug)]
pub struct ChildTask {
    pub handle: JoinHandle<()>,
}

impl ChildTask {
    pub fn new(handle: JoinHandle<()>) -> ChildTask {
        ChildTask { handle }
    }
}

/// One directive from the stream handler.
#[derive(Debug)]
pub enum Command {
    /// Full response: HEADERS, then the body if any. Only honoured while
    /// nothing has been sent on the stream yet.
    Response {
        status: u16,
        headers: Headers,
        body: Bytes,
    },
    /// Same as [`Command::Response`], but silently dropped when a
    /// response is already under way. Used by handlers reporting
    /// failures without knowing how far the stream got.
    ErrorResponse {
        status: u16,
        headers: Headers,
        body: Bytes,
    },
    /// Start a streamed response: HEADERS without END_STREAM.
    Headers { status: u16, headers: Headers },
    /// Body data for a streamed response, split into DATA frames of at
    /// most the peer's max frame size.
    Data { end_stream: EndStream, data: Bytes },
    /// Stream a region of a file as DATA frames.
    SendFile {
        end_stream: EndStream,
        offset: u64,
        count: u64,
        path: PathBuf,
    },
    /// Promise a server-initiated response: emits PUSH_PROMISE and runs
    /// the handler for the synthesised request on a fresh even stream.
    Push {
        method: String,
        scheme: String,
        host: String,
        port: u16,
        path: String,
        query: String,
        headers: Headers,
    },
    /// Grant the peer `n` more bytes of body credit. Reserved for flow
    /// control; accepted and ignored while outbound windows are treated
    /// as unbounded.
    Flow(u32),
    /// Register a worker task against this stream.
    Spawn(ChildTask),
    /// Abort: discard the remaining commands and reset the stream.
    InternalError(String),
    /// Not supported under HTTP/2; discarded.
    SwitchProtocol(String),
    /// Finish the stream gracefully and discard the remaining commands.
    Stop,
}

pub type Commands = Vec<Command>;
