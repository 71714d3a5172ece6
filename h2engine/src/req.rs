use std::net::SocketAddr;

use crate::headers::Headers;
use crate::wire::stream_id::StreamId;

/// A request object provided to the stream handler once the client's
/// header block is complete.
#[derive(Debug, Clone)]
pub struct ServerRequest {
    /// Address of the remote peer of the connection.
    pub peer_addr: SocketAddr,
    /// The stream carrying the request.
    pub stream_id: StreamId,
    /// Always `"HTTP/2"`.
    pub version: &'static str,
    /// Request method, from `:method`.
    pub method: String,
    /// `http` or `https`, from `:scheme`.
    pub scheme: String,
    /// Host part of `:authority`.
    pub host: String,
    /// Port part of `:authority`, or the scheme default.
    pub port: u16,
    /// Path part of `:path`.
    pub path: String,
    /// Query string part of `:path`, empty when absent.
    pub query: String,
    /// Regular headers, pseudo-headers stripped, duplicates joined.
    pub headers: Headers,
    /// False iff the request carried END_STREAM on its headers.
    pub has_body: bool,
    /// Declared body length: `Some(0)` for bodiless requests, the parsed
    /// `content-length` when present, `None` when unknown.
    pub body_length: Option<u64>,
}
