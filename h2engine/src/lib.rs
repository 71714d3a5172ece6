//! Connection-level engine of an HTTP/2 server.
//!
//! Given an accepted, already-negotiated transport connection (plain TCP
//! or TLS with ALPN complete), [`ServerConn`] drives RFC 7540 framing and
//! HPACK, multiplexes the streams, and brokers request/response traffic
//! between the peer and a pluggable [`StreamHandler`].
//!
//! Each connection is one task: handlers run synchronously on it and
//! express everything they want done as [`Command`] sequences.

#[macro_use]
extern crate log;

pub use command::ChildTask;
pub use command::Command;
pub use command::Commands;
pub use conf::ServerConf;
pub use conn::ConnStateSnapshot;
pub use conn::LocalState;
pub use conn::RemoteState;
pub use conn::ServerConn;
pub use conn::StreamSnapshot;
pub use error::Error;
pub use handler::DataFin;
pub use handler::InfoMessage;
pub use handler::StreamHandler;
pub use handler::TerminateReason;
pub use headers::Header;
pub use headers::Headers;
pub use net::socket::SocketStream;
pub use req::ServerRequest;
pub use result::Result;
pub use wire::end_stream::EndStream;
pub use wire::error_code::ErrorCode;
pub use wire::stream_id::StreamId;

mod codec;
mod command;
mod conf;
mod conn;
mod error;
mod handler;
mod headers;
mod hpack;
mod misc;
mod net;
mod req;
mod result;
mod wire;

/// Internals re-exported for the test crates.
#[doc(hidden)]
pub mod for_test {
    pub use crate::wire::DEFAULT_SETTINGS;
    pub use crate::wire::PREFACE;

    pub mod wire {
        pub use crate::wire::*;
    }
    pub mod hpack {
        pub use crate::hpack::*;
    }
    pub mod codec {
        pub use crate::codec::write_buffer::WriteBuffer;
    }
}
