use std::fmt;
use std::io;

use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;

/// TCP stream or socket stream; basically any async stream useable in
/// http2. TLS termination happens before the engine sees the stream, so a
/// negotiated TLS stream qualifies as well.
pub trait SocketStream: AsyncRead + AsyncWrite + fmt::Debug + Send + Unpin + 'static {
    fn is_tcp(&self) -> bool;

    fn set_nodelay(&self, no_delay: bool) -> io::Result<()>;
}

impl SocketStream for tokio::net::TcpStream {
    fn is_tcp(&self) -> bool {
        true
    }

    fn set_nodelay(&self, no_delay: bool) -> io::Result<()> {
        tokio::net::TcpStream::set_nodelay(self, no_delay)
    }
}
