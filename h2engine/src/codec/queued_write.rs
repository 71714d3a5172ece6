use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use bytes::Buf;
use tokio::io::AsyncWrite;

use crate::codec::write_buffer::WriteBuffer;
use crate::result;
use crate::wire::frame::FrameIR;
use crate::wire::frame::GoawayFrame;

/// Outbound frame queue in front of the socket.
///
/// Once a GOAWAY is queued no further frame is accepted; the connection is
/// on its way down and only the GOAWAY itself should reach the peer.
pub struct QueuedWrite<W: AsyncWrite + Unpin> {
    write: W,
    buf: WriteBuffer,
    goaway_queued: bool,
}

impl<W: AsyncWrite + Unpin> QueuedWrite<W> {
    pub fn new(write: W) -> QueuedWrite<W> {
        QueuedWrite {
            write,
            buf: WriteBuffer::new(),
            goaway_queued: false,
        }
    }

    pub fn queue_not_goaway<F: FrameIR>(&mut self, frame: F) {
        if self.goaway_queued {
            return;
        }

        debug!("send {:?}", frame);

        frame.serialize_into(&mut self.buf);
    }

    pub fn queue_goaway(&mut self, frame: GoawayFrame) {
        if self.goaway_queued {
            return;
        }
        self.goaway_queued = true;

        debug!("send {:?}", frame);

        frame.serialize_into(&mut self.buf);
    }

    pub fn poll_flush(&mut self, cx: &mut Context<'_>) -> Poll<result::Result<()>> {
        loop {
            if !self.buf.has_remaining() {
                return Poll::Ready(Ok(()));
            }

            if let Poll::Pending =
                tokio_util::io::poll_write_buf(Pin::new(&mut self.write), cx, &mut self.buf)?
            {
                return Poll::Pending;
            }
        }
    }
}
