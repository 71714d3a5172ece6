use bytes::Buf;
use bytes::Bytes;
use bytes::BytesMut;

/// Outbound byte buffer frames are serialized into. Implements [`Buf`] so
/// it can be handed to vectored socket writes directly.
#[derive(Default)]
pub struct WriteBuffer {
    buf: BytesMut,
}

impl WriteBuffer {
    pub fn new() -> WriteBuffer {
        Default::default()
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn extend_from_bytes(&mut self, bytes: Bytes) {
        self.buf.extend_from_slice(&bytes);
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

impl Buf for WriteBuffer {
    fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn chunk(&self) -> &[u8] {
        self.buf.chunk()
    }

    fn advance(&mut self, cnt: usize) {
        self.buf.advance(cnt)
    }
}
