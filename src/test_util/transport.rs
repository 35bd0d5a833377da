use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};


/// A transport that delivers `data` and then fails every further read with `error_kind`, like a
///  connection that is reset by the peer in the middle of a session.
#[derive(Debug)]
pub struct BrokenTransport {
    data: Vec<u8>,
    pos: usize,
    error_kind: io::ErrorKind,
}

impl BrokenTransport {
    pub fn new(data: Vec<u8>, error_kind: io::ErrorKind) -> BrokenTransport {
        BrokenTransport {
            data,
            pos: 0,
            error_kind,
        }
    }
}

impl AsyncRead for BrokenTransport {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        if self.pos == self.data.len() {
            return Poll::Ready(Err(io::Error::new(self.error_kind, "connection broken")));
        }

        let n = buf.remaining().min(self.data.len() - self.pos);
        let start = self.pos;
        buf.put_slice(&self.data[start..start + n]);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}
