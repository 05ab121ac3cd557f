use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_channel::mpsc;
use futures_util::future::poll_fn;
use futures_util::ready;
use futures_util::stream::Stream;

use crate::Error;

/// Asynchronous producer of response body bytes.
///
/// `poll_read` yields `Some(buf)` (possibly empty, a no-op), `None` at the
/// end of the stream, or an error. A `Pending` return registers the
/// caller's waker. Reads carry no timeout; an application body may stall
/// arbitrarily.
///
/// `close` is idempotent and non-blocking. The emission engine calls it
/// exactly once per emission, on every exit path. It may be called after a
/// `Pending` poll (that is how a pending read is canceled); the source is
/// never polled again afterwards.
pub trait ByteSource {
    fn poll_read(&mut self, cx: &mut Context) -> Poll<Result<Option<Vec<u8>>, Error>>;

    fn close(&mut self);
}

/// Body source over in-memory chunks.
pub struct BufferSource {
    chunks: VecDeque<Vec<u8>>,
}

impl BufferSource {
    pub fn new(data: Vec<u8>) -> Self {
        let mut chunks = VecDeque::new();
        if !data.is_empty() {
            chunks.push_back(data);
        }
        BufferSource { chunks }
    }

    pub fn empty() -> Self {
        BufferSource {
            chunks: VecDeque::new(),
        }
    }

    pub fn from_chunks(chunks: Vec<Vec<u8>>) -> Self {
        BufferSource {
            chunks: chunks.into(),
        }
    }
}

impl ByteSource for BufferSource {
    fn poll_read(&mut self, _cx: &mut Context) -> Poll<Result<Option<Vec<u8>>, Error>> {
        Ok(self.chunks.pop_front()).into()
    }

    fn close(&mut self) {
        self.chunks.clear();
    }
}

/// Create a channel-backed body: the sender half feeds chunks from
/// application code, the receiver half is the `ByteSource` handed to the
/// emission engine. The channel is bounded to get backpressure.
///
/// Dropping the sender (or calling [`BodySender::end`]) marks the end of
/// the body.
pub fn body_channel(bound: usize) -> (BodySender, ChannelSource) {
    let (tx, rx) = mpsc::channel(bound);
    (BodySender { tx }, ChannelSource { rx })
}

/// Feeds body chunks into a [`ChannelSource`].
pub struct BodySender {
    tx: mpsc::Sender<Result<Vec<u8>, Error>>,
}

impl BodySender {
    /// Poll for room in the channel.
    pub fn poll_ready(&mut self, cx: &mut Context) -> Poll<Result<(), Error>> {
        ready!(self.tx.poll_ready(cx)).map_err(|_| closed())?;
        Ok(()).into()
    }

    /// Wait until a previously sent chunk has been taken by the emission
    /// side. Forms the flow control for large bodies.
    pub async fn ready(&mut self) -> Result<(), Error> {
        poll_fn(|cx| self.poll_ready(cx)).await
    }

    /// Queue a body chunk without waiting. To avoid hoarding memory, call
    /// `ready()` between sends.
    pub fn send_data(&mut self, data: Vec<u8>) -> Result<(), Error> {
        self.tx.start_send(Ok(data)).map_err(|_| closed())
    }

    /// Fail the body. The emission surfaces this as a body error.
    pub fn send_error(&mut self, error: Error) -> Result<(), Error> {
        self.tx.start_send(Err(error)).map_err(|_| closed())
    }

    /// Mark the end of the body.
    pub fn end(mut self) {
        self.tx.close_channel();
    }
}

fn closed() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::ConnectionAborted,
        "body consumer is gone",
    ))
}

/// `ByteSource` receiving its chunks from a [`BodySender`].
pub struct ChannelSource {
    rx: mpsc::Receiver<Result<Vec<u8>, Error>>,
}

impl ByteSource for ChannelSource {
    fn poll_read(&mut self, cx: &mut Context) -> Poll<Result<Option<Vec<u8>>, Error>> {
        match ready!(Pin::new(&mut self.rx).poll_next(cx)) {
            // all senders gone, the body is complete
            None => Ok(None).into(),
            Some(Ok(chunk)) => Ok(Some(chunk)).into(),
            Some(Err(e)) => Err(e).into(),
        }
    }

    fn close(&mut self) {
        self.rx.close();
    }
}
