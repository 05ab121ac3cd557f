use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::AsyncWrite;

/// One element of a connection's outbound queue: payload bytes, or one of
/// the two stream terminators appended behind the last response.
#[derive(Debug)]
pub enum WriteChunk {
    Data(Vec<u8>),
    /// TLS close_notify. Acts as a flush barrier on plain TCP transports.
    CloseNotify,
    /// TCP FIN: shut the write side down once everything before it is out.
    Fin,
}

/// The write side of a client connection as the emission engine sees it.
///
/// Chunks are delivered in FIFO order. The queue size counts payload
/// bytes only; the terminator sentinels are zero length.
pub trait Connection {
    /// Append a chunk to the write queue and return the queued byte count
    /// after the append. The connection owns the buffer and releases it
    /// once written.
    fn queue_write(&mut self, chunk: WriteChunk) -> u64;

    /// Write as much of the queue as the sink accepts without blocking.
    /// Returns the number of bytes written by this call; `Pending` from
    /// the sink is not an error, it just leaves bytes queued.
    fn write(&mut self, cx: &mut Context) -> io::Result<u64>;

    /// Resolves when the sink can make progress again.
    fn poll_writable(&mut self, cx: &mut Context) -> Poll<io::Result<()>>;

    /// Payload bytes currently queued.
    fn write_queue_size(&self) -> u64;
}

/// [`Connection`] over any `futures_io::AsyncWrite`.
///
/// `CloseNotify` maps to a flush (a TLS stream sends close_notify from its
/// own close; a plain stream has nothing to say), `Fin` to closing the
/// write side.
pub struct StreamConnection<S> {
    io: S,
    queue: VecDeque<WriteChunk>,
    /// Write offset into the front `Data` chunk.
    pos: usize,
    queued: u64,
    closed: bool,
}

impl<S: AsyncWrite + Unpin> StreamConnection<S> {
    pub fn new(io: S) -> Self {
        StreamConnection {
            io,
            queue: VecDeque::new(),
            pos: 0,
            queued: 0,
            closed: false,
        }
    }

    /// Whether the FIN marker has been carried out.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn into_inner(self) -> S {
        self.io
    }
}

enum Front {
    Wrote(usize, usize),
    Done,
}

impl<S: AsyncWrite + Unpin> Connection for StreamConnection<S> {
    fn queue_write(&mut self, chunk: WriteChunk) -> u64 {
        if let WriteChunk::Data(data) = &chunk {
            self.queued += data.len() as u64;
        }
        self.queue.push_back(chunk);
        self.queued
    }

    fn write(&mut self, cx: &mut Context) -> io::Result<u64> {
        let mut written = 0_u64;

        loop {
            let front = match self.queue.front() {
                None => return Ok(written),

                Some(WriteChunk::Data(data)) => {
                    if self.pos == data.len() {
                        // empty or exhausted chunk
                        Front::Done
                    } else {
                        match Pin::new(&mut self.io).poll_write(cx, &data[self.pos..]) {
                            Poll::Pending => {
                                trace!("write: Poll::Pending, queued: {}", self.queued);
                                return Ok(written);
                            }
                            Poll::Ready(Ok(0)) => {
                                return Err(io::Error::new(
                                    io::ErrorKind::WriteZero,
                                    "write zero bytes",
                                ));
                            }
                            Poll::Ready(Ok(amount)) => Front::Wrote(amount, data.len()),
                            Poll::Ready(Err(e)) => return Err(e),
                        }
                    }
                }

                Some(WriteChunk::CloseNotify) => match Pin::new(&mut self.io).poll_flush(cx) {
                    Poll::Pending => return Ok(written),
                    Poll::Ready(Ok(())) => Front::Done,
                    Poll::Ready(Err(e)) => return Err(e),
                },

                Some(WriteChunk::Fin) => match Pin::new(&mut self.io).poll_close(cx) {
                    Poll::Pending => return Ok(written),
                    Poll::Ready(Ok(())) => {
                        self.closed = true;
                        Front::Done
                    }
                    Poll::Ready(Err(e)) => return Err(e),
                },
            };

            match front {
                Front::Wrote(amount, chunk_len) => {
                    self.pos += amount;
                    self.queued -= amount as u64;
                    written += amount as u64;
                    if self.pos == chunk_len {
                        self.pos = 0;
                        self.queue.pop_front();
                    }
                }
                Front::Done => {
                    self.pos = 0;
                    self.queue.pop_front();
                }
            }
        }
    }

    fn poll_writable(&mut self, cx: &mut Context) -> Poll<io::Result<()>> {
        if self.queue.is_empty() {
            return Ok(()).into();
        }

        // There is no readiness probe on an AsyncWrite; making progress is
        // the probe. Any byte accepted or sentinel carried out counts.
        let before = self.queue.len();
        let written = self.write(cx)?;

        if written > 0 || self.queue.len() < before {
            Ok(()).into()
        } else {
            Poll::Pending
        }
    }

    fn write_queue_size(&self) -> u64 {
        self.queued
    }
}
