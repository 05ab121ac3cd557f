#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::task::{Context, Poll};

use brook_h1::{ByteSource, Connection, Error, WriteChunk};

pub fn setup_logger() {
    static START: Once = Once::new();
    START.call_once(|| {
        let test_log = std::env::var("TEST_LOG")
            .map(|x| x != "0" && x.to_lowercase() != "false")
            .unwrap_or(false);
        let level = if test_log {
            log::LevelFilter::Trace
        } else {
            log::LevelFilter::Info
        };
        pretty_env_logger::formatted_builder()
            .filter_level(log::LevelFilter::Warn)
            .filter_module("brook_h1", level)
            .target(env_logger::Target::Stdout)
            .init();
    });
}

/// Poll a state machine exactly once.
pub async fn poll_once<T>(mut f: impl FnMut(&mut Context) -> Poll<T>) -> Poll<T> {
    futures_util::future::poll_fn(|cx| Poll::Ready(f(cx))).await
}

/// A head for tests that drive `Emission` directly.
pub fn simple_head(content_length: Option<u64>) -> Vec<u8> {
    match content_length {
        Some(len) => format!("HTTP/1.1 200 OK\r\ncontent-length: {}\r\n\r\n", len).into_bytes(),
        None => b"HTTP/1.1 200 OK\r\n\r\n".to_vec(),
    }
}

/// What actually reached the wire, in order. Contiguous payload bytes are
/// coalesced into one `Data` event.
#[derive(Debug, PartialEq)]
pub enum WireEvent {
    Data(Vec<u8>),
    CloseNotify,
    Fin,
}

/// Scripted connection. Accepts a limited number of bytes per `write()`
/// call, answers `poll_writable` from a script, and records everything
/// that reaches the wire.
pub struct MockConn {
    queue: VecDeque<WriteChunk>,
    pos: usize,
    queued: u64,
    /// Max bytes accepted per `write()` call. None = unlimited.
    pub accept_per_write: Option<usize>,
    /// Per-call `poll_writable` results; when exhausted,
    /// `writable_default` applies.
    pub writable: VecDeque<bool>,
    pub writable_default: bool,
    /// Wake the task when `poll_writable` stalls, so `.await`-driven tests
    /// make progress.
    pub wake_on_stall: bool,
    /// Fail the next `write()` call with this error.
    pub fail_write: Option<io::Error>,
    pub events: Vec<WireEvent>,
}

impl MockConn {
    pub fn new() -> MockConn {
        MockConn {
            queue: VecDeque::new(),
            pos: 0,
            queued: 0,
            accept_per_write: None,
            writable: VecDeque::new(),
            writable_default: true,
            wake_on_stall: true,
            fail_write: None,
            events: Vec::new(),
        }
    }

    pub fn limited(accept_per_write: usize) -> MockConn {
        let mut conn = MockConn::new();
        conn.accept_per_write = Some(accept_per_write);
        conn
    }

    /// All payload bytes that reached the wire.
    pub fn sent_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for ev in &self.events {
            if let WireEvent::Data(d) = ev {
                out.extend_from_slice(d);
            }
        }
        out
    }

    pub fn sent_string(&self) -> String {
        String::from_utf8_lossy(&self.sent_bytes()).to_string()
    }

    fn emit(&mut self, bytes: &[u8]) {
        if let Some(WireEvent::Data(d)) = self.events.last_mut() {
            d.extend_from_slice(bytes);
        } else {
            self.events.push(WireEvent::Data(bytes.to_vec()));
        }
    }
}

enum Step {
    Bytes(Vec<u8>),
    Notify,
    Fin,
    Stop,
}

impl Connection for MockConn {
    fn queue_write(&mut self, chunk: WriteChunk) -> u64 {
        if let WriteChunk::Data(data) = &chunk {
            self.queued += data.len() as u64;
        }
        self.queue.push_back(chunk);
        self.queued
    }

    fn write(&mut self, _cx: &mut Context) -> io::Result<u64> {
        if let Some(e) = self.fail_write.take() {
            return Err(e);
        }

        let mut budget = self.accept_per_write.unwrap_or(usize::MAX);
        let mut written = 0_u64;

        loop {
            let step = match self.queue.front() {
                None => Step::Stop,
                Some(WriteChunk::Data(d)) => {
                    if self.pos == d.len() {
                        // empty or exhausted chunk
                        Step::Bytes(Vec::new())
                    } else if budget == 0 {
                        Step::Stop
                    } else {
                        let n = (d.len() - self.pos).min(budget);
                        Step::Bytes(d[self.pos..self.pos + n].to_vec())
                    }
                }
                Some(WriteChunk::CloseNotify) => Step::Notify,
                Some(WriteChunk::Fin) => Step::Fin,
            };

            match step {
                Step::Stop => return Ok(written),
                Step::Bytes(b) => {
                    let n = b.len();
                    if n > 0 {
                        self.emit(&b);
                    }
                    self.pos += n;
                    self.queued -= n as u64;
                    budget -= n;
                    written += n as u64;

                    let exhausted = match self.queue.front() {
                        Some(WriteChunk::Data(d)) => self.pos == d.len(),
                        _ => false,
                    };
                    if exhausted {
                        self.pos = 0;
                        self.queue.pop_front();
                    }
                }
                Step::Notify => {
                    self.events.push(WireEvent::CloseNotify);
                    self.queue.pop_front();
                }
                Step::Fin => {
                    self.events.push(WireEvent::Fin);
                    self.queue.pop_front();
                }
            }
        }
    }

    fn poll_writable(&mut self, cx: &mut Context) -> Poll<io::Result<()>> {
        let ready = self
            .writable
            .pop_front()
            .unwrap_or(self.writable_default);

        if ready {
            Ok(()).into()
        } else {
            if self.wake_on_stall {
                cx.waker().wake_by_ref();
            }
            Poll::Pending
        }
    }

    fn write_queue_size(&self) -> u64 {
        self.queued
    }
}

/// One scripted step of a [`ScriptSource`].
pub enum SourceStep {
    Chunk(Vec<u8>),
    /// Pending once (waking the task), then continue with the next step.
    Stall,
    Err(Error),
}

/// Body source playing back a script, then EOF. Counts `close()` calls.
pub struct ScriptSource {
    steps: VecDeque<SourceStep>,
    closed: Arc<AtomicUsize>,
}

impl ScriptSource {
    pub fn new(steps: Vec<SourceStep>) -> (ScriptSource, Arc<AtomicUsize>) {
        let closed = Arc::new(AtomicUsize::new(0));
        (
            ScriptSource {
                steps: steps.into(),
                closed: closed.clone(),
            },
            closed,
        )
    }
}

impl ByteSource for ScriptSource {
    fn poll_read(&mut self, cx: &mut Context) -> Poll<Result<Option<Vec<u8>>, Error>> {
        match self.steps.pop_front() {
            None => Poll::Ready(Ok(None)),
            Some(SourceStep::Chunk(c)) => Poll::Ready(Ok(Some(c))),
            Some(SourceStep::Stall) => {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Some(SourceStep::Err(e)) => Poll::Ready(Err(e)),
        }
    }

    fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory `AsyncWrite` accepting a limited number of bytes per
/// `poll_write` call, optionally stalling every other call.
pub struct LimitedWriter {
    pub data: Vec<u8>,
    pub accept_per_poll: usize,
    pub flushes: usize,
    pub closed: bool,
    pub stall_every_other: bool,
    stall_next: bool,
}

impl LimitedWriter {
    pub fn new(accept_per_poll: usize) -> LimitedWriter {
        LimitedWriter {
            data: Vec::new(),
            accept_per_poll,
            flushes: 0,
            closed: false,
            stall_every_other: false,
            stall_next: false,
        }
    }
}

impl futures_io::AsyncWrite for LimitedWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();

        if this.stall_every_other {
            this.stall_next = !this.stall_next;
            if this.stall_next {
                cx.waker().wake_by_ref();
                return Poll::Pending;
            }
        }

        let n = buf.len().min(this.accept_per_poll);
        this.data.extend_from_slice(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().flushes += 1;
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().closed = true;
        Poll::Ready(Ok(()))
    }
}
