//! The response emission pipeline.
//!
//! One [`Emission`] serializes one response onto a connection: the head
//! goes into the write queue first, then body bytes are pipelined from the
//! asynchronous source while the sink drains, framing is enforced against
//! the declared length, and for the last response on a connection the
//! close-notify and FIN terminators are appended before the final flush.
//!
//! Everything runs on the connection's own task; there are exactly two
//! suspension points, awaiting the body read and awaiting sink
//! writability (the latter bounded by the write timeout). For a given
//! connection, emissions run strictly one after another.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::poll_fn;
use tokio::time::{sleep, Instant, Sleep};

use crate::config::Config;
use crate::conn::{Connection, WriteChunk};
use crate::head::render_head;
use crate::lifecycle::entity_forbidden;
use crate::response::Response;
use crate::source::{BufferSource, ByteSource};
use crate::Error;

/// Client throughput is not judged during the first ten seconds.
const THROUGHPUT_WARMUP: Duration = Duration::from_secs(10);

/// What emitting one response came to.
///
/// Both error slots can be set: a benign body error still flushes what was
/// queued, and that flush can then hit a connection error.
#[derive(Debug)]
pub struct Outcome {
    /// Error from the entity body source, or a framing violation.
    pub body_error: Option<Error>,
    /// Error from the connection sink: broken socket, write timeout, or
    /// the throughput verdict.
    pub conn_error: Option<Error>,
    /// Body bytes accepted from the source.
    pub body_total: u64,
    /// Length of the serialized head in bytes.
    pub head_length: u64,
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        self.body_error.is_none() && self.conn_error.is_none()
    }
}

#[derive(Clone, Copy, Debug)]
enum State {
    /// Queue the head.
    Start,
    /// Alternate body reads with queue writes.
    PipeBody,
    /// Queued bytes exceeded the high mark; drain before reading more.
    DrainMark,
    /// Everything is queued; write until the queue is empty.
    FlushAll,
    /// Waiting for the sink, then resume at the given state.
    AwaitWritable(Resume),
    /// Report the outcome.
    End,
}

#[derive(Clone, Copy, Debug)]
enum Resume {
    PipeBody,
    DrainMark,
    FlushAll,
}

/// State machine emitting a single response onto a connection.
///
/// Owns the body source from construction until it is closed; closure
/// happens exactly once, on every exit path.
pub struct Emission {
    state: State,
    head: Option<Vec<u8>>,
    body: Option<Box<dyn ByteSource + Send>>,
    /// Body length advertised by the framing headers. None = unknown,
    /// the body ends at source EOF.
    declared: Option<u64>,
    is_last: bool,

    high_mark: u64,
    min_throughput: u64,
    write_timeout: Duration,

    write_t0: Instant,
    head_length: u64,
    written_total: u64,
    body_total: u64,
    /// Set while suspended on the body read alone.
    read_stall_t0: Option<Instant>,
    read_stall_time: Duration,
    timer: Option<Pin<Box<Sleep>>>,

    body_error: Option<Error>,
    conn_error: Option<Error>,
}

impl Emission {
    /// Prepare the emission of a pre-rendered head and a body source.
    ///
    /// `declared` must match what the framing headers in `head` advertise;
    /// the engine trusts it and neither adds nor rewrites framing. With
    /// `is_last` the close-notify and FIN terminators are appended behind
    /// the body.
    pub fn new(
        head: Vec<u8>,
        body: Box<dyn ByteSource + Send>,
        declared: Option<u64>,
        is_last: bool,
        config: &Config,
    ) -> Emission {
        Emission {
            state: State::Start,
            head: Some(head),
            body: Some(body),
            declared,
            is_last,
            high_mark: config.outbound_buffer_size,
            min_throughput: config.write_min_throughput,
            write_timeout: config.write_timeout,
            write_t0: Instant::now(),
            head_length: 0,
            written_total: 0,
            body_total: 0,
            read_stall_t0: None,
            read_stall_time: Duration::from_secs(0),
            timer: None,
            body_error: None,
            conn_error: None,
        }
    }

    /// Run the emission to completion.
    pub async fn drive<C: Connection>(&mut self, conn: &mut C) -> Outcome {
        poll_fn(move |cx| self.poll_drive(cx, &mut *conn)).await
    }

    pub fn poll_drive<C: Connection>(&mut self, cx: &mut Context, conn: &mut C) -> Poll<Outcome> {
        loop {
            trace!("drive_state: {:?}", self.state);

            match self.state {
                State::Start => {
                    self.write_t0 = Instant::now();

                    let r0 = conn.write_queue_size();
                    let head = self.head.take().expect("missing head");
                    conn.queue_write(WriteChunk::Data(head));
                    self.head_length = conn.write_queue_size() - r0;

                    // The head is not flushed eagerly; it rides with the
                    // first body write. The read-stall branch below pushes
                    // it out promptly when the body is slow to produce.
                    self.state = State::PipeBody;
                }

                State::PipeBody => {
                    match self.poll_body(cx) {
                        Poll::Pending => {
                            // Read stall. Keep pushing queued bytes out.
                            let remaining = match self.conn_write(cx, conn) {
                                Ok(v) => v,
                                Err(e) => {
                                    self.conn_err(e);
                                    continue;
                                }
                            };

                            if remaining == 0 {
                                // Await the body read alone; the source
                                // holds our waker. The stall clock starts
                                // here so a slow body is not blamed on
                                // the client.
                                if self.read_stall_t0.is_none() {
                                    self.read_stall_t0 = Some(Instant::now());
                                }
                                return Poll::Pending;
                            }

                            // The sink stalls too. Await writability
                            // alone; reading and queueing more while the
                            // send buffer is full would not move anything.
                            // Once writable we pipe again and retest the
                            // read.
                            self.await_writable(Resume::PipeBody);
                        }

                        Poll::Ready(Err(e)) => self.body_err(e, conn),

                        Poll::Ready(Ok(None)) => {
                            // EOF
                            if let Some(declared) = self.declared {
                                if self.body_total < declared {
                                    self.body_err(
                                        Error::ShortBody {
                                            written: self.body_total,
                                            declared,
                                        },
                                        conn,
                                    );
                                    continue;
                                }
                            }
                            self.close_body();
                            self.to_flush_all(conn);
                        }

                        Poll::Ready(Ok(Some(buf))) => {
                            let len = buf.len() as u64;

                            if let Some(declared) = self.declared {
                                if self.body_total + len > declared {
                                    // Framing violation. The offending
                                    // chunk is withheld whole: nothing
                                    // past the declared length may reach
                                    // the client.
                                    self.body_err(
                                        Error::Overrun {
                                            produced: self.body_total + len,
                                            declared,
                                        },
                                        conn,
                                    );
                                    continue;
                                }
                            }

                            self.body_total += len;
                            let queued = conn.queue_write(WriteChunk::Data(buf));

                            if self.declared == Some(self.body_total) {
                                // All declared bytes are read; the next
                                // read could only be EOF, don't bother.
                                self.close_body();
                                self.to_flush_all(conn);
                            } else if queued > self.high_mark {
                                self.state = State::DrainMark;
                            }
                            // else loop PipeBody, one read per iteration
                        }
                    }
                }

                State::DrainMark => match self.conn_write(cx, conn) {
                    Err(e) => self.conn_err(e),
                    Ok(remaining) => {
                        if remaining > self.high_mark {
                            self.await_writable(Resume::DrainMark);
                        } else {
                            self.state = State::PipeBody;
                        }
                    }
                },

                State::FlushAll => match self.conn_write(cx, conn) {
                    Err(e) => self.conn_err(e),
                    Ok(remaining) => {
                        if remaining > 0 {
                            self.await_writable(Resume::FlushAll);
                        } else {
                            self.state = State::End;
                        }
                    }
                },

                State::AwaitWritable(then) => match conn.poll_writable(cx) {
                    Poll::Ready(Ok(())) => {
                        self.timer = None;
                        self.state = match then {
                            Resume::PipeBody => State::PipeBody,
                            Resume::DrainMark => State::DrainMark,
                            Resume::FlushAll => State::FlushAll,
                        };
                    }
                    Poll::Ready(Err(e)) => {
                        self.timer = None;
                        self.conn_err(e);
                    }
                    Poll::Pending => {
                        let timer = self.timer.as_mut().expect("timer armed with the wait");
                        match timer.as_mut().poll(cx) {
                            Poll::Ready(()) => {
                                self.timer = None;
                                self.conn_err(io::Error::new(
                                    io::ErrorKind::TimedOut,
                                    "write timeout",
                                ));
                            }
                            Poll::Pending => return Poll::Pending,
                        }
                    }
                },

                State::End => {
                    return Poll::Ready(Outcome {
                        body_error: self.body_error.take(),
                        conn_error: self.conn_error.take(),
                        body_total: self.body_total,
                        head_length: self.head_length,
                    });
                }
            }
        }
    }

    /// One poll of the body source, with stall accounting: time suspended
    /// on the source alone is excluded from the throughput math.
    fn poll_body(&mut self, cx: &mut Context) -> Poll<Result<Option<Vec<u8>>, Error>> {
        let body = match self.body.as_mut() {
            Some(b) => b,
            None => unreachable!("body polled after close"),
        };

        let res = body.poll_read(cx);

        if let Poll::Ready(_) = &res {
            if let Some(t0) = self.read_stall_t0.take() {
                self.read_stall_time += t0.elapsed();
            }
        }

        res
    }

    /// Drive `conn.write()` and police throughput: whenever a write leaves
    /// bytes queued, the observed rate (read-stall time excluded) must
    /// reach the configured minimum once the warmup window has passed.
    /// Returns the bytes still queued.
    fn conn_write<C: Connection>(&mut self, cx: &mut Context, conn: &mut C) -> io::Result<u64> {
        let written = conn.write(cx)?;
        self.written_total += written;

        let remain = conn.write_queue_size();
        if remain > 0 {
            let time_spent = Instant::now()
                .duration_since(self.write_t0)
                .checked_sub(self.read_stall_time)
                .unwrap_or_else(|| Duration::from_secs(0));

            if time_spent > THROUGHPUT_WARMUP {
                let min_goal = self.min_throughput * time_spent.as_millis() as u64 / 1000;
                if self.written_total < min_goal {
                    trace!(
                        "written {} of minimum {} in {:?}",
                        self.written_total,
                        min_goal,
                        time_spent
                    );
                    return Err(io::Error::new(
                        io::ErrorKind::Other,
                        "client download throughput too low",
                    ));
                }
            }
        }

        Ok(remain)
    }

    fn await_writable(&mut self, then: Resume) {
        // a fresh timeout for every wait
        self.timer = Some(Box::pin(sleep(self.write_timeout)));
        self.state = State::AwaitWritable(then);
    }

    fn to_flush_all<C: Connection>(&mut self, conn: &mut C) {
        // Body content is all queued. The terminators ride at the tail of
        // the queue for the last response: close_notify first, then FIN.
        if self.is_last {
            conn.queue_write(WriteChunk::CloseNotify);
            conn.queue_write(WriteChunk::Fin);
        }
        self.state = State::FlushAll;
    }

    fn body_err<C: Connection>(&mut self, e: Error, conn: &mut C) {
        self.close_body();

        // the output stream is corrupt; no further responses on it
        self.is_last = true;

        warn!("body error: {}", e);
        let aborts = e.aborts_emission();
        self.body_error = Some(e);

        if aborts {
            // App logic fault. Don't bother flushing more.
            self.state = State::End;
        } else {
            // Benign. The client still gets what was queued plus the
            // terminators, and detects the truncation from the framing.
            self.to_flush_all(conn);
        }
    }

    fn conn_err(&mut self, e: io::Error) {
        // the body may already be closed after EOF or a body error
        self.close_body();

        self.is_last = true;

        debug!("connection error: {}", e);
        self.conn_error = Some(Error::Io(e));
        self.state = State::End;
    }

    /// Close the body source, exactly once per emission.
    fn close_body(&mut self) {
        if let Some(mut body) = self.body.take() {
            body.close();
        }
    }
}

// ***************** Front door preparing framing **********************

/// Per-response inputs decided by the connection handling layer.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// This is the final response on the connection; the stream
    /// terminators are appended and everything is flushed out.
    pub is_last: bool,
    /// Minor version of the request line; `None` when the request did not
    /// parse. The response status line mirrors it.
    pub http_minor_version: Option<u8>,
    /// The request method was CONNECT; a 2xx then carries no entity.
    pub connect: bool,
}

/// Emit `response` on `conn` and drive the emission to completion.
///
/// This is the layer that prepares the framing: when the entity length is
/// known a `Content-Length` header is added and that length enforced; an
/// entity of unknown length is delimited by closing the connection, so the
/// response becomes the last one (chunked encoding is not spoken here).
/// A response whose status cannot carry an entity is rejected up front.
pub async fn send_response<C: Connection>(
    conn: &mut C,
    response: &Response,
    opts: &SendOptions,
    config: &Config,
) -> Result<Outcome, Error> {
    let mut emission = prepare(response, opts, config)?;
    Ok(emission.drive(conn).await)
}

fn prepare(response: &Response, opts: &SendOptions, config: &Config) -> Result<Emission, Error> {
    let status = response.status();

    if entity_forbidden(status, opts.connect) && response.entity().is_some() {
        return Err(Error::User(format!(
            "status {} must not carry an entity",
            status
        )));
    }

    let mut is_last = opts.is_last;

    let (body, declared): (Box<dyn ByteSource + Send>, Option<u64>) = match response.entity() {
        Some(entity) => {
            let declared = entity.length();
            if declared.is_none() {
                // no Content-Length and no chunked encoding: the body is
                // delimited by closing the connection
                is_last = true;
            }
            (entity.open(), declared)
        }
        None => (Box::new(BufferSource::empty()), Some(0)),
    };

    let mut wire = response.wire_headers();
    if response.entity().is_some() {
        if let Some(len) = declared {
            wire.push((http::header::CONTENT_LENGTH, len.to_string()));
        }
    }

    let head = render_head(
        status,
        opts.http_minor_version,
        wire.iter().map(|(n, v)| (n, v.as_str())),
        &response.headers_set_cookie(),
    );

    Ok(Emission::new(head, body, declared, is_last, config))
}
