use std::io;
use std::task::Poll;

use brook_h1::{send_response, Config, Connection, Error, Response, SendOptions, StreamConnection, WriteChunk};
use futures_util::future::poll_fn;
use http::StatusCode;

mod common;

use common::LimitedWriter;

#[tokio::test]
async fn partial_writes_then_flush_and_fin() -> Result<(), io::Error> {
    common::setup_logger();

    let mut conn = StreamConnection::new(LimitedWriter::new(7));

    conn.queue_write(WriteChunk::Data(b"hello ".to_vec()));
    let queued = conn.queue_write(WriteChunk::Data(b"world".to_vec()));
    assert_eq!(queued, 11);

    conn.queue_write(WriteChunk::CloseNotify);
    conn.queue_write(WriteChunk::Fin);

    // the sentinels don't count as queued bytes
    assert_eq!(conn.write_queue_size(), 11);

    let written = poll_fn(|cx| Poll::Ready(conn.write(cx))).await?;
    assert_eq!(written, 11);
    assert_eq!(conn.write_queue_size(), 0);
    assert!(conn.is_closed());

    let w = conn.into_inner();
    assert_eq!(w.data, b"hello world");
    assert_eq!(w.flushes, 1);
    assert!(w.closed);

    Ok(())
}

#[tokio::test]
async fn stalling_sink_makes_progress_via_writable() -> Result<(), io::Error> {
    common::setup_logger();

    let mut writer = LimitedWriter::new(4);
    writer.stall_every_other = true;
    let mut conn = StreamConnection::new(writer);

    conn.queue_write(WriteChunk::Data(b"0123456789".to_vec()));
    conn.queue_write(WriteChunk::Fin);

    poll_fn(|cx| loop {
        if let Err(e) = conn.write(cx) {
            return Poll::Ready(Err(e));
        }
        if conn.is_closed() {
            return Poll::Ready(Ok(()));
        }
        // the stalled writer wakes us; wait for progress
        match conn.poll_writable(cx) {
            Poll::Ready(Ok(())) => continue,
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            Poll::Pending => return Poll::Pending,
        }
    })
    .await?;

    assert_eq!(conn.write_queue_size(), 0);
    assert_eq!(conn.into_inner().data, b"0123456789");

    Ok(())
}

#[tokio::test]
async fn emission_over_a_real_write_queue() -> Result<(), Error> {
    common::setup_logger();

    let resp = Response::data(StatusCode::OK, "text/plain", b"hello".to_vec());
    let mut conn = StreamConnection::new(LimitedWriter::new(3));

    let opts = SendOptions {
        is_last: true,
        http_minor_version: Some(1),
        connect: false,
    };
    let outcome = send_response(&mut conn, &resp, &opts, &Config::default()).await?;

    assert!(outcome.is_ok());
    assert!(conn.is_closed());

    let w = conn.into_inner();
    let sent = String::from_utf8(w.data).unwrap();
    assert!(sent.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(sent.ends_with("\r\n\r\nhello"));
    assert!(w.flushes >= 1);
    assert!(w.closed);

    Ok(())
}
