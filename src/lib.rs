//! HTTP/1.x response emission.
//!
//! This crate serializes a prepared response onto a single client
//! connection: the head (status line, headers, `Set-Cookie` lines), a
//! body pipelined from an asynchronous byte source under backpressure,
//! framing enforcement against the declared length, a minimum client
//! download throughput, and the close-notify/FIN termination sequence for
//! the last response on a keep-alive connection.
//!
//! Request parsing, routing and TLS record handling live elsewhere; they
//! meet this crate only through the [`Connection`] and [`ByteSource`]
//! traits and the [`RequestFacts`] record.
//!
//! # Example
//!
//! ```rust,no_run
//! use brook_h1::{send_response, Config, Response, SendOptions, StreamConnection};
//! use http::StatusCode;
//!
//! # async fn emit<S>(socket: S) -> Result<(), brook_h1::Error>
//! # where S: futures_io::AsyncWrite + Unpin {
//! let mut resp = Response::text(StatusCode::OK, "hello world");
//! resp.header("server", "brook")?;
//!
//! let mut conn = StreamConnection::new(socket);
//!
//! let outcome = send_response(&mut conn, &resp, &SendOptions::default(), &Config::default())
//!     .await?;
//! assert!(outcome.is_ok());
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

mod config;
mod conn;
mod cookie;
mod entity;
mod error;
mod head;
mod headers;
mod lifecycle;
mod pipeline;
mod response;
mod source;

pub(crate) use futures_io::AsyncWrite;

pub use config::Config;
pub use conn::{Connection, StreamConnection, WriteChunk};
pub use cookie::Cookie;
pub use entity::{Entity, EntityMod, EntityRef};
pub use error::Error;
pub use head::render_head;
pub use headers::HeaderMap;
pub use lifecycle::{entity_forbidden, is_last_response, RequestFacts};
pub use pipeline::{send_response, Emission, Outcome, SendOptions};
pub use response::Response;
pub use source::{body_channel, BodySender, BufferSource, ByteSource, ChannelSource};
