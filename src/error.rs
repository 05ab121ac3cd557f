use std::fmt;
use std::io;

/// Possible errors from this crate.
#[derive(Debug)]
pub enum Error {
    /// A user/usage problem such as setting a header the engine owns, or a
    /// programming fault in a body source. When a body source fails with
    /// this class, the emission aborts without flushing further bytes.
    User(String),
    /// A wrapped std::io::Error from the underlying transport (socket) or
    /// from the entity body source.
    Io(io::Error),
    /// Header syntax errors from the `http` crate.
    Http(http::Error),
    /// The body source reported EOF before the declared content length was
    /// reached.
    ShortBody { written: u64, declared: u64 },
    /// The body source produced more bytes than the declared content
    /// length. The extra bytes are never sent.
    Overrun { produced: u64, declared: u64 },
}

impl Error {
    /// Whether a body error of this kind aborts the emission right away.
    /// Benign kinds still flush queued bytes and the stream terminators,
    /// letting the client detect the truncation from the framing.
    pub(crate) fn aborts_emission(&self) -> bool {
        match self {
            Error::User(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::User(v) => write!(f, "{}", v),
            Error::Io(v) => fmt::Display::fmt(v, f),
            Error::Http(v) => write!(f, "http api: {}", v),
            Error::ShortBody { written, declared } => write!(
                f,
                "response entity body is shorter than Content-Length: {} < {}",
                written, declared
            ),
            Error::Overrun { produced, declared } => write!(
                f,
                "response entity body is larger than Content-Length: {} > {}",
                produced, declared
            ),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Self {
        Error::Http(e)
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(e: http::header::InvalidHeaderName) -> Self {
        Error::Http(e.into())
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(e: http::header::InvalidHeaderValue) -> Self {
        Error::Http(e.into())
    }
}
