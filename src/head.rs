use http::header::HeaderName;
use http::StatusCode;

/// Serialize a response head: status line, headers in insertion order, one
/// `Set-Cookie` line per cookie (never merged), and the final empty line.
///
/// Names and values must have been validated beforehand; no escaping
/// happens here. All output octets are ASCII.
///
/// `minor` is the minor version of the *request* line; the response status
/// line mirrors it. When it is unknown (request parse error) the head is
/// emitted as HTTP/1.1.
pub fn render_head<'a, I>(
    status: StatusCode,
    minor: Option<u8>,
    headers: I,
    set_cookie: &[String],
) -> Vec<u8>
where
    I: IntoIterator<Item = (&'a HeaderName, &'a str)>,
{
    let mut out = Vec::with_capacity(256);

    let version = if minor == Some(0) {
        "HTTP/1.0 "
    } else {
        "HTTP/1.1 "
    };
    out.extend_from_slice(version.as_bytes());
    out.extend_from_slice(status.as_str().as_bytes());
    out.extend_from_slice(b" ");
    out.extend_from_slice(status.canonical_reason().unwrap_or("Unknown").as_bytes());
    out.extend_from_slice(b"\r\n");

    for (name, value) in headers {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }

    for line in set_cookie {
        out.extend_from_slice(b"set-cookie: ");
        out.extend_from_slice(line.as_bytes());
        out.extend_from_slice(b"\r\n");
    }

    out.extend_from_slice(b"\r\n");

    debug!("render_head: {:?}", String::from_utf8_lossy(&out));

    out
}
