use crate::response::Response;

/// Facts about the request that the connection-lifecycle decision needs.
/// The request parser lives outside this crate; callers distill its result
/// to this record.
#[derive(Debug, Default, Clone)]
pub struct RequestFacts {
    /// The request head failed to parse. The minor version is then
    /// unknown and the connection cannot be reused.
    pub parse_failed: bool,
    /// Minor version of the request line, when known (0 or 1).
    pub minor_version: Option<u8>,
    /// The request carried `Connection: close`.
    pub connection_close: bool,
    /// The request carried `Connection: keep-alive`.
    pub connection_keep_alive: bool,
    /// The request method was CONNECT.
    pub is_connect: bool,
    /// Per-request hint that this response must be the last one, whatever
    /// the headers say.
    pub force_close: bool,
}

/// Decide whether `response` is the last one on its connection, i.e.
/// whether the emission appends the stream terminators and the connection
/// closes afterwards.
///
/// https://tools.ietf.org/html/rfc7230#section-6.3
/// HTTP/1.1 defaults to persistent connections; HTTP/1.0 persists only on
/// an explicit `Connection: keep-alive`.
pub fn is_last_response(req: &RequestFacts, response: &Response, server_closing: bool) -> bool {
    if server_closing || req.parse_failed || req.force_close {
        return true;
    }

    // the response producer can force a close
    if let Some(v) = response.headers().get("connection") {
        if v.eq_ignore_ascii_case("close") {
            return true;
        }
    }

    if req.connection_close {
        return true;
    }

    match req.minor_version {
        Some(0) => !req.connection_keep_alive,
        _ => false,
    }
}

/// Whether a response with this status must not carry an entity: 1xx, 204,
/// 304, or any 2xx answering a CONNECT request.
///
/// https://tools.ietf.org/html/rfc7230#page-31
pub fn entity_forbidden(status: http::StatusCode, connect_request: bool) -> bool {
    status.is_informational()
        || status == http::StatusCode::NO_CONTENT
        || status == http::StatusCode::NOT_MODIFIED
        || (connect_request && status.is_success())
}
