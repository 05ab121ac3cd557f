use std::time::Duration;

use crate::Error;

/// An http cookie to set on the client, serialized as one `Set-Cookie`
/// response header line.
///
/// Cookie identity is the `(name, domain, path)` triple; a response keeps
/// at most one cookie per identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Cookie {
    name: String,
    value: String,
    /// None means a session cookie.
    max_age: Option<Duration>,
    domain: Option<String>,
    path: Option<String>,
    secure: bool,
    http_only: bool,
}

impl Cookie {
    /// Create a cookie with `Path=/` and no domain.
    ///
    /// The name must be an RFC 7230 token; the value is restricted to the
    /// cookie-octets of RFC 6265 (no controls, whitespace, `"`, `,`, `;`
    /// or `\`).
    pub fn new(name: &str, value: &str, max_age: Option<Duration>) -> Result<Cookie, Error> {
        check_token(name)?;
        check_cookie_value(value)?;

        Ok(Cookie {
            name: name.to_string(),
            value: value.to_string(),
            max_age,
            domain: None,
            path: Some("/".to_string()),
            secure: false,
            http_only: false,
        })
    }

    /// Scope the cookie to a domain. Domains compare case-insensitively,
    /// so the value is lowercased.
    pub fn domain(mut self, domain: &str) -> Result<Cookie, Error> {
        check_attr(domain)?;
        self.domain = Some(domain.to_ascii_lowercase());
        Ok(self)
    }

    /// Scope the cookie to a path.
    pub fn path(mut self, path: &str) -> Result<Cookie, Error> {
        check_attr(path)?;
        self.path = Some(path.to_string());
        Ok(self)
    }

    pub fn secure(mut self, secure: bool) -> Cookie {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Cookie {
        self.http_only = http_only;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Two cookies are the same cookie when name, domain and path all
    /// match.
    pub fn same_identity(&self, other: &Cookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }

    /// The wire form of this cookie, without the `Set-Cookie: ` prefix.
    pub fn to_set_cookie(&self) -> String {
        let mut s = format!("{}={}", self.name, self.value);

        if let Some(age) = self.max_age {
            s.push_str("; Max-Age=");
            s.push_str(&age.as_secs().to_string());
        }
        if let Some(domain) = &self.domain {
            s.push_str("; Domain=");
            s.push_str(domain);
        }
        if let Some(path) = &self.path {
            s.push_str("; Path=");
            s.push_str(path);
        }
        if self.secure {
            s.push_str("; Secure");
        }
        if self.http_only {
            s.push_str("; HttpOnly");
        }

        s
    }
}

// https://tools.ietf.org/html/rfc7230#section-3.2.6
fn is_token_char(c: u8) -> bool {
    match c {
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_'
        | b'`' | b'|' | b'~' => true,
        c => c.is_ascii_alphanumeric(),
    }
}

fn check_token(name: &str) -> Result<(), Error> {
    if name.is_empty() || !name.bytes().all(is_token_char) {
        return Err(Error::User(format!("bad cookie name: {:?}", name)));
    }
    Ok(())
}

// https://tools.ietf.org/html/rfc6265#section-4.1.1
fn is_cookie_octet(c: u8) -> bool {
    match c {
        0x21 | 0x23..=0x2b | 0x2d..=0x3a | 0x3c..=0x5b | 0x5d..=0x7e => true,
        _ => false,
    }
}

fn check_cookie_value(value: &str) -> Result<(), Error> {
    if !value.bytes().all(is_cookie_octet) {
        return Err(Error::User(format!("bad cookie value: {:?}", value)));
    }
    Ok(())
}

fn check_attr(value: &str) -> Result<(), Error> {
    let ok = !value.is_empty()
        && value
            .bytes()
            .all(|c| c.is_ascii_graphic() && c != b';' && c != b',');
    if !ok {
        return Err(Error::User(format!("bad cookie attribute: {:?}", value)));
    }
    Ok(())
}
