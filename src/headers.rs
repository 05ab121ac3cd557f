use http::header::{HeaderName, HeaderValue};

use crate::Error;

// Headers the emission engine owns, or that are derived from the entity
// metadata. They must never appear in the user header map: Set-Cookie is
// represented by the cookie list, the framing headers are decided by the
// layer that prepares the entity, and the entity headers come from the
// entity itself.
const RESERVED: &[&str] = &[
    "set-cookie",
    "content-length",
    "transfer-encoding",
    "content-type",
    "content-encoding",
    "etag",
    "last-modified",
    "expires",
];

/// Case-insensitive header map that keeps insertion order.
///
/// Unlike `http::HeaderMap` this holds a single value per name and
/// iterates in the order headers were first inserted, which is also the
/// order they are serialized in. Replacing a value keeps the original
/// position.
#[derive(Debug, Default, Clone)]
pub struct HeaderMap {
    entries: Vec<(HeaderName, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        HeaderMap {
            entries: Vec::new(),
        }
    }

    /// Insert or replace a header. The name and value are syntax checked,
    /// and names owned by the engine (Set-Cookie, framing and entity
    /// headers) are rejected.
    pub fn insert(&mut self, name: &str, value: &str) -> Result<(), Error> {
        let name = check_name(name)?;
        let value = check_value(value)?;

        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.entries.push((name, value));
        }
        Ok(())
    }

    /// Remove a header. Unknown names are a no-op.
    pub fn remove(&mut self, name: &str) {
        self.entries
            .retain(|(n, _)| !n.as_str().eq_ignore_ascii_case(name));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.as_str().eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &str)> {
        self.entries.iter().map(|(n, v)| (n, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn check_name(name: &str) -> Result<HeaderName, Error> {
    let name = HeaderName::from_bytes(name.as_bytes())?;

    // HeaderName normalizes to lowercase.
    if RESERVED.contains(&name.as_str()) {
        return Err(Error::User(format!(
            "header is managed by the engine: {}",
            name
        )));
    }

    Ok(name)
}

fn check_value(value: &str) -> Result<String, Error> {
    // validated for syntax only; the string itself is what goes on the wire
    HeaderValue::from_str(value)?;
    Ok(value.to_string())
}
