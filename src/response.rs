use std::sync::Arc;
use std::time::SystemTime;

use http::header::HeaderName;
use http::StatusCode;

use crate::cookie::Cookie;
use crate::entity::{check_etag, http_date, Entity, EntityMod, EntityRef};
use crate::headers::HeaderMap;
use crate::Error;

/// A mutable http response: status, headers, cookies and an optional
/// entity.
///
/// Mutators chain; the fallible ones validate their input up front so that
/// emission never meets a syntactically bad head. The emission engine
/// treats the value as frozen once emission starts. Use
/// [`Response::copy_of`] to derive an independent mutable copy of a
/// response treated as read-only.
#[derive(Debug)]
pub struct Response {
    version: http::Version,
    status: StatusCode,
    headers: HeaderMap,
    cookies: Vec<Cookie>,
    entity: Option<EntityRef>,
}

impl Response {
    /// Create a response with the given status and entity.
    pub fn new(status: StatusCode, entity: Option<Arc<Entity>>) -> Response {
        Response {
            version: http::Version::HTTP_11,
            status,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            entity: entity.map(EntityRef::Plain),
        }
    }

    /// Plain-text response from a string.
    pub fn text(status: StatusCode, text: &str) -> Response {
        Response::data(status, "text/plain;charset=UTF-8", text.as_bytes().to_vec())
    }

    /// Response with an in-memory body of the given content type.
    pub fn data(status: StatusCode, content_type: &str, data: Vec<u8>) -> Response {
        Response::new(status, Some(Arc::new(Entity::bytes(content_type, data))))
    }

    /// Copy a response. Headers and cookies are deep-copied so the copy
    /// can be mutated freely; the entity description is shared, since
    /// entities are immutable.
    pub fn copy_of(origin: &Response) -> Response {
        Response {
            version: origin.version,
            status: origin.status,
            headers: origin.headers.clone(),
            cookies: origin.cookies.clone(),
            entity: origin.entity.clone(),
        }
    }

    pub fn version(&self) -> http::Version {
        self.version
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn entity(&self) -> Option<&EntityRef> {
        self.entity.as_ref()
    }

    pub fn set_version(&mut self, version: http::Version) -> &mut Response {
        self.version = version;
        self
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Response {
        self.status = status;
        self
    }

    /// Set a header. Name and value are validated; names the engine owns
    /// (Set-Cookie, framing and entity headers) are rejected.
    pub fn header(&mut self, name: &str, value: &str) -> Result<&mut Response, Error> {
        self.headers.insert(name, value)?;
        Ok(self)
    }

    /// Remove a header.
    pub fn remove_header(&mut self, name: &str) -> &mut Response {
        self.headers.remove(name);
        self
    }

    /// Add a cookie. A cookie already present with the same
    /// `(name, domain, path)` identity is replaced in place.
    pub fn cookie(&mut self, cookie: Cookie) -> &mut Response {
        for prev in self.cookies.iter_mut() {
            if prev.same_identity(&cookie) {
                *prev = cookie;
                return self;
            }
        }
        self.cookies.push(cookie);
        self
    }

    /// Replace the entity. Any metadata staged on the previous entity is
    /// discarded with it.
    pub fn set_entity(&mut self, entity: Option<Arc<Entity>>) -> &mut Response {
        self.entity = entity.map(EntityRef::Plain);
        self
    }

    fn entity_mod(&mut self) -> Result<&mut EntityMod, Error> {
        match &mut self.entity {
            None => Err(Error::User("entity is absent".to_string())),
            Some(entity) => Ok(entity.as_mod()),
        }
    }

    /// Stage the entity `lastModified` metadata. Fails when there is no
    /// entity.
    pub fn entity_last_modified(&mut self, t: SystemTime) -> Result<&mut Response, Error> {
        self.entity_mod()?.last_modified = Some(t);
        Ok(self)
    }

    /// Stage the entity `expires` metadata. Fails when there is no entity.
    pub fn entity_expires(&mut self, t: SystemTime) -> Result<&mut Response, Error> {
        self.entity_mod()?.expires = Some(t);
        Ok(self)
    }

    /// Stage the entity etag (unquoted). Validated on set; fails when
    /// there is no entity.
    pub fn entity_etag(&mut self, etag: &str) -> Result<&mut Response, Error> {
        check_etag(etag)?;
        self.entity_mod()?.etag = Some(etag.to_string());
        Ok(self)
    }

    /// Stage the entity etag weakness flag. Fails when there is no entity.
    pub fn entity_etag_is_weak(&mut self, weak: bool) -> Result<&mut Response, Error> {
        self.entity_mod()?.etag_is_weak = Some(weak);
        Ok(self)
    }

    /// Wire-format `Set-Cookie` lines, one per cookie, in list order.
    pub fn headers_set_cookie(&self) -> Vec<String> {
        self.cookies.iter().map(|c| c.to_set_cookie()).collect()
    }

    /// The full header list as it goes on the wire: the user headers in
    /// insertion order, followed by the headers derived from the entity
    /// metadata. Framing headers are not included; the layer that decides
    /// the framing adds them.
    pub fn wire_headers(&self) -> Vec<(HeaderName, String)> {
        let mut out: Vec<(HeaderName, String)> = self
            .headers
            .iter()
            .map(|(n, v)| (n.clone(), v.to_string()))
            .collect();

        if let Some(entity) = &self.entity {
            out.push((
                http::header::CONTENT_TYPE,
                entity.content_type().to_string(),
            ));
            if let Some(etag) = entity.wire_etag() {
                out.push((http::header::ETAG, etag));
            }
            if let Some(t) = entity.last_modified() {
                out.push((http::header::LAST_MODIFIED, http_date(t)));
            }
            if let Some(t) = entity.expires() {
                out.push((http::header::EXPIRES, http_date(t)));
            }
        }

        out
    }
}
