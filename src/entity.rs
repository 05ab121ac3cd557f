use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::source::{BufferSource, ByteSource};
use crate::Error;

type SourceFactory = Box<dyn Fn() -> Box<dyn ByteSource + Send> + Send + Sync>;

/// Immutable description of a response entity: content metadata plus a
/// factory that opens a fresh body source for every emission.
///
/// The length is the body size in bytes when known; `None` means the body
/// is delimited by EOF.
pub struct Entity {
    content_type: String,
    length: Option<u64>,
    last_modified: Option<SystemTime>,
    expires: Option<SystemTime>,
    etag: Option<String>,
    etag_is_weak: bool,
    open: SourceFactory,
}

impl Entity {
    pub fn new<F>(content_type: &str, length: Option<u64>, open: F) -> Entity
    where
        F: Fn() -> Box<dyn ByteSource + Send> + Send + Sync + 'static,
    {
        Entity {
            content_type: content_type.to_string(),
            length,
            last_modified: None,
            expires: None,
            etag: None,
            etag_is_weak: false,
            open: Box::new(open),
        }
    }

    /// Entity over an in-memory buffer. The length is known up front.
    pub fn bytes(content_type: &str, data: Vec<u8>) -> Entity {
        let len = data.len() as u64;
        let data = Arc::new(data);
        Entity::new(content_type, Some(len), move || {
            Box::new(BufferSource::new(data.as_ref().clone()))
        })
    }

    pub fn with_last_modified(mut self, t: SystemTime) -> Entity {
        self.last_modified = Some(t);
        self
    }

    pub fn with_expires(mut self, t: SystemTime) -> Entity {
        self.expires = Some(t);
        self
    }

    /// The etag is stored unquoted; quotes and the `W/` prefix are added
    /// when the header is serialized.
    pub fn with_etag(mut self, etag: &str, is_weak: bool) -> Result<Entity, Error> {
        check_etag(etag)?;
        self.etag = Some(etag.to_string());
        self.etag_is_weak = is_weak;
        Ok(self)
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn length(&self) -> Option<u64> {
        self.length
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    pub fn expires(&self) -> Option<SystemTime> {
        self.expires
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn etag_is_weak(&self) -> bool {
        self.etag_is_weak
    }

    /// Open a fresh body source for one emission.
    pub fn open(&self) -> Box<dyn ByteSource + Send> {
        (self.open)()
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Entity")
            .field("content_type", &self.content_type)
            .field("length", &self.length)
            .field("etag", &self.etag)
            .finish()
    }
}

/// The entity slot on a response: either the shared immutable description,
/// or that description plus a small overlay shadowing individual metadata
/// fields (the result of `Response::entity_etag()` and friends).
#[derive(Clone, Debug)]
pub enum EntityRef {
    Plain(Arc<Entity>),
    Mod(EntityMod),
}

/// Overlay over a shared entity. A `Some` field shadows the base value;
/// everything else delegates.
#[derive(Clone, Debug)]
pub struct EntityMod {
    base: Arc<Entity>,
    pub(crate) last_modified: Option<SystemTime>,
    pub(crate) expires: Option<SystemTime>,
    pub(crate) etag: Option<String>,
    pub(crate) etag_is_weak: Option<bool>,
}

impl EntityRef {
    fn base(&self) -> &Entity {
        match self {
            EntityRef::Plain(e) => e,
            EntityRef::Mod(m) => &m.base,
        }
    }

    /// Promote to an overlay in place, so a metadata field can be staged.
    pub(crate) fn as_mod(&mut self) -> &mut EntityMod {
        if let EntityRef::Plain(e) = &*self {
            let base = e.clone();
            *self = EntityRef::Mod(EntityMod {
                base,
                last_modified: None,
                expires: None,
                etag: None,
                etag_is_weak: None,
            });
        }
        match self {
            EntityRef::Mod(m) => m,
            EntityRef::Plain(_) => unreachable!(),
        }
    }

    pub fn content_type(&self) -> &str {
        self.base().content_type()
    }

    pub fn length(&self) -> Option<u64> {
        self.base().length()
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        match self {
            EntityRef::Plain(e) => e.last_modified(),
            EntityRef::Mod(m) => m.last_modified.or_else(|| m.base.last_modified()),
        }
    }

    pub fn expires(&self) -> Option<SystemTime> {
        match self {
            EntityRef::Plain(e) => e.expires(),
            EntityRef::Mod(m) => m.expires.or_else(|| m.base.expires()),
        }
    }

    pub fn etag(&self) -> Option<&str> {
        match self {
            EntityRef::Plain(e) => e.etag(),
            EntityRef::Mod(m) => m.etag.as_deref().or_else(|| m.base.etag()),
        }
    }

    pub fn etag_is_weak(&self) -> bool {
        match self {
            EntityRef::Plain(e) => e.etag_is_weak(),
            EntityRef::Mod(m) => m.etag_is_weak.unwrap_or_else(|| m.base.etag_is_weak()),
        }
    }

    /// The `ETag` header value: quoted, with the `W/` prefix when weak.
    pub fn wire_etag(&self) -> Option<String> {
        self.etag().map(|etag| {
            if self.etag_is_weak() {
                format!("W/\"{}\"", etag)
            } else {
                format!("\"{}\"", etag)
            }
        })
    }

    pub fn open(&self) -> Box<dyn ByteSource + Send> {
        self.base().open()
    }
}

// https://tools.ietf.org/html/rfc7232#section-2.3
// etagc = %x21 / %x23-7E; stored without the surrounding quotes.
pub(crate) fn check_etag(etag: &str) -> Result<(), Error> {
    let ok = etag
        .bytes()
        .all(|c| c == 0x21 || (0x23..=0x7e).contains(&c));
    if !ok {
        return Err(Error::User(format!("bad etag: {:?}", etag)));
    }
    Ok(())
}

/// IMF-fixdate, the HTTP date format: `Sun, 06 Nov 1994 08:49:37 GMT`.
pub(crate) fn http_date(t: SystemTime) -> String {
    DateTime::<Utc>::from(t)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}
