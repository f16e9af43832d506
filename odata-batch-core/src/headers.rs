//! Ordered header list.
//!
//! Batch parts are rendered byte-for-byte, so headers keep their insertion
//! order and the casing the caller supplied. Lookups are case-insensitive.
//! Operation parts rarely carry more than a handful of headers, so they are
//! stored inline in a `SmallVec`.

use serde::{Serialize, Serializer, ser::SerializeMap};
use smallvec::SmallVec;
use std::fmt;

/// Number of headers stored inline before spilling to the heap.
pub const INLINE_HEADERS: usize = 8;

/// Line terminator used throughout the multipart framing.
pub const CRLF: &str = "\r\n";

/// A header name-value pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Header {
    /// Header name as supplied
    pub name: String,
    /// Header value
    pub value: String,
}

impl Header {
    #[inline]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Check if name matches (case-insensitive)
    #[inline]
    pub fn name_eq(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// Ordered, case-insensitive header list.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: SmallVec<[Header; INLINE_HEADERS]>,
}

impl Headers {
    #[inline]
    pub const fn new() -> Self {
        Self {
            inner: SmallVec::new_const(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Get header value by name (case-insensitive).
    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|h| h.name_eq(name))
            .map(|h| h.value.as_str())
    }

    /// Check if header exists (case-insensitive).
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|h| h.name_eq(name))
    }

    /// Insert a header, replacing the value of an existing header with the
    /// same name in place so that rendering order is preserved.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();

        for h in &mut self.inner {
            if h.name_eq(&name) {
                return Some(std::mem::replace(&mut h.value, value));
            }
        }

        self.inner.push(Header { name, value });
        None
    }

    /// Append a header (allows duplicates).
    #[inline]
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push(Header::new(name, value));
    }

    /// All values of a header, in order (case-insensitive).
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.inner
            .iter()
            .filter(move |h| h.name_eq(name))
            .map(|h| h.value.as_str())
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner
            .iter()
            .map(|h| (h.name.as_str(), h.value.as_str()))
    }

    /// Render as `Name: value` lines, each terminated by CRLF.
    pub fn write_lines(&self, out: &mut String) {
        for h in &self.inner {
            out.push_str(&h.name);
            out.push_str(": ");
            out.push_str(&h.value);
            out.push_str(CRLF);
        }
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.iter()).finish()
    }
}

/// Collecting appends, so repeated names are all kept.
impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        headers.extend(iter);
        headers
    }
}

impl<K, V> Extend<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.append(k, v);
        }
    }
}

impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.inner.len()))?;
        for h in &self.inner {
            map.serialize_entry(&h.name, &h.value)?;
        }
        map.end()
    }
}
