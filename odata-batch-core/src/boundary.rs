//! Multipart boundary tokens.
//!
//! Boundaries are `batch_<id>` for the outer body and `changeset_<id>` for
//! each nested changeset body. The id source is pluggable; the only
//! requirement is that ids are unique per request.
//!
//! A boundary that happens to occur literally inside an operation body
//! corrupts the framing. Ids are not checked against operation bodies; uuid v4
//! ids make a collision practically impossible.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Prefix of the outer batch boundary.
pub const BATCH_PREFIX: &str = "batch_";

/// Prefix of a changeset boundary.
pub const CHANGESET_PREFIX: &str = "changeset_";

/// Source of unique boundary ids.
pub trait BoundaryGenerator: Send + Sync {
    /// Produce the next id.
    fn next_id(&self) -> String;

    /// Produce a batch boundary.
    fn batch_boundary(&self) -> String {
        format!("{}{}", BATCH_PREFIX, self.next_id())
    }

    /// Produce a changeset boundary.
    fn changeset_boundary(&self) -> String {
        format!("{}{}", CHANGESET_PREFIX, self.next_id())
    }
}

impl<T: BoundaryGenerator + ?Sized> BoundaryGenerator for Arc<T> {
    fn next_id(&self) -> String {
        (**self).next_id()
    }
}

/// Random uuid v4 ids (the default).
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidBoundary;

impl BoundaryGenerator for UuidBoundary {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Hands out a fixed list of ids in order, repeating the last one once the
/// list is exhausted.
///
/// Used to render byte-stable requests in tests and snapshots.
#[derive(Debug)]
pub struct SequenceBoundary {
    ids: Mutex<VecDeque<String>>,
    last: Mutex<String>,
}

impl SequenceBoundary {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: Mutex::new(ids.into_iter().map(Into::into).collect()),
            last: Mutex::new(String::new()),
        }
    }

    /// Always return the same id.
    pub fn fixed(id: impl Into<String>) -> Self {
        Self::new([id])
    }
}

impl BoundaryGenerator for SequenceBoundary {
    fn next_id(&self) -> String {
        let mut last = self.last.lock();
        if let Some(id) = self.ids.lock().pop_front() {
            *last = id;
        }
        last.clone()
    }
}
