//! Render context carrying the optional reference resolver.

use crate::{BatchError, Result};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of an [`Operation`](crate::Operation).
///
/// Clones of an operation share its handle. A handle does not keep the
/// operation alive; it is resolved against a changeset's member list at
/// render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationRef(u64);

impl OperationRef {
    pub(crate) fn next() -> Self {
        Self(NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for OperationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Maps a referenced operation to the token standing in for its eventual
/// identity (`$<Content-ID>`).
pub trait ReferenceResolver {
    fn resolve(&self, target: OperationRef) -> Result<String>;
}

/// State threaded through a render pass.
///
/// Operations rendered at batch level get a context without a resolver;
/// changesets supply one per member.
#[derive(Clone, Copy, Default)]
pub struct RenderContext<'a> {
    resolver: Option<&'a dyn ReferenceResolver>,
}

impl<'a> RenderContext<'a> {
    /// Context for an operation rendered outside any changeset.
    pub fn standalone() -> Self {
        Self { resolver: None }
    }

    pub fn with_resolver(resolver: &'a dyn ReferenceResolver) -> Self {
        Self {
            resolver: Some(resolver),
        }
    }

    /// Whether references can be resolved in this context.
    pub fn can_resolve(&self) -> bool {
        self.resolver.is_some()
    }

    /// Resolve `target` to its `$<Content-ID>` token.
    pub fn reference(&self, target: OperationRef) -> Result<String> {
        match self.resolver {
            Some(resolver) => resolver.resolve(target),
            None => Err(BatchError::UnresolvedReference),
        }
    }
}

impl fmt::Debug for RenderContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}
