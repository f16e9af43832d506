// odata-batch - OData $batch request encoding and response decoding
//
// This library renders operations and changesets into a single multipart/mixed
// request and maps the multipart response back onto the operations that
// produced it.

// Re-export core functionality
pub use odata_batch_core::*;

// Re-exported so transport implementations need no extra dependency
pub use async_trait::async_trait;
pub use serde_json;

// Prelude for common imports
pub mod prelude {
    pub use odata_batch_core::prelude::*;

    pub use crate::{
        BoundaryGenerator, HttpRequestParts, SequenceBoundary, TransportResponse, async_trait,
    };
}
