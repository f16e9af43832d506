//! # OData Batch Core
//!
//! Encoding of OData `$batch` requests and decoding of their multipart
//! responses.
//!
//! ## Features
//!
//! - **Operations**: GET, POST, PUT, PATCH and DELETE requests rendered as `application/http` parts
//! - **Changesets**: Atomic groups with Content-ID numbering and `$<id>` references
//! - **Response Decoding**: Positional matching for batch parts, Content-ID matching inside changesets
//! - **Transport Agnostic**: Plug in any HTTP client through [`BatchTransport`]
//!
//! ## Quick Start
//!
//! ```rust
//! use odata_batch_core::{BatchRequest, Changeset, Operation, Path};
//!
//! fn main() -> odata_batch_core::Result<()> {
//!     let customer = Operation::post("Customers")
//!         .json(&serde_json::json!({"CustomerID": "ALFKI"}))
//!         .build()?;
//!     let order = Operation::post(Path::referencing(&customer, "Orders"))
//!         .json(&serde_json::json!({"OrderID": 1}))
//!         .build()?;
//!
//!     let batch = BatchRequest::builder("https://host/service")
//!         .operation(Operation::get("Products").build()?)
//!         .changeset(Changeset::new(vec![customer, order])?)
//!         .build()?;
//!
//!     assert!(batch.body().contains("POST $1/Orders HTTP/1.1"));
//!     Ok(())
//! }
//! ```
//!
//! ## Decoding a Response
//!
//! ```rust,no_run
//! use odata_batch_core::BatchRequest;
//!
//! fn handle(batch: &BatchRequest, body: &str, content_type: &str) -> odata_batch_core::Result<()> {
//!     let response = batch.parse_response(body, Some(content_type))?;
//!     if response.has_error {
//!         for leaf in response.leaves().filter(|leaf| leaf.status() >= 400) {
//!             eprintln!("{}: {}", leaf.status(), leaf.body());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod body_part;
pub mod boundary;
mod changeset;
mod config;
mod context;
mod error;
mod headers;
mod method;
pub mod multipart;
mod operation;
mod request;
mod response;
mod transport;

pub use boundary::{BoundaryGenerator, SequenceBoundary, UuidBoundary};
pub use changeset::Changeset;
pub use config::{BatchConfig, BatchConfigBuilder, ENV_ACCEPT, ENV_ODATA_VERSION};
pub use context::{OperationRef, ReferenceResolver, RenderContext};
pub use error::{BatchError, Result};
pub use headers::{Header, Headers};
pub use method::Method;
pub use operation::{Body, BodyFn, Operation, OperationBuilder, Path};
pub use request::{BatchPart, BatchRequest, BatchRequestBuilder};
pub use response::{
    BatchResponse, ChangesetFailure, ChangesetResponse, Leaf, OperationResponse, PartResponse,
};
pub use transport::{BatchTransport, HttpRequestParts, TransportResponse};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        BatchConfig, BatchError, BatchPart, BatchRequest, BatchResponse, BatchTransport,
        Changeset, ChangesetResponse, Method, Operation, OperationResponse, PartResponse, Path,
        Result,
    };
}
