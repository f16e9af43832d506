//! Batch encoding and decoding error types.

use crate::Method;
use thiserror::Error;

/// Result type for batch operations.
pub type Result<T> = std::result::Result<T, BatchError>;

/// Errors raised while building a batch request or parsing its response.
///
/// Every variant is a hard failure. Operation-level HTTP failures inside a
/// successfully parsed response are reported through
/// [`BatchResponse::has_error`](crate::BatchResponse::has_error) instead.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Method is not one of GET, POST, PUT, PATCH or DELETE.
    #[error("Invalid method \"{0}\", expected one of GET, POST, PUT, PATCH, DELETE")]
    InvalidMethod(String),

    /// A body was supplied for a method that cannot carry one.
    #[error("Method {0} cannot include a body")]
    BodyNotAllowed(Method),

    /// Batch request constructed without any operation or changeset.
    #[error("Batch request must contain at least one operation or changeset")]
    EmptyBatch,

    /// Changeset constructed without any operation.
    #[error("Changeset must contain at least one operation")]
    EmptyChangeset,

    /// Referenced operation is not a member of the same changeset.
    #[error("Referenced operation is not part of the changeset")]
    ReferenceNotFound,

    /// Referenced operation does not come before the referencing one.
    #[error(
        "Referenced operation at position {referenced} must come before the operation at position {position}"
    )]
    ForwardReference {
        /// Index of the referenced operation.
        referenced: usize,
        /// Index of the referencing operation.
        position: usize,
    },

    /// An operation reference was rendered outside of any changeset.
    #[error("Operation references can only be resolved inside a changeset")]
    UnresolvedReference,

    /// No content type was supplied or found in the response.
    #[error("Could not find content type header")]
    MissingContentType,

    /// The content type carries no boundary parameter.
    #[error("Boundary could not be found in content type: {0}")]
    BoundaryNotFound(String),

    /// Number of response parts differs from the number of request elements.
    #[error("Expected {expected} response parts, found {actual}")]
    PartCountMismatch {
        /// Number of elements in the batch request.
        expected: usize,
        /// Number of parts found in the response.
        actual: usize,
    },

    /// A changeset response has no part for an operation.
    #[error("Missing response for changeset operation with Content-ID {content_id}")]
    MissingResponse {
        /// Content-ID that was expected.
        content_id: usize,
    },

    /// A body part declared a content type other than `application/http`.
    #[error("Unexpected operation content type: {0}")]
    UnexpectedContentType(String),

    /// A body part or embedded HTTP response could not be parsed.
    #[error("Malformed body part: {0}")]
    MalformedPart(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport collaborator failed to deliver the request.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service rejected the batch as a whole.
    #[error("Batch request rejected: {status} - {body}")]
    BatchRejected {
        /// HTTP status of the outer response.
        status: u16,
        /// Outer response body.
        body: String,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BatchError {
    /// Check if this error comes from cross-operation reference resolution.
    pub fn is_reference_error(&self) -> bool {
        matches!(
            self,
            Self::ReferenceNotFound | Self::ForwardReference { .. } | Self::UnresolvedReference
        )
    }

    /// Check if this error was raised while decoding a response.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::MissingContentType
                | Self::BoundaryNotFound(_)
                | Self::PartCountMismatch { .. }
                | Self::MissingResponse { .. }
                | Self::UnexpectedContentType(_)
                | Self::MalformedPart(_)
        )
    }
}

impl From<httparse::Error> for BatchError {
    fn from(err: httparse::Error) -> Self {
        Self::MalformedPart(err.to_string())
    }
}
