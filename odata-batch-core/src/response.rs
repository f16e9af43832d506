//! Decoded batch response types.
//!
//! Results borrow the request elements that produced them, so each response
//! can be traced back to its [`Operation`] or [`Changeset`].

use crate::body_part::BodyPart;
use crate::{Changeset, Headers, Operation, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Response to a single operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationResponse<'a> {
    /// The operation this response answers.
    pub operation: &'a Operation,
    /// HTTP status code.
    pub status: u16,
    /// Reason phrase of the status line.
    pub reason: String,
    /// Content-ID of the answering part, for changeset members.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    /// Response headers.
    pub headers: Headers,
    /// Response body, trimmed.
    pub body: String,
}

impl<'a> OperationResponse<'a> {
    pub(crate) fn from_part(operation: &'a Operation, part: BodyPart) -> Self {
        Self {
            operation,
            status: part.status,
            reason: part.reason,
            content_id: part.content_id,
            headers: part.headers,
            body: part.body,
        }
    }

    /// Typed status code, if the numeric status is a valid one.
    pub fn status_code(&self) -> Option<http::StatusCode> {
        http::StatusCode::from_u16(self.status).ok()
    }

    /// Check if the operation succeeded (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the operation failed (status >= 400).
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// Parse the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// A changeset answered as a whole, typically because it was rolled back.
#[derive(Debug, Clone, Serialize)]
pub struct ChangesetFailure<'a> {
    #[serde(skip)]
    pub changeset: &'a Changeset,
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
    pub body: String,
}

impl<'a> ChangesetFailure<'a> {
    pub(crate) fn from_part(changeset: &'a Changeset, part: BodyPart) -> Self {
        Self {
            changeset,
            status: part.status,
            reason: part.reason,
            headers: part.headers,
            body: part.body,
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Response to a changeset.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ChangesetResponse<'a> {
    /// One response per operation, in request order.
    Completed(Vec<OperationResponse<'a>>),
    /// A single response for the whole changeset.
    Failed(ChangesetFailure<'a>),
}

impl<'a> ChangesetResponse<'a> {
    pub fn is_failed(&self) -> bool {
        matches!(self, ChangesetResponse::Failed(_))
    }

    /// Per-operation responses, empty when the changeset failed as a whole.
    pub fn operations(&self) -> &[OperationResponse<'a>] {
        match self {
            ChangesetResponse::Completed(responses) => responses,
            ChangesetResponse::Failed(_) => &[],
        }
    }
}

/// Response to one top-level batch element.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PartResponse<'a> {
    Operation(OperationResponse<'a>),
    Changeset(ChangesetResponse<'a>),
}

/// A leaf of the response tree: something that carries a status.
#[derive(Debug, Clone, Copy)]
pub enum Leaf<'r, 'a> {
    Operation(&'r OperationResponse<'a>),
    ChangesetFailure(&'r ChangesetFailure<'a>),
}

impl<'r> Leaf<'r, '_> {
    pub fn status(&self) -> u16 {
        match self {
            Leaf::Operation(response) => response.status,
            Leaf::ChangesetFailure(failure) => failure.status,
        }
    }

    pub fn body(&self) -> &'r str {
        match *self {
            Leaf::Operation(response) => &response.body,
            Leaf::ChangesetFailure(failure) => &failure.body,
        }
    }
}

/// Decoded `$batch` response.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse<'a> {
    /// One entry per request element, in request order.
    pub parts: Vec<PartResponse<'a>>,
    /// Whether any leaf carries a status of 400 or above.
    pub has_error: bool,
}

impl<'a> BatchResponse<'a> {
    pub(crate) fn new(parts: Vec<PartResponse<'a>>) -> Self {
        let mut response = Self {
            parts,
            has_error: false,
        };
        let has_error = response.leaves().any(|leaf| leaf.status() >= 400);
        response.has_error = has_error;
        response
    }

    /// Flatten the response tree into its leaves, in request order.
    pub fn leaves(&self) -> impl Iterator<Item = Leaf<'_, 'a>> + '_ {
        self.parts.iter().flat_map(|part| {
            let leaves: Vec<Leaf<'_, 'a>> = match part {
                PartResponse::Operation(response) => vec![Leaf::Operation(response)],
                PartResponse::Changeset(ChangesetResponse::Completed(responses)) => {
                    responses.iter().map(Leaf::Operation).collect()
                }
                PartResponse::Changeset(ChangesetResponse::Failed(failure)) => {
                    vec![Leaf::ChangesetFailure(failure)]
                }
            };
            leaves
        })
    }

    /// Leaf statuses in request order.
    pub fn statuses(&self) -> Vec<u16> {
        self.leaves().map(|leaf| leaf.status()).collect()
    }

    /// All operation responses, skipping changesets that failed as a whole.
    pub fn operations(&self) -> impl Iterator<Item = &OperationResponse<'a>> + '_ {
        self.leaves().filter_map(|leaf| match leaf {
            Leaf::Operation(response) => Some(response),
            Leaf::ChangesetFailure(_) => None,
        })
    }
}
