//! Atomic groups of operations.
//!
//! A changeset is rendered as a nested `multipart/mixed` body. Each member
//! gets `Content-ID: <index + 1>`, which is also how later members refer to
//! the entities earlier members create (`$1`, `$2`, ...), and how responses
//! are matched back to members regardless of the order the service answers
//! in.

use crate::boundary::{BoundaryGenerator, UuidBoundary};
use crate::headers::CRLF;
use crate::multipart::{header_value, is_media_type, split_at_boundary};
use crate::response::{ChangesetFailure, ChangesetResponse, OperationResponse};
use crate::{
    BatchError, Operation, OperationRef, ReferenceResolver, RenderContext, Result, body_part,
};
use std::fmt;

/// Content-ID of the member at `index`.
fn content_id(index: usize) -> usize {
    index + 1
}

/// Resolves references for the member at `position`: only members strictly
/// before it may be referenced.
struct MemberResolver<'a> {
    members: &'a [Operation],
    position: usize,
}

impl ReferenceResolver for MemberResolver<'_> {
    fn resolve(&self, target: OperationRef) -> Result<String> {
        let index = self
            .members
            .iter()
            .position(|op| op.handle() == target)
            .ok_or(BatchError::ReferenceNotFound)?;

        if index >= self.position {
            return Err(BatchError::ForwardReference {
                referenced: index,
                position: self.position,
            });
        }

        Ok(format!("${}", content_id(index)))
    }
}

/// An ordered, all-or-nothing group of operations.
#[derive(Debug, Clone)]
pub struct Changeset {
    operations: Vec<Operation>,
    boundary: String,
    http: String,
}

impl Changeset {
    /// Create a changeset with a random boundary.
    pub fn new(operations: Vec<Operation>) -> Result<Self> {
        Self::with_generator(operations, &UuidBoundary)
    }

    /// Create a changeset drawing its boundary from `generator`.
    pub fn with_generator(
        operations: Vec<Operation>,
        generator: &dyn BoundaryGenerator,
    ) -> Result<Self> {
        if operations.is_empty() {
            return Err(BatchError::EmptyChangeset);
        }
        Self::with_boundary(operations, generator.changeset_boundary())
    }

    /// Create a changeset with an explicit boundary.
    ///
    /// Fails if the list is empty or if any member references an operation
    /// that is not an earlier member.
    pub fn with_boundary(operations: Vec<Operation>, boundary: impl Into<String>) -> Result<Self> {
        if operations.is_empty() {
            return Err(BatchError::EmptyChangeset);
        }
        let boundary = boundary.into();
        let http = render(&operations, &boundary)?;

        tracing::debug!(
            boundary = %boundary,
            operations = operations.len(),
            "Rendered changeset"
        );

        Ok(Self {
            operations,
            boundary,
            http,
        })
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Content-ID assigned to `operation`, if it is a member.
    pub fn content_id_of(&self, operation: OperationRef) -> Option<usize> {
        self.operations
            .iter()
            .position(|op| op.handle() == operation)
            .map(content_id)
    }

    /// The rendered changeset part, starting with its own Content-Type.
    pub fn to_http(&self) -> &str {
        &self.http
    }

    /// Parse the batch part answering this changeset.
    ///
    /// A part that is itself `application/http` means the service answered
    /// the changeset as a whole; otherwise each member is matched to the
    /// sub-response carrying its Content-ID.
    pub fn parse_response(&self, part: &str) -> Result<ChangesetResponse<'_>> {
        if header_value(part, "Content-Type").is_some_and(|ct| is_media_type(ct, "application/http")) {
            let failure = body_part::parse(part)?;
            tracing::debug!(
                boundary = %self.boundary,
                status = failure.status,
                "Changeset answered as a whole"
            );
            return Ok(ChangesetResponse::Failed(ChangesetFailure::from_part(
                self, failure,
            )));
        }

        let mut parts = split_at_boundary(part, None)?
            .into_iter()
            .map(|p| body_part::parse(p).map(Some))
            .collect::<Result<Vec<_>>>()?;

        let mut responses = Vec::with_capacity(self.operations.len());
        for (index, operation) in self.operations.iter().enumerate() {
            let expected = content_id(index).to_string();
            let found = parts
                .iter_mut()
                .find(|slot| {
                    matches!(slot, Some(p) if p.content_id.as_deref().is_some_and(|id| id.trim() == expected))
                })
                .and_then(Option::take)
                .ok_or(BatchError::MissingResponse {
                    content_id: content_id(index),
                })?;

            responses.push(OperationResponse::from_part(operation, found));
        }

        Ok(ChangesetResponse::Completed(responses))
    }
}

impl fmt::Display for Changeset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.http)
    }
}

fn render(operations: &[Operation], boundary: &str) -> Result<String> {
    let mut out = String::with_capacity(256 * operations.len());
    out.push_str("Content-Type: multipart/mixed; boundary=");
    out.push_str(boundary);
    out.push_str(CRLF);
    out.push_str(CRLF);

    for (position, operation) in operations.iter().enumerate() {
        let resolver = MemberResolver {
            members: operations,
            position,
        };
        let rendered = operation.render(&RenderContext::with_resolver(&resolver))?;

        if position > 0 {
            out.push_str(CRLF);
        }
        out.push_str("--");
        out.push_str(boundary);
        out.push_str(CRLF);
        out.push_str("Content-ID: ");
        out.push_str(&content_id(position).to_string());
        out.push_str(CRLF);
        out.push_str(&rendered);
    }

    out.push_str(CRLF);
    out.push_str("--");
    out.push_str(boundary);
    out.push_str("--");

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Path;

    fn post(path: &str) -> Operation {
        Operation::post(path).body("{}").build().unwrap()
    }

    #[test]
    fn test_empty_changeset() {
        let err = Changeset::new(Vec::new()).unwrap_err();
        assert!(matches!(err, BatchError::EmptyChangeset));
    }

    #[test]
    fn test_render() {
        let changeset = Changeset::with_boundary(
            vec![
                Operation::post("Customers")
                    .header("Content-Type", "application/atom+xml;type=entry")
                    .body("<AtomPub representation of a new Customer>")
                    .build()
                    .unwrap(),
                Operation::patch("Customers('ALFKI')")
                    .header("Content-Type", "application/json")
                    .body("<JSON representation of Customer ALFKI>")
                    .build()
                    .unwrap(),
            ],
            "changeset_77162fcd-b8da-41ac-a9f8-9357efbbd",
        )
        .unwrap();

        assert_eq!(
            changeset.to_http(),
            "Content-Type: multipart/mixed; boundary=changeset_77162fcd-b8da-41ac-a9f8-9357efbbd\r\n\
             \r\n\
             --changeset_77162fcd-b8da-41ac-a9f8-9357efbbd\r\n\
             Content-ID: 1\r\n\
             Content-Type: application/http\r\n\
             Content-Transfer-Encoding: binary\r\n\
             \r\n\
             POST Customers HTTP/1.1\r\n\
             Content-Type: application/atom+xml;type=entry\r\n\
             \r\n\
             <AtomPub representation of a new Customer>\r\n\
             --changeset_77162fcd-b8da-41ac-a9f8-9357efbbd\r\n\
             Content-ID: 2\r\n\
             Content-Type: application/http\r\n\
             Content-Transfer-Encoding: binary\r\n\
             \r\n\
             PATCH Customers('ALFKI') HTTP/1.1\r\n\
             Content-Type: application/json\r\n\
             \r\n\
             <JSON representation of Customer ALFKI>\r\n\
             --changeset_77162fcd-b8da-41ac-a9f8-9357efbbd--"
        );
    }

    #[test]
    fn test_content_ids_follow_list_order() {
        let ops: Vec<_> = (0..4).map(|i| post(&format!("Items({})", i))).collect();
        let handles: Vec<_> = ops.iter().map(Operation::handle).collect();
        let changeset = Changeset::with_boundary(ops, "cs").unwrap();

        for (index, handle) in handles.into_iter().enumerate() {
            assert_eq!(changeset.content_id_of(handle), Some(index + 1));
            assert!(changeset.to_http().contains(&format!("Content-ID: {}\r\n", index + 1)));
        }
    }

    #[test]
    fn test_path_reference_resolves_to_content_id() {
        let customer = post("Customers");
        let order = Operation::post(Path::referencing(&customer, "Orders"))
            .body("{}")
            .build()
            .unwrap();

        let changeset = Changeset::with_boundary(vec![customer, order], "cs").unwrap();
        assert!(changeset.to_http().contains("POST $1/Orders HTTP/1.1"));
    }

    #[test]
    fn test_forward_reference() {
        let customer = post("Customers");
        let order = Operation::post(Path::referencing(&customer, "Orders"))
            .body("{}")
            .build()
            .unwrap();

        let err = Changeset::with_boundary(vec![order, customer], "cs").unwrap_err();
        assert!(matches!(
            err,
            BatchError::ForwardReference {
                referenced: 1,
                position: 0
            }
        ));
    }

    #[test]
    fn test_self_reference() {
        let resolver = MemberResolver {
            members: &[post("Customers")],
            position: 0,
        };
        let target = resolver.members[0].handle();
        let err = resolver.resolve(target).unwrap_err();
        assert!(matches!(
            err,
            BatchError::ForwardReference {
                referenced: 0,
                position: 0
            }
        ));
    }

    #[test]
    fn test_reference_not_found() {
        let outsider = post("Customers");
        let order = Operation::post(Path::referencing(&outsider, "Orders"))
            .body("{}")
            .build()
            .unwrap();

        let err = Changeset::with_boundary(vec![post("Products"), order], "cs").unwrap_err();
        assert!(matches!(err, BatchError::ReferenceNotFound));
    }

    #[test]
    fn test_parse_matches_by_content_id() {
        let first = post("Customers");
        let second = post("Orders");
        let changeset = Changeset::with_boundary(vec![first, second], "cs").unwrap();

        let response = "Content-Type: multipart/mixed; boundary=changesetresponse_1\r\n\
                        \r\n\
                        --changesetresponse_1\r\n\
                        Content-Type: application/http\r\n\
                        Content-ID: 2\r\n\
                        \r\n\
                        HTTP/1.1 201 Created\r\n\
                        \r\n\
                        second\r\n\
                        --changesetresponse_1\r\n\
                        Content-Type: application/http\r\n\
                        Content-ID: 1\r\n\
                        \r\n\
                        HTTP/1.1 204 No Content\r\n\
                        \r\n\
                        \r\n\
                        --changesetresponse_1--";

        let ChangesetResponse::Completed(responses) = changeset.parse_response(response).unwrap()
        else {
            panic!("expected per-operation responses");
        };

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].status, 204);
        assert_eq!(responses[0].operation.handle(), changeset.operations()[0].handle());
        assert_eq!(responses[1].status, 201);
        assert_eq!(responses[1].body, "second");
    }

    #[test]
    fn test_parse_missing_response() {
        let changeset = Changeset::with_boundary(vec![post("A"), post("B")], "cs").unwrap();
        let response = "Content-Type: multipart/mixed; boundary=r\r\n\
                        \r\n\
                        --r\r\n\
                        Content-Type: application/http\r\n\
                        Content-ID: 1\r\n\
                        \r\n\
                        HTTP/1.1 201 Created\r\n\
                        \r\n\
                        --r--";

        let err = changeset.parse_response(response).unwrap_err();
        assert!(matches!(err, BatchError::MissingResponse { content_id: 2 }));
    }

    #[test]
    fn test_parse_whole_changeset_failure() {
        let changeset = Changeset::with_boundary(vec![post("A"), post("B")], "cs").unwrap();
        let response = "Content-Type: application/http\r\n\
                        Content-Transfer-Encoding: binary\r\n\
                        \r\n\
                        HTTP/1.1 400 Bad Request\r\n\
                        Content-Type: application/json\r\n\
                        \r\n\
                        {\"error\": {\"code\": \"400\"}}\r\n";

        let parsed = changeset.parse_response(response).unwrap();
        assert!(parsed.is_failed());
        assert!(parsed.operations().is_empty());

        let ChangesetResponse::Failed(failure) = parsed else {
            panic!("expected an aggregate failure");
        };
        assert_eq!(failure.status, 400);
        assert_eq!(failure.changeset.boundary(), "cs");
        let body: serde_json::Value = failure.json().unwrap();
        assert_eq!(body["error"]["code"], "400");
    }
}
