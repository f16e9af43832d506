//! The outer `$batch` request.

use crate::boundary::{BoundaryGenerator, UuidBoundary};
use crate::headers::CRLF;
use crate::multipart::split_at_boundary;
use crate::response::{BatchResponse, PartResponse};
use crate::{BatchConfig, BatchError, Changeset, Headers, Operation, RenderContext, Result};
use std::fmt;

/// One top-level element of a batch.
#[derive(Debug, Clone)]
pub enum BatchPart {
    Operation(Operation),
    Changeset(Changeset),
}

impl BatchPart {
    /// Render the body part for this element.
    ///
    /// Operations are rendered without a resolver, so a top-level operation
    /// that references another one fails with
    /// [`BatchError::UnresolvedReference`].
    pub fn render(&self) -> Result<String> {
        match self {
            BatchPart::Operation(op) => op.render(&RenderContext::standalone()),
            BatchPart::Changeset(changeset) => Ok(changeset.to_http().to_string()),
        }
    }

    /// Parse the response part answering this element.
    pub fn parse_response(&self, part: &str) -> Result<PartResponse<'_>> {
        match self {
            BatchPart::Operation(op) => op.parse_response(part).map(PartResponse::Operation),
            BatchPart::Changeset(changeset) => {
                changeset.parse_response(part).map(PartResponse::Changeset)
            }
        }
    }
}

impl From<Operation> for BatchPart {
    fn from(op: Operation) -> Self {
        BatchPart::Operation(op)
    }
}

impl From<Changeset> for BatchPart {
    fn from(changeset: Changeset) -> Self {
        BatchPart::Changeset(changeset)
    }
}

/// A rendered `$batch` request.
///
/// Everything is rendered at construction; the accessors only hand out the
/// stored text.
///
/// ```
/// use odata_batch_core::{BatchRequest, Operation};
///
/// let batch = BatchRequest::builder("https://host/service/")
///     .operation(Operation::get("Customers").build().unwrap())
///     .build()
///     .unwrap();
///
/// assert_eq!(batch.url(), "https://host/service/$batch");
/// assert!(batch.body().contains("GET Customers HTTP/1.1"));
/// ```
#[derive(Debug, Clone)]
pub struct BatchRequest {
    parts: Vec<BatchPart>,
    url: String,
    boundary: String,
    headers: Headers,
    body: String,
    http: String,
}

impl BatchRequest {
    /// Build a request with default configuration and a random boundary.
    pub fn new(service_root: &str, parts: Vec<BatchPart>) -> Result<Self> {
        Self::builder(service_root).parts(parts).build()
    }

    pub fn builder(service_root: impl Into<String>) -> BatchRequestBuilder {
        BatchRequestBuilder::new(service_root.into())
    }

    /// The `$batch` endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Outer request headers, in send order.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The multipart body.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn parts(&self) -> &[BatchPart] {
        &self.parts
    }

    /// Value of the outer Content-Type header.
    pub fn content_type(&self) -> &str {
        self.headers.get("Content-Type").unwrap_or_default()
    }

    /// The complete HTTP request text.
    pub fn to_http(&self) -> &str {
        &self.http
    }

    /// Decode the multipart response to this request.
    ///
    /// `content_type` is the response's Content-Type header; without it the
    /// boundary is read from a Content-Type line at the head of `text`.
    /// Response parts are matched to request elements by position.
    pub fn parse_response(
        &self,
        text: &str,
        content_type: Option<&str>,
    ) -> Result<BatchResponse<'_>> {
        let parts = split_at_boundary(text, content_type)?;

        if parts.len() != self.parts.len() {
            tracing::error!(
                expected = self.parts.len(),
                actual = parts.len(),
                "Batch response part count mismatch"
            );
            return Err(BatchError::PartCountMismatch {
                expected: self.parts.len(),
                actual: parts.len(),
            });
        }

        let responses = self
            .parts
            .iter()
            .zip(parts)
            .map(|(element, part)| element.parse_response(part))
            .collect::<Result<Vec<_>>>()?;

        let response = BatchResponse::new(responses);
        tracing::debug!(
            boundary = %self.boundary,
            parts = response.parts.len(),
            has_error = response.has_error,
            "Parsed batch response"
        );

        Ok(response)
    }
}

impl fmt::Display for BatchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.http)
    }
}

/// Builder for [`BatchRequest`].
pub struct BatchRequestBuilder {
    service_root: String,
    parts: Vec<BatchPart>,
    config: BatchConfig,
    generator: Box<dyn BoundaryGenerator>,
}

impl BatchRequestBuilder {
    fn new(service_root: String) -> Self {
        Self {
            service_root,
            parts: Vec::new(),
            config: BatchConfig::default(),
            generator: Box::new(UuidBoundary),
        }
    }

    pub fn operation(mut self, op: Operation) -> Self {
        self.parts.push(BatchPart::Operation(op));
        self
    }

    pub fn changeset(mut self, changeset: Changeset) -> Self {
        self.parts.push(BatchPart::Changeset(changeset));
        self
    }

    pub fn part(mut self, part: impl Into<BatchPart>) -> Self {
        self.parts.push(part.into());
        self
    }

    pub fn parts<I>(mut self, parts: I) -> Self
    where
        I: IntoIterator<Item = BatchPart>,
    {
        self.parts.extend(parts);
        self
    }

    pub fn config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Source of the batch boundary id.
    pub fn boundary_generator(mut self, generator: impl BoundaryGenerator + 'static) -> Self {
        self.generator = Box::new(generator);
        self
    }

    /// Render the request.
    pub fn build(self) -> Result<BatchRequest> {
        if self.parts.is_empty() {
            return Err(BatchError::EmptyBatch);
        }

        let boundary = self.generator.batch_boundary();
        let url = format!("{}/$batch", self.service_root.trim_end_matches('/'));

        let mut headers = Headers::new();
        headers.append("OData-Version", self.config.odata_version.as_str());
        headers.append(
            "Content-Type",
            format!("multipart/mixed; boundary={}", boundary),
        );
        headers.append("Accept", self.config.accept.as_str());
        for (name, value) in &self.config.default_headers {
            headers.append(name.as_str(), value.as_str());
        }

        let body = render_body(&self.parts, &boundary)?;

        let mut http = String::with_capacity(body.len() + 256);
        http.push_str("POST ");
        http.push_str(&url);
        http.push_str(" HTTP/1.1");
        http.push_str(CRLF);
        headers.write_lines(&mut http);
        http.push_str(CRLF);
        http.push_str(&body);

        tracing::debug!(
            url = %url,
            boundary = %boundary,
            parts = self.parts.len(),
            "Rendered batch request"
        );

        Ok(BatchRequest {
            parts: self.parts,
            url,
            boundary,
            headers,
            body,
            http,
        })
    }
}

impl fmt::Debug for BatchRequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchRequestBuilder")
            .field("service_root", &self.service_root)
            .field("parts", &self.parts.len())
            .field("config", &self.config)
            .finish()
    }
}

fn render_body(parts: &[BatchPart], boundary: &str) -> Result<String> {
    let mut out = String::new();
    for (index, part) in parts.iter().enumerate() {
        let rendered = part.render()?;
        tracing::trace!(index, bytes = rendered.len(), "Rendered batch part");

        if index > 0 {
            out.push_str(CRLF);
        }
        out.push_str("--");
        out.push_str(boundary);
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
    use crate::{Path, SequenceBoundary};

    fn get(path: &str) -> Operation {
        Operation::get(path).build().unwrap()
    }

    fn fixed() -> SequenceBoundary {
        SequenceBoundary::fixed("36522ad7-fc75-4b56-8c71-56071383e77b")
    }

    #[test]
    fn test_empty_batch() {
        let err = BatchRequest::new("host/service", Vec::new()).unwrap_err();
        assert!(matches!(err, BatchError::EmptyBatch));
    }

    #[test]
    fn test_url_strips_trailing_slashes() {
        let batch = BatchRequest::new("host/service//", vec![get("Customers").into()]).unwrap();
        assert_eq!(batch.url(), "host/service/$batch");
    }

    #[test]
    fn test_headers_in_order() {
        let batch = BatchRequest::builder("host/service")
            .operation(get("Customers"))
            .config(
                BatchConfig::builder()
                    .default_header("Authorization", "Bearer token")
                    .build()
                    .unwrap(),
            )
            .boundary_generator(fixed())
            .build()
            .unwrap();

        let headers: Vec<_> = batch.headers().iter().collect();
        assert_eq!(
            headers,
            vec![
                ("OData-Version", "4.0"),
                (
                    "Content-Type",
                    "multipart/mixed; boundary=batch_36522ad7-fc75-4b56-8c71-56071383e77b"
                ),
                ("Accept", "multipart/mixed"),
                ("Authorization", "Bearer token"),
            ]
        );
        assert_eq!(batch.content_type(), headers[1].1);
    }

    #[test]
    fn test_render_get_only() {
        let batch = BatchRequest::builder("host/service")
            .operation(get("Customers('ALFKI')"))
            .operation(get("Products"))
            .boundary_generator(fixed())
            .build()
            .unwrap();

        assert_eq!(
            batch.to_http(),
            "POST host/service/$batch HTTP/1.1\r\n\
             OData-Version: 4.0\r\n\
             Content-Type: multipart/mixed; boundary=batch_36522ad7-fc75-4b56-8c71-56071383e77b\r\n\
             Accept: multipart/mixed\r\n\
             \r\n\
             --batch_36522ad7-fc75-4b56-8c71-56071383e77b\r\n\
             Content-Type: application/http\r\n\
             Content-Transfer-Encoding: binary\r\n\
             \r\n\
             GET Customers('ALFKI') HTTP/1.1\r\n\
             \r\n\
             \r\n\
             --batch_36522ad7-fc75-4b56-8c71-56071383e77b\r\n\
             Content-Type: application/http\r\n\
             Content-Transfer-Encoding: binary\r\n\
             \r\n\
             GET Products HTTP/1.1\r\n\
             \r\n\
             \r\n\
             --batch_36522ad7-fc75-4b56-8c71-56071383e77b--"
        );
        assert_eq!(batch.to_string(), batch.to_http());
        assert!(batch.to_http().ends_with(batch.body()));
    }

    #[test]
    fn test_top_level_reference_fails() {
        let customer = Operation::post("Customers").body("{}").build().unwrap();
        let order = Operation::post(Path::referencing(&customer, "Orders"))
            .body("{}")
            .build()
            .unwrap();

        let err = BatchRequest::new("host/service", vec![customer.into(), order.into()])
            .unwrap_err();
        assert!(matches!(err, BatchError::UnresolvedReference));
    }

    #[test]
    fn test_parse_part_count_mismatch() {
        let batch = BatchRequest::new("host/service", vec![get("A").into(), get("B").into()])
            .unwrap();
        let response = "--r\r\n\
                        Content-Type: application/http\r\n\
                        \r\n\
                        HTTP/1.1 200 OK\r\n\
                        \r\n\
                        {}\r\n\
                        --r--";

        let err = batch
            .parse_response(response, Some("multipart/mixed; boundary=r"))
            .unwrap_err();
        assert!(matches!(
            err,
            BatchError::PartCountMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_parse_missing_content_type() {
        let batch = BatchRequest::new("host/service", vec![get("A").into()]).unwrap();
        let err = batch.parse_response("--r\r\n--r--", None).unwrap_err();
        assert!(matches!(err, BatchError::MissingContentType));
    }
}
