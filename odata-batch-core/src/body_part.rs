//! Parsing of a single `application/http` body part.
//!
//! A body part is a MIME head (Content-Type, optional Content-ID) followed by
//! a complete HTTP response message:
//!
//! ```text
//! Content-Type: application/http
//! Content-ID: 1
//!
//! HTTP/1.1 201 Created
//! Location: http://host/service/Customers('ALFKI')
//!
//! {"CustomerID": "ALFKI"}
//! ```

use crate::multipart::{head_fields, is_media_type, split_head};
use crate::{BatchError, Headers, Result};

/// Maximum number of headers accepted in an embedded response.
const MAX_HEADERS: usize = 64;

/// A decoded body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    /// Status code from the embedded status line.
    pub status: u16,
    /// Reason phrase from the embedded status line.
    pub reason: String,
    /// Content-ID of the part, if any.
    pub content_id: Option<String>,
    /// Headers of the embedded response.
    pub headers: Headers,
    /// Embedded response body, trimmed.
    pub body: String,
}

/// Parse one `application/http` body part.
pub fn parse(part: &str) -> Result<BodyPart> {
    let (head, content) = split_head(part);

    let mut content_type = None;
    let mut content_id = None;
    for (name, value) in head_fields(head) {
        if name.eq_ignore_ascii_case("Content-Type") {
            content_type = Some(value);
        } else if name.eq_ignore_ascii_case("Content-ID") {
            content_id = Some(value.to_string());
        }
    }

    match content_type {
        Some(ct) if is_media_type(ct, "application/http") => {}
        Some(ct) => return Err(BatchError::UnexpectedContentType(ct.to_string())),
        None => return Err(BatchError::UnexpectedContentType("none".to_string())),
    }

    let mut part = parse_http_response(content)?;

    if content_id.is_none() {
        content_id = part.headers.get("Content-ID").map(str::to_string);
        if content_id.is_some() {
            tracing::warn!("Content-ID taken from embedded response headers");
        }
    }
    part.content_id = content_id;

    Ok(part)
}

/// Parse an HTTP response message (status line, headers, body).
pub fn parse_http_response(message: &str) -> Result<BodyPart> {
    let (head, body) = split_head(message.trim_start());

    // httparse needs the terminating blank line, which split_head consumed.
    let mut buf = String::with_capacity(head.len() + 4);
    buf.push_str(head);
    buf.push_str("\r\n\r\n");

    let mut raw_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut response = httparse::Response::new(&mut raw_headers);

    match response.parse(buf.as_bytes())? {
        httparse::Status::Complete(_) => {}
        httparse::Status::Partial => {
            return Err(BatchError::MalformedPart(format!(
                "incomplete response head: {:?}",
                head
            )));
        }
    }

    let status = response
        .code
        .ok_or_else(|| BatchError::MalformedPart(format!("missing status code: {:?}", head)))?;

    let mut headers = Headers::new();
    for h in response.headers.iter().filter(|h| !h.name.is_empty()) {
        headers.append(h.name, String::from_utf8_lossy(h.value));
    }

    Ok(BodyPart {
        status,
        reason: response.reason.unwrap_or_default().to_string(),
        content_id: None,
        headers,
        body: body.trim().to_string(),
    })
}
