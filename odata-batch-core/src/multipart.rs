//! Multipart/mixed framing helpers.
//!
//! These work on borrowed text and never copy part contents: a split yields
//! slices of the original response.

use crate::{BatchError, Result};
use memchr::memmem;

/// Split a message at its first blank line into head and content.
///
/// Both CRLF and bare LF line endings are accepted. Without a blank line the
/// whole text is treated as head and the content is empty.
pub fn split_head(text: &str) -> (&str, &str) {
    let bytes = text.as_bytes();
    let crlf = memmem::find(bytes, b"\r\n\r\n");
    let lf = memmem::find(bytes, b"\n\n");

    match (crlf, lf) {
        (Some(c), Some(l)) if l < c => (&text[..l], &text[l + 2..]),
        (Some(c), _) => (&text[..c], &text[c + 4..]),
        (None, Some(l)) => (&text[..l], &text[l + 2..]),
        (None, None) => (text, ""),
    }
}

/// Iterate `(name, value)` pairs of a head section.
///
/// Lines without a colon (such as a status line) are skipped.
pub fn head_fields(head: &str) -> impl Iterator<Item = (&str, &str)> {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim(), value.trim()))
}

/// Look up a header in the head section of `text` (case-insensitive).
pub fn header_value<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let (head, _) = split_head(text);
    head_fields(head)
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

/// Extract the `boundary` parameter from a Content-Type value.
///
/// ```
/// use odata_batch_core::multipart::boundary_from_content_type;
///
/// let boundary = boundary_from_content_type("multipart/mixed; boundary=batch_42").unwrap();
/// assert_eq!(boundary, "batch_42");
/// ```
pub fn boundary_from_content_type(content_type: &str) -> Result<&str> {
    content_type
        .split(';')
        .map(str::trim)
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|boundary| !boundary.is_empty())
        .ok_or_else(|| BatchError::BoundaryNotFound(content_type.to_string()))
}

/// Whether the media type of a Content-Type value equals `expected`.
pub fn is_media_type(content_type: &str, expected: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|media| media.trim().eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

/// Split a multipart body into its parts.
///
/// The boundary comes from `content_type` when given, otherwise from the
/// Content-Type header in the head of `text`. Everything after the closing
/// delimiter `--<boundary>--` is ignored, as is the preamble before the first
/// delimiter. A delimiter line may carry trailing spaces or tabs. Each part
/// excludes the line break that precedes the next delimiter.
pub fn split_at_boundary<'a>(text: &'a str, content_type: Option<&str>) -> Result<Vec<&'a str>> {
    let content_type = match content_type {
        Some(ct) => ct,
        None => header_value(text, "Content-Type").ok_or(BatchError::MissingContentType)?,
    };
    let boundary = boundary_from_content_type(content_type)?;

    let delimiter = format!("--{}", boundary);
    let closing = format!("{}--", delimiter);

    let end = memmem::find(text.as_bytes(), closing.as_bytes()).unwrap_or(text.len());
    let body = &text[..end];
    let bytes = body.as_bytes();

    // Start offsets of each part's content, just past a delimiter line.
    let mut starts = Vec::new();
    let mut ends = Vec::new();
    for pos in memmem::find_iter(bytes, delimiter.as_bytes()) {
        if pos > 0 && bytes[pos - 1] != b'\n' {
            continue;
        }
        // Transport padding (spaces and tabs) may follow the delimiter.
        let after = pos
            + delimiter.len()
            + bytes[pos + delimiter.len()..]
                .iter()
                .take_while(|&&b| b == b' ' || b == b'\t')
                .count();
        let line_break = if bytes[after..].starts_with(b"\r\n") {
            2
        } else if bytes[after..].starts_with(b"\n") {
            1
        } else {
            continue;
        };
        ends.push(pos);
        starts.push(after + line_break);
    }
    ends.push(body.len());

    let parts: Vec<&str> = starts
        .iter()
        .zip(ends.iter().skip(1))
        .map(|(&start, &stop)| strip_trailing_line_break(&body[start..stop.max(start)]))
        .collect();

    tracing::trace!(boundary = %boundary, parts = parts.len(), "Split multipart body");

    Ok(parts)
}

fn strip_trailing_line_break(part: &str) -> &str {
    part.strip_suffix("\r\n")
        .or_else(|| part.strip_suffix('\n'))
        .unwrap_or(part)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_from_content_type() {
        assert_eq!(
            boundary_from_content_type("multipart/mixed;boundary=b_243234_25424_ef_892u748").unwrap(),
            "b_243234_25424_ef_892u748"
        );
        assert_eq!(
            boundary_from_content_type("multipart/mixed; Boundary=\"changeset_1\"; charset=utf-8")
                .unwrap(),
            "changeset_1"
        );
    }

    #[test]
    fn test_boundary_missing() {
        let err = boundary_from_content_type("multipart/mixed").unwrap_err();
        assert!(matches!(err, BatchError::BoundaryNotFound(_)));

        let err = boundary_from_content_type("multipart/mixed; boundary=").unwrap_err();
        assert!(matches!(err, BatchError::BoundaryNotFound(_)));
    }

    #[test]
    fn test_header_value_reads_head_only() {
        let text = "Content-Type: application/http\r\nContent-ID: 1\r\n\r\nHTTP/1.1 200 OK\r\nContent-ID: 9\r\n\r\n";
        assert_eq!(header_value(text, "content-id"), Some("1"));
        assert_eq!(header_value(text, "Content-Type"), Some("application/http"));
        assert_eq!(header_value(text, "Location"), None);
    }

    #[test]
    fn test_split_head_line_endings() {
        assert_eq!(split_head("A: 1\r\n\r\nbody"), ("A: 1", "body"));
        assert_eq!(split_head("A: 1\n\nbody"), ("A: 1", "body"));
        assert_eq!(split_head("A: 1"), ("A: 1", ""));
    }

    #[test]
    fn test_is_media_type() {
        assert!(is_media_type("application/http", "application/http"));
        assert!(is_media_type("Application/HTTP; msgtype=response", "application/http"));
        assert!(!is_media_type("multipart/mixed; boundary=x", "application/http"));
    }

    #[test]
    fn test_split_at_boundary() {
        let text = "preamble\r\n--b\r\nfirst\r\n--b\r\nsecond\r\n--b--\r\nepilogue";
        let parts = split_at_boundary(text, Some("multipart/mixed; boundary=b")).unwrap();
        assert_eq!(parts, vec!["first", "second"]);
    }

    #[test]
    fn test_split_at_boundary_from_header() {
        let text = "Content-Type: multipart/mixed; boundary=cs\r\n\r\n--cs\r\nContent-ID: 1\r\n\r\nx\r\n--cs--";
        let parts = split_at_boundary(text, None).unwrap();
        assert_eq!(parts, vec!["Content-ID: 1\r\n\r\nx"]);
    }

    #[test]
    fn test_split_ignores_longer_boundaries() {
        let text = "--b\r\none\r\n--bb\r\nstill one\r\n--b--";
        let parts = split_at_boundary(text, Some("multipart/mixed; boundary=b")).unwrap();
        assert_eq!(parts, vec!["one\r\n--bb\r\nstill one"]);
    }

    #[test]
    fn test_split_without_content_type() {
        let err = split_at_boundary("--b\r\nx\r\n--b--", None).unwrap_err();
        assert!(matches!(err, BatchError::MissingContentType));
    }

    #[test]
    fn test_split_tolerates_transport_padding() {
        let text = "--r  \r\nfirst\r\n--r\t\nsecond\r\n--r--";
        let parts = split_at_boundary(text, Some("multipart/mixed; boundary=r")).unwrap();
        assert_eq!(parts, vec!["first", "second"]);
    }
}
