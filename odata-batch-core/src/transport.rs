//! Pluggable HTTP transport for sending a rendered batch.
//!
//! This crate does not ship an HTTP client. Callers implement
//! [`BatchTransport`] on top of whatever client they already use and hand it
//! to [`BatchRequest::execute`].

use crate::response::BatchResponse;
use crate::{BatchError, BatchRequest, Headers, Result};
use async_trait::async_trait;
use serde::Serialize;

/// The outgoing request, ready to hand to an HTTP client.
#[derive(Debug, Clone, Serialize)]
pub struct HttpRequestParts {
    #[serde(serialize_with = "serialize_method")]
    pub method: http::Method,
    pub url: String,
    pub headers: Headers,
    pub body: String,
}

fn serialize_method<S: serde::Serializer>(
    method: &http::Method,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(method.as_str())
}

/// What the transport got back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    /// Value of the response Content-Type header.
    pub content_type: Option<String>,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a batch request over HTTP.
#[async_trait]
pub trait BatchTransport: Send + Sync {
    async fn send(&self, request: &HttpRequestParts) -> Result<TransportResponse>;
}

impl BatchRequest {
    /// The request as method, URL, headers and body.
    pub fn http_parts(&self) -> HttpRequestParts {
        HttpRequestParts {
            method: http::Method::POST,
            url: self.url().to_string(),
            headers: self.headers().clone(),
            body: self.body().to_string(),
        }
    }

    /// Send the request through `transport` and decode the response.
    ///
    /// A non-2xx status on the outer response means the service rejected the
    /// batch as a whole and fails with [`BatchError::BatchRejected`].
    pub async fn execute<T>(&self, transport: &T) -> Result<BatchResponse<'_>>
    where
        T: BatchTransport + ?Sized,
    {
        let request = self.http_parts();
        tracing::debug!(url = %request.url, boundary = %self.boundary(), "Sending batch request");

        let response = transport.send(&request).await.map_err(|e| {
            tracing::error!(error = %e, url = %request.url, "Batch transport failed");
            e
        })?;

        if !response.is_success() {
            tracing::warn!(status = response.status, "Batch request rejected");
            return Err(BatchError::BatchRejected {
                status: response.status,
                body: response.body,
            });
        }

        self.parse_response(&response.body, response.content_type.as_deref())
    }
}
