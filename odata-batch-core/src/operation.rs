//! A single HTTP operation embedded in a batch.

use crate::headers::CRLF;
use crate::response::OperationResponse;
use crate::{BatchError, Headers, Method, OperationRef, RenderContext, Result, body_part};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Body function evaluated at render time.
pub type BodyFn = dyn Fn(&RenderContext<'_>) -> Result<String> + Send + Sync;

/// Request path of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Path {
    /// Literal path relative to the service root.
    Literal(String),
    /// Path relative to the entity created by an earlier changeset sibling,
    /// rendered as `$<Content-ID>/<suffix>`.
    Reference {
        target: OperationRef,
        suffix: String,
    },
}

impl Path {
    /// Path below the resource produced by `target`.
    pub fn referencing(target: &Operation, suffix: impl Into<String>) -> Self {
        Path::Reference {
            target: target.handle(),
            suffix: suffix.into(),
        }
    }

    /// Handle of the referenced operation, if any.
    pub fn reference(&self) -> Option<OperationRef> {
        match self {
            Path::Literal(_) => None,
            Path::Reference { target, .. } => Some(*target),
        }
    }

    fn resolve<'p>(&'p self, ctx: &RenderContext<'_>) -> Result<Cow<'p, str>> {
        match self {
            Path::Literal(path) => Ok(Cow::Borrowed(path)),
            Path::Reference { target, suffix } => {
                Ok(Cow::Owned(format!("{}/{}", ctx.reference(*target)?, suffix)))
            }
        }
    }
}

impl From<&str> for Path {
    fn from(path: &str) -> Self {
        Path::Literal(path.to_string())
    }
}

impl From<String> for Path {
    fn from(path: String) -> Self {
        Path::Literal(path)
    }
}

/// Request body of an operation.
#[derive(Clone)]
pub enum Body {
    Text(String),
    /// Computed at render time, so it may embed `$<Content-ID>` tokens of
    /// earlier changeset siblings via [`RenderContext::reference`].
    Deferred(Arc<BodyFn>),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Text(text) if text.is_empty())
    }

    fn render<'b>(&'b self, ctx: &RenderContext<'_>) -> Result<Cow<'b, str>> {
        match self {
            Body::Text(text) => Ok(Cow::Borrowed(text)),
            Body::Deferred(f) => f(ctx).map(Cow::Owned),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::Text(String::new())
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Body::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// One HTTP request inside a batch or changeset.
///
/// Immutable once built. Rendering is pure and may be repeated; the only
/// input is the [`RenderContext`], which carries the reference resolver when
/// the operation is a changeset member.
///
/// ```
/// use odata_batch_core::Operation;
///
/// let op = Operation::get("Customers('ALFKI')").build().unwrap();
/// assert!(op.to_http().unwrap().contains("GET Customers('ALFKI') HTTP/1.1"));
/// ```
#[derive(Debug, Clone)]
pub struct Operation {
    id: OperationRef,
    method: Method,
    path: Path,
    headers: Headers,
    body: Body,
}

impl Operation {
    pub fn get(path: impl Into<Path>) -> OperationBuilder {
        OperationBuilder::new(Ok(Method::Get), path.into())
    }

    pub fn post(path: impl Into<Path>) -> OperationBuilder {
        OperationBuilder::new(Ok(Method::Post), path.into())
    }

    pub fn put(path: impl Into<Path>) -> OperationBuilder {
        OperationBuilder::new(Ok(Method::Put), path.into())
    }

    pub fn patch(path: impl Into<Path>) -> OperationBuilder {
        OperationBuilder::new(Ok(Method::Patch), path.into())
    }

    pub fn delete(path: impl Into<Path>) -> OperationBuilder {
        OperationBuilder::new(Ok(Method::Delete), path.into())
    }

    /// Builder for a method given by name. An unknown name fails at
    /// [`OperationBuilder::build`] with [`BatchError::InvalidMethod`].
    pub fn request(method: &str, path: impl Into<Path>) -> OperationBuilder {
        OperationBuilder::new(method.parse(), path.into())
    }

    /// Identity handle used by other operations to reference this one.
    pub fn handle(&self) -> OperationRef {
        self.id
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Render the `application/http` body part for this operation.
    pub fn render(&self, ctx: &RenderContext<'_>) -> Result<String> {
        let path = self.path.resolve(ctx)?;
        let body = self.body.render(ctx)?;

        let mut out = String::with_capacity(128 + path.len() + body.len());
        out.push_str("Content-Type: application/http");
        out.push_str(CRLF);
        out.push_str("Content-Transfer-Encoding: binary");
        out.push_str(CRLF);
        out.push_str(CRLF);
        out.push_str(self.method.as_str());
        out.push(' ');
        out.push_str(&path);
        out.push_str(" HTTP/1.1");
        out.push_str(CRLF);
        self.headers.write_lines(&mut out);
        out.push_str(CRLF);
        out.push_str(&body);

        Ok(out)
    }

    /// Render outside of any changeset.
    pub fn to_http(&self) -> Result<String> {
        self.render(&RenderContext::standalone())
    }

    /// Parse the body part answering this operation.
    pub fn parse_response(&self, part: &str) -> Result<OperationResponse<'_>> {
        let part = body_part::parse(part)?;
        Ok(OperationResponse::from_part(self, part))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let http = self.to_http().map_err(|_| fmt::Error)?;
        f.write_str(&http)
    }
}

impl Serialize for Operation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Operation", 2)?;
        state.serialize_field("method", &self.method)?;
        match &self.path {
            Path::Literal(path) => state.serialize_field("path", path)?,
            Path::Reference { suffix, .. } => state.serialize_field("path", suffix)?,
        }
        state.end()
    }
}

/// Builder for [`Operation`].
pub struct OperationBuilder {
    method: Result<Method>,
    path: Path,
    headers: Headers,
    body: Body,
    error: Option<BatchError>,
}

impl OperationBuilder {
    fn new(method: Result<Method>, path: Path) -> Self {
        Self {
            method,
            path,
            headers: Headers::new(),
            body: Body::default(),
            error: None,
        }
    }

    /// Add a header, replacing any earlier value of the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add several headers, keeping repeated names.
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.extend(headers);
        self
    }

    /// Set a literal body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Body::Text(body.into());
        self
    }

    /// Serialize `value` as the body and set `Content-Type: application/json`.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(json) => {
                self.headers.insert("Content-Type", "application/json");
                self.body = Body::Text(json);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize JSON body");
                self.error = Some(e.into());
            }
        }
        self
    }

    /// Set a body computed at render time.
    ///
    /// ```
    /// use odata_batch_core::{Changeset, Operation};
    ///
    /// let customer = Operation::post("Customers").body("{}").build().unwrap();
    /// let target = customer.handle();
    /// let order = Operation::post("Orders")
    ///     .body_fn(move |ctx| Ok(format!(r#"{{"Customer@odata.bind": "{}"}}"#, ctx.reference(target)?)))
    ///     .build()
    ///     .unwrap();
    ///
    /// let changeset = Changeset::with_boundary(vec![customer, order], "changeset_1").unwrap();
    /// assert!(changeset.to_http().contains(r#"{"Customer@odata.bind": "$1"}"#));
    /// ```
    pub fn body_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&RenderContext<'_>) -> Result<String> + Send + Sync + 'static,
    {
        self.body = Body::Deferred(Arc::new(f));
        self
    }

    /// Validate and build the operation.
    pub fn build(self) -> Result<Operation> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let method = self.method?;
        if !method.allows_body() && !self.body.is_empty() {
            return Err(BatchError::BodyNotAllowed(method));
        }

        Ok(Operation {
            id: OperationRef::next(),
            method,
            path: self.path,
            headers: self.headers,
            body: self.body,
        })
    }
}
