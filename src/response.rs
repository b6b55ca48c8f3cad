use std::sync::{Arc, Mutex, PoisonError};

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::BoxError;

/// The payload of a [`Response`].
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    Text(String),
    Json(Value),
    Bytes(Vec<u8>),
}

impl From<String> for Body {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Body {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<Value> for Body {
    fn from(v: Value) -> Self {
        Self::Json(v)
    }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<()> for Body {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

/// The response being built for a request.
///
/// The setters return `&mut Self` so they can be chained:
///
/// ```rust
/// use routekit::Response;
/// use http::StatusCode;
///
/// let mut res = Response::new();
/// res.status(StatusCode::CREATED).json(serde_json::json!({ "id": 1 }));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
    ended: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Body::Empty,
            ended: false,
        }
    }
}

impl Response {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    pub fn json(&mut self, value: Value) -> &mut Self {
        self.send(Body::Json(value))
    }

    pub fn send(&mut self, body: impl Into<Body>) -> &mut Self {
        self.body = body.into();
        self.ended = true;
        self
    }

    /// Set a header, multiple values are joined with `", "`.
    ///
    /// Values which aren't valid header values are dropped.
    pub fn set_header<I>(&mut self, name: HeaderName, values: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let joined = values
            .into_iter()
            .map(|v| v.as_ref().to_owned())
            .collect::<Vec<_>>()
            .join(", ");

        match HeaderValue::from_str(&joined) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("dropping invalid value for header '{}': {}", name, _err);
            }
        }

        self
    }

    /// Finish the response without a body.
    pub fn end(&mut self) -> &mut Self {
        self.body = Body::Empty;
        self.ended = true;
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Whether a body was sent or [`Response::end`] was called.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn into_parts(self) -> (StatusCode, HeaderMap, Body) {
        (self.status, self.headers, self.body)
    }
}

/// A handle on the response of a request, given to procedure callbacks.
///
/// Clones share the same response, so whatever the callback writes through it is what gets sent,
/// even when the callback returns `()`.
///
/// ```rust
/// use routekit::{procedure, Json};
/// use http::StatusCode;
///
/// let create = procedure().handler(|_req, res| async move {
///     res.status(StatusCode::CREATED).json(serde_json::json!({ "id": 1 }));
///     Ok::<_, std::convert::Infallible>(())
/// });
/// # let _ = create;
/// ```
#[derive(Debug, Clone)]
pub struct ResponseWriter(Arc<Mutex<Response>>);

impl ResponseWriter {
    pub(crate) fn new(res: Response) -> Self {
        Self(Arc::new(Mutex::new(res)))
    }

    /// Run `f` against the underlying [`Response`].
    pub fn update<T>(&self, f: impl FnOnce(&mut Response) -> T) -> T {
        // A panicking callback is turned into a `500` from a copy taken beforehand.
        let mut res = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut res)
    }

    pub fn status(&self, status: StatusCode) -> &Self {
        self.update(|res| {
            res.status(status);
        });
        self
    }

    pub fn json(&self, value: Value) -> &Self {
        self.update(|res| {
            res.json(value);
        });
        self
    }

    pub fn send(&self, body: impl Into<Body>) -> &Self {
        self.update(|res| {
            res.send(body);
        });
        self
    }

    /// See [`Response::set_header`].
    pub fn set_header<I>(&self, name: HeaderName, values: I) -> &Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.update(|res| {
            res.set_header(name, values);
        });
        self
    }

    pub fn end(&self) -> &Self {
        self.update(|res| {
            res.end();
        });
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.update(|res| res.status_code())
    }

    pub fn is_ended(&self) -> bool {
        self.update(|res| res.is_ended())
    }

    /// A copy of the response as it currently stands.
    pub fn snapshot(&self) -> Response {
        self.update(|res| res.clone())
    }
}

/// Serialize `T` as the JSON body of the response.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Json<T>(pub T);

/// Something a handler can return.
///
/// The handler's reply is applied to the response as the handler left it, so `()` sends whatever
/// was written through the [`ResponseWriter`]. Returning a [`Response`] sends it as is.
pub trait IntoResponse {
    fn into_response(self, res: Response) -> Result<Response, BoxError>;
}

impl IntoResponse for Response {
    fn into_response(self, _: Response) -> Result<Response, BoxError> {
        Ok(self)
    }
}

impl IntoResponse for ResponseWriter {
    fn into_response(self, _: Response) -> Result<Response, BoxError> {
        Ok(self.snapshot())
    }
}

impl IntoResponse for () {
    fn into_response(self, res: Response) -> Result<Response, BoxError> {
        Ok(res)
    }
}

impl IntoResponse for String {
    fn into_response(self, mut res: Response) -> Result<Response, BoxError> {
        res.send(self);
        Ok(res)
    }
}

impl IntoResponse for &'static str {
    fn into_response(self, mut res: Response) -> Result<Response, BoxError> {
        res.send(self);
        Ok(res)
    }
}

impl IntoResponse for Value {
    fn into_response(self, mut res: Response) -> Result<Response, BoxError> {
        res.json(self);
        Ok(res)
    }
}

impl IntoResponse for Body {
    fn into_response(self, mut res: Response) -> Result<Response, BoxError> {
        res.send(self);
        Ok(res)
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self, mut res: Response) -> Result<Response, BoxError> {
        res.json(serde_json::to_value(self.0)?);
        Ok(res)
    }
}

impl<R: IntoResponse> IntoResponse for (StatusCode, R) {
    fn into_response(self, res: Response) -> Result<Response, BoxError> {
        let mut res = self.1.into_response(res)?;
        res.status(self.0);
        Ok(res)
    }
}
