use http::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};

/// An incoming request as handed over by the web framework.
///
/// `query` and `body` are untyped until a [`Procedure`](crate::Procedure) has validated them, its
/// handler then receives a `Request<Q, B>` holding the parsed values instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Request<Q = Value, B = Value> {
    /// The method exactly as received, it is normalised when dispatching.
    pub method: String,
    pub path: String,
    pub headers: HeaderMap,
    pub query: Q,
    pub body: B,
}

impl Request {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: "/".into(),
            headers: HeaderMap::new(),
            query: Value::Object(Map::new()),
            body: Value::Null,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_query(mut self, query: Value) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }
}

impl<Q, B> Request<Q, B> {
    /// The same request with its query and body replaced.
    pub fn with_input<Q2, B2>(self, query: Q2, body: B2) -> Request<Q2, B2> {
        Request {
            method: self.method,
            path: self.path,
            headers: self.headers,
            query,
            body,
        }
    }

    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
