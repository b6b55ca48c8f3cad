use std::{fmt, sync::Arc};

use futures::{future::BoxFuture, FutureExt};
use http::{header, Method, StatusCode};
use serde_json::json;

use crate::{Config, Handler, OptionsPolicy, Request, Response};

/// Builds an [`Endpoint`] by registering one handler per HTTP method.
///
/// Registering a method twice replaces the earlier handler.
#[derive(Debug, Default)]
pub struct EndpointBuilder {
    routes: Vec<(Method, Handler)>,
    config: Config,
}

macro_rules! verbs {
    ($($(#[$meta:meta])* $name:ident => $method:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            pub fn $name(self, handler: impl Into<Handler>) -> Self {
                self.method(Method::$method, handler)
            }
        )*
    };
}

impl EndpointBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Register a handler for an arbitrary method, including extension methods.
    ///
    /// Methods are matched case-insensitively, extension methods are stored uppercased.
    pub fn method(mut self, method: Method, handler: impl Into<Handler>) -> Self {
        let method = normalise(method);
        let handler = handler.into();
        match self.routes.iter_mut().find(|(m, _)| *m == method) {
            Some((_, existing)) => *existing = handler,
            None => self.routes.push((method, handler)),
        }
        self
    }

    verbs! {
        get => GET,
        /// Without a `HEAD` handler, `HEAD` requests are served by the `GET` handler.
        /// See [`Config::head_falls_back_to_get`].
        head => HEAD,
        post => POST,
        put => PUT,
        delete => DELETE,
        connect => CONNECT,
        options => OPTIONS,
        trace => TRACE,
        patch => PATCH,
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Endpoint {
        Endpoint {
            inner: Arc::new(EndpointInner {
                routes: self.routes,
                config: self.config,
            }),
        }
    }
}

struct EndpointInner {
    routes: Vec<(Method, Handler)>,
    config: Config,
}

/// A route which dispatches each request to the handler registered for its method.
///
/// Cloning is cheap, all clones share the same handlers.
#[derive(Clone)]
pub struct Endpoint {
    inner: Arc<EndpointInner>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field(
                "methods",
                &self
                    .inner
                    .routes
                    .iter()
                    .map(|(m, _)| m.as_str())
                    .collect::<Vec<_>>(),
            )
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Endpoint {
    pub fn builder() -> EndpointBuilder {
        EndpointBuilder::new()
    }

    /// The methods with a registered handler, in registration order.
    pub fn methods(&self) -> impl Iterator<Item = &Method> + '_ {
        self.inner.routes.iter().map(|(m, _)| m)
    }

    fn find(&self, method: &Method) -> Option<&Handler> {
        self.inner
            .routes
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, h)| h)
    }

    /// The handler for `method`, following the `HEAD` fallback when enabled.
    fn resolve(&self, method: &Method) -> Option<&Handler> {
        self.find(method).or_else(|| {
            (*method == Method::HEAD && self.inner.config.head_fallback)
                .then(|| self.find(&Method::GET))
                .flatten()
        })
    }

    /// The value of the `Allow` header sent with rejected requests.
    fn allowed(&self) -> Vec<&str> {
        let mut allowed = Vec::with_capacity(self.inner.routes.len() + 1);
        if self.inner.config.options == OptionsPolicy::NoContent
            && self.find(&Method::OPTIONS).is_none()
        {
            allowed.push(Method::OPTIONS.as_str());
        }
        allowed.extend(self.methods().map(Method::as_str));
        allowed
    }

    /// Handle `req`, starting from the response `res`.
    pub fn dispatch(&self, req: Request, mut res: Response) -> BoxFuture<'static, Response> {
        let name = req.method.trim().to_uppercase();

        let method = match Method::from_bytes(name.as_bytes()) {
            Ok(method) => method,
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("rejecting request with invalid method '{}'", req.method);

                self.reject(&mut res, &name);
                return futures::future::ready(res).boxed();
            }
        };

        if let Some(handler) = self.resolve(&method) {
            #[cfg(feature = "tracing")]
            tracing::debug!("dispatching {} '{}'", method, req.path);

            return handler.call(req, res);
        }

        if method == Method::OPTIONS && self.inner.config.options == OptionsPolicy::NoContent {
            res.set_header(header::ALLOW, self.allowed());
            res.status(StatusCode::NO_CONTENT).end();
        } else {
            #[cfg(feature = "tracing")]
            tracing::debug!("method {} not allowed on '{}'", method, req.path);

            self.reject(&mut res, method.as_str());
        }

        futures::future::ready(res).boxed()
    }

    fn reject(&self, res: &mut Response, method: &str) {
        res.set_header(header::ALLOW, self.allowed());
        res.status(StatusCode::METHOD_NOT_ALLOWED)
            .json(json!({ "error": format!("Method {method} Not Allowed") }));
    }

    /// Handle `req` starting from an empty `200` response.
    pub fn call(&self, req: Request) -> BoxFuture<'static, Response> {
        self.dispatch(req, Response::new())
    }
}

fn normalise(method: Method) -> Method {
    let upper = method.as_str().to_uppercase();
    if upper == method.as_str() {
        return method;
    }

    Method::from_bytes(upper.as_bytes()).unwrap_or(method)
}

impl From<Endpoint> for Handler {
    fn from(endpoint: Endpoint) -> Self {
        Handler::new(move |req, res| endpoint.dispatch(req, res))
    }
}
