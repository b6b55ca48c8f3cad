use std::{fmt, future::Future, sync::Arc};

use futures::{future::BoxFuture, FutureExt};

use crate::{Request, Response};

type HandlerFn = Arc<dyn Fn(Request, Response) -> BoxFuture<'static, Response> + Send + Sync>;

/// A compiled request handler.
///
/// Built by [`Procedure::handler`](crate::Procedure::handler) or directly from an async function
/// with [`Handler::new`]. Cloning is cheap and a handler can serve any number of requests at once.
#[derive(Clone)]
pub struct Handler(HandlerFn);

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&"...").finish()
    }
}

impl Handler {
    /// Wrap a raw handler. It is invoked as is, no validation or error recovery is applied.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self(Arc::new(move |req, res| handler(req, res).boxed()))
    }

    pub fn call(&self, req: Request, res: Response) -> BoxFuture<'static, Response> {
        (self.0)(req, res)
    }
}
