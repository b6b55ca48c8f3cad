//! Serve a routekit [`Endpoint`] from an [Axum](https://docs.rs/axum/latest/axum/) router.
//!
//! ```rust,no_run
//! use axum::Router;
//! use routekit::{procedure, Endpoint};
//!
//! let hello = Endpoint::builder()
//!     .get(procedure().handler(|_, _| async { Ok::<_, std::convert::Infallible>("hello") }))
//!     .build();
//!
//! let app: Router = Router::new().route("/api/hello", routekit_axum::endpoint(hello));
//! # let _ = app;
//! ```
#![warn(
    clippy::all,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::panic,
    clippy::todo,
    clippy::panic_in_result_fn,
    // missing_docs
)]
#![forbid(unsafe_code)]
#![allow(clippy::module_inception)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod request;
mod response;

use std::collections::HashMap;

use axum::{
    extract::{Path, Request},
    response::IntoResponse,
    routing::{any, MethodRouter},
};
use routekit::Endpoint;

pub use request::BODY_LIMIT;

/// Mount `endpoint` on an Axum route. Every method is forwarded to it, so method handling stays
/// with the [`Endpoint`].
///
/// Path parameters of the route are merged into the query, overriding query parameters of the
/// same name.
pub fn endpoint<S>(endpoint: Endpoint) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    any(
        move |params: Option<Path<HashMap<String, String>>>, req: Request| {
            let endpoint = endpoint.clone();

            async move {
                let params = params.map(|Path(params)| params).unwrap_or_default();

                let req = match request::from_axum(req, params).await {
                    Ok(req) => req,
                    Err(rejection) => return rejection.into_response(),
                };

                response::into_axum(endpoint.call(req).await)
            }
        },
    )
}
