//! routekit: typed request validation and method dispatch for HTTP route handlers.
//!
//! A route declares, per HTTP verb, the schemas its query parameters and body must satisfy.
//! The handler only runs once every schema has accepted the request and it receives the
//! parsed values, never the raw ones.
//!
//! ```rust
//! use routekit::{procedure, Deserialized, Endpoint, Json};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Greeting {
//!     text: Option<String>,
//! }
//!
//! let endpoint = Endpoint::builder()
//!     .get(
//!         procedure()
//!             .query(Deserialized::<Greeting>::new())
//!             .handler(|req, _res| async move {
//!                 let text = req.query.text.unwrap_or_else(|| "world".into());
//!                 Ok::<_, std::convert::Infallible>(Json(format!("hello {text}")))
//!             }),
//!     )
//!     .build();
//! # let _ = endpoint;
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

mod config;
mod endpoint;
mod error;
mod format;
mod handler;
mod parser;
mod procedure;
mod request;
mod response;
mod validate;

pub use config::{Config, OptionsPolicy};
pub use endpoint::{Endpoint, EndpointBuilder};
pub use error::{AdapterError, BoxError, Issue, Location, PathSegment, ValidationError};
pub use format::{ErrorFormatter, FieldFormatter, MergedFormatter, PARENT_KEY};
pub use handler::Handler;
pub use parser::{Deserialized, IntoParser, Parser, ParserKind, ParserShape, Schema};
pub use procedure::{procedure, Procedure};
pub use request::Request;
pub use response::{Body, IntoResponse, Json, Response, ResponseWriter};
pub use validate::{validate_request, RequestValidation};

#[cfg(feature = "jsonschema")]
#[cfg_attr(docsrs, doc(cfg(feature = "jsonschema")))]
pub use parser::JsonSchema;
#[cfg(feature = "validator")]
#[cfg_attr(docsrs, doc(cfg(feature = "validator")))]
pub use parser::Validated;

/// Marker types used to tell the [`IntoParser`] implementations apart.
#[doc(hidden)]
pub mod internal {
    pub use crate::parser::{CallableMarker, CreateMarker, SchemaMarker, ShapeMarker};

    #[cfg(feature = "jsonschema")]
    pub use crate::parser::ValidateMarker;
    #[cfg(feature = "validator")]
    pub use crate::parser::ValidateSyncMarker;
}
