//! The procedure builder.
//!
//! A [`Procedure`] accumulates the parsers for the query and the body of a request and is turned
//! into a [`Handler`] with [`Procedure::handler`]. Every builder method returns a new procedure,
//! so a partially configured procedure can be shared between routes:
//!
//! ```rust
//! use routekit::{procedure, Deserialized};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct UserPath {
//!     #[serde(rename = "userId")]
//!     user_id: String,
//! }
//!
//! let user = procedure().query(Deserialized::<UserPath>::new());
//!
//! let get = user.handler(|req, _res| async move {
//!     Ok::<_, std::convert::Infallible>(format!("hello {}", req.query.user_id))
//! });
//! # let _ = get;
//! ```

use std::{fmt, future::Future, marker::PhantomData, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use http::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};

use crate::{
    validate_request, AdapterError, BoxError, ErrorFormatter, FieldFormatter, Handler,
    IntoParser, IntoResponse, Location, Parser, Request, RequestValidation, Response,
    ResponseWriter, ValidationError,
};

pub(crate) const INVALID_REQUEST_MESSAGE: &str = "Invalid request";
pub(crate) const INTERNAL_ERROR_MESSAGE: &str = "Something went wrong";

/// Start a new [`Procedure`] with no parsers and the default [`FieldFormatter`].
pub fn procedure() -> Procedure {
    Procedure::new()
}

/// An immutable builder for a validated request handler.
///
/// `Q` and `B` are the types the handler will receive as the request's query and body.
pub struct Procedure<Q = Value, B = Value> {
    query_parsers: Vec<Parser<Value>>,
    body_parsers: Vec<Parser<Value>>,
    formatter: Arc<dyn ErrorFormatter>,
    phantom: PhantomData<fn() -> (Q, B)>,
}

impl<Q, B> Clone for Procedure<Q, B> {
    fn clone(&self) -> Self {
        Self {
            query_parsers: self.query_parsers.clone(),
            body_parsers: self.body_parsers.clone(),
            formatter: self.formatter.clone(),
            phantom: PhantomData,
        }
    }
}

impl<Q, B> fmt::Debug for Procedure<Q, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("query_parsers", &self.query_parsers)
            .field("body_parsers", &self.body_parsers)
            .field("formatter", &"...")
            .finish()
    }
}

impl Default for Procedure {
    fn default() -> Self {
        Self::new()
    }
}

impl Procedure {
    pub fn new() -> Self {
        Self {
            query_parsers: Vec::new(),
            body_parsers: Vec::new(),
            formatter: Arc::new(FieldFormatter),
            phantom: PhantomData,
        }
    }
}

impl<Q, B> Procedure<Q, B> {
    fn retype<Q2, B2>(&self) -> Procedure<Q2, B2> {
        Procedure {
            query_parsers: self.query_parsers.clone(),
            body_parsers: self.body_parsers.clone(),
            formatter: self.formatter.clone(),
            phantom: PhantomData,
        }
    }

    /// Add a parser for the query parameters.
    ///
    /// # Panics
    ///
    /// If `schema` can't be adapted into a parser. Use [`Procedure::try_query`] to handle that
    /// case.
    #[track_caller]
    #[allow(clippy::panic)]
    pub fn query<P, M>(&self, schema: P) -> Procedure<P::Output, B>
    where
        P: IntoParser<M>,
        P::Output: Serialize + 'static,
    {
        match self.try_query(schema) {
            Ok(procedure) => procedure,
            Err(err) => panic!("error adding query parser: {err}"),
        }
    }

    /// Add a parser for the query parameters.
    pub fn try_query<P, M>(&self, schema: P) -> Result<Procedure<P::Output, B>, AdapterError>
    where
        P: IntoParser<M>,
        P::Output: Serialize + 'static,
    {
        let parser = schema.into_parser()?.erase();
        let mut procedure = self.retype();
        procedure.query_parsers.push(parser);
        Ok(procedure)
    }

    /// Add a parser for the request body.
    ///
    /// # Panics
    ///
    /// If `schema` can't be adapted into a parser. Use [`Procedure::try_body`] to handle that
    /// case.
    #[track_caller]
    #[allow(clippy::panic)]
    pub fn body<P, M>(&self, schema: P) -> Procedure<Q, P::Output>
    where
        P: IntoParser<M>,
        P::Output: Serialize + 'static,
    {
        match self.try_body(schema) {
            Ok(procedure) => procedure,
            Err(err) => panic!("error adding body parser: {err}"),
        }
    }

    /// Add a parser for the request body.
    pub fn try_body<P, M>(&self, schema: P) -> Result<Procedure<Q, P::Output>, AdapterError>
    where
        P: IntoParser<M>,
        P::Output: Serialize + 'static,
    {
        let parser = schema.into_parser()?.erase();
        let mut procedure = self.retype();
        procedure.body_parsers.push(parser);
        Ok(procedure)
    }

    /// Change the type the handler receives as the query without adding a parser.
    ///
    /// The merged output of every query parser is decoded into `T`, which is how the fields of
    /// several schemas end up in one type.
    pub fn query_as<T>(&self) -> Procedure<T, B> {
        self.retype()
    }

    /// Change the type the handler receives as the body without adding a parser.
    pub fn body_as<T>(&self) -> Procedure<Q, T> {
        self.retype()
    }

    /// Replace the formatter used to build the `errors` field of `422` responses.
    pub fn error_formatter(&self, formatter: impl ErrorFormatter) -> Self {
        Self {
            formatter: Arc::new(formatter),
            ..self.clone()
        }
    }

    /// Compile the procedure into a [`Handler`] which runs `handler` once the request is valid.
    ///
    /// - If any parser rejects the request the response is `422` with
    ///   `{ "message": "Invalid request", "errors": ... }` and `handler` is not called.
    /// - Otherwise `handler` is called with the parsed query and body, and a [`ResponseWriter`]
    ///   for the response. If it returns an error or panics the error is logged and the response
    ///   is `500` with `{ "error": "Something went wrong" }`.
    pub fn handler<F, Fut, R, E>(self, handler: F) -> Handler
    where
        Q: DeserializeOwned + Send + 'static,
        B: DeserializeOwned + Send + 'static,
        F: Fn(Request<Q, B>, ResponseWriter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: IntoResponse + Send,
        E: Into<BoxError>,
    {
        let Self {
            query_parsers,
            body_parsers,
            formatter,
            ..
        } = self;
        let parsers = Arc::new((query_parsers, body_parsers));
        let handler = Arc::new(handler);

        Handler::new(move |req: Request, mut res: Response| {
            let parsers = parsers.clone();
            let formatter = formatter.clone();
            let handler = handler.clone();

            async move {
                let (query_parsers, body_parsers) = &*parsers;
                let validation =
                    validate_request(query_parsers, &req.query, body_parsers, &req.body);

                let (query, body) = match decode::<Q, B>(validation) {
                    Ok(input) => input,
                    Err(errors) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            "rejecting {} '{}' with {} validation error(s)",
                            req.method,
                            req.path,
                            errors.len()
                        );

                        res.status(StatusCode::UNPROCESSABLE_ENTITY).json(json!({
                            "message": INVALID_REQUEST_MESSAGE,
                            "errors": formatter.format(&errors),
                        }));
                        return res;
                    }
                };

                let fallback = res.clone();
                let writer = ResponseWriter::new(res);
                let req = req.with_input(query, body);

                let result = AssertUnwindSafe(async move {
                    let reply = (*handler)(req, writer.clone())
                        .await
                        .map_err(Into::<BoxError>::into)?;
                    reply.into_response(writer.snapshot())
                })
                .catch_unwind()
                .await;

                match result {
                    Ok(Ok(res)) => res,
                    Ok(Err(_err)) => {
                        #[cfg(feature = "tracing")]
                        tracing::error!("error in request handler: {}", _err);

                        internal_error(fallback)
                    }
                    Err(_panic) => {
                        #[cfg(feature = "tracing")]
                        tracing::error!(
                            "request handler panicked: {}",
                            panic_message(&*_panic)
                        );

                        internal_error(fallback)
                    }
                }
            }
        })
    }
}

fn decode<Q: DeserializeOwned, B: DeserializeOwned>(
    validation: RequestValidation,
) -> Result<(Q, B), Vec<ValidationError>> {
    let RequestValidation {
        query,
        body,
        mut query_errors,
        mut body_errors,
    } = validation;

    let query = decode_one::<Q>(query, Location::Query, &mut query_errors);
    let body = decode_one::<B>(body, Location::Body, &mut body_errors);

    match (query, body) {
        (Some(query), Some(body)) => Ok((query, body)),
        _ => {
            query_errors.extend(body_errors);
            Err(query_errors)
        }
    }
}

// Only decodes when the parsers accepted the value, otherwise their errors are what matters.
fn decode_one<T: DeserializeOwned>(
    value: Value,
    location: Location,
    errors: &mut Vec<ValidationError>,
) -> Option<T> {
    if !errors.is_empty() {
        return None;
    }

    match serde_path_to_error::deserialize(value) {
        Ok(value) => Some(value),
        Err(err) => {
            errors.push(ValidationError::from_path_error(err).with_location(location));
            None
        }
    }
}

fn internal_error(mut res: Response) -> Response {
    res.status(StatusCode::INTERNAL_SERVER_ERROR)
        .json(json!({ "error": INTERNAL_ERROR_MESSAGE }));
    res
}

#[cfg(feature = "tracing")]
fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
