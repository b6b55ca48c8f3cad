use serde_json::Value;

use crate::{Location, Parser, ValidationError};

/// The outcome of running every parser of a procedure against a request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestValidation {
    pub query: Value,
    pub body: Value,
    pub query_errors: Vec<ValidationError>,
    pub body_errors: Vec<ValidationError>,
}

impl RequestValidation {
    pub fn is_error(&self) -> bool {
        !self.query_errors.is_empty() || !self.body_errors.is_empty()
    }

    /// All collected errors, query errors first.
    pub fn into_errors(self) -> Vec<ValidationError> {
        let mut errors = self.query_errors;
        errors.extend(self.body_errors);
        errors
    }
}

/// Run the query and body parsers against copies of the raw values.
///
/// Parsers run in declaration order and every one of them runs, a failing parser doesn't stop the
/// ones after it. Each parser is given the accumulated value: the raw value overlaid with the
/// output of every parser which succeeded before it. Its own output is then merged in the same way.
pub fn validate_request(
    query_parsers: &[Parser<Value>],
    query: &Value,
    body_parsers: &[Parser<Value>],
    body: &Value,
) -> RequestValidation {
    let (query, query_errors) = run(query_parsers, query, Location::Query);
    let (body, body_errors) = run(body_parsers, body, Location::Body);

    RequestValidation {
        query,
        body,
        query_errors,
        body_errors,
    }
}

fn run(
    parsers: &[Parser<Value>],
    raw: &Value,
    location: Location,
) -> (Value, Vec<ValidationError>) {
    let mut acc = raw.clone();
    let mut errors = Vec::new();

    for parser in parsers {
        match parser.parse(acc.clone()) {
            Ok(output) => merge(&mut acc, output),
            Err(err) => errors.push(err.with_location(location)),
        }
    }

    (acc, errors)
}

// Objects are overlaid key by key, anything else replaces the accumulated value.
fn merge(acc: &mut Value, output: Value) {
    match (acc, output) {
        (Value::Object(acc), Value::Object(output)) => acc.extend(output),
        (acc, output) => *acc = output,
    }
}
