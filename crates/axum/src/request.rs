use std::{collections::HashMap, error::Error};

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use http_body_util::LengthLimitError;
use serde_json::{json, Map, Value};

/// The largest request body which is read, larger bodies are rejected with `413`.
pub const BODY_LIMIT: usize = 1024 * 1024;

#[derive(Debug)]
pub(crate) enum Rejection {
    InvalidJson,
    InvalidBody,
    TooLarge,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidJson => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid JSON" }))).into_response()
            }
            Self::InvalidBody => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Failed to read request body" })),
            )
                .into_response(),
            Self::TooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "error": "Payload Too Large" })),
            )
                .into_response(),
        }
    }
}

pub(crate) async fn from_axum(
    req: Request,
    params: HashMap<String, String>,
) -> Result<routekit::Request, Rejection> {
    let (parts, body) = req.into_parts();

    let mut query = parts
        .uri
        .query()
        .map(|query| parse_pairs(query.as_bytes()))
        .unwrap_or_default();
    for (key, value) in params {
        query.insert(key, Value::String(value));
    }

    let body = parse_body(&parts.headers, body).await?;

    let mut req = routekit::Request::new(parts.method.as_str())
        .with_path(parts.uri.path())
        .with_query(Value::Object(query))
        .with_body(body);
    req.headers = parts.headers;
    Ok(req)
}

/// Parse `application/x-www-form-urlencoded` pairs, keys which repeat become arrays.
pub(crate) fn parse_pairs(input: &[u8]) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in form_urlencoded::parse(input) {
        let value = Value::String(value.into_owned());
        match map.get_mut(key.as_ref()) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key.into_owned(), value);
            }
        }
    }
    map
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn Error + 'static)> = Some(err);
    while let Some(err) = source {
        if err.is::<LengthLimitError>() {
            return true;
        }
        source = err.source();
    }
    false
}

async fn parse_body(headers: &HeaderMap, body: Body) -> Result<Value, Rejection> {
    let bytes = to_bytes(body, BODY_LIMIT).await.map_err(|err| {
        #[cfg(feature = "tracing")]
        tracing::debug!("error reading request body: {}", err);

        if is_length_limit(&err) {
            Rejection::TooLarge
        } else {
            Rejection::InvalidBody
        }
    })?;

    if bytes.is_empty() {
        return Ok(Value::Null);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().trim().to_ascii_lowercase());

    match content_type.as_deref() {
        Some(mime) if mime == "application/json" || mime.ends_with("+json") => {
            serde_json::from_slice(&bytes).map_err(|_err| {
                #[cfg(feature = "tracing")]
                tracing::debug!("rejecting malformed JSON body: {}", _err);

                Rejection::InvalidJson
            })
        }
        Some("application/x-www-form-urlencoded") => Ok(Value::Object(parse_pairs(&bytes))),
        // Without a content type the body is JSON if it parses as such.
        None => Ok(serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))),
        Some(_) => Ok(Value::String(String::from_utf8_lossy(&bytes).into_owned())),
    }
}
