use axum::{
    body::Body as AxumBody,
    http::{header, HeaderValue},
    response::Response as AxumResponse,
};
use routekit::{Body, Response};

pub(crate) fn into_axum(res: Response) -> AxumResponse {
    let (status, headers, body) = res.into_parts();

    let (content_type, bytes) = match body {
        Body::Empty => (None, Vec::new()),
        Body::Text(text) => (Some("text/plain; charset=utf-8"), text.into_bytes()),
        Body::Json(value) => (
            Some("application/json"),
            serde_json::to_vec(&value).unwrap_or_else(|_| b"null".to_vec()),
        ),
        Body::Bytes(bytes) => (Some("application/octet-stream"), bytes),
    };

    let mut response = AxumResponse::new(AxumBody::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .entry(header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static(content_type));
    }
    response
}
