#![allow(dead_code)]

use routekit::{Body, Endpoint, Request, Response};
use serde_json::Value;

pub async fn call(endpoint: &Endpoint, req: Request) -> Response {
    endpoint.call(req).await
}

pub fn json_body(res: &Response) -> &Value {
    match res.body() {
        Body::Json(value) => value,
        body => panic!("expected a JSON body, got {body:?}"),
    }
}

pub fn text_body(res: &Response) -> &str {
    match res.body() {
        Body::Text(text) => text,
        body => panic!("expected a text body, got {body:?}"),
    }
}
