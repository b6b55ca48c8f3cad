use std::{
    convert::Infallible,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use http::StatusCode;
use routekit::{
    procedure, Deserialized, Endpoint, Json, MergedFormatter, ParserShape, Request, Schema,
    Validated, ValidationError,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

mod utils;
use utils::{call, json_body, text_body};

#[derive(Debug, Serialize, Deserialize)]
struct UserPath {
    #[serde(rename = "userId")]
    user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
struct NewUser {
    #[validate(length(min = 1))]
    name: String,
    #[validate(range(min = 0))]
    age: i64,
}

fn user_endpoint(calls: Arc<AtomicUsize>) -> Endpoint {
    Endpoint::builder()
        .get(
            procedure()
                .query(Deserialized::<UserPath>::new())
                .handler(move |req, _res| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, Infallible>(format!("Hello {}", req.query.user_id))
                    }
                }),
        )
        .build()
}

#[tokio::test]
async fn invalid_uuid_is_unprocessable() {
    let calls = Arc::new(AtomicUsize::new(0));
    let endpoint = user_endpoint(calls.clone());

    let res = call(
        &endpoint,
        Request::new("GET").with_query(json!({ "userId": "not-a-uuid" })),
    )
    .await;

    assert_eq!(res.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(&res);
    assert_eq!(body["message"], "Invalid request");
    assert!(body["errors"][0].get("userId").is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn valid_uuid_reaches_the_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let endpoint = user_endpoint(calls.clone());
    let id = "6f1c2d3e-4b5a-4c7d-8e9f-0a1b2c3d4e5f";

    let res = call(
        &endpoint,
        Request::new("GET").with_query(json!({ "userId": id })),
    )
    .await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(text_body(&res), format!("Hello {id}"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn negative_age_is_unprocessable() {
    let endpoint = Endpoint::builder()
        .post(
            procedure()
                .body(Validated::<NewUser>::new())
                .handler(|req, _res| async move {
                    let reply = Json(json!({ "name": req.body.name }));
                    Ok::<_, Infallible>((StatusCode::CREATED, reply))
                }),
        )
        .build();

    let res = call(
        &endpoint,
        Request::new("POST").with_body(json!({ "name": "Ada", "age": -1 })),
    )
    .await;
    assert_eq!(res.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let errors = &json_body(&res)["errors"];
    assert_eq!(errors.as_array().map(Vec::len), Some(1));
    assert!(errors[0].get("age").is_some());
    assert!(errors[0].get("name").is_none());

    let res = call(
        &endpoint,
        Request::new("POST").with_body(json!({ "name": "Ada", "age": 36 })),
    )
    .await;
    assert_eq!(res.status_code(), StatusCode::CREATED);
    assert_eq!(json_body(&res), &json!({ "name": "Ada" }));
}

#[tokio::test]
async fn query_and_body_errors_are_reported_together() {
    let handler = procedure()
        .query(Deserialized::<UserPath>::new())
        .body(Validated::<NewUser>::new())
        .handler(|_, _| async { Ok::<_, Infallible>(()) });
    let endpoint = Endpoint::builder().put(handler).build();

    let res = call(
        &endpoint,
        Request::new("PUT")
            .with_query(json!({ "userId": "nope" }))
            .with_body(json!({ "name": "", "age": 1 })),
    )
    .await;

    assert_eq!(res.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let errors = &json_body(&res)["errors"];
    assert!(errors[0].get("userId").is_some());
    assert!(errors[1].get("name").is_some());
}

#[tokio::test]
async fn shared_base_procedure_is_not_modified() {
    let base = procedure().query(Deserialized::<UserPath>::new());
    let with_body = base.body(Validated::<NewUser>::new());

    let endpoint = Endpoint::builder()
        .get(base.handler(|_, _| async { Ok::<_, Infallible>("base") }))
        .post(with_body.handler(|_, _| async { Ok::<_, Infallible>("with body") }))
        .build();
    let query = json!({ "userId": "6f1c2d3e-4b5a-4c7d-8e9f-0a1b2c3d4e5f" });

    let res = call(&endpoint, Request::new("GET").with_query(query.clone())).await;
    assert_eq!(text_body(&res), "base");

    let res = call(&endpoint, Request::new("POST").with_query(query)).await;
    assert_eq!(res.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[derive(Debug, Serialize, Deserialize)]
struct Search {
    term: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Paging {
    #[serde(default = "default_page")]
    page: u32,
}

fn default_page() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    term: String,
    page: u32,
}

#[tokio::test]
async fn chained_parsers_merge_their_output() {
    let endpoint = Endpoint::builder()
        .get(
            procedure()
                .query(Deserialized::<Search>::new())
                .query(Deserialized::<Paging>::new())
                .query_as::<SearchPage>()
                .handler(|req, _res| async move {
                    Ok::<_, Infallible>(format!("{} #{}", req.query.term, req.query.page))
                }),
        )
        .build();

    let res = call(
        &endpoint,
        Request::new("GET").with_query(json!({ "term": "rust" })),
    )
    .await;
    assert_eq!(text_body(&res), "rust #1");
}

struct Trimmed;

impl Schema for Trimmed {
    type Output = String;

    fn parse(&self, value: Value) -> Result<String, ValidationError> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_owned()),
            _ => Err(ValidationError::new("Expected a non-empty string")),
        }
    }
}

#[tokio::test]
async fn handler_receives_parsed_values() {
    let endpoint = Endpoint::builder()
        .post(
            procedure()
                .body(Trimmed)
                .handler(|req, _res| async move { Ok::<_, Infallible>(req.body) }),
        )
        .build();

    let res = call(&endpoint, Request::new("POST").with_body(json!("  hi  "))).await;
    assert_eq!(text_body(&res), "hi");

    let res = call(&endpoint, Request::new("POST").with_body(json!(1))).await;
    assert_eq!(
        json_body(&res)["errors"],
        json!([{ "parent": "Expected a non-empty string" }])
    );
}

#[tokio::test]
async fn runtime_shapes_are_adapted() {
    let shape = ParserShape::new().create(|value: Value| {
        if matches!(value.get("id"), Some(Value::Number(_))) {
            Ok(value)
        } else {
            Err("Expected a numeric id")
        }
    });

    let endpoint = Endpoint::builder()
        .post(
            procedure()
                .body(shape)
                .handler(|req, _res| async move { Ok::<_, Infallible>(req.body) }),
        )
        .build();

    let res = call(&endpoint, Request::new("POST").with_body(json!({ "id": 7 }))).await;
    assert_eq!(json_body(&res), &json!({ "id": 7 }));

    let res = call(&endpoint, Request::new("POST").with_body(json!({}))).await;
    assert_eq!(res.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn custom_error_formatter() {
    let endpoint = Endpoint::builder()
        .post(
            procedure()
                .error_formatter(|errors: &[ValidationError]| json!(errors.len()))
                .body(Validated::<NewUser>::new())
                .handler(|_, _| async { Ok::<_, Infallible>(()) }),
        )
        .build();
    let res = call(&endpoint, Request::new("POST").with_body(json!({}))).await;
    assert_eq!(json_body(&res)["errors"], json!(1));

    let endpoint = Endpoint::builder()
        .post(
            procedure()
                .error_formatter(MergedFormatter)
                .body(Validated::<NewUser>::new())
                .handler(|_, _| async { Ok::<_, Infallible>(()) }),
        )
        .build();
    let res = call(
        &endpoint,
        Request::new("POST").with_body(json!({ "name": "", "age": -5 })),
    )
    .await;
    let errors = &json_body(&res)["errors"];
    assert!(errors.is_object());
    assert!(errors.get("age").is_some());
    assert!(errors.get("name").is_some());
}

#[tokio::test]
async fn handler_failures_are_internal_errors() {
    let endpoint = Endpoint::builder()
        .get(procedure().handler(|_, _| async { Err::<(), _>("connection refused") }))
        .post(procedure().handler(|req, _res| async move {
            let id: u32 = req.body["id"].as_u64().map(|v| v as u32).unwrap_or_default();
            if id == 0 {
                panic!("id must not be zero");
            }
            Ok::<_, Infallible>(())
        }))
        .build();

    for req in [Request::new("GET"), Request::new("POST")] {
        let res = call(&endpoint, req).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(&res), &json!({ "error": "Something went wrong" }));
    }
}

#[tokio::test]
async fn handler_can_build_the_response() {
    let endpoint = Endpoint::builder()
        .get(procedure().handler(|_, res| async move {
            res.status(StatusCode::ACCEPTED)
                .set_header(http::header::CACHE_CONTROL, ["no-store"])
                .send("queued");
            Ok::<_, Infallible>(res)
        }))
        .build();

    let res = call(&endpoint, Request::new("GET")).await;
    assert_eq!(res.status_code(), StatusCode::ACCEPTED);
    assert_eq!(res.headers()[http::header::CACHE_CONTROL], "no-store");
    assert_eq!(text_body(&res), "queued");
}

#[tokio::test]
async fn writes_through_the_response_are_sent() {
    let endpoint = Endpoint::builder()
        .post(procedure().handler(|_, res| async move {
            res.status(StatusCode::CREATED).json(json!({ "id": 1 }));
            Ok::<_, Infallible>(())
        }))
        .build();

    let res = call(&endpoint, Request::new("POST")).await;
    assert_eq!(res.status_code(), StatusCode::CREATED);
    assert_eq!(json_body(&res), &json!({ "id": 1 }));
}

#[tokio::test]
async fn reply_is_applied_on_top_of_writes() {
    let endpoint = Endpoint::builder()
        .get(procedure().handler(|_, res| async move {
            res.status(StatusCode::CREATED)
                .set_header(http::header::CACHE_CONTROL, ["no-store"]);
            Ok::<_, Infallible>("created")
        }))
        .build();

    let res = call(&endpoint, Request::new("GET")).await;
    assert_eq!(res.status_code(), StatusCode::CREATED);
    assert_eq!(res.headers()[http::header::CACHE_CONTROL], "no-store");
    assert_eq!(text_body(&res), "created");
}

#[tokio::test]
async fn writes_are_discarded_when_the_handler_fails() {
    let endpoint = Endpoint::builder()
        .get(procedure().handler(|_, res| async move {
            res.status(StatusCode::CREATED).send("partial");
            Err::<(), _>("lost connection")
        }))
        .build();

    let res = call(&endpoint, Request::new("GET")).await;
    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(&res), &json!({ "error": "Something went wrong" }));
}
