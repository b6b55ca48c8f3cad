use std::{convert::Infallible, net::Ipv6Addr};

use axum::Router;
use routekit::{procedure, Config, Deserialized, Endpoint, Json, OptionsPolicy, Validated};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize)]
struct HelloQuery {
    text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
struct NewUser {
    name: String,
    // Form bodies send every value as a string.
    #[serde(deserialize_with = "number_or_string")]
    #[validate(range(min = 0.0))]
    age: f64,
}

fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        String(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom("Expected number")),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct UserPath {
    #[serde(rename = "userId")]
    user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
struct UserName {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    #[serde(rename = "userId")]
    user_id: Uuid,
    name: Option<String>,
}

fn hello() -> Endpoint {
    Endpoint::builder()
        .get(
            procedure()
                .query(Deserialized::<HelloQuery>::new())
                .handler(|req, _res| async move {
                    let text = req.query.text.unwrap_or_else(|| "world".into());
                    Ok::<_, Infallible>(Json(json!({ "message": format!("Hello {text}") })))
                }),
        )
        .post(
            procedure()
                .body(Validated::<NewUser>::new())
                .handler(|req, res| async move {
                    let NewUser { name, age } = req.body;
                    res.status(axum::http::StatusCode::CREATED).json(json!({
                        "id": Uuid::new_v4(),
                        "name": name,
                        "age": age,
                    }));
                    Ok::<_, Infallible>(())
                }),
        )
        .config(Config::new().options_policy(OptionsPolicy::NoContent))
        .build()
}

fn user() -> Endpoint {
    let route = procedure().query(Deserialized::<UserPath>::new());

    Endpoint::builder()
        .get(
            route
                .query(Deserialized::<UserName>::new())
                .query_as::<UserQuery>()
                .handler(|req, _res| async move {
                    let UserQuery { user_id, name } = req.query;
                    let username = name.unwrap_or_else(|| user_id.to_string());
                    Ok::<_, Infallible>(format!("Hello {user_id}, your name is {username}."))
                }),
        )
        .build()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let app = Router::new()
        .route("/api/hello", routekit_axum::endpoint(hello()))
        .route("/api/hello/:userId", routekit_axum::endpoint(user()));

    info!("Listening on http://[::1]:3000");
    let listener = tokio::net::TcpListener::bind((Ipv6Addr::UNSPECIFIED, 3000))
        .await
        .unwrap();
    axum::serve(listener, app).await.unwrap();
}
