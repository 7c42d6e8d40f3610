//! Minimal nami example — JSON endpoints, CORS, a streamed body.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -H 'origin: https://app.dev' -X OPTIONS http://localhost:3000/users
//!   curl http://localhost:3000/stream
//!   curl http://localhost:3000/healthz

use std::time::Duration;

use nami::{Config, Context, HttpError, Method, Router, Server, StatusCode, health};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config: Config = r#"
        greeting = "hello from nami"

        [cors]
        origin = "*"
    "#
    .parse()
    .expect("config");

    let app = Router::new()
        .on(Method::GET, "/users/:id", show_user)
        .on(Method::POST, "/users", create_user)
        .on(Method::GET, "/stream", stream_numbers)
        .on(Method::GET, "/healthz", health::liveness)
        .on(Method::GET, "/readyz", health::readiness)
        .fallback(not_found);

    Server::bind("0.0.0.0:3000")
        .with_config(config)
        .on_shutdown(|| async { tracing::info!("cleanup done") })
        .serve(app)
        .await
        .expect("server error");
}

// GET /users/:id
async fn show_user(ctx: Context) -> Result<(), HttpError> {
    let id = ctx.param("id").unwrap_or("unknown").to_owned();
    ctx.res().not_found(id == "0", "no such user")?;
    ctx.res().json(&serde_json::json!({ "id": id, "name": "alice" }))
}

// POST /users — parses the JSON body, 400 on a missing field.
async fn create_user(mut ctx: Context) -> Result<(), HttpError> {
    let input = ctx.body().json().await?;
    let name = input.get("name").and_then(|v| v.as_str()).map(str::to_owned);
    ctx.res().bad_request(name.is_none(), "missing `name`")?;

    ctx.res().set_status(StatusCode::CREATED);
    ctx.res().set_header("location", "/users/99");
    ctx.res().json(&serde_json::json!({ "id": "99", "name": name }))
}

// GET /stream — commits on the first write, then keeps streaming.
async fn stream_numbers(ctx: Context) {
    let res = ctx.res();
    res.set_header("content-type", "text/plain; charset=utf-8");
    for n in 1..=5 {
        res.write(format!("{n}\n"));
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    res.end();
}

async fn not_found(ctx: Context) {
    ctx.res().set_status(StatusCode::NOT_FOUND);
    ctx.res().text("nothing here");
}
