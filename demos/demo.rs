//! crashless demo — every route here fails on purpose (except /ping).
//!
//! Run with:
//!   RUST_LOG=info cargo run --example demo
//!   APP_ENV=production RUST_LOG=info cargo run --example demo
//!
//! Try:
//!   curl http://localhost:4000/user/42
//!   curl -X POST http://localhost:4000/user \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -X DELETE http://localhost:4000/user/42
//!   curl http://localhost:4000/external
//!   curl http://localhost:4000/crash
//!   curl http://localhost:4000/ping
//!
//! In development mode the JSON envelopes carry the original messages and a
//! backtrace; in production mode messages are masked and the backtrace is
//! withheld, while the symbolic codes stay intact either way.

use crashless::{AppError, CatchConfig, Fault, Mode, Request, Response, Router, Server};
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mode = Mode::current();
    info!(?mode, "starting crashless demo");

    crashless::register_exporter("stdout", |env, meta| {
        info!(
            "[exporter] {} {} -> {} ({})",
            meta.method, meta.path, meta.status, env.code
        );
    });

    let app = Router::new()
        .get("/user/{id}", get_user)
        .post("/user", create_user)
        .delete("/user/{id}", delete_user)
        .get("/external", external)
        .get("/crash", crash)
        .get("/ping", ping)
        .catch(
            CatchConfig::new()
                .log(true)
                .mask_messages(true)
                .default_status(500)
                .on_telemetry(|env, meta| {
                    info!(
                        "[telemetry] {} {} -> {} ({})",
                        meta.method, meta.path, meta.status, env.code
                    );
                }),
        );

    let port = std::env::var("PORT").unwrap_or_else(|_| "4000".to_owned());
    Server::bind(&format!("0.0.0.0:{port}"))
        .serve(app)
        .await
        .expect("server error");
}

// ── Routes ────────────────────────────────────────────────────────────────────

async fn get_user(req: Request) -> Result<Response, Fault> {
    let id = req.param("id").unwrap_or("unknown").to_owned();
    let user = db::get_user(&id).await?;
    Ok(Response::json(serde_json::to_vec(&user).unwrap_or_default()))
}

async fn create_user(req: Request) -> Result<Response, Fault> {
    let user = db::create_user(req.body()).await?;
    Ok(Response::builder()
        .status(201)
        .json(serde_json::to_vec(&user).unwrap_or_default()))
}

async fn delete_user(req: Request) -> Result<Response, Fault> {
    let id = req.param("id").unwrap_or("unknown").to_owned();
    let result = db::delete_user(&id).await?;
    Ok(Response::json(serde_json::to_vec(&result).unwrap_or_default()))
}

async fn external(_req: Request) -> Result<Response, Fault> {
    let data = db::fetch_external_data().await?;
    Ok(Response::json(serde_json::to_vec(&data).unwrap_or_default()))
}

async fn crash(_req: Request) -> Result<Response, Fault> {
    Err(AppError::new("Manual crash triggered!")
        .status(500)
        .code("ORGANIC_CRASH")
        .into())
}

async fn ping(_req: Request) -> Response {
    Response::json(br#"{"success":true,"message":"Server alive"}"#.to_vec())
}

// ── Mock data access ──────────────────────────────────────────────────────────
//
// Simulated latency and simulated failure. These are opaque fallible
// dependencies from the middleware's point of view.

mod db {
    use std::time::Duration;

    use serde_json::{Value, json};

    type DbError = Box<dyn std::error::Error + Send + Sync>;

    pub async fn get_user(id: &str) -> Result<Value, DbError> {
        delay(300).await;
        Err(format!("Database read failed for user ID: {id}").into())
    }

    pub async fn create_user(_data: &[u8]) -> Result<Value, DbError> {
        delay(300).await;
        Err("Database write failed - user not created.".into())
    }

    pub async fn delete_user(id: &str) -> Result<Value, DbError> {
        delay(300).await;
        Err(format!("Database delete failed for user ID: {id}").into())
    }

    pub async fn fetch_external_data() -> Result<Value, DbError> {
        delay(400).await;
        if fastrand::f32() < 0.5 {
            return Err("External API timeout - simulated failure.".into());
        }
        Ok(json!({
            "source": "mock-api",
            "data": { "temperature": 26, "humidity": 78 },
            "message": "Fetched successfully (simulated)"
        }))
    }

    async fn delay(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
