//! End-to-end contract tests for the capture pipeline, driven through
//! `Router::respond` — the same entry the server uses per request.
//!
//! Tests that depend on the environment mode hold a shared lock while the
//! `APP_ENV` variable is set, since the process environment is global.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crashless::{
    AppError, CatchConfig, ENV_VAR, ErrorCatcher, ErrorMeta, Fault, Method, Request, Response,
    ResponseSlot, Router, register_exporter,
};
use serde_json::Value;

static ENV_LOCK: Mutex<()> = Mutex::new(());

struct ModeGuard(#[allow(dead_code)] MutexGuard<'static, ()>);

impl Drop for ModeGuard {
    fn drop(&mut self) {
        unsafe { std::env::remove_var(ENV_VAR) };
    }
}

/// Pins the environment mode for the duration of the returned guard.
fn pin_mode(value: Option<&str>) -> ModeGuard {
    let guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    match value {
        Some(v) => unsafe { std::env::set_var(ENV_VAR, v) },
        None => unsafe { std::env::remove_var(ENV_VAR) },
    }
    ModeGuard(guard)
}

fn body_json(res: &Response) -> Value {
    serde_json::from_slice(res.body_bytes()).expect("body is not JSON")
}

// ── Basic error handling ──────────────────────────────────────────────────────

#[tokio::test]
async fn catches_async_route_errors_safely() {
    async fn async_fail(_req: Request) -> Result<Response, Fault> {
        Err(AppError::new("Boom").status(400).code("BAD_REQUEST").into())
    }
    let app = Router::new()
        .get("/async-fail", async_fail)
        .catch(CatchConfig::new().log(false));

    let res = app.respond(Request::new(Method::Get, "/async-fail")).await;
    assert_eq!(res.status_code(), 400);
    let body = body_json(&res);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn plain_errors_get_default_status_and_derived_code() {
    async fn sync_fail(_req: Request) -> Result<Response, Fault> {
        let err: Box<dyn std::error::Error + Send + Sync> =
            Box::new(std::io::Error::other("Sync error"));
        Err(err.into())
    }
    let app = Router::new()
        .get("/sync-fail", sync_fail)
        .catch(CatchConfig::new().log(false));

    let res = app.respond(Request::new(Method::Get, "/sync-fail")).await;
    assert_eq!(res.status_code(), 500);
    assert_eq!(body_json(&res)["code"], "ERR_500");
}

#[tokio::test]
async fn manually_built_errors_keep_custom_codes() {
    async fn manual(_req: Request) -> Result<Response, Fault> {
        Err(AppError::new("Unauthorized")
            .status(401)
            .code("UNAUTHORIZED")
            .into())
    }
    let app = Router::new()
        .get("/manual", manual)
        .catch(CatchConfig::new().log(false));

    let res = app.respond(Request::new(Method::Get, "/manual")).await;
    assert_eq!(res.status_code(), 401);
    assert_eq!(body_json(&res)["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn configured_default_status_applies_to_generic_faults_only() {
    async fn flaky(_req: Request) -> Result<Response, Fault> {
        Err("upstream unavailable".into())
    }
    let app = Router::new()
        .get("/flaky", flaky)
        .catch(CatchConfig::new().log(false).default_status(502));

    let res = app.respond(Request::new(Method::Get, "/flaky")).await;
    assert_eq!(res.status_code(), 502);
    assert_eq!(body_json(&res)["code"], "ERR_502");
}

#[tokio::test]
async fn panicking_handler_becomes_an_envelope_not_a_crash() {
    async fn kaboom(_req: Request) -> Response {
        panic!("handler blew up");
    }
    let app = Router::new()
        .get("/kaboom", kaboom)
        .catch(CatchConfig::new().log(false));

    let res = app.respond(Request::new(Method::Get, "/kaboom")).await;
    assert_eq!(res.status_code(), 500);
    let body = body_json(&res);
    assert_eq!(body["code"], "ERR_500");
    assert_eq!(body["success"], false);
}

// ── Masking & stack exposure ──────────────────────────────────────────────────

#[tokio::test]
async fn masks_sensitive_messages_in_production() {
    let _mode = pin_mode(Some("production"));

    async fn secret(_req: Request) -> Result<Response, Fault> {
        Err(AppError::new("Sensitive info").code("SERVER_ERROR").into())
    }
    let app = Router::new()
        .get("/secret", secret)
        .catch(CatchConfig::new().log(false).mask_messages(true));

    let res = app.respond(Request::new(Method::Get, "/secret")).await;
    let body = body_json(&res);
    assert_eq!(body["message"], "Internal server error");
    assert_eq!(body["code"], "SERVER_ERROR");
    assert!(body.get("stack").is_none());
}

#[tokio::test]
async fn exposes_stack_and_original_message_in_development() {
    let _mode = pin_mode(None);

    async fn dev(_req: Request) -> Result<Response, Fault> {
        Err(AppError::new("Dev fail").code("DEV_ERROR").into())
    }
    let app = Router::new()
        .get("/dev", dev)
        .catch(CatchConfig::new().log(false));

    let res = app.respond(Request::new(Method::Get, "/dev")).await;
    let body = body_json(&res);
    assert_eq!(body["message"], "Dev fail");
    let stack = body["stack"].as_str().unwrap_or("");
    assert!(!stack.is_empty());
}

// ── Edge cases ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_failure_yields_unknown_error_500() {
    let _mode = pin_mode(None);
    let catcher = ErrorCatcher::new(CatchConfig::new().log(false));
    let mut slot = ResponseSlot::new();

    catcher.handle(Fault::Malformed, Method::Get, "/null", &mut slot);

    let res = slot.into_response().expect("envelope committed");
    assert_eq!(res.status_code(), 500);
    assert_eq!(body_json(&res)["message"], "Unknown error");
}

#[tokio::test]
async fn failure_after_committed_response_is_dropped() {
    let catcher = ErrorCatcher::new(CatchConfig::new().log(false));
    let mut slot = ResponseSlot::new();
    slot.commit(Response::text("Sent!"));

    catcher.handle(
        AppError::new("Too late").code("TOO_LATE").into(),
        Method::Get,
        "/headers-sent",
        &mut slot,
    );

    let res = slot.into_response().expect("original response kept");
    assert_eq!(res.status_code(), 200);
    assert_eq!(res.body_bytes(), b"Sent!");
}

// ── Telemetry, logging & exporters ────────────────────────────────────────────

#[tokio::test]
async fn telemetry_callback_receives_request_metadata() {
    let captured: Arc<Mutex<Option<ErrorMeta>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&captured);

    async fn telemetry(_req: Request) -> Result<Response, Fault> {
        Err(AppError::new("Telemetry test").code("TELEMETRY").into())
    }
    let app = Router::new().get("/telemetry", telemetry).catch(
        CatchConfig::new()
            .log(false)
            .on_telemetry(move |_env, meta| {
                *sink.lock().unwrap() = Some(meta.clone());
            }),
    );

    app.respond(Request::new(Method::Get, "/telemetry")).await;
    // Observers are scheduled, not awaited; give them a turn.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let meta = captured.lock().unwrap().clone().expect("telemetry fired");
    assert_eq!(meta.method, "GET");
    assert_eq!(meta.path, "/telemetry");
    assert_eq!(meta.status, 500);
}

#[tokio::test]
async fn registered_exporters_fire_for_captured_failures() {
    let called = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&called);
    register_exporter("mock-e2e", move |_env, meta| {
        if meta.path == "/exporter-fail" {
            assert_eq!(meta.method, "GET");
            sink.fetch_add(1, Ordering::SeqCst);
        }
    });

    async fn fail(_req: Request) -> Result<Response, Fault> {
        Err(AppError::new("Exporter test").code("TEST_EXPORT").into())
    }
    let app = Router::new()
        .get("/exporter-fail", fail)
        .catch(CatchConfig::new().log(false));

    app.respond(Request::new(Method::Get, "/exporter-fail")).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(called.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn re_registering_an_exporter_replaces_it() {
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    let sink = Arc::clone(&first);
    register_exporter("replace-me", move |_env, meta| {
        if meta.path == "/replaced" {
            sink.fetch_add(1, Ordering::SeqCst);
        }
    });
    let sink = Arc::clone(&second);
    register_exporter("replace-me", move |_env, meta| {
        if meta.path == "/replaced" {
            sink.fetch_add(1, Ordering::SeqCst);
        }
    });

    async fn fail(_req: Request) -> Result<Response, Fault> {
        Err(AppError::new("replaced").into())
    }
    let app = Router::new()
        .get("/replaced", fail)
        .catch(CatchConfig::new().log(false));

    app.respond(Request::new(Method::Get, "/replaced")).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn log_false_means_zero_log_writes() {
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct CountingWriter(Arc<AtomicUsize>);

    impl std::io::Write for CountingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CountingWriter {
        type Writer = CountingWriter;
        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    let writes = Arc::new(AtomicUsize::new(0));
    let writer = CountingWriter(Arc::clone(&writes));
    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer)
        .finish();

    let silent = ErrorCatcher::new(CatchConfig::new().log(false));
    let noisy = ErrorCatcher::new(CatchConfig::new().log(true));

    tracing::subscriber::with_default(subscriber, || {
        let mut slot = ResponseSlot::new();
        silent.handle(
            AppError::new("Silent fail").code("SILENT").into(),
            Method::Get,
            "/silent",
            &mut slot,
        );
        assert_eq!(writes.load(Ordering::SeqCst), 0);

        let mut slot = ResponseSlot::new();
        noisy.handle(
            AppError::new("Loud fail").code("LOUD").into(),
            Method::Get,
            "/loud",
            &mut slot,
        );
        assert!(writes.load(Ordering::SeqCst) > 0);
    });
}

// ── Success path ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn success_responses_are_untouched() {
    async fn success(_req: Request) -> Response {
        Response::json(br#"{"success":true,"data":"OK"}"#.to_vec())
    }
    let app = Router::new()
        .get("/success", success)
        .catch(CatchConfig::new().log(false));

    let res = app.respond(Request::new(Method::Get, "/success")).await;
    assert_eq!(res.status_code(), 200);
    assert_eq!(body_json(&res)["success"], true);
}

#[tokio::test]
async fn factory_status_and_code_always_match_the_response() {
    for (status, code) in [(400_u16, "BAD_REQUEST"), (403, "FORBIDDEN"), (409, "CONFLICT")] {
        let catcher = ErrorCatcher::new(CatchConfig::new().log(false));
        let mut slot = ResponseSlot::new();
        catcher.handle(
            AppError::new("x").status(status).code(code).into(),
            Method::Get,
            "/combo",
            &mut slot,
        );
        let res = slot.into_response().unwrap();
        assert_eq!(res.status_code(), status);
        assert_eq!(body_json(&res)["code"], code);
    }
}
