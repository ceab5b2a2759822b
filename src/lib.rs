//! # crashless
//!
//! Async-safe error capture and reporting for HTTP handlers.
//!
//! ## The contract
//!
//! Handlers fail. crashless guarantees that every failure — an explicit
//! [`AppError`], a boxed dependency error, even a panic mid-handler — is
//! absorbed into one stable JSON envelope, never an unhandled crash or a
//! raw stack trace in production:
//!
//! ```json
//! { "success": false, "message": "…", "code": "NOT_FOUND", "status": 404 }
//! ```
//!
//! - **Capture**: every registered handler is lifted at registration time
//!   to a fallible signature; `Err` flows into the installed
//!   [`ErrorCatcher`] instead of escaping.
//! - **Normalize**: any failure value becomes exactly one [`Envelope`],
//!   with `ERR_<status>` codes derived for errors that carry none.
//! - **Mask**: in production (`APP_ENV=production`) messages are replaced
//!   with a generic phrase and backtraces are withheld; symbolic codes are
//!   never masked. In development the original message and a backtrace are
//!   returned.
//! - **Report**: one structured log line per failure, a per-installation
//!   telemetry callback, and a process-wide [exporter
//!   registry](ExporterRegistry) — all off the response path, so a slow or
//!   broken observer never delays or corrupts the response.
//! - **Never double-write**: a failure arriving after a response was
//!   already committed is dropped; bytes cannot be un-sent.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use crashless::{AppError, CatchConfig, Fault, Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .get("/user/{id}", get_user)
//!         .catch(CatchConfig::new().mask_messages(true).default_status(500));
//!
//!     Server::bind("0.0.0.0:4000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Result<Response, Fault> {
//!     let id = req.param("id").unwrap_or("unknown");
//!     if id == "0" {
//!         return Err(AppError::new("no such user")
//!             .status(404)
//!             .code("NOT_FOUND")
//!             .into());
//!     }
//!     Ok(Response::json(format!(r#"{{"id":"{id}"}}"#).into_bytes()))
//! }
//! ```

mod catch;
mod envelope;
mod error;
mod exporter;
mod handler;
mod method;
mod mode;
mod request;
mod response;
mod router;
mod server;

pub use catch::{CatchConfig, ErrorCatcher, TelemetryFn};
pub use envelope::{Envelope, ErrorMeta, MASKED_MESSAGE};
pub use error::{AppError, Fault};
pub use exporter::{ExporterFn, ExporterRegistry, register_exporter};
pub use handler::{Handler, IntoOutcome, Outcome};
pub use method::Method;
pub use mode::{ENV_VAR, Mode};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseSlot};
pub use router::Router;
pub use server::{Server, ServerError};
