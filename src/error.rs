//! Failure values: the [`AppError`] factory and the [`Fault`] taxonomy.
//!
//! `AppError` is what application code constructs on purpose: a message, an
//! HTTP status, a stable symbolic code, and an optional structured payload.
//! `Fault` is what the dispatch pipeline actually carries — *any* failure a
//! handler can produce, classified into one of three shapes before it ever
//! reaches the normalizing catcher:
//!
//! - [`Fault::Domain`] — an explicit `AppError`, passed through unchanged.
//! - [`Fault::Generic`] — some other error-like value; gets a derived
//!   `ERR_<status>` code and the configured default status.
//! - [`Fault::Malformed`] — a failure carrying no usable error value at all
//!   (e.g. a panic with a non-string payload); pinned to 500 / `ERR_500`.

use std::backtrace::Backtrace;
use std::fmt;

/// An explicitly constructed application failure.
///
/// Defaults are `500` / `"ERR_INTERNAL"`; chain the builder methods to
/// override them:
///
/// ```rust
/// use crashless::AppError;
/// use serde_json::json;
///
/// let err = AppError::new("Oops")
///     .status(404)
///     .code("NOT_FOUND")
///     .details(json!({"id": 99}));
///
/// assert_eq!(err.status_code(), 404);
/// assert_eq!(err.code_str(), "NOT_FOUND");
/// ```
///
/// A backtrace is captured at construction; it surfaces as the envelope's
/// `stack` field in development mode only.
#[derive(Debug)]
pub struct AppError {
    message: String,
    status: u16,
    code: String,
    details: Option<serde_json::Value>,
    trace: Backtrace,
}

impl AppError {
    /// Builds an error with the given message, status `500`, and code
    /// `"ERR_INTERNAL"`. The message is not validated — empty is allowed.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: 500,
            code: "ERR_INTERNAL".to_owned(),
            details: None,
            trace: Backtrace::force_capture(),
        }
    }

    /// Sets the HTTP status. Not range-checked — that is the caller's job.
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Sets the symbolic code. Codes are stable identifiers and are never
    /// masked, even in production.
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Attaches a structured payload, carried verbatim into the envelope.
    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    pub fn code_str(&self) -> &str {
        &self.code
    }

    pub fn details_value(&self) -> Option<&serde_json::Value> {
        self.details.as_ref()
    }

    pub(crate) fn into_parts(self) -> (String, u16, String, Option<serde_json::Value>, Backtrace) {
        (self.message, self.status, self.code, self.details, self.trace)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} {}]", self.message, self.status, self.code)
    }
}

impl std::error::Error for AppError {}

// ── Fault ─────────────────────────────────────────────────────────────────────

/// Any failure a handler can produce, classified.
///
/// This is the error-propagation channel's value type: handlers return
/// `Result<_, Fault>` (usually via `?` and a `From` conversion below), and
/// the catcher normalizes whichever variant arrives.
#[derive(Debug)]
pub enum Fault {
    /// A recognized [`AppError`] — status, code, and details are used as-is.
    Domain(AppError),
    /// An error-like value without a symbolic code.
    Generic { message: String },
    /// A failure with no usable error value.
    Malformed,
}

impl Fault {
    /// Classifies a panic payload. String payloads carry a message and
    /// become [`Fault::Generic`]; anything else is [`Fault::Malformed`].
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        if let Some(s) = payload.downcast_ref::<&str>() {
            Fault::Generic { message: (*s).to_owned() }
        } else if let Ok(s) = payload.downcast::<String>() {
            Fault::Generic { message: *s }
        } else {
            Fault::Malformed
        }
    }
}

impl From<AppError> for Fault {
    fn from(err: AppError) -> Self {
        Fault::Domain(err)
    }
}

/// Boxed errors are the common "some dependency failed" shape. An
/// `AppError` that was boxed along the way is recovered by downcast so it
/// keeps its status and code.
impl From<Box<dyn std::error::Error + Send + Sync>> for Fault {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        match err.downcast::<AppError>() {
            Ok(app) => Fault::Domain(*app),
            Err(other) => Fault::Generic { message: other.to_string() },
        }
    }
}

impl From<String> for Fault {
    fn from(message: String) -> Self {
        Fault::Generic { message }
    }
}

impl From<&str> for Fault {
    fn from(message: &str) -> Self {
        Fault::Generic { message: message.to_owned() }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Domain(err) => err.fmt(f),
            Fault::Generic { message } => f.write_str(message),
            Fault::Malformed => f.write_str("malformed failure"),
        }
    }
}
