//! The terminal error-normalizing middleware.
//!
//! [`ErrorCatcher`] is the last stop of the error-propagation channel: it
//! turns whatever [`Fault`] arrives into exactly one [`Envelope`], decides
//! masking and stack exposure from the current [`Mode`], writes one
//! structured log line, fans the event out to telemetry and exporters on a
//! detached task, and commits the envelope as the response — unless a
//! response was already committed, in which case it does nothing at all.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::{debug, error};

use crate::envelope::{Envelope, ErrorMeta};
use crate::error::Fault;
use crate::exporter::ExporterRegistry;
use crate::method::Method;
use crate::mode::Mode;
use crate::response::{Response, ResponseSlot};

/// Per-installation telemetry callback: `(envelope, meta)` per failure.
pub type TelemetryFn = Arc<dyn Fn(&Envelope, &ErrorMeta) + Send + Sync>;

/// Configuration for one [`ErrorCatcher`] installation.
///
/// Built once, immutable afterwards:
///
/// ```rust
/// use crashless::CatchConfig;
///
/// let config = CatchConfig::new()
///     .log(true)
///     .mask_messages(true)
///     .default_status(500)
///     .on_telemetry(|env, meta| {
///         println!("{} {} -> {} ({})", meta.method, meta.path, meta.status, env.code);
///     });
/// ```
pub struct CatchConfig {
    /// Write one structured log line per captured failure. When `false`,
    /// no log call of any kind is made.
    pub log: bool,
    /// Replace messages with a generic phrase in production. Codes are
    /// never masked.
    pub mask_messages: bool,
    /// Status assigned to generic faults that carry none of their own.
    pub default_status: u16,
    /// Optional per-installation observer, invoked off the response path.
    pub on_telemetry: Option<TelemetryFn>,
}

impl CatchConfig {
    pub fn new() -> Self {
        Self {
            log: true,
            mask_messages: true,
            default_status: 500,
            on_telemetry: None,
        }
    }

    pub fn log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    pub fn mask_messages(mut self, mask: bool) -> Self {
        self.mask_messages = mask;
        self
    }

    pub fn default_status(mut self, status: u16) -> Self {
        self.default_status = status;
        self
    }

    pub fn on_telemetry(
        mut self,
        callback: impl Fn(&Envelope, &ErrorMeta) + Send + Sync + 'static,
    ) -> Self {
        self.on_telemetry = Some(Arc::new(callback));
        self
    }
}

impl Default for CatchConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The installed error-normalizing middleware.
pub struct ErrorCatcher {
    config: CatchConfig,
}

impl ErrorCatcher {
    pub fn new(config: CatchConfig) -> Self {
        Self { config }
    }

    /// Absorbs one failure for the request identified by `method`/`path`.
    ///
    /// Never re-throws. Committing the envelope and scheduling the
    /// observers both happen here; the observers run on a detached task, so
    /// the slot holds the final status and body before any of them is
    /// guaranteed to have executed.
    ///
    /// Must be called from within a tokio runtime (dispatch always is).
    pub fn handle(&self, fault: Fault, method: Method, path: &str, slot: &mut ResponseSlot) {
        if slot.is_committed() {
            // Cannot un-send bytes. Leave the committed response alone.
            debug!(method = %method, path = %path, "failure after committed response; skipping");
            return;
        }

        let mode = Mode::current();
        let envelope = Envelope::from_fault(
            fault,
            self.config.default_status,
            self.config.mask_messages,
            mode,
        );

        if self.config.log {
            error!(
                method = %method,
                path = %path,
                status = envelope.status,
                code = %envelope.code,
                "request failed: {}",
                envelope.message,
            );
        }

        let meta = ErrorMeta {
            method: method.to_string(),
            path: path.to_owned(),
            status: envelope.status,
        };
        self.dispatch_observers(&envelope, meta);

        let body = serde_json::to_vec(&envelope)
            .unwrap_or_else(|_| br#"{"success":false,"message":"Internal server error","code":"ERR_500","status":500}"#.to_vec());
        slot.commit(Response::builder().status(envelope.status).json(body));
    }

    /// Fire-and-forget fan-out: telemetry first, then every registered
    /// exporter, each isolated from the others' panics. Nothing here is
    /// awaited by the response path.
    fn dispatch_observers(&self, envelope: &Envelope, meta: ErrorMeta) {
        let telemetry = self.config.on_telemetry.clone();
        let registry = ExporterRegistry::global();
        if telemetry.is_none() && registry.is_empty() {
            return;
        }

        let envelope = envelope.clone();
        tokio::spawn(async move {
            if let Some(callback) = telemetry {
                if catch_unwind(AssertUnwindSafe(|| callback(&envelope, &meta))).is_err() {
                    debug!("telemetry callback panicked; continuing");
                }
            }
            ExporterRegistry::global().dispatch(&envelope, &meta);
        });
    }
}
