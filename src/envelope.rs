//! The standardized error response body and its normalization transform.
//!
//! Every failure the catcher absorbs ends up as exactly one [`Envelope`].
//! Normalization is a pure, synchronous transform over a [`Fault`] — the
//! only inputs are the fault itself, the installation's fallback status and
//! masking flag, and the resolved [`Mode`].

use std::backtrace::Backtrace;

use serde::Serialize;

use crate::error::Fault;
use crate::mode::Mode;

/// The generic phrase substituted for the real message when masking is
/// active in production. The symbolic `code` is never masked.
pub const MASKED_MESSAGE: &str = "Internal server error";

/// The JSON body written for every captured failure.
///
/// `stack` is present only in development mode; `details` only when the
/// originating [`AppError`](crate::AppError) attached one. Both serialize
/// as absent (not `null`) otherwise.
#[derive(Clone, Debug, Serialize)]
pub struct Envelope {
    /// Always `false` on this path — success responses never pass through
    /// the envelope model.
    pub success: bool,
    pub message: String,
    pub code: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Request metadata handed to telemetry and exporter callbacks.
#[derive(Clone, Debug, Serialize)]
pub struct ErrorMeta {
    pub method: String,
    pub path: String,
    pub status: u16,
}

impl Envelope {
    /// Normalizes any [`Fault`] into an envelope.
    ///
    /// `default_status` is the fallback for [`Fault::Generic`] only;
    /// malformed failures are pinned to `500` / `ERR_500` regardless of
    /// configuration.
    pub fn from_fault(fault: Fault, default_status: u16, mask_messages: bool, mode: Mode) -> Self {
        let (message, status, code, details, stack) = match fault {
            Fault::Domain(err) => {
                let (message, status, code, details, trace) = err.into_parts();
                (message, status, code, details, trace.to_string())
            }
            Fault::Generic { message } => {
                let status = default_status;
                let stack = Backtrace::force_capture().to_string();
                (message, status, format!("ERR_{status}"), None, stack)
            }
            Fault::Malformed => {
                let stack = Backtrace::force_capture().to_string();
                ("Unknown error".to_owned(), 500, "ERR_500".to_owned(), None, stack)
            }
        };

        let masked = mode.is_production() && mask_messages;
        Self {
            success: false,
            message: if masked { MASKED_MESSAGE.to_owned() } else { message },
            code,
            status,
            stack: if mode.is_production() { None } else { Some(stack) },
            details,
        }
    }
}
