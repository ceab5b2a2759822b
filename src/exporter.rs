//! Process-wide exporter registry.
//!
//! Exporters are named observers that receive every captured failure,
//! independent of any per-installation telemetry callback. The registry is
//! an explicit service object: tests can build private instances with
//! [`ExporterRegistry::new`], while [`ExporterRegistry::global`] hands out
//! the process-wide one that every catcher installation shares — entries
//! registered before one request are still there for the next, across app
//! instances, for the lifetime of the process.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::debug;

use crate::envelope::{Envelope, ErrorMeta};

/// An exporter callback: `(envelope, meta)` for each captured failure.
pub type ExporterFn = Arc<dyn Fn(&Envelope, &ErrorMeta) + Send + Sync>;

static GLOBAL: OnceLock<ExporterRegistry> = OnceLock::new();

/// Name → callback mapping shared by every catcher installation.
///
/// Mutation and iteration go through a mutex: dispatch snapshots the
/// current callbacks under the lock, then invokes them without holding it,
/// so a slow exporter never blocks registration.
pub struct ExporterRegistry {
    entries: Mutex<HashMap<String, ExporterFn>>,
}

impl ExporterRegistry {
    /// A standalone registry. Most code wants [`ExporterRegistry::global`].
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    /// The process-wide registry.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::new)
    }

    /// Inserts or replaces the callback registered under `name`.
    ///
    /// Replacement, not duplication: registering the same name twice leaves
    /// one callback, so a single failure triggers at most one invocation
    /// per name.
    pub fn register(
        &self,
        name: impl Into<String>,
        callback: impl Fn(&Envelope, &ErrorMeta) + Send + Sync + 'static,
    ) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(name.into(), Arc::new(callback));
    }

    /// Invokes every registered callback with `(envelope, meta)`.
    ///
    /// A panicking callback is caught and swallowed; the remaining
    /// exporters still run. Callers wanting fire-and-forget semantics
    /// relative to a response spawn this on a detached task — see the
    /// catcher.
    pub fn dispatch(&self, envelope: &Envelope, meta: &ErrorMeta) {
        let snapshot: Vec<(String, ExporterFn)> = {
            let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.iter().map(|(k, v)| (k.clone(), Arc::clone(v))).collect()
        };
        for (name, callback) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(envelope, meta))).is_err() {
                debug!(exporter = %name, "exporter panicked; continuing");
            }
        }
    }

    /// Removes every entry. Intended for test teardown.
    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ExporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registers `callback` under `name` in the process-wide registry.
pub fn register_exporter(
    name: impl Into<String>,
    callback: impl Fn(&Envelope, &ErrorMeta) + Send + Sync + 'static,
) {
    ExporterRegistry::global().register(name, callback);
}
