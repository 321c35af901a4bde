//! Append-only diagnostic sink shared by every compile phase.
//!
//! Phases report recoverable problems (missing handlers, unresolved shapes,
//! incompatible grouping schemas) here and keep going; callers check
//! `has_error()` before trusting a phase's output. The sink is `Sync` so
//! independent stage passes may share one.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Compile phase that produced the report (e.g. "decompose", "shuffle").
    pub phase: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}[{}]: {}", level, self.phase, self.message)
    }
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Mutex<Vec<Diagnostic>>,
    errors: AtomicUsize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&self, phase: &str, message: impl Into<String>) {
        self.push(Severity::Error, phase, message.into());
    }

    pub fn warn(&self, phase: &str, message: impl Into<String>) {
        self.push(Severity::Warning, phase, message.into());
    }

    fn push(&self, severity: Severity, phase: &str, message: String) {
        if severity == Severity::Error {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        let entry = Diagnostic {
            severity,
            phase: phase.to_string(),
            message,
        };
        log_entry(&entry);
        // A poisoned lock still holds every entry appended before the panic.
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }

    pub fn has_error(&self) -> bool {
        self.error_count() > 0
    }

    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    /// Snapshot of everything reported so far, in report order.
    pub fn entries(&self) -> Vec<Diagnostic> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// A handle for one pass: reports land here, errors are also tallied
    /// on the handle so the pass can tell its own failures apart from
    /// those of passes sharing this sink.
    pub fn scope(&self) -> DiagScope<'_> {
        DiagScope {
            sink: self,
            errors: Cell::new(0),
        }
    }

    /// Error messages only; handy in tests.
    pub fn error_messages(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| d.message)
            .collect()
    }
}

#[derive(Debug)]
pub struct DiagScope<'d> {
    sink: &'d Diagnostics,
    errors: Cell<usize>,
}

impl DiagScope<'_> {
    pub fn error(&self, phase: &str, message: impl Into<String>) {
        self.errors.set(self.errors.get() + 1);
        self.sink.error(phase, message);
    }

    pub fn warn(&self, phase: &str, message: impl Into<String>) {
        self.sink.warn(phase, message);
    }

    /// Errors reported through this handle only.
    pub fn error_count(&self) -> usize {
        self.errors.get()
    }

    pub fn has_error(&self) -> bool {
        self.error_count() > 0
    }
}

#[cfg(feature = "tracing")]
fn log_entry(entry: &Diagnostic) {
    match entry.severity {
        Severity::Error => tracing::error!(phase = %entry.phase, message = %entry.message, "compile error"),
        Severity::Warning => tracing::warn!(phase = %entry.phase, message = %entry.message, "compile warning"),
    }
}

#[cfg(not(feature = "tracing"))]
fn log_entry(_entry: &Diagnostic) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_counts_only_its_own_errors() {
        let sink = Diagnostics::new();
        let scope = sink.scope();
        sink.error("other", "unrelated failure");
        assert!(!scope.has_error());

        scope.warn("mine", "just a warning");
        scope.error("mine", "broken");
        assert_eq!(scope.error_count(), 1);
        assert_eq!(sink.error_count(), 2);
        assert_eq!(sink.entries().len(), 3);
        assert_eq!(sink.error_messages(), vec!["unrelated failure", "broken"]);
    }

    #[test]
    fn scopes_on_threads_share_one_list() {
        let sink = Diagnostics::new();
        std::thread::scope(|s| {
            for t in 0..4 {
                let sink = &sink;
                s.spawn(move || {
                    let scope = sink.scope();
                    for i in 0..t {
                        scope.error("pass", format!("{}-{}", t, i));
                    }
                    assert_eq!(scope.error_count(), t);
                });
            }
        });
        assert_eq!(sink.error_count(), 6);
        assert_eq!(sink.error_messages().len(), 6);
    }
}
