use std::any::{Any, type_name};
use std::backtrace::Backtrace;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};

use crate::hook::{self, Accepts, Scope};
use crate::{CapturedPanic, Fault};

/// Default bound on a captured stack trace, in bytes.
pub const DEFAULT_STACK_LIMIT: usize = 65_535;

/// Smallest stack bound a guard accepts; lower values are raised to this.
pub const MIN_STACK_LIMIT: usize = 256;

/// Environment variable read by [`Guard::from_env`] for the stack bound.
pub const STACK_LIMIT_VAR: &str = "PANIC_GUARD_STACK_LIMIT";

/// Environment variable read by [`Guard::from_env`]; `1` reports caught panics.
pub const REPORT_VAR: &str = "PANIC_GUARD_REPORT";

/// Runs closures, turning their panics into [`CapturedPanic`] errors.
///
/// Panics raised by the runtime itself (see [`Fault`]) are never caught:
/// they keep unwinding exactly as if no guard was there. That check comes
/// before any payload type filtering.
///
/// Caught panics skip the previously installed panic hook unless
/// [`Guard::report_caught`] is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guard {
    stack_limit: usize,
    report_caught: bool,
}

impl Default for Guard {
    fn default() -> Self {
        Self::new()
    }
}

impl Guard {
    pub const fn new() -> Self {
        Self {
            stack_limit: DEFAULT_STACK_LIMIT,
            report_caught: false,
        }
    }

    /// Defaults, overridden by `PANIC_GUARD_STACK_LIMIT` and `PANIC_GUARD_REPORT`.
    pub fn from_env() -> Self {
        let mut guard = Self::new();
        if let Some(value) = std::env::var_os(STACK_LIMIT_VAR) {
            match value.to_str().and_then(|value| value.trim().parse().ok()) {
                Some(limit) => guard = guard.stack_limit(limit),
                None => tracing::warn!(?value, "ignoring invalid {STACK_LIMIT_VAR}"),
            }
        }
        if let Some(value) = std::env::var_os(REPORT_VAR) {
            guard = guard.report_caught(value == "1");
        }
        guard
    }

    pub fn stack_limit(self, bytes: usize) -> Self {
        Self {
            stack_limit: bytes.max(MIN_STACK_LIMIT),
            ..self
        }
    }

    pub fn report_caught(self, report: bool) -> Self {
        Self {
            report_caught: report,
            ..self
        }
    }

    pub fn max_stack_len(&self) -> usize {
        self.stack_limit
    }

    pub fn reports_caught(&self) -> bool {
        self.report_caught
    }

    /// Runs `f`, returning any panic it raises as an error.
    pub fn catch<R>(&self, f: impl FnOnce() -> R) -> Result<R, CapturedPanic> {
        self.run(f, |_| true, None)
    }

    /// Runs `f`, returning its panic as an error only if the payload is a `T`.
    ///
    /// Any other payload continues unwinding, wrapped in a [`CapturedPanic`]
    /// so the stack trace travels with it.
    pub fn catch_only<T: Any, R>(&self, f: impl FnOnce() -> R) -> Result<R, CapturedPanic> {
        self.run(f, is::<T>, Some(type_name::<T>()))
    }

    fn run<R>(
        &self,
        f: impl FnOnce() -> R,
        accepts: Accepts,
        filter: Option<&'static str>,
    ) -> Result<R, CapturedPanic> {
        let scope = Scope::enter(accepts, self.report_caught);
        let payload = match catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => return Ok(value),
            Err(payload) => payload,
        };
        let trace = scope.take_trace(&*payload);
        drop(scope);

        if let Some(fault) = Fault::classify(&*payload) {
            tracing::debug!(?fault, "runtime fault, resuming unwind");
            resume_unwind(payload);
        }

        let captured = match payload.downcast::<CapturedPanic>() {
            Ok(inner) => {
                let matched = filter.filter(|_| accepts(inner.payload()));
                (*inner).bounded(self.stack_limit).retyped(matched)
            }
            Err(payload) => {
                let trace = trace.unwrap_or_else(Backtrace::force_capture);
                let matched = filter.filter(|_| accepts(&*payload));
                CapturedPanic::new(hook::render_stack(&trace, self.stack_limit), payload, matched)
            }
        };

        if !accepts(captured.payload()) {
            tracing::debug!(
                payload = captured.description(),
                expected = ?filter,
                "panic payload not accepted, resuming unwind"
            );
            captured.resume();
        }
        tracing::trace!(payload = captured.description(), "panic intercepted");
        Err(captured)
    }
}

fn is<T: Any>(payload: &(dyn Any + Send)) -> bool {
    payload.is::<T>()
}
