//! Scoped interception.
//!
//! Unwinding erases the frames that raised a panic before `catch_unwind`
//! returns, so the backtrace has to be taken earlier, from the panic hook.
//! A single process-wide hook is installed on first use and chained to
//! whatever hook was there before. It only acts on threads that currently
//! run inside a guard; each guard pushes a [`Scope`] on a thread-local stack
//! for exactly the duration of its call.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::PanicHookInfo;
use std::sync::Once;

use crate::Fault;
use crate::payload::{self, Fingerprint};

pub(crate) type Accepts = fn(&(dyn Any + Send)) -> bool;

struct Frame {
    accepts: Accepts,
    report_caught: bool,
    trace: Option<(Fingerprint, Backtrace)>,
}

thread_local! {
    static FRAMES: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

static INSTALL: Once = Once::new();

fn install() {
    // `take_hook` refuses to run on a panicking thread; a guard used from a
    // destructor during unwinding installs on a later call instead.
    if std::thread::panicking() {
        return;
    }
    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if !intercept(info) {
                previous(info);
            }
        }));
    });
}

/// Records a backtrace for the innermost scope.
///
/// Returns `true` when the panic is about to be caught by one of the active
/// scopes and should not be reported. Must not panic.
fn intercept(info: &PanicHookInfo<'_>) -> bool {
    FRAMES
        .try_with(|frames| {
            let Ok(mut frames) = frames.try_borrow_mut() else {
                return false;
            };
            let Some(innermost) = frames.last_mut() else {
                return false;
            };
            let payload = payload::original(info.payload());
            innermost.trace = Some((Fingerprint::of(payload), Backtrace::force_capture()));

            if Fault::classify(payload).is_some() {
                return false;
            }
            frames
                .iter()
                .rev()
                .find(|frame| (frame.accepts)(payload))
                .is_some_and(|frame| !frame.report_caught)
        })
        .unwrap_or(false)
}

/// One active guard on the current thread. Popped on drop.
pub(crate) struct Scope {
    depth: usize,
}

impl Scope {
    pub(crate) fn enter(accepts: Accepts, report_caught: bool) -> Self {
        install();
        let depth = FRAMES.with_borrow_mut(|frames| {
            frames.push(Frame {
                accepts,
                report_caught,
                trace: None,
            });
            frames.len()
        });
        Self { depth }
    }

    /// The backtrace the hook recorded inside this scope, if it was recorded
    /// for `payload`. A trace left by a panic the callable caught itself
    /// is discarded.
    pub(crate) fn take_trace(&self, payload: &(dyn Any + Send)) -> Option<Backtrace> {
        let (fingerprint, trace) = FRAMES.with_borrow_mut(|frames| {
            frames
                .get_mut(self.depth - 1)
                .and_then(|frame| frame.trace.take())
        })?;
        (fingerprint == Fingerprint::of(payload)).then_some(trace)
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        let _ = FRAMES.try_with(|frames| {
            if let Ok(mut frames) = frames.try_borrow_mut() {
                frames.truncate(self.depth - 1);
            }
        });
    }
}

/// Renders a backtrace, never empty and at most `limit` bytes long.
pub(crate) fn render_stack(trace: &Backtrace, limit: usize) -> String {
    let mut stack = trace.to_string();
    if stack.trim().is_empty() {
        stack = String::from("<stack trace unavailable>");
    }
    truncate_on_char_boundary(&mut stack, limit);
    stack
}

pub(crate) fn truncate_on_char_boundary(text: &mut String, limit: usize) {
    if text.len() <= limit {
        return;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}
