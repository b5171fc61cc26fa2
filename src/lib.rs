//! Turn panics into ordinary errors.
//!
//! ```
//! let error = panic_guard::catch(|| std::panic::panic_any(42)).unwrap_err();
//! assert_eq!(error.downcast_ref::<i32>(), Some(&42));
//! assert!(error.to_string().starts_with("caught panic: 42"));
//! ```
//!
//! [`catch_only`] narrows interception to one payload type; anything else
//! keeps unwinding with the stack trace attached:
//!
//! ```
//! #[derive(Debug)]
//! struct NotFound;
//!
//! let error = panic_guard::catch_only::<NotFound, _>(|| std::panic::panic_any(NotFound));
//! assert!(error.unwrap_err().is::<NotFound>());
//! ```
//!
//! Runtime faults such as out of bounds indexing are never turned into
//! errors, see [`Fault`].

use std::any::Any;

mod captured;
mod guard;
mod hook;
mod payload;

pub use crate::captured::CapturedPanic;
pub use crate::guard::{DEFAULT_STACK_LIMIT, Guard, MIN_STACK_LIMIT, REPORT_VAR, STACK_LIMIT_VAR};
pub use crate::payload::Fault;

/// Runs `f` with a default [`Guard`], returning any panic as an error.
pub fn catch<R>(f: impl FnOnce() -> R) -> Result<R, CapturedPanic> {
    Guard::new().catch(f)
}

/// Runs `f` with a default [`Guard`], returning only panics whose payload is a `T`.
pub fn catch_only<T: Any, R>(f: impl FnOnce() -> R) -> Result<R, CapturedPanic> {
    Guard::new().catch_only::<T, R>(f)
}
