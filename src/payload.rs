use std::any::{Any, TypeId};

use crate::CapturedPanic;

/// Panics raised by the runtime itself rather than by an explicit `panic!`.
///
/// A fault points at a defect in the guarded code (a bad index, a zero
/// divisor, an unwrapped `None`), so guards always let it keep unwinding
/// instead of turning it into an error value.
///
/// Classification looks at the message std attaches to these panics, so an
/// explicit `panic!` that reuses the exact wording is treated as a fault too.
/// Other std assertions (`copy_from_slice` length mismatches, `RefCell`
/// borrow conflicts, `Result::unwrap`, `expect`) count as explicit raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Element access past the end: indexing, `VecDeque` indexing, and the
    /// position checks of `Vec::remove`, `insert` and `swap_remove`.
    IndexOutOfBounds,
    /// Out of range or inverted slice ranges, `split_at` past the end, and
    /// `str` byte indices off a char boundary or out of bounds.
    SliceIndex,
    /// Integer division or remainder by zero.
    DivideByZero,
    /// Checked arithmetic that overflowed (debug builds, or `overflow-checks`).
    ArithmeticOverflow,
    /// `Option::unwrap()` on a `None` value.
    NoneUnwrap,
}

impl Fault {
    /// Returns the fault category of a panic payload, if it is one.
    ///
    /// A payload that was already wrapped by a guard is classified by the
    /// payload it carries.
    pub fn classify(payload: &(dyn Any + Send)) -> Option<Self> {
        message(original(payload)).and_then(Self::classify_message)
    }

    fn classify_message(message: &str) -> Option<Self> {
        const INDEX_PREFIXES: &[&str] = &[
            "index out of bounds: ",
            "removal index (is ",
            "insertion index (is ",
            "swap_remove index (is ",
        ];
        const SLICE_PREFIXES: &[&str] = &[
            "range start index ",
            "range end index ",
            "slice index starts at ",
            "begin <= end ",
            "failed to slice string",
        ];
        let starts_with_any = |prefixes: &[&str]| prefixes.iter().any(|p| message.starts_with(p));

        if starts_with_any(INDEX_PREFIXES) || message == "Out of bounds access" {
            Some(Self::IndexOutOfBounds)
        } else if starts_with_any(SLICE_PREFIXES)
            || message == "mid > len"
            || message == "assertion failed: mid <= self.len()"
            || is_str_boundary(message)
        {
            Some(Self::SliceIndex)
        } else if message == "attempt to divide by zero"
            || message == "attempt to calculate the remainder with a divisor of zero"
        {
            Some(Self::DivideByZero)
        } else if message.starts_with("attempt to ") && message.ends_with(" with overflow") {
            Some(Self::ArithmeticOverflow)
        } else if message == "called `Option::unwrap()` on a `None` value" {
            Some(Self::NoneUnwrap)
        } else {
            None
        }
    }
}

/// `str` slicing faults: `byte index 9 is out of bounds of ..`, with or
/// without a `start `/`end ` prefix, and `byte index 1 is not a char boundary`.
fn is_str_boundary(message: &str) -> bool {
    message.contains("byte index ")
        && (message.contains(" is out of bounds of `") || message.contains(" is not a char boundary"))
}

/// Looks through a payload re-raised by an inner guard.
pub(crate) fn original(payload: &(dyn Any + Send)) -> &(dyn Any + Send) {
    match payload.downcast_ref::<CapturedPanic>() {
        Some(captured) => captured.payload(),
        None => payload,
    }
}

/// The text of a `panic!("...")` payload.
pub(crate) fn message(payload: &(dyn Any + Send)) -> Option<&str> {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        Some(*message)
    } else {
        payload.downcast_ref::<String>().map(String::as_str)
    }
}

/// Renders a payload for display.
///
/// `type_name` is used for payloads of a type that is known to the caller
/// but has no textual form reachable through `Any`.
pub(crate) fn describe(payload: &(dyn Any + Send), type_name: Option<&'static str>) -> String {
    if let Some(text) = describe_builtin(payload) {
        return text;
    }
    if let Some(error) = payload.downcast_ref::<Box<dyn std::error::Error + Send + Sync>>() {
        return error.to_string();
    }
    if let Some(error) = payload.downcast_ref::<Box<dyn std::error::Error + Send>>() {
        return error.to_string();
    }
    if let Some(error) = payload.downcast_ref::<std::io::Error>() {
        return error.to_string();
    }
    type_name.unwrap_or("Box<dyn Any>").to_owned()
}

/// Text of string and primitive payloads. Runs no user code, so it is safe
/// to call from the panic hook.
fn describe_builtin(payload: &(dyn Any + Send)) -> Option<String> {
    if let Some(message) = message(payload) {
        return Some(message.to_owned());
    }

    macro_rules! display_as {
        ($($ty:ty),* $(,)?) => {
            $(
                if let Some(value) = payload.downcast_ref::<$ty>() {
                    return Some(value.to_string());
                }
            )*
        };
    }

    display_as!(
        i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char,
    );
    None
}

/// Identifies a payload well enough to tell the panic the hook saw apart
/// from a different payload resumed later on the same thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Fingerprint {
    type_id: TypeId,
    text: Option<String>,
}

impl Fingerprint {
    pub(crate) fn of(payload: &(dyn Any + Send)) -> Self {
        let any: &dyn Any = payload;
        Self {
            type_id: any.type_id(),
            text: describe_builtin(payload),
        }
    }
}
