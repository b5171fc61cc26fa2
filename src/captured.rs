use std::any::Any;

use crate::payload;

/// A panic turned into an error value.
///
/// Holds the original payload untouched together with the stack trace taken
/// where the panic started. Rendering it with `Display` shows both, so the
/// error alone is enough to find the root cause.
#[derive(thiserror::Error)]
#[error("caught panic: {description}\n\n{stack}")]
pub struct CapturedPanic {
    stack: String,
    description: String,
    payload: Box<dyn Any + Send>,
}

impl CapturedPanic {
    pub(crate) fn new(
        stack: String,
        payload: Box<dyn Any + Send>,
        type_name: Option<&'static str>,
    ) -> Self {
        Self {
            description: payload::describe(&*payload, type_name),
            stack,
            payload,
        }
    }

    /// Re-bounds a panic captured by an inner guard with a different limit.
    pub(crate) fn bounded(mut self, limit: usize) -> Self {
        crate::hook::truncate_on_char_boundary(&mut self.stack, limit);
        self
    }

    /// Describes the payload again once an outer filter names its type.
    pub(crate) fn retyped(mut self, type_name: Option<&'static str>) -> Self {
        if type_name.is_some() {
            self.description = payload::describe(&*self.payload, type_name);
        }
        self
    }

    /// The value the panic was raised with.
    pub fn payload(&self) -> &(dyn Any + Send) {
        &*self.payload
    }

    pub fn into_payload(self) -> Box<dyn Any + Send> {
        self.payload
    }

    pub fn is<T: Any>(&self) -> bool {
        self.payload.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }

    /// Takes the payload out as a `T`, or gives the error back unchanged.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let Self {
            stack,
            description,
            payload,
        } = self;
        match payload.downcast() {
            Ok(value) => Ok(*value),
            Err(payload) => Err(Self {
                stack,
                description,
                payload,
            }),
        }
    }

    /// The panic message, for panics raised with `panic!("...")`.
    pub fn message(&self) -> Option<&str> {
        payload::message(&*self.payload)
    }

    /// Textual form of the payload.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Continues unwinding with this error as the panic payload.
    ///
    /// An enclosing guard recognizes the payload and filters on the
    /// original value instead of wrapping it a second time.
    pub fn resume(self) -> ! {
        std::panic::resume_unwind(Box::new(self))
    }
}

impl std::fmt::Debug for CapturedPanic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedPanic")
            .field("payload", &self.description)
            .field("stack", &self.stack)
            .finish()
    }
}
