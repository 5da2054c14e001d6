use std::any::{type_name, Any};
use std::fmt;

use crate::error::{Error, Result};

// Context - Opaque per-target execution handle
//
// Each target hands out its own context type (a device queue, a thread
// pool, a handle to a driver). The IR never knows the concrete type; it
// passes the context through to every operator's `compute`. Operators that
// need a particular target ask for it by type and get an error, not a bad
// cast, when the context belongs to someone else.
//
// A context is not shared between concurrent evaluations: `compute` gets
// `&mut Context`, so one evaluation owns it for its whole duration.

/// Type-erased target context with checked downcasts.
pub struct Context {
    inner: Box<dyn Any + Send>,
    type_name: &'static str,
}

/// Context used by programs that have not been compiled for a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NullContext;

impl Context {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Context {
            inner: Box::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Name of the concrete type held.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.inner.downcast_mut::<T>()
    }

    /// Downcast on behalf of operator `op`, failing with `ContextTypeMismatch`.
    #[track_caller]
    pub fn get<T: Any>(&self, op: &str) -> Result<&T> {
        let got = self.type_name;
        match self.inner.downcast_ref::<T>() {
            Some(value) => Ok(value),
            None => Err(Error::context_type_mismatch(op, type_name::<T>(), got)),
        }
    }

    /// Mutable form of [`Context::get`].
    #[track_caller]
    pub fn get_mut<T: Any>(&mut self, op: &str) -> Result<&mut T> {
        let got = self.type_name;
        match self.inner.downcast_mut::<T>() {
            Some(value) => Ok(value),
            None => Err(Error::context_type_mismatch(op, type_name::<T>(), got)),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new(NullContext)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context({})", self.type_name)
    }
}
