use std::fmt;
use std::panic::Location;

// Error - Diagnostics raised while building, compiling or evaluating a graph
//
// Every error records three things a developer needs to find the problem:
//
//   1. the source location (`file:line`) where it was raised,
//   2. the name of the operator involved, when there is one,
//   3. a human-readable reason.
//
// Rendered, that reads:
//
//   crates/lynx-ops/src/gemm.rs:41: gemm: inner dimensions do not match
//
// The location is captured with `#[track_caller]`, so the constructors below
// report the line of whoever called them rather than this file.

/// `file:line` tag of the code that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    file: &'static str,
    line: u32,
}

impl SourceLocation {
    /// Location of the caller.
    #[track_caller]
    pub fn caller() -> Self {
        let loc = Location::caller();
        SourceLocation {
            file: loc.file(),
            line: loc.line(),
        }
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

fn op_prefix(op: &Option<String>) -> String {
    match op {
        Some(name) => format!("{name}: "),
        None => String::new(),
    }
}

/// All errors that can occur within lynx.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Wrong arity, rank, dimensions or element type across an operator's inputs.
    #[error("{location}: {}{reason}", op_prefix(.op))]
    ShapeMismatch {
        op: Option<String>,
        reason: String,
        location: SourceLocation,
    },

    /// Malformed operator parameter (bad permutation, unknown mode, reshape target).
    #[error("{location}: {}{reason}", op_prefix(.op))]
    InvalidParameter {
        op: Option<String>,
        reason: String,
        location: SourceLocation,
    },

    /// The operator has no runtime kernel at this layer.
    #[error("{location}: {}not computable", op_prefix(.op))]
    NotComputable {
        op: Option<String>,
        location: SourceLocation,
    },

    /// `compute` received a context of the wrong concrete type.
    #[error(
        "{location}: {}unexpected context type: expected {expected}, got {got}",
        op_prefix(.op)
    )]
    ContextTypeMismatch {
        op: Option<String>,
        expected: &'static str,
        got: &'static str,
        location: SourceLocation,
    },

    /// Broken graph structure or API misuse (forward reference, second return,
    /// unbound parameter, compiling twice).
    #[error("{location}: {}{reason}", op_prefix(.op))]
    Structural {
        op: Option<String>,
        reason: String,
        location: SourceLocation,
    },

    /// Generic message for cases not covered above.
    #[error("{location}: {}{reason}", op_prefix(.op))]
    Msg {
        op: Option<String>,
        reason: String,
        location: SourceLocation,
    },
}

/// Fieldless view of [`Error`], for matching on the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ShapeMismatch,
    InvalidParameter,
    NotComputable,
    ContextTypeMismatch,
    Structural,
    Msg,
}

impl Error {
    #[track_caller]
    pub fn shape_mismatch(op: Option<&str>, reason: impl Into<String>) -> Self {
        Error::ShapeMismatch {
            op: op.map(str::to_string),
            reason: reason.into(),
            location: SourceLocation::caller(),
        }
    }

    #[track_caller]
    pub fn invalid_parameter(op: Option<&str>, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            op: op.map(str::to_string),
            reason: reason.into(),
            location: SourceLocation::caller(),
        }
    }

    #[track_caller]
    pub fn not_computable(op: &str) -> Self {
        Error::NotComputable {
            op: Some(op.to_string()),
            location: SourceLocation::caller(),
        }
    }

    #[track_caller]
    pub fn context_type_mismatch(op: &str, expected: &'static str, got: &'static str) -> Self {
        Error::ContextTypeMismatch {
            op: Some(op.to_string()),
            expected,
            got,
            location: SourceLocation::caller(),
        }
    }

    #[track_caller]
    pub fn structural(reason: impl Into<String>) -> Self {
        Error::Structural {
            op: None,
            reason: reason.into(),
            location: SourceLocation::caller(),
        }
    }

    /// Create an error from any string message.
    #[track_caller]
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg {
            op: None,
            reason: s.into(),
            location: SourceLocation::caller(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            Error::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            Error::NotComputable { .. } => ErrorKind::NotComputable,
            Error::ContextTypeMismatch { .. } => ErrorKind::ContextTypeMismatch,
            Error::Structural { .. } => ErrorKind::Structural,
            Error::Msg { .. } => ErrorKind::Msg,
        }
    }

    /// Name of the operator involved, if known.
    pub fn op(&self) -> Option<&str> {
        self.op_slot_ref().as_deref()
    }

    pub fn location(&self) -> SourceLocation {
        match self {
            Error::ShapeMismatch { location, .. }
            | Error::InvalidParameter { location, .. }
            | Error::NotComputable { location, .. }
            | Error::ContextTypeMismatch { location, .. }
            | Error::Structural { location, .. }
            | Error::Msg { location, .. } => *location,
        }
    }

    /// Attach an operator name unless one is already recorded.
    pub fn with_op(mut self, name: &str) -> Self {
        let slot = self.op_slot_mut();
        if slot.is_none() {
            *slot = Some(name.to_string());
        }
        self
    }

    fn op_slot_ref(&self) -> &Option<String> {
        match self {
            Error::ShapeMismatch { op, .. }
            | Error::InvalidParameter { op, .. }
            | Error::NotComputable { op, .. }
            | Error::ContextTypeMismatch { op, .. }
            | Error::Structural { op, .. }
            | Error::Msg { op, .. } => op,
        }
    }

    fn op_slot_mut(&mut self) -> &mut Option<String> {
        match self {
            Error::ShapeMismatch { op, .. }
            | Error::InvalidParameter { op, .. }
            | Error::NotComputable { op, .. }
            | Error::ContextTypeMismatch { op, .. }
            | Error::Structural { op, .. }
            | Error::Msg { op, .. } => op,
        }
    }
}

/// Convenience Result type used throughout lynx.
pub type Result<T> = std::result::Result<T, Error>;

/// Early return with a formatted [`Error::Msg`].
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::msg(format!($($arg)*)))
    };
}
