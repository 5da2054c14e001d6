// ProgramConfig - evaluation switches
//
// Both switches are off by default. They can be set with the builder
// methods or picked up from the environment:
//
//   LYNX_TRACE_EVAL=1     log every evaluated instruction at trace level
//   LYNX_VERIFY_SHAPES=1  check each computed argument against the cached shape

use std::env;

pub const TRACE_EVAL_ENV: &str = "LYNX_TRACE_EVAL";
pub const VERIFY_SHAPES_ENV: &str = "LYNX_VERIFY_SHAPES";

/// Evaluation settings carried by a [`Program`](crate::Program).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgramConfig {
    /// Emit a `log::trace!` line per evaluated instruction.
    pub trace_eval: bool,
    /// Compare every computed shape with the shape inferred at insertion.
    pub verify_shapes: bool,
}

impl ProgramConfig {
    pub fn with_trace_eval(mut self, on: bool) -> Self {
        self.trace_eval = on;
        self
    }

    pub fn with_verify_shapes(mut self, on: bool) -> Self {
        self.verify_shapes = on;
        self
    }

    /// Defaults overridden by `LYNX_TRACE_EVAL` / `LYNX_VERIFY_SHAPES`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| lookup(key).map_or(false, |v| is_truthy(&v));
        ProgramConfig {
            trace_eval: flag(TRACE_EVAL_ENV),
            verify_shapes: flag(VERIFY_SHAPES_ENV),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
