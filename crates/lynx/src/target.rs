use lynx_core::{Context, Result};

use crate::module::Module;

// Target - what a program is compiled for
//
// A target rewrites each module into operators it can run (typically with
// `Module::replace_operation`, which keeps every inferred shape intact) and
// supplies the context those operators will find during evaluation.

pub trait Target {
    fn name(&self) -> &str;

    /// Rewrite `module` for this target. Must not change any inferred shape.
    fn lower(&self, module: &mut Module) -> Result<()>;

    /// Fresh context handed to every `compute` during evaluation.
    fn context(&self) -> Context;
}
