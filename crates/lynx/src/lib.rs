//! # lynx
//!
//! Intermediate representation and shape inference for a machine-learning
//! graph compiler.
//!
//! A [`Program`] holds [`Module`]s: append-only instruction graphs whose
//! every instruction has its output shape inferred at insertion. A finished
//! program is compiled for a [`Target`], which lowers operators and supplies
//! the [`Context`] they run with, and then evaluated with bound inputs.
//!
//! ```no_run
//! use lynx::prelude::*;
//!
//! let mut program = Program::new();
//! let main = program.main_module_mut();
//! let x = main.add_parameter("x", Shape::new(DType::F32, [1, 3, 32, 32]))?;
//! let w = main.add_literal(Argument::new(
//!     Shape::new(DType::F32, [8, 3, 3, 3]),
//!     Storage::zeros(DType::F32, 8 * 3 * 3 * 3),
//! )?)?;
//! let conv = main.add_instruction(Convolution::new([1, 1], [1, 1], [1, 1]), &[x, w])?;
//! main.add_return(&[conv])?;
//! assert_eq!(main.output_shapes()[0].lens(), &[1, 8, 32, 32]);
//! # Ok::<(), lynx::Error>(())
//! ```
//!
//! Crates:
//! - `lynx-core`: shapes, element types, arguments, contexts, errors
//! - `lynx-ops`: the operator trait, catalog and registry
//! - `lynx` (this crate): modules, programs, targets, configuration

pub mod config;
pub mod module;
pub mod program;
pub mod target;

pub use lynx_core;
pub use lynx_ops;

pub use config::ProgramConfig;
pub use module::{Instruction, InstructionKind, InstructionRef, Module};
pub use program::{Program, MAIN_MODULE};
pub use target::Target;

pub use lynx_core::{
    Argument, CheckShapes, Context, DType, Error, ErrorKind, NullContext, Result, Shape, Storage,
};
pub use lynx_ops::{make_op, registered_ops, Operation, Operator};

/// Everything an importer or a target usually needs.
pub mod prelude {
    pub use crate::{
        Argument, CheckShapes, Context, DType, Error, ErrorKind, InstructionRef, Module,
        Operation, Operator, Program, ProgramConfig, Result, Shape, Storage, Target,
    };
    pub use lynx_ops::{
        Activation, ActivationMode, Binary, BinaryOp, Broadcast, CheckContext, Contiguous,
        Convolution, Gemm, Outline, PaddingMode, Pooling, PoolingMode, Reshape, Transpose, Unary,
        UnaryOp,
    };
}
