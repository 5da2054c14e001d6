//! # lynx-ops
//!
//! The operator catalog of the lynx IR: the [`Operator`] trait, the
//! [`Operation`] handle stored in instructions, every built-in operator and
//! the name-based [`make_op`] registry used by importers.
//!
//! Operators describe shape inference. Numeric kernels belong to targets,
//! so most operators report `NotComputable` when evaluated directly; the
//! layout operators (transpose, reshape, broadcast, contiguous), `identity`
//! and `outline` evaluate without a target.

pub mod conv;
pub mod elementwise;
pub mod gemm;
pub mod operator;
pub mod outline;
pub mod pooling;
pub mod registry;
pub mod shape_ops;

pub use conv::{Convolution, PaddingMode};
pub use elementwise::{Activation, ActivationMode, Binary, BinaryOp, Unary, UnaryOp};
pub use gemm::Gemm;
pub use operator::{Operation, Operator, OperatorEq};
pub use outline::{CheckContext, Outline};
pub use pooling::{Pooling, PoolingMode};
pub use registry::{is_registered, make_op, registered_ops};
pub use shape_ops::{Broadcast, Contiguous, Reshape, Transpose};
