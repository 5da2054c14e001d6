//! # lynx-core
//!
//! Value types shared by every layer of the lynx graph IR.
//!
//! This crate provides:
//! - [`Shape`] - element type, lengths and strides, plus the broadcast rule
//! - [`DType`] - element types (F16, BF16, F32, F64, U8, I8, U32, I32, I64)
//! - [`CheckShapes`] - fluent preconditions used by operator shape inference
//! - [`Argument`] / [`Storage`] - runtime values, with buffer-sharing views
//! - [`Context`] - type-erased target handle with checked downcasts
//! - [`Error`] - diagnostics carrying source location and operator name

pub mod argument;
pub mod check;
pub mod context;
pub mod dtype;
pub mod error;
pub mod shape;
pub mod storage;

pub use argument::Argument;
pub use check::CheckShapes;
pub use context::{Context, NullContext};
pub use dtype::{DType, WithDType};
pub use error::{Error, ErrorKind, Result, SourceLocation};
pub use shape::Shape;
pub use storage::{Buffer, Storage};
