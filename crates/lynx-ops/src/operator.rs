use std::any::Any;
use std::fmt;
use std::sync::Arc;

use lynx_core::{Argument, Context, Error, Result, Shape};

// Operator - The capability set every IR operation implements
//
//   name()           - stable textual name ("convolution", "add", ...)
//   compute_shape()  - output shape from input shapes; pure, deterministic,
//                      never looks at data
//   compute()        - the numeric realization against a target context;
//                      defaults to NotComputable, which is the normal state
//                      for operators that only a target's lowering can run
//   fmt_attrs()      - static parameters, for diagnostics
//
// Operators are plain structs deriving `PartialEq`. The `OperatorEq` helper
// (blanket-implemented) gives trait objects a structural equality: same
// concrete type and equal parameters. Modules rely on it when comparing
// graphs instead of comparing names.

/// Type-erasure helpers, implemented for every `Operator + PartialEq`.
pub trait OperatorEq {
    fn as_any(&self) -> &dyn Any;

    /// Same concrete operator type with equal parameters.
    fn dyn_eq(&self, other: &dyn Operator) -> bool;
}

impl<T: Operator + PartialEq> OperatorEq for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn Operator) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| self == other)
    }
}

/// An IR operation: shape inference plus an optional runtime kernel.
pub trait Operator: OperatorEq + fmt::Debug + Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Output shape for the given input shapes, or the reason they are invalid.
    fn compute_shape(&self, inputs: &[Shape]) -> Result<Shape>;

    /// Run the operation. `output` is the shape cached by `compute_shape`.
    fn compute(
        &self,
        _ctx: &mut Context,
        _output: &Shape,
        _args: &[Argument],
    ) -> Result<Argument> {
        Err(Error::not_computable(self.name()))
    }

    /// Write the operator's parameters, without the name. Empty by default.
    fn fmt_attrs(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }
}

/// Shared handle to an operator, cheap to clone and compared structurally.
#[derive(Clone)]
pub struct Operation(Arc<dyn Operator>);

impl Operation {
    pub fn new<T: Operator>(op: T) -> Self {
        Operation(Arc::new(op))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn compute_shape(&self, inputs: &[Shape]) -> Result<Shape> {
        self.0.compute_shape(inputs)
    }

    pub fn compute(
        &self,
        ctx: &mut Context,
        output: &Shape,
        args: &[Argument],
    ) -> Result<Argument> {
        self.0.compute(ctx, output, args)
    }

    pub fn as_operator(&self) -> &dyn Operator {
        self.0.as_ref()
    }

    /// The concrete operator, if it is a `T`.
    pub fn downcast_ref<T: Operator>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Operator>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }
}

impl<T: Operator> From<T> for Operation {
    fn from(op: T) -> Self {
        Operation::new(op)
    }
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(other.0.as_ref())
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// Renders `name` or `name[attrs]`.
impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attrs = AttrsDisplay(self.0.as_ref()).to_string();
        if attrs.is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}[{}]", self.name(), attrs)
        }
    }
}

struct AttrsDisplay<'a>(&'a dyn Operator);

impl fmt::Display for AttrsDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt_attrs(f)
    }
}

/// `1, 2, 3` - the list format used by `fmt_attrs` implementations.
pub(crate) fn join<T: fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lynx_core::{DType, ErrorKind};

    #[derive(Debug, Clone, PartialEq)]
    struct Scale {
        factor: u32,
    }

    impl Operator for Scale {
        fn name(&self) -> &str {
            "scale"
        }

        fn compute_shape(&self, inputs: &[Shape]) -> Result<Shape> {
            lynx_core::CheckShapes::new(inputs, Some(self.name())).has(1)?;
            Ok(inputs[0].clone())
        }

        fn fmt_attrs(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "factor={}", self.factor)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Shift {
        factor: u32,
    }

    impl Operator for Shift {
        fn name(&self) -> &str {
            "shift"
        }

        fn compute_shape(&self, inputs: &[Shape]) -> Result<Shape> {
            Ok(inputs[0].clone())
        }
    }

    #[test]
    fn test_structural_equality() {
        let a = Operation::new(Scale { factor: 2 });
        assert_eq!(a, a.clone());
        assert_eq!(a, Operation::new(Scale { factor: 2 }));
        assert_ne!(a, Operation::new(Scale { factor: 3 }));
        assert_ne!(a, Operation::new(Shift { factor: 2 }));
    }

    #[test]
    fn test_display() {
        assert_eq!(Operation::new(Scale { factor: 2 }).to_string(), "scale[factor=2]");
        assert_eq!(Operation::new(Shift { factor: 2 }).to_string(), "shift");
    }

    #[test]
    fn test_default_compute_is_not_computable() {
        let op = Operation::new(Scale { factor: 1 });
        let shape = Shape::new(DType::F32, [2]);
        let err = op
            .compute(&mut Context::default(), &shape, &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotComputable);
        assert_eq!(err.op(), Some("scale"));
    }

    #[test]
    fn test_downcast() {
        let op = Operation::new(Scale { factor: 4 });
        assert_eq!(op.downcast_ref::<Scale>().map(|s| s.factor), Some(4));
        assert!(!op.is::<Shift>());
    }
}
