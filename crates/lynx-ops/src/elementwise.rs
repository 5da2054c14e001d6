// Element-wise operators
//
//   Activation  relu / sigmoid / tanh / elu / clipped_relu / leaky_relu
//   Unary       identity, abs, exp, trig, softmax, tanh, sigmoid, neg
//   Binary      add / sub / mul / div, optionally broadcasting the second
//               operand onto the first at a given axis
//
// All of them preserve the first input's shape. Only `identity` has a
// kernel here: it hands back its input, sharing the buffer.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use lynx_core::{Argument, CheckShapes, Context, Error, Result, Shape};

use crate::operator::Operator;

// ACTIVATION

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMode {
    #[default]
    Relu,
    Sigmoid,
    Tanh,
    Elu,
    ClippedRelu,
    LeakyRelu,
}

impl ActivationMode {
    pub const ALL: [ActivationMode; 6] = [
        ActivationMode::Relu,
        ActivationMode::Sigmoid,
        ActivationMode::Tanh,
        ActivationMode::Elu,
        ActivationMode::ClippedRelu,
        ActivationMode::LeakyRelu,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationMode::Relu => "relu",
            ActivationMode::Sigmoid => "sigmoid",
            ActivationMode::Tanh => "tanh",
            ActivationMode::Elu => "elu",
            ActivationMode::ClippedRelu => "clipped_relu",
            ActivationMode::LeakyRelu => "leaky_relu",
        }
    }
}

impl FromStr for ActivationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ActivationMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| {
                Error::invalid_parameter(
                    Some("activation"),
                    format!("invalid activation mode '{}'", s),
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Activation {
    pub mode: ActivationMode,
}

impl Activation {
    pub fn new(mode: ActivationMode) -> Self {
        Activation { mode }
    }
}

impl Operator for Activation {
    fn name(&self) -> &str {
        "activation"
    }

    fn compute_shape(&self, inputs: &[Shape]) -> Result<Shape> {
        CheckShapes::new(inputs, Some(self.name())).has(1)?;
        Ok(inputs[0].clone())
    }

    fn fmt_attrs(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mode={}", self.mode.as_str())
    }
}

// UNARY

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Identity,
    Abs,
    Exp,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Softmax,
    Tanh,
    Sigmoid,
    Neg,
}

impl UnaryOp {
    pub const ALL: [UnaryOp; 13] = [
        UnaryOp::Identity,
        UnaryOp::Abs,
        UnaryOp::Exp,
        UnaryOp::Sin,
        UnaryOp::Cos,
        UnaryOp::Tan,
        UnaryOp::Asin,
        UnaryOp::Acos,
        UnaryOp::Atan,
        UnaryOp::Softmax,
        UnaryOp::Tanh,
        UnaryOp::Sigmoid,
        UnaryOp::Neg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Identity => "identity",
            UnaryOp::Abs => "abs",
            UnaryOp::Exp => "exp",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tan => "tan",
            UnaryOp::Asin => "asin",
            UnaryOp::Acos => "acos",
            UnaryOp::Atan => "atan",
            UnaryOp::Softmax => "softmax",
            UnaryOp::Tanh => "tanh",
            UnaryOp::Sigmoid => "sigmoid",
            UnaryOp::Neg => "neg",
        }
    }
}

impl FromStr for UnaryOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        UnaryOp::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| {
                Error::invalid_parameter(None, format!("unknown unary operator '{}'", s))
            })
    }
}

/// Shape-preserving single-input operator; the name is the op's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unary {
    pub op: UnaryOp,
}

impl Unary {
    pub fn new(op: UnaryOp) -> Self {
        Unary { op }
    }

    pub fn identity() -> Self {
        Unary::new(UnaryOp::Identity)
    }
}

impl Operator for Unary {
    fn name(&self) -> &str {
        self.op.as_str()
    }

    fn compute_shape(&self, inputs: &[Shape]) -> Result<Shape> {
        CheckShapes::new(inputs, Some(self.name())).has(1)?;
        Ok(inputs[0].clone())
    }

    fn compute(&self, _ctx: &mut Context, _output: &Shape, args: &[Argument]) -> Result<Argument> {
        match (self.op, args) {
            (UnaryOp::Identity, [input]) => Ok(input.clone()),
            _ => Err(Error::not_computable(self.name())),
        }
    }
}

// BINARY

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 4] = [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::Div];

    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
        }
    }

    /// Scalar rule, for targets that evaluate element by element.
    pub fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
        }
    }
}

impl FromStr for BinaryOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BinaryOp::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| {
                Error::invalid_parameter(None, format!("unknown binary operator '{}'", s))
            })
    }
}

/// Two-input element-wise operator.
///
/// Without `broadcast` both inputs must have identical lengths. With
/// `broadcast: Some(axis)` the second input is aligned onto the first at
/// `axis` following [`Shape::broadcast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binary {
    pub op: BinaryOp,
    pub broadcast: Option<usize>,
}

impl Binary {
    pub fn new(op: BinaryOp) -> Self {
        Binary { op, broadcast: None }
    }

    pub fn add() -> Self {
        Binary::new(BinaryOp::Add)
    }

    pub fn sub() -> Self {
        Binary::new(BinaryOp::Sub)
    }

    pub fn mul() -> Self {
        Binary::new(BinaryOp::Mul)
    }

    pub fn div() -> Self {
        Binary::new(BinaryOp::Div)
    }

    pub fn with_broadcast(mut self, axis: usize) -> Self {
        self.broadcast = Some(axis);
        self
    }
}

impl Operator for Binary {
    fn name(&self) -> &str {
        self.op.as_str()
    }

    fn compute_shape(&self, inputs: &[Shape]) -> Result<Shape> {
        let check = CheckShapes::new(inputs, Some(self.name()));
        check.has(2)?.same_type()?;
        match self.broadcast {
            None => {
                check.same_dims()?;
            }
            Some(axis) => {
                Shape::broadcast(&inputs[0], &inputs[1], axis).map_err(|e| e.with_op(self.name()))?;
            }
        }
        Ok(inputs[0].clone())
    }

    fn fmt_attrs(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.broadcast {
            Some(axis) => write!(f, "broadcast={}", axis),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Operation;
    use lynx_core::{DType, ErrorKind};

    fn f32s(lens: &[usize]) -> Shape {
        Shape::new(DType::F32, lens.to_vec())
    }

    #[test]
    fn test_passthrough() {
        let input = Shape::with_strides(DType::F32, [3, 2], [1, 3]).unwrap();
        let relu = Activation::new(ActivationMode::Relu);
        assert_eq!(relu.compute_shape(&[input.clone()]).unwrap(), input);
        for op in UnaryOp::ALL {
            assert_eq!(Unary::new(op).compute_shape(&[input.clone()]).unwrap(), input);
        }
        let err = Unary::new(UnaryOp::Exp).compute_shape(&[]).unwrap_err();
        assert_eq!(err.op(), Some("exp"));
    }

    #[test]
    fn test_unary_names() {
        assert_eq!(Operation::new(Unary::new(UnaryOp::Softmax)).to_string(), "softmax");
        assert_eq!("asin".parse::<UnaryOp>().unwrap(), UnaryOp::Asin);
        assert!("erf".parse::<UnaryOp>().is_err());
        assert_ne!(
            Operation::new(Unary::new(UnaryOp::Sin)),
            Operation::new(Unary::new(UnaryOp::Cos))
        );
    }

    #[test]
    fn test_identity_shares_buffer() {
        let a = Argument::from_slice([2], &[1.0f32, 2.0]).unwrap();
        let out = Unary::identity()
            .compute(&mut Context::default(), a.shape(), &[a.clone()])
            .unwrap();
        assert!(out.shares_buffer(&a));

        let err = Unary::new(UnaryOp::Abs)
            .compute(&mut Context::default(), a.shape(), &[a.clone()])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotComputable);
    }

    #[test]
    fn test_binary_same_dims() {
        let add = Binary::add();
        assert_eq!(
            add.compute_shape(&[f32s(&[2, 3]), f32s(&[2, 3])]).unwrap(),
            f32s(&[2, 3])
        );
        let err = add.compute_shape(&[f32s(&[2, 3]), f32s(&[3, 2])]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
        assert_eq!(err.op(), Some("add"));

        let mixed = [f32s(&[2, 3]), Shape::new(DType::I32, [2, 3])];
        assert!(Binary::mul().compute_shape(&mixed).is_err());
    }

    #[test]
    fn test_binary_broadcast() {
        let add = Binary::add().with_broadcast(1);
        let out = add.compute_shape(&[f32s(&[2, 3, 4]), f32s(&[3])]).unwrap();
        assert_eq!(out, f32s(&[2, 3, 4]));

        let err = add.compute_shape(&[f32s(&[2, 3, 4]), f32s(&[4])]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
        assert_eq!(err.op(), Some("add"));

        assert_eq!(Operation::new(add).to_string(), "add[broadcast=1]");
        assert_ne!(Operation::new(add), Operation::new(Binary::add()));
    }

    #[test]
    fn test_scalar_rules() {
        assert_eq!(BinaryOp::Sub.apply(5.0, 2.0), 3.0);
        assert_eq!(BinaryOp::Div.apply(6.0, 3.0), 2.0);
    }

    #[test]
    fn test_activation_modes() {
        for mode in ActivationMode::ALL {
            assert_eq!(mode.as_str().parse::<ActivationMode>().unwrap(), mode);
        }
        assert!("gelu".parse::<ActivationMode>().is_err());
    }
}
