// Gemm - matrix product of two rank-2 inputs
//
//   [m, k] x [k, n] -> [m, n]

use lynx_core::{CheckShapes, Error, Result, Shape};

use crate::operator::Operator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gemm;

impl Operator for Gemm {
    fn name(&self) -> &str {
        "gemm"
    }

    fn compute_shape(&self, inputs: &[Shape]) -> Result<Shape> {
        CheckShapes::new(inputs, Some(self.name()))
            .has(2)?
            .same_type()?
            .only_dims(2)?;

        let (a, b) = (inputs[0].lens(), inputs[1].lens());
        if a[1] != b[0] {
            return Err(Error::shape_mismatch(
                Some(self.name()),
                format!(
                    "inner dimensions do not match: {{{}, {}}} x {{{}, {}}}",
                    a[0], a[1], b[0], b[1]
                ),
            ));
        }
        Ok(Shape::new(inputs[0].dtype(), vec![a[0], b[1]]))
    }
}
