// Pooling - average / max pooling shape inference
//
// Input [N, C, H, W], output [N, C, H_out, W_out] with
//
//   H_out = max(1, ceil((H + 2*padding - length) / stride) + 1)
//
// The window must be strictly smaller than the padded input on each axis.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use lynx_core::{CheckShapes, Error, Result, Shape};

use crate::operator::{join, Operator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolingMode {
    #[default]
    Average,
    Max,
}

impl PoolingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolingMode::Average => "average",
            PoolingMode::Max => "max",
        }
    }
}

impl FromStr for PoolingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "average" => Ok(PoolingMode::Average),
            "max" => Ok(PoolingMode::Max),
            other => Err(Error::invalid_parameter(
                Some("pooling"),
                format!("invalid pooling mode '{}'", other),
            )),
        }
    }
}

/// 2D pooling over NCHW inputs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Pooling {
    pub mode: PoolingMode,
    pub padding: [usize; 2],
    pub stride: [usize; 2],
    pub lengths: [usize; 2],
}

impl Default for Pooling {
    fn default() -> Self {
        Pooling {
            mode: PoolingMode::Average,
            padding: [0, 0],
            stride: [1, 1],
            lengths: [1, 1],
        }
    }
}

impl Pooling {
    pub fn new(
        mode: PoolingMode,
        padding: [usize; 2],
        stride: [usize; 2],
        lengths: [usize; 2],
    ) -> Self {
        Pooling {
            mode,
            padding,
            stride,
            lengths,
        }
    }

    fn spatial(&self, axis: usize, input: usize) -> Result<usize> {
        let padded = input + 2 * self.padding[axis];
        let length = self.lengths[axis];
        if length >= padded {
            return Err(Error::invalid_parameter(
                Some(self.name()),
                format!(
                    "kernel length {} must be smaller than the padded input length {} on axis {}",
                    length,
                    padded,
                    axis + 2
                ),
            ));
        }
        Ok(((padded - length).div_ceil(self.stride[axis]) + 1).max(1))
    }
}

impl Operator for Pooling {
    fn name(&self) -> &str {
        "pooling"
    }

    fn compute_shape(&self, inputs: &[Shape]) -> Result<Shape> {
        CheckShapes::new(inputs, Some(self.name())).has(1)?.only_dims(4)?;

        if self.stride.contains(&0) {
            return Err(Error::invalid_parameter(
                Some(self.name()),
                format!("stride {:?} must be positive", self.stride),
            ));
        }

        let input = inputs[0].lens();
        let h = self.spatial(0, input[2])?;
        let w = self.spatial(1, input[3])?;
        Ok(Shape::new(inputs[0].dtype(), vec![input[0], input[1], h, w]))
    }

    fn fmt_attrs(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mode={}, padding={{{}}}, stride={{{}}}, lengths={{{}}}",
            self.mode.as_str(),
            join(&self.padding),
            join(&self.stride),
            join(&self.lengths)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lynx_core::{DType, ErrorKind};

    fn nchw(lens: [usize; 4]) -> Shape {
        Shape::new(DType::F32, lens)
    }

    #[test]
    fn test_max_pool_2x2() {
        let pool = Pooling::new(PoolingMode::Max, [0, 0], [2, 2], [2, 2]);
        let out = pool.compute_shape(&[nchw([1, 8, 32, 32])]).unwrap();
        assert_eq!(out.lens(), &[1, 8, 16, 16]);
    }

    #[test]
    fn test_ceil_rounding() {
        // (7 - 2) / 2 = 2.5 rounds up to 3, plus one
        let pool = Pooling::new(PoolingMode::Average, [0, 0], [2, 2], [2, 2]);
        let out = pool.compute_shape(&[nchw([1, 1, 7, 7])]).unwrap();
        assert_eq!(out.lens(), &[1, 1, 4, 4]);
    }

    #[test]
    fn test_oversize_window() {
        let pool = Pooling::new(PoolingMode::Max, [0, 0], [1, 1], [33, 33]);
        let err = pool.compute_shape(&[nchw([1, 8, 32, 32])]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(err.op(), Some("pooling"));

        // equal to the padded extent is still too large
        let pool = Pooling::new(PoolingMode::Max, [1, 1], [1, 1], [6, 6]);
        assert!(pool.compute_shape(&[nchw([1, 1, 4, 4])]).is_err());
    }

    #[test]
    fn test_rank_checks() {
        let pool = Pooling::default();
        assert!(pool.compute_shape(&[Shape::new(DType::F32, [8, 32, 32])]).is_err());
        assert!(pool.compute_shape(&[]).is_err());
    }

    #[test]
    fn test_display_attrs() {
        let pool = crate::Operation::new(Pooling::new(PoolingMode::Max, [0, 0], [2, 2], [2, 2]));
        assert_eq!(
            pool.to_string(),
            "pooling[mode=max, padding={0, 0}, stride={2, 2}, lengths={2, 2}]"
        );
    }
}
