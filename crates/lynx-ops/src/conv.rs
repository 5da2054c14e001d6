// Convolution - 2D convolution shape inference
//
// Inputs: [N, C_in, H, W] and weights [C_out, C_in, kH, kW], same element
// type. Output: [N, C_out, H_out, W_out], with the spatial size depending
// on the padding mode:
//
//   default  H_out = max(1, (H - (1 + dilation*(kH - 1)) + 2*padding) / stride + 1)
//   same     H_out = ceil(H / stride)
//   valid    H_out = ceil((H - kH + 1) / stride)
//
// The default formula is evaluated in signed arithmetic and truncates, so
// a kernel larger than the padded input clamps to 1 instead of wrapping.
//
// There is no numeric kernel here; targets lower convolution to their own
// implementation.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use lynx_core::{CheckShapes, Error, Result, Shape};

use crate::operator::{join, Operator};

/// How the spatial output size is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaddingMode {
    /// Explicit `padding` on both sides.
    #[default]
    Default,
    /// Output covers the input, `ceil(in / stride)`.
    Same,
    /// No padding, only windows fully inside the input.
    Valid,
}

impl PaddingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaddingMode::Default => "default",
            PaddingMode::Same => "same",
            PaddingMode::Valid => "valid",
        }
    }
}

impl FromStr for PaddingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(PaddingMode::Default),
            "same" => Ok(PaddingMode::Same),
            "valid" => Ok(PaddingMode::Valid),
            other => Err(Error::invalid_parameter(
                Some("convolution"),
                format!("invalid padding mode '{}'", other),
            )),
        }
    }
}

/// 2D convolution over NCHW inputs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Convolution {
    pub padding: [usize; 2],
    pub stride: [usize; 2],
    pub dilation: [usize; 2],
    pub padding_mode: PaddingMode,
}

impl Default for Convolution {
    fn default() -> Self {
        Convolution {
            padding: [0, 0],
            stride: [1, 1],
            dilation: [1, 1],
            padding_mode: PaddingMode::Default,
        }
    }
}

impl Convolution {
    pub fn new(padding: [usize; 2], stride: [usize; 2], dilation: [usize; 2]) -> Self {
        Convolution {
            padding,
            stride,
            dilation,
            padding_mode: PaddingMode::Default,
        }
    }

    pub fn with_padding_mode(mut self, mode: PaddingMode) -> Self {
        self.padding_mode = mode;
        self
    }

    fn spatial(&self, axis: usize, input: usize, kernel: usize) -> Result<usize> {
        let stride = self.stride[axis];
        match self.padding_mode {
            PaddingMode::Default => {
                let (input, kernel) = (input as i64, kernel as i64);
                let pad = self.padding[axis] as i64;
                let dilation = self.dilation[axis] as i64;
                let extent = 1 + dilation * (kernel - 1);
                let out = (input - extent + 2 * pad) / stride as i64 + 1;
                Ok(out.max(1) as usize)
            }
            PaddingMode::Same => Ok(input.div_ceil(stride)),
            PaddingMode::Valid => {
                if kernel > input {
                    return Err(Error::invalid_parameter(
                        Some(self.name()),
                        format!(
                            "kernel length {} exceeds input length {} in valid mode",
                            kernel, input
                        ),
                    ));
                }
                Ok((input - kernel + 1).div_ceil(stride))
            }
        }
    }
}

impl Operator for Convolution {
    fn name(&self) -> &str {
        "convolution"
    }

    fn compute_shape(&self, inputs: &[Shape]) -> Result<Shape> {
        CheckShapes::new(inputs, Some(self.name()))
            .has(2)?
            .same_type()?
            .same_ndims()?
            .only_dims(4)?;

        if self.stride.contains(&0) || self.dilation.contains(&0) {
            return Err(Error::invalid_parameter(
                Some(self.name()),
                format!(
                    "stride {:?} and dilation {:?} must be positive",
                    self.stride, self.dilation
                ),
            ));
        }

        let input = inputs[0].lens();
        let weights = inputs[1].lens();
        let h = self.spatial(0, input[2], weights[2])?;
        let w = self.spatial(1, input[3], weights[3])?;
        Ok(Shape::new(
            inputs[0].dtype(),
            vec![input[0], weights[0], h, w],
        ))
    }

    fn fmt_attrs(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "padding={{{}}}, stride={{{}}}, dilation={{{}}}",
            join(&self.padding),
            join(&self.stride),
            join(&self.dilation)
        )?;
        if self.padding_mode != PaddingMode::Default {
            write!(f, ", padding_mode={}", self.padding_mode.as_str())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lynx_core::{DType, ErrorKind};

    fn nchw(lens: [usize; 4]) -> Shape {
        Shape::new(DType::F32, lens)
    }

    fn out_lens(conv: &Convolution, input: [usize; 4], weights: [usize; 4]) -> Vec<usize> {
        conv.compute_shape(&[nchw(input), nchw(weights)])
            .unwrap()
            .lens()
            .to_vec()
    }

    #[test]
    fn test_default_mode_padding() {
        let weights = [2, 3, 3, 3];
        let no_pad = Convolution::default();
        assert_eq!(out_lens(&no_pad, [1, 3, 4, 4], weights), vec![1, 2, 2, 2]);

        let pad = Convolution::new([1, 1], [1, 1], [1, 1]);
        assert_eq!(out_lens(&pad, [1, 3, 4, 4], weights), vec![1, 2, 4, 4]);
    }

    #[test]
    fn test_default_mode_stride_and_dilation() {
        let conv = Convolution::new([0, 0], [2, 2], [1, 1]);
        assert_eq!(out_lens(&conv, [1, 3, 7, 7], [4, 3, 3, 3]), vec![1, 4, 3, 3]);

        // dilated 3x3 covers 5x5
        let conv = Convolution::new([0, 0], [1, 1], [2, 2]);
        assert_eq!(out_lens(&conv, [1, 3, 7, 7], [4, 3, 3, 3]), vec![1, 4, 3, 3]);
    }

    #[test]
    fn test_default_mode_clamps_to_one() {
        let conv = Convolution::default();
        assert_eq!(out_lens(&conv, [1, 1, 2, 2], [1, 1, 5, 5]), vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_same_and_valid_modes() {
        let same = Convolution::new([0, 0], [2, 2], [1, 1]).with_padding_mode(PaddingMode::Same);
        assert_eq!(out_lens(&same, [1, 3, 7, 8], [4, 3, 3, 3]), vec![1, 4, 4, 4]);

        let valid = Convolution::new([0, 0], [2, 2], [1, 1]).with_padding_mode(PaddingMode::Valid);
        assert_eq!(out_lens(&valid, [1, 3, 7, 8], [4, 3, 3, 3]), vec![1, 4, 3, 3]);

        let err = valid
            .compute_shape(&[nchw([1, 3, 2, 2]), nchw([4, 3, 3, 3])])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_invalid_inputs() {
        let conv = Convolution::default();
        let err = conv.compute_shape(&[nchw([1, 3, 4, 4])]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
        assert_eq!(err.op(), Some("convolution"));

        let mixed = [nchw([1, 3, 4, 4]), Shape::new(DType::F64, [2, 3, 3, 3])];
        assert!(conv.compute_shape(&mixed).is_err());

        let rank3 = [Shape::new(DType::F32, [3, 4, 4]), Shape::new(DType::F32, [2, 3, 3])];
        assert!(conv.compute_shape(&rank3).is_err());

        let zero_stride = Convolution::new([0, 0], [0, 1], [1, 1]);
        let err = zero_stride
            .compute_shape(&[nchw([1, 3, 4, 4]), nchw([2, 3, 3, 3])])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_padding_mode_parse() {
        assert_eq!("same".parse::<PaddingMode>().unwrap(), PaddingMode::Same);
        assert_eq!(PaddingMode::default(), PaddingMode::Default);
        assert_eq!(Convolution::default().padding_mode, PaddingMode::Default);
        let err = "full".parse::<PaddingMode>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }
}
