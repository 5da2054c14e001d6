// Shape operators - layout changes that never touch values
//
//   transpose   permute axes; lens and strides move together
//   contiguous  same lens, standard strides (copies at run time)
//   reshape     new lens over the same elements, with 0 / trailing -1 rules
//   broadcast   align an operand onto a target shape with zero strides
//
// transpose, broadcast and reshape (on standard input) evaluate to views of
// their input buffer. contiguous is the only one that allocates.

use std::fmt;

use serde::Deserialize;

use lynx_core::{Argument, CheckShapes, Context, Error, Result, Shape};

use crate::operator::{join, Operator};

// TRANSPOSE

/// Output axis `i` is input axis `dims[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Transpose {
    pub dims: Vec<usize>,
}

impl Transpose {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Transpose { dims: dims.into() }
    }

    /// The permutation that undoes this one.
    pub fn inverse(&self) -> Transpose {
        let mut inverse = vec![0; self.dims.len()];
        for (i, &d) in self.dims.iter().enumerate() {
            if let Some(slot) = inverse.get_mut(d) {
                *slot = i;
            }
        }
        Transpose { dims: inverse }
    }

    fn is_permutation(&self) -> bool {
        let mut seen = vec![false; self.dims.len()];
        for &d in &self.dims {
            match seen.get_mut(d) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }
}

impl Operator for Transpose {
    fn name(&self) -> &str {
        "transpose"
    }

    fn compute_shape(&self, inputs: &[Shape]) -> Result<Shape> {
        CheckShapes::new(inputs, Some(self.name())).has(1)?;
        let input = &inputs[0];
        if self.dims.len() != input.rank() {
            return Err(Error::invalid_parameter(
                Some(self.name()),
                format!(
                    "permutation has {} dimensions but input has rank {}",
                    self.dims.len(),
                    input.rank()
                ),
            ));
        }
        if !self.is_permutation() {
            return Err(Error::invalid_parameter(
                Some(self.name()),
                format!("{{{}}} is not a permutation", join(&self.dims)),
            ));
        }
        let lens: Vec<usize> = self.dims.iter().map(|&d| input.lens()[d]).collect();
        let strides: Vec<usize> = self.dims.iter().map(|&d| input.strides()[d]).collect();
        Shape::with_strides(input.dtype(), lens, strides)
    }

    fn compute(&self, _ctx: &mut Context, output: &Shape, args: &[Argument]) -> Result<Argument> {
        single(self.name(), args)?.view(output.clone())
    }

    fn fmt_attrs(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dims={{{}}}", join(&self.dims))
    }
}

// CONTIGUOUS

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Contiguous;

impl Operator for Contiguous {
    fn name(&self) -> &str {
        "contiguous"
    }

    fn compute_shape(&self, inputs: &[Shape]) -> Result<Shape> {
        CheckShapes::new(inputs, Some(self.name())).has(1)?.min_ndims(2)?;
        Ok(inputs[0].to_standard())
    }

    fn compute(&self, _ctx: &mut Context, _output: &Shape, args: &[Argument]) -> Result<Argument> {
        single(self.name(), args)?
            .to_contiguous()
            .map_err(|e| e.with_op(self.name()))
    }
}

// RESHAPE

/// Target lengths. `0` keeps the input length at that position; a final
/// `-1` takes whatever is left over.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Reshape {
    pub dims: Vec<i64>,
}

impl Reshape {
    pub fn new(dims: impl Into<Vec<i64>>) -> Self {
        Reshape { dims: dims.into() }
    }

    #[track_caller]
    fn invalid(&self, reason: String) -> Error {
        Error::invalid_parameter(Some(self.name()), reason)
    }
}

impl Operator for Reshape {
    fn name(&self) -> &str {
        "reshape"
    }

    fn compute_shape(&self, inputs: &[Shape]) -> Result<Shape> {
        CheckShapes::new(inputs, Some(self.name())).has(1)?;
        let input = &inputs[0];
        let last = self.dims.len().saturating_sub(1);

        let mut lens = Vec::with_capacity(self.dims.len());
        let mut infer = false;
        for (i, &d) in self.dims.iter().enumerate() {
            match d {
                0 => match input.lens().get(i) {
                    Some(&len) => lens.push(len),
                    None => {
                        return Err(self.invalid(format!(
                            "dimension {} is 0 but the input has only {} dimensions",
                            i,
                            input.rank()
                        )))
                    }
                },
                -1 if i == last => infer = true,
                d if d > 0 => match usize::try_from(d) {
                    Ok(len) => lens.push(len),
                    Err(_) => return Err(self.invalid(format!("dimension {} is too large", d))),
                },
                d => {
                    return Err(self.invalid(format!(
                        "invalid dimension {} at position {}, only a trailing -1 may be inferred",
                        d, i
                    )))
                }
            }
        }

        let known = match lens.iter().try_fold(1usize, |acc, &len| acc.checked_mul(len)) {
            Some(known) => known,
            None => {
                return Err(self.invalid(format!(
                    "element count of dimensions {:?} overflows",
                    lens
                )))
            }
        };

        if infer {
            if known == 0 || input.elements() % known != 0 {
                return Err(self.invalid(format!(
                    "cannot infer the last dimension: {} elements do not divide into {}",
                    input.elements(),
                    known
                )));
            }
            lens.push(input.elements() / known);
        } else if known != input.elements() {
            return Err(self.invalid(format!(
                "wrong number of elements for reshape: {} to {}",
                input.elements(),
                known
            )));
        }
        Ok(Shape::new(input.dtype(), lens))
    }

    fn compute(&self, _ctx: &mut Context, output: &Shape, args: &[Argument]) -> Result<Argument> {
        let input = single(self.name(), args)?;
        if !input.shape().standard() {
            return Err(Error::not_computable(self.name()));
        }
        input.view(output.clone())
    }

    fn fmt_attrs(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dims={{{}}}", join(&self.dims))
    }
}

// BROADCAST

/// Views `inputs[1]` under the lengths of `inputs[0]`, aligned at `axis`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Broadcast {
    pub axis: usize,
}

impl Broadcast {
    pub fn new(axis: usize) -> Self {
        Broadcast { axis }
    }
}

impl Operator for Broadcast {
    fn name(&self) -> &str {
        "broadcast"
    }

    fn compute_shape(&self, inputs: &[Shape]) -> Result<Shape> {
        CheckShapes::new(inputs, Some(self.name())).has(2)?;
        Shape::broadcast(&inputs[0], &inputs[1], self.axis).map_err(|e| e.with_op(self.name()))
    }

    fn compute(&self, _ctx: &mut Context, output: &Shape, args: &[Argument]) -> Result<Argument> {
        match args {
            [_, operand] => operand.view(output.clone()),
            _ => Err(arity(self.name(), 2, args.len())),
        }
    }

    fn fmt_attrs(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "axis={}", self.axis)
    }
}

#[track_caller]
fn single<'a>(name: &str, args: &'a [Argument]) -> Result<&'a Argument> {
    match args {
        [input] => Ok(input),
        _ => Err(arity(name, 1, args.len())),
    }
}

#[track_caller]
fn arity(name: &str, expected: usize, given: usize) -> Error {
    Error::shape_mismatch(
        Some(name),
        format!(
            "wrong number of arguments: expected {} but given {}",
            expected, given
        ),
    )
}
