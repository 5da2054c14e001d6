use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dtype::DType;
use crate::error::{Error, Result};

// Shape - Element type + lengths + strides
//
// A Shape is the only thing shape inference ever looks at. It describes:
//
//   - dtype:   the element type
//   - lens:    the length of every axis
//   - strides: how many elements to skip in the flat buffer to move one step
//              along each axis
//
// A *standard* shape has row-major strides: [2, 3, 4] → [12, 4, 1].
// Anything else is a view of some buffer:
//
//   transpose   → lens and strides permuted together
//   broadcast   → stride 0 on every axis that repeats the same element
//
// Shapes are immutable values. Two shapes are equal only if dtype, lens and
// strides all agree, so a transposed view is *not* equal to a standard shape
// with the same lens.

/// Element type, per-axis lengths and per-axis strides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "RawShape")]
pub struct Shape {
    #[serde(rename = "type")]
    dtype: DType,
    lens: Vec<usize>,
    strides: Vec<usize>,
}

impl Shape {
    /// Standard (row-major) shape for the given lengths.
    pub fn new(dtype: DType, lens: impl Into<Vec<usize>>) -> Self {
        let lens = lens.into();
        let strides = standard_strides(&lens);
        Shape {
            dtype,
            lens,
            strides,
        }
    }

    /// Shape with explicit strides, e.g. a view produced by transpose or broadcast.
    pub fn with_strides(
        dtype: DType,
        lens: impl Into<Vec<usize>>,
        strides: impl Into<Vec<usize>>,
    ) -> Result<Self> {
        let lens = lens.into();
        let strides = strides.into();
        if lens.len() != strides.len() {
            return Err(Error::shape_mismatch(
                None,
                format!(
                    "lens {:?} and strides {:?} have different ranks",
                    lens, strides
                ),
            ));
        }
        Ok(Shape {
            dtype,
            lens,
            strides,
        })
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn lens(&self) -> &[usize] {
        &self.lens
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Number of axes.
    pub fn rank(&self) -> usize {
        self.lens.len()
    }

    /// Number of logical elements (product of all lengths, 1 for rank 0).
    pub fn elements(&self) -> usize {
        self.lens.iter().product()
    }

    /// Like `elements`, but fails instead of overflowing `usize`.
    pub fn checked_elements(&self) -> Result<usize> {
        self.lens
            .iter()
            .try_fold(1usize, |acc, &len| acc.checked_mul(len))
            .ok_or_else(|| {
                Error::invalid_parameter(
                    None,
                    format!("element count of lens {:?} overflows", self.lens),
                )
            })
    }

    /// Number of buffer elements a view of this shape can reach:
    /// one past the largest offset, or 0 when the shape has no elements.
    pub fn element_space(&self) -> usize {
        if self.elements() == 0 {
            return 0;
        }
        self.lens
            .iter()
            .zip(&self.strides)
            .map(|(len, stride)| (len - 1) * stride)
            .sum::<usize>()
            + 1
    }

    /// Bytes needed to back this shape.
    pub fn bytes(&self) -> usize {
        self.element_space() * self.dtype.size_in_bytes()
    }

    /// Strides equal the row-major suffix product of the lengths.
    pub fn standard(&self) -> bool {
        self.strides == standard_strides(&self.lens)
    }

    /// At least one axis repeats its element (stride 0 with length > 1).
    pub fn is_broadcasted(&self) -> bool {
        self.lens
            .iter()
            .zip(&self.strides)
            .any(|(&len, &stride)| stride == 0 && len > 1)
    }

    /// Same lens and dtype with standard strides.
    pub fn to_standard(&self) -> Shape {
        Shape::new(self.dtype, self.lens.clone())
    }

    /// Flat buffer offset of a multi-dimensional index.
    pub fn index(&self, index: &[usize]) -> Result<usize> {
        if index.len() != self.rank() {
            return Err(Error::shape_mismatch(
                None,
                format!("index {:?} has wrong rank for shape {}", index, self),
            ));
        }
        let mut flat = 0;
        for ((&i, &len), &stride) in index.iter().zip(&self.lens).zip(&self.strides) {
            if i >= len {
                return Err(Error::shape_mismatch(
                    None,
                    format!("index {:?} out of bounds for shape {}", index, self),
                ));
            }
            flat += i * stride;
        }
        Ok(flat)
    }

    /// Iterator over the buffer offset of every logical element, row-major.
    pub fn strided_indices(&self) -> StridedIter {
        StridedIter::new(self)
    }

    // Broadcasting

    /// Broadcast `operand` onto the lengths of `target`, aligned at `axis`.
    ///
    /// The operand's lengths must equal `target.lens()[axis..axis + operand.rank()]`.
    /// A fully degenerate operand (every length 1) may only be aligned at axis 0,
    /// and then repeats its single element everywhere.
    ///
    /// The result has the target's lengths, the operand's dtype, stride 0 on
    /// every axis outside the aligned run and the operand's strides inside it:
    ///
    ///   target [2, 3, 4, 5], operand [3] (strides [1]), axis 1
    ///     → lens [2, 3, 4, 5], strides [0, 1, 0, 0]
    pub fn broadcast(target: &Shape, operand: &Shape, axis: usize) -> Result<Shape> {
        let mut strides = vec![0usize; target.rank()];

        if operand.lens.iter().all(|&len| len == 1) {
            if axis != 0 {
                return Err(Error::shape_mismatch(
                    None,
                    format!(
                        "when broadcasting a tensor of size 1, axis should be 0 (got {})",
                        axis
                    ),
                ));
            }
            return Shape::with_strides(operand.dtype, target.lens.clone(), strides);
        }

        let end = axis + operand.rank();
        if end > target.rank() {
            return Err(Error::shape_mismatch(
                None,
                format!(
                    "cannot broadcast {:?} into {:?} at axis {}",
                    operand.lens, target.lens, axis
                ),
            ));
        }
        if operand.lens[..] != target.lens[axis..end] {
            return Err(Error::shape_mismatch(
                None,
                format!(
                    "when broadcasting, sizes must match: {:?} vs {:?} at axis {}",
                    operand.lens, target.lens, axis
                ),
            ));
        }
        strides[axis..end].copy_from_slice(&operand.strides);
        Shape::with_strides(operand.dtype, target.lens.clone(), strides)
    }
}

/// Row-major strides: [2, 3, 4] → [12, 4, 1].
/// Saturates instead of overflowing.
pub fn standard_strides(lens: &[usize]) -> Vec<usize> {
    let mut strides = vec![0usize; lens.len()];
    let mut acc = 1usize;
    for i in (0..lens.len()).rev() {
        strides[i] = acc;
        acc = acc.saturating_mul(lens[i]);
    }
    strides
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {{{}}}, {{{}}}",
            self.dtype,
            join(&self.lens),
            join(&self.strides)
        )
    }
}

fn join(values: &[usize]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// Serde: strides are optional on input (standard when absent) and the rank
// agreement is checked before a Shape is produced.

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawShape {
    #[serde(rename = "type", default)]
    dtype: DType,
    lens: Vec<usize>,
    #[serde(default)]
    strides: Option<Vec<usize>>,
}

impl TryFrom<RawShape> for Shape {
    type Error = Error;

    fn try_from(raw: RawShape) -> Result<Self> {
        match raw.strides {
            Some(strides) => Shape::with_strides(raw.dtype, raw.lens, strides),
            None => Ok(Shape::new(raw.dtype, raw.lens)),
        }
    }
}

// StridedIter - buffer offsets of a shape in logical order
//
// For a standard shape this counts 0, 1, 2, ...; for a transposed or
// broadcast view it follows the strides, revisiting offsets where the
// stride is 0.

/// Iterator that yields the flat buffer offset of each element of a Shape.
pub struct StridedIter {
    current: Vec<usize>,
    lens: Vec<usize>,
    strides: Vec<usize>,
    remaining: usize,
    started: bool,
}

impl StridedIter {
    fn new(shape: &Shape) -> Self {
        StridedIter {
            current: vec![0; shape.rank()],
            lens: shape.lens.clone(),
            strides: shape.strides.clone(),
            remaining: shape.elements(),
            started: false,
        }
    }

    fn flat_index(&self) -> usize {
        self.current
            .iter()
            .zip(&self.strides)
            .map(|(i, s)| i * s)
            .sum()
    }

    /// Advance the multi-dimensional index by one, last axis fastest.
    fn advance(&mut self) {
        for i in (0..self.lens.len()).rev() {
            self.current[i] += 1;
            if self.current[i] < self.lens[i] {
                return;
            }
            self.current[i] = 0;
        }
    }
}

impl Iterator for StridedIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        if self.started {
            self.advance();
        }
        self.started = true;
        self.remaining -= 1;
        Some(self.flat_index())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for StridedIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_scalar_shape() {
        let s = Shape::new(DType::F32, Vec::<usize>::new());
        assert_eq!(s.rank(), 0);
        assert_eq!(s.elements(), 1);
        assert_eq!(s.element_space(), 1);
        assert!(s.standard());
    }

    #[test]
    fn test_3d_strides() {
        let s = Shape::new(DType::F32, [2, 3, 4]);
        assert_eq!(s.strides(), &[12, 4, 1]);
        assert_eq!(s.elements(), 24);
        assert_eq!(s.element_space(), 24);
        assert_eq!(s.bytes(), 96);
    }

    #[test]
    fn test_checked_elements_overflow() {
        let s = Shape::new(DType::F32, [(1usize << 62) + 1, 4]);
        assert_eq!(s.strides(), &[4, 1]);
        let err = s.checked_elements().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidParameter);
        assert_eq!(Shape::new(DType::F32, [2, 3]).checked_elements().unwrap(), 6);
    }

    #[test]
    fn test_with_strides_rank_mismatch() {
        assert!(Shape::with_strides(DType::F32, [2, 3], [1]).is_err());
    }

    #[test]
    fn test_equality_includes_strides() {
        let a = Shape::new(DType::F32, [2, 3]);
        let b = Shape::with_strides(DType::F32, [2, 3], [1, 2]).unwrap();
        let c = Shape::new(DType::F64, [2, 3]);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, b.to_standard());
    }

    #[test]
    fn test_display() {
        let s = Shape::new(DType::F32, [1, 3]);
        assert_eq!(s.to_string(), "f32, {1, 3}, {3, 1}");
    }

    #[test]
    fn test_index() {
        let s = Shape::new(DType::F32, [2, 3, 4]);
        assert_eq!(s.index(&[1, 2, 3]).unwrap(), 23);
        assert!(s.index(&[2, 0, 0]).is_err());
        assert!(s.index(&[0, 0]).is_err());
    }

    #[test]
    fn test_transposed_indices() {
        // [2, 3] read column-major: 0, 3, 1, 4, 2, 5
        let t = Shape::with_strides(DType::F32, [3, 2], [1, 3]).unwrap();
        let idx: Vec<usize> = t.strided_indices().collect();
        assert_eq!(idx, vec![0, 3, 1, 4, 2, 5]);
        assert!(!t.standard());
    }

    #[test]
    fn test_broadcast_segment() {
        let target = Shape::new(DType::F32, [2, 3, 4, 5]);
        let bias = Shape::new(DType::F32, [3]);
        let b = Shape::broadcast(&target, &bias, 1).unwrap();
        assert_eq!(b.lens(), &[2, 3, 4, 5]);
        assert_eq!(b.strides(), &[0, 1, 0, 0]);
        assert!(b.is_broadcasted());
        assert_eq!(b.element_space(), 3);
    }

    #[test]
    fn test_broadcast_suffix() {
        let target = Shape::new(DType::F32, [4, 2, 3]);
        let operand = Shape::new(DType::F32, [2, 3]);
        let b = Shape::broadcast(&target, &operand, 1).unwrap();
        assert_eq!(b.strides(), &[0, 3, 1]);
    }

    #[test]
    fn test_broadcast_mismatch() {
        let target = Shape::new(DType::F32, [2, 3, 4]);
        assert!(Shape::broadcast(&target, &Shape::new(DType::F32, [4]), 1).is_err());
        assert!(Shape::broadcast(&target, &Shape::new(DType::F32, [3, 4]), 2).is_err());
    }

    #[test]
    fn test_broadcast_degenerate() {
        let target = Shape::new(DType::F32, [2, 3]);
        let one = Shape::new(DType::F32, [1, 1]);
        let b = Shape::broadcast(&target, &one, 0).unwrap();
        assert_eq!(b.strides(), &[0, 0]);
        assert_eq!(b.element_space(), 1);
        for axis in 1..4 {
            assert!(Shape::broadcast(&target, &one, axis).is_err());
        }
    }

    #[test]
    fn test_serde_shape() {
        let s: Shape = serde_json::from_value(serde_json::json!({
            "type": "f64",
            "lens": [2, 3]
        }))
        .unwrap();
        assert_eq!(s, Shape::new(DType::F64, [2, 3]));

        let bad = serde_json::from_value::<Shape>(serde_json::json!({
            "lens": [2, 3],
            "strides": [1]
        }));
        assert!(bad.is_err());
    }

    proptest! {
        #[test]
        fn prop_elements_is_product(lens in prop::collection::vec(1usize..6, 0..5)) {
            let s = Shape::new(DType::F32, lens.clone());
            prop_assert_eq!(s.elements(), lens.iter().product::<usize>());
            prop_assert_eq!(s.element_space(), s.elements());
            // row-major suffix product
            for i in 0..lens.len() {
                prop_assert_eq!(s.strides()[i], lens[i + 1..].iter().product::<usize>());
            }
            let offsets: Vec<usize> = s.strided_indices().collect();
            prop_assert_eq!(offsets, (0..s.elements()).collect::<Vec<_>>());
        }

        #[test]
        fn prop_degenerate_broadcast_only_at_axis_zero(
            target in prop::collection::vec(1usize..5, 1..5),
            ones in 0usize..4,
            axis in 0usize..5,
        ) {
            let target = Shape::new(DType::F32, target);
            let operand = Shape::new(DType::F32, vec![1; ones]);
            let result = Shape::broadcast(&target, &operand, axis);
            prop_assert_eq!(result.is_ok(), axis == 0);
        }
    }
}
