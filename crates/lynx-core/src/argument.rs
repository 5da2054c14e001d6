use std::sync::Arc;

use crate::dtype::WithDType;
use crate::error::{Error, Result};
use crate::shape::Shape;
use crate::storage::{Buffer, Storage};

// Argument - A runtime value: shape + (optionally) a shared buffer
//
// Arguments are what evaluation passes between instructions. The shape says
// how to read the buffer; the buffer is an Arc so that several arguments can
// read the same allocation:
//
//   a = [2, 3] standard      buffer #1
//   b = transpose(a)         buffer #1, lens [3, 2], strides [1, 3]
//   c = broadcast(x, a)      buffer #1, strides with zeros
//
// No view ever copies. The allocation lives as long as its longest holder.
//
// An argument without a buffer is a shape-only placeholder, e.g. the value
// of an `outline` instruction standing in for unbound external data.

/// Runtime value flowing through an evaluated module.
#[derive(Debug, Clone)]
pub struct Argument {
    shape: Shape,
    buffer: Option<Buffer>,
}

impl Argument {
    /// Argument over `storage`, read through `shape`.
    ///
    /// The storage must have the shape's element type and be large enough
    /// for every offset the shape can reach.
    pub fn new(shape: Shape, storage: Storage) -> Result<Self> {
        Self::check_fits(&shape, &storage)?;
        Ok(Argument {
            shape,
            buffer: Some(Arc::new(storage)),
        })
    }

    /// Standard-layout argument copied from a slice.
    pub fn from_slice<T: WithDType>(lens: impl Into<Vec<usize>>, data: &[T]) -> Result<Self> {
        let shape = Shape::new(T::DTYPE, lens);
        if shape.elements() != data.len() {
            return Err(Error::shape_mismatch(
                None,
                format!(
                    "shape {} requires {} elements, got {}",
                    shape,
                    shape.elements(),
                    data.len()
                ),
            ));
        }
        Argument::new(shape, Storage::from_slice(data))
    }

    /// Shape-only argument with no backing buffer.
    pub fn placeholder(shape: Shape) -> Self {
        Argument {
            shape,
            buffer: None,
        }
    }

    /// Placeholder with the default (rank 0) shape.
    pub fn empty() -> Self {
        Argument::placeholder(Shape::default())
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn buffer(&self) -> Option<&Buffer> {
        self.buffer.as_ref()
    }

    pub fn has_data(&self) -> bool {
        self.buffer.is_some()
    }

    /// Both arguments read the same allocation.
    pub fn shares_buffer(&self, other: &Argument) -> bool {
        match (&self.buffer, &other.buffer) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// View of the same buffer under a different shape. Nothing is copied.
    pub fn view(&self, shape: Shape) -> Result<Argument> {
        match &self.buffer {
            None => Ok(Argument::placeholder(shape)),
            Some(buffer) => {
                Self::check_fits(&shape, buffer)?;
                Ok(Argument {
                    shape,
                    buffer: Some(Arc::clone(buffer)),
                })
            }
        }
    }

    /// Element at a multi-dimensional index.
    pub fn get_f64(&self, index: &[usize]) -> Result<f64> {
        let storage = self.storage()?;
        let offset = self.shape.index(index)?;
        storage
            .get_f64(offset)
            .ok_or_else(|| Error::msg(format!("offset {} outside of buffer", offset)))
    }

    /// All elements in logical (row-major) order.
    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        let storage = self.storage()?;
        self.shape
            .strided_indices()
            .map(|offset| {
                storage
                    .get_f64(offset)
                    .ok_or_else(|| Error::msg(format!("offset {} outside of buffer", offset)))
            })
            .collect()
    }

    /// Copy into a fresh buffer with standard strides.
    pub fn to_contiguous(&self) -> Result<Argument> {
        let gathered = self.logical_storage()?;
        Argument::new(self.shape.to_standard(), gathered)
    }

    // Elements in logical order, in their own type.
    fn logical_storage(&self) -> Result<Storage> {
        Ok(self.storage()?.gather(self.shape.strided_indices()))
    }

    fn storage(&self) -> Result<&Storage> {
        self.buffer
            .as_deref()
            .ok_or_else(|| Error::msg(format!("argument of shape {} has no data", self.shape)))
    }

    fn check_fits(shape: &Shape, storage: &Storage) -> Result<()> {
        if storage.dtype() != shape.dtype() {
            return Err(Error::shape_mismatch(
                None,
                format!(
                    "buffer of type {} cannot back shape {}",
                    storage.dtype(),
                    shape
                ),
            ));
        }
        if storage.len() < shape.element_space() {
            return Err(Error::shape_mismatch(
                None,
                format!(
                    "buffer of {} elements is too small for shape {}",
                    storage.len(),
                    shape
                ),
            ));
        }
        Ok(())
    }
}

/// Equal shapes and equal logical elements. Placeholders compare by shape only.
impl PartialEq for Argument {
    fn eq(&self, other: &Self) -> bool {
        if self.shape != other.shape {
            return false;
        }
        match (self.has_data(), other.has_data()) {
            (false, false) => true,
            (true, true) => {
                self.shares_buffer(other)
                    || matches!(
                        (self.logical_storage(), other.logical_storage()),
                        (Ok(a), Ok(b)) if a == b
                    )
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DType;

    #[test]
    fn test_from_slice() {
        let a = Argument::from_slice([2, 3], &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(a.shape(), &Shape::new(DType::F32, [2, 3]));
        assert_eq!(a.get_f64(&[1, 2]).unwrap(), 6.0);
        assert!(Argument::from_slice([2, 2], &[1.0f32]).is_err());
    }

    #[test]
    fn test_transposed_view_shares_buffer() {
        let a = Argument::from_slice([2, 3], &[0i32, 1, 2, 3, 4, 5]).unwrap();
        let t = a
            .view(Shape::with_strides(DType::I32, [3, 2], [1, 3]).unwrap())
            .unwrap();
        assert!(t.shares_buffer(&a));
        assert_eq!(t.to_f64_vec().unwrap(), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);

        let c = t.to_contiguous().unwrap();
        assert!(!c.shares_buffer(&a));
        assert!(c.shape().standard());
        assert_eq!(c.to_f64_vec().unwrap(), t.to_f64_vec().unwrap());
        assert_eq!(c, t.to_contiguous().unwrap());
    }

    #[test]
    fn test_view_outlives_source() {
        let view = {
            let a = Argument::from_slice([3], &[1.0f64, 2.0, 3.0]).unwrap();
            let shape = Shape::broadcast(&Shape::new(DType::F64, [2, 3]), a.shape(), 1).unwrap();
            a.view(shape).unwrap()
        };
        assert_eq!(
            view.to_f64_vec().unwrap(),
            vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn test_view_rejects_out_of_range() {
        let a = Argument::from_slice([3], &[1.0f64, 2.0, 3.0]).unwrap();
        assert!(a.view(Shape::new(DType::F64, [4])).is_err());
        assert!(a.view(Shape::new(DType::F32, [3])).is_err());
    }

    #[test]
    fn test_equality_is_exact_for_i64() {
        let big = (1i64 << 53) + 1;
        let a = Argument::from_slice([2], &[big, 0]).unwrap();
        let b = Argument::from_slice([2], &[1i64 << 53, 0]).unwrap();
        // both sides round to the same f64
        assert_eq!(a.to_f64_vec().unwrap(), b.to_f64_vec().unwrap());
        assert_ne!(a, b);
        assert_eq!(a, Argument::from_slice([2], &[big, 0]).unwrap());
    }

    #[test]
    fn test_placeholder() {
        let p = Argument::placeholder(Shape::new(DType::F32, [4]));
        assert!(!p.has_data());
        assert!(p.to_f64_vec().is_err());
        assert_eq!(p, Argument::placeholder(Shape::new(DType::F32, [4])));
        assert_ne!(p, Argument::from_slice([4], &[0.0f32; 4]).unwrap());
        assert_eq!(Argument::empty().shape(), &Shape::default());
    }
}
