use std::sync::Arc;

use half::{bf16, f16};

use crate::dtype::{DType, WithDType};

// Storage - Typed flat element buffer
//
// Arguments never own raw bytes: their data lives in a typed vector, one
// variant per DType. Storage is immutable once built and shared through
// `Buffer` (an Arc), so that views created by transpose or broadcast alias
// the same allocation instead of copying it.
//
// Nothing here knows about strides. Reading an element always goes
// through `Shape::index` / `Shape::strided_indices` on the owning argument.

/// Element data of an argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    F16(Vec<f16>),
    BF16(Vec<bf16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    U8(Vec<u8>),
    I8(Vec<i8>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    I64(Vec<i64>),
}

/// Shared, immutable storage. Cloning only bumps the reference count.
pub type Buffer = Arc<Storage>;

// Run `$body` with `$v` bound to the inner Vec, whatever the variant.
macro_rules! with_storage {
    ($storage:expr, |$v:ident| $body:expr) => {
        match $storage {
            Storage::F16($v) => $body,
            Storage::BF16($v) => $body,
            Storage::F32($v) => $body,
            Storage::F64($v) => $body,
            Storage::U8($v) => $body,
            Storage::I8($v) => $body,
            Storage::U32($v) => $body,
            Storage::I32($v) => $body,
            Storage::I64($v) => $body,
        }
    };
}

// Like `with_storage!`, but wraps the resulting Vec back into the same variant.
macro_rules! map_storage {
    ($storage:expr, |$v:ident| $body:expr) => {
        match $storage {
            Storage::F16($v) => Storage::F16($body),
            Storage::BF16($v) => Storage::BF16($body),
            Storage::F32($v) => Storage::F32($body),
            Storage::F64($v) => Storage::F64($body),
            Storage::U8($v) => Storage::U8($body),
            Storage::I8($v) => Storage::I8($body),
            Storage::U32($v) => Storage::U32($body),
            Storage::I32($v) => Storage::I32($body),
            Storage::I64($v) => Storage::I64($body),
        }
    };
}

fn convert<T: WithDType>(values: impl IntoIterator<Item = f64>) -> Vec<T> {
    values.into_iter().map(T::from_f64).collect()
}

impl Storage {
    /// Build storage of `dtype` from f64 values, converting each element.
    pub fn from_f64(dtype: DType, values: impl IntoIterator<Item = f64>) -> Self {
        match dtype {
            DType::F16 => Storage::F16(convert(values)),
            DType::BF16 => Storage::BF16(convert(values)),
            DType::F32 => Storage::F32(convert(values)),
            DType::F64 => Storage::F64(convert(values)),
            DType::U8 => Storage::U8(convert(values)),
            DType::I8 => Storage::I8(convert(values)),
            DType::U32 => Storage::U32(convert(values)),
            DType::I32 => Storage::I32(convert(values)),
            DType::I64 => Storage::I64(convert(values)),
        }
    }

    /// Storage holding a copy of `data`, typed after `T`. Values are kept
    /// bit for bit.
    pub fn from_slice<T: WithDType>(data: &[T]) -> Self {
        T::into_storage(data.to_vec())
    }

    pub fn zeros(dtype: DType, len: usize) -> Self {
        Storage::from_f64(dtype, std::iter::repeat(0.0).take(len))
    }

    pub fn dtype(&self) -> DType {
        match self {
            Storage::F16(_) => DType::F16,
            Storage::BF16(_) => DType::BF16,
            Storage::F32(_) => DType::F32,
            Storage::F64(_) => DType::F64,
            Storage::U8(_) => DType::U8,
            Storage::I8(_) => DType::I8,
            Storage::U32(_) => DType::U32,
            Storage::I32(_) => DType::I32,
            Storage::I64(_) => DType::I64,
        }
    }

    pub fn len(&self) -> usize {
        with_storage!(self, |v| v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at flat `offset`, as f64.
    pub fn get_f64(&self, offset: usize) -> Option<f64> {
        with_storage!(self, |v| v.get(offset).map(|x| WithDType::to_f64(*x)))
    }

    /// New storage with the elements at `offsets`, in order.
    ///
    /// Every offset must be `< self.len()`; callers obtain them from a shape
    /// whose element space has been checked against this storage.
    pub fn gather(&self, offsets: impl Iterator<Item = usize>) -> Storage {
        map_storage!(self, |v| offsets.map(|i| v[i]).collect())
    }
}
