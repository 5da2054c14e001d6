use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::storage::Storage;

// DType - Element types carried by a shape
//
// The IR never touches numeric data during shape inference, but every shape
// still records the element type so that operators can check operand
// agreement (`same_type`) and so runtime arguments know how to read their
// buffers. The set mirrors what model importers produce:
//
//   F16 / BF16  - half precision weights and activations
//   F32 / F64   - the default float types
//   U8 / I8     - quantized data, image bytes, boolean masks
//   U32 / I32   - indices, sizes
//   I64         - indices in exchange formats

/// Element type of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    F16,
    BF16,
    F32,
    F64,
    U8,
    I8,
    U32,
    I32,
    I64,
}

impl DType {
    /// All element types, in declaration order.
    pub const ALL: [DType; 9] = [
        DType::F16,
        DType::BF16,
        DType::F32,
        DType::F64,
        DType::U8,
        DType::I8,
        DType::U32,
        DType::I32,
        DType::I64,
    ];

    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F16 | DType::BF16 => 2,
            DType::F32 | DType::U32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
            DType::U8 | DType::I8 => 1,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DType::F16 | DType::BF16 | DType::F32 | DType::F64)
    }

    /// Lowercase name used in diagnostics and attribute objects.
    pub fn as_str(&self) -> &'static str {
        match self {
            DType::F16 => "f16",
            DType::BF16 => "bf16",
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::U8 => "u8",
            DType::I8 => "i8",
            DType::U32 => "u32",
            DType::I32 => "i32",
            DType::I64 => "i64",
        }
    }
}

impl Default for DType {
    fn default() -> Self {
        DType::F32
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::invalid_parameter(None, format!("unknown element type '{s}'")))
    }
}

// WithDType - Bridge between Rust scalar types and DType
//
// Literals and bound parameters are built from plain Rust slices; this trait
// picks the matching DType, wraps a Vec of itself into the matching Storage
// variant, and gives the f64 conversions used by the element accessors on
// `Argument`.

/// Rust types that can back a buffer.
pub trait WithDType: Copy + Send + Sync + 'static + num_traits::NumCast + fmt::Debug {
    /// The corresponding DType variant.
    const DTYPE: DType;

    /// Wrap `data` in the Storage variant for this type, without conversion.
    fn into_storage(data: Vec<Self>) -> Storage;

    fn to_f64(self) -> f64;

    fn from_f64(v: f64) -> Self;
}

macro_rules! with_dtype_primitive {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl WithDType for $ty {
                const DTYPE: DType = DType::$dtype;
                fn into_storage(data: Vec<Self>) -> Storage {
                    Storage::$dtype(data)
                }
                fn to_f64(self) -> f64 {
                    self as f64
                }
                fn from_f64(v: f64) -> Self {
                    v as $ty
                }
            }
        )*
    };
}

with_dtype_primitive!(
    f32 => F32,
    f64 => F64,
    u8 => U8,
    i8 => I8,
    u32 => U32,
    i32 => I32,
    i64 => I64,
);

impl WithDType for half::f16 {
    const DTYPE: DType = DType::F16;
    fn into_storage(data: Vec<Self>) -> Storage {
        Storage::F16(data)
    }
    fn to_f64(self) -> f64 {
        self.to_f32() as f64
    }
    fn from_f64(v: f64) -> Self {
        half::f16::from_f64(v)
    }
}

impl WithDType for half::bf16 {
    const DTYPE: DType = DType::BF16;
    fn into_storage(data: Vec<Self>) -> Storage {
        Storage::BF16(data)
    }
    fn to_f64(self) -> f64 {
        self.to_f32() as f64
    }
    fn from_f64(v: f64) -> Self {
        half::bf16::from_f64(v)
    }
}
