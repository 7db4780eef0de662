use num_traits::{Float, NumCast};

use crate::types::DType;

/// Typed, contiguous element storage of a tensor.
///
/// All arithmetic goes through `f64` closures; `F32` buffers are widened on
/// read and narrowed on write.
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

fn cast_vec<T: Float>(values: &[f64]) -> Vec<T> {
    values
        .iter()
        .map(|&v| <T as NumCast>::from(v).unwrap_or_else(T::nan))
        .collect()
}

fn map_slice<T: Float>(data: &mut [T], f: impl Fn(f64) -> f64) {
    for v in data.iter_mut() {
        let x = v.to_f64().unwrap_or(f64::NAN);
        *v = <T as NumCast>::from(f(x)).unwrap_or_else(T::nan);
    }
}

fn zip_map_slice<T: Float>(data: &mut [T], rhs: &[f64], f: impl Fn(f64, f64) -> f64) {
    for (v, &r) in data.iter_mut().zip(rhs) {
        let x = v.to_f64().unwrap_or(f64::NAN);
        *v = <T as NumCast>::from(f(x, r)).unwrap_or_else(T::nan);
    }
}

impl Buffer {
    /// Allocates a zero-filled buffer.
    pub fn zeros(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::F32 => Buffer::F32(vec![0.0; len]),
            DType::F64 => Buffer::F64(vec![0.0; len]),
        }
    }

    /// Builds a buffer of `dtype` from `f64` values, narrowing if needed.
    pub fn from_f64(dtype: DType, values: &[f64]) -> Self {
        match dtype {
            DType::F32 => Buffer::F32(cast_vec(values)),
            DType::F64 => Buffer::F64(values.to_vec()),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Buffer::F32(_) => DType::F32,
            Buffer::F64(_) => DType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Buffer::F32(v) => v.len(),
            Buffer::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the elements out, widened to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            Buffer::F32(v) => v.iter().map(|&x| x as f64).collect(),
            Buffer::F64(v) => v.clone(),
        }
    }

    /// Returns a converted copy. Values are preserved up to the target precision.
    pub fn cast(&self, dtype: DType) -> Buffer {
        match (self, dtype) {
            (Buffer::F32(v), DType::F32) => Buffer::F32(v.clone()),
            (Buffer::F64(v), DType::F64) => Buffer::F64(v.clone()),
            (Buffer::F32(v), DType::F64) => Buffer::F64(v.iter().map(|&x| x as f64).collect()),
            (Buffer::F64(v), DType::F32) => Buffer::F32(v.iter().map(|&x| x as f32).collect()),
        }
    }

    pub fn fill(&mut self, value: f64) {
        match self {
            Buffer::F32(v) => v.iter_mut().for_each(|x| *x = value as f32),
            Buffer::F64(v) => v.iter_mut().for_each(|x| *x = value),
        }
    }

    pub fn map_inplace(&mut self, f: impl Fn(f64) -> f64) {
        match self {
            Buffer::F32(v) => map_slice(v, f),
            Buffer::F64(v) => map_slice(v, f),
        }
    }

    /// Applies `f(self[i], rhs[i])` element-wise. `rhs` must have the same length.
    pub fn zip_map_inplace(&mut self, rhs: &[f64], f: impl Fn(f64, f64) -> f64) {
        match self {
            Buffer::F32(v) => zip_map_slice(v, rhs, f),
            Buffer::F64(v) => zip_map_slice(v, rhs, f),
        }
    }

    /// Address of the first element. Two tensors reporting the same address
    /// share storage.
    pub fn storage_addr(&self) -> usize {
        match self {
            Buffer::F32(v) => v.as_ptr() as usize,
            Buffer::F64(v) => v.as_ptr() as usize,
        }
    }
}
