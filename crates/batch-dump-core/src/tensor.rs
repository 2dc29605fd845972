//! Tensor data model seen by the dump pipeline.
//!
//! A [`Tensor`] is a shaped buffer with an optional level-of-detail (LoD)
//! offset array and a storage location. Host storage is a [`TensorData`]
//! variant per supported element type; accelerator storage is any
//! [`DeviceBuffer`] that can copy itself to host memory.

use std::fmt;

use crate::device::DeviceBuffer;

/// Element type tag of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    F32,
    I64,
    F64,
    I32,
    I16,
    /// Anything the value formatter does not print.
    Other,
}

impl ElementType {
    /// Parse the dtype names used by trainer descriptors and batch fixtures.
    pub fn from_name(name: &str) -> Self {
        match name {
            "float32" | "fp32" | "f32" => ElementType::F32,
            "int64" | "i64" => ElementType::I64,
            "float64" | "fp64" | "f64" => ElementType::F64,
            "int32" | "i32" => ElementType::I32,
            "int16" | "i16" => ElementType::I16,
            _ => ElementType::Other,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::F32 => "float32",
            ElementType::I64 => "int64",
            ElementType::F64 => "float64",
            ElementType::I32 => "int32",
            ElementType::I16 => "int16",
            ElementType::Other => "other",
        };
        f.write_str(name)
    }
}

/// Host-resident element buffer, one variant per supported element type.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    I64(Vec<i64>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I16(Vec<i16>),
    /// Elements of a type the pipeline cannot print; only the count is kept.
    Unsupported { dtype: String, numel: usize },
}

impl TensorData {
    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::I64(v) => v.len(),
            TensorData::F64(v) => v.len(),
            TensorData::I32(v) => v.len(),
            TensorData::I16(v) => v.len(),
            TensorData::Unsupported { numel, .. } => *numel,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            TensorData::F32(_) => ElementType::F32,
            TensorData::I64(_) => ElementType::I64,
            TensorData::F64(_) => ElementType::F64,
            TensorData::I32(_) => ElementType::I32,
            TensorData::I16(_) => ElementType::I16,
            TensorData::Unsupported { .. } => ElementType::Other,
        }
    }
}

macro_rules! impl_from_vec {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for TensorData {
                fn from(values: Vec<$ty>) -> Self {
                    TensorData::$variant(values)
                }
            }
        )*
    };
}

impl_from_vec!(f32 => F32, i64 => I64, f64 => F64, i32 => I32, i16 => I16);

/// Where a tensor's elements live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Place {
    #[default]
    Host,
    Accelerator {
        ordinal: usize,
    },
}

impl Place {
    pub fn is_accelerator(&self) -> bool {
        matches!(self, Place::Accelerator { .. })
    }
}

/// Backing storage of a [`Tensor`].
#[derive(Debug)]
pub enum Storage {
    /// Declared but never written.
    Uninitialized,
    Host(TensorData),
    Device(Box<dyn DeviceBuffer>),
}

/// A shaped tensor owned by an execution scope.
///
/// The dump pipeline only ever reads tensors; the one buffer it owns is
/// the short-lived host copy made by [`crate::device::materialize`].
#[derive(Debug)]
pub struct Tensor {
    shape: Vec<usize>,
    lod: Option<Vec<usize>>,
    storage: Storage,
}

impl Tensor {
    /// Host tensor with fixed-size rows.
    ///
    /// # Example
    ///
    /// ```
    /// use batch_dump_core::{ElementType, Tensor};
    ///
    /// let label = Tensor::host(vec![3, 1], vec![1i64, 0, 1]);
    /// assert_eq!(label.numel(), 3);
    /// assert_eq!(label.element_type(), Some(ElementType::I64));
    /// assert!(label.lod().is_none());
    /// ```
    pub fn host(shape: Vec<usize>, data: impl Into<TensorData>) -> Self {
        Self {
            shape,
            lod: None,
            storage: Storage::Host(data.into()),
        }
    }

    /// Tensor whose elements live in accelerator memory.
    pub fn on_device(shape: Vec<usize>, buffer: impl DeviceBuffer + 'static) -> Self {
        Self {
            shape,
            lod: None,
            storage: Storage::Device(Box::new(buffer)),
        }
    }

    /// Tensor that exists in scope but holds no data.
    pub fn uninitialized() -> Self {
        Self {
            shape: Vec::new(),
            lod: None,
            storage: Storage::Uninitialized,
        }
    }

    /// Attach variable-length sample boundaries.
    pub fn with_lod(mut self, lod: Vec<usize>) -> Self {
        self.lod = Some(lod);
        self
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The first-level LoD offsets, if the tensor has variable-length rows.
    pub fn lod(&self) -> Option<&[usize]> {
        self.lod.as_deref()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self.storage, Storage::Uninitialized)
    }

    pub fn place(&self) -> Place {
        match &self.storage {
            Storage::Device(buffer) => buffer.place(),
            Storage::Host(_) | Storage::Uninitialized => Place::Host,
        }
    }

    /// Element type tag, `None` while uninitialized.
    pub fn element_type(&self) -> Option<ElementType> {
        match &self.storage {
            Storage::Uninitialized => None,
            Storage::Host(data) => Some(data.element_type()),
            Storage::Device(buffer) => Some(buffer.element_type()),
        }
    }

    pub fn numel(&self) -> usize {
        match &self.storage {
            Storage::Uninitialized => 0,
            Storage::Host(data) => data.len(),
            Storage::Device(buffer) => buffer.numel(),
        }
    }
}
