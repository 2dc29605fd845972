//! Host materialization of accelerator-resident tensors.
//!
//! The dump pipeline formats values on the CPU. A tensor stored in host
//! memory is read in place; a tensor stored on an accelerator is copied once,
//! synchronously, into a buffer owned by the calling dump operation. That
//! copy is released when the operation's [`HostTensor`] goes out of scope.

use std::borrow::Cow;
use std::fmt;

use tracing::debug;

use crate::error::{DumpError, DumpResult};
use crate::tensor::{ElementType, Place, Storage, Tensor, TensorData};

/// Accelerator memory that can be read back to the host.
///
/// Implementors must perform the copy synchronously: when `copy_to_host`
/// returns, the returned buffer holds the device contents.
pub trait DeviceBuffer: fmt::Debug + Send + Sync {
    fn place(&self) -> Place;

    fn element_type(&self) -> ElementType;

    fn numel(&self) -> usize;

    /// Copy every element into freshly allocated host memory.
    fn copy_to_host(&self) -> DumpResult<TensorData>;
}

/// A host-addressable view of a tensor, borrowed or copied.
///
/// Shape and LoD always borrow from the source tensor, so a copied view
/// keeps the source tensor's variable-length boundaries.
#[derive(Debug)]
pub struct HostTensor<'a> {
    shape: &'a [usize],
    lod: Option<&'a [usize]>,
    data: Cow<'a, TensorData>,
}

impl<'a> HostTensor<'a> {
    pub fn shape(&self) -> &'a [usize] {
        self.shape
    }

    pub fn lod(&self) -> Option<&'a [usize]> {
        self.lod
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// True when the elements were read out of a [`DeviceBuffer`] into
    /// memory owned by this view.
    pub fn is_copy(&self) -> bool {
        matches!(self.data, Cow::Owned(_))
    }
}

/// Make `tensor` readable from the host.
///
/// Host tensors are borrowed unchanged. Device tensors placed on an
/// accelerator are copied with a single blocking transfer; this is the
/// pipeline's only synchronization point with the accelerator.
///
/// A [`DeviceBuffer`] that reports [`Place::Host`] needs no transfer, but
/// its elements are still converted into an owned [`TensorData`]: the trait
/// exposes no borrowable host slice, so `copy_to_host` is the only way to
/// read it.
///
/// # Errors
///
/// * `DumpError::Uninitialized` - the tensor holds no data
/// * `DumpError::DeviceCopy` - the transfer failed or returned the wrong
///   number of elements
pub fn materialize(tensor: &Tensor) -> DumpResult<HostTensor<'_>> {
    let data = match tensor.storage() {
        Storage::Uninitialized => return Err(DumpError::Uninitialized),
        Storage::Host(data) => Cow::Borrowed(data),
        Storage::Device(buffer) => {
            let place = buffer.place();
            if place.is_accelerator() {
                debug!(place = ?place, numel = buffer.numel(), "copying tensor to host");
            } else {
                debug!(numel = buffer.numel(), "converting host-resident buffer");
            }
            let copied = buffer.copy_to_host()?;
            if copied.len() != buffer.numel() {
                return Err(DumpError::DeviceCopy(format!(
                    "expected {} elements, device returned {}",
                    buffer.numel(),
                    copied.len()
                )));
            }
            Cow::Owned(copied)
        }
    };

    Ok(HostTensor {
        shape: tensor.shape(),
        lod: tensor.lod(),
        data,
    })
}

#[cfg(feature = "candle")]
mod candle_buffer {
    use candle_core::{DType, Device, DeviceLocation, Tensor as CandleTensor};

    use super::DeviceBuffer;
    use crate::error::{DumpError, DumpResult};
    use crate::tensor::{ElementType, Place, TensorData};

    fn map_candle(e: candle_core::Error) -> DumpError {
        DumpError::DeviceCopy(e.to_string())
    }

    impl DeviceBuffer for CandleTensor {
        fn place(&self) -> Place {
            match self.device().location() {
                DeviceLocation::Cpu => Place::Host,
                DeviceLocation::Cuda { gpu_id } | DeviceLocation::Metal { gpu_id } => {
                    Place::Accelerator { ordinal: gpu_id }
                }
            }
        }

        fn element_type(&self) -> ElementType {
            match self.dtype() {
                DType::F32 => ElementType::F32,
                DType::F64 => ElementType::F64,
                DType::I64 => ElementType::I64,
                _ => ElementType::Other,
            }
        }

        fn numel(&self) -> usize {
            self.elem_count()
        }

        fn copy_to_host(&self) -> DumpResult<TensorData> {
            let host = if self.device().is_cpu() {
                self.flatten_all()
            } else {
                self.to_device(&Device::Cpu).and_then(|t| t.flatten_all())
            }
            .map_err(map_candle)?;
            let data = match self.dtype() {
                DType::F32 => TensorData::F32(host.to_vec1::<f32>().map_err(map_candle)?),
                DType::F64 => TensorData::F64(host.to_vec1::<f64>().map_err(map_candle)?),
                DType::I64 => TensorData::I64(host.to_vec1::<i64>().map_err(map_candle)?),
                other => TensorData::Unsupported {
                    dtype: format!("{:?}", other),
                    numel: host.elem_count(),
                },
            };
            Ok(data)
        }
    }

}
