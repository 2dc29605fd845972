//! Text serialization of tensor element ranges.
//!
//! Each value is appended as `:<value>`. Floats use their shortest
//! round-trip form, 32/16-bit integers print as signed decimal, and 64-bit
//! integers print as unsigned decimal (two's-complement reinterpretation),
//! which is what the offline readers of dump files decode.

use std::fmt::{Display, Write};

use tracing::debug;

use crate::tensor::TensorData;

/// Emitted in place of values when the requested range leaves the buffer.
pub const ACCESS_VIOLATION: &str = "access violation";

/// Emitted in place of values for element types with no text encoding.
pub const UNSUPPORTED_TYPE: &str = "unsupported type";

/// Append the elements in `[start, end)` of `data` to `out`.
///
/// Unsupported element types append [`UNSUPPORTED_TYPE`] whatever the range.
/// Otherwise a range reaching outside `[0, data.len())` appends
/// [`ACCESS_VIOLATION`] and reads nothing, and an empty or inverted range
/// appends nothing.
///
/// # Example
///
/// ```
/// use batch_dump_core::format::{format_range, ACCESS_VIOLATION};
/// use batch_dump_core::TensorData;
///
/// let data = TensorData::I64(vec![7, -1]);
/// let mut out = String::new();
/// format_range(&data, 0, 2, &mut out);
/// assert_eq!(out, ":7:18446744073709551615");
///
/// let mut out = String::new();
/// format_range(&data, 1, 3, &mut out);
/// assert_eq!(out, ACCESS_VIOLATION);
/// ```
pub fn format_range(data: &TensorData, start: i64, end: i64, out: &mut String) {
    if let TensorData::Unsupported { dtype, .. } = data {
        debug!(dtype = %dtype, "unsupported type");
        out.push_str(UNSUPPORTED_TYPE);
        return;
    }
    let count = data.len() as i64;
    if start < 0 || end > count {
        debug!(start, end, count, "access violation");
        out.push_str(ACCESS_VIOLATION);
        return;
    }
    if start >= end {
        return;
    }
    let range = start as usize..end as usize;

    match data {
        TensorData::F32(values) => write_values(&values[range], out),
        TensorData::F64(values) => write_values(&values[range], out),
        TensorData::I32(values) => write_values(&values[range], out),
        TensorData::I16(values) => write_values(&values[range], out),
        TensorData::I64(values) => {
            for v in &values[range] {
                let _ = write!(out, ":{}", *v as u64);
            }
        }
        TensorData::Unsupported { .. } => {}
    }
}

fn write_values<T: Display>(values: &[T], out: &mut String) {
    for v in values {
        let _ = write!(out, ":{}", v);
    }
}
