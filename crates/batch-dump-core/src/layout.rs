//! Per-sample slicing of field tensors.
//!
//! A field tensor is `rows x columns`. With no LoD each sample owns exactly
//! one row; with a LoD the rows between `lod[i]` and `lod[i + 1]` belong to
//! sample `i`. Bounds are element offsets into the flattened buffer.

use crate::error::LayoutError;

/// Check that a field can be sliced into `batch_size` samples.
///
/// # Example
///
/// ```
/// use batch_dump_core::layout::validate_field;
///
/// assert!(validate_field(&[4, 2], None, 4).is_ok());
/// assert!(validate_field(&[7, 2], Some(&[0, 3, 7]), 2).is_ok());
/// assert!(validate_field(&[7, 2], Some(&[0, 7]), 2).is_err());
/// ```
pub fn validate_field(
    shape: &[usize],
    lod: Option<&[usize]>,
    batch_size: usize,
) -> Result<(), LayoutError> {
    if shape.len() != 2 {
        return Err(LayoutError::Rank {
            actual: shape.len(),
        });
    }
    match lod {
        Some(offsets) => {
            if offsets.len() != batch_size + 1 {
                return Err(LayoutError::LodLength {
                    expected: batch_size + 1,
                    actual: offsets.len(),
                });
            }
        }
        None => {
            if shape[0] != batch_size {
                return Err(LayoutError::BatchRows {
                    expected: batch_size,
                    actual: shape[0],
                });
            }
        }
    }
    Ok(())
}

/// Half-open element range `[start, end)` owned by sample `index`.
///
/// Callers validate the field first; `shape` must be rank 2 and, when
/// present, `lod` must hold at least `index + 2` offsets. The result is not
/// clamped to the buffer; the formatter rejects out-of-range bounds.
///
/// Offsets that overflow `i64` saturate to `i64::MAX`, so a shape that
/// disagrees with its buffer always lands outside it.
pub fn row_bounds(shape: &[usize], lod: Option<&[usize]>, index: usize) -> (i64, i64) {
    let columns = to_offset(shape[1]);
    let (first, last) = match lod {
        Some(offsets) => (to_offset(offsets[index]), to_offset(offsets[index + 1])),
        None => {
            let row = to_offset(index);
            (row, row.saturating_add(1))
        }
    };
    (first.saturating_mul(columns), last.saturating_mul(columns))
}

fn to_offset(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
