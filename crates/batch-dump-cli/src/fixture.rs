//! JSON batch fixtures.
//!
//! ```json
//! {
//!   "batches": [
//!     {
//!       "batch_id": 0,
//!       "line_ids": ["a", "b"],
//!       "vars": {
//!         "label": { "dtype": "int64", "shape": [2, 1], "data": [1, 0] },
//!         "seq":   { "dtype": "float32", "shape": [3, 1], "lod": [0, 1, 3], "data": [0.1, 0.2, 0.3] },
//!         "empty": { "dtype": "float32" }
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! A variable without `data` is declared but uninitialized. A missing
//! `shape` means a flat vector of `data.len()` elements.

use std::collections::BTreeMap;

use batch_dump_core::{ElementType, MemoryBatch, MemoryScope, Tensor, TensorData};
use serde::Deserialize;
use serde_json::Value;

use crate::error::CliError;

#[derive(Debug, Deserialize)]
pub struct BatchFile {
    pub batches: Vec<BatchFixture>,
}

#[derive(Debug, Deserialize)]
pub struct BatchFixture {
    pub batch_id: u64,
    pub line_ids: Vec<String>,
    #[serde(default)]
    pub vars: BTreeMap<String, VarFixture>,
}

#[derive(Debug, Deserialize)]
pub struct VarFixture {
    pub dtype: String,
    #[serde(default)]
    pub shape: Option<Vec<usize>>,
    #[serde(default)]
    pub lod: Option<Vec<usize>>,
    #[serde(default)]
    pub data: Option<Vec<Value>>,
}

impl BatchFixture {
    /// Build the scope and batch reader this fixture describes.
    pub fn into_parts(self) -> Result<(u64, MemoryScope, MemoryBatch), CliError> {
        let mut scope = MemoryScope::new();
        for (name, var) in self.vars {
            let tensor = var.into_tensor(&name)?;
            scope.insert(name, tensor);
        }
        Ok((self.batch_id, scope, MemoryBatch::new(self.line_ids)))
    }
}

impl VarFixture {
    pub fn into_tensor(self, name: &str) -> Result<Tensor, CliError> {
        let Some(values) = self.data else {
            return Ok(Tensor::uninitialized());
        };

        let shape = self.shape.unwrap_or_else(|| vec![values.len()]);
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(CliError::InvalidInput(format!(
                "var '{}': shape {:?} needs {} values, got {}",
                name,
                shape,
                expected,
                values.len()
            )));
        }

        let data = match ElementType::from_name(&self.dtype) {
            ElementType::F32 => TensorData::F32(
                convert(name, &values, |v| v.as_f64().map(|f| f as f32))?,
            ),
            ElementType::F64 => TensorData::F64(convert(name, &values, Value::as_f64)?),
            ElementType::I64 => TensorData::I64(convert(name, &values, Value::as_i64)?),
            ElementType::I32 => TensorData::I32(convert(name, &values, |v| {
                v.as_i64().and_then(|i| i32::try_from(i).ok())
            })?),
            ElementType::I16 => TensorData::I16(convert(name, &values, |v| {
                v.as_i64().and_then(|i| i16::try_from(i).ok())
            })?),
            ElementType::Other => TensorData::Unsupported {
                dtype: self.dtype.clone(),
                numel: values.len(),
            },
        };

        let tensor = Tensor::host(shape, data);
        Ok(match self.lod {
            Some(lod) => tensor.with_lod(lod),
            None => tensor,
        })
    }
}

fn convert<T>(
    name: &str,
    values: &[Value],
    parse: impl Fn(&Value) -> Option<T>,
) -> Result<Vec<T>, CliError> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            parse(v).ok_or_else(|| {
                CliError::InvalidInput(format!("var '{}': element {} is not valid: {}", name, i, v))
            })
        })
        .collect()
}
