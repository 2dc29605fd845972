//! Per-batch dump orchestration.
//!
//! [`DumpWorker`] drives the two dump operations a training worker runs
//! after each minibatch:
//!
//! - [`DumpWorker::dump_field`]: for every sample picked by the sampling
//!   policy, one tab-separated line holding that sample's slice of every
//!   configured field.
//! - [`DumpWorker::dump_param`]: one line per configured parameter holding
//!   the whole tensor, prefixed by `(batch_id,name)`.
//!
//! Missing, uninitialized, or misshapen tensors are logged and skipped;
//! the remaining names, samples and lines are still produced. Only a sink
//! failure ends an operation early.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::DumpConfig;
use crate::device::materialize;
use crate::error::{DumpResult, SkipReason};
use crate::format::format_range;
use crate::layout::{row_bounds, validate_field};
use crate::record::{LineId, RecordBuffer};
use crate::sampling::{DumpMode, SamplingPolicy};
use crate::scope::{BatchReader, Scope};
use crate::sink::DumpSink;

/// Outcome of one field dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldDumpReport {
    pub batch_size: usize,
    /// Samples picked by the sampling policy.
    pub selected: usize,
    /// Records handed to the sink.
    pub lines_written: usize,
    /// Fields that contributed nothing, in configuration order.
    pub skipped: Vec<(String, SkipReason)>,
}

/// Outcome of one parameter dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamDumpReport {
    pub lines_written: usize,
    pub skipped: Vec<(String, SkipReason)>,
}

/// Outcome of [`DumpWorker::dump_batch`]; `None` for operations not run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDumpReport {
    pub fields: Option<FieldDumpReport>,
    pub params: Option<ParamDumpReport>,
}

/// Dumps fields and parameters of processed batches into a shared sink.
///
/// A worker holds no per-batch state, so one instance may serve many
/// batches and several workers may share one sink across threads.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use batch_dump_core::{
///     DumpConfig, DumpMode, DumpWorker, MemoryBatch, MemoryScope, MemorySink, Tensor,
/// };
///
/// let config = DumpConfig {
///     mode: DumpMode::Full,
///     interval: 1,
///     fields: vec!["label".into()],
///     ..Default::default()
/// };
/// let sink = Arc::new(MemorySink::new());
/// let worker = DumpWorker::new(config, sink.clone()).unwrap();
///
/// let mut scope = MemoryScope::new();
/// scope.insert("label", Tensor::host(vec![3, 1], vec![1i64, 0, 1]));
/// let batch = MemoryBatch::new(["a", "b", "c"]);
///
/// worker.dump_field(&scope, &batch).unwrap();
/// assert_eq!(sink.lines(), vec!["a\tlabel:1:1", "b\tlabel:1:0", "c\tlabel:1:1"]);
/// ```
pub struct DumpWorker {
    config: DumpConfig,
    policy: SamplingPolicy,
    sink: Arc<dyn DumpSink>,
}

impl std::fmt::Debug for DumpWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DumpWorker")
            .field("config", &self.config)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl DumpWorker {
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(config: DumpConfig, sink: Arc<dyn DumpSink>) -> DumpResult<Self> {
        config.validate()?;
        let policy = config.policy()?;
        Ok(Self {
            config,
            policy,
            sink,
        })
    }

    pub fn config(&self) -> &DumpConfig {
        &self.config
    }

    pub fn need_dump_field(&self) -> bool {
        self.policy.mode() != DumpMode::Off && !self.config.fields.is_empty()
    }

    pub fn need_dump_param(&self) -> bool {
        !self.config.params.is_empty()
    }

    /// Dump the configured fields of the current batch with the configured
    /// sampling policy.
    pub fn dump_field(
        &self,
        scope: &dyn Scope,
        reader: &dyn BatchReader,
    ) -> DumpResult<FieldDumpReport> {
        self.dump_field_with(scope, reader, &self.policy)
    }

    /// Dump the configured fields of the current batch with an explicit
    /// sampling policy.
    ///
    /// Selection runs once; every field then appends to the records of the
    /// selected samples in configuration order. A record that received no
    /// field is dropped.
    pub fn dump_field_with(
        &self,
        scope: &dyn Scope,
        reader: &dyn BatchReader,
        policy: &SamplingPolicy,
    ) -> DumpResult<FieldDumpReport> {
        let flags = self.config.flags;
        let batch_size = reader.batch_size();
        let hits = policy.select(reader);

        let mut records: Vec<Option<RecordBuffer>> = hits
            .iter()
            .enumerate()
            .map(|(i, &hit)| {
                hit.then(|| {
                    let id = LineId::split(reader.line_id(i), flags.lineid_have_extend_info);
                    RecordBuffer::new(id.prefix)
                })
            })
            .collect();

        let mut report = FieldDumpReport {
            batch_size,
            selected: hits.iter().filter(|&&hit| hit).count(),
            ..Default::default()
        };

        for field in &self.config.fields {
            let Some(tensor) = scope.find_var(field) else {
                skip_field(&mut report.skipped, field, SkipReason::NotFound);
                continue;
            };
            if !tensor.is_initialized() {
                skip_field(&mut report.skipped, field, SkipReason::NotInitialized);
                continue;
            }
            if let Err(e) = validate_field(tensor.shape(), tensor.lod(), batch_size) {
                skip_field(&mut report.skipped, field, SkipReason::InvalidLayout(e));
                continue;
            }
            let host = match materialize(tensor) {
                Ok(host) => host,
                Err(e) => {
                    skip_field(&mut report.skipped, field, SkipReason::from_materialize(&e));
                    continue;
                }
            };

            for (i, record) in records.iter_mut().enumerate() {
                let Some(record) = record else {
                    continue;
                };
                let (start, end) = row_bounds(host.shape(), host.lod(), i);
                record.push_field(
                    field,
                    host.data(),
                    start,
                    end,
                    flags.dump_field_same_as_aibox,
                );
            }
        }

        for (i, record) in records.into_iter().enumerate() {
            let Some(record) = record else {
                continue;
            };
            let suffix = if flags.lineid_have_extend_info {
                LineId::split(reader.line_id(i), true).suffix
            } else {
                None
            };
            if let Some(line) = record.finish(suffix) {
                self.sink.write_line(line)?;
                report.lines_written += 1;
            }
        }

        debug!(
            batch_size,
            selected = report.selected,
            lines = report.lines_written,
            skipped = report.skipped.len(),
            "field dump finished"
        );
        Ok(report)
    }

    /// Dump every configured parameter in full, one line each.
    ///
    /// Runs regardless of the sampling mode.
    pub fn dump_param(&self, scope: &dyn Scope, batch_id: u64) -> DumpResult<ParamDumpReport> {
        let mut report = ParamDumpReport::default();

        for param in &self.config.params {
            let Some(tensor) = scope.find_var(param) else {
                skip_param(&mut report.skipped, param, SkipReason::NotFound);
                continue;
            };
            let host = match materialize(tensor) {
                Ok(host) => host,
                Err(e) => {
                    skip_param(&mut report.skipped, param, SkipReason::from_materialize(&e));
                    continue;
                }
            };

            let mut line = format!("({},{})", batch_id, param);
            format_range(host.data(), 0, host.numel() as i64, &mut line);
            self.sink.write_line(line)?;
            report.lines_written += 1;
        }

        debug!(
            batch_id,
            lines = report.lines_written,
            skipped = report.skipped.len(),
            "param dump finished"
        );
        Ok(report)
    }

    /// Run whichever dumps are configured for one processed batch, fields
    /// first.
    pub fn dump_batch(
        &self,
        scope: &dyn Scope,
        reader: &dyn BatchReader,
        batch_id: u64,
    ) -> DumpResult<BatchDumpReport> {
        let fields = if self.need_dump_field() {
            Some(self.dump_field(scope, reader)?)
        } else {
            None
        };
        let params = if self.need_dump_param() {
            Some(self.dump_param(scope, batch_id)?)
        } else {
            None
        };
        Ok(BatchDumpReport { fields, params })
    }
}

fn skip_field(skipped: &mut Vec<(String, SkipReason)>, name: &str, reason: SkipReason) {
    warn!(field = %name, "field[{}] {}, so it was skipped", name, reason);
    skipped.push((name.to_string(), reason));
}

fn skip_param(skipped: &mut Vec<(String, SkipReason)>, name: &str, reason: SkipReason) {
    warn!(param = %name, "param[{}] {}, so it was skipped", name, reason);
    skipped.push((name.to_string(), reason));
}
