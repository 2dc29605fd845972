//! Batch Dump Core - selective tensor dumping for training workers.
//!
//! After each processed minibatch a training worker can emit diagnostic
//! text for offline tooling:
//!
//! - **Field dumps**: for each sampled instance, one tab-separated line with
//!   that instance's slice of every configured field tensor.
//! - **Parameter dumps**: one line per configured parameter with all of its
//!   values.
//!
//! # Architecture
//!
//! ```text
//! DumpWorker ──► SamplingPolicy ──► hit[i] per sample (once per batch)
//!     │
//!     ├── fields:  Scope ─► validate_field ─► materialize ─► row_bounds ─► format_range ─► RecordBuffer
//!     │                                                                                       │
//!     └── params:  Scope ─► materialize ─► format_range ────────────────────────────────────────┤
//!                                                                                              ▼
//!                                                                                          DumpSink
//! ```
//!
//! Line formats:
//!
//! ```text
//! <line_id_prefix>\t<field>:<count>:v1:v2...\t...[\t<line_id_suffix>]
//! (<batch_id>,<param>):v1:v2:...:vN
//! ```
//!
//! # Failure Model
//!
//! Missing variables, uninitialized tensors and tensors whose layout does
//! not match the batch are logged through `tracing` and skipped. An
//! out-of-range slice is written as the in-band marker `access violation`.
//! Only sink failures and invalid configuration surface as [`DumpError`].

pub mod config;
pub mod device;
pub mod error;
pub mod format;
pub mod layout;
pub mod record;
pub mod sampling;
pub mod scope;
pub mod sink;
pub mod tensor;
pub mod worker;

pub use config::{DumpConfig, DumpFlags, TrainerDesc, DEFAULT_DUMP_INTERVAL};
pub use device::{materialize, DeviceBuffer, HostTensor};
pub use error::{DumpError, DumpResult, LayoutError, SkipReason};
pub use format::{format_range, ACCESS_VIOLATION, UNSUPPORTED_TYPE};
pub use layout::{row_bounds, validate_field};
pub use record::{LineId, RecordBuffer};
pub use sampling::{line_id_hash, DumpMode, SamplingPolicy};
pub use scope::{BatchReader, MemoryBatch, MemoryScope, Scope};
pub use sink::{ChannelSink, DumpSink, FileSink, MemorySink};
pub use tensor::{ElementType, Place, Storage, Tensor, TensorData};
pub use worker::{BatchDumpReport, DumpWorker, FieldDumpReport, ParamDumpReport};
