//! End-to-end tests of the dump pipeline through the public API.
//!
//! Each test builds a scope and batch in memory, runs a `DumpWorker`, and
//! checks the exact lines that reach the sink.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use batch_dump_core::{
    line_id_hash, DeviceBuffer, DumpConfig, DumpFlags, DumpMode, DumpResult, DumpWorker,
    ElementType, FileSink, LayoutError, MemoryBatch, MemoryScope, MemorySink, Place,
    SamplingPolicy, SkipReason, Tensor, TensorData, ACCESS_VIOLATION,
};
use tempfile::tempdir;

fn config(mode: DumpMode, interval: u64, fields: &[&str], params: &[&str]) -> DumpConfig {
    DumpConfig {
        mode,
        interval,
        fields: fields.iter().map(|s| s.to_string()).collect(),
        params: params.iter().map(|s| s.to_string()).collect(),
        flags: DumpFlags::default(),
    }
}

fn line_ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("ins_{:05}", i)).collect()
}

/// Accelerator buffer that counts how often it is read back.
#[derive(Debug)]
struct FakeDeviceBuffer {
    data: TensorData,
    copies: Arc<AtomicUsize>,
}

impl DeviceBuffer for FakeDeviceBuffer {
    fn place(&self) -> Place {
        Place::Accelerator { ordinal: 1 }
    }

    fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    fn numel(&self) -> usize {
        self.data.len()
    }

    fn copy_to_host(&self) -> DumpResult<TensorData> {
        self.copies.fetch_add(1, Ordering::SeqCst);
        Ok(self.data.clone())
    }
}

// ============================================================================
// Worked example
// ============================================================================

#[test]
fn test_label_example() {
    let sink = Arc::new(MemorySink::new());
    let worker = DumpWorker::new(config(DumpMode::Full, 1, &["label"], &[]), sink.clone()).unwrap();

    let mut scope = MemoryScope::new();
    scope.insert("label", Tensor::host(vec![3, 1], vec![1i64, 0, 1]));
    let batch = MemoryBatch::new(["a", "b", "c"]);

    let report = worker.dump_field(&scope, &batch).unwrap();
    assert_eq!(report.batch_size, 3);
    assert_eq!(report.selected, 3);
    assert_eq!(report.lines_written, 3);
    assert_eq!(
        sink.lines(),
        vec!["a\tlabel:1:1", "b\tlabel:1:0", "c\tlabel:1:1"]
    );
}

// ============================================================================
// Sampling
// ============================================================================

#[test]
fn test_full_mode_emits_every_sample_for_any_interval() {
    for interval in [1, 2, 3, 10, 10_000] {
        let sink = Arc::new(MemorySink::new());
        let worker =
            DumpWorker::new(config(DumpMode::Full, interval, &["x"], &[]), sink.clone()).unwrap();
        let mut scope = MemoryScope::new();
        scope.insert("x", Tensor::host(vec![8, 1], vec![0i32; 8]));
        let batch = MemoryBatch::new(line_ids(8));

        let report = worker.dump_field(&scope, &batch).unwrap();
        assert_eq!(report.lines_written, 8, "interval {}", interval);
    }
}

#[test]
fn test_hash_mode_is_reproducible_and_keyed_by_line_id() {
    let ids = line_ids(500);
    let interval = 7;

    let run = || {
        let sink = Arc::new(MemorySink::new());
        let worker =
            DumpWorker::new(config(DumpMode::Hash, interval, &["x"], &[]), sink.clone()).unwrap();
        let mut scope = MemoryScope::new();
        scope.insert("x", Tensor::host(vec![500, 1], (0..500i32).collect::<Vec<_>>()));
        worker
            .dump_field(&scope, &MemoryBatch::new(ids.clone()))
            .unwrap();
        sink.take()
    };

    let first = run();
    assert_eq!(first, run());

    let expected: Vec<&String> = ids
        .iter()
        .filter(|id| line_id_hash(id) % interval == 0)
        .collect();
    assert!(!expected.is_empty());
    assert_eq!(first.len(), expected.len());
    for (line, id) in first.iter().zip(expected) {
        assert!(line.starts_with(&format!("{}\t", id)), "line: {}", line);
    }
}

#[test]
fn test_random_mode_same_selection_for_same_batch_size() {
    let sink = Arc::new(MemorySink::new());
    let worker = DumpWorker::new(config(DumpMode::Random, 3, &["x"], &[]), sink.clone()).unwrap();
    let mut scope = MemoryScope::new();
    scope.insert("x", Tensor::host(vec![64, 1], (0..64i64).collect::<Vec<_>>()));

    // Different line ids, same batch size: the same positions are selected.
    worker
        .dump_field(&scope, &MemoryBatch::new(line_ids(64)))
        .unwrap();
    let first: Vec<String> = sink
        .take()
        .into_iter()
        .map(|l| l.split('\t').nth(1).unwrap_or_default().to_string())
        .collect();

    let other_ids: Vec<String> = (0..64).map(|i| format!("other_{}", i)).collect();
    worker
        .dump_field(&scope, &MemoryBatch::new(other_ids))
        .unwrap();
    let second: Vec<String> = sink
        .take()
        .into_iter()
        .map(|l| l.split('\t').nth(1).unwrap_or_default().to_string())
        .collect();

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_selection_shared_across_fields() {
    let sink = Arc::new(MemorySink::new());
    let worker =
        DumpWorker::new(config(DumpMode::Hash, 3, &["a", "b"], &[]), sink.clone()).unwrap();
    let mut scope = MemoryScope::new();
    scope.insert("a", Tensor::host(vec![100, 1], vec![1i32; 100]));
    scope.insert("b", Tensor::host(vec![100, 1], vec![2i32; 100]));

    worker
        .dump_field(&scope, &MemoryBatch::new(line_ids(100)))
        .unwrap();
    for line in sink.lines() {
        let cols: Vec<&str> = line.split('\t').collect();
        assert_eq!(cols.len(), 3, "line: {}", line);
        assert_eq!(cols[1], "a:1:1");
        assert_eq!(cols[2], "b:1:2");
    }
}

// ============================================================================
// Layout validation
// ============================================================================

#[test]
fn test_layout_mismatches_skip_the_field() {
    let sink = Arc::new(MemorySink::new());
    let worker = DumpWorker::new(
        config(DumpMode::Full, 1, &["short_lod", "short_rows", "flat", "good"], &[]),
        sink.clone(),
    )
    .unwrap();

    let mut scope = MemoryScope::new();
    scope.insert(
        "short_lod",
        Tensor::host(vec![3, 1], vec![1i32, 2, 3]).with_lod(vec![0, 3]),
    );
    scope.insert("short_rows", Tensor::host(vec![2, 1], vec![1i32, 2]));
    scope.insert("flat", Tensor::host(vec![3], vec![1i32, 2, 3]));
    scope.insert("good", Tensor::host(vec![3, 1], vec![4i32, 5, 6]));
    let batch = MemoryBatch::new(["a", "b", "c"]);

    let report = worker.dump_field(&scope, &batch).unwrap();
    assert_eq!(
        report.skipped,
        vec![
            (
                "short_lod".to_string(),
                SkipReason::InvalidLayout(LayoutError::LodLength {
                    expected: 4,
                    actual: 2
                })
            ),
            (
                "short_rows".to_string(),
                SkipReason::InvalidLayout(LayoutError::BatchRows {
                    expected: 3,
                    actual: 2
                })
            ),
            (
                "flat".to_string(),
                SkipReason::InvalidLayout(LayoutError::Rank { actual: 1 })
            ),
        ]
    );
    assert_eq!(sink.lines(), vec!["a\tgood:1:4", "b\tgood:1:5", "c\tgood:1:6"]);
}

#[test]
fn test_out_of_range_lod_writes_marker() {
    let sink = Arc::new(MemorySink::new());
    let worker = DumpWorker::new(config(DumpMode::Full, 1, &["seq"], &[]), sink.clone()).unwrap();
    let mut scope = MemoryScope::new();
    // Offsets claim 5 rows but the buffer only holds 3.
    scope.insert(
        "seq",
        Tensor::host(vec![3, 1], vec![1.0f32, 2.0, 3.0]).with_lod(vec![0, 2, 5]),
    );
    let batch = MemoryBatch::new(["a", "b"]);

    worker.dump_field(&scope, &batch).unwrap();
    assert_eq!(
        sink.lines(),
        vec![
            "a\tseq:2:1:2".to_string(),
            format!("b\tseq:3{}", ACCESS_VIOLATION)
        ]
    );
}

#[test]
fn test_oversized_row_width_writes_marker() {
    let sink = Arc::new(MemorySink::new());
    let worker = DumpWorker::new(config(DumpMode::Full, 1, &["wide"], &[]), sink.clone()).unwrap();
    let mut scope = MemoryScope::new();
    // Shape claims 2^62 columns per row; the buffer holds three values.
    scope.insert("wide", Tensor::host(vec![3, 1 << 62], vec![1i64, 2, 3]));
    let batch = MemoryBatch::new(["a", "b", "c"]);

    let report = worker.dump_field(&scope, &batch).unwrap();
    assert_eq!(report.lines_written, 3);
    let lines = sink.lines();
    assert_eq!(lines[0], format!("a\twide:{}{}", 1u64 << 62, ACCESS_VIOLATION));
    assert!(lines[1].ends_with(ACCESS_VIOLATION), "got: {}", lines[1]);
    assert_eq!(lines[2], format!("c\twide:0{}", ACCESS_VIOLATION));
}

#[test]
fn test_multi_column_lod_field() {
    let sink = Arc::new(MemorySink::new());
    let worker = DumpWorker::new(config(DumpMode::Full, 1, &["emb"], &[]), sink.clone()).unwrap();
    let mut scope = MemoryScope::new();
    scope.insert(
        "emb",
        Tensor::host(vec![3, 2], vec![1i16, 2, 3, 4, 5, 6]).with_lod(vec![0, 2, 3]),
    );
    let batch = MemoryBatch::new(["a", "b"]);

    worker.dump_field(&scope, &batch).unwrap();
    assert_eq!(sink.lines(), vec!["a\temb:4:1:2:3:4", "b\temb:2:5:6"]);
}

// ============================================================================
// Records
// ============================================================================

#[test]
fn test_selected_sample_without_fields_writes_nothing() {
    let sink = Arc::new(MemorySink::new());
    let worker =
        DumpWorker::new(config(DumpMode::Full, 1, &["gone"], &[]), sink.clone()).unwrap();
    let mut scope = MemoryScope::new();
    scope.insert("gone", Tensor::uninitialized());
    let batch = MemoryBatch::new(["a", "b", "c"]);

    let report = worker.dump_field(&scope, &batch).unwrap();
    assert_eq!(report.selected, 3);
    assert_eq!(report.lines_written, 0);
    assert!(sink.is_empty());
}

#[test]
fn test_both_layout_flags() {
    let mut cfg = config(DumpMode::Full, 1, &["pred.out", "label"], &[]);
    cfg.flags = DumpFlags {
        lineid_have_extend_info: true,
        dump_field_same_as_aibox: true,
    };
    let sink = Arc::new(MemorySink::new());
    let worker = DumpWorker::new(cfg, sink.clone()).unwrap();

    let mut scope = MemoryScope::new();
    scope.insert("pred.out", Tensor::host(vec![2, 1], vec![0.5f32, 0.125]));
    scope.insert("label", Tensor::host(vec![2, 1], vec![1i64, 0]));
    let batch = MemoryBatch::new(["k1 src=x ts=1", "k2"]);

    worker.dump_field(&scope, &batch).unwrap();
    assert_eq!(
        sink.lines(),
        vec!["k1\tpred:0.5\tlabel:1\tsrc=x ts=1", "k2\tpred:0.125\tlabel:0"]
    );
}

// ============================================================================
// Accelerator residency
// ============================================================================

#[test]
fn test_device_field_copied_once_per_call() {
    let copies = Arc::new(AtomicUsize::new(0));
    let buffer = FakeDeviceBuffer {
        data: TensorData::F64(vec![1.5, 2.5, 3.5]),
        copies: Arc::clone(&copies),
    };
    let sink = Arc::new(MemorySink::new());
    let worker = DumpWorker::new(config(DumpMode::Full, 1, &["gpu"], &[]), sink.clone()).unwrap();
    let mut scope = MemoryScope::new();
    scope.insert("gpu", Tensor::on_device(vec![3, 1], buffer).with_lod(vec![0, 1, 3]));
    let batch = MemoryBatch::new(["a", "b"]);

    worker.dump_field(&scope, &batch).unwrap();
    assert_eq!(copies.load(Ordering::SeqCst), 1);
    assert_eq!(sink.lines(), vec!["a\tgpu:1:1.5", "b\tgpu:2:2.5:3.5"]);
}

#[test]
fn test_device_param_dump() {
    let copies = Arc::new(AtomicUsize::new(0));
    let buffer = FakeDeviceBuffer {
        data: TensorData::I32(vec![-1, 0, 1]),
        copies: Arc::clone(&copies),
    };
    let sink = Arc::new(MemorySink::new());
    let worker = DumpWorker::new(config(DumpMode::Full, 1, &[], &["w"]), sink.clone()).unwrap();
    let mut scope = MemoryScope::new();
    scope.insert("w", Tensor::on_device(vec![3], buffer));

    worker.dump_param(&scope, 4).unwrap();
    assert_eq!(copies.load(Ordering::SeqCst), 1);
    assert_eq!(sink.lines(), vec!["(4,w):-1:0:1"]);
}

#[test]
fn test_device_field_with_bad_layout_is_not_copied() {
    let copies = Arc::new(AtomicUsize::new(0));
    let buffer = FakeDeviceBuffer {
        data: TensorData::F32(vec![1.0, 2.0]),
        copies: Arc::clone(&copies),
    };
    let sink = Arc::new(MemorySink::new());
    let worker = DumpWorker::new(config(DumpMode::Full, 1, &["gpu"], &[]), sink.clone()).unwrap();
    let mut scope = MemoryScope::new();
    scope.insert("gpu", Tensor::on_device(vec![2, 1], buffer));

    worker
        .dump_field(&scope, &MemoryBatch::new(["a", "b", "c"]))
        .unwrap();
    assert_eq!(copies.load(Ordering::SeqCst), 0);
    assert!(sink.is_empty());
}

// ============================================================================
// Parameter dumps
// ============================================================================

#[test]
fn test_param_dump_one_line_per_present_param_in_any_mode() {
    for (mode, interval) in [
        (DumpMode::Full, 1),
        (DumpMode::Hash, 1_000_000),
        (DumpMode::Random, 1_000_000),
        (DumpMode::Off, 5),
    ] {
        let sink = Arc::new(MemorySink::new());
        let worker =
            DumpWorker::new(config(mode, interval, &[], &["w", "absent", "b"]), sink.clone())
                .unwrap();
        let mut scope = MemoryScope::new();
        scope.insert("w", Tensor::host(vec![1, 3], vec![0.5f32, 1.0, 1.5]));
        scope.insert("b", Tensor::host(vec![1], vec![9i16]));

        let report = worker.dump_param(&scope, 77).unwrap();
        assert_eq!(report.lines_written, 2, "mode {:?}", mode);
        assert_eq!(sink.lines(), vec!["(77,w):0.5:1:1.5", "(77,b):9"]);
    }
}

#[test]
fn test_param_found_through_parent_scope() {
    let mut root = MemoryScope::new();
    root.insert("fc.w", Tensor::host(vec![2], vec![3i64, 4]));
    let scope = MemoryScope::with_parent(Arc::new(root));

    let sink = Arc::new(MemorySink::new());
    let worker = DumpWorker::new(config(DumpMode::Full, 1, &[], &["fc.w"]), sink.clone()).unwrap();
    worker.dump_param(&scope, 0).unwrap();
    assert_eq!(sink.lines(), vec!["(0,fc.w):3:4"]);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_workers_share_one_file_sink() {
    let tmp = tempdir().expect("create temp dir");
    let path = tmp.path().join("part-000");
    let sink = Arc::new(FileSink::create(&path).expect("create sink"));

    let handles: Vec<_> = (0..4)
        .map(|shard| {
            let sink = Arc::clone(&sink);
            thread::spawn(move || {
                let worker =
                    DumpWorker::new(config(DumpMode::Full, 1, &["x"], &["w"]), sink).unwrap();
                let mut scope = MemoryScope::new();
                scope.insert("x", Tensor::host(vec![10, 1], vec![shard as i32; 10]));
                scope.insert("w", Tensor::host(vec![1], vec![shard as f32]));
                let ids: Vec<String> = (0..10).map(|i| format!("s{}_{}", shard, i)).collect();
                for batch_id in 0..5 {
                    worker
                        .dump_batch(&scope, &MemoryBatch::new(ids.clone()), batch_id)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker thread panicked");
    }
    sink.flush().unwrap();

    let content = std::fs::read_to_string(&path).expect("read dump file");
    let lines: Vec<&str> = content.lines().collect();
    // 4 shards x 5 batches x (10 records + 1 param line)
    assert_eq!(lines.len(), 4 * 5 * 11);
    for shard in 0..4 {
        let records = lines
            .iter()
            .filter(|l| l.starts_with(&format!("s{}_", shard)))
            .count();
        assert_eq!(records, 50);
        assert!(lines
            .iter()
            .filter(|l| l.starts_with(&format!("s{}_", shard)))
            .all(|l| l.ends_with(&format!("\tx:1:{}", shard))));
    }
}

#[test]
fn test_zero_interval_policy_rejected() {
    assert!(SamplingPolicy::new(DumpMode::Hash, 0).is_err());
    assert!(DumpWorker::new(config(DumpMode::Full, 0, &["x"], &[]), Arc::new(MemorySink::new()))
        .is_err());
}
