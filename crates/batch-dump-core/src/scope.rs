//! Seams to the training runtime: variable lookup and the current batch.
//!
//! The dump pipeline never owns the scope or the data reader. It looks
//! variables up by name and asks the reader for the batch size and each
//! sample's line identifier. [`MemoryScope`] and [`MemoryBatch`] are plain
//! in-memory implementations used by the replay tool and the tests.

use std::collections::HashMap;
use std::sync::Arc;

use crate::tensor::Tensor;

/// Read-only variable lookup.
pub trait Scope {
    /// Find a variable by name, `None` if it is not declared.
    fn find_var(&self, name: &str) -> Option<&Tensor>;
}

/// The minibatch currently being processed.
pub trait BatchReader {
    fn batch_size(&self) -> usize;

    /// Line identifier of sample `index`; `index < batch_size()`.
    fn line_id(&self, index: usize) -> &str;
}

/// Hash-map scope with an optional parent.
///
/// Lookups that miss locally fall through to the parent, so a per-batch
/// child scope can see parameters declared once in the root scope.
#[derive(Debug, Default)]
pub struct MemoryScope {
    vars: HashMap<String, Tensor>,
    parent: Option<Arc<MemoryScope>>,
}

impl MemoryScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Arc<MemoryScope>) -> Self {
        Self {
            vars: HashMap::new(),
            parent: Some(parent),
        }
    }

    /// Declare or replace a variable; returns the tensor it replaced.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) -> Option<Tensor> {
        self.vars.insert(name.into(), tensor)
    }

    /// Names declared locally, not including the parent's.
    pub fn local_names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }
}

impl Scope for MemoryScope {
    fn find_var(&self, name: &str) -> Option<&Tensor> {
        match self.vars.get(name) {
            Some(tensor) => Some(tensor),
            None => self.parent.as_deref().and_then(|p| p.find_var(name)),
        }
    }
}

/// A batch given directly by its line identifiers.
#[derive(Debug, Clone, Default)]
pub struct MemoryBatch {
    line_ids: Vec<String>,
}

impl MemoryBatch {
    pub fn new<I, S>(line_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            line_ids: line_ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl BatchReader for MemoryBatch {
    fn batch_size(&self) -> usize {
        self.line_ids.len()
    }

    fn line_id(&self, index: usize) -> &str {
        &self.line_ids[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_var_local_and_missing() {
        let mut scope = MemoryScope::new();
        scope.insert("w", Tensor::host(vec![1, 1], vec![1.0f32]));
        assert!(scope.find_var("w").is_some());
        assert!(scope.find_var("b").is_none());
    }

    #[test]
    fn test_find_var_falls_through_to_parent() {
        let mut root = MemoryScope::new();
        root.insert("fc.w", Tensor::host(vec![1, 2], vec![0.5f32, 0.25]));
        let root = Arc::new(root);

        let mut child = MemoryScope::with_parent(Arc::clone(&root));
        child.insert("label", Tensor::host(vec![1, 1], vec![1i64]));

        assert_eq!(child.find_var("fc.w").map(Tensor::numel), Some(2));
        assert!(child.find_var("label").is_some());
        assert!(root.find_var("label").is_none());
        assert_eq!(child.local_names().collect::<Vec<_>>(), vec!["label"]);
    }

    #[test]
    fn test_local_var_shadows_parent() {
        let mut root = MemoryScope::new();
        root.insert("x", Tensor::host(vec![1, 1], vec![1i32]));
        let mut child = MemoryScope::with_parent(Arc::new(root));
        child.insert("x", Tensor::host(vec![1, 2], vec![1i32, 2]));
        assert_eq!(child.find_var("x").map(Tensor::numel), Some(2));
    }

    #[test]
    fn test_memory_batch() {
        let batch = MemoryBatch::new(["a", "b"]);
        assert_eq!(batch.batch_size(), 2);
        assert_eq!(batch.line_id(1), "b");
    }
}
