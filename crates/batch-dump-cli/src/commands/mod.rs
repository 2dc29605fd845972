//! CLI command handlers
//!
//! # Modules
//!
//! - `replay`: Run recorded batches through the dump pipeline

pub mod replay;
