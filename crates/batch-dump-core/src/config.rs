//! Dump configuration.
//!
//! A [`DumpConfig`] is built once per worker and passed in at construction;
//! nothing in the pipeline reads process-global flags. It can come from a
//! TOML file, from layered files plus `BATCH_DUMP__*` environment variables,
//! or from a trainer descriptor.
//!
//! ```toml
//! mode = "hash"
//! interval = 100
//! fields = ["label", "click.tmp_0"]
//! params = ["fc_0.w_0"]
//!
//! [flags]
//! lineid_have_extend_info = true
//! dump_filed_same_as_aibox = false
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DumpError, DumpResult};
use crate::sampling::{DumpMode, SamplingPolicy};

/// Interval used when none is configured.
pub const DEFAULT_DUMP_INTERVAL: u64 = 10_000;

fn default_interval() -> u64 {
    DEFAULT_DUMP_INTERVAL
}

/// Output layout switches.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DumpFlags {
    /// Line ids are `<key> <metadata>`; the key starts the record and the
    /// metadata is appended as its last column.
    #[serde(default)]
    pub lineid_have_extend_info: bool,

    /// Short field headers: the name up to its first `.`, no element count.
    #[serde(
        default,
        rename = "dump_filed_same_as_aibox",
        alias = "dump_field_same_as_aibox"
    )]
    pub dump_field_same_as_aibox: bool,
}

/// Everything a worker needs to dump fields and parameters.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DumpConfig {
    #[serde(default)]
    pub mode: DumpMode,

    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Tensors dumped per selected sample, in record column order.
    #[serde(default)]
    pub fields: Vec<String>,

    /// Tensors dumped whole once per batch, in line order.
    #[serde(default)]
    pub params: Vec<String>,

    #[serde(default)]
    pub flags: DumpFlags,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            mode: DumpMode::default(),
            interval: DEFAULT_DUMP_INTERVAL,
            fields: Vec::new(),
            params: Vec::new(),
            flags: DumpFlags::default(),
        }
    }
}

/// Dump section of a trainer descriptor.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TrainerDesc {
    #[serde(default)]
    pub enable_random_dump: bool,
    #[serde(default)]
    pub random_with_lineid: bool,
    #[serde(default = "default_interval")]
    pub dump_interval: u64,
    #[serde(default)]
    pub dump_fields: Vec<String>,
    #[serde(default)]
    pub dump_param: Vec<String>,
}

impl Default for TrainerDesc {
    fn default() -> Self {
        Self {
            enable_random_dump: false,
            random_with_lineid: false,
            dump_interval: DEFAULT_DUMP_INTERVAL,
            dump_fields: Vec::new(),
            dump_param: Vec::new(),
        }
    }
}

impl DumpConfig {
    /// Load configuration from files and environment.
    ///
    /// Sources, later ones overriding earlier ones:
    /// 1. `config/dump.toml`
    /// 2. `config/dump.{BATCH_DUMP_ENV}.toml`
    /// 3. Environment variables with the `BATCH_DUMP__` prefix, e.g.
    ///    `BATCH_DUMP__MODE=hash` or `BATCH_DUMP__FIELDS=label,score`
    pub fn load() -> DumpResult<Self> {
        let env = std::env::var("BATCH_DUMP_ENV").unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/dump").required(false))
            .add_source(config::File::with_name(&format!("config/dump.{}", env)).required(false))
            .add_source(
                config::Environment::with_prefix("BATCH_DUMP")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("fields")
                    .with_list_parse_key("params"),
            );

        let config: DumpConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        debug!(env = %env, mode = ?config.mode, "loaded dump config");
        Ok(config)
    }

    /// Load configuration from a single TOML file.
    pub fn from_file(path: &Path) -> DumpResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DumpError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: DumpConfig = toml::from_str(&content)
            .map_err(|e| DumpError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Derive the configuration from a trainer descriptor.
    ///
    /// Random dumping off means every sample is dumped; on, samples are
    /// picked by line-id hash if `random_with_lineid` is set and by random
    /// draw otherwise.
    pub fn from_trainer_desc(desc: &TrainerDesc, flags: DumpFlags) -> DumpResult<Self> {
        let mode = match (desc.enable_random_dump, desc.random_with_lineid) {
            (false, _) => DumpMode::Full,
            (true, true) => DumpMode::Hash,
            (true, false) => DumpMode::Random,
        };
        let config = Self {
            mode,
            interval: desc.dump_interval,
            fields: desc.dump_fields.clone(),
            params: desc.dump_param.clone(),
            flags,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> DumpResult<()> {
        if self.interval == 0 {
            return Err(DumpError::InvalidInterval(self.interval));
        }
        check_names("fields", &self.fields)?;
        check_names("params", &self.params)?;
        Ok(())
    }

    pub fn policy(&self) -> DumpResult<SamplingPolicy> {
        SamplingPolicy::new(self.mode, self.interval)
    }
}

fn check_names(list: &str, names: &[String]) -> DumpResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(DumpError::ConfigError(format!(
                "{} contains an empty name",
                list
            )));
        }
        if !seen.insert(name.as_str()) {
            return Err(DumpError::ConfigError(format!(
                "{} lists '{}' more than once",
                list, name
            )));
        }
    }
    Ok(())
}
