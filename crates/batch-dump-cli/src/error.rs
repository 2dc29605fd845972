//! Error types and exit codes for the replay CLI.
//!
//! # Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | I/O, sink or worker failure |
//! | 2 | Invalid dump configuration |
//! | 3 | Malformed batch fixture |

use batch_dump_core::DumpError;
use thiserror::Error;

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum CliExitCode {
    Success = 0,
    Failure = 1,
    InvalidConfig = 2,
    InvalidInput = 3,
}

impl From<CliExitCode> for i32 {
    fn from(code: CliExitCode) -> Self {
        code as i32
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Dump failed: {0}")]
    Dump(DumpError),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl From<DumpError> for CliError {
    fn from(err: DumpError) -> Self {
        match err {
            DumpError::InvalidInterval(_) | DumpError::ConfigError(_) => {
                CliError::Config(err.to_string())
            }
            other => CliError::Dump(other),
        }
    }
}

impl CliError {
    pub fn exit_code(&self) -> CliExitCode {
        match self {
            CliError::Config(_) => CliExitCode::InvalidConfig,
            CliError::InvalidInput(_) | CliError::Serialization(_) => CliExitCode::InvalidInput,
            CliError::Io(_) | CliError::Dump(_) | CliError::Worker(_) => CliExitCode::Failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_map_to_invalid_config() {
        let err: CliError = DumpError::InvalidInterval(0).into();
        assert_eq!(err.exit_code(), CliExitCode::InvalidConfig);
        let err: CliError = DumpError::ConfigError("bad".into()).into();
        assert_eq!(err.exit_code(), CliExitCode::InvalidConfig);
    }

    #[test]
    fn test_sink_errors_map_to_failure() {
        let err: CliError = DumpError::SinkClosed.into();
        assert_eq!(err.exit_code(), CliExitCode::Failure);
        assert_eq!(i32::from(err.exit_code()), 1);
    }

    #[test]
    fn test_json_errors_map_to_invalid_input() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: CliError = json_err.into();
        assert_eq!(err.exit_code(), CliExitCode::InvalidInput);
        assert_eq!(i32::from(err.exit_code()), 3);
    }
}
