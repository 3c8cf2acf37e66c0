//! CLI-specific error types and exit code mapping

use strata_core::error::StrataError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to standard Unix exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// Component pattern loading or compilation failure.
    #[error("pattern error: {0}")]
    Pattern(String),

    /// Scan engine operation failed.
    #[error("scan error: {0}")]
    Scan(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from strata-core.
    #[error("{0}")]
    Core(StrataError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                       |
    /// |------|-------------------------------|
    /// | 0    | Success                       |
    /// | 1    | General / command error       |
    /// | 2    | Configuration error           |
    /// | 3    | Pattern error                 |
    /// | 4    | Scan error                    |
    /// | 10   | IO error                      |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Pattern(_) => 3,
            Self::Scan(_) => 4,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) => 1,
        }
    }
}

impl From<StrataError> for CliError {
    fn from(e: StrataError) -> Self {
        match e {
            StrataError::Config(err) => Self::Config(err.to_string()),
            StrataError::Pattern(err) => Self::Pattern(err.to_string()),
            other => Self::Core(other),
        }
    }
}

impl From<strata_scan_engine::ScanEngineError> for CliError {
    fn from(e: strata_scan_engine::ScanEngineError) -> Self {
        Self::Scan(e.to_string())
    }
}
