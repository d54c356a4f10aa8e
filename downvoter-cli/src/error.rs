//! CLI-specific error types and exit code mapping

use downvoter_core::error::{DownvoterError, RuleError};
use downvoter_engine::EngineError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// A rule for this username already exists.
    #[error("rule for '{username}' already exists (use --force to overwrite)")]
    RuleConflict { username: String },

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from downvoter-core.
    #[error("{0}")]
    Core(#[from] DownvoterError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                     |
    /// |------|-----------------------------|
    /// | 0    | Success                     |
    /// | 1    | General / command error     |
    /// | 2    | Configuration error         |
    /// | 3    | Rule conflict               |
    /// | 10   | IO error                    |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::RuleConflict { .. } => 3,
            Self::Io(_) => 10,
            Self::Core(core) => match core {
                DownvoterError::Config(_) => 2,
                DownvoterError::Rule(RuleError::Conflict { .. }) => 3,
                DownvoterError::Io(_) => 10,
                _ => 1,
            },
            Self::JsonSerialize(_) | Self::Command(_) => 1,
        }
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::RuleConflict { username } => Self::RuleConflict { username },
            EngineError::Config { field, reason } => {
                Self::Config(format!("invalid value for '{field}': {reason}"))
            }
            EngineError::Io(e) => Self::Io(e),
            EngineError::RuleLoad { path, reason } => {
                Self::Command(format!("failed to load rules from {path}: {reason}"))
            }
            other => Self::Core(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use downvoter_core::error::{ConfigError, StorageError};

    #[test]
    fn test_exit_code_config_error() {
        let err = CliError::Config("test error".to_owned());
        assert_eq!(err.exit_code(), 2, "config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_rule_conflict() {
        let err = CliError::RuleConflict {
            username: "bob".to_owned(),
        };
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("--force"));
    }

    #[test]
    fn test_exit_code_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = CliError::Io(io_err);
        assert_eq!(err.exit_code(), 10, "io error should return exit code 10");
    }

    #[test]
    fn test_exit_code_command_error() {
        let err = CliError::Command("test error".to_owned());
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_core_config_error() {
        let err: CliError = DownvoterError::Config(ConfigError::FileNotFound {
            path: "downvoter.toml".to_owned(),
        })
        .into();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_core_storage_error() {
        let err: CliError =
            DownvoterError::Storage(StorageError::Unavailable("disk".to_owned())).into();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_from_engine_conflict() {
        let err: CliError = EngineError::RuleConflict {
            username: "eve".to_owned(),
        }
        .into();
        match err {
            CliError::RuleConflict { username } => assert_eq!(username, "eve"),
            other => panic!("expected RuleConflict, got {other:?}"),
        }
    }

    #[test]
    fn test_from_engine_malformed_rule() {
        let err: CliError = EngineError::MalformedRule("username is required".to_owned()).into();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("username is required"));
    }

    #[test]
    fn test_error_display_command() {
        let err = CliError::Command("execution failed".to_owned());
        assert_eq!(err.to_string(), "execution failed");
    }
}
