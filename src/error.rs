//! Launcher errors and their process exit codes

use std::path::PathBuf;

/// Exit code for usage and validation failures
pub const EXIT_USAGE: i32 = 2;

/// Exit code for everything that is not a usage error or a delegated status
pub const EXIT_FAILURE: i32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    #[error("{0}")]
    Usage(String),

    #[error("{what} not found: {}", path.display())]
    FileNotFound { what: &'static str, path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize client config: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("Invalid MQTT port value: {value}")]
    InvalidPort { value: String },

    #[error("MQTT preflight failed for {target}: {detail}")]
    PreflightFailure { target: String, detail: String },

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Headless process exited with status {code}")]
    DelegateFailure { code: i32 },
}

impl LauncherError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    pub fn not_found(what: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound {
            what,
            path: path.into(),
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) | Self::FileNotFound { .. } | Self::InvalidPort { .. } => EXIT_USAGE,
            Self::DelegateFailure { code } => *code,
            _ => EXIT_FAILURE,
        }
    }
}

pub type Result<T> = std::result::Result<T, LauncherError>;
