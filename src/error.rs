use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{context} ({}): {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to enumerate processes: {0}")]
    Enumeration(String),

    #[error("failed to terminate process {pid}: {reason}")]
    Termination { pid: String, reason: String },

    #[error("secure random source failed: {0}")]
    Entropy(String),

    #[error("unsupported operating system: {0}")]
    UnsupportedPlatform(String),

    #[error("could not determine the current user: {0}")]
    UserLookup(String),

    #[error("{count} matching process(es) still running after all attempts")]
    StillRunning { count: usize },

    #[error("failed to acquire administrator privileges: {0}")]
    Elevation(String),
}

impl Error {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }

    /// Stable identifier for the error kind, independent of the message text.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "error-io",
            Self::Serialization { .. } => "error-serialization",
            Self::Enumeration(_) => "error-enumeration",
            Self::Termination { .. } => "error-termination",
            Self::Entropy(_) => "error-entropy",
            Self::UnsupportedPlatform(_) => "error-unsupported-platform",
            Self::UserLookup(_) => "error-user-lookup",
            Self::StillRunning { .. } => "error-still-running",
            Self::Elevation(_) => "error-elevation",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
