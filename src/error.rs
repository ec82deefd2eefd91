//! Error types for attachment-harvester

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Mailbox error: {0}")]
    Mailbox(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Email parsing error: {0}")]
    Parse(String),

    #[error("Message worker failed: {0}")]
    Worker(String),

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Wrap an I/O error together with the path it concerns.
    #[must_use]
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable name of the failure class.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Connection(_) => "connection",
            Self::Tls(_) => "tls",
            Self::Mailbox(_) => "mailbox",
            Self::Search(_) => "search",
            Self::Fetch(_) => "fetch",
            Self::Parse(_) => "parse",
            Self::Worker(_) => "worker",
            Self::Filesystem { .. } => "filesystem",
        }
    }

    /// Process exit code for this failure.
    ///
    /// Mail server failures (3-6) are kept apart from local disk
    /// failures (7) so that "server unreachable" and "permission
    /// denied" are distinguishable from a script. A crashed worker
    /// task is an internal failure (1).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Connection(_) | Self::Tls(_) => 3,
            Self::Mailbox(_) => 4,
            Self::Search(_) => 5,
            Self::Fetch(_) | Self::Parse(_) => 6,
            Self::Filesystem { .. } => 7,
            Self::Worker(_) => 1,
        }
    }

    /// Whether the error concerns a single message and may be
    /// skipped without aborting the run.
    #[must_use]
    pub const fn is_per_message(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Parse(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
