use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single remote read, below the rotation logic.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not start transport command: {0}")]
    Spawn(#[source] io::Error),

    #[error("remote read timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection to remote host failed: {0}")]
    Connection(String),

    /// The remote command ran but exited non-zero.
    #[error("remote command failed (status {status:?}): {stderr}")]
    Remote { status: Option<i32>, stderr: String },

    #[error("i/o error while reading remote output: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// True when the remote side reported that the file does not exist.
    pub fn is_absent(&self) -> bool {
        matches!(self, TransportError::Remote { stderr, .. } if stderr.contains("No such file or directory"))
    }
}

/// Errors raised while building a rotation set.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The base log could not be fetched; nothing else is attempted.
    #[error("remote log '{path}' is unavailable: {source}")]
    RemoteUnavailable {
        path: String,
        #[source]
        source: TransportError,
    },

    /// A numbered rotation failed at the transport level. Recovered by the
    /// fetcher, which stops traversal at this index.
    #[error("rotation .{index} could not be fetched: {source}")]
    RotationFetchFailed {
        index: usize,
        #[source]
        source: TransportError,
    },

    #[error("rotation bound must be at least 1")]
    ZeroBound,

    #[error("could not update cached copy of index {index}: {source}")]
    Cache {
        index: usize,
        #[source]
        source: io::Error,
    },
}

/// A line that does not follow the access-log grammar.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("line does not match the access log pattern: {0:?}")]
    MalformedLine(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("timestamp {raw:?} is not in DD/Mon/YYYY:HH:MM:SS +HHMM form")]
    MalformedTimestamp { raw: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing {field}: pass --{field} or set the {env} environment variable")]
    Missing {
        field: &'static str,
        env: &'static str,
    },

    #[error("--rotations must be at least 1")]
    NoRotations,

    #[error("--timeout must be greater than zero")]
    ZeroTimeout,
}
