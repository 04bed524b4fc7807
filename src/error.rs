// Error taxonomy shared by every operator

use thiserror::Error;

/// Errors surfaced while planning or executing a query.
///
/// Classification guidance:
/// - [`QueryError::Io`]: open/read/write failures on a source or a sort run file
/// - [`QueryError::Parse`]: malformed header or record shape in a delimited source
/// - [`QueryError::Schema`]: a referenced column does not exist; raised while the
///   operator tree is built, before any row is produced
/// - [`QueryError::InvalidConfig`]: engine or plan parameters outside their contract
/// - [`QueryError::Execution`]: runtime failures that are not raw IO (run decode,
///   Arrow conversion)
#[derive(Debug, Error)]
pub enum QueryError {
    /// Transparent std IO failures.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed delimited input.
    #[error("parse error: {0}")]
    Parse(String),

    /// Unknown or duplicate column names.
    #[error("schema error: {0}")]
    Schema(String),

    /// Invalid engine configuration or plan parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("execution error: {0}")]
    Execution(String),

    /// Zone-map sidecar or config JSON failures.
    #[error("json error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Standard result alias.
pub type Result<T> = std::result::Result<T, QueryError>;
