//! Error types for facade operations.

use bson::Bson;
use thiserror::Error;

/// All errors that can occur while talking to the document store.
#[derive(Debug, Error)]
pub enum Error {
    /// Network or session failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// The per-operation deadline elapsed.
    #[error("operation timed out")]
    Timeout,

    /// The connection was never established or has been closed.
    #[error("not connected")]
    NotConnected,

    /// Malformed host or port.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Malformed database, collection or field name.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Invalid client settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The store rejected a well-formed request.
    #[error("operation failed: {message}")]
    Operation {
        /// Error code from the store.
        code: Option<i32>,
        /// Error message.
        message: String,
    },

    /// Write-path failure: constraint violation or validation.
    #[error("write error: {message}")]
    Write {
        /// Error code from the store.
        code: Option<i32>,
        /// Error message.
        message: String,
    },

    /// An ordered batch insert stopped at `index`.
    ///
    /// Documents before `index` were written and stay written.
    #[error("batch insert stopped at document {index}: {message}")]
    BulkWrite {
        /// Ids of the documents written before the failure, in input order.
        inserted_ids: Vec<Bson>,
        /// Position of the failing document in the batch.
        index: usize,
        /// Error code from the store.
        code: Option<i32>,
        /// Error message.
        message: String,
    },

    /// An explicit database creation found the database already present.
    #[error("database {0} already exists")]
    DatabaseExists(String),

    /// A document could not be converted to or from BSON.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Anything not anticipated above.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Error::Connection(msg.into())
    }

    /// Create an invalid address error.
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Error::InvalidAddress(msg.into())
    }

    /// Create an invalid name error.
    pub fn invalid_name(msg: impl Into<String>) -> Self {
        Error::InvalidName(msg.into())
    }

    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create an operation error.
    pub fn operation(code: Option<i32>, message: impl Into<String>) -> Self {
        Error::Operation {
            code,
            message: message.into(),
        }
    }

    /// Create a write error.
    pub fn write(code: Option<i32>, message: impl Into<String>) -> Self {
        Error::Write {
            code,
            message: message.into(),
        }
    }

    /// Create an unexpected error.
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Error::Unexpected(msg.into())
    }

    /// Check if this is a connection-level failure.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::Connection(_) | Error::Timeout | Error::NotConnected
        )
    }

    /// Check if the caller should stop rather than carry on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DatabaseExists(_))
    }

    /// Get the error code if the store supplied one.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::Operation { code, .. }
            | Error::Write { code, .. }
            | Error::BulkWrite { code, .. } => *code,
            _ => None,
        }
    }

    /// Ids written before a batch insert failed. Empty for other errors.
    pub fn inserted_ids(&self) -> &[Bson] {
        match self {
            Error::BulkWrite { inserted_ids, .. } => inserted_ids,
            _ => &[],
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection(_) | Error::Timeout => ErrorKind::Connection,
            Error::NotConnected => ErrorKind::NotConnected,
            Error::InvalidAddress(_) => ErrorKind::InvalidAddress,
            Error::InvalidName(_) => ErrorKind::InvalidName,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Operation { .. } => ErrorKind::Operation,
            Error::Write { .. } | Error::BulkWrite { .. } => ErrorKind::Write,
            Error::DatabaseExists(_) => ErrorKind::Fatal,
            Error::Serialization(_) | Error::Unexpected(_) => ErrorKind::Unexpected,
        }
    }
}

impl From<bson::ser::Error> for Error {
    fn from(err: bson::ser::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<bson::de::Error> for Error {
    fn from(err: bson::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Configuration(err.to_string())
    }
}

/// Result type alias for facade operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kind enumeration for pattern matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or session failure, including timeouts.
    Connection,
    /// Operation attempted without a live connection.
    NotConnected,
    /// Malformed host or port.
    InvalidAddress,
    /// Malformed identifier.
    InvalidName,
    /// Bad client settings.
    Configuration,
    /// Store rejected the request.
    Operation,
    /// Write-path failure.
    Write,
    /// The caller must stop.
    Fatal,
    /// Catch-all.
    Unexpected,
}
