pub mod codes;
mod mapper;

pub use mapper::map_status;

use std::fmt;
use thiserror::Error;

/// Error category for decision-making (retry, abort, reconnect, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transient error - retry may resolve
    Transient,
    /// Fatal error - should abort operation
    Fatal,
    /// Validation error - invalid user input
    Validation,
    /// Connection lost - should reconnect
    ConnectionLost,
}

/// Exception kinds of the client taxonomy.
///
/// The hierarchy is `Warning`, `Error` → {`InterfaceError`, `DatabaseError` →
/// {`DataError`, `OperationalError` → {`TransactionAbortError`},
/// `IntegrityError`, `InternalError`, `ProgrammingError`, `NotSupportedError`}}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Warning,
    Error,
    InterfaceError,
    DatabaseError,
    DataError,
    OperationalError,
    IntegrityError,
    InternalError,
    ProgrammingError,
    NotSupportedError,
    TransactionAbortError,
}

impl ErrorKind {
    pub fn parent(self) -> Option<ErrorKind> {
        match self {
            ErrorKind::Warning | ErrorKind::Error => None,
            ErrorKind::InterfaceError | ErrorKind::DatabaseError => Some(ErrorKind::Error),
            ErrorKind::DataError
            | ErrorKind::OperationalError
            | ErrorKind::IntegrityError
            | ErrorKind::InternalError
            | ErrorKind::ProgrammingError
            | ErrorKind::NotSupportedError => Some(ErrorKind::DatabaseError),
            ErrorKind::TransactionAbortError => Some(ErrorKind::OperationalError),
        }
    }

    /// True when `self` is `ancestor` or derives from it.
    pub fn is_a(self, ancestor: ErrorKind) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == ancestor {
                return true;
            }
            current = kind.parent();
        }
        false
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Warning => "Warning",
            ErrorKind::Error => "Error",
            ErrorKind::InterfaceError => "InterfaceError",
            ErrorKind::DatabaseError => "DatabaseError",
            ErrorKind::DataError => "DataError",
            ErrorKind::OperationalError => "OperationalError",
            ErrorKind::IntegrityError => "IntegrityError",
            ErrorKind::InternalError => "InternalError",
            ErrorKind::ProgrammingError => "ProgrammingError",
            ErrorKind::NotSupportedError => "NotSupportedError",
            ErrorKind::TransactionAbortError => "TransactionAbortError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MimerError {
    #[error("{kind}: {message} ({code})")]
    Database {
        kind: ErrorKind,
        code: i32,
        message: String,
    },

    #[error("Pool exhausted: all {max_connections} connections are in use")]
    PoolExhausted { max_connections: u32 },

    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Scroll position {position} out of range for {rows} rows")]
    ScrollOutOfRange { position: i64, rows: usize },

    #[error("Library load error: {0}")]
    LibraryLoad(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl MimerError {
    /// Builds the error for one of the adapter's local codes.
    pub fn local(code: i32) -> Self {
        Self::local_with(code, None)
    }

    pub fn local_with(code: i32, arg: Option<&str>) -> Self {
        let message = codes::local_message(code, arg).unwrap_or_else(|| format!("Unknown error {}", code));
        MimerError::Database {
            kind: codes::classify(code),
            code,
            message,
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            MimerError::Database { kind, .. } => Some(*kind),
            MimerError::InternalError(_) => Some(ErrorKind::InternalError),
            MimerError::LibraryLoad(_) => Some(ErrorKind::InterfaceError),
            _ => None,
        }
    }

    /// True when the error's kind is `ancestor` or one of its descendants.
    pub fn is_a(&self, ancestor: ErrorKind) -> bool {
        self.kind().is_some_and(|kind| kind.is_a(ancestor))
    }

    pub fn code(&self) -> i32 {
        match self {
            MimerError::Database { code, .. } => *code,
            _ => 0,
        }
    }

    pub fn message(&self) -> String {
        match self {
            MimerError::Database { message, .. } => message.clone(),
            _ => self.to_string(),
        }
    }

    /// Returns true if the error is transient and may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            MimerError::PoolExhausted { .. } => true,
            MimerError::Database { kind, .. } => *kind == ErrorKind::TransactionAbortError,
            _ => false,
        }
    }

    /// Returns true if this error means the session is gone
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            MimerError::Database { code: codes::CONNECTION_NOT_OPEN, .. }
                | MimerError::Database { code: codes::LOGIN_FAILURE, .. }
                | MimerError::Database { kind: ErrorKind::InterfaceError, .. }
        )
    }

    /// Returns the error category for decision-making
    pub fn error_category(&self) -> ErrorCategory {
        if self.is_a(ErrorKind::DataError) || self.is_a(ErrorKind::ProgrammingError) {
            return ErrorCategory::Validation;
        }
        if self.is_connection_error() {
            return ErrorCategory::ConnectionLost;
        }
        if self.is_retryable() {
            return ErrorCategory::Transient;
        }
        ErrorCategory::Fatal
    }
}

pub type Result<T> = std::result::Result<T, MimerError>;
