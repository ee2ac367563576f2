//! Error taxonomy for the executor.
//!
//! `ExecError` separates the client-recoverable kinds from the fatal ones so a dispatch
//! loop can match once: recoverable errors become a reply on the same connection, fatal
//! errors trigger a best-effort snapshot and process exit (see design ledger).

use thiserror::Error;

/// A single statement's outcome, when it fails.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The statement's command word was not recognised.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The statement was recognised but its arguments were malformed.
    #[error("incorrect format: {0}")]
    IncorrectFormat(String),

    /// A named database/table/column/intermediate does not exist.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// A `create` targeted a name that is already in use.
    #[error("object already exists: {0}")]
    ObjectAlreadyExists(String),

    /// A `load` path could not be opened.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Any other failure during execution of an otherwise well-formed statement
    /// (I/O, mmap, a predicate applied to the wrong element type, ...).
    #[error("execution error: {0}")]
    Execution(String),

    /// Unrecoverable: a column mapping could not be grown/remapped mid-insert, or an
    /// internal lock was found poisoned. The process snapshots what it can and exits.
    #[error("fatal error: {0}")]
    Fatal(String),
}

impl ExecError {
    /// True if this error should terminate the connection's statement loop and the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExecError::Fatal(_))
    }
}

/// Convenience alias used throughout the executor.
pub type ExecResult<T> = Result<T, ExecError>;

/// The non-error status values a statement can resolve to (§7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusCode {
    /// A write or DDL statement completed with nothing to return.
    OkDone,
    /// A statement published an intermediate the client can reference by handle.
    OkWaitForResponse,
    /// A `print` statement produced output text.
    OkPrint(String),
    /// A `batch_queries`/enqueued-select acknowledgement.
    BatchWait,
    /// `shutdown` completed: catalog snapshotted, columns unmapped.
    OkShutdown,
}
