//! Domain-level error taxonomy.
//!
//! Folding itself cannot fail: unrecognized filenames are dropped and a
//! garbled log degrades to fewer known facts. Errors here cover only the
//! filesystem boundary — listing event directories and reading
//! declaration files.

/// Errors produced at the store boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("iteration directory unreadable: {path}: {source}")]
    DirUnreadable {
        path: String,
        source: std::io::Error,
    },

    #[error("declaration file {path} is not valid JSON: {source}")]
    MalformedDeclaration {
        path: String,
        source: serde_json::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
