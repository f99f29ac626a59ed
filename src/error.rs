use thiserror::Error;

/// Main error type for relfinder
#[derive(Error, Debug)]
pub enum RelfinderError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Relation store schema is incomplete
    #[error("Schema error: {0}")]
    Schema(String),

    /// Relation store could not be reached or a search step failed
    #[error("Search error: {0}")]
    Search(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using RelfinderError
pub type Result<T> = std::result::Result<T, RelfinderError>;
