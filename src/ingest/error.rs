use thiserror::Error;

/// Structural failure: the upload is refused before any row is processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejected {
    #[error("Empty file")]
    EmptyFile,
    #[error("Missing header row")]
    MissingHeader,
    #[error("Missing column: {0}")]
    MissingColumn(String),
}

/// Why a single row could not be stored. The `Display` text is what follows
/// `Row {n}: ` in the error list.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("missing or invalid foreign key {column}={value}")]
    ForeignKey { column: &'static str, value: String },
    #[error("{column} must not be empty")]
    Empty { column: &'static str },
    #[error("invalid {kind} for {column}: {value:?}")]
    Conversion {
        column: &'static str,
        kind: &'static str,
        value: String,
    },
    #[error("{0}")]
    Store(#[from] rusqlite::Error),
}
