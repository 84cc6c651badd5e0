use super::error::RowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Not a number, or no such row.
    #[error("missing or invalid foreign key {column}={value}")]
    Unresolved { column: &'static str, value: String },
    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

impl From<ResolveError> for RowError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::Unresolved { column, value } => RowError::ForeignKey { column, value },
            ResolveError::Store(e) => RowError::Store(e),
        }
    }
}

/// Parses `raw` as an identity and looks it up with the supplied finder.
pub fn resolve<T, F>(raw: &str, column: &'static str, lookup: F) -> Result<T, ResolveError>
where
    F: FnOnce(i64) -> rusqlite::Result<Option<T>>,
{
    let raw = raw.trim();
    let unresolved = || ResolveError::Unresolved {
        column,
        value: raw.to_string(),
    };
    let id: i64 = raw.parse().map_err(|_| unresolved())?;
    lookup(id)?.ok_or_else(unresolved)
}
