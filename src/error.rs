use thiserror::Error;

/// Domain error taxonomy. Every public operation recovers at this boundary;
/// callers get a machine-readable kind plus a human message.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad input shape: non-positive amount, unknown category, empty title.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Role or jurisdiction mismatch for the attempted operation.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Operation conflicts with current state (double distribution,
    /// payment exceeding the remaining balance).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Referenced record does not exist (or is outside the caller's scope).
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage-layer failure; the surrounding transaction has rolled back.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable kind string for API-layer mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::Authorization(_) => "authorization_error",
            Error::Conflict(_) => "conflict_error",
            Error::NotFound(_) => "not_found_error",
            Error::Storage(_) => "storage_error",
            Error::Serialize(_) => "serialization_error",
            Error::Io(_) => "io_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(Error::Validation("x".into()).kind(), "validation_error");
        assert_eq!(Error::Conflict("x".into()).kind(), "conflict_error");
        assert_eq!(
            Error::NotFound("bill 9".into()).to_string(),
            "not found: bill 9"
        );
    }
}
