use thiserror::Error;

/// Errors surfaced by the core. Nothing is retried or substituted;
/// callers decide whether to log and continue or abort.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Out-of-range physiological or statistical input.
    #[error("Value out of range: {0}")]
    Domain(String),

    /// A reason is missing from one of the generator tables.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A stored row does not match the store's schema.
    #[error("Malformed row {row}: {reason}")]
    Format { row: usize, reason: String },

    #[error("Row index {index} out of range for store of {len} rows")]
    Index { index: usize, len: usize },

    /// External randomness or random-number service failure.
    #[error("Randomness source failed: {0}")]
    Source(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl CoreError {
    pub(crate) fn format(row: usize, reason: impl Into<String>) -> Self {
        CoreError::Format {
            row,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_error_mentions_bounds() {
        let err = CoreError::Index { index: 5, len: 3 };
        assert_eq!(
            err.to_string(),
            "Row index 5 out of range for store of 3 rows"
        );
    }

    #[test]
    fn format_error_carries_row_number() {
        let err = CoreError::format(7, "expected 4 columns, found 3");
        assert!(err.to_string().contains("row 7"));
        assert!(err.to_string().contains("expected 4 columns"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CoreError = io.into();
        assert!(matches!(err, CoreError::Io(_)));
    }
}
