use crate::fields::Field;
use thiserror::Error;

/// A mandatory field that no dataset column satisfied.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingField {
    pub field: Field,
    /// Column labels that were tried, in priority order
    pub searched: Vec<String>,
    /// Closest dataset column, if any looked similar enough
    pub suggestion: Option<String>,
}

impl std::fmt::Display for MissingField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (looked for: {})", self.field, self.searched.join(", "))?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, "; closest column is '{}'", suggestion)?;
        }
        Ok(())
    }
}

fn describe_missing(missing: &[MissingField]) -> String {
    missing
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum CardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Mandatory columns not found in dataset: {}", describe_missing(.0))]
    MissingColumns(Vec<MissingField>),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl CardError {
    /// Whether the error only affects the current query.
    ///
    /// Everything else (configuration, dataset and I/O failures) ends the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CardError::InvalidInput(_))
    }
}

impl From<polars::error::PolarsError> for CardError {
    fn from(err: polars::error::PolarsError) -> Self {
        CardError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message_names_fields() {
        let err = CardError::MissingColumns(vec![
            MissingField {
                field: Field::Identifier,
                searched: vec!["COD_FUNCIONARIO".to_string(), "RE".to_string()],
                suggestion: Some("Re".to_string()),
            },
            MissingField {
                field: Field::Name,
                searched: vec!["NOME".to_string()],
                suggestion: None,
            },
        ]);

        let message = err.to_string();
        assert!(message.contains("IDENTIFIER (looked for: COD_FUNCIONARIO, RE)"));
        assert!(message.contains("closest column is 'Re'"));
        assert!(message.contains("NAME (looked for: NOME)"));
    }

    #[test]
    fn test_only_input_errors_are_recoverable() {
        assert!(CardError::InvalidInput("bad date".to_string()).is_recoverable());
        assert!(!CardError::Config("no dataset".to_string()).is_recoverable());
        assert!(!CardError::MissingColumns(vec![]).is_recoverable());
        assert!(!CardError::Dataset("ragged".to_string()).is_recoverable());
    }
}
