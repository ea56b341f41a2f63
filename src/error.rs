//! Error types for the partnership ledger.
//!
//! Validation and login failures carry the exact message shown to the
//! partner; storage failures wrap the backend error in string form so the
//! controller stays backend-agnostic.

use thiserror::Error;

/// Type alias for Result using the ledger error type.
pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Login(#[from] LoginError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV export failed: {0}")]
    Csv(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to copy: {0}")]
    Clipboard(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        LedgerError::Validation(msg.into())
    }

    /// Validation and login errors are reported inline and never affect state.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, LedgerError::Validation(_) | LedgerError::Login(_))
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

impl From<csv::Error> for LedgerError {
    fn from(err: csv::Error) -> Self {
        LedgerError::Csv(err.to_string())
    }
}

/// Failures of the login gate, with the message shown on the login screen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    #[error("Please select your name")]
    MissingSelection,

    #[error("Please enter your password")]
    MissingPassword,

    #[error("Incorrect password. Please try again.")]
    IncorrectPassword,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_messages() {
        assert_eq!(LoginError::MissingSelection.to_string(), "Please select your name");
        assert_eq!(
            LoginError::IncorrectPassword.to_string(),
            "Incorrect password. Please try again."
        );
    }

    #[test]
    fn test_user_facing_classification() {
        assert!(LedgerError::validation("bad").is_user_facing());
        assert!(LedgerError::from(LoginError::MissingPassword).is_user_facing());
        assert!(!LedgerError::Storage("disk".into()).is_user_facing());
    }
}
