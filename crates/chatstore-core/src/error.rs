//! Errors surfaced by the query layer.
//!
//! Every store failure is re-signalled as one of two kinds. The low-level
//! cause is logged where it is caught and never carried in the message.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    /// Default kind for any unexpected store failure.
    #[error("{0}")]
    BadRequest(String),
    /// An explicitly referenced record does not exist.
    #[error("{0}")]
    NotFound(String),
}

impl DbError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        DbError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        DbError::NotFound(message.into())
    }

    /// Machine-readable `<type>:<surface>` code.
    pub fn code(&self) -> &'static str {
        match self {
            DbError::BadRequest(_) => "bad_request:database",
            DbError::NotFound(_) => "not_found:database",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            DbError::BadRequest(m) | DbError::NotFound(m) => m,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(DbError::bad_request("x").code(), "bad_request:database");
        assert_eq!(DbError::not_found("x").code(), "not_found:database");
    }

    #[test]
    fn test_display_is_message_only() {
        let err = DbError::not_found("Chat with id abc not found");
        assert_eq!(err.to_string(), "Chat with id abc not found");
        assert!(err.is_not_found());
    }
}
