//! Typed error hierarchy for the workshop backend.
//!
//! `WorkshopError` is produced by the database layer and carried unchanged
//! through the worker capabilities and the HTTP handlers, where it is mapped
//! onto a status code by its [`ErrorKind`].

use rusqlite::ErrorCode;
use thiserror::Error;

pub type Result<T, E = WorkshopError> = std::result::Result<T, E>;

/// Coarse classification used by the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Forbidden,
    Persistence,
}

#[derive(Debug, Error)]
pub enum WorkshopError {
    /// Bad input shape, missing field, or a uniqueness rule the caller broke.
    #[error("{0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A delete or write blocked by a live reference.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{context}: {source}")]
    Persistence {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WorkshopError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Persistence { .. } | Self::LockPoisoned | Self::Other(_) => {
                ErrorKind::Persistence
            }
        }
    }

    /// True when the underlying SQLite failure is a UNIQUE or PRIMARY KEY violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Persistence { source, .. } => is_unique_violation(source),
            _ => false,
        }
    }
}

/// Attach a human-readable context to a `rusqlite` result, turning it into a
/// [`WorkshopError::Persistence`].
pub trait DbContext<T> {
    fn db_context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> DbContext<T> for std::result::Result<T, rusqlite::Error> {
    fn db_context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|source| WorkshopError::Persistence {
            context: context.into(),
            source,
        })
    }
}

pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

pub fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraint_error(extended_code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: ErrorCode::ConstraintViolation,
                extended_code,
            },
            Some("constraint failed".to_string()),
        )
    }

    #[test]
    fn not_found_carries_entity_and_id() {
        let err = WorkshopError::not_found("order", 42);
        match &err {
            WorkshopError::NotFound { entity, id } => {
                assert_eq!(*entity, "order");
                assert_eq!(id, "42");
            }
            _ => panic!("Expected NotFound"),
        }
        assert_eq!(err.to_string(), "order 42 not found");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn kinds_are_distinct() {
        assert_eq!(WorkshopError::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(WorkshopError::conflict("x").kind(), ErrorKind::Conflict);
        assert_eq!(WorkshopError::forbidden("x").kind(), ErrorKind::Forbidden);
        assert_eq!(WorkshopError::LockPoisoned.kind(), ErrorKind::Persistence);
        let other: WorkshopError = anyhow::anyhow!("boom").into();
        assert_eq!(other.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn db_context_wraps_rusqlite_errors() {
        let res: std::result::Result<(), rusqlite::Error> =
            Err(rusqlite::Error::QueryReturnedNoRows);
        let err = res.db_context("Failed to load style").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(err.to_string().starts_with("Failed to load style"));
        assert!(!err.is_unique_violation());
    }

    #[test]
    fn unique_and_foreign_key_violations_are_detected() {
        let unique = constraint_error(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE);
        assert!(is_unique_violation(&unique));
        assert!(!is_foreign_key_violation(&unique));

        let pk = constraint_error(rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY);
        assert!(is_unique_violation(&pk));

        let fk = constraint_error(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY);
        assert!(is_foreign_key_violation(&fk));
        assert!(!is_unique_violation(&fk));
    }

    #[test]
    fn workshop_error_implements_std_error() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&WorkshopError::LockPoisoned);
    }
}
