//! Error types for the ORM core
//!
//! Schema and query errors are raised before any statement reaches a
//! backend; constraint violations and backend failures are raised by the
//! backend at execution time and propagate unchanged.

use std::fmt;

/// Result type alias for ORM operations
pub type OrmResult<T> = Result<T, OrmError>;

/// The kind of integrity constraint a backend reported as violated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Uniqueness constraint (including primary keys)
    Unique,
    /// Foreign key constraint
    ForeignKey,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintKind::Unique => write!(f, "unique"),
            ConstraintKind::ForeignKey => write!(f, "foreign key"),
        }
    }
}

/// Error types for ORM operations
#[derive(Debug, Clone)]
pub enum OrmError {
    /// Schema registration or validation failed
    Schema(String),
    /// Query or mutation descriptor failed build-time validation
    Query(String),
    /// The backend rejected a statement because it violates an integrity constraint
    ConstraintViolation {
        /// Name of the violated constraint
        constraint: String,
        /// Whether a unique or a foreign key constraint was violated
        kind: ConstraintKind,
        /// Backend-provided detail, where available
        detail: String,
    },
    /// No row matched where exactly one was required
    NotFound(String),
    /// Value serialization or row decoding failed
    Serialization(String),
    /// Opaque backend failure (connectivity, syntax, type errors)
    Backend(String),
}

impl fmt::Display for OrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrmError::Schema(msg) => write!(f, "Schema error: {}", msg),
            OrmError::Query(msg) => write!(f, "Query error: {}", msg),
            OrmError::ConstraintViolation {
                constraint,
                kind,
                detail,
            } => write!(
                f,
                "Constraint violation: {} constraint '{}' ({})",
                kind, constraint, detail
            ),
            OrmError::NotFound(entity) => write!(f, "Record not found in '{}'", entity),
            OrmError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            OrmError::Backend(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for OrmError {}

// Convert from sqlx errors, keeping constraint violations structured.
// PostgreSQL reports unique violations as 23505 and foreign key
// violations as 23503.
impl From<sqlx::Error> for OrmError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(code) = db_err.code() {
                let kind = match code.as_ref() {
                    "23505" => Some(ConstraintKind::Unique),
                    "23503" => Some(ConstraintKind::ForeignKey),
                    _ => None,
                };
                if let Some(kind) = kind {
                    return OrmError::ConstraintViolation {
                        constraint: db_err.constraint().unwrap_or_default().to_string(),
                        kind,
                        detail: db_err.message().to_string(),
                    };
                }
            }
        }
        OrmError::Backend(err.to_string())
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        OrmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_violation_display_names_constraint() {
        let err = OrmError::ConstraintViolation {
            constraint: "users_email_key".to_string(),
            kind: ConstraintKind::Unique,
            detail: "duplicate key value".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("users_email_key"));
        assert!(rendered.contains("unique"));
    }
}
