//! Error types for repository operations
//!
//! `RepositoryError` is what callers see. `StoreError` is what a store
//! collaborator reports; the repository wraps it into
//! [`RepositoryError::StoreFailure`] together with the operation name.

use thiserror::Error;

/// Errors that can occur during repository operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Missing tenant context: {0}")]
    MissingTenantContext(String),

    #[error("Missing user context: {0}")]
    MissingUserContext(String),

    #[error("Unknown property '{property}' on record '{record}'")]
    UnknownProperty { property: String, record: String },

    #[error("Type mismatch for '{property}': expected {expected}, got {found}")]
    TypeMismatch {
        property: String,
        expected: String,
        found: String,
    },

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Malformed filter document: {0}")]
    MalformedFilterDocument(String),

    #[error("Invalid page size: {0}")]
    InvalidPageSize(u32),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Store failure during {operation}: {source}")]
    StoreFailure {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl RepositoryError {
    pub fn missing_tenant(msg: impl Into<String>) -> Self {
        Self::MissingTenantContext(msg.into())
    }

    pub fn missing_user(msg: impl Into<String>) -> Self {
        Self::MissingUserContext(msg.into())
    }

    pub fn unknown_property(property: impl Into<String>, record: impl Into<String>) -> Self {
        Self::UnknownProperty {
            property: property.into(),
            record: record.into(),
        }
    }

    pub fn type_mismatch(
        property: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            property: property.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn unsupported_operator(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperator(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedFilterDocument(msg.into())
    }

    pub fn store(operation: &'static str, source: StoreError) -> Self {
        Self::StoreFailure { operation, source }
    }

    /// True for errors raised before any store I/O happened
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::StoreFailure { .. })
    }
}

/// Errors reported by a store session or transaction
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unsupported by this store: {0}")]
    Unsupported(String),

    #[error("Transaction already finished")]
    TransactionClosed,

    #[error("Store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
