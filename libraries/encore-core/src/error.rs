/// Core error types for Encore
use thiserror::Error;

/// Result type alias using `EncoreError`
pub type Result<T> = std::result::Result<T, EncoreError>;

/// Core error type for Encore
#[derive(Error, Debug)]
pub enum EncoreError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Entity not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The remote collaborator requires credentials we do not have
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Remote endpoint answered with a non-success status
    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Remote endpoint could not be reached (connect failure, DNS, reset)
    #[error("Remote unreachable: {0}")]
    Unreachable(String),

    /// A bounded wait elapsed
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Remote asked us to slow down
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// Device is offline; operation was not attempted
    #[error("Offline")]
    Offline,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A control message failed validation at the boundary
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// Database errors (for storage implementations)
    #[error("Database error: {0}")]
    Database(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl EncoreError {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an invalid message error
    pub fn invalid_message(msg: impl Into<String>) -> Self {
        Self::InvalidMessage(msg.into())
    }

    /// Whether retrying later may succeed.
    ///
    /// Network failures, timeouts, 5xx responses and rate limiting are
    /// transient. Auth, validation and 4xx errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unreachable(_) | Self::Timeout(_) | Self::RateLimited { .. } | Self::Offline => {
                true
            }
            Self::Remote { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(feature = "sqlx-support")]
impl From<sqlx::Error> for EncoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = EncoreError::Remote {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn client_errors_are_permanent() {
        let err = EncoreError::Remote {
            status: 404,
            message: "missing".into(),
        };
        assert!(!err.is_transient());
        assert!(!EncoreError::NotAuthenticated.is_transient());
        assert!(!EncoreError::invalid_input("bad").is_transient());
    }

    #[test]
    fn network_failures_are_transient() {
        assert!(EncoreError::Unreachable("refused".into()).is_transient());
        assert!(EncoreError::Timeout("30s".into()).is_transient());
        assert!(EncoreError::RateLimited { retry_after_secs: 5 }.is_transient());
    }
}
