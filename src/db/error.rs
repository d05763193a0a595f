//! Errors reported by database backends.

/// Why a write or read did not happen
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The statement ran but changed nothing while an affected-row check was requested.
    #[error("No rows were affected by the query")]
    NoRowsAffected,

    /// The backend ran out of memory, disk or size limits; smaller units of work may succeed.
    #[error("Resource limit exceeded: {0}")]
    ResourceExhausted(String),

    /// The statement itself failed.
    #[error("Query failed: {message}")]
    Query {
        /// Backend error message.
        message: String,
    },

    /// The backend could not be reached.
    #[error("Connection failed: {0}")]
    Connection(String),
}

impl DbError {
    pub fn query(message: impl Into<String>) -> Self {
        DbError::Query {
            message: message.into(),
        }
    }

    /// True when retrying row by row is worth a try
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, DbError::ResourceExhausted(_))
    }
}
