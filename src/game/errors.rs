use thiserror::Error;

/// Errors that can arise while interacting with the game store or its rules.
#[derive(Debug, Error)]
pub enum GameError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, seed files, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// The requester may not touch this record.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Submitted data failed a domain rule.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A unique name is already taken.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// A container or roster is at its limit.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Argon2 hashing failure.
    #[error("password hash error: {0}")]
    PasswordHash(String),

    /// Internal error (unexpected conditions)
    #[error("internal error: {0}")]
    Internal(String),
}

impl GameError {
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        GameError::NotFound(format!("{}: {}", what, id))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GameError::NotFound(_))
    }
}
