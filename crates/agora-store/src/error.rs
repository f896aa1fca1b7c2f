use agora_shared::{ConflictKind, DomainError, Entity};
use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error other than a unique-constraint violation.
    #[error("Database error: {0}")]
    Sqlite(rusqlite::Error),

    /// A unique index rejected the write.
    #[error("Duplicate value: {0}")]
    Duplicate(ConflictKind),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested document does not exist.
    #[error("{0} not found")]
    NotFound(Entity),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref failure, Some(ref msg)) = err {
            if failure.code == rusqlite::ErrorCode::ConstraintViolation {
                if let Some(columns) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    return StoreError::Duplicate(conflict_for(columns));
                }
            }
        }
        StoreError::Sqlite(err)
    }
}

/// Map the column list of a SQLite unique violation to a conflict kind.
fn conflict_for(columns: &str) -> ConflictKind {
    match columns {
        "users.username" => ConflictKind::Username,
        "users.email" => ConflictKind::Email,
        "rooms.room_join_code" => ConflictKind::JoinCode,
        c if c.starts_with("room_members.") => ConflictKind::AlreadyMember,
        other => ConflictKind::Other(other.to_string()),
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity) => DomainError::NotFound(entity),
            StoreError::Duplicate(kind) => DomainError::Conflict(kind),
            other => DomainError::StoreUnavailable(other.to_string()),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_columns() {
        assert_eq!(conflict_for("users.username"), ConflictKind::Username);
        assert_eq!(conflict_for("users.email"), ConflictKind::Email);
        assert_eq!(conflict_for("rooms.room_join_code"), ConflictKind::JoinCode);
        assert_eq!(
            conflict_for("room_members.room_id, room_members.username"),
            ConflictKind::AlreadyMember
        );
    }

    #[test]
    fn test_domain_mapping() {
        assert!(matches!(
            DomainError::from(StoreError::NotFound(Entity::Room)),
            DomainError::NotFound(Entity::Room)
        ));
        assert!(matches!(
            DomainError::from(StoreError::Migration("boom".into())),
            DomainError::StoreUnavailable(_)
        ));
    }
}
