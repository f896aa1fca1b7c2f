use std::fmt;

use thiserror::Error;

/// Caller-facing error taxonomy shared by every layer above the store.
///
/// All variants are recoverable domain errors; none of them should take the
/// process down.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("{0} not found")]
    NotFound(Entity),

    #[error("Conflict: {0}")]
    Conflict(#[from] ConflictKind),

    #[error("Forbidden: {0}")]
    Forbidden(#[from] ForbiddenKind),

    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("Authentication failed: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Convenience alias used by the service layer.
pub type Result<T> = std::result::Result<T, DomainError>;

/// The kind of record a [`DomainError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Room,
    Message,
    Config,
    Stats,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::User => "User",
            Entity::Room => "Room",
            Entity::Message => "Message",
            Entity::Config => "Config",
            Entity::Stats => "Stats",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    #[error("username already exists")]
    Username,

    #[error("email already in use")]
    Email,

    #[error("join code already in use")]
    JoinCode,

    #[error("user is already a member of this room")]
    AlreadyMember,

    #[error("duplicate value for {0}")]
    Other(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForbiddenKind {
    #[error("administrator privileges required")]
    NotAdmin,

    #[error("you are not the owner of this room")]
    NotOwner,

    #[error("user is not a member of this room")]
    NotMember,

    #[error("user is banned from this room")]
    Banned,

    #[error("you cannot leave the room you own")]
    CannotLeaveOwned,

    #[error("the room owner cannot be banned")]
    CannotBanOwner,

    #[error("administrator accounts cannot be modified this way")]
    ProtectedAccount,

    #[error("AI rooms cannot be deleted")]
    ProtectedRoom,

    #[error("your account is locked")]
    AccountLocked,

    #[error("registration is currently disabled by an admin")]
    RegistrationDisabled,

    #[error("the AI assistant is currently disabled by an admin")]
    AiDisabled,

    #[error("no access to this AI room")]
    NoAiAccess,
}

/// Field-level validation failures. Raised at the narrowest point and never
/// wrapped in anything but [`DomainError::InvalidInput`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("username must be 3-16 characters of lowercase letters, numbers and underscores")]
    InvalidUsername,

    #[error("username is reserved")]
    ReservedUsername,

    #[error("invalid email")]
    InvalidEmail,

    #[error("weak password")]
    WeakPassword,

    #[error("new password and confirm password don't match")]
    PasswordMismatch,

    #[error("room name must be {min}-{max} characters long")]
    RoomNameLength { min: usize, max: usize },

    #[error("room name is reserved")]
    ReservedRoomName,

    #[error("join code must be 4-16 letters or digits")]
    InvalidJoinCode,

    #[error("invalid room picture URL")]
    InvalidUrl,

    #[error("message must be 1-{max} characters long")]
    MessageLength { max: usize },

    #[error("invalid temperature value {0} (expected 0-1.5)")]
    TemperatureOutOfRange(f64),

    #[error("invalid max_tokens value {0} (expected 128-4096)")]
    MaxTokensOutOfRange(u32),

    #[error("invalid sort field: {0}")]
    InvalidSortField(String),

    #[error("invalid sort order: {0}")]
    InvalidSortOrder(String),

    #[error("page limit must be between 1 and {max}")]
    InvalidPageLimit { max: u32 },

    #[error("invalid action '{0}', use 'lock' or 'unlock'")]
    InvalidAction(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("password mismatch")]
    Mismatch,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    Expired,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("token signing failed: {0}")]
    Signing(String),
}
