//! # agora-shared
//!
//! Types shared by every Agora crate: typed identifiers, the domain error
//! taxonomy, field validation, and the authentication contracts together
//! with their default implementations.

pub mod auth;
pub mod constants;
pub mod error;
pub mod password;
pub mod session;
pub mod types;
pub mod validation;

pub use error::{
    AuthError, ConflictKind, DomainError, Entity, ForbiddenKind, Result, ValidationError,
};
pub use types::{LockAction, MembershipRole, MessageId, RoomId, RoomRef, UserId, UserStatus};
