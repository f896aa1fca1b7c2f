use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse an id received from a caller.
            pub fn parse(s: &str) -> Result<Self, ValidationError> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| ValidationError::InvalidId(s.to_string()))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

uuid_id!(
    /// Primary key of a user document.
    UserId
);
uuid_id!(
    /// Primary key of a room document.
    RoomId
);
uuid_id!(
    /// Primary key of a message document.
    MessageId
);

/// The room reference stored on a message.
///
/// Messages keep the room id as free text; storage never enforces that it
/// points at a real room. Writes through [`RoomRef::from`] always produce the
/// canonical form. Listings join on the stored text directly; code holding a
/// single message uses [`RoomRef::resolve`] to get back a [`RoomId`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct RoomRef(String);

impl RoomRef {
    /// Wrap a raw stored value without validating it.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The referenced room id, if the stored text is a canonical room id.
    ///
    /// Only the lowercase hyphenated form resolves; that is the form room
    /// primary keys are stored in, so anything else can never join a room.
    pub fn resolve(&self) -> Option<RoomId> {
        Uuid::parse_str(&self.0)
            .ok()
            .filter(|id| id.to_string() == self.0)
            .map(RoomId)
    }
}

impl From<RoomId> for RoomRef {
    fn from(id: RoomId) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for RoomRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Locked,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Locked => "locked",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "active" => Some(UserStatus::Active),
            "locked" => Some(UserStatus::Locked),
            _ => None,
        }
    }
}

/// Admin lock/unlock action on an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAction {
    Lock,
    Unlock,
}

impl LockAction {
    pub fn target_status(self) -> UserStatus {
        match self {
            LockAction::Lock => UserStatus::Locked,
            LockAction::Unlock => UserStatus::Active,
        }
    }
}

impl FromStr for LockAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lock" => Ok(LockAction::Lock),
            "unlock" => Ok(LockAction::Unlock),
            other => Err(ValidationError::InvalidAction(other.to_string())),
        }
    }
}

/// A user's role in a room, derived at query time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    Owner,
    Member,
}
