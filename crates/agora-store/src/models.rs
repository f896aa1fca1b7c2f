//! Documents persisted in the SQLite store.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer as JSON.

use agora_shared::{MessageId, RoomId, RoomRef, UserId, UserStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    /// Unique, immutable after registration.
    pub username: String,
    /// Unique, normalized.
    pub email: String,
    /// PHC-format password hash.  Never serialized.
    #[serde(skip_serializing, default)]
    pub password: String,
    pub profile_picture: String,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
    pub role: String,
    pub is_admin: bool,
    /// The private AI room created at registration.
    pub ai_room: Option<RoomId>,
}

impl User {
    pub fn is_locked(&self) -> bool {
        self.status == UserStatus::Locked
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// A chat room together with its member and ban sets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Room {
    pub id: RoomId,
    pub room_name: String,
    pub room_picture: Option<String>,
    /// `None` for AI rooms.
    pub room_join_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Username of the owner.
    pub owner: String,
    /// Usernames in join order.
    pub members: Vec<String>,
    pub banned: Vec<String>,
    pub is_ai: bool,
}

impl Room {
    pub fn has_member(&self, username: &str) -> bool {
        self.members.iter().any(|m| m == username)
    }

    pub fn is_banned(&self, username: &str) -> bool {
        self.banned.iter().any(|b| b == username)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    /// Free-text room reference.  Not enforced by storage.
    pub room_id: RoomRef,
    /// Sender's profile picture at send time.
    pub pfp: Option<String>,
    /// Sender username; `None` for system messages.
    pub user: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Settings singletons
// ---------------------------------------------------------------------------

/// Global configuration singleton.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Broadcast banner shown to every client.
    pub system_message: Option<String>,
    pub db_uri: String,
    pub db_name: String,
    pub register_feature: bool,
    pub ai_feature: bool,
    pub secret_key: String,
}

/// Partial update of [`Config`].  Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigPatch {
    #[serde(default)]
    pub system_message: Option<String>,
    #[serde(default)]
    pub db_uri: Option<String>,
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default)]
    pub register_feature: Option<bool>,
    #[serde(default)]
    pub ai_feature: Option<bool>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// AI tuning knobs and usage counters singleton.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stats {
    pub temperature: f64,
    pub max_tokens: u32,
    pub total_requests: u64,
    pub total_ai_responses: u64,
    /// Running mean of response times, in seconds.
    pub average_response_time: f64,
    /// `total_ai_responses / total_requests` as a percentage.
    pub ai_response_rate: f64,
}
