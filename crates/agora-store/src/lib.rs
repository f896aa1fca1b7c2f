//! # agora-store
//!
//! SQLite persistence for Agora.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for the `users`,
//! `rooms`, `messages`, `settings` and `stats` collections, plus the
//! search / sort / paginate queries behind the admin listings.

pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod query;
pub mod rooms;
pub mod settings;
pub mod users;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use query::{
    ListQuery, MessageSort, MessageSummary, Page, RoomMembership, RoomSort, RoomSummary,
    SortField, SortOrder, UserSort, UserSummary,
};
pub use rooms::{AddMember, BanOutcome};
