//! v001 -- Initial schema creation.
//!
//! The four logical collections (`users`, `rooms`, `messages` and the
//! `settings` / `stats` singletons).  A room's `members[]` and `banned[]`
//! sets live in `room_members` / `room_banned` so that joins and leaves are
//! single-row set operations instead of whole-array rewrites.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id              TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    username        TEXT NOT NULL UNIQUE,
    email           TEXT NOT NULL UNIQUE,         -- normalized
    password        TEXT NOT NULL,                -- PHC hash string
    profile_picture TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'active',
    created_at      TEXT NOT NULL,                -- RFC-3339, microseconds, UTC
    last_login      TEXT NOT NULL,
    role            TEXT NOT NULL DEFAULT 'user',
    is_admin        INTEGER NOT NULL DEFAULT 0,   -- boolean 0/1
    ai_room         TEXT                          -- companion AI room id
);

-- ----------------------------------------------------------------
-- Rooms
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS rooms (
    id             TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    room_name      TEXT NOT NULL,
    room_picture   TEXT,
    room_join_code TEXT UNIQUE,                   -- NULL for AI rooms
    created_at     TEXT NOT NULL,
    modified_at    TEXT NOT NULL,
    owner          TEXT NOT NULL,                 -- username
    is_ai          INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_rooms_owner ON rooms(owner);

CREATE TABLE IF NOT EXISTS room_members (
    room_id   TEXT NOT NULL,
    username  TEXT NOT NULL,
    joined_at TEXT NOT NULL,

    PRIMARY KEY (room_id, username),
    FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_room_members_username ON room_members(username);

CREATE TABLE IF NOT EXISTS room_banned (
    room_id   TEXT NOT NULL,
    username  TEXT NOT NULL,
    banned_at TEXT NOT NULL,

    PRIMARY KEY (room_id, username),
    FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_room_banned_username ON room_banned(username);

-- ----------------------------------------------------------------
-- Messages (room_id is a plain string reference, no FK)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id        TEXT PRIMARY KEY NOT NULL,          -- UUID v4
    room_id   TEXT NOT NULL,
    pfp       TEXT,
    user      TEXT,                               -- NULL for system messages
    message   TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_room_ts ON messages(room_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_messages_user ON messages(user);

-- ----------------------------------------------------------------
-- Singletons
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS settings (
    id               INTEGER PRIMARY KEY CHECK (id = 1),
    system_message   TEXT,
    db_uri           TEXT NOT NULL,
    db_name          TEXT NOT NULL,
    register_feature INTEGER NOT NULL DEFAULT 1,
    ai_feature       INTEGER NOT NULL DEFAULT 1,
    secret_key       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS stats (
    id                    INTEGER PRIMARY KEY CHECK (id = 1),
    temperature           REAL NOT NULL DEFAULT 0.7,
    max_tokens            INTEGER NOT NULL DEFAULT 1024,
    total_requests        INTEGER NOT NULL DEFAULT 0,
    total_ai_responses    INTEGER NOT NULL DEFAULT 0,
    average_response_time REAL NOT NULL DEFAULT 0,
    ai_response_rate      REAL NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO stats (id) VALUES (1);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
