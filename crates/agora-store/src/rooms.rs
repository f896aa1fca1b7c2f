//! Room documents and their member / ban sets.
//!
//! Membership edits are single statements against `room_members` and
//! `room_banned`, so two concurrent joins or leaves can never overwrite each
//! other's result.

use agora_shared::{Entity, RoomId};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::database::{ts_from_sql, ts_to_sql, uuid_from_sql, Database};
use crate::error::{Result, StoreError};
use crate::models::Room;

const ROOM_COLUMNS: &str =
    "id, room_name, room_picture, room_join_code, created_at, modified_at, owner, is_ai";

/// Outcome of [`Database::add_member`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddMember {
    Added,
    AlreadyMember,
    Banned,
    RoomNotFound,
}

/// Outcome of [`Database::ban_member`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanOutcome {
    Banned,
    /// The username was already on the ban list; nothing changed.
    AlreadyBanned,
}

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a room and its initial member set.
    pub fn insert_room(&mut self, room: &Room) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        Self::insert_room_tx(&tx, room)?;
        tx.commit()?;
        Ok(())
    }

    pub(crate) fn insert_room_tx(conn: &Connection, room: &Room) -> Result<()> {
        conn.execute(
            "INSERT INTO rooms (id, room_name, room_picture, room_join_code,
                                created_at, modified_at, owner, is_ai)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                room.id.to_string(),
                room.room_name,
                room.room_picture,
                room.room_join_code,
                ts_to_sql(&room.created_at),
                ts_to_sql(&room.modified_at),
                room.owner,
                room.is_ai,
            ],
        )?;

        let joined_at = ts_to_sql(&room.created_at);
        let mut stmt = conn.prepare(
            "INSERT OR IGNORE INTO room_members (room_id, username, joined_at)
             VALUES (?1, ?2, ?3)",
        )?;
        for member in &room.members {
            stmt.execute(params![room.id.to_string(), member, joined_at])?;
        }

        let mut stmt = conn.prepare(
            "INSERT OR IGNORE INTO room_banned (room_id, username, banned_at)
             VALUES (?1, ?2, ?3)",
        )?;
        for banned in &room.banned {
            stmt.execute(params![room.id.to_string(), banned, joined_at])?;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a room with its members (in join order) and ban list.
    pub fn get_room(&self, id: RoomId) -> Result<Room> {
        let room = self
            .conn()
            .query_row(
                &format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?1"),
                params![id.to_string()],
                row_to_room,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(Entity::Room),
                other => StoreError::from(other),
            })?;
        self.with_sets(room)
    }

    /// Look a room up by its join code.  AI rooms have no code and never match.
    pub fn find_room_by_join_code(&self, code: &str) -> Result<Option<Room>> {
        let room = self
            .conn()
            .query_row(
                &format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE room_join_code = ?1"),
                params![code],
                row_to_room,
            )
            .optional()?;
        room.map(|r| self.with_sets(r)).transpose()
    }

    /// Every room the username is currently a member of, oldest first.
    pub fn rooms_for_member(&self, username: &str) -> Result<Vec<Room>> {
        let rooms = self.query_rooms(
            "SELECT r.id, r.room_name, r.room_picture, r.room_join_code,
                    r.created_at, r.modified_at, r.owner, r.is_ai
             FROM rooms r
             JOIN room_members m ON m.room_id = r.id
             WHERE m.username = ?1
             ORDER BY r.created_at ASC, r.id ASC",
            username,
        )?;
        rooms.into_iter().map(|r| self.with_sets(r)).collect()
    }

    /// Ids of every room owned by the username.
    pub fn rooms_owned_by(&self, username: &str) -> Result<Vec<RoomId>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id FROM rooms WHERE owner = ?1 ORDER BY created_at ASC")?;
        let rows = stmt.query_map(params![username], |row| {
            let id: String = row.get(0)?;
            uuid_from_sql(0, &id).map(RoomId)
        })?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn query_rooms(&self, sql: &str, username: &str) -> Result<Vec<Room>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params![username], row_to_room)?;

        let mut rooms = Vec::new();
        for row in rows {
            rooms.push(row?);
        }
        Ok(rooms)
    }

    fn with_sets(&self, mut room: Room) -> Result<Room> {
        room.members = self.usernames(
            "SELECT username FROM room_members WHERE room_id = ?1 ORDER BY joined_at, rowid",
            room.id,
        )?;
        room.banned = self.usernames(
            "SELECT username FROM room_banned WHERE room_id = ?1 ORDER BY banned_at, rowid",
            room.id,
        )?;
        Ok(room)
    }

    fn usernames(&self, sql: &str, room_id: RoomId) -> Result<Vec<String>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params![room_id.to_string()], |row| row.get(0))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    pub fn rename_room(&self, id: RoomId, name: &str, at: DateTime<Utc>) -> Result<()> {
        self.update_room_column(id, "room_name", name, at)
    }

    pub fn set_room_picture(&self, id: RoomId, picture: &str, at: DateTime<Utc>) -> Result<()> {
        self.update_room_column(id, "room_picture", picture, at)
    }

    fn update_room_column(
        &self,
        id: RoomId,
        column: &'static str,
        value: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let affected = self.conn().execute(
            &format!("UPDATE rooms SET {column} = ?2, modified_at = ?3 WHERE id = ?1"),
            params![id.to_string(), value, ts_to_sql(&at)],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(Entity::Room));
        }
        Ok(())
    }

    /// Add a username to a room's member set.
    ///
    /// The insert itself refuses banned users and missing rooms, so a ban
    /// racing with a join can never leave the user in both sets.
    pub fn add_member(&self, room_id: RoomId, username: &str, at: DateTime<Utc>) -> Result<AddMember> {
        let id = room_id.to_string();
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO room_members (room_id, username, joined_at)
             SELECT ?1, ?2, ?3
             WHERE EXISTS (SELECT 1 FROM rooms WHERE id = ?1)
               AND NOT EXISTS (SELECT 1 FROM room_banned WHERE room_id = ?1 AND username = ?2)",
            params![id, username, ts_to_sql(&at)],
        )?;
        if inserted > 0 {
            return Ok(AddMember::Added);
        }

        if self.set_contains("room_members", room_id, username)? {
            Ok(AddMember::AlreadyMember)
        } else if self.set_contains("room_banned", room_id, username)? {
            Ok(AddMember::Banned)
        } else {
            Ok(AddMember::RoomNotFound)
        }
    }

    /// Remove a username from a room's member set.  Returns `true` if it was
    /// a member.
    pub fn remove_member(&self, room_id: RoomId, username: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM room_members WHERE room_id = ?1 AND username = ?2",
            params![room_id.to_string(), username],
        )?;
        Ok(affected > 0)
    }

    /// Move a username from the member set to the ban set atomically.
    pub fn ban_member(&mut self, room_id: RoomId, username: &str, at: DateTime<Utc>) -> Result<BanOutcome> {
        let id = room_id.to_string();
        let tx = self.conn_mut().transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM rooms WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StoreError::NotFound(Entity::Room));
        }

        tx.execute(
            "DELETE FROM room_members WHERE room_id = ?1 AND username = ?2",
            params![id, username],
        )?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO room_banned (room_id, username, banned_at)
             VALUES (?1, ?2, ?3)",
            params![id, username, ts_to_sql(&at)],
        )?;

        tx.commit()?;
        Ok(if inserted > 0 {
            BanOutcome::Banned
        } else {
            BanOutcome::AlreadyBanned
        })
    }

    /// Remove a username from every room's member and ban sets.
    /// Returns the number of rows removed.
    pub fn pull_username_everywhere(&mut self, username: &str) -> Result<usize> {
        let tx = self.conn_mut().transaction()?;
        let members = tx.execute("DELETE FROM room_members WHERE username = ?1", params![username])?;
        let bans = tx.execute("DELETE FROM room_banned WHERE username = ?1", params![username])?;
        tx.commit()?;
        Ok(members + bans)
    }

    fn set_contains(&self, table: &'static str, room_id: RoomId, username: &str) -> Result<bool> {
        let found: bool = self.conn().query_row(
            &format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE room_id = ?1 AND username = ?2)"),
            params![room_id.to_string(), username],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete the room document.  Member and ban rows go with it.
    /// Returns `true` if a row was deleted.
    pub fn delete_room_document(&self, id: RoomId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM rooms WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a row selected with [`ROOM_COLUMNS`] to a [`Room`] with empty sets.
fn row_to_room(row: &rusqlite::Row<'_>) -> rusqlite::Result<Room> {
    let id_str: String = row.get(0)?;
    let created_str: String = row.get(4)?;
    let modified_str: String = row.get(5)?;

    Ok(Room {
        id: RoomId(uuid_from_sql(0, &id_str)?),
        room_name: row.get(1)?,
        room_picture: row.get(2)?,
        room_join_code: row.get(3)?,
        created_at: ts_from_sql(4, &created_str)?,
        modified_at: ts_from_sql(5, &modified_str)?,
        owner: row.get(6)?,
        members: Vec::new(),
        banned: Vec::new(),
        is_ai: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_room, temp_db};
    use agora_shared::ConflictKind;

    #[test]
    fn test_insert_and_lookup_by_code() {
        let (_dir, mut db) = temp_db();
        let room = sample_room("general", "alice", "ABCD1234");
        db.insert_room(&room).unwrap();

        let found = db.find_room_by_join_code("ABCD1234").unwrap().unwrap();
        assert_eq!(found.id, room.id);
        assert_eq!(found.members, vec!["alice".to_string()]);
        assert!(db.find_room_by_join_code("NOPE0000").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_join_code_is_conflict() {
        let (_dir, mut db) = temp_db();
        db.insert_room(&sample_room("one", "alice", "SAMECODE")).unwrap();
        let err = db
            .insert_room(&sample_room("two", "bob", "SAMECODE"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(ConflictKind::JoinCode)));
    }

    #[test]
    fn test_add_member_outcomes() {
        let (_dir, mut db) = temp_db();
        let room = sample_room("general", "alice", "ABCD1234");
        db.insert_room(&room).unwrap();
        let now = Utc::now();

        assert_eq!(db.add_member(room.id, "bob", now).unwrap(), AddMember::Added);
        assert_eq!(db.add_member(room.id, "bob", now).unwrap(), AddMember::AlreadyMember);
        assert_eq!(
            db.add_member(RoomId::new(), "bob", now).unwrap(),
            AddMember::RoomNotFound
        );

        db.ban_member(room.id, "carol", now).unwrap();
        assert_eq!(db.add_member(room.id, "carol", now).unwrap(), AddMember::Banned);

        let room = db.get_room(room.id).unwrap();
        assert_eq!(room.members, vec!["alice".to_string(), "bob".to_string()]);
        assert_eq!(room.banned, vec!["carol".to_string()]);
    }

    #[test]
    fn test_ban_moves_member_to_banned() {
        let (_dir, mut db) = temp_db();
        let room = sample_room("general", "alice", "ABCD1234");
        db.insert_room(&room).unwrap();
        let now = Utc::now();
        db.add_member(room.id, "bob", now).unwrap();

        assert_eq!(db.ban_member(room.id, "bob", now).unwrap(), BanOutcome::Banned);
        assert_eq!(db.ban_member(room.id, "bob", now).unwrap(), BanOutcome::AlreadyBanned);

        let room = db.get_room(room.id).unwrap();
        assert!(!room.has_member("bob"));
        assert!(room.is_banned("bob"));

        assert!(matches!(
            db.ban_member(RoomId::new(), "bob", now),
            Err(StoreError::NotFound(Entity::Room))
        ));
    }

    #[test]
    fn test_remove_and_pull_everywhere() {
        let (_dir, mut db) = temp_db();
        let first = sample_room("first", "alice", "FIRST001");
        let second = sample_room("second", "carol", "SECOND01");
        db.insert_room(&first).unwrap();
        db.insert_room(&second).unwrap();
        let now = Utc::now();

        db.add_member(first.id, "bob", now).unwrap();
        db.ban_member(second.id, "bob", now).unwrap();
        assert_eq!(db.rooms_for_member("bob").unwrap().len(), 1);

        assert!(db.remove_member(first.id, "bob").unwrap());
        assert!(!db.remove_member(first.id, "bob").unwrap());

        db.add_member(first.id, "bob", now).unwrap();
        assert_eq!(db.pull_username_everywhere("bob").unwrap(), 2);
        assert!(db.rooms_for_member("bob").unwrap().is_empty());
        assert!(!db.get_room(second.id).unwrap().is_banned("bob"));
    }

    #[test]
    fn test_deleting_room_drops_its_sets() {
        let (_dir, mut db) = temp_db();
        let room = sample_room("general", "alice", "ABCD1234");
        db.insert_room(&room).unwrap();
        db.add_member(room.id, "bob", Utc::now()).unwrap();

        assert_eq!(db.rooms_owned_by("alice").unwrap(), vec![room.id]);
        assert!(db.delete_room_document(room.id).unwrap());
        assert!(!db.delete_room_document(room.id).unwrap());
        assert!(db.rooms_for_member("bob").unwrap().is_empty());
    }

    #[test]
    fn test_rename_bumps_modified_at() {
        let (_dir, mut db) = temp_db();
        let room = sample_room("general", "alice", "ABCD1234");
        db.insert_room(&room).unwrap();

        let later = room.modified_at + chrono::Duration::seconds(30);
        db.rename_room(room.id, "lobby", later).unwrap();
        let renamed = db.get_room(room.id).unwrap();
        assert_eq!(renamed.room_name, "lobby");
        assert_eq!(renamed.modified_at, later);
    }
}
