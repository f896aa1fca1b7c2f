use agora_shared::{Entity, MessageId, RoomId, RoomRef};
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::{ts_from_sql, ts_to_sql, uuid_from_sql, Database};
use crate::error::{Result, StoreError};
use crate::models::Message;

impl Database {
    pub fn insert_message(&self, message: &Message) -> Result<()> {
        self.conn().execute(
            "INSERT INTO messages (id, room_id, pfp, user, message, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id.to_string(),
                message.room_id.as_str(),
                message.pfp,
                message.user,
                message.message,
                ts_to_sql(&message.timestamp),
            ],
        )?;
        Ok(())
    }

    pub fn get_message(&self, id: MessageId) -> Result<Message> {
        self.conn()
            .query_row(
                "SELECT id, room_id, pfp, user, message, timestamp
                 FROM messages WHERE id = ?1",
                params![id.to_string()],
                row_to_message,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(Entity::Message),
                other => StoreError::from(other),
            })
    }

    /// Up to `limit` messages of a room, sorted by timestamp in the requested
    /// direction.
    pub fn messages_for_room(
        &self,
        room_id: RoomId,
        limit: u32,
        descending: bool,
    ) -> Result<Vec<Message>> {
        let sql = if descending {
            "SELECT id, room_id, pfp, user, message, timestamp
             FROM messages
             WHERE room_id = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2"
        } else {
            "SELECT id, room_id, pfp, user, message, timestamp
             FROM messages
             WHERE room_id = ?1
             ORDER BY timestamp ASC, id ASC
             LIMIT ?2"
        };

        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(
            params![RoomRef::from(room_id).as_str(), limit],
            row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Up to `limit` messages strictly older than `before`, newest first.
    pub fn messages_before(
        &self,
        room_id: RoomId,
        before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, room_id, pfp, user, message, timestamp
             FROM messages
             WHERE room_id = ?1 AND timestamp < ?2
             ORDER BY timestamp DESC, id DESC
             LIMIT ?3",
        )?;

        let rows = stmt.query_map(
            params![RoomRef::from(room_id).as_str(), ts_to_sql(&before), limit],
            row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn count_messages_for_room(&self, room_id: RoomId) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages WHERE room_id = ?1",
            params![RoomRef::from(room_id).as_str()],
            |row| row.get(0),
        )?;
        Ok(crate::database::count_from_sql(count))
    }

    pub fn delete_message(&self, id: MessageId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM messages WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Delete every message referencing the room.  Returns the number removed.
    pub fn delete_messages_for_room(&self, room_id: RoomId) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM messages WHERE room_id = ?1",
            params![RoomRef::from(room_id).as_str()],
        )?;
        Ok(affected)
    }

    /// Delete every message authored by the username.  Returns the number removed.
    pub fn delete_messages_by_user(&self, username: &str) -> Result<usize> {
        let affected = self
            .conn()
            .execute("DELETE FROM messages WHERE user = ?1", params![username])?;
        Ok(affected)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let room_id: String = row.get(1)?;
    let ts_str: String = row.get(5)?;

    Ok(Message {
        id: MessageId(uuid_from_sql(0, &id_str)?),
        room_id: RoomRef::from_raw(room_id),
        pfp: row.get(2)?,
        user: row.get(3)?,
        message: row.get(4)?,
        timestamp: ts_from_sql(5, &ts_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_message, temp_db};
    use chrono::Duration;

    #[test]
    fn test_history_ordering_and_limits() {
        let (_dir, db) = temp_db();
        let room = RoomId::new();
        let base = crate::test_support::now();

        for i in 0..5 {
            let mut msg = sample_message(room, Some("alice"), &format!("msg {i}"));
            msg.timestamp = base + Duration::seconds(i);
            db.insert_message(&msg).unwrap();
        }

        let oldest = db.messages_for_room(room, 2, false).unwrap();
        assert_eq!(oldest[0].message, "msg 0");
        assert_eq!(oldest[1].message, "msg 1");

        let newest = db.messages_for_room(room, 2, true).unwrap();
        assert_eq!(newest[0].message, "msg 4");

        let before = db
            .messages_before(room, base + Duration::seconds(3), 10)
            .unwrap();
        let texts: Vec<_> = before.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["msg 2", "msg 1", "msg 0"]);

        assert_eq!(db.count_messages_for_room(room).unwrap(), 5);
        assert_eq!(db.count_messages_for_room(RoomId::new()).unwrap(), 0);
    }

    #[test]
    fn test_bulk_deletes() {
        let (_dir, db) = temp_db();
        let room = RoomId::new();
        let other = RoomId::new();

        db.insert_message(&sample_message(room, Some("alice"), "hi")).unwrap();
        db.insert_message(&sample_message(room, Some("bob"), "hey")).unwrap();
        db.insert_message(&sample_message(other, Some("alice"), "elsewhere")).unwrap();
        db.insert_message(&sample_message(other, None, "system notice")).unwrap();

        assert_eq!(db.delete_messages_by_user("alice").unwrap(), 2);
        assert_eq!(db.delete_messages_for_room(room).unwrap(), 1);
        assert_eq!(db.delete_messages_for_room(room).unwrap(), 0);

        let remaining = db.messages_for_room(other, 10, false).unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].user.is_none());
    }

    #[test]
    fn test_get_and_delete_single() {
        let (_dir, db) = temp_db();
        let msg = sample_message(RoomId::new(), Some("alice"), "hello");
        db.insert_message(&msg).unwrap();

        assert_eq!(db.get_message(msg.id).unwrap(), msg);
        assert!(db.delete_message(msg.id).unwrap());
        assert!(matches!(
            db.get_message(msg.id),
            Err(StoreError::NotFound(Entity::Message))
        ));
    }
}
