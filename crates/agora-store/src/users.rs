//! CRUD operations for [`User`] records.

use agora_shared::{Entity, RoomId, UserId, UserStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::database::{bad_column, ts_from_sql, ts_to_sql, uuid_from_sql, Database};
use crate::error::{Result, StoreError};
use crate::models::{Room, User};

const USER_COLUMNS: &str = "id, username, email, password, profile_picture, status,
                            created_at, last_login, role, is_admin, ai_room";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a user together with its companion AI room in one transaction.
    ///
    /// A unique violation on username or email rolls back both documents and
    /// surfaces as [`StoreError::Duplicate`].
    pub fn create_user_with_ai_room(&mut self, user: &User, ai_room: &Room) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        tx.execute(
            "INSERT INTO users (id, username, email, password, profile_picture, status,
                                created_at, last_login, role, is_admin, ai_room)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                user.id.to_string(),
                user.username,
                user.email,
                user.password,
                user.profile_picture,
                user.status.as_str(),
                ts_to_sql(&user.created_at),
                ts_to_sql(&user.last_login),
                user.role,
                user.is_admin,
                user.ai_room.map(|r| r.to_string()),
            ],
        )?;

        Self::insert_room_tx(&tx, ai_room)?;

        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single user by id.
    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(Entity::User),
                other => StoreError::from(other),
            })
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    pub fn set_user_email(&self, id: UserId, email: &str) -> Result<()> {
        self.update_user_column(id, "email", email)
    }

    pub fn set_user_password(&self, id: UserId, password_hash: &str) -> Result<()> {
        self.update_user_column(id, "password", password_hash)
    }

    pub fn set_user_profile_picture(&self, id: UserId, picture: &str) -> Result<()> {
        self.update_user_column(id, "profile_picture", picture)
    }

    pub fn set_user_status(&self, id: UserId, status: UserStatus) -> Result<()> {
        self.update_user_column(id, "status", status.as_str())
    }

    pub fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> Result<()> {
        self.update_user_column(id, "last_login", &ts_to_sql(&at))
    }

    /// Grant or revoke administrator rights.  The role label follows the flag.
    pub fn set_admin(&self, id: UserId, is_admin: bool) -> Result<()> {
        let role = if is_admin { "admin" } else { "user" };
        let affected = self.conn().execute(
            "UPDATE users SET is_admin = ?2, role = ?3 WHERE id = ?1",
            params![id.to_string(), is_admin, role],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(Entity::User));
        }
        Ok(())
    }

    fn update_user_column(&self, id: UserId, column: &'static str, value: &str) -> Result<()> {
        let affected = self.conn().execute(
            &format!("UPDATE users SET {column} = ?2 WHERE id = ?1"),
            params![id.to_string(), value],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(Entity::User));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete the user document only.  Returns `true` if a row was deleted.
    pub fn delete_user_document(&self, id: UserId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a row selected with [`USER_COLUMNS`] (starting at `base`) to a [`User`].
pub(crate) fn user_from_row(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<User> {
    let id_str: String = row.get(base)?;
    let status_str: String = row.get(base + 5)?;
    let created_str: String = row.get(base + 6)?;
    let login_str: String = row.get(base + 7)?;
    let ai_room_str: Option<String> = row.get(base + 10)?;

    let status = UserStatus::from_str_opt(&status_str)
        .ok_or_else(|| bad_column(base + 5, format!("unknown user status '{status_str}'")))?;

    let ai_room = ai_room_str
        .map(|s| uuid_from_sql(base + 10, &s).map(RoomId))
        .transpose()?;

    Ok(User {
        id: UserId(uuid_from_sql(base, &id_str)?),
        username: row.get(base + 1)?,
        email: row.get(base + 2)?,
        password: row.get(base + 3)?,
        profile_picture: row.get(base + 4)?,
        status,
        created_at: ts_from_sql(base + 6, &created_str)?,
        last_login: ts_from_sql(base + 7, &login_str)?,
        role: row.get(base + 8)?,
        is_admin: row.get(base + 9)?,
        ai_room,
    })
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    user_from_row(row, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_ai_room, sample_user, temp_db};
    use agora_shared::ConflictKind;

    #[test]
    fn test_create_and_fetch_user_with_ai_room() {
        let (_dir, mut db) = temp_db();
        let (user, room) = sample_user("alice");

        db.create_user_with_ai_room(&user, &room).unwrap();

        let fetched = db.get_user(user.id).unwrap();
        assert_eq!(fetched, user);

        let ai_room = db.get_room(room.id).unwrap();
        assert!(ai_room.is_ai);
        assert!(ai_room.room_join_code.is_none());
        assert_eq!(ai_room.members, vec!["alice".to_string()]);
    }

    #[test]
    fn test_duplicate_username_rolls_back_ai_room() {
        let (_dir, mut db) = temp_db();
        let (alice, room) = sample_user("alice");
        db.create_user_with_ai_room(&alice, &room).unwrap();

        let (mut clone, clone_room) = sample_user("alice");
        clone.email = "other@example.com".into();
        let err = db.create_user_with_ai_room(&clone, &clone_room).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(ConflictKind::Username)));

        // the second AI room must not have survived the failed transaction
        assert!(matches!(
            db.get_room(clone_room.id),
            Err(StoreError::NotFound(Entity::Room))
        ));
    }

    #[test]
    fn test_duplicate_email_is_reported() {
        let (_dir, mut db) = temp_db();
        let (alice, room) = sample_user("alice");
        db.create_user_with_ai_room(&alice, &room).unwrap();

        let (mut bob, _) = sample_user("bob");
        bob.email = alice.email.clone();
        let bob_room = sample_ai_room("bob");
        let err = db.create_user_with_ai_room(&bob, &bob_room).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(ConflictKind::Email)));
    }

    #[test]
    fn test_lookups_and_updates() {
        let (_dir, mut db) = temp_db();
        let (user, room) = sample_user("carol");
        db.create_user_with_ai_room(&user, &room).unwrap();

        assert!(db.find_user_by_email("carol@example.com").unwrap().is_some());
        assert!(db.find_user_by_username("carol").unwrap().is_some());
        assert!(db.find_user_by_username("nobody").unwrap().is_none());

        db.set_user_status(user.id, UserStatus::Locked).unwrap();
        db.set_admin(user.id, true).unwrap();
        let updated = db.get_user(user.id).unwrap();
        assert!(updated.is_locked());
        assert!(updated.is_admin);
        assert_eq!(updated.role, "admin");

        assert!(matches!(
            db.set_user_email(UserId::new(), "x@example.com"),
            Err(StoreError::NotFound(Entity::User))
        ));
    }

    #[test]
    fn test_delete_user_document_is_idempotent() {
        let (_dir, mut db) = temp_db();
        let (user, room) = sample_user("dave");
        db.create_user_with_ai_room(&user, &room).unwrap();

        assert!(db.delete_user_document(user.id).unwrap());
        assert!(!db.delete_user_document(user.id).unwrap());
    }
}
