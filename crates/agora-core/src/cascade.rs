//! Admin deletions and account moderation.
//!
//! The store has no cross-collection foreign keys from messages to rooms or
//! from rooms to users, so deletions cascade here, one idempotent step at a
//! time.  The user document is removed last: if any step fails the caller
//! gets the error and can simply run the deletion again.

use agora_shared::validation::validate_password;
use agora_shared::{
    DomainError, Entity, ForbiddenKind, LockAction, MessageId, Result, RoomId, UserId,
    ValidationError,
};
use tracing::{info, warn};

use crate::authz::{load_room, load_user};
use crate::service::ChatService;

/// What a completed user deletion removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct UserDeletion {
    pub memberships_removed: usize,
    pub rooms_deleted: usize,
    pub messages_deleted: usize,
}

impl ChatService {
    pub fn delete_user(&self, actor: UserId, target: UserId) -> Result<UserDeletion> {
        self.require_admin(actor)?;

        let report = self.with_db(|db| {
            let user = load_user(db, target)?;
            if user.is_admin {
                warn!(actor = %actor, target = %target, "refusing to delete an admin");
                return Err(ForbiddenKind::ProtectedAccount.into());
            }

            let mut report = UserDeletion {
                memberships_removed: db.pull_username_everywhere(&user.username)?,
                ..UserDeletion::default()
            };

            for room_id in db.rooms_owned_by(&user.username)? {
                report.messages_deleted += db.delete_messages_for_room(room_id)?;
                if db.delete_room_document(room_id)? {
                    report.rooms_deleted += 1;
                }
            }

            report.messages_deleted += db.delete_messages_by_user(&user.username)?;
            db.delete_user_document(target)?;
            Ok(report)
        })?;

        info!(
            actor = %actor,
            user_id = %target,
            rooms = report.rooms_deleted,
            messages = report.messages_deleted,
            "user deleted"
        );
        Ok(report)
    }

    /// Lock or unlock an account.  `action` is `"lock"` or `"unlock"`.
    pub fn lock_unlock_user(&self, actor: UserId, target: UserId, action: &str) -> Result<()> {
        let action: LockAction = action.parse()?;
        self.require_admin(actor)?;

        self.with_db(|db| {
            let user = load_user(db, target)?;
            if user.is_admin {
                return Err(ForbiddenKind::ProtectedAccount.into());
            }
            Ok(db.set_user_status(target, action.target_status())?)
        })?;

        info!(actor = %actor, user_id = %target, status = action.target_status().as_str(), "account status changed");
        Ok(())
    }

    pub fn reset_user_password(
        &self,
        actor: UserId,
        target: UserId,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<()> {
        self.require_admin(actor)?;

        if new_password != confirm_password {
            return Err(ValidationError::PasswordMismatch.into());
        }
        validate_password(new_password)?;

        let user = self.with_db(|db| load_user(db, target))?;
        if user.is_admin {
            return Err(ForbiddenKind::ProtectedAccount.into());
        }

        let hash = self.hasher.hash(new_password)?;
        self.with_db(|db| Ok(db.set_user_password(target, &hash)?))?;

        info!(actor = %actor, user_id = %target, "password reset by admin");
        Ok(())
    }

    /// Delete a room and its messages.  Memberships and bans go with the room.
    pub fn delete_room(&self, actor: UserId, room_id: RoomId) -> Result<usize> {
        self.require_admin(actor)?;

        let messages = self.with_db(|db| {
            let room = load_room(db, room_id)?;
            if room.is_ai {
                return Err(ForbiddenKind::ProtectedRoom.into());
            }
            let messages = db.delete_messages_for_room(room_id)?;
            db.delete_room_document(room_id)?;
            Ok(messages)
        })?;

        info!(actor = %actor, room_id = %room_id, messages, "room deleted");
        Ok(messages)
    }

    pub fn delete_message(&self, actor: UserId, message_id: MessageId) -> Result<()> {
        self.require_admin(actor)?;

        let message = self.with_db(|db| {
            let message = db.get_message(message_id)?;
            if !db.delete_message(message_id)? {
                return Err(DomainError::NotFound(Entity::Message));
            }
            Ok(message)
        })?;

        match message.room_id.resolve() {
            Some(room_id) => info!(
                actor = %actor,
                message_id = %message_id,
                room_id = %room_id,
                "message deleted"
            ),
            None => info!(
                actor = %actor,
                message_id = %message_id,
                room_ref = %message.room_id,
                "orphaned message deleted"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{admin_fixture, register, PASSWORD};
    use agora_shared::{AuthError, ConflictKind};

    #[test]
    fn test_delete_user_removes_every_trace() {
        let (fx, admin) = admin_fixture();
        let alice = register(&fx.service, "alice");
        let bob = register(&fx.service, "bobby");

        let (alice_room, alice_code) = fx.service.create_room(alice, "alices", None).unwrap();
        let (bob_room, bob_code) = fx.service.create_room(bob, "bobs", None).unwrap();
        fx.service.join_room(alice, &bob_code).unwrap();
        fx.service.join_room(bob, &alice_code).unwrap();

        fx.service.post_message(alice, bob_room, "hi bob").unwrap();
        fx.service.post_message(bob, alice_room, "hi alice").unwrap();
        fx.service.post_message(bob, bob_room, "welcome").unwrap();

        let report = fx.service.delete_user(admin, alice).unwrap();
        // the AI room and the room alice created
        assert_eq!(report.rooms_deleted, 2);

        assert!(matches!(
            fx.service.get_user(alice),
            Err(DomainError::NotFound(Entity::User))
        ));
        assert!(matches!(
            fx.service.get_room(bob, alice_room),
            Err(DomainError::NotFound(Entity::Room))
        ));

        let bob_view = fx.service.get_room(bob, bob_room).unwrap();
        assert_eq!(bob_view.members_count, 1);
        let remaining = fx.service.room_messages(bob, bob_room, None, false).unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining.iter().all(|m| m.user.as_deref() != Some("alice")));
    }

    #[test]
    fn test_delete_user_finishes_a_partial_cascade() {
        let (fx, admin) = admin_fixture();
        let alice = register(&fx.service, "alice");
        let bob = register(&fx.service, "bobby");

        let (alice_room, alice_code) = fx.service.create_room(alice, "alices", None).unwrap();
        let (second_room, _) = fx.service.create_room(alice, "second", None).unwrap();
        let (bob_room, bob_code) = fx.service.create_room(bob, "bobs", None).unwrap();
        fx.service.join_room(alice, &bob_code).unwrap();
        fx.service.join_room(bob, &alice_code).unwrap();
        fx.service.post_message(alice, bob_room, "hi bob").unwrap();
        fx.service.post_message(bob, alice_room, "hi alice").unwrap();
        fx.service.post_message(alice, second_room, "note to self").unwrap();

        // an earlier run that stopped after the first owned room
        fx.service
            .with_db(|db| {
                db.pull_username_everywhere("alice")?;
                db.delete_messages_for_room(alice_room)?;
                db.delete_room_document(alice_room)?;
                Ok(())
            })
            .unwrap();
        assert!(fx.service.get_user(alice).is_ok());

        let report = fx.service.delete_user(admin, alice).unwrap();
        // the AI room and the second room were still there
        assert_eq!(report.rooms_deleted, 2);
        assert_eq!(report.memberships_removed, 0);

        let (owned, member_of, authored) = fx
            .service
            .with_db(|db| {
                let authored: i64 = db
                    .conn()
                    .query_row("SELECT COUNT(*) FROM messages WHERE user = 'alice'", [], |row| {
                        row.get(0)
                    })
                    .map_err(agora_store::StoreError::from)?;
                Ok((
                    db.rooms_owned_by("alice")?,
                    db.rooms_for_member("alice")?,
                    authored,
                ))
            })
            .unwrap();
        assert!(owned.is_empty());
        assert!(member_of.is_empty());
        assert_eq!(authored, 0);

        assert!(matches!(
            fx.service.get_user(alice),
            Err(DomainError::NotFound(Entity::User))
        ));
        assert_eq!(fx.service.get_room(bob, bob_room).unwrap().members_count, 1);
    }

    #[test]
    fn test_delete_user_refuses_admins_and_non_admins() {
        let (fx, admin) = admin_fixture();
        let alice = register(&fx.service, "alice");

        assert!(matches!(
            fx.service.delete_user(alice, admin),
            Err(DomainError::Forbidden(ForbiddenKind::NotAdmin))
        ));
        assert!(matches!(
            fx.service.delete_user(admin, admin),
            Err(DomainError::Forbidden(ForbiddenKind::ProtectedAccount))
        ));
        assert!(matches!(
            fx.service.delete_user(admin, UserId::new()),
            Err(DomainError::NotFound(Entity::User))
        ));
    }

    #[test]
    fn test_deleted_username_can_register_again() {
        let (fx, admin) = admin_fixture();
        let alice = register(&fx.service, "alice");
        fx.service.delete_user(admin, alice).unwrap();

        let again = register(&fx.service, "alice");
        assert_ne!(again, alice);
        assert!(matches!(
            fx.service.register("x@example.com", "alice", PASSWORD),
            Err(DomainError::Conflict(ConflictKind::Username))
        ));
    }

    #[test]
    fn test_lock_unlock_cycle() {
        let (fx, admin) = admin_fixture();
        let alice = register(&fx.service, "alice");

        assert!(matches!(
            fx.service.lock_unlock_user(admin, alice, "freeze"),
            Err(DomainError::InvalidInput(ValidationError::InvalidAction(_)))
        ));
        assert!(matches!(
            fx.service.lock_unlock_user(admin, admin, "lock"),
            Err(DomainError::Forbidden(ForbiddenKind::ProtectedAccount))
        ));

        fx.service.lock_unlock_user(admin, alice, "lock").unwrap();
        assert!(matches!(
            fx.service.login("alice@example.com", PASSWORD),
            Err(DomainError::Forbidden(ForbiddenKind::AccountLocked))
        ));

        fx.service.lock_unlock_user(admin, alice, "unlock").unwrap();
        assert!(fx.service.login("alice@example.com", PASSWORD).is_ok());
    }

    #[test]
    fn test_admin_password_reset() {
        let (fx, admin) = admin_fixture();
        let alice = register(&fx.service, "alice");

        assert!(matches!(
            fx.service.reset_user_password(admin, alice, "n3w-secret", "n3w-secreT"),
            Err(DomainError::InvalidInput(ValidationError::PasswordMismatch))
        ));
        assert!(matches!(
            fx.service.reset_user_password(admin, alice, "weak", "weak"),
            Err(DomainError::InvalidInput(ValidationError::WeakPassword))
        ));
        assert!(matches!(
            fx.service.reset_user_password(admin, admin, "n3w-secret", "n3w-secret"),
            Err(DomainError::Forbidden(ForbiddenKind::ProtectedAccount))
        ));

        fx.service
            .reset_user_password(admin, alice, "n3w-secret", "n3w-secret")
            .unwrap();
        assert!(matches!(
            fx.service.login("alice@example.com", PASSWORD),
            Err(DomainError::Unauthorized(AuthError::InvalidCredentials))
        ));
        assert!(fx.service.login("alice@example.com", "n3w-secret").is_ok());
    }

    #[test]
    fn test_delete_room_and_message() {
        let (fx, admin) = admin_fixture();
        let alice = register(&fx.service, "alice");
        let (room_id, _) = fx.service.create_room(alice, "lounge", None).unwrap();
        let msg = fx.service.post_message(alice, room_id, "hello").unwrap();
        let ai_room = fx.service.get_user(alice).unwrap().ai_room.unwrap();

        assert!(matches!(
            fx.service.delete_room(admin, ai_room),
            Err(DomainError::Forbidden(ForbiddenKind::ProtectedRoom))
        ));

        fx.service.delete_message(admin, msg.id).unwrap();
        assert!(matches!(
            fx.service.delete_message(admin, msg.id),
            Err(DomainError::NotFound(Entity::Message))
        ));

        // messages whose room reference is not a room id can still be removed
        let mut orphan = msg.clone();
        orphan.id = MessageId::new();
        orphan.room_id = agora_shared::RoomRef::from_raw("507f1f77bcf86cd799439011");
        fx.service.with_db(|db| Ok(db.insert_message(&orphan)?)).unwrap();
        fx.service.delete_message(admin, orphan.id).unwrap();

        fx.service.post_message(alice, room_id, "again").unwrap();
        assert_eq!(fx.service.delete_room(admin, room_id).unwrap(), 1);
        assert!(matches!(
            fx.service.delete_room(admin, room_id),
            Err(DomainError::NotFound(Entity::Room))
        ));
        assert!(fx.service.list_user_rooms(alice).unwrap().iter().all(|r| r.id != room_id));
    }
}
