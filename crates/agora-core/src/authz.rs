//! Role, ownership and ban predicates.
//!
//! The free functions are pure and operate on already-loaded records. The
//! `ChatService` wrappers load the records first and fail closed: a missing
//! user or room is reported as `NotFound`, never as a plain `false`.

use agora_shared::{ForbiddenKind, Result, RoomId, UserId};
use agora_store::{Database, Room, User};

use crate::service::ChatService;

/// Admins see every room; everyone sees the system AI room; otherwise the
/// user must be in `members` and not in `banned`.
pub fn is_member(user: &User, room: &Room, system_ai_room: Option<RoomId>) -> bool {
    if user.is_admin || system_ai_room == Some(room.id) {
        return true;
    }
    room.has_member(&user.username) && !room.is_banned(&user.username)
}

pub fn is_owner(user: &User, room: &Room) -> bool {
    user.is_admin || room.owner == user.username
}

/// Admins are never considered banned.
pub fn is_banned(user: &User, room: &Room) -> bool {
    !user.is_admin && room.is_banned(&user.username)
}

pub fn has_ai_access(user: &User, room_id: RoomId) -> bool {
    user.ai_room == Some(room_id)
}

pub(crate) fn require_member(user: &User, room: &Room, system_ai_room: Option<RoomId>) -> Result<()> {
    if is_banned(user, room) {
        return Err(ForbiddenKind::Banned.into());
    }
    if !is_member(user, room, system_ai_room) {
        return Err(ForbiddenKind::NotMember.into());
    }
    Ok(())
}

pub(crate) fn require_owner(user: &User, room: &Room) -> Result<()> {
    if is_owner(user, room) {
        Ok(())
    } else {
        Err(ForbiddenKind::NotOwner.into())
    }
}

pub(crate) fn ensure_admin(user: &User) -> Result<()> {
    if user.is_admin {
        Ok(())
    } else {
        tracing::warn!(user_id = %user.id, username = %user.username, "admin action rejected");
        Err(ForbiddenKind::NotAdmin.into())
    }
}

/// Load a user, mapping a missing row to `NotFound(User)`.
pub(crate) fn load_user(db: &Database, id: UserId) -> Result<User> {
    Ok(db.get_user(id)?)
}

/// Load a room, mapping a missing row to `NotFound(Room)`.
pub(crate) fn load_room(db: &Database, id: RoomId) -> Result<Room> {
    Ok(db.get_room(id)?)
}

impl ChatService {
    pub fn check_member(&self, user_id: UserId, room_id: RoomId) -> Result<bool> {
        self.with_db(|db| {
            let user = load_user(db, user_id)?;
            let room = load_room(db, room_id)?;
            Ok(is_member(&user, &room, self.system_ai_room))
        })
    }

    pub fn check_owner(&self, user_id: UserId, room_id: RoomId) -> Result<bool> {
        self.with_db(|db| {
            let user = load_user(db, user_id)?;
            let room = load_room(db, room_id)?;
            Ok(is_owner(&user, &room))
        })
    }

    pub fn check_banned(&self, user_id: UserId, room_id: RoomId) -> Result<bool> {
        self.with_db(|db| {
            let user = load_user(db, user_id)?;
            let room = load_room(db, room_id)?;
            Ok(is_banned(&user, &room))
        })
    }

    /// Whether `room_id` is the user's own AI room.  The room itself need not
    /// be loaded; only the user must exist.
    pub fn check_ai_access(&self, user_id: UserId, room_id: RoomId) -> Result<bool> {
        self.with_db(|db| {
            let user = load_user(db, user_id)?;
            Ok(has_ai_access(&user, room_id))
        })
    }

    pub fn require_ai_access(&self, user_id: UserId, room_id: RoomId) -> Result<()> {
        if self.check_ai_access(user_id, room_id)? {
            Ok(())
        } else {
            Err(ForbiddenKind::NoAiAccess.into())
        }
    }

    /// Gate for every admin operation.  Returns the acting admin.
    pub fn require_admin(&self, actor: UserId) -> Result<User> {
        self.with_db(|db| {
            let user = load_user(db, actor)?;
            ensure_admin(&user)?;
            Ok(user)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_shared::{DomainError, Entity};
    use crate::test_support::{fixture, register};

    #[test]
    fn test_admins_pass_every_predicate() {
        let fx = fixture();
        let alice = register(&fx.service, "alice");
        let bob = register(&fx.service, "bobby");
        fx.service.promote_to_admin("bobby").unwrap();

        let (room_id, _) = fx.service.create_room(alice, "lounge", None).unwrap();

        assert!(fx.service.check_member(bob, room_id).unwrap());
        assert!(fx.service.check_owner(bob, room_id).unwrap());
        assert!(!fx.service.check_banned(bob, room_id).unwrap());
        assert!(fx.service.require_admin(bob).is_ok());
        assert!(matches!(
            fx.service.require_admin(alice),
            Err(DomainError::Forbidden(ForbiddenKind::NotAdmin))
        ));
    }

    #[test]
    fn test_predicates_fail_closed_on_missing_records() {
        let fx = fixture();
        let alice = register(&fx.service, "alice");

        assert!(matches!(
            fx.service.check_member(alice, RoomId::new()),
            Err(DomainError::NotFound(Entity::Room))
        ));
        assert!(matches!(
            fx.service.check_owner(UserId::new(), RoomId::new()),
            Err(DomainError::NotFound(Entity::User))
        ));
        assert!(matches!(
            fx.service.require_admin(UserId::new()),
            Err(DomainError::NotFound(Entity::User))
        ));
    }

    #[test]
    fn test_ai_access_is_limited_to_own_room() {
        let fx = fixture();
        let alice = register(&fx.service, "alice");
        let bob = register(&fx.service, "bobby");
        let alice_ai = fx.service.get_user(alice).unwrap().ai_room.unwrap();

        assert!(fx.service.check_ai_access(alice, alice_ai).unwrap());
        assert!(!fx.service.check_ai_access(bob, alice_ai).unwrap());
        assert!(matches!(
            fx.service.require_ai_access(bob, alice_ai),
            Err(DomainError::Forbidden(ForbiddenKind::NoAiAccess))
        ));
    }

    #[test]
    fn test_system_ai_room_is_readable_by_everyone() {
        let fx = fixture();
        let alice = register(&fx.service, "alice");
        let system = fx.service.get_user(alice).unwrap().ai_room.unwrap();

        let fx2 = crate::test_support::fixture_with_system_room(fx, system);
        let bob = register(&fx2.service, "bobby");
        assert!(fx2.service.check_member(bob, system).unwrap());
    }
}
