//! Joining, leaving, banning and room edits.
//!
//! Per (user, room) a user is a non-member, a member, the owner or banned.
//! Every transition is a single set operation in the store.

use agora_shared::validation::{validate_picture_url, validate_room_rename};
use agora_shared::{ConflictKind, DomainError, Entity, ForbiddenKind, Result, RoomId, UserId};
use agora_store::{AddMember, BanOutcome};
use chrono::Utc;
use tracing::{info, warn};

use crate::authz::{load_room, load_user, require_owner};
use crate::rooms::RoomView;
use crate::service::ChatService;

impl ChatService {
    /// Join the room carrying `code`.  AI rooms have no code and can never be
    /// joined this way.
    pub fn join_room(&self, actor: UserId, code: &str) -> Result<RoomId> {
        let code = code.trim();

        let room_id = self.with_db(|db| {
            let user = load_user(db, actor)?;
            let room = db
                .find_room_by_join_code(code)?
                .ok_or(DomainError::NotFound(Entity::Room))?;

            match db.add_member(room.id, &user.username, Utc::now())? {
                AddMember::Added => Ok(room.id),
                AddMember::AlreadyMember => Err(ConflictKind::AlreadyMember.into()),
                AddMember::Banned => Err(ForbiddenKind::Banned.into()),
                AddMember::RoomNotFound => Err(DomainError::NotFound(Entity::Room)),
            }
        })?;

        info!(user_id = %actor, room_id = %room_id, "user joined room");
        Ok(room_id)
    }

    pub fn leave_room(&self, actor: UserId, room_id: RoomId) -> Result<()> {
        self.with_db(|db| {
            let user = load_user(db, actor)?;
            let room = load_room(db, room_id)?;

            if room.owner == user.username {
                return Err(ForbiddenKind::CannotLeaveOwned.into());
            }
            if !db.remove_member(room_id, &user.username)? {
                return Err(ForbiddenKind::NotMember.into());
            }
            Ok(())
        })?;

        info!(user_id = %actor, room_id = %room_id, "user left room");
        Ok(())
    }

    /// Move `username` from the room's members to its ban list.  Only the
    /// owner or an admin may ban, and the owner can never be banned.
    pub fn ban_member(&self, actor: UserId, room_id: RoomId, username: &str) -> Result<()> {
        let outcome = self.with_db(|db| {
            let user = load_user(db, actor)?;
            let room = load_room(db, room_id)?;

            if let Err(e) = require_owner(&user, &room) {
                warn!(user_id = %actor, room_id = %room_id, "ban rejected: not owner");
                return Err(e);
            }
            if room.owner == username {
                return Err(ForbiddenKind::CannotBanOwner.into());
            }

            Ok(db.ban_member(room_id, username, Utc::now())?)
        })?;

        match outcome {
            BanOutcome::Banned => {
                info!(room_id = %room_id, username = %username, "user banned from room")
            }
            BanOutcome::AlreadyBanned => {
                tracing::debug!(room_id = %room_id, username = %username, "user already banned")
            }
        }
        Ok(())
    }

    /// Rename and/or re-picture a room.  Both values are checked before
    /// either is written.
    pub fn update_room(
        &self,
        actor: UserId,
        room_id: RoomId,
        name: Option<&str>,
        picture: Option<&str>,
    ) -> Result<RoomView> {
        let name = name.filter(|n| !n.is_empty());
        let picture = picture.filter(|p| !p.is_empty());
        if let Some(name) = name {
            validate_room_rename(name)?;
        }
        if let Some(picture) = picture {
            validate_picture_url(picture)?;
        }

        let view = self.with_db(|db| {
            let user = load_user(db, actor)?;
            let room = load_room(db, room_id)?;
            require_owner(&user, &room)?;

            let now = Utc::now();
            if let Some(name) = name {
                db.rename_room(room_id, name, now)?;
            }
            if let Some(picture) = picture {
                db.set_room_picture(room_id, picture, now)?;
            }
            Ok(RoomView::from(load_room(db, room_id)?))
        })?;

        info!(user_id = %actor, room_id = %room_id, "room updated");
        Ok(view)
    }
}
