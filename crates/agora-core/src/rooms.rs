//! Room creation, room views and message history.

use agora_shared::constants::{
    DEFAULT_HISTORY_LIMIT, DEFAULT_ROOM_PICTURE_BASE, JOIN_CODE_ATTEMPTS, JOIN_CODE_LEN,
    MAX_PAGE_LIMIT,
};
use agora_shared::validation::{
    validate_join_code, validate_message_text, validate_new_room_name, validate_picture_url,
};
use agora_shared::{ConflictKind, MessageId, Result, RoomId, RoomRef, UserId, ValidationError};
use agora_store::{Message, Room, StoreError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::authz::{load_room, load_user, require_member};
use crate::codes::random_alphanumeric;
use crate::service::ChatService;

/// What a member sees of a room: the member count, never the ban list.
#[derive(Debug, Clone, Serialize)]
pub struct RoomView {
    pub id: RoomId,
    pub room_name: String,
    pub room_picture: Option<String>,
    pub room_join_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub owner: String,
    #[serde(rename = "members")]
    pub members_count: usize,
    pub is_ai: bool,
}

impl From<Room> for RoomView {
    fn from(room: Room) -> Self {
        Self {
            id: room.id,
            room_name: room.room_name,
            room_picture: room.room_picture,
            room_join_code: room.room_join_code,
            created_at: room.created_at,
            modified_at: room.modified_at,
            owner: room.owner,
            members_count: room.members.len(),
            is_ai: room.is_ai,
        }
    }
}

fn check_history_limit(limit: u32) -> Result<()> {
    if (1..=MAX_PAGE_LIMIT).contains(&limit) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPageLimit {
            max: MAX_PAGE_LIMIT,
        }
        .into())
    }
}

impl ChatService {
    /// Create a room owned by `actor` with a generated join code.
    pub fn create_room(
        &self,
        actor: UserId,
        name: &str,
        picture: Option<&str>,
    ) -> Result<(RoomId, String)> {
        self.create_room_inner(actor, name, picture, None)
    }

    /// Create a room with a caller-chosen join code.  A taken code is a
    /// `Conflict(JoinCode)`; there is no retry.
    pub fn create_room_with_code(
        &self,
        actor: UserId,
        name: &str,
        picture: Option<&str>,
        join_code: &str,
    ) -> Result<(RoomId, String)> {
        validate_join_code(join_code)?;
        self.create_room_inner(actor, name, picture, Some(join_code))
    }

    fn create_room_inner(
        &self,
        actor: UserId,
        name: &str,
        picture: Option<&str>,
        join_code: Option<&str>,
    ) -> Result<(RoomId, String)> {
        validate_new_room_name(name)?;
        let picture = match picture.filter(|p| !p.trim().is_empty()) {
            Some(url) => {
                validate_picture_url(url)?;
                url.to_string()
            }
            None => format!("{DEFAULT_ROOM_PICTURE_BASE}{}", random_alphanumeric(16)),
        };

        let attempts = if join_code.is_some() { 1 } else { JOIN_CODE_ATTEMPTS };

        let room = self.with_db(|db| {
            let owner = load_user(db, actor)?;
            let now = Utc::now();

            for attempt in 1..=attempts {
                let code = join_code
                    .map(str::to_string)
                    .unwrap_or_else(|| random_alphanumeric(JOIN_CODE_LEN));
                let room = Room {
                    id: RoomId::new(),
                    room_name: name.to_string(),
                    room_picture: Some(picture.clone()),
                    room_join_code: Some(code),
                    created_at: now,
                    modified_at: now,
                    owner: owner.username.clone(),
                    members: vec![owner.username.clone()],
                    banned: Vec::new(),
                    is_ai: false,
                };

                match db.insert_room(&room) {
                    Ok(()) => return Ok(room),
                    Err(StoreError::Duplicate(ConflictKind::JoinCode))
                        if attempt < attempts =>
                    {
                        debug!(attempt, "join code collision, drawing another");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(ConflictKind::JoinCode.into())
        })?;

        let code = room.room_join_code.clone().unwrap_or_default();
        info!(room_id = %room.id, owner = %room.owner, name = %room.room_name, "room created");
        Ok((room.id, code))
    }

    /// Every room the actor currently belongs to, AI room included.
    pub fn list_user_rooms(&self, actor: UserId) -> Result<Vec<Room>> {
        self.with_db(|db| {
            let user = load_user(db, actor)?;
            Ok(db.rooms_for_member(&user.username)?)
        })
    }

    pub fn get_room(&self, actor: UserId, room_id: RoomId) -> Result<RoomView> {
        debug!(user_id = %actor, room_id = %room_id, "loading room");
        self.with_db(|db| {
            let user = load_user(db, actor)?;
            let room = load_room(db, room_id)?;
            require_member(&user, &room, self.system_ai_room)?;
            Ok(RoomView::from(room))
        })
    }

    /// Append a message authored by `actor`.  The author's current profile
    /// picture is copied onto the message.
    pub fn post_message(&self, actor: UserId, room_id: RoomId, text: &str) -> Result<Message> {
        validate_message_text(text)?;

        let message = self.with_db(|db| {
            let user = load_user(db, actor)?;
            let room = load_room(db, room_id)?;
            require_member(&user, &room, self.system_ai_room)?;

            let message = Message {
                id: MessageId::new(),
                room_id: RoomRef::from(room.id),
                pfp: Some(user.profile_picture),
                user: Some(user.username),
                message: text.to_string(),
                timestamp: Utc::now(),
            };
            db.insert_message(&message)?;
            Ok(message)
        })?;

        debug!(message_id = %message.id, room_id = %room_id, "message posted");
        Ok(message)
    }

    /// Append an author-less message, e.g. a join notice.
    pub fn post_system_message(&self, room_id: RoomId, text: &str) -> Result<Message> {
        validate_message_text(text)?;

        self.with_db(|db| {
            load_room(db, room_id)?;
            let message = Message {
                id: MessageId::new(),
                room_id: RoomRef::from(room_id),
                pfp: None,
                user: None,
                message: text.to_string(),
                timestamp: Utc::now(),
            };
            db.insert_message(&message)?;
            Ok(message)
        })
    }

    pub fn room_messages(
        &self,
        actor: UserId,
        room_id: RoomId,
        limit: Option<u32>,
        descending: bool,
    ) -> Result<Vec<Message>> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        check_history_limit(limit)?;

        self.with_db(|db| {
            let user = load_user(db, actor)?;
            let room = load_room(db, room_id)?;
            require_member(&user, &room, self.system_ai_room)?;
            Ok(db.messages_for_room(room_id, limit, descending)?)
        })
    }

    pub fn messages_before(
        &self,
        actor: UserId,
        room_id: RoomId,
        before: DateTime<Utc>,
        limit: Option<u32>,
    ) -> Result<Vec<Message>> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        check_history_limit(limit)?;

        self.with_db(|db| {
            let user = load_user(db, actor)?;
            let room = load_room(db, room_id)?;
            require_member(&user, &room, self.system_ai_room)?;
            Ok(db.messages_before(room_id, before, limit)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, register};
    use agora_shared::{DomainError, Entity, ForbiddenKind};

    #[test]
    fn test_create_room_generates_code_and_picture() {
        let fx = fixture();
        let alice = register(&fx.service, "alice");

        let (room_id, code) = fx.service.create_room(alice, "lounge", None).unwrap();
        assert_eq!(code.len(), JOIN_CODE_LEN);

        let view = fx.service.get_room(alice, room_id).unwrap();
        assert_eq!(view.owner, "alice");
        assert_eq!(view.members_count, 1);
        assert!(view
            .room_picture
            .as_deref()
            .unwrap()
            .starts_with(DEFAULT_ROOM_PICTURE_BASE));
        assert!(!view.is_ai);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("banned").is_none());
        assert_eq!(json["members"], 1);
    }

    #[test]
    fn test_create_room_validates_name_and_picture() {
        let fx = fixture();
        let alice = register(&fx.service, "alice");

        for name in ["abc", "AI", "AI Room", "a name that is far too long"] {
            assert!(matches!(
                fx.service.create_room(alice, name, None),
                Err(DomainError::InvalidInput(_))
            ));
        }
        assert!(matches!(
            fx.service.create_room(alice, "lounge", Some("ftp://example.com/x.png")),
            Err(DomainError::InvalidInput(ValidationError::InvalidUrl))
        ));
    }

    #[test]
    fn test_explicit_join_code_conflicts() {
        let fx = fixture();
        let alice = register(&fx.service, "alice");

        let (_, code) = fx
            .service
            .create_room_with_code(alice, "lounge", None, "SHARED01")
            .unwrap();
        assert_eq!(code, "SHARED01");
        assert!(matches!(
            fx.service.create_room_with_code(alice, "other", None, "SHARED01"),
            Err(DomainError::Conflict(ConflictKind::JoinCode))
        ));
    }

    #[test]
    fn test_only_members_read_and_post() {
        let fx = fixture();
        let alice = register(&fx.service, "alice");
        let bob = register(&fx.service, "bobby");
        let (room_id, _) = fx.service.create_room(alice, "lounge", None).unwrap();

        fx.service.post_message(alice, room_id, "hello").unwrap();
        assert!(matches!(
            fx.service.post_message(bob, room_id, "let me in"),
            Err(DomainError::Forbidden(ForbiddenKind::NotMember))
        ));
        assert!(matches!(
            fx.service.room_messages(bob, room_id, None, false),
            Err(DomainError::Forbidden(ForbiddenKind::NotMember))
        ));
        assert!(matches!(
            fx.service.post_message(alice, RoomId::new(), "void"),
            Err(DomainError::NotFound(Entity::Room))
        ));
        assert!(matches!(
            fx.service.post_message(alice, room_id, ""),
            Err(DomainError::InvalidInput(ValidationError::MessageLength { .. }))
        ));

        let history = fx.service.room_messages(alice, room_id, None, false).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].user.as_deref(), Some("alice"));
        let alice_pfp = fx.service.get_user(alice).unwrap().profile_picture;
        assert_eq!(history[0].pfp.as_deref(), Some(alice_pfp.as_str()));
    }

    #[test]
    fn test_history_limits_and_before() {
        let fx = fixture();
        let alice = register(&fx.service, "alice");
        let (room_id, _) = fx.service.create_room(alice, "lounge", None).unwrap();

        for i in 0..3 {
            fx.service.post_message(alice, room_id, &format!("m{i}")).unwrap();
        }
        fx.service.post_system_message(room_id, "notice").unwrap();

        let newest = fx.service.room_messages(alice, room_id, Some(2), true).unwrap();
        assert_eq!(newest.len(), 2);
        assert!(newest[0].timestamp >= newest[1].timestamp);

        let older = fx
            .service
            .messages_before(alice, room_id, Utc::now() + chrono::Duration::seconds(1), Some(10))
            .unwrap();
        assert_eq!(older.len(), 4);

        assert!(matches!(
            fx.service.room_messages(alice, room_id, Some(0), false),
            Err(DomainError::InvalidInput(ValidationError::InvalidPageLimit { .. }))
        ));
    }

    #[test]
    fn test_user_room_list_includes_ai_room() {
        let fx = fixture();
        let alice = register(&fx.service, "alice");
        fx.service.create_room(alice, "lounge", None).unwrap();

        let rooms = fx.service.list_user_rooms(alice).unwrap();
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms.iter().filter(|r| r.is_ai).count(), 1);
    }
}
