//! Registration, login and self-service profile changes.

use agora_shared::constants::{AI_ROOM_NAME, PROFILE_PICTURE_SEED_LEN};
use agora_shared::validation::{normalize_email, validate_password, validate_username};
use agora_shared::{
    AuthError, ConflictKind, DomainError, Entity, ForbiddenKind, Result, RoomId, UserId, UserStatus,
};
use agora_store::{Room, User};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::authz::load_user;
use crate::codes::random_alphanumeric;
use crate::service::ChatService;

/// Result of a successful registration.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub user_id: UserId,
    pub ai_room_id: RoomId,
    pub token: String,
}

/// Result of a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user_id: UserId,
    pub token: String,
}

/// Self-service profile changes.  Empty or absent fields are skipped; the
/// password only changes when both passwords are given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub old_password: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
    #[serde(default, alias = "pfp")]
    pub profile_picture: Option<String>,
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.trim().is_empty())
}

impl ChatService {
    pub fn register(&self, email: &str, username: &str, password: &str) -> Result<Registration> {
        if !self.registration_enabled()? {
            return Err(ForbiddenKind::RegistrationDisabled.into());
        }

        let email = normalize_email(email)?;
        validate_password(password)?;
        validate_username(username)?;

        let password_hash = self.hasher.hash(password)?;
        let now = Utc::now();

        let ai_room = Room {
            id: RoomId::new(),
            room_name: AI_ROOM_NAME.to_string(),
            room_picture: None,
            room_join_code: None,
            created_at: now,
            modified_at: now,
            owner: username.to_string(),
            members: vec![username.to_string()],
            banned: Vec::new(),
            is_ai: true,
        };
        let user = User {
            id: UserId::new(),
            username: username.to_string(),
            email,
            password: password_hash,
            profile_picture: random_alphanumeric(PROFILE_PICTURE_SEED_LEN),
            status: UserStatus::Active,
            created_at: now,
            last_login: now,
            role: "user".to_string(),
            is_admin: false,
            ai_room: Some(ai_room.id),
        };

        self.with_db(|db| Ok(db.create_user_with_ai_room(&user, &ai_room)?))?;

        info!(user_id = %user.id, username = %user.username, ai_room = %ai_room.id, "user registered");

        let token = self.tokens.issue(user.id)?;
        Ok(Registration {
            user_id: user.id,
            ai_room_id: ai_room.id,
            token,
        })
    }

    pub fn login(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;

        let user = self
            .with_db(|db| Ok(db.find_user_by_email(&email)?))?
            .ok_or(AuthError::InvalidCredentials)?;

        match self.hasher.verify(&user.password, password) {
            Ok(()) => {}
            Err(AuthError::Mismatch) => {
                tracing::debug!(user_id = %user.id, "login with wrong password");
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(other) => return Err(other.into()),
        }

        if user.is_locked() {
            return Err(ForbiddenKind::AccountLocked.into());
        }

        self.with_db(|db| Ok(db.touch_last_login(user.id, Utc::now())?))?;
        info!(user_id = %user.id, "user logged in");

        let token = self.tokens.issue(user.id)?;
        Ok(Session {
            user_id: user.id,
            token,
        })
    }

    /// Resolve a bearer token to the user it was issued for.
    pub fn authenticate(&self, token: &str) -> Result<UserId> {
        Ok(self.tokens.resolve(token)?)
    }

    pub fn get_user(&self, id: UserId) -> Result<User> {
        tracing::debug!(user_id = %id, "loading user");
        self.with_db(|db| load_user(db, id))
    }

    /// Apply a [`ProfileUpdate`].  Every supplied field is checked before the
    /// first write, then each one goes through its own change operation.
    pub fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> Result<User> {
        let user = self.get_user(id)?;

        let email = present(&update.email).map(normalize_email).transpose()?;
        if let Some(email) = &email {
            self.with_db(|db| Self::ensure_email_available(db, id, email))?;
        }

        let passwords = match (present(&update.old_password), present(&update.new_password)) {
            (Some(old), Some(new)) => {
                validate_password(new)?;
                self.verify_current_password(&user, old)?;
                Some((old, new))
            }
            _ => None,
        };

        if let Some(email) = &email {
            self.change_email(id, email)?;
        }
        if let Some((old, new)) = passwords {
            self.change_password(id, old, new)?;
        }
        if let Some(picture) = present(&update.profile_picture) {
            self.change_profile_picture(id, picture)?;
        }

        let user = self.get_user(id)?;
        info!(user_id = %id, "profile updated");
        Ok(user)
    }

    pub fn change_email(&self, id: UserId, new_email: &str) -> Result<()> {
        let email = normalize_email(new_email)?;
        self.with_db(|db| {
            Self::ensure_email_available(db, id, &email)?;
            Ok(db.set_user_email(id, &email)?)
        })?;
        info!(user_id = %id, "email changed");
        Ok(())
    }

    pub fn change_password(&self, id: UserId, old_password: &str, new_password: &str) -> Result<()> {
        let user = self.get_user(id)?;
        self.verify_current_password(&user, old_password)?;
        validate_password(new_password)?;

        let hash = self.hasher.hash(new_password)?;
        self.with_db(|db| Ok(db.set_user_password(id, &hash)?))?;
        info!(user_id = %id, "password changed");
        Ok(())
    }

    pub fn change_profile_picture(&self, id: UserId, picture: &str) -> Result<()> {
        self.with_db(|db| Ok(db.set_user_profile_picture(id, picture)?))?;
        tracing::debug!(user_id = %id, "profile picture changed");
        Ok(())
    }

    /// Grant admin rights to an existing account.  Used once at start-up.
    pub fn promote_to_admin(&self, username: &str) -> Result<User> {
        let user = self.with_db(|db| {
            let user = db
                .find_user_by_username(username)?
                .ok_or(DomainError::NotFound(Entity::User))?;
            db.set_admin(user.id, true)?;
            load_user(db, user.id)
        })?;
        info!(user_id = %user.id, username = %user.username, "user promoted to admin");
        Ok(user)
    }

    fn verify_current_password(&self, user: &User, password: &str) -> Result<()> {
        match self.hasher.verify(&user.password, password) {
            Ok(()) => Ok(()),
            Err(AuthError::Mismatch) => Err(AuthError::InvalidCredentials.into()),
            Err(other) => Err(other.into()),
        }
    }

    fn ensure_email_available(db: &agora_store::Database, id: UserId, email: &str) -> Result<()> {
        match db.find_user_by_email(email)? {
            Some(existing) if existing.id != id => Err(ConflictKind::Email.into()),
            _ => Ok(()),
        }
    }
}
