//! # agora-core
//!
//! Domain rules for Agora: who may do what to which room, how deletions
//! cascade across collections, and how the admin listings are validated.
//! Every operation is a method on [`ChatService`].

pub mod accounts;
pub mod admin_query;
pub mod authz;
pub mod cascade;
pub mod membership;
pub mod rooms;
pub mod service;
pub mod settings;

mod codes;

pub use accounts::{ProfileUpdate, Registration, Session};
pub use admin_query::ListParams;
pub use cascade::UserDeletion;
pub use rooms::RoomView;
pub use service::ChatService;
pub use settings::AiSettingsUpdate;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use agora_shared::password::Argon2Hasher;
    use agora_shared::session::SessionSigner;
    use agora_shared::{RoomId, UserId};
    use agora_store::{Config, Database};

    use crate::ChatService;

    pub const PASSWORD: &str = "secret1!";

    pub struct Fixture {
        pub dir: tempfile::TempDir,
        pub service: ChatService,
    }

    fn build(dir: tempfile::TempDir, system_ai_room: Option<RoomId>) -> Fixture {
        let db = Database::open_at(&dir.path().join("agora.db")).unwrap();
        db.ensure_config(&Config {
            system_message: None,
            db_uri: "sqlite://agora.db".into(),
            db_name: "agora".into(),
            register_feature: true,
            ai_feature: true,
            secret_key: "test-secret".into(),
        })
        .unwrap();

        let hasher = Arc::new(Argon2Hasher::with_cost(1024, 1, 1).unwrap());
        let tokens = Arc::new(SessionSigner::new("test-secret", chrono::Duration::hours(1)));
        let service = ChatService::new(db, hasher, tokens, system_ai_room).unwrap();
        Fixture { dir, service }
    }

    pub fn fixture() -> Fixture {
        build(tempfile::tempdir().unwrap(), None)
    }

    /// Reopen the same database with a designated system AI room.
    pub fn fixture_with_system_room(fx: Fixture, room: RoomId) -> Fixture {
        let Fixture { dir, service } = fx;
        drop(service);
        build(dir, Some(room))
    }

    /// A fixture with one admin account named `admin`.
    pub fn admin_fixture() -> (Fixture, UserId) {
        let fx = fixture();
        let admin = register(&fx.service, "admin");
        fx.service.promote_to_admin("admin").unwrap();
        (fx, admin)
    }

    pub fn register(service: &ChatService, username: &str) -> UserId {
        service
            .register(&format!("{username}@example.com"), username, PASSWORD)
            .unwrap()
            .user_id
    }
}
