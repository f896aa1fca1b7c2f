/// Application name
pub const APP_NAME: &str = "Agora";

/// Name given to every per-user AI companion room
pub const AI_ROOM_NAME: &str = "AI Room";

/// Room names users may not pick for their own rooms
pub const RESERVED_ROOM_NAMES: [&str; 2] = ["AI", "AI Room"];

/// Username reserved for the assistant
pub const RESERVED_USERNAME: &str = "ai";

/// Username length bounds (inclusive)
pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 16;

/// Room name length bounds at creation (inclusive)
pub const ROOM_NAME_CREATE_MIN_LEN: usize = 4;
/// Room name length bounds on rename (inclusive). Smaller minimum than creation.
pub const ROOM_NAME_RENAME_MIN_LEN: usize = 3;
pub const ROOM_NAME_MAX_LEN: usize = 16;

/// Generated join codes are this many ASCII alphanumerics
pub const JOIN_CODE_LEN: usize = 8;

/// Attempts at drawing a free join code before giving up
pub const JOIN_CODE_ATTEMPTS: usize = 5;

/// Length of the random profile picture reference given at registration
pub const PROFILE_PICTURE_SEED_LEN: usize = 16;

/// Avatar service used when a room is created without a picture
pub const DEFAULT_ROOM_PICTURE_BASE: &str = "https://api.dicebear.com/7.x/avataaars/svg?seed=";

/// Password policy
pub const PASSWORD_MIN_LEN: usize = 6;

/// Maximum message length in characters
pub const MAX_MESSAGE_LEN: usize = 2048;

/// Default number of messages returned by room history queries
pub const DEFAULT_HISTORY_LIMIT: u32 = 15;

/// AI model parameter ranges (inclusive)
pub const TEMPERATURE_MIN: f64 = 0.0;
pub const TEMPERATURE_MAX: f64 = 1.5;
pub const MAX_TOKENS_MIN: u32 = 128;
pub const MAX_TOKENS_MAX: u32 = 4096;

/// Admin listing defaults and bounds
pub const DEFAULT_PAGE_LIMIT: u32 = 5;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Key derivation context for the session token HMAC key (BLAKE3)
pub const KDF_CONTEXT_SESSION_KEY: &str = "agora-session-key-v1";

/// Default session lifetime in hours
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Longest session lifetime the server accepts (one year)
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;
