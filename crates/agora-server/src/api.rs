use std::sync::Arc;

use agora_core::{AiSettingsUpdate, ChatService, ListParams, ProfileUpdate, RoomView, UserDeletion};
use agora_shared::constants::APP_NAME;
use agora_shared::{MessageId, RoomId, UserId, ValidationError};
use agora_store::{
    Config, ConfigPatch, Message, MessageSummary, Page, RoomSummary, SortOrder, Stats, User,
    UserSummary,
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header::AUTHORIZATION, HeaderMap, Method},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChatService>,
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/users", get(get_profile).put(update_profile))
        .route("/api/rooms", get(list_rooms))
        .route("/api/rooms/create", post(create_room))
        .route("/api/rooms/join", get(join_room))
        .route("/api/rooms/leave", get(leave_room))
        .route("/api/rooms/:room_id", get(get_room).put(update_room))
        .route(
            "/api/rooms/:room_id/messages",
            get(room_messages).post(post_message),
        )
        .route("/api/rooms/:room_id/ban", post(ban_member))
        .route("/admin/users", get(admin_users))
        .route("/admin/user/:id", delete(admin_delete_user))
        .route("/admin/user/:id/reset", post(admin_reset_password))
        .route("/admin/user/:id/:action", get(admin_lock_unlock))
        .route("/admin/rooms", get(admin_rooms))
        .route(
            "/admin/room/:id",
            put(admin_update_room).delete(admin_delete_room),
        )
        .route("/admin/messages", get(admin_messages))
        .route("/admin/message/:id", delete(admin_delete_message))
        .route("/admin/ai", get(admin_get_ai).put(admin_update_ai))
        .route("/admin/config", get(admin_get_config).put(admin_update_config))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run a service call on the blocking pool; the store is synchronous.
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&ChatService) -> agora_shared::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let service = state.service.clone();
    Ok(tokio::task::spawn_blocking(move || f(&service)).await??)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::MissingToken)
}

/// Resolve the caller from the `Authorization: Bearer` header.
fn current_user(state: &AppState, headers: &HeaderMap) -> Result<UserId, ApiError> {
    let token = bearer_token(headers)?;
    Ok(state.service.authenticate(token)?)
}

// ─── Request / response bodies ───

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: &'static str,
    version: &'static str,
    registration_open: bool,
    ai_enabled: bool,
    system_message: Option<String>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

impl MessageResponse {
    fn ok(message: &'static str) -> ApiResult<Self> {
        Ok(Json(Self { message }))
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RegisterRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct TokenResponse {
    access_token: String,
    user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    ai_room_id: Option<RoomId>,
}

#[derive(Serialize)]
struct UserResponse {
    user: User,
}

#[derive(Serialize)]
struct RoomsResponse {
    rooms: Vec<RoomView>,
}

#[derive(Serialize)]
struct RoomResponse {
    room: RoomView,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateRoomRequest {
    #[serde(default)]
    room_name: Option<String>,
    #[serde(default)]
    room_picture: Option<String>,
    #[serde(default)]
    room_join_code: Option<String>,
}

#[derive(Serialize)]
struct CreateRoomResponse {
    room_id: RoomId,
    room_code: String,
}

#[derive(Deserialize)]
struct JoinQuery {
    code: String,
}

#[derive(Serialize)]
struct JoinResponse {
    room_id: RoomId,
}

#[derive(Deserialize)]
struct LeaveQuery {
    id: RoomId,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateRoomRequest {
    #[serde(default)]
    room_name: Option<String>,
    #[serde(default)]
    room_picture: Option<String>,
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
    order: Option<String>,
    before: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct MessagesResponse {
    messages: Vec<Message>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PostMessageRequest {
    message: String,
}

#[derive(Serialize)]
struct PostMessageResponse {
    sent: Message,
}

#[derive(Deserialize)]
struct BanRequest {
    username: String,
}

#[derive(Deserialize)]
struct ResetRequest {
    #[serde(alias = "new_p")]
    new_password: String,
    #[serde(alias = "confirm_p")]
    confirm_password: String,
}

#[derive(Serialize)]
struct DeleteUserResponse {
    message: &'static str,
    removed: UserDeletion,
}

#[derive(Serialize)]
struct DeleteRoomResponse {
    message: &'static str,
    messages_deleted: usize,
}

#[derive(Serialize)]
struct AiSettingsResponse {
    settings: Stats,
}

#[derive(Serialize)]
struct ConfigResponse {
    config: Config,
}

// ─── Public endpoints ───

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> ApiResult<ServerInfoResponse> {
    let (registration_open, ai_enabled, system_message) = blocking(&state, |svc| {
        Ok((
            svc.registration_enabled()?,
            svc.ai_enabled()?,
            svc.system_message()?,
        ))
    })
    .await?;

    Ok(Json(ServerInfoResponse {
        name: APP_NAME,
        version: env!("CARGO_PKG_VERSION"),
        registration_open,
        ai_enabled,
        system_message,
    }))
}

async fn register(
    State(state): State<AppState>,
    req: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<TokenResponse> {
    let Json(req) = req?;
    let registration = blocking(&state, move |svc| {
        svc.register(&req.email, &req.username, &req.password)
    })
    .await?;

    Ok(Json(TokenResponse {
        access_token: registration.token,
        user_id: registration.user_id,
        ai_room_id: Some(registration.ai_room_id),
    }))
}

async fn login(
    State(state): State<AppState>,
    req: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<TokenResponse> {
    let Json(req) = req?;
    let session = blocking(&state, move |svc| svc.login(&req.email, &req.password)).await?;

    Ok(Json(TokenResponse {
        access_token: session.token,
        user_id: session.user_id,
        ai_room_id: None,
    }))
}

// ─── Signed-in user endpoints ───

async fn get_profile(headers: HeaderMap, State(state): State<AppState>) -> ApiResult<UserResponse> {
    let actor = current_user(&state, &headers)?;
    let user = blocking(&state, move |svc| svc.get_user(actor)).await?;
    Ok(Json(UserResponse { user }))
}

async fn update_profile(
    headers: HeaderMap,
    State(state): State<AppState>,
    req: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult<UserResponse> {
    let actor = current_user(&state, &headers)?;
    let Json(update) = req?;
    let user = blocking(&state, move |svc| svc.update_profile(actor, &update)).await?;
    Ok(Json(UserResponse { user }))
}

async fn list_rooms(headers: HeaderMap, State(state): State<AppState>) -> ApiResult<RoomsResponse> {
    let actor = current_user(&state, &headers)?;
    let rooms = blocking(&state, move |svc| svc.list_user_rooms(actor)).await?;
    Ok(Json(RoomsResponse {
        rooms: rooms.into_iter().map(RoomView::from).collect(),
    }))
}

async fn create_room(
    headers: HeaderMap,
    State(state): State<AppState>,
    req: Result<Json<CreateRoomRequest>, JsonRejection>,
) -> ApiResult<CreateRoomResponse> {
    let actor = current_user(&state, &headers)?;
    let Json(req) = req?;

    let (room_id, room_code) = blocking(&state, move |svc| {
        let name = req.room_name.unwrap_or_default();
        let picture = req.room_picture.as_deref();
        match req.room_join_code.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(code) => svc.create_room_with_code(actor, &name, picture, code.trim()),
            None => svc.create_room(actor, &name, picture),
        }
    })
    .await?;

    Ok(Json(CreateRoomResponse { room_id, room_code }))
}

async fn join_room(
    headers: HeaderMap,
    State(state): State<AppState>,
    query: Result<Query<JoinQuery>, QueryRejection>,
) -> ApiResult<JoinResponse> {
    let actor = current_user(&state, &headers)?;
    let Query(JoinQuery { code }) = query?;
    let room_id = blocking(&state, move |svc| svc.join_room(actor, &code)).await?;
    Ok(Json(JoinResponse { room_id }))
}

async fn leave_room(
    headers: HeaderMap,
    State(state): State<AppState>,
    query: Result<Query<LeaveQuery>, QueryRejection>,
) -> ApiResult<MessageResponse> {
    let actor = current_user(&state, &headers)?;
    let Query(LeaveQuery { id }) = query?;
    blocking(&state, move |svc| svc.leave_room(actor, id)).await?;
    MessageResponse::ok("Left room successfully!")
}

async fn get_room(
    headers: HeaderMap,
    State(state): State<AppState>,
    room_id: Result<Path<RoomId>, PathRejection>,
) -> ApiResult<RoomResponse> {
    let actor = current_user(&state, &headers)?;
    let Path(room_id) = room_id?;
    let room = blocking(&state, move |svc| svc.get_room(actor, room_id)).await?;
    Ok(Json(RoomResponse { room }))
}

async fn update_room(
    headers: HeaderMap,
    State(state): State<AppState>,
    room_id: Result<Path<RoomId>, PathRejection>,
    req: Result<Json<UpdateRoomRequest>, JsonRejection>,
) -> ApiResult<RoomResponse> {
    let actor = current_user(&state, &headers)?;
    let Path(room_id) = room_id?;
    let Json(req) = req?;
    let room = blocking(&state, move |svc| {
        svc.update_room(
            actor,
            room_id,
            req.room_name.as_deref(),
            req.room_picture.as_deref(),
        )
    })
    .await?;
    Ok(Json(RoomResponse { room }))
}

async fn room_messages(
    headers: HeaderMap,
    State(state): State<AppState>,
    room_id: Result<Path<RoomId>, PathRejection>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<MessagesResponse> {
    let actor = current_user(&state, &headers)?;
    let Path(room_id) = room_id?;
    let Query(query) = query?;

    let descending = match query.order.as_deref() {
        None => false,
        Some(raw) => {
            SortOrder::parse(raw).ok_or_else(|| {
                agora_shared::DomainError::from(ValidationError::InvalidSortOrder(raw.to_string()))
            })? == SortOrder::Desc
        }
    };

    let messages = blocking(&state, move |svc| match query.before {
        Some(before) => svc.messages_before(actor, room_id, before, query.limit),
        None => svc.room_messages(actor, room_id, query.limit, descending),
    })
    .await?;
    Ok(Json(MessagesResponse { messages }))
}

async fn post_message(
    headers: HeaderMap,
    State(state): State<AppState>,
    room_id: Result<Path<RoomId>, PathRejection>,
    req: Result<Json<PostMessageRequest>, JsonRejection>,
) -> ApiResult<PostMessageResponse> {
    let actor = current_user(&state, &headers)?;
    let Path(room_id) = room_id?;
    let Json(req) = req?;
    let sent = blocking(&state, move |svc| svc.post_message(actor, room_id, &req.message)).await?;
    Ok(Json(PostMessageResponse { sent }))
}

async fn ban_member(
    headers: HeaderMap,
    State(state): State<AppState>,
    room_id: Result<Path<RoomId>, PathRejection>,
    req: Result<Json<BanRequest>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    let actor = current_user(&state, &headers)?;
    let Path(room_id) = room_id?;
    let Json(req) = req?;
    blocking(&state, move |svc| svc.ban_member(actor, room_id, &req.username)).await?;
    MessageResponse::ok("User banned successfully!")
}

// ─── Admin endpoints ───

async fn admin_users(
    headers: HeaderMap,
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Page<UserSummary>> {
    let actor = current_user(&state, &headers)?;
    let Query(params) = params?;
    let page = blocking(&state, move |svc| svc.list_users(actor, &params)).await?;
    Ok(Json(page))
}

async fn admin_delete_user(
    headers: HeaderMap,
    State(state): State<AppState>,
    target: Result<Path<UserId>, PathRejection>,
) -> ApiResult<DeleteUserResponse> {
    let actor = current_user(&state, &headers)?;
    let Path(target) = target?;
    let removed = blocking(&state, move |svc| svc.delete_user(actor, target)).await?;
    Ok(Json(DeleteUserResponse {
        message: "User deleted successfully!",
        removed,
    }))
}

async fn admin_lock_unlock(
    headers: HeaderMap,
    State(state): State<AppState>,
    path: Result<Path<(UserId, String)>, PathRejection>,
) -> ApiResult<MessageResponse> {
    let actor = current_user(&state, &headers)?;
    let Path((target, action)) = path?;
    blocking(&state, move |svc| svc.lock_unlock_user(actor, target, &action)).await?;
    MessageResponse::ok("User status updated successfully!")
}

async fn admin_reset_password(
    headers: HeaderMap,
    State(state): State<AppState>,
    target: Result<Path<UserId>, PathRejection>,
    req: Result<Json<ResetRequest>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    let actor = current_user(&state, &headers)?;
    let Path(target) = target?;
    let Json(req) = req?;
    blocking(&state, move |svc| {
        svc.reset_user_password(actor, target, &req.new_password, &req.confirm_password)
    })
    .await?;
    MessageResponse::ok("User password reset successfully!")
}

async fn admin_rooms(
    headers: HeaderMap,
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Page<RoomSummary>> {
    let actor = current_user(&state, &headers)?;
    let Query(params) = params?;
    let page = blocking(&state, move |svc| svc.list_rooms(actor, &params)).await?;
    Ok(Json(page))
}

async fn admin_update_room(
    headers: HeaderMap,
    State(state): State<AppState>,
    room_id: Result<Path<RoomId>, PathRejection>,
    req: Result<Json<UpdateRoomRequest>, JsonRejection>,
) -> ApiResult<RoomResponse> {
    let actor = current_user(&state, &headers)?;
    let Path(room_id) = room_id?;
    let Json(req) = req?;
    let room = blocking(&state, move |svc| {
        svc.require_admin(actor)?;
        svc.update_room(
            actor,
            room_id,
            req.room_name.as_deref(),
            req.room_picture.as_deref(),
        )
    })
    .await?;
    Ok(Json(RoomResponse { room }))
}

async fn admin_delete_room(
    headers: HeaderMap,
    State(state): State<AppState>,
    room_id: Result<Path<RoomId>, PathRejection>,
) -> ApiResult<DeleteRoomResponse> {
    let actor = current_user(&state, &headers)?;
    let Path(room_id) = room_id?;
    let messages_deleted = blocking(&state, move |svc| svc.delete_room(actor, room_id)).await?;
    Ok(Json(DeleteRoomResponse {
        message: "Room deleted successfully!",
        messages_deleted,
    }))
}

async fn admin_messages(
    headers: HeaderMap,
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Page<MessageSummary>> {
    let actor = current_user(&state, &headers)?;
    let Query(params) = params?;
    let page = blocking(&state, move |svc| svc.list_messages(actor, &params)).await?;
    Ok(Json(page))
}

async fn admin_delete_message(
    headers: HeaderMap,
    State(state): State<AppState>,
    message_id: Result<Path<MessageId>, PathRejection>,
) -> ApiResult<MessageResponse> {
    let actor = current_user(&state, &headers)?;
    let Path(message_id) = message_id?;
    blocking(&state, move |svc| svc.delete_message(actor, message_id)).await?;
    MessageResponse::ok("Message deleted successfully!")
}

async fn admin_get_ai(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> ApiResult<AiSettingsResponse> {
    let actor = current_user(&state, &headers)?;
    let settings = blocking(&state, move |svc| svc.get_ai_settings(actor)).await?;
    Ok(Json(AiSettingsResponse { settings }))
}

async fn admin_update_ai(
    headers: HeaderMap,
    State(state): State<AppState>,
    req: Result<Json<AiSettingsUpdate>, JsonRejection>,
) -> ApiResult<AiSettingsResponse> {
    let actor = current_user(&state, &headers)?;
    let Json(update) = req?;
    let settings = blocking(&state, move |svc| svc.update_ai_settings(actor, update)).await?;
    Ok(Json(AiSettingsResponse { settings }))
}

async fn admin_get_config(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> ApiResult<ConfigResponse> {
    let actor = current_user(&state, &headers)?;
    let config = blocking(&state, move |svc| svc.get_config(actor)).await?;
    Ok(Json(ConfigResponse { config }))
}

async fn admin_update_config(
    headers: HeaderMap,
    State(state): State<AppState>,
    req: Result<Json<ConfigPatch>, JsonRejection>,
) -> ApiResult<ConfigResponse> {
    let actor = current_user(&state, &headers)?;
    let Json(patch) = req?;
    if patch.secret_key.is_some() {
        tracing::warn!(actor = %actor, "secret key changed, takes effect after restart");
    }
    let config = blocking(&state, move |svc| svc.update_config(actor, &patch)).await?;
    Ok(Json(ConfigResponse { config }))
}
