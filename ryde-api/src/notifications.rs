use axum::{
    extract::{Extension, Path, State},
    routing::{get, post},
    Json, Router,
};
use ryde_domain::{DomainEvent, Notification, NotificationKind};
use ryde_notify::NotifyError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::AuthedUser;
use crate::state::AppState;
use crate::stream;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/notifications", get(list_notifications))
        .route("/v1/notifications/unread-count", get(unread_count))
        .route("/v1/notifications/{id}/read", post(mark_read))
        .route("/v1/notifications/broadcast", post(broadcast))
        .route("/v1/notifications/stream", get(stream::notification_stream))
}

async fn list_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications = state.notifier.list_notifications(user.id).await?;
    Ok(Json(notifications))
}

#[derive(Debug, Serialize)]
struct UnreadCountResponse {
    unread: u64,
}

async fn unread_count(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let unread = state.notifier.unread_count(user.id).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

async fn mark_read(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.notifier.mark_read(id, user.id).await?;
    Ok(Json(serde_json::json!({ "status": "read" })))
}

#[derive(Debug, Deserialize)]
struct BroadcastRequest {
    kind: String,
    message: String,
    car_id: Option<Uuid>,
    car_name: Option<String>,
    /// Explicit recipients; omitted means every reachable user.
    user_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize)]
struct BroadcastResponse {
    stored: usize,
}

/// Admin announcement fan-out. The wire-level `kind` string is parsed here;
/// unknown types are rejected rather than silently dropped.
async fn broadcast(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Json(req): Json<BroadcastRequest>,
) -> Result<Json<BroadcastResponse>, AppError> {
    if !user.is_admin() {
        return Err(AppError::AuthorizationError(
            "broadcast is admin-only".into(),
        ));
    }

    let kind = NotificationKind::parse(&req.kind)
        .ok_or_else(|| NotifyError::UnknownEvent(req.kind.clone()))?;

    // recipient ids are filled in per user by the dispatcher
    let event = match kind {
        NotificationKind::MessageReceived => DomainEvent::MessageReceived {
            user_id: Uuid::nil(),
            sender_name: "Ryde Team".into(),
            preview: req.message,
        },
        NotificationKind::CarAvailable => DomainEvent::CarAvailable {
            user_id: Uuid::nil(),
            car_id: req
                .car_id
                .ok_or_else(|| AppError::ValidationError("car_id is required".into()))?,
            car_name: req.car_name.unwrap_or_else(|| "A car you follow".into()),
        },
        other => {
            return Err(AppError::ValidationError(format!(
                "event type {} cannot be broadcast",
                other.as_str()
            )))
        }
    };

    let stored = match req.user_ids {
        Some(ids) => state.notifier.dispatch_to_many(&ids, &event).await,
        None => state.notifier.dispatch_to_all(&event).await,
    };

    Ok(Json(BroadcastResponse { stored }))
}
