use axum::{
    extract::{Extension, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use ryde_domain::{PushSubscription, SubscriptionKeys};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::auth::AuthedUser;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/push/subscribe", post(subscribe).delete(unsubscribe))
}

#[derive(Debug, Deserialize)]
struct SubscribeRequest {
    endpoint: String,
    keys: SubscriptionKeys,
}

async fn subscribe(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Json(req): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<PushSubscription>), AppError> {
    let subscription = state
        .subscriptions
        .subscribe(user.id, req.endpoint, req.keys)
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

async fn unsubscribe(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
) -> Result<StatusCode, AppError> {
    state.subscriptions.unsubscribe(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
