use crate::api::rest::{ApiError, ApiResult, AppState};
use crate::db::models::PushSubscription;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscribeResponse {
    pub message: String,
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/subscribe", post(subscribe))
}

async fn subscribe(
    State(state): State<AppState>,
    body: Result<Json<PushSubscription>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubscribeResponse>)> {
    let Json(subscription) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    if state.subscriptions.register(subscription).await? {
        Ok((
            StatusCode::CREATED,
            Json(SubscribeResponse {
                message: "Subscription added".to_string(),
            }),
        ))
    } else {
        Ok((
            StatusCode::OK,
            Json(SubscribeResponse {
                message: "Already subscribed".to_string(),
            }),
        ))
    }
}
