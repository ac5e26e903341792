use crate::api::rest::{ApiError, ApiResult, AppState};
use crate::db::models::{GeoLocation, TimeWindow, ViolationRecord};
use crate::error::Error;
use crate::recorder::ViolationReport;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Local;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Body of a violation report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViolateRequest {
    /// "lat, lon"
    #[serde(rename = "logLocation", default)]
    pub log_location: Option<String>,
    /// Base64 image, bare or as a data URL
    #[serde(alias = "logImagePath", default)]
    pub image: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ViolateResponse {
    pub message: String,
    pub log: ViolationRecord,
}

#[derive(Debug, Deserialize)]
pub struct WindowParams {
    pub window: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: usize,
    pub window: Option<TimeWindow>,
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/logs", get(list_logs))
        .route("/logs/count", get(count_logs))
        .route("/violate", post(report_violation))
}

fn parse_window(params: &WindowParams) -> Result<Option<TimeWindow>, Error> {
    match params.window.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(window) => window.parse().map(Some),
    }
}

/// Decode a bare base64 payload or a `data:<mime>;base64,<payload>` URL
pub fn decode_image(encoded: &str) -> Result<Vec<u8>, Error> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };

    STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::Validation(format!("Image is not valid base64: {}", e)))
}

async fn list_logs(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> ApiResult<Json<Vec<ViolationRecord>>> {
    let window = parse_window(&params)?;
    let logs = state.logs.filter(window, Local::now().naive_local()).await?;
    Ok(Json(logs))
}

async fn count_logs(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> ApiResult<Json<CountResponse>> {
    let window = parse_window(&params)?;
    let count = state
        .logs
        .count_where(window, Local::now().naive_local())
        .await?;
    Ok(Json(CountResponse { count, window }))
}

async fn report_violation(
    State(state): State<AppState>,
    body: Result<Json<ViolateRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ViolateResponse>)> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let (Some(location), Some(image)) = (
        request.log_location.filter(|l| !l.trim().is_empty()),
        request.image.filter(|i| !i.trim().is_empty()),
    ) else {
        return Err(Error::Validation("Both logLocation and image are required".to_string()).into());
    };

    let location: GeoLocation = location.parse()?;
    let image = decode_image(&image)?;

    let log = state
        .recorder
        .record(ViolationReport {
            location: Some(location),
            image,
        })
        .await
        .map_err(|e| {
            warn!("Violation report rejected: {}", e);
            ApiError::from(e)
        })?;

    info!("Violation {} logged via API", log.log_id);
    Ok((
        StatusCode::CREATED,
        Json(ViolateResponse {
            message: "Log added successfully".to_string(),
            log,
        }),
    ))
}
