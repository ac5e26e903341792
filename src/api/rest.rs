use crate::config::Config;
use crate::db::repositories::subscriptions::SubscriptionsRepository;
use crate::db::repositories::violation_logs::ViolationLogsRepository;
use crate::error::Error;
use crate::recorder::ViolationRecorder;
use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

pub mod subscription_controller;
pub mod violation_controller;

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub recorder: Arc<ViolationRecorder>,
    pub logs: Arc<ViolationLogsRepository>,
    pub subscriptions: Arc<SubscriptionsRepository>,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
    pub status: u16,
    /// `Error::kind()` of the failure, when it came from a crate error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            message: message.into(),
            status: StatusCode::BAD_REQUEST.as_u16(),
            kind: None,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::Validation(_) | Error::LocationUnavailable(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        ApiError {
            message: err.to_string(),
            status: status.as_u16(),
            kind: Some(err.kind().to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(err) = err.downcast_ref::<Error>() {
            return (*err).clone().into();
        }

        ApiError {
            message: err.to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            kind: None,
        }
    }
}

/// Implement IntoResponse for ApiError
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(self);
        (status, body).into_response()
    }
}

/// Build the full application: JSON routes, the image directory, CORS and
/// the request body limit
pub fn create_router(state: AppState, config: &Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_credentials(false)
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/", get(index))
        .merge(violation_controller::create_router())
        .merge(subscription_controller::create_router())
        .with_state(state)
        .nest_service(
            &config.storage.image_route(),
            ServeDir::new(&config.storage.image_dir),
        )
        .layer(DefaultBodyLimit::max(config.api.max_body_bytes))
        .layer(cors)
}

async fn index() -> &'static str {
    "HULECA violation log service is running"
}

pub struct RestApi {
    config: Config,
    state: AppState,
}

impl RestApi {
    pub fn new(config: &Config, state: AppState) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            state,
        })
    }

    /// Serve until `shutdown` resolves
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = create_router(self.state.clone(), &self.config);

        let addr = self.config.api.address.clone() + ":" + &self.config.api.port.to_string();
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::Config(format!("Invalid API address {}: {}", addr, e)))?;

        let listener = TcpListener::bind(addr).await?;
        info!("API server listening on {}", addr);

        axum::Server::from_tcp(listener.into_std()?)?
            .serve(app.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("API server stopped");
        Ok(())
    }
}
