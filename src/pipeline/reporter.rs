use crate::api::rest::violation_controller::{ViolateRequest, ViolateResponse};
use crate::api::rest::ApiError;
use crate::db::models::ViolationRecord;
use crate::error::Error;
use crate::pipeline::session::ViolationSink;
use crate::recorder::{ViolationRecorder, ViolationReport};
use anyhow::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, info};
use reqwest::StatusCode;
use std::time::Duration;

#[async_trait]
impl ViolationSink for ViolationRecorder {
    async fn report(&self, report: ViolationReport) -> Result<ViolationRecord> {
        self.record(report).await
    }
}

/// Reports violations to a remote log service over its `/violate` endpoint
pub struct HttpReporter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpReporter {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/violate", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl ViolationSink for HttpReporter {
    async fn report(&self, report: ViolationReport) -> Result<ViolationRecord> {
        let location = report.location.ok_or_else(|| {
            Error::LocationUnavailable("Location is required to report a violation".to_string())
        })?;

        let request = ViolateRequest {
            log_location: Some(location.to_string()),
            image: Some(STANDARD.encode(&report.image)),
        };

        debug!("Reporting violation at {} to {}", location, self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Http(format!("Failed to reach {}: {}", self.endpoint, e)))?;

        let status = response.status();
        if status.is_success() {
            let created: ViolateResponse = response
                .json()
                .await
                .map_err(|e| Error::Serialization(format!("Unexpected response: {}", e)))?;
            info!("Violation reported as log {}", created.log.log_id);
            return Ok(created.log);
        }

        let body = response.json::<ApiError>().await.ok();
        Err(remote_error(status, body).into())
    }
}

/// Rebuild the server's error kind from its response. Falls back to the
/// status when the body names no known kind.
fn remote_error(status: StatusCode, body: Option<ApiError>) -> Error {
    let Some(body) = body else {
        return match status {
            StatusCode::BAD_REQUEST => Error::Validation(status.to_string()),
            StatusCode::NOT_FOUND => Error::NotFound(status.to_string()),
            _ => Error::StorageWrite(status.to_string()),
        };
    };

    if let Some(kind) = body.kind.as_deref() {
        // The server sends the Display form; drop its kind prefix so it is not repeated.
        let prefix = Error::from_kind(kind, String::new()).map(|e| e.to_string());
        let detail = match &prefix {
            Some(prefix) => body.message.strip_prefix(prefix.as_str()).unwrap_or(&body.message),
            None => &body.message,
        };
        if let Some(err) = Error::from_kind(kind, detail.to_string()) {
            return err;
        }
    }

    match status {
        StatusCode::BAD_REQUEST => Error::Validation(body.message),
        StatusCode::NOT_FOUND => Error::NotFound(body.message),
        _ => Error::StorageWrite(body.message),
    }
}
