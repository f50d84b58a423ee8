//! HTTP settings surface and emote intake.
//!
//! Routes:
//!
//! - `GET  /health`
//! - `GET  /settings`, `PUT /settings`
//! - `GET  /settings/interval`, `PUT /settings/interval`
//! - `GET  /settings/threshold`, `PUT /settings/threshold`
//! - `GET  /settings/allowed-emotes`, `PUT /settings/allowed-emotes`
//! - `POST /emotes`
//!
//! A rejected value answers `400 {"error": ...}` and leaves state unchanged.
//! Once the node begins shutting down, `POST /emotes` answers `503`.

use crate::domain::{Settings, SettingsError, SettingsStore};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use shared_bus::{BusError, BusMessage, TopicBus};
use shared_types::{parse_timestamp, topics, RawEmoteRecord};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Shared state of the settings API.
#[derive(Clone)]
pub struct ApiState {
    pub settings: Arc<SettingsStore>,
    pub bus: Arc<dyn TopicBus>,
    /// Flips to `true` when the node stops accepting reactions.
    pub shutdown: watch::Receiver<bool>,
}

impl ApiState {
    pub fn new(
        settings: Arc<SettingsStore>,
        bus: Arc<dyn TopicBus>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            settings,
            bus,
            shutdown,
        }
    }

    fn accepting(&self) -> bool {
        !*self.shutdown.borrow()
    }
}

/// Error answer of the API.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<SettingsError> for ApiError {
    fn from(e: SettingsError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

/// Build the router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/settings", get(get_settings).put(put_settings))
        .route("/settings/interval", get(get_interval).put(put_interval))
        .route("/settings/threshold", get(get_threshold).put(put_threshold))
        .route(
            "/settings/allowed-emotes",
            get(get_allowed_emotes).put(put_allowed_emotes),
        )
        .route("/emotes", post(post_emote))
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Unwrap a JSON body, mapping extractor rejections onto `invalid`.
fn body(
    payload: Result<Json<Value>, JsonRejection>,
    invalid: SettingsError,
) -> Result<Value, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            debug!(error = %rejection, "Rejected settings body");
            Err(invalid.into())
        }
    }
}

fn parse_interval(value: Option<&Value>) -> Result<usize, SettingsError> {
    value
        .and_then(Value::as_u64)
        .filter(|v| *v > 0)
        .and_then(|v| usize::try_from(v).ok())
        .ok_or(SettingsError::InvalidInterval)
}

fn parse_threshold(value: Option<&Value>) -> Result<f64, SettingsError> {
    value
        .filter(|v| v.is_number())
        .and_then(Value::as_f64)
        .ok_or(SettingsError::InvalidThreshold)
}

fn parse_allowed_emotes(value: Option<&Value>) -> Result<Vec<String>, SettingsError> {
    let items = value
        .and_then(Value::as_array)
        .ok_or(SettingsError::InvalidAllowedEmotes)?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or(SettingsError::InvalidAllowedEmotes)
        })
        .collect()
}

async fn get_settings(State(state): State<ApiState>) -> Json<Value> {
    Json(json!(*state.settings.snapshot()))
}

async fn put_settings(
    State(state): State<ApiState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let value = match payload {
        Ok(Json(value)) => value,
        Err(_) => return Err(ApiError::BadRequest("Invalid settings value".into())),
    };
    let settings = Settings {
        interval: parse_interval(value.get("interval"))?,
        threshold: parse_threshold(value.get("threshold"))?,
        allowed_emotes: parse_allowed_emotes(value.get("allowedEmotes"))?,
    };
    let applied = state.settings.replace(settings)?;
    Ok(Json(json!(*applied)))
}

async fn get_interval(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({ "interval": state.settings.snapshot().interval }))
}

async fn put_interval(
    State(state): State<ApiState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let value = body(payload, SettingsError::InvalidInterval)?;
    let interval = state
        .settings
        .set_interval(parse_interval(value.get("interval"))?)?;
    Ok(Json(json!({ "interval": interval })))
}

async fn get_threshold(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({ "threshold": state.settings.snapshot().threshold }))
}

async fn put_threshold(
    State(state): State<ApiState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let value = body(payload, SettingsError::InvalidThreshold)?;
    let threshold = state
        .settings
        .set_threshold(parse_threshold(value.get("threshold"))?)?;
    Ok(Json(json!({ "threshold": threshold })))
}

async fn get_allowed_emotes(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({ "allowedEmotes": state.settings.snapshot().allowed_emotes }))
}

async fn put_allowed_emotes(
    State(state): State<ApiState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let value = body(payload, SettingsError::InvalidAllowedEmotes)?;
    let emotes = state
        .settings
        .set_allowed_emotes(parse_allowed_emotes(value.get("allowedEmotes"))?)?;
    Ok(Json(json!({ "allowedEmotes": emotes })))
}

/// Publish a viewer reaction onto `raw-emote-data`.
async fn post_emote(
    State(state): State<ApiState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if !state.accepting() {
        debug!("Emote rejected, intake closed");
        return Err(ApiError::Unavailable("Emote intake closed".into()));
    }

    let invalid = || ApiError::BadRequest("Invalid emote value".into());
    let Ok(Json(value)) = payload else {
        return Err(invalid());
    };

    let emote = value
        .get("emote")
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty())
        .ok_or_else(invalid)?;
    let timestamp = match value.get("timestamp") {
        None | Some(Value::Null) => Utc::now().to_rfc3339(),
        Some(Value::String(raw)) => {
            parse_timestamp(raw).map_err(|_| invalid())?;
            raw.clone()
        }
        Some(_) => return Err(invalid()),
    };

    let record = RawEmoteRecord {
        emote: emote.to_string(),
        timestamp,
    };
    let payload =
        serde_json::to_vec(&record).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    match state
        .bus
        .publish(BusMessage::new(topics::RAW_EMOTE_DATA, payload))
        .await
    {
        Ok(_) => Ok((StatusCode::ACCEPTED, Json(json!({ "status": "accepted" })))),
        Err(BusError::Closed) => Err(ApiError::Unavailable("Emote intake unavailable".into())),
        Err(e) => {
            warn!(error = %e, "Emote intake publish failed");
            Err(ApiError::BadRequest(e.to_string()))
        }
    }
}
