//! Relay service: the consume loop and the HTTP/WebSocket surface.
//!
//! `aggregated-emote-data` and `video-stream` share one subscription and are
//! relayed in arrival order. Neither stream has priority over the other.
//!
//! Once shutdown is signalled, `/ws` refuses new viewers with `503`.

use crate::domain::RelayConfig;
use crate::error::RelayError;
use crate::registry::ConnectionRegistry;
use crate::relay::{BroadcastRelay, RelayReport};
use crate::ws::handle_socket;
use axum::{
    extract::{ws::rejection::WebSocketUpgradeRejection, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use shared_bus::{BusMessage, TopicBus, TopicFilter};
use shared_types::{topics, AggregatedEmoteRecord, MediaChunk};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Shared state of the relay router.
#[derive(Clone)]
pub struct RelayState {
    pub registry: Arc<ConnectionRegistry>,
    pub config: Arc<RelayConfig>,
    /// Flips to `true` when the node stops accepting viewers.
    pub shutdown: watch::Receiver<bool>,
}

/// Routes: `GET /ws` (upgrade) and `GET /health`.
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/health", get(health_check))
        .with_state(state)
}

async fn ws_upgrade(
    State(state): State<RelayState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if *state.shutdown.borrow() {
        debug!("Refusing viewer, relay shutting down");
        return shutting_down();
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let RelayState {
        registry,
        config,
        shutdown,
    } = state;
    ws.max_message_size(config.max_message_size)
        .on_upgrade(move |socket| async move {
            // The handshake may finish after the registry was emptied.
            if *shutdown.borrow() {
                debug!("Dropping late upgrade, relay shutting down");
                return;
            }
            handle_socket(socket, registry, config).await
        })
}

fn shutting_down() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": "Relay shutting down" })),
    )
        .into_response()
}

async fn health_check(State(state): State<RelayState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "connections": state.registry.len(),
    }))
}

/// Consumes moments and media chunks and relays them to viewers.
pub struct RelayService {
    bus: Arc<dyn TopicBus>,
    relay: BroadcastRelay,
    config: Arc<RelayConfig>,
}

impl RelayService {
    pub fn new(
        bus: Arc<dyn TopicBus>,
        registry: Arc<ConnectionRegistry>,
        config: RelayConfig,
    ) -> Result<Self, RelayError> {
        config.validate()?;
        Ok(Self {
            bus,
            relay: BroadcastRelay::new(registry),
            config: Arc::new(config),
        })
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.relay.registry()
    }

    pub fn relay(&self) -> &BroadcastRelay {
        &self.relay
    }

    /// Router serving viewers until `shutdown` flips to `true`.
    pub fn router(&self, shutdown: watch::Receiver<bool>) -> Router {
        router(RelayState {
            registry: Arc::clone(self.relay.registry()),
            config: Arc::clone(&self.config),
            shutdown,
        })
    }

    /// Connect, subscribe and relay until shutdown or failure.
    ///
    /// Returns `Ok(())` only when `shutdown` fires.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), RelayError> {
        self.bus.connect().await?;
        let mut subscription = self.bus.subscribe(TopicFilter::topics([
            topics::AGGREGATED_EMOTE_DATA,
            topics::VIDEO_STREAM,
        ]))?;
        info!("Relay subscribed to moments and media");

        loop {
            if *shutdown.borrow() {
                info!("Relay stopping");
                return Ok(());
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Relay stopping");
                        return Ok(());
                    }
                }
                message = subscription.recv() => {
                    match message {
                        Some(message) => {
                            self.handle_message(&message);
                        }
                        None => return Err(RelayError::SubscriptionEnded),
                    }
                }
            }
        }
    }

    /// Relay one bus message. Malformed payloads and unknown topics are logged
    /// and skipped (`None`).
    pub fn handle_message(&self, message: &BusMessage) -> Option<RelayReport> {
        let result = match message.topic.as_str() {
            topics::AGGREGATED_EMOTE_DATA => {
                let moment = match AggregatedEmoteRecord::from_slice(&message.payload)
                    .and_then(AggregatedEmoteRecord::into_moment)
                {
                    Ok(moment) => moment,
                    Err(e) => {
                        warn!(error = %e, "Skipping malformed moment");
                        return None;
                    }
                };
                self.relay.relay_moment(&moment)
            }
            topics::VIDEO_STREAM => {
                let index = message
                    .header(topics::INDEX_HEADER)
                    .and_then(|raw| raw.trim().parse::<u64>().ok())
                    .unwrap_or(0);
                self.relay
                    .relay_chunk(&MediaChunk::new(index, message.payload.clone()))
            }
            other => {
                debug!(topic = other, "Ignoring message on unexpected topic");
                return None;
            }
        };

        match result {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, topic = %message.topic, "Relay failed");
                None
            }
        }
    }
}
