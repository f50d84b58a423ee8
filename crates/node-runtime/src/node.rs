//! Node wiring: one bus shared by the aggregator, the relay and the media
//! source, two HTTP listeners and the ordered shutdown.

use crate::config::{ConfigError, NodeConfig};
use crate::supervisor::{RetryPolicy, Retryable, Supervisor, SupervisorExit};
use axum::Router;
use es_01_emote_aggregator::{api_router, ApiState, EmoteAggregator, SettingsStore};
use es_02_broadcast_relay::{ConnectionRegistry, RelayError, RelayService};
use es_03_media_source::{MediaSource, MediaSourceConfig};
use shared_bus::{InMemoryTopicBus, TopicBus};
use std::fmt::Display;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// How long each shutdown step waits for tasks and servers.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Node startup and runtime failures.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid relay configuration: {0}")]
    Relay(#[from] RelayError),

    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: SocketAddr, reason: String },

    #[error("{task} stopped: {exit:?}")]
    TaskFailed {
        task: &'static str,
        exit: SupervisorExit,
    },
}

/// A configured node that has not started yet.
pub struct EmoteStreamNode {
    config: NodeConfig,
    bus: Arc<InMemoryTopicBus>,
    settings: Arc<SettingsStore>,
    registry: Arc<ConnectionRegistry>,
    relay: Arc<RelayService>,
}

impl EmoteStreamNode {
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;

        let bus = Arc::new(InMemoryTopicBus::with_config(config.bus_config()));
        let settings = Arc::new(SettingsStore::default());
        let registry = Arc::new(ConnectionRegistry::new());
        let relay = Arc::new(RelayService::new(
            bus.clone(),
            Arc::clone(&registry),
            config.relay_config(),
        )?);

        Ok(Self {
            config,
            bus,
            settings,
            registry,
            relay,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Bind both listeners, then spawn the servers and supervised tasks.
    ///
    /// Nothing is spawned if either bind fails.
    pub async fn start(self) -> Result<RunningNode, NodeError> {
        let (relay_listener, relay_addr) = bind(self.config.relay_addr()).await?;
        let (settings_listener, settings_addr) = bind(self.config.settings_addr()).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (stop_servers_tx, stop_servers_rx) = watch::channel(false);
        let (fatal_tx, fatal_rx) = mpsc::channel(4);
        let bus: Arc<dyn TopicBus> = self.bus.clone();
        let policy = self.config.retry_policy();

        let api = api_router(ApiState::new(
            Arc::clone(&self.settings),
            Arc::clone(&bus),
            shutdown_rx.clone(),
        ));
        let viewers = self.relay.router(shutdown_rx.clone());
        let servers = vec![
            serve("relay", relay_listener, viewers, stop_servers_rx.clone()),
            serve("settings", settings_listener, api, stop_servers_rx),
        ];

        let mut tasks = Vec::new();

        let aggregator = Arc::new(Mutex::new(EmoteAggregator::new(
            Arc::clone(&bus),
            Arc::clone(&self.settings),
        )));
        tasks.push(supervise(
            "aggregator",
            policy,
            shutdown_rx.clone(),
            fatal_tx.clone(),
            move |shutdown| {
                let aggregator = Arc::clone(&aggregator);
                async move { aggregator.lock().await.run(shutdown).await }
            },
        ));

        let relay = Arc::clone(&self.relay);
        tasks.push(supervise(
            "relay",
            policy,
            shutdown_rx.clone(),
            fatal_tx.clone(),
            move |shutdown| {
                let relay = Arc::clone(&relay);
                async move { relay.run(shutdown).await }
            },
        ));

        match &self.config.video_path {
            Some(path) => {
                let media = Arc::new(MediaSource::new(
                    Arc::clone(&bus),
                    MediaSourceConfig::new(path.clone()),
                ));
                tasks.push(supervise(
                    "media-source",
                    policy,
                    shutdown_rx,
                    fatal_tx,
                    move |shutdown| {
                        let media = Arc::clone(&media);
                        async move { media.run(shutdown).await }
                    },
                ));
            }
            None => info!("VIDEO_PATH not set, media source disabled"),
        }

        info!(
            relay = %relay_addr,
            settings = %settings_addr,
            server_name = %self.config.server_name,
            "Emote-stream node running"
        );

        Ok(RunningNode {
            relay_addr,
            settings_addr,
            bus: self.bus,
            settings: self.settings,
            registry: self.registry,
            shutdown_tx,
            stop_servers_tx,
            tasks,
            servers,
            fatal_rx,
        })
    }
}

/// A started node.
pub struct RunningNode {
    relay_addr: SocketAddr,
    settings_addr: SocketAddr,
    bus: Arc<InMemoryTopicBus>,
    settings: Arc<SettingsStore>,
    registry: Arc<ConnectionRegistry>,
    shutdown_tx: watch::Sender<bool>,
    stop_servers_tx: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<SupervisorExit>)>,
    servers: Vec<(&'static str, JoinHandle<std::io::Result<()>>)>,
    fatal_rx: mpsc::Receiver<NodeError>,
}

impl RunningNode {
    /// Bound address of the WebSocket relay.
    pub fn relay_addr(&self) -> SocketAddr {
        self.relay_addr
    }

    /// Bound address of the settings API.
    pub fn settings_addr(&self) -> SocketAddr {
        self.settings_addr
    }

    pub fn bus(&self) -> &Arc<InMemoryTopicBus> {
        &self.bus
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Wait until a supervised task fails for good.
    ///
    /// Returns `None` once every task has ended without such a failure.
    pub async fn fatal(&mut self) -> Option<NodeError> {
        self.fatal_rx.recv().await
    }

    /// Stop accepting reactions and viewers, and tell every task to stop.
    ///
    /// From here `POST /emotes` and `/ws` answer `503`. Idempotent.
    pub fn begin_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Ordered shutdown. Returns how each supervised task ended.
    pub async fn shutdown(self) -> Vec<(&'static str, SupervisorExit)> {
        info!("Initiating graceful shutdown");

        // 1. Close intake, then drain ingestion, relaying and the media source.
        self.begin_shutdown();
        let mut exits = Vec::with_capacity(self.tasks.len());
        for (name, mut handle) in self.tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
                Ok(Ok(exit)) => exits.push((name, exit)),
                Ok(Err(e)) => error!(task = name, error = %e, "Task panicked"),
                Err(_) => {
                    warn!(task = name, "Task did not stop in time, aborting");
                    handle.abort();
                }
            }
        }

        // 2. Viewers.
        let closed = self.registry.close_all();
        info!(closed, "Viewer connections closed");

        // 3. Transport.
        self.bus.close();

        // 4. HTTP servers.
        let _ = self.stop_servers_tx.send(true);
        for (name, mut handle) in self.servers {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
                Ok(Ok(Ok(()))) => info!(server = name, "Server stopped"),
                Ok(Ok(Err(e))) => error!(server = name, error = %e, "Server failed"),
                Ok(Err(e)) => error!(server = name, error = %e, "Server task panicked"),
                Err(_) => {
                    warn!(server = name, "Server did not stop in time, aborting");
                    handle.abort();
                }
            }
        }

        info!("Shutdown complete");
        exits
    }
}

async fn bind(addr: SocketAddr) -> Result<(TcpListener, SocketAddr), NodeError> {
    let bind_error = |e: std::io::Error| NodeError::Bind {
        addr,
        reason: e.to_string(),
    };
    let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
    let local = listener.local_addr().map_err(bind_error)?;
    Ok((listener, local))
}

fn serve(
    name: &'static str,
    listener: TcpListener,
    router: Router,
    stop: watch::Receiver<bool>,
) -> (&'static str, JoinHandle<std::io::Result<()>>) {
    let handle = tokio::spawn(async move {
        info!(server = name, "HTTP server listening");
        axum::serve(listener, router)
            .with_graceful_shutdown(stopped(stop))
            .await
    });
    (name, handle)
}

async fn stopped(mut stop: watch::Receiver<bool>) {
    loop {
        if *stop.borrow() {
            return;
        }
        if stop.changed().await.is_err() {
            return;
        }
    }
}

fn supervise<F, Fut, E>(
    name: &'static str,
    policy: RetryPolicy,
    shutdown: watch::Receiver<bool>,
    fatal: mpsc::Sender<NodeError>,
    attempt: F,
) -> (&'static str, JoinHandle<SupervisorExit>)
where
    F: FnMut(watch::Receiver<bool>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Retryable + Display + Send + 'static,
{
    let handle = tokio::spawn(async move {
        let exit = Supervisor::new(name, policy, shutdown).run(attempt).await;
        if exit.is_failure() {
            let _ = fatal
                .send(NodeError::TaskFailed {
                    task: name,
                    exit: exit.clone(),
                })
                .await;
        }
        exit
    });
    (name, handle)
}
