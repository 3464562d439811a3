//! WebSocket/HTTP sensor gateway — the stream realization of the Sensor
//! Event Gateway core.
//!
//! SM is out of scope for this repository; this binary links
//! `sm_iface::MockSm` as its SM collaborator, the same stance
//! `udp-sender` takes, so it can run standalone for demos and
//! integration tests.

pub mod config;
pub mod handshake;
pub mod http;
pub mod names;
pub mod ws_session;

use config::WsGateConfig;
use gateway_core::directory::{NameResolver, SensorDirectory};
use gateway_core::event_loop::{EventLoop, LoopCommand, SystemAction};
use gateway_core::session_stream::HandshakeRequest;
use gateway_core::shutdown::{self, ShutdownSignal};
use gateway_core::{GatewayError, ValueCache};
use names::NameIndex;
use sm_iface::MockSm;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// No name service exists outside SM, so the directory only admits
/// records carrying an explicit numeric `id` — the same stance
/// `udp-sender` takes for directory construction; short-name lookups for
/// handshake CSVs are handled separately by `NameIndex`.
struct NoNameService;
impl NameResolver for NoNameService {
    fn resolve(&self, _name: &str) -> Option<sensor_wire::SensorId> {
        None
    }
}

/// Shared, cheaply-clonable application state handed to every axum
/// handler and session task.
#[derive(Clone)]
pub struct AppState(Arc<Inner>);

struct Inner {
    config: WsGateConfig,
    names: NameIndex,
    directory: SensorDirectory,
    commands: mpsc::UnboundedSender<LoopCommand>,
    shutdown: ShutdownSignal,
    session_count: AtomicUsize,
    next_subscriber: AtomicI64,
}

impl AppState {
    pub fn config(&self) -> &WsGateConfig {
        &self.0.config
    }

    pub fn names(&self) -> &NameIndex {
        &self.0.names
    }

    pub fn commands(&self) -> mpsc::UnboundedSender<LoopCommand> {
        self.0.commands.clone()
    }

    pub fn shutdown(&self) -> ShutdownSignal {
        self.0.shutdown.clone()
    }

    /// A fresh, process-unique subscriber identity for one WebSocket
    /// session. Deliberately disjoint from real sensor ids (which are
    /// non-negative in this workspace's configs) so the registry's
    /// `(subscriber, id)` keys never collide with a sensor acting as its
    /// own subscriber, as `udp-sender` does with `PROCESS_SUBSCRIBER`.
    pub fn new_subscriber(&self) -> sensor_wire::SensorId {
        sensor_wire::SensorId(self.0.next_subscriber.fetch_sub(1, Ordering::Relaxed))
    }

    pub fn session_started(&self) -> usize {
        self.0.session_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn session_ended(&self) {
        self.0.session_count.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn at_capacity(&self) -> bool {
        self.0.session_count.load(Ordering::SeqCst) >= self.0.config.ws_max
    }

    /// Narrows a raw handshake's sensor list down to the configured
    /// directory's admitted set, when one is configured. An empty
    /// `[[sensors]]` table means no restriction — any id or resolvable
    /// name the peer names is accepted, matching a deployment that lets
    /// peers address SM's sensor space directly.
    fn admit(&self, raw: HandshakeRequest) -> Result<HandshakeRequest, String> {
        if self.0.directory.entries().is_empty() {
            return Ok(raw);
        }
        let admitted: HashSet<_> = self.0.directory.ids().collect();
        let sensor_ids: Vec<_> = raw.sensor_ids.into_iter().filter(|id| admitted.contains(id)).collect();
        if sensor_ids.is_empty() {
            return Err("handshake: no requested sensor is in the configured directory".into());
        }
        Ok(HandshakeRequest { sensor_ids, format: raw.format })
    }

    #[cfg(test)]
    pub(crate) fn for_tests(
        config: WsGateConfig,
        names: NameIndex,
        commands: mpsc::UnboundedSender<LoopCommand>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self(Arc::new(Inner {
            config,
            names,
            directory: SensorDirectory::from_entries(Vec::new()),
            commands,
            shutdown,
            session_count: AtomicUsize::new(0),
            next_subscriber: AtomicI64::new(-1),
        }))
    }
}

pub async fn run(cfg: WsGateConfig) -> Result<(), GatewayError> {
    let directory = SensorDirectory::build(&cfg.sensors, &cfg.filter, &NoNameService, false).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "ws-gate: directory build failed, proceeding with no admission restriction");
        SensorDirectory::from_entries(Vec::new())
    });
    let names = NameIndex::build(&cfg.sensors);
    tracing::info!(name = %cfg.name, directory_entries = directory.entries().len(), "ws-gate: starting");

    let sm = Arc::new(MockSm::new());
    let cache = Arc::new(ValueCache::new());
    let (shutdown_tx, shutdown_rx) = shutdown::channel();

    let sm_ready_timeout = cfg.sm_ready_timeout.as_duration().unwrap_or(Duration::from_secs(3600));
    sm.wait_sm_ready(sm_ready_timeout).await.map_err(|e| GatewayError::SmUnready(e.to_string()))?;

    let (mut event_loop, commands) = EventLoop::new(sm.clone(), cache.clone(), shutdown_rx.clone(), Duration::from_millis(50));

    let shutdown_for_loop = shutdown_tx.clone();
    let loop_task = tokio::spawn(async move {
        event_loop
            .run(move |action| match action {
                SystemAction::StartUp => tracing::info!("ws-gate: SM reports StartUp"),
                SystemAction::FoldUpOrFinish => {
                    tracing::info!("ws-gate: SM reports FoldUp/Finish, shutting down");
                    shutdown_for_loop.request_shutdown("SM FoldUp/Finish");
                }
                SystemAction::WatchDogRemote => tracing::warn!("ws-gate: SM watchdog (remote), registry re-asked every entry"),
                SystemAction::WatchDogLocal => {}
                SystemAction::LogRotate => {}
            }, |_| {})
            .await;
    });

    let state = AppState(Arc::new(Inner {
        config: cfg.clone(),
        names,
        directory,
        commands,
        shutdown: shutdown_rx.clone(),
        session_count: AtomicUsize::new(0),
        next_subscriber: AtomicI64::new(-1),
    }));

    let app = http::build_router(state);
    let addr = format!("{}:{}", cfg.httpserver_host, cfg.httpserver_port);
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| GatewayError::Transport(e.to_string()))?;
    tracing::info!(addr = %addr, prefix = %cfg.prefix, "ws-gate: listening");

    let mut shutdown_for_serve = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_for_serve.wait().await;
        })
        .await
        .map_err(|e| GatewayError::Transport(e.to_string()))?;

    loop_task.abort();
    Ok(())
}
