//! Periodic UDP broadcaster of sensor snapshots — the datagram
//! realization of the Sensor Event Gateway core.
//!
//! SM is out of scope for this repository; this binary links
//! `sm_iface::MockSm` as its SM collaborator, documented here rather than
//! hidden, so it can run standalone for demos and integration tests. A
//! deployment with a real SM swaps in its own `SmHandle` implementation
//! without touching anything in `gateway_core`.

pub mod config;
pub mod transport;

use config::UdpSenderConfig;
use gateway_core::directory::{NameResolver, SensorDirectory};
use gateway_core::event_loop::{EventLoop, LoopCommand, NotificationSink, SystemAction};
use gateway_core::heartbeat::HeartbeatEmitter;
use gateway_core::session_datagram::{DatagramSession, TickOutcome};
use gateway_core::shutdown::{self, ShutdownSink};
use gateway_core::{GatewayError, ValueCache};
use sensor_wire::SensorSnapshot;
use sm_iface::MockSm;
use std::sync::Arc;

/// No name service exists outside SM (out of scope here), so every
/// sensor record in this binary's config must carry an explicit numeric
/// `id`; short-name resolution always fails.
struct NoNameService;
impl NameResolver for NoNameService {
    fn resolve(&self, _name: &str) -> Option<sensor_wire::SensorId> {
        None
    }
}

/// The datagram session never fans out per-notification (it polls V on
/// its own ticker), but `IngressDispatcher` still gates cache updates on
/// "some subscriber references this id" — so every directory entry gets
/// a sink registration that does nothing, purely to mark the id as
/// known.
struct NullSink;
impl NotificationSink for NullSink {
    fn notify(&self, _snapshot: &SensorSnapshot, _error: Option<&str>) {}
}

/// The subscriber identity used for every directory entry in this
/// single-session process. There is exactly one "subscriber" here: the
/// process itself.
const PROCESS_SUBSCRIBER: sensor_wire::SensorId = sensor_wire::SensorId(0);

pub async fn run(cfg: UdpSenderConfig) -> Result<(), GatewayError> {
    let directory = SensorDirectory::build(&cfg.sensors, &cfg.filter, &NoNameService, true)?;
    tracing::info!(name = %cfg.name, sensors = directory.entries().len(), "udp-sender: directory built");

    let sm = Arc::new(MockSm::new());
    let cache = Arc::new(ValueCache::new());
    let (shutdown_tx, shutdown_rx) = shutdown::channel();

    let sm_ready_timeout = cfg.sm_ready_timeout.as_duration().unwrap_or(std::time::Duration::from_secs(3600));
    sm.wait_sm_ready(sm_ready_timeout)
        .await
        .map_err(|e| GatewayError::SmUnready(e.to_string()))?;

    let (mut event_loop, commands) = EventLoop::new(sm.clone(), cache.clone(), shutdown_rx.clone(), std::time::Duration::from_millis(50));
    for entry in directory.entries() {
        commands
            .send(LoopCommand::RegisterSink(PROCESS_SUBSCRIBER, entry.id, Arc::new(NullSink)))
            .ok();
        commands.send(LoopCommand::Add(PROCESS_SUBSCRIBER, entry.id)).ok();
    }

    let shutdown_for_loop = shutdown_tx.clone();
    let loop_task = tokio::spawn(async move {
        event_loop
            .run(move |action| match action {
                SystemAction::StartUp => tracing::info!("udp-sender: SM reports StartUp"),
                SystemAction::FoldUpOrFinish => {
                    tracing::info!("udp-sender: SM reports FoldUp/Finish, shutting down");
                    shutdown_for_loop.request_shutdown("SM FoldUp/Finish");
                }
                SystemAction::WatchDogRemote => tracing::warn!("udp-sender: SM watchdog (remote), registry re-asked every entry"),
                SystemAction::WatchDogLocal => {}
                SystemAction::LogRotate => {}
            }, |_| {})
            .await;
    });

    let transport = transport::UdpBroadcastTransport::bind(&cfg.host, cfg.port, cfg.broadcast)
        .await
        .map_err(|e| GatewayError::Transport(e.to_string()))?;
    let mut session = DatagramSession::new(
        cfg.node_id,
        cfg.proc_id,
        cfg.send_time,
        cfg.activate_timeout.as_duration().unwrap_or(std::time::Duration::from_secs(20)),
    );

    let heartbeat = cfg.heartbeat_id.map(|id| HeartbeatEmitter::new(sensor_wire::SensorId(id), cfg.heartbeat_max, cfg.heartbeat_time));

    let mut send_ticker = tokio::time::interval(session.send_time());
    let mut heartbeat_ticker = heartbeat.as_ref().map(|h| tokio::time::interval(h.period()));
    let mut shutdown_rx = shutdown_rx;

    loop {
        tokio::select! {
            biased;
            () = shutdown_rx.wait() => {
                tracing::info!("udp-sender: shutting down");
                break;
            }
            _ = send_ticker.tick() => {
                match session.tick(&directory, &cache, &transport).await {
                    TickOutcome::Sent { entries } => tracing::trace!(entries, "udp-sender: tick sent"),
                    TickOutcome::ShortWrite => tracing::warn!("udp-sender: short write, retransmitting next tick"),
                    TickOutcome::SocketError { escalate: true } => {
                        shutdown_tx.request_shutdown("datagram socket failing past activate-timeout");
                    }
                    TickOutcome::SocketError { escalate: false } => {}
                }
            }
            _ = async {
                if let Some(ticker) = heartbeat_ticker.as_mut() { ticker.tick().await; }
                else { std::future::pending::<()>().await; }
            }, if heartbeat.is_some() => {
                if let Some(h) = &heartbeat {
                    if let Err(err) = h.beat(sm.as_ref()).await {
                        tracing::warn!(error = %err, "udp-sender: heartbeat write failed, retrying next tick");
                    }
                }
            }
        }
    }

    loop_task.abort();
    Ok(())
}
