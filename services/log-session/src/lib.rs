//! Session-oriented log streaming server — the log realization of the
//! Sensor Event Gateway core.
//!
//! Unlike `udp-sender`/`ws-gate` this binary tracks no sensor
//! subscriptions: it links `gateway_core::EventLoop` purely for its SM
//! lifecycle handling (StartUp/FoldUp/Finish/WatchDog) and to receive
//! `LogEvent` messages SM itself may emit, forwarding both those and
//! locally tailed log files to every attached session over the same
//! `EgressQueue` machinery the sensor gateways use.

pub mod config;
pub mod session;
pub mod tail;

use config::LogSessionConfig;
use gateway_core::event_loop::{EventLoop, SystemAction};
use gateway_core::shutdown::{self, ShutdownSink};
use gateway_core::{GatewayError, ValueCache};
use gw_ui_log::UiLogger;
use sm_iface::MockSm;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tail::LogTailer;
use tokio::sync::broadcast;

const LOG_BROADCAST_CAPACITY: usize = 1024;
/// How many recent lines a newly attached session is handed as
/// scrollback, ahead of whatever arrives live afterward.
const LOG_BACKLOG_ENTRIES: usize = 200;

pub async fn run(cfg: LogSessionConfig) -> Result<(), GatewayError> {
    tracing::info!(name = %cfg.name, logs = cfg.logs.len(), "log-session: starting");

    let sm = Arc::new(MockSm::new());
    let cache = Arc::new(ValueCache::new());
    let (shutdown_tx, shutdown_rx) = shutdown::channel();

    let sm_ready_timeout = cfg.sm_ready_timeout.as_duration().unwrap_or(Duration::from_secs(3600));
    sm.wait_sm_ready(sm_ready_timeout).await.map_err(|e| GatewayError::SmUnready(e.to_string()))?;

    let (broadcast_tx, _) = broadcast::channel::<String>(LOG_BROADCAST_CAPACITY);
    let logger = Arc::new(UiLogger::with_buffer(broadcast_tx, |entry| entry, LOG_BACKLOG_ENTRIES));

    let (mut event_loop, _commands) = EventLoop::new(sm.clone(), cache.clone(), shutdown_rx.clone(), Duration::from_millis(50));
    let shutdown_for_loop = shutdown_tx.clone();
    let logger_for_loop = logger.clone();
    let loop_task = tokio::spawn(async move {
        event_loop
            .run(
                move |action| match action {
                    SystemAction::StartUp => tracing::info!("log-session: SM reports StartUp"),
                    SystemAction::FoldUpOrFinish => {
                        tracing::info!("log-session: SM reports FoldUp/Finish, shutting down");
                        shutdown_for_loop.request_shutdown("SM FoldUp/Finish");
                    }
                    SystemAction::WatchDogRemote => tracing::warn!("log-session: SM watchdog (remote)"),
                    SystemAction::WatchDogLocal => {}
                    SystemAction::LogRotate => tracing::info!("log-session: SM requested log rotate"),
                },
                move |line| logger_for_loop.log(line),
            )
            .await;
    });

    let tailer_names = cfg.logs.iter().map(|l| l.name.clone()).collect::<Vec<_>>();
    let mut tailer = LogTailer::new(cfg.logs.clone());
    let tail_poll_interval = cfg.tail_poll_interval;
    let logger_for_tail = logger.clone();
    let mut shutdown_for_tail = shutdown_rx.clone();
    let tail_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tail_poll_interval);
        loop {
            tokio::select! {
                biased;
                () = shutdown_for_tail.wait() => break,
                _ = ticker.tick() => {
                    for line in tailer.poll().await {
                        logger_for_tail.log(line);
                    }
                }
            }
        }
    });

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| GatewayError::Transport(e.to_string()))?;
    tracing::info!(addr = %addr, "log-session: listening");

    let session_timeout = cfg.session_timeout.as_duration().unwrap_or(Duration::from_secs(3600));
    let active_sessions = Arc::new(AtomicUsize::new(0));
    let mut shutdown_for_accept = shutdown_rx;

    loop {
        tokio::select! {
            biased;
            () = shutdown_for_accept.wait() => {
                tracing::info!("log-session: shutting down accept loop");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        tracing::warn!(error = %err, "log-session: accept failed");
                        continue;
                    }
                };
                if active_sessions.load(Ordering::SeqCst) >= cfg.max_sessions {
                    tracing::warn!(%peer, max_sessions = cfg.max_sessions, "log-session: rejecting connection, at capacity");
                    drop(stream);
                    continue;
                }
                active_sessions.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(session::run(
                    stream,
                    peer,
                    logger.subscribe(),
                    logger.entries(),
                    tailer_names.clone(),
                    session_timeout,
                    cfg.send_time,
                    cfg.max_send,
                    shutdown_for_accept.clone(),
                    active_sessions.clone(),
                ));
            }
        }
    }

    tail_task.abort();
    loop_task.abort();
    Ok(())
}
