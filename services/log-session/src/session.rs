//! The per-connection log-streaming session: bridges a raw TCP peer to
//! the shared log-line broadcast channel via the same `EgressQueue`
//! machinery the sensor gateways use. Unlike `StreamSessionState` there
//! is no per-sensor subscription bookkeeping here — every attached
//! session receives every tailed and SM-forwarded log line, so the
//! state lives entirely inside this function rather than behind an
//! `Arc<Mutex<_>>` reachable from another task.

use gateway_core::egress::EgressQueue;
use gateway_core::session::{CancelFlag, SessionState};
use gateway_core::shutdown::ShutdownSignal;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

/// A parsed command from a log-session peer. Deliberately smaller than
/// the sensor gateway's grammar: there is no `set`/`ask`/`del` here,
/// only the keepalive ping and a request to list attached logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Ping,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    match line.trim() {
        "." => Command::Ping,
        "list" => Command::List,
        other => Command::Unknown(other.to_string()),
    }
}

struct LogSessionState {
    queue: EgressQueue,
    state: SessionState,
    last_activity: Instant,
    cancel: CancelFlag,
}

impl LogSessionState {
    fn new(max_send: usize) -> Self {
        Self {
            queue: EgressQueue::new(max_send),
            state: SessionState::New,
            last_activity: Instant::now(),
            cancel: CancelFlag::new(),
        }
    }

    fn note_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    fn open(&mut self) {
        self.state = SessionState::Open;
    }

    fn begin_draining(&mut self) {
        if self.state == SessionState::Open {
            self.state = SessionState::Draining;
        }
    }

    fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.queue.release_all();
        self.state = SessionState::Closed;
        self.cancel.cancel();
    }
}

/// Drives one accepted TCP connection from open to teardown.
/// `active_sessions` is decremented here on exit; the caller is
/// responsible for having incremented it before spawning this task.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    stream: TcpStream,
    peer: SocketAddr,
    mut log_lines: broadcast::Receiver<String>,
    backlog: Vec<String>,
    log_names: Vec<String>,
    session_timeout: Duration,
    send_time: Duration,
    max_send: usize,
    mut shutdown: ShutdownSignal,
    active_sessions: Arc<AtomicUsize>,
) {
    let session_id = uuid::Uuid::new_v4();
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut state = LogSessionState::new(max_send);
    state.open();
    for line in &backlog {
        state.queue.push(format!("{line}\n").into_bytes());
    }

    tracing::info!(%session_id, %peer, backlog = backlog.len(), "log-session: session opened");

    let mut send_ticker = tokio::time::interval(send_time);
    let mut line = String::new();

    'session: loop {
        if state.state == SessionState::Closed {
            break;
        }
        tokio::select! {
            biased;
            () = shutdown.wait() => {
                tracing::info!(%session_id, "log-session: draining session for shutdown");
                state.begin_draining();
                let _ = state.queue.drain(&mut writer).await;
                break;
            }
            received = log_lines.recv() => {
                match received {
                    Ok(text) => {
                        state.queue.push(format!("{text}\n").into_bytes());
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(%session_id, skipped, "log-session: fell behind the log broadcast, some lines dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break 'session,
                }
            }
            read = tokio::time::timeout(session_timeout, reader.read_line(&mut line)) => {
                match read {
                    Ok(Ok(0)) => {
                        tracing::info!(%session_id, "log-session: peer closed the session");
                        break 'session;
                    }
                    Ok(Ok(_)) => {
                        state.note_activity();
                        match parse_command(&line) {
                            Command::List => {
                                let listing = format!("{}\n", log_names.join(","));
                                state.queue.push(listing.into_bytes());
                            }
                            Command::Ping => {}
                            Command::Unknown(text) => {
                                tracing::warn!(%session_id, line = %text, "log-session: dropping unrecognized command");
                            }
                        }
                        line.clear();
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(%session_id, error = %err, "log-session: read error");
                        break 'session;
                    }
                    Err(_) => {
                        tracing::info!(%session_id, "log-session: session idle timeout");
                        break 'session;
                    }
                }
            }
            _ = send_ticker.tick() => {
                if let Err(err) = state.queue.drain(&mut writer).await {
                    tracing::warn!(%session_id, error = %err, "log-session: write error");
                    break 'session;
                }
            }
        }
    }

    let _ = writer.shutdown().await;
    state.close();
    active_sessions.fetch_sub(1, Ordering::SeqCst);
    tracing::info!(%session_id, "log-session: session closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_dot_is_a_ping() {
        assert_eq!(parse_command("."), Command::Ping);
    }

    #[test]
    fn list_command_is_recognized() {
        assert_eq!(parse_command("list"), Command::List);
    }

    #[test]
    fn unrecognized_text_is_unknown() {
        assert_eq!(parse_command("frobnicate"), Command::Unknown("frobnicate".to_string()));
    }

    #[test]
    fn list_trims_surrounding_whitespace() {
        assert_eq!(parse_command("  list\r\n"), Command::List);
    }

    #[tokio::test]
    async fn session_streams_a_broadcast_line_to_the_peer() {
        let (tx, rx) = broadcast::channel(8);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (_shutdown_tx, shutdown_rx) = gateway_core::shutdown::channel();
        let active = Arc::new(AtomicUsize::new(1));

        let server = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            run(stream, peer, rx, Vec::new(), vec!["a".into()], Duration::from_secs(5), Duration::from_millis(20), 10, shutdown_rx, active).await;
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        tx.send("[a] hello".to_string()).unwrap();

        let mut buf = [0u8; 64];
        let n = tokio::time::timeout(Duration::from_secs(2), tokio::io::AsyncReadExt::read(&mut client, &mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..n], b"[a] hello\n");

        drop(client);
        let _ = tokio::time::timeout(Duration::from_secs(2), server).await;
    }
}
