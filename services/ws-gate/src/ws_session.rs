//! The per-connection WebSocket session: bridges a peer's upgraded
//! socket to the shared event loop via `StreamSessionState` and a
//! `NotificationSink` that serializes cache updates into the session's
//! negotiated `RespondFormat`.

use crate::AppState;
use gateway_core::event_loop::{LoopCommand, NotificationSink};
use gateway_core::session::SessionState;
use gateway_core::session_stream::{parse_command, Command, HandshakeRequest, StreamSessionState};
use sensor_wire::{raw_encode, txt_encode, JsonSnapshot, RespondFormat, SensorId, SensorSnapshot};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message, WebSocket};

/// Bridges the event loop's fan-out to a session's own egress queue.
/// `notify` runs inline on the event loop task, so it must not block —
/// it only serializes and pushes, never writes to the socket itself.
struct WsSink {
    session: Arc<Mutex<StreamSessionState>>,
    app: AppState,
}

impl NotificationSink for WsSink {
    fn notify(&self, snapshot: &SensorSnapshot, error: Option<&str>) {
        let mut session = self.session.lock().unwrap();
        let bytes = match session.format {
            RespondFormat::Json => {
                let name = self.app.names().name_of(snapshot.id);
                match serde_json::to_vec(&JsonSnapshot::from_snapshot(snapshot, name, error.map(str::to_owned))) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        tracing::warn!(error = %err, "ws-gate: failed to encode snapshot as JSON");
                        return;
                    }
                }
            }
            RespondFormat::Txt => txt_encode(snapshot, error).into_bytes(),
            RespondFormat::Raw => raw_encode(snapshot),
            RespondFormat::Unknown => return,
        };
        session.queue.push(bytes);
    }
}

fn to_message(format: RespondFormat, bytes: Vec<u8>) -> Message {
    match format {
        RespondFormat::Raw => Message::Binary(bytes.into()),
        _ => Message::Text(String::from_utf8_lossy(&bytes).into_owned().into()),
    }
}

/// Drives one upgraded WebSocket from handshake to teardown. `socket`
/// is never split: every branch that needs it either reads it (the
/// timed `recv` branch) or writes to it from its body, never both at
/// once within a single `select!` poll, so a single `&mut` suffices.
pub async fn run(mut socket: WebSocket, state: AppState, handshake: HandshakeRequest) {
    let subscriber = state.new_subscriber();
    let format = handshake.format;
    let max_send = state.config().ws_max_send;
    let session = Arc::new(Mutex::new(StreamSessionState::new(subscriber, format, max_send)));
    let commands = state.commands();

    let sink: Arc<dyn NotificationSink> = Arc::new(WsSink { session: session.clone(), app: state.clone() });
    let mut subscribed: HashSet<SensorId> = HashSet::new();
    for id in &handshake.sensor_ids {
        commands.send(LoopCommand::RegisterSink(subscriber, *id, sink.clone())).ok();
        commands.send(LoopCommand::Add(subscriber, *id)).ok();
        subscribed.insert(*id);
    }
    {
        let mut s = session.lock().unwrap();
        s.open();
    }

    let active = state.session_started();
    tracing::info!(subscriber = subscriber.0, sensors = subscribed.len(), active_sessions = active, "ws-gate: session opened");

    let idle_timeout = state.config().session_timeout.as_duration().unwrap_or(std::time::Duration::from_secs(3600));
    let mut send_ticker = tokio::time::interval(state.config().ws_send_time);
    let mut ping_ticker = tokio::time::interval(state.config().ws_heartbeat_time);
    let mut shutdown = state.shutdown();

    'session: loop {
        if session.lock().unwrap().state == SessionState::Closed {
            break;
        }
        tokio::select! {
            biased;
            () = shutdown.wait() => {
                tracing::info!(subscriber = subscriber.0, "ws-gate: draining session for shutdown");
                session.lock().unwrap().begin_draining();
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            received = tokio::time::timeout(idle_timeout, socket.recv()) => {
                match received {
                    Ok(Some(Ok(Message::Text(text)))) => {
                        session.lock().unwrap().note_activity();
                        apply_command(&text, subscriber, &commands, &mut subscribed, &sink);
                    }
                    Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => {
                        session.lock().unwrap().note_activity();
                    }
                    Ok(Some(Ok(Message::Binary(_)))) => {
                        tracing::warn!(subscriber = subscriber.0, "ws-gate: ignoring unexpected binary frame from peer");
                    }
                    Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                        tracing::info!(subscriber = subscriber.0, "ws-gate: peer closed the session");
                        break 'session;
                    }
                    Ok(Some(Err(err))) => {
                        tracing::warn!(subscriber = subscriber.0, error = %err, "ws-gate: WebSocket error");
                        break 'session;
                    }
                    Err(_) => {
                        tracing::info!(subscriber = subscriber.0, "ws-gate: session idle timeout");
                        break 'session;
                    }
                }
            }
            _ = send_ticker.tick() => {
                let ready = { session.lock().unwrap().queue.pop_ready() };
                for bytes in ready {
                    if socket.send(to_message(format, bytes)).await.is_err() {
                        break 'session;
                    }
                }
            }
            _ = ping_ticker.tick() => {
                if socket.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break 'session;
                }
            }
        }
    }

    for id in &subscribed {
        commands.send(LoopCommand::Del(subscriber, *id)).ok();
    }
    session.lock().unwrap().close();
    state.session_ended();
    tracing::info!(subscriber = subscriber.0, "ws-gate: session closed");
}

fn apply_command(
    text: &str,
    subscriber: SensorId,
    commands: &tokio::sync::mpsc::UnboundedSender<LoopCommand>,
    subscribed: &mut HashSet<SensorId>,
    sink: &Arc<dyn NotificationSink>,
) {
    match parse_command(text) {
        Command::Set(pairs) => {
            for (id, value) in pairs {
                commands.send(LoopCommand::Set(subscriber, id, value)).ok();
            }
        }
        Command::Ask(ids) => {
            for id in ids {
                if subscribed.insert(id) {
                    commands.send(LoopCommand::RegisterSink(subscriber, id, sink.clone())).ok();
                    commands.send(LoopCommand::Add(subscriber, id)).ok();
                }
            }
        }
        Command::Del(ids) => {
            for id in ids {
                if subscribed.remove(&id) {
                    commands.send(LoopCommand::Del(subscriber, id)).ok();
                }
            }
        }
        Command::Ping => {}
        Command::Unknown(line) => {
            tracing::warn!(subscriber = subscriber.0, line, "ws-gate: dropping unrecognized command");
        }
    }
}
