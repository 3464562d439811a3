//! The Sensor Event Gateway core: the subsystem shared by a UDP
//! broadcaster, a WebSocket/HTTP gateway and a log-streaming server —
//! subscription bookkeeping, value caching, ingress dispatch, egress
//! queueing, session lifecycle and the event loop that binds them.
//!
//! This crate is generic over `sm_iface::SmHandle` and never speaks to a
//! concrete SM transport; service binaries supply a handle (a real one
//! in production, `sm_iface::MockSm` for demos and tests).

pub mod cache;
pub mod config;
pub mod directory;
pub mod egress;
pub mod error;
pub mod event_loop;
pub mod heartbeat;
pub mod ingress;
pub mod registry;
pub mod session;
pub mod session_datagram;
pub mod session_stream;
pub mod shutdown;

pub use cache::ValueCache;
pub use directory::{DirectoryEntry, FilterConfig, NameResolver, SensorDirectory, SensorRecordConfig};
pub use egress::{EgressQueue, OutboundBuffer};
pub use error::GatewayError;
pub use event_loop::{EventLoop, LoopCommand, NotificationSink, SystemAction};
pub use heartbeat::HeartbeatEmitter;
pub use ingress::{DispatchAction, IngressDispatcher};
pub use registry::{PendingCommand, ReconcileFailure, SubscriptionEntry, SubscriptionRegistry};
pub use session::{CancelFlag, Session, SessionState};
pub use session_datagram::{DatagramSession, DatagramTransport, TickOutcome};
pub use session_stream::{parse_command, parse_handshake, Command, HandshakeRequest, StreamSessionState};
pub use shutdown::{channel as shutdown_channel, ShutdownSignal, ShutdownSink};
