use crate::cache::ValueCache;
use crate::directory::SensorDirectory;
use sensor_wire::{encode_datagram, UdpEntry, UdpHeader};
use std::time::{Duration, Instant};

/// A single broadcast write. Implemented by the service binary's actual
/// UDP socket; a test double can record writes or simulate a short
/// write without needing a real socket.
#[async_trait::async_trait]
pub trait DatagramTransport: Send + Sync {
    async fn send(&self, buf: &[u8]) -> std::io::Result<usize>;
}

/// The process-wide datagram egress session: one per process, broadcasting
/// `UDPHeader + packed entries` at `send_time` intervals. There is no
/// peer handshake and no acknowledgement — loss is tolerated, values are
/// simply retransmitted from the cache's current state next tick.
pub struct DatagramSession {
    node_id: i32,
    proc_id: i32,
    send_time: Duration,
    activate_timeout: Duration,
    consecutive_failures: u32,
    first_failure_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Header and every entry were written in full.
    Sent { entries: usize },
    /// A short write aborted the tick; values are unchanged and will be
    /// retransmitted on the next tick.
    ShortWrite,
    /// The socket errored; retried on the next tick unless this has
    /// exceeded `activate_timeout`, in which case termination should be
    /// requested by the caller.
    SocketError { escalate: bool },
}

impl DatagramSession {
    pub fn new(node_id: i32, proc_id: i32, send_time: Duration, activate_timeout: Duration) -> Self {
        Self {
            node_id,
            proc_id,
            send_time,
            activate_timeout,
            consecutive_failures: 0,
            first_failure_at: None,
        }
    }

    pub fn send_time(&self) -> Duration {
        self.send_time
    }

    /// Builds the current datagram from `directory`'s pack positions and
    /// `cache`'s latest values, in declaration order, and writes it via
    /// `transport`. A short write is treated as a no-op for V: nothing
    /// was consumed, so the same values go out again next tick.
    pub async fn tick(&mut self, directory: &SensorDirectory, cache: &ValueCache, transport: &dyn DatagramTransport) -> TickOutcome {
        let entries: Vec<UdpEntry> = directory
            .entries()
            .iter()
            .filter_map(|e| {
                let snapshot = cache.get(e.id)?;
                Some(UdpEntry {
                    id: e.id.0 as i32,
                    value: snapshot.value,
                })
            })
            .collect();
        let header = UdpHeader {
            node_id: self.node_id,
            proc_id: self.proc_id,
            dcount: entries.len() as i32,
        };
        let bytes = encode_datagram(&header, &entries);

        match transport.send(&bytes).await {
            Ok(n) if n == bytes.len() => {
                self.consecutive_failures = 0;
                self.first_failure_at = None;
                TickOutcome::Sent { entries: entries.len() }
            }
            Ok(_) => TickOutcome::ShortWrite,
            Err(err) => {
                tracing::warn!(error = %err, "datagram session: socket error, retrying next tick");
                self.consecutive_failures += 1;
                let since = *self.first_failure_at.get_or_insert_with(Instant::now);
                let escalate = since.elapsed() >= self.activate_timeout;
                TickOutcome::SocketError { escalate }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensor_wire::{SensorId, SensorKind, SensorSnapshot, Timestamp};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct RecordingTransport {
        sent: Mutex<Vec<Vec<u8>>>,
        short_write_len: Option<usize>,
        fail_calls: AtomicUsize,
        fail_until: usize,
    }

    #[async_trait::async_trait]
    impl DatagramTransport for RecordingTransport {
        async fn send(&self, buf: &[u8]) -> std::io::Result<usize> {
            if self.fail_calls.load(Ordering::SeqCst) < self.fail_until {
                self.fail_calls.fetch_add(1, Ordering::SeqCst);
                return Err(std::io::Error::other("simulated failure"));
            }
            self.sent.lock().unwrap().push(buf.to_vec());
            Ok(self.short_write_len.unwrap_or(buf.len()))
        }
    }

    fn directory_with(ids_and_positions: &[(i64, usize)]) -> SensorDirectory {
        use crate::directory::{DirectoryEntry, SensorDirectory as Dir};
        let entries: Vec<DirectoryEntry> = ids_and_positions
            .iter()
            .map(|(id, pos)| DirectoryEntry { id: SensorId(*id), pack_position: Some(*pos) })
            .collect();
        Dir::from_entries(entries)
    }

    fn put(cache: &ValueCache, id: i64, value: i64) {
        cache.update(SensorSnapshot {
            id: SensorId(id),
            value,
            undefined: false,
            supplier: SensorId::NONE,
            node: 1,
            sm_time: Timestamp::new(1, 0),
            tm_time: Timestamp::new(1, 0),
            kind: SensorKind::AnalogInput,
            calibration: None,
        });
    }

    #[tokio::test]
    async fn tick_emits_header_then_entries_in_declaration_order() {
        let dir = directory_with(&[(10, 0), (11, 1)]);
        let cache = ValueCache::new();
        put(&cache, 10, 5);
        put(&cache, 11, 6);
        let transport = RecordingTransport {
            sent: Mutex::new(Vec::new()),
            short_write_len: None,
            fail_calls: AtomicUsize::new(0),
            fail_until: 0,
        };
        let mut session = DatagramSession::new(1, 1, Duration::from_millis(100), Duration::from_secs(20));
        let outcome = session.tick(&dir, &cache, &transport).await;
        assert_eq!(outcome, TickOutcome::Sent { entries: 2 });

        let sent = transport.sent.lock().unwrap();
        let (header, entries) = sensor_wire::decode_datagram(&sent[0]).unwrap();
        assert_eq!(header.dcount, 2);
        assert_eq!(entries, vec![UdpEntry { id: 10, value: 5 }, UdpEntry { id: 11, value: 6 }]);
    }

    #[tokio::test]
    async fn short_write_leaves_values_for_retransmission() {
        let dir = directory_with(&[(10, 0)]);
        let cache = ValueCache::new();
        put(&cache, 10, 5);
        let transport = RecordingTransport {
            sent: Mutex::new(Vec::new()),
            short_write_len: Some(1),
            fail_calls: AtomicUsize::new(0),
            fail_until: 0,
        };
        let mut session = DatagramSession::new(1, 1, Duration::from_millis(100), Duration::from_secs(20));
        let outcome = session.tick(&dir, &cache, &transport).await;
        assert_eq!(outcome, TickOutcome::ShortWrite);
        assert_eq!(cache.get(SensorId(10)).unwrap().value, 5);
    }

    #[tokio::test]
    async fn socket_error_does_not_escalate_before_activate_timeout() {
        let dir = directory_with(&[(10, 0)]);
        let cache = ValueCache::new();
        put(&cache, 10, 5);
        let transport = RecordingTransport {
            sent: Mutex::new(Vec::new()),
            short_write_len: None,
            fail_calls: AtomicUsize::new(0),
            fail_until: 5,
        };
        let mut session = DatagramSession::new(1, 1, Duration::from_millis(100), Duration::from_secs(60));
        let outcome = session.tick(&dir, &cache, &transport).await;
        assert_eq!(outcome, TickOutcome::SocketError { escalate: false });
    }
}
