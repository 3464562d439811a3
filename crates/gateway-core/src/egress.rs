use std::collections::VecDeque;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// `(bytes, position)`. Owned by exactly one `EgressQueue`; `position`
/// advances monotonically until the buffer is fully written, then it is
/// released. A session torn down mid-drain still has its partially
/// written buffers released here — the queue owns them, not the writer.
#[derive(Debug, Clone)]
pub struct OutboundBuffer {
    bytes: Vec<u8>,
    position: usize,
}

impl OutboundBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, position: 0 }
    }

    pub fn remaining(&self) -> &[u8] {
        &self.bytes[self.position..]
    }

    pub fn is_complete(&self) -> bool {
        self.position >= self.bytes.len()
    }

    /// Consumes the buffer whole, for message-oriented transports (e.g. a
    /// WebSocket frame) where a buffer is sent atomically rather than
    /// written byte-by-byte.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Per-subscriber bounded FIFO of outbound byte buffers, with a soft cap
/// (`max_send` per drain tick) and a hard cap (`max_send * K`, K≈10).
pub struct EgressQueue {
    buffers: VecDeque<OutboundBuffer>,
    max_send: usize,
    hard_cap: usize,
    dropped: u64,
    /// Rate-limits the overflow warning to once per episode; rearmed
    /// only when the queue next drains back to empty.
    warned_this_episode: bool,
}

impl EgressQueue {
    pub fn new(max_send: usize) -> Self {
        let max_send = max_send.max(1);
        Self {
            buffers: VecDeque::new(),
            max_send,
            hard_cap: max_send * 10,
            dropped: 0,
            warned_this_episode: false,
        }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Enqueues `bytes`. If the queue is already at `hard_cap`, the event
    /// is dropped and a warning is logged once per overflow episode.
    /// Returns `true` if the buffer was actually enqueued.
    pub fn push(&mut self, bytes: Vec<u8>) -> bool {
        if self.buffers.len() >= self.hard_cap {
            self.dropped += 1;
            if !self.warned_this_episode {
                tracing::warn!(
                    hard_cap = self.hard_cap,
                    dropped = self.dropped,
                    "egress queue at hard cap, dropping event"
                );
                self.warned_this_episode = true;
            }
            return false;
        }
        self.buffers.push_back(OutboundBuffer::new(bytes));
        true
    }

    /// Writes up to `max_send` buffers to `writer`. Partial writes are
    /// permitted: a buffer's `position` advances, and a short write
    /// stops the drain for this tick (the remainder is retried on the
    /// next). Returns the number of buffers fully written.
    pub async fn drain<W: AsyncWrite + Unpin>(&mut self, writer: &mut W) -> std::io::Result<usize> {
        let mut written = 0;
        for _ in 0..self.max_send {
            let Some(buf) = self.buffers.front_mut() else {
                break;
            };
            let n = writer.write(buf.remaining()).await?;
            buf.position += n;
            if buf.is_complete() {
                self.buffers.pop_front();
                written += 1;
            } else {
                break;
            }
        }
        if self.buffers.is_empty() {
            self.warned_this_episode = false;
        }
        Ok(written)
    }

    /// Releases every buffer, including any partially written one. Used
    /// on session teardown.
    pub fn release_all(&mut self) {
        self.buffers.clear();
    }

    /// Pops up to `max_send` whole buffers without writing them, for
    /// message-oriented transports (WebSocket frames) that send each
    /// buffer as one atomic message instead of a byte stream — there is
    /// no partial-write case to model here, only the same per-tick
    /// `max_send` cap `drain` enforces for byte-oriented transports.
    pub fn pop_ready(&mut self) -> Vec<Vec<u8>> {
        let n = self.max_send.min(self.buffers.len());
        let out: Vec<Vec<u8>> = self.buffers.drain(..n).map(OutboundBuffer::into_bytes).collect();
        if self.buffers.is_empty() {
            self.warned_this_episode = false;
        }
        out
    }
}
