//! Byte sources feeding a decode session.
//!
//! A source hands out chunks in order. Chunks need not be contiguous with one
//! another; a session only ever looks at one chunk at a time. When no chunk is
//! available the source reports [`SourceState::Waiting`] and accepts a
//! [`Resumable`] to notify once more data arrives.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::warn;

/// Notified by a source when a suspended reader can make progress again.
pub trait Resumable: Send + Sync {
    fn resume(&self);
}

/// Result of asking a source for its next chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState<'a> {
    /// A chunk is available. It stays valid until the next `advance`.
    Ready(&'a [u8]),
    /// No chunk yet, but the stream has not ended.
    Waiting,
    /// End of data; no further chunks will arrive.
    Complete,
}

/// An ordered stream of byte chunks terminated by an end-of-data signal.
pub trait ByteSource {
    /// Move to the next chunk.
    fn advance(&mut self) -> SourceState<'_>;

    /// Register a resumer to fire when the source next changes state.
    fn wait(&mut self, on_resume: Arc<dyn Resumable>);
}

/// In-memory, append-only chunk queue.
///
/// Each appended chunk is delivered exactly once, in order. Consumed chunks are
/// released as soon as the reader advances past them.
#[derive(Default)]
pub struct ChunkedSource {
    pending: VecDeque<Vec<u8>>,
    current: Option<Vec<u8>>,
    complete: bool,
    delivered_bytes: usize,
    waiter: Option<Arc<dyn Resumable>>,
}

impl ChunkedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an already-complete source from a list of chunks.
    pub fn from_chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        let mut source = Self::new();
        source.pending.extend(chunks.into_iter().map(Into::into));
        source.complete = true;
        source
    }

    /// Queue a chunk and wake any suspended reader.
    pub fn append(&mut self, bytes: &[u8]) {
        if self.complete {
            warn!(len = bytes.len(), "append after end of data ignored");
            return;
        }
        self.pending.push_back(bytes.to_vec());
        self.wake();
    }

    /// Signal end of data and wake any suspended reader.
    pub fn complete(&mut self) {
        if self.complete {
            return;
        }
        self.complete = true;
        self.wake();
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Number of chunks queued but not yet handed out.
    pub fn pending_chunks(&self) -> usize {
        self.pending.len()
    }

    /// Total bytes handed out so far.
    pub fn delivered_bytes(&self) -> usize {
        self.delivered_bytes
    }

    fn wake(&mut self) {
        if let Some(waiter) = self.waiter.take() {
            waiter.resume();
        }
    }
}

impl ByteSource for ChunkedSource {
    fn advance(&mut self) -> SourceState<'_> {
        if let Some(chunk) = self.pending.pop_front() {
            self.delivered_bytes += chunk.len();
            return SourceState::Ready(self.current.insert(chunk));
        }
        self.current = None;
        if self.complete {
            SourceState::Complete
        } else {
            SourceState::Waiting
        }
    }

    fn wait(&mut self, on_resume: Arc<dyn Resumable>) {
        self.waiter = Some(on_resume);
    }
}
