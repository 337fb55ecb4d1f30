//! Thread-safe FIFO of received byte chunks.

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};

/// Queue the Rx worker fills and the presentation layer drains.
///
/// Cloning yields another handle to the same queue. Pushing never blocks, so
/// the receive loop is never held up by a slow consumer. Chunks come out in
/// the order they were pushed, each exactly once, no matter how many
/// consumers pull concurrently.
#[derive(Clone, Debug)]
pub struct InboundQueue {
    sender: Sender<Vec<u8>>,
    receiver: Receiver<Vec<u8>>,
}

impl InboundQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Append a chunk.
    pub fn push(&self, chunk: Vec<u8>) {
        // Cannot fail: this handle keeps a receiver alive.
        let _ = self.sender.send(chunk);
    }

    /// Take the oldest chunk, if any.
    pub fn try_pop(&self) -> Option<Vec<u8>> {
        self.receiver.try_recv().ok()
    }

    /// Take the oldest chunk, waiting up to `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Take every chunk currently queued, oldest first.
    pub fn drain(&self) -> Vec<Vec<u8>> {
        self.receiver.try_iter().collect()
    }

    /// Number of queued chunks.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for InboundQueue {
    fn default() -> Self {
        Self::new()
    }
}
