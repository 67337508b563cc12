//! Bounded queue between the transport pump and the command router

use std::collections::VecDeque;
use tracing::warn;

/// Default number of inbound messages held between two ticks
pub const DEFAULT_INBOUND_CAPACITY: usize = 32;

/// A message delivered on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new<T: Into<String>, P: Into<Vec<u8>>>(topic: T, payload: P) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// FIFO of inbound messages with a hard capacity
///
/// When full, the newest message is refused; what is already queued keeps
/// its order. Refusals are counted until the owner collects them.
#[derive(Debug)]
pub struct InboundQueue {
    capacity: usize,
    messages: VecDeque<InboundMessage>,
    overflowed: u64,
}

impl InboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: VecDeque::with_capacity(capacity),
            overflowed: 0,
        }
    }

    /// Enqueue a message; returns false if it was dropped for lack of room
    pub fn push(&mut self, message: InboundMessage) -> bool {
        if self.messages.len() >= self.capacity {
            self.overflowed += 1;
            warn!(
                topic = %message.topic,
                capacity = self.capacity,
                "Inbound queue full, message dropped"
            );
            return false;
        }
        self.messages.push_back(message);
        true
    }

    /// Take the whole current batch in arrival order
    pub fn drain(&mut self) -> impl Iterator<Item = InboundMessage> + '_ {
        self.messages.drain(..)
    }

    /// Number of refused messages since the last call
    pub fn take_overflow_count(&mut self) -> u64 {
        std::mem::take(&mut self.overflowed)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InboundQueue {
    fn default() -> Self {
        Self::new(DEFAULT_INBOUND_CAPACITY)
    }
}
