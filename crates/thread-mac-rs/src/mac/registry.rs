// crates/thread-mac-rs/src/mac/registry.rs
use crate::hal::MacError;
use core::fmt;
use heapless::Vec;

/// Maximum number of senders waiting for the radio at once.
pub const C_MAX_PENDING_SENDERS: usize = 16;
/// Maximum number of registered receivers.
pub const C_MAX_RECEIVERS: usize = 4;

/// Handle of a component that supplies frames to the MAC scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SenderId(pub u8);

/// Handle of a component that consumes received frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReceiverId(pub u8);

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sender#{}", self.0)
    }
}

impl fmt::Display for ReceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "receiver#{}", self.0)
    }
}

/// Senders waiting for the radio, served in arrival order.
#[derive(Debug, Default)]
pub struct SenderQueue {
    senders: Vec<SenderId, C_MAX_PENDING_SENDERS>,
}

impl SenderQueue {
    pub fn new() -> Self {
        Self { senders: Vec::new() }
    }

    pub fn contains(&self, sender: SenderId) -> bool {
        self.senders.contains(&sender)
    }

    pub fn push_back(&mut self, sender: SenderId) -> Result<(), MacError> {
        if self.contains(sender) {
            return Err(MacError::Already);
        }
        self.senders.push(sender).map_err(|_| MacError::NoBufs)
    }

    /// Queues a follow-on request ahead of everyone else.
    pub fn push_front(&mut self, sender: SenderId) -> Result<(), MacError> {
        if self.contains(sender) {
            return Err(MacError::Already);
        }
        self.senders.insert(0, sender).map_err(|_| MacError::NoBufs)
    }

    pub fn pop_front(&mut self) -> Option<SenderId> {
        if self.senders.is_empty() {
            None
        } else {
            Some(self.senders.remove(0))
        }
    }

    pub fn remove(&mut self, sender: SenderId) -> bool {
        match self.senders.iter().position(|&s| s == sender) {
            Some(index) => {
                self.senders.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    pub fn clear(&mut self) {
        self.senders.clear();
    }
}

/// Registered receivers, offered each frame in registration order.
#[derive(Debug, Default)]
pub struct ReceiverRegistry {
    receivers: Vec<ReceiverId, C_MAX_RECEIVERS>,
}

impl ReceiverRegistry {
    pub fn new() -> Self {
        Self { receivers: Vec::new() }
    }

    pub fn register(&mut self, receiver: ReceiverId) -> Result<(), MacError> {
        if self.receivers.contains(&receiver) {
            return Err(MacError::Already);
        }
        self.receivers.push(receiver).map_err(|_| MacError::NoBufs)
    }

    pub fn unregister(&mut self, receiver: ReceiverId) -> bool {
        let before = self.receivers.len();
        self.receivers.retain(|&r| r != receiver);
        self.receivers.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = ReceiverId> + '_ {
        self.receivers.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }
}
