// crates/thread-mac-rs/src/indirect/queue.rs
use super::message::{Message, MessageId};
use crate::hal::MacError;
use alloc::vec::Vec;

/// Messages ordered by priority, FIFO within a priority.
#[derive(Debug, Clone)]
pub struct SendQueue {
    messages: Vec<Message>,
    capacity: usize,
}

impl SendQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Inserts after every message of the same or higher priority.
    pub fn enqueue(&mut self, message: Message) -> Result<(), MacError> {
        if self.messages.len() >= self.capacity {
            return Err(MacError::NoBufs);
        }
        let position = self
            .messages
            .iter()
            .position(|m| m.priority < message.priority)
            .unwrap_or(self.messages.len());
        self.messages.insert(position, message);
        Ok(())
    }

    pub fn dequeue(&mut self, id: MessageId) -> Option<Message> {
        let position = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(position))
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// The lowest-priority, most recently queued message.
    pub fn tail(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Message> {
        self.messages.iter_mut()
    }

    /// Ids of all queued messages, in send order.
    pub fn ids(&self) -> Vec<MessageId> {
        self.messages.iter().map(|m| m.id).collect()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indirect::message::Priority;
    use crate::types::{MacAddress, ShortAddress};
    use alloc::vec;

    fn message(id: u32, priority: Priority) -> Message {
        let mut m = Message::ip6(MacAddress::Short(ShortAddress(0x0401)), vec![0; 4]).with_priority(priority);
        m.id = MessageId(id);
        m
    }

    #[test]
    fn test_priority_then_fifo_order() {
        let mut queue = SendQueue::new(8);
        queue.enqueue(message(1, Priority::Normal)).unwrap();
        queue.enqueue(message(2, Priority::Low)).unwrap();
        queue.enqueue(message(3, Priority::Net)).unwrap();
        queue.enqueue(message(4, Priority::Normal)).unwrap();

        assert_eq!(
            queue.ids(),
            vec![MessageId(3), MessageId(1), MessageId(4), MessageId(2)]
        );
        assert_eq!(queue.tail().map(|m| m.id), Some(MessageId(2)));
    }

    #[test]
    fn test_overflow_fails_with_no_bufs() {
        let mut queue = SendQueue::new(1);
        queue.enqueue(message(1, Priority::Low)).unwrap();
        assert_eq!(queue.enqueue(message(2, Priority::Net)), Err(MacError::NoBufs));
        assert_eq!(queue.len(), 1);

        assert!(queue.dequeue(MessageId(1)).is_some());
        assert!(queue.dequeue(MessageId(1)).is_none());
        assert!(queue.is_empty());
    }
}
