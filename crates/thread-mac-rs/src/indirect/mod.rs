// crates/thread-mac-rs/src/indirect/mod.rs
//! Message queueing toward neighbors, including sleepy children that only
//! receive in response to their own data polls.
//!
//! The manager is a MAC sender. It owns one direct sender for neighbors that
//! keep their receiver on, one dedicated sender per attached sleepy child
//! (a "SED slot") and a small pool of floating senders claimed by children
//! without a slot.

pub mod lowpan;
pub mod message;
pub mod queue;
pub mod reassembly;
pub mod sender;

pub use lowpan::{HeaderCompressor, Ipv6Dispatch, MeshHeader, TagGenerator};
pub use message::{C_MAX_CHILD_INDEX, ChildMask, MeshRoute, Message, MessageId, MessageSubType, MessageType, Priority};
pub use queue::SendQueue;
pub use reassembly::Reassembler;
pub use sender::{SenderKind, SenderPool, SenderSlot};

use crate::config::IndirectConfig;
use crate::frame::{AuxSecurityHeader, Frame, KeyId, SecurityLevel};
use crate::hal::MacError;
use crate::mac::{MacRequest, SendDisposition, SenderId};
use crate::neighbor::{ChildIndex, NeighborTable};
use crate::types::{ExtAddress, MacAddress, PanId, ShortAddress};
use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use log::{debug, info, trace, warn};

/// Delivery statistics of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IndirectCounters {
    /// Deliveries completed, one per message and recipient.
    pub tx_success: u32,
    /// Deliveries given up after a transmit error or the poll attempt limit.
    pub tx_failure: u32,
    /// Poll-triggered attempts that failed and will repeat on the next poll.
    pub tx_retry: u32,
    /// Messages refused or discarded before their first frame.
    pub dropped: u32,
    pub evicted: u32,
}

/// A message that left the queue after its last delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub id: MessageId,
    /// Every recipient acknowledged every frame.
    pub success: bool,
}

/// Queues messages and feeds their frames to the MAC scheduler.
pub struct IndirectTxManager {
    config: IndirectConfig,
    compressor: Box<dyn HeaderCompressor>,
    queue: SendQueue,
    senders: SenderPool,
    requests: VecDeque<MacRequest>,
    sent: VecDeque<SentMessage>,
    tags: TagGenerator,
    next_message_id: u32,
    pan_id: PanId,
    short_address: ShortAddress,
    ext_address: ExtAddress,
    counters: IndirectCounters,
}

impl IndirectTxManager {
    /// Creates a manager whose senders are numbered from `first_sender`.
    pub fn new(
        config: IndirectConfig,
        compressor: Box<dyn HeaderCompressor>,
        first_sender: SenderId,
        tag_seed: u16,
    ) -> Self {
        let senders = SenderPool::new(first_sender.0, config.sed_slots, config.floating_senders);
        Self {
            queue: SendQueue::new(config.queue_capacity),
            senders,
            compressor,
            requests: VecDeque::new(),
            sent: VecDeque::new(),
            tags: TagGenerator::new(tag_seed),
            next_message_id: 1,
            pan_id: PanId::BROADCAST,
            short_address: ShortAddress::NONE,
            ext_address: ExtAddress::default(),
            counters: IndirectCounters::default(),
            config,
        }
    }

    /// Addresses placed in the header of every frame the manager builds.
    pub fn set_link_addresses(&mut self, pan_id: PanId, short_address: ShortAddress, ext_address: ExtAddress) {
        self.pan_id = pan_id;
        self.short_address = short_address;
        self.ext_address = ext_address;
    }

    // --- Queries ---

    pub fn owns_sender(&self, sender: SenderId) -> bool {
        self.senders.get(sender).is_some()
    }

    pub fn senders(&self) -> impl Iterator<Item = &SenderSlot> {
        self.senders.iter()
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.queue.iter()
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.queue.get(id)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn counters(&self) -> &IndirectCounters {
        &self.counters
    }

    pub fn compressor(&self) -> &dyn HeaderCompressor {
        self.compressor.as_ref()
    }

    /// Next MAC request raised by the manager, in the order raised.
    pub fn take_mac_request(&mut self) -> Option<MacRequest> {
        self.requests.pop_front()
    }

    pub fn has_mac_requests(&self) -> bool {
        !self.requests.is_empty()
    }

    /// Next message whose delivery completed, in completion order.
    pub fn take_sent_message(&mut self) -> Option<SentMessage> {
        self.sent.pop_front()
    }

    // --- Sender slots ---

    /// Binds a dedicated sender to a sleepy child.
    ///
    /// Fails with `NoBufs` when every slot is bound. Binding an already bound
    /// child is a no-op.
    pub fn allocate_sed_slot(&mut self, child: ChildIndex) -> Result<SenderId, MacError> {
        let id = self.senders.allocate_sed_slot(child)?;
        debug!("[Indirect] Child {} bound to {}", child.0, id);
        Ok(id)
    }

    /// Unbinds the dedicated sender of `child`, withdrawing its frame request.
    pub fn deallocate_sed_slot(&mut self, child: ChildIndex) {
        if let Some(slot) = self.senders.deallocate_sed_slot(child) {
            debug!("[Indirect] Child {} released {}", child.0, slot.id);
            if slot.in_use {
                self.requests.push_back(MacRequest::Purge(slot.id));
            }
        }
    }

    pub fn remaining_sed_slot_count(&self) -> usize {
        self.senders.remaining_sed_slot_count()
    }

    pub fn claim_floating_sender(&mut self, child: ChildIndex) -> Result<SenderId, MacError> {
        self.senders.claim_floating_sender(child)
    }

    pub fn release_floating_senders(&mut self, child: ChildIndex) {
        for id in self.senders.release_floating_senders(child) {
            self.requests.push_back(MacRequest::Purge(id));
        }
    }

    // --- Queueing ---

    /// Queues a message.
    ///
    /// Supervision messages go to sleepy children only. Unicast messages need
    /// a known neighbor, or a mesh route whose next hop is used instead.
    /// Messages for a sleepy child wait for its next poll; everything else
    /// is sent right away through the direct sender.
    pub fn send_message(
        &mut self,
        mut message: Message,
        neighbors: &mut dyn NeighborTable,
    ) -> Result<MessageId, MacError> {
        let sleepy_child = neighbors
            .child_index(&message.destination)
            .filter(|&index| neighbors.child(index).is_some_and(|n| n.is_sleepy_child()));

        let child = match message.msg_type {
            MessageType::Supervision => {
                let Some(child) = sleepy_child else {
                    warn!("[Indirect] No sleepy child {} for supervision", message.destination);
                    self.counters.dropped += 1;
                    return Err(MacError::Drop);
                };
                Some(child)
            }
            _ if message.mesh.is_some() || message.destination.is_broadcast() => None,
            _ => match sleepy_child {
                Some(child) => Some(child),
                None if neighbors.find(&message.destination).is_some() => None,
                None => {
                    debug!("[Indirect] No neighbor {}, dropping", message.destination);
                    self.counters.dropped += 1;
                    return Err(MacError::Drop);
                }
            },
        };

        match child {
            Some(index) if index.0 > C_MAX_CHILD_INDEX => return Err(MacError::InvalidArgs),
            Some(index) => message.child_mask.insert(index),
            None => message.direct_tx = true,
        }

        let id = MessageId(self.next_message_id);
        self.next_message_id = self.next_message_id.wrapping_add(1).max(1);
        message.id = id;
        self.queue.enqueue(message)?;

        match child {
            Some(index) => {
                if let Some(neighbor) = neighbors.child_mut(index) {
                    neighbor.indirect.message_count = neighbor.indirect.message_count.saturating_add(1);
                    trace!(
                        "[Indirect] {} queued for child {} ({} pending)",
                        id, index.0, neighbor.indirect.message_count
                    );
                }
            }
            None => {
                trace!("[Indirect] {} queued for direct transmission", id);
                self.schedule_direct();
            }
        }
        Ok(id)
    }

    /// Withdraws queued messages from `child`. `MessageSubType::None` matches
    /// every message.
    pub fn remove_messages(
        &mut self,
        child: ChildIndex,
        sub_type: MessageSubType,
        neighbors: &mut dyn NeighborTable,
    ) {
        let address = neighbors.child(child).map(|n| n.mac_address());
        for id in self.queue.ids() {
            let Some(message) = self.queue.get_mut(id) else { continue };
            if sub_type != MessageSubType::None && message.sub_type != sub_type {
                continue;
            }
            if message.child_mask.remove(child) {
                decrement_message_count(neighbors, child);
                self.detach_child_senders(id, child);
            } else if message.direct_tx && address.is_some_and(|a| a == message.destination) {
                message.direct_tx = false;
                self.detach_direct_sender(id);
            }
            self.discard_if_done(id);
        }
    }

    /// Forgets everything queued for `child`, e.g. when it detaches.
    pub fn clear_child_indirect_messages(&mut self, child: ChildIndex, neighbors: &mut dyn NeighborTable) {
        for id in self.queue.ids() {
            let cleared = self.queue.get_mut(id).is_some_and(|m| m.child_mask.remove(child));
            if cleared {
                self.discard_if_done(id);
            }
        }
        if let Some(id) = self.senders.sender_for_child(child) {
            if let Some(slot) = self.senders.get_mut(id) {
                if slot.in_use {
                    self.requests.push_back(MacRequest::Purge(id));
                }
                slot.reset_message();
            }
        }
        self.release_floating_senders(child);
        if let Some(neighbor) = neighbors.child_mut(child) {
            neighbor.indirect = Default::default();
        }
        debug!("[Indirect] Cleared indirect messages of child {}", child.0);
    }

    /// Makes room by dropping the lowest-priority message, provided its
    /// priority is strictly below `priority`.
    pub fn evict_message(&mut self, priority: Priority, neighbors: &mut dyn NeighborTable) -> Result<(), MacError> {
        let (id, mask) = match self.queue.tail() {
            Some(tail) if tail.priority < priority => (tail.id, tail.child_mask),
            _ => return Err(MacError::NotFound),
        };
        for child in mask.iter() {
            decrement_message_count(neighbors, child);
            self.detach_child_senders(id, child);
        }
        self.detach_direct_sender(id);
        self.queue.dequeue(id);
        self.counters.evicted += 1;
        info!("[Indirect] Evicted {} for a {:?} message", id, priority);
        Ok(())
    }

    // --- Polls ---

    /// A sleepy child polled. Starts a transmission if anything is queued
    /// for it.
    pub fn handle_data_request(&mut self, src: &MacAddress, neighbors: &mut dyn NeighborTable) {
        let Some(child) = neighbors.child_index(src) else {
            trace!("[Indirect] Data request from non-child {}", src);
            return;
        };
        let Some(neighbor) = neighbors.child_mut(child) else { return };
        neighbor.indirect.data_request_pending = true;
        if neighbor.indirect.message_count == 0 {
            trace!("[Indirect] Nothing queued for child {}", child.0);
            return;
        }

        let sender = match self.senders.sender_for_child(child) {
            Some(id) => id,
            None => match self.senders.claim_floating_sender(child) {
                Ok(id) => id,
                Err(_) => {
                    debug!("[Indirect] No sender free for child {}", child.0);
                    return;
                }
            },
        };
        self.request_frame(sender);
    }

    /// Picks the next message for `child`.
    ///
    /// A queued supervision message is superfluous when anything else is
    /// pending for the child; it is removed instead of selected.
    pub fn get_indirect_transmission(
        &mut self,
        child: ChildIndex,
        neighbors: &mut dyn NeighborTable,
    ) -> Option<MessageId> {
        let mut selected = None;
        for id in self.queue.ids() {
            let Some(message) = self.queue.get_mut(id) else { continue };
            if !message.is_pending_for(child) {
                continue;
            }
            let count = neighbors.child(child).map_or(0, |n| n.indirect.message_count);
            if message.msg_type == MessageType::Supervision && count > 1 {
                message.child_mask.remove(child);
                decrement_message_count(neighbors, child);
                trace!("[Indirect] Skipping supervision {} for child {}", id, child.0);
                self.discard_if_done(id);
                continue;
            }
            selected = Some(id);
            break;
        }
        if let Some(neighbor) = neighbors.child_mut(child) {
            neighbor.indirect.tx_attempts = 0;
            neighbor.indirect.retransmit = false;
        }
        selected
    }

    // --- Frame construction ---

    /// Builds the next frame of the message assigned to `sender` for its
    /// child.
    pub fn prepare_indirect_transmission(
        &mut self,
        sender: SenderId,
        frame: &mut Frame,
        neighbors: &mut dyn NeighborTable,
    ) -> Result<(), MacError> {
        let slot = *self.senders.get(sender).ok_or(MacError::NotFound)?;
        let child = slot.child.ok_or(MacError::NotFound)?;
        let destination = neighbors.child(child).ok_or(MacError::NotFound)?.mac_address();

        let (id, offset) = match slot.message.filter(|&id| self.queue.get(id).is_some_and(|m| m.is_pending_for(child))) {
            Some(id) => (id, slot.next_offset),
            None => (self.get_indirect_transmission(child, neighbors).ok_or(MacError::NotFound)?, 0),
        };

        let end = self.build_frame(id, destination, offset, frame)?;
        let len = self.queue.get(id).map_or(0, Message::len);
        let neighbor = neighbors.child(child).ok_or(MacError::NotFound)?;
        let state = neighbor.indirect;

        frame.indirect = true;
        frame.frame_pending = end < len || state.message_count > 1;
        if state.retransmit {
            frame.is_retransmission = true;
            frame.sequence = state.sequence;
            if let Some(security) = frame.security.as_mut() {
                security.frame_counter = state.frame_counter;
                security.key_id = KeyId::Mode1 { key_index: state.key_id };
            }
        }

        if let Some(slot) = self.senders.get_mut(sender) {
            slot.message = Some(id);
            slot.next_offset = offset;
            slot.frame_end_offset = end;
        }
        trace!("[Indirect] {} bytes {}..{} to child {}", id, offset, end, child.0);
        Ok(())
    }

    fn prepare_direct_transmission(&mut self, frame: &mut Frame) -> Result<(), MacError> {
        let slot = *self.senders.direct();
        let (id, offset) = match slot.message.filter(|&id| self.queue.get(id).is_some_and(|m| m.direct_tx)) {
            Some(id) => (id, slot.next_offset),
            None => (self.next_direct_message().ok_or(MacError::NotFound)?, 0),
        };
        let message = self.queue.get(id).ok_or(MacError::NotFound)?;
        let destination = match message.mesh {
            Some(route) => MacAddress::Short(route.next_hop),
            None => message.destination,
        };

        let end = match self.build_frame(id, destination, offset, frame) {
            Ok(end) => end,
            Err(e) => {
                warn!("[Indirect] Cannot frame {}: {}", id, e);
                if let Some(message) = self.queue.get_mut(id) {
                    message.direct_tx = false;
                }
                self.senders.direct_mut().reset_message();
                self.counters.dropped += 1;
                self.discard_if_done(id);
                return Err(e);
            }
        };
        let len = self.queue.get(id).map_or(0, Message::len);
        frame.frame_pending = end < len;

        let slot = self.senders.direct_mut();
        slot.message = Some(id);
        slot.next_offset = offset;
        slot.frame_end_offset = end;
        Ok(())
    }

    /// Fills `frame` with the part of message `id` starting at `offset` and
    /// returns the offset following it.
    fn build_frame(
        &mut self,
        id: MessageId,
        destination: MacAddress,
        offset: usize,
        frame: &mut Frame,
    ) -> Result<usize, MacError> {
        let src = if self.short_address.is_valid() {
            MacAddress::Short(self.short_address)
        } else {
            MacAddress::Extended(self.ext_address)
        };
        let message = self.queue.get_mut(id).ok_or(MacError::NotFound)?;

        *frame = Frame::new_data(self.pan_id, destination, src);
        if message.link_security {
            frame.security = Some(AuxSecurityHeader {
                level: SecurityLevel::EncMic32,
                key_id: KeyId::Mode1 { key_index: 0 },
                frame_counter: 0,
            });
        }
        let max_payload = frame.max_payload_len();

        match message.msg_type {
            MessageType::Supervision => Ok(0),
            MessageType::Lowpan => {
                let mut payload = Vec::with_capacity(max_payload);
                if let Some(route) = message.mesh {
                    MeshHeader::new(route.source, route.destination).write(&mut payload);
                }
                payload.extend_from_slice(&message.payload);
                if payload.len() > max_payload {
                    return Err(MacError::FrameTooLarge);
                }
                frame.payload = payload;
                Ok(message.payload.len())
            }
            MessageType::Ip6 => {
                let mesh = message.mesh.map(|route| MeshHeader::new(route.source, route.destination));
                let (ip_src, ip_dst) = match message.mesh {
                    Some(route) => (MacAddress::Short(route.source), MacAddress::Short(route.destination)),
                    None => (src, destination),
                };
                let encoded = lowpan::encode_fragment(
                    self.compressor.as_ref(),
                    &message.payload,
                    mesh.as_ref(),
                    &ip_src,
                    &ip_dst,
                    offset,
                    max_payload,
                    &mut message.datagram_tag,
                    &mut self.tags,
                )?;
                frame.payload = encoded.payload;
                Ok(encoded.next_offset)
            }
        }
    }

    // --- MAC callbacks ---

    /// Supplies the next frame of one of the manager's senders.
    pub fn handle_frame_request(
        &mut self,
        sender: SenderId,
        frame: &mut Frame,
        neighbors: &mut dyn NeighborTable,
    ) -> Result<(), MacError> {
        let kind = self.senders.get(sender).ok_or(MacError::NotFound)?.kind;
        let result = match kind {
            SenderKind::Direct => self.prepare_direct_transmission(frame),
            SenderKind::Dedicated | SenderKind::Floating => {
                self.prepare_indirect_transmission(sender, frame, neighbors)
            }
        };
        if let Err(e) = result {
            debug!("[Indirect] No frame for {}: {}", sender, e);
            self.abandon(sender);
        }
        result
    }

    /// Processes the outcome of a frame of one of the manager's senders.
    pub fn handle_sent_frame(
        &mut self,
        sender: SenderId,
        frame: &Frame,
        result: Result<(), MacError>,
        neighbors: &mut dyn NeighborTable,
    ) -> SendDisposition {
        let Some(slot) = self.senders.get(sender).copied() else {
            return SendDisposition::Done;
        };
        if !slot.in_use {
            trace!("[Indirect] Ignoring late completion of {}", sender);
            if slot.kind == SenderKind::Direct {
                self.schedule_direct();
            }
            return SendDisposition::Done;
        }
        match slot.kind {
            SenderKind::Direct => self.handle_sent_direct(slot, result),
            SenderKind::Dedicated | SenderKind::Floating => {
                self.handle_sent_to_child(slot, frame, result, neighbors)
            }
        }
    }

    /// The MAC refused a frame request, e.g. because the previous frame of
    /// the sender is still on the air.
    pub fn handle_request_failed(&mut self, sender: SenderId, error: MacError) {
        debug!("[Indirect] Frame request of {} failed: {}", sender, error);
        if let Some(slot) = self.senders.get_mut(sender) {
            slot.in_use = false;
        }
    }

    /// Requests the direct sender again if direct messages are waiting, e.g.
    /// after the MAC was re-enabled.
    pub fn resume_direct(&mut self) {
        self.schedule_direct();
    }

    fn handle_sent_direct(&mut self, slot: SenderSlot, result: Result<(), MacError>) -> SendDisposition {
        let Some(id) = slot.message.filter(|&id| self.queue.get(id).is_some()) else {
            self.senders.direct_mut().reset_message();
            self.schedule_direct();
            return SendDisposition::Done;
        };
        let Some(message) = self.queue.get_mut(id) else {
            return SendDisposition::Done;
        };

        let next_offset = match result {
            Ok(()) => slot.frame_end_offset,
            Err(e) => {
                debug!("[Indirect] {} failed: {}", id, e);
                message.tx_success = false;
                message.len()
            }
        };
        if next_offset < message.len() {
            self.senders.direct_mut().next_offset = next_offset;
            return SendDisposition::SendMore;
        }

        message.direct_tx = false;
        if message.tx_success {
            self.counters.tx_success += 1;
        } else {
            self.counters.tx_failure += 1;
        }
        self.senders.direct_mut().reset_message();
        self.complete_if_done(id);
        self.schedule_direct();
        SendDisposition::Done
    }

    fn handle_sent_to_child(
        &mut self,
        slot: SenderSlot,
        frame: &Frame,
        result: Result<(), MacError>,
        neighbors: &mut dyn NeighborTable,
    ) -> SendDisposition {
        let max_attempts = self.config.max_poll_triggered_tx_attempts;
        let message = slot.message.zip(slot.child).and_then(|(id, child)| {
            self.queue.get(id).filter(|m| m.is_pending_for(child)).map(|m| (id, child, m.len()))
        });
        let Some((id, child, len)) = message else {
            self.finish_slot(slot.id);
            return SendDisposition::Done;
        };
        let Some(neighbor) = neighbors.child_mut(child) else {
            self.finish_slot(slot.id);
            return SendDisposition::Done;
        };
        let state = &mut neighbor.indirect;
        state.data_request_pending = false;

        let mut delivered = true;
        let next_offset = match result {
            Ok(()) => {
                state.tx_attempts = 0;
                state.retransmit = false;
                slot.frame_end_offset
            }
            Err(e) => {
                let retryable = matches!(e, MacError::NoAck | MacError::ChannelAccessFailure | MacError::Abort);
                if retryable {
                    state.tx_attempts = state.tx_attempts.saturating_add(1);
                }
                if retryable && state.tx_attempts < max_attempts {
                    // Repeat the identical frame on the next poll.
                    state.retransmit = true;
                    state.sequence = frame.sequence;
                    if let Some(security) = frame.security {
                        state.frame_counter = security.frame_counter;
                        state.key_id = security.key_id.key_index().unwrap_or(0);
                    }
                    self.counters.tx_retry += 1;
                    debug!(
                        "[Indirect] {} to child {} failed ({}), attempt {}/{}",
                        id, child.0, e, state.tx_attempts, max_attempts
                    );
                    if let Some(slot) = self.senders.get_mut(slot.id) {
                        slot.in_use = false;
                    }
                    return SendDisposition::Done;
                }
                warn!("[Indirect] Giving up {} for child {}: {}", id, child.0, e);
                state.tx_attempts = 0;
                state.retransmit = false;
                delivered = false;
                len
            }
        };

        if next_offset < len {
            if let Some(slot) = self.senders.get_mut(slot.id) {
                slot.next_offset = next_offset;
            }
            return SendDisposition::SendMore;
        }

        state.message_count = state.message_count.saturating_sub(1);
        if let Some(message) = self.queue.get_mut(id) {
            message.child_mask.remove(child);
            if !delivered {
                message.tx_success = false;
            }
        }
        if delivered {
            self.counters.tx_success += 1;
        } else {
            self.counters.tx_failure += 1;
        }
        self.complete_if_done(id);
        self.finish_slot(slot.id);
        SendDisposition::Done
    }

    // --- Internals ---

    /// Raises a frame request for `sender` unless one is outstanding.
    fn request_frame(&mut self, sender: SenderId) {
        if let Some(slot) = self.senders.get_mut(sender) {
            if !slot.in_use {
                slot.in_use = true;
                self.requests.push_back(MacRequest::SendFrameRequest(sender));
            }
        }
    }

    fn next_direct_message(&self) -> Option<MessageId> {
        self.queue.iter().find(|m| m.direct_tx).map(Message::id)
    }

    fn schedule_direct(&mut self) {
        if self.next_direct_message().is_some() {
            let id = self.senders.direct().id;
            self.request_frame(id);
        }
    }

    /// Ends the message of a sender. Floating senders return to the pool.
    fn finish_slot(&mut self, sender: SenderId) {
        if let Some(slot) = self.senders.get_mut(sender) {
            slot.reset_message();
        }
        self.senders.release(sender);
    }

    /// A frame request produced no frame.
    fn abandon(&mut self, sender: SenderId) {
        self.finish_slot(sender);
        if self.senders.get(sender).is_some_and(|s| s.kind == SenderKind::Direct) {
            self.schedule_direct();
        }
    }

    /// Stops any child sender working on message `id` for `child`.
    fn detach_child_senders(&mut self, id: MessageId, child: ChildIndex) {
        let mut purged = Vec::new();
        for slot in self.senders.iter_mut() {
            if slot.kind != SenderKind::Direct && slot.child == Some(child) && slot.message == Some(id) {
                if slot.in_use {
                    purged.push(slot.id);
                }
                slot.reset_message();
            }
        }
        for sender in purged {
            self.requests.push_back(MacRequest::Purge(sender));
            self.senders.release(sender);
        }
    }

    fn detach_direct_sender(&mut self, id: MessageId) {
        let slot = self.senders.direct_mut();
        if slot.message == Some(id) {
            let sender = slot.id;
            let was_in_use = slot.in_use;
            slot.reset_message();
            if was_in_use {
                self.requests.push_back(MacRequest::Purge(sender));
            }
        }
    }

    /// Drops message `id` once nobody is waiting for it any more.
    fn discard_if_done(&mut self, id: MessageId) -> Option<Message> {
        let done = self
            .queue
            .get(id)
            .is_some_and(|m| !m.is_child_pending() && !m.is_direct_pending());
        if !done {
            return None;
        }
        self.detach_direct_sender(id);
        trace!("[Indirect] {} done", id);
        self.queue.dequeue(id)
    }

    /// Like `discard_if_done`, reporting the message as sent.
    fn complete_if_done(&mut self, id: MessageId) {
        if let Some(message) = self.discard_if_done(id) {
            self.sent.push_back(SentMessage {
                id,
                success: message.tx_success,
            });
        }
    }
}

fn decrement_message_count(neighbors: &mut dyn NeighborTable, child: ChildIndex) {
    if let Some(neighbor) = neighbors.child_mut(child) {
        neighbor.indirect.message_count = neighbor.indirect.message_count.saturating_sub(1);
    }
}
