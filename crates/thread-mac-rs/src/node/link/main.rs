// crates/thread-mac-rs/src/node/link/main.rs
use super::events::LinkEvent;
use super::state::LinkContext;
use super::tick;
use crate::config::LinkConfig;
use crate::hal::{MacError, RadioDriver, RxFrame, TxDone};
use crate::indirect::{
    HeaderCompressor, IndirectTxManager, Message, MessageId, MessageSubType, Priority, Reassembler,
};
use crate::log::{my_info, my_warn};
use crate::mac::{MacRequest, MacScheduler, ReceiverId, ScanHandler, SenderId};
use crate::neighbor::{ChildIndex, NeighborList};
use crate::node::{Node, NodeAction};
use crate::security::{AesCcmCipher, FrameCipher, KeyProvider};
use crate::types::{Channel, ChannelMask, ExtAddress, MacAddress, PanId, ShortAddress};
use crate::wakeup::WakeupTxScheduler;
use alloc::boxed::Box;
use log::trace;
use rand_core::RngCore;

/// Receiver handle under which the node takes data frames from the MAC.
pub const C_DATA_RECEIVER: ReceiverId = ReceiverId(0);
/// Sender handle of the direct sender; the SED slots and floating senders
/// follow.
pub const C_FIRST_INDIRECT_SENDER: SenderId = SenderId(0);
/// Sender handle of the data poll a sleepy node sends to its parent.
pub const C_DATA_POLL_SENDER: SenderId = SenderId(u8::MAX);

/// A complete link-layer node: MAC scheduler, indirect transmission,
/// wake-up frames and reassembly over one radio.
pub struct LinkNode<R, G, K, C = AesCcmCipher> {
    pub(super) mac: MacScheduler<R, G, K, C>,
    pub(super) context: LinkContext,
    pub(super) wakeup: WakeupTxScheduler,
    pub(super) neighbors: NeighborList,
}

impl<R, G, K, C> LinkNode<R, G, K, C>
where
    R: RadioDriver,
    G: RngCore,
    K: KeyProvider,
    C: FrameCipher,
{
    /// Creates a stopped node. Call `start` to enable the radio.
    pub fn new(
        radio: R,
        rng: G,
        keys: K,
        cipher: C,
        config: LinkConfig,
        neighbors: NeighborList,
        compressor: Box<dyn HeaderCompressor>,
    ) -> Result<Self, MacError> {
        let ext_address = radio.ext_address();
        let mut mac = MacScheduler::new(radio, rng, keys, cipher, config.mac);
        mac.register_receiver(C_DATA_RECEIVER)?;

        let tag_seed = u16::from_be_bytes([ext_address.0[6], ext_address.0[7]]);
        let indirect = IndirectTxManager::new(
            config.indirect.clone(),
            compressor,
            C_FIRST_INDIRECT_SENDER,
            tag_seed,
        );
        let mut reassembler = Reassembler::new(
            config.indirect.reassembly_capacity,
            config.indirect.reassembly_timeout_us,
        );
        reassembler.set_sleepy(!mac.rx_on_when_idle());
        let mut node = Self {
            mac,
            context: LinkContext::new(indirect, reassembler),
            wakeup: WakeupTxScheduler::new(config.wakeup),
            neighbors,
        };
        node.update_link_addresses();
        my_info!(node.context.log_context("node"), "Link node created for {}", ext_address);
        Ok(node)
    }

    // --- Control ---

    /// Enables the radio and resumes direct messages queued while stopped.
    pub fn start(&mut self, current_time_us: u64) {
        self.mac.start();
        self.context.indirect.resume_direct();
        self.process_mac_requests(current_time_us);
    }

    /// Stops the radio and any wake-up session. Queued messages are kept.
    pub fn stop(&mut self) {
        self.wakeup.stop();
        self.mac.stop();
    }

    pub fn set_pan_id(&mut self, pan_id: PanId) {
        self.mac.set_pan_id(pan_id);
        self.update_link_addresses();
    }

    pub fn set_short_address(&mut self, short_address: ShortAddress) {
        self.mac.set_short_address(short_address);
        self.update_link_addresses();
    }

    pub fn set_ext_address(&mut self, ext_address: ExtAddress) {
        self.mac.set_ext_address(ext_address);
        self.update_link_addresses();
    }

    pub fn set_channel(&mut self, channel: Channel) {
        self.mac.set_channel(channel);
    }

    /// A node that turns its receiver off while idle is sleepy; reassembly
    /// then keeps only the newest secure datagram.
    pub fn set_rx_on_when_idle(&mut self, rx_on_when_idle: bool) {
        self.mac.set_rx_on_when_idle(rx_on_when_idle);
        self.context.reassembler.set_sleepy(!rx_on_when_idle);
    }

    fn update_link_addresses(&mut self) {
        let (pan_id, short, ext) = (self.mac.pan_id(), self.mac.short_address(), self.mac.ext_address());
        self.context.indirect.set_link_addresses(pan_id, short, ext);
        self.context.pan_id = pan_id;
        self.context.short_address = short;
        self.context.ext_address = ext;
        self.wakeup.set_link_addresses(pan_id, ext);
    }

    // --- Messages ---

    /// Queues a message toward a neighbor, a sleepy child or a mesh next hop.
    pub fn send_message(&mut self, current_time_us: u64, message: Message) -> Result<MessageId, MacError> {
        let id = self.context.indirect.send_message(message, &mut self.neighbors)?;
        self.process_mac_requests(current_time_us);
        Ok(id)
    }

    pub fn remove_messages(&mut self, current_time_us: u64, child: ChildIndex, sub_type: MessageSubType) {
        self.context.indirect.remove_messages(child, sub_type, &mut self.neighbors);
        self.process_mac_requests(current_time_us);
    }

    pub fn clear_child_indirect_messages(&mut self, current_time_us: u64, child: ChildIndex) {
        self.context.indirect.clear_child_indirect_messages(child, &mut self.neighbors);
        self.process_mac_requests(current_time_us);
    }

    pub fn evict_message(&mut self, priority: Priority) -> Result<(), MacError> {
        self.context.indirect.evict_message(priority, &mut self.neighbors)
    }

    pub fn allocate_sed_slot(&mut self, child: ChildIndex) -> Result<SenderId, MacError> {
        self.context.indirect.allocate_sed_slot(child)
    }

    /// Unbinds the child's slot, e.g. when it detaches.
    pub fn deallocate_sed_slot(&mut self, current_time_us: u64, child: ChildIndex) {
        self.context.indirect.deallocate_sed_slot(child);
        self.process_mac_requests(current_time_us);
    }

    /// Asks `parent` for data queued for this node. An ack with the
    /// frame-pending bit keeps the receiver on until the data arrives or the
    /// data-poll timeout expires.
    pub fn send_data_poll(&mut self, current_time_us: u64, parent: MacAddress) -> Result<(), MacError> {
        if self.context.poll_parent.is_some() {
            return Err(MacError::Already);
        }
        self.context.poll_parent = Some(parent);
        self.context.now_us = current_time_us;
        let result = self.mac.send_frame_request(
            current_time_us,
            C_DATA_POLL_SENDER,
            &mut self.context,
            &mut self.neighbors,
        );
        if result.is_err() {
            self.context.poll_parent = None;
        }
        result
    }

    /// Next event for the upper layer.
    pub fn poll_event(&mut self) -> Option<LinkEvent> {
        self.context.events.pop_front()
    }

    // --- Scans and wake-up ---

    pub fn active_scan(
        &mut self,
        current_time_us: u64,
        mask: ChannelMask,
        duration_ms: u16,
        handler: ScanHandler,
    ) -> Result<(), MacError> {
        self.context.now_us = current_time_us;
        self.mac
            .active_scan(current_time_us, mask, duration_ms, handler, &mut self.context, &mut self.neighbors)
    }

    pub fn energy_scan(
        &mut self,
        current_time_us: u64,
        mask: ChannelMask,
        duration_ms: u16,
        handler: ScanHandler,
    ) -> Result<(), MacError> {
        self.context.now_us = current_time_us;
        self.mac
            .energy_scan(current_time_us, mask, duration_ms, handler, &mut self.context, &mut self.neighbors)
    }

    /// Reports the result of a hardware energy scan.
    pub fn process_energy_scan_done(&mut self, current_time_us: u64, max_rssi: i8) -> NodeAction {
        self.context.now_us = current_time_us;
        self.mac
            .handle_energy_scan_done(current_time_us, max_rssi, &mut self.context, &mut self.neighbors);
        self.after_mac_call(current_time_us)
    }

    /// Starts a wake-up session toward `target`. The first frame is requested
    /// at the next `tick`.
    pub fn wake_up(
        &mut self,
        current_time_us: u64,
        target: ExtAddress,
        interval_us: u16,
        duration_ms: u16,
    ) -> Result<NodeAction, MacError> {
        self.wakeup.wake_up(current_time_us, target, interval_us, duration_ms)?;
        Ok(NodeAction::from_deadline(self.next_deadline()))
    }

    pub fn stop_wake_up(&mut self) {
        self.wakeup.stop();
    }

    // --- MAC request plumbing ---

    /// Executes the send and purge requests raised by the indirect manager
    /// while the MAC was calling it back.
    pub(super) fn process_mac_requests(&mut self, current_time_us: u64) {
        self.context.now_us = current_time_us;
        while let Some(request) = self.context.indirect.take_mac_request() {
            match request {
                MacRequest::SendFrameRequest(sender) => {
                    let result = self.mac.send_frame_request(
                        current_time_us,
                        sender,
                        &mut self.context,
                        &mut self.neighbors,
                    );
                    if let Err(e) = result {
                        my_warn!(self.context.log_context("node"), "Frame request of {} refused: {}", sender, e);
                        self.context.indirect.handle_request_failed(sender, e);
                    }
                }
                MacRequest::Purge(sender) => match self.mac.purge_frame_request(sender) {
                    Ok(outcome) => trace!("[Indirect] Purged {}: {:?}", sender, outcome),
                    Err(e) => trace!("[Indirect] Nothing to purge for {}: {}", sender, e),
                },
            }
        }
    }

    pub(super) fn after_mac_call(&mut self, current_time_us: u64) -> NodeAction {
        self.process_mac_requests(current_time_us);
        NodeAction::from_deadline(self.next_deadline())
    }

    // --- Accessors ---

    pub fn mac(&self) -> &MacScheduler<R, G, K, C> {
        &self.mac
    }

    pub fn mac_mut(&mut self) -> &mut MacScheduler<R, G, K, C> {
        &mut self.mac
    }

    pub fn indirect(&self) -> &IndirectTxManager {
        &self.context.indirect
    }

    pub fn wakeup(&self) -> &WakeupTxScheduler {
        &self.wakeup
    }

    pub fn wakeup_mut(&mut self) -> &mut WakeupTxScheduler {
        &mut self.wakeup
    }

    pub fn reassembler(&self) -> &Reassembler {
        &self.context.reassembler
    }

    pub fn neighbors(&self) -> &NeighborList {
        &self.neighbors
    }

    pub fn neighbors_mut(&mut self) -> &mut NeighborList {
        &mut self.neighbors
    }
}

impl<R, G, K, C> Node for LinkNode<R, G, K, C>
where
    R: RadioDriver,
    G: RngCore,
    K: KeyProvider,
    C: FrameCipher,
{
    fn process_radio_frame(
        &mut self,
        current_time_us: u64,
        result: Result<RxFrame<'_>, MacError>,
    ) -> NodeAction {
        self.context.now_us = current_time_us;
        self.mac
            .handle_receive_done(current_time_us, result, &mut self.context, &mut self.neighbors);
        self.after_mac_call(current_time_us)
    }

    fn process_transmit_done(
        &mut self,
        current_time_us: u64,
        result: Result<TxDone, MacError>,
    ) -> NodeAction {
        self.context.now_us = current_time_us;
        self.mac
            .handle_transmit_done(current_time_us, result, &mut self.context, &mut self.neighbors);
        self.after_mac_call(current_time_us)
    }

    fn tick(&mut self, current_time_us: u64) -> NodeAction {
        tick::process_tick(self, current_time_us)
    }

    fn next_deadline(&self) -> Option<u64> {
        crate::common::earliest(&[
            self.mac.next_deadline(),
            self.wakeup.next_deadline(),
            self.context.reassembler.next_deadline(),
        ])
    }
}
