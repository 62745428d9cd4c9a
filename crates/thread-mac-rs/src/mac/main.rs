// crates/thread-mac-rs/src/mac/main.rs
use super::client::{MacClient, PurgeOutcome};
use super::counters::{MacCounters, SuccessRateTracker};
use super::operation::{Operation, PendingOperations};
use super::registry::{ReceiverId, ReceiverRegistry, SenderId, SenderQueue};
use super::scan::{ScanKind, ScanState};
use super::tx::{TxContext, TxPhase};
use crate::common::{Deadline, earliest};
use crate::config::MacConfig;
use crate::frame::BeaconPayload;
use crate::hal::{MacError, RadioCaps, RadioDriver};
use crate::neighbor::NeighborTable;
use crate::security::{AesCcmCipher, FrameCipher, KeyProvider};
use crate::types::{Channel, ExtAddress, PanId, ShortAddress};
use log::{debug, info, trace, warn};
use rand_core::RngCore;

/// Channel used until `set_channel` is called.
pub const C_DEFAULT_CHANNEL: Channel = Channel(11);

/// Timed wake-up frames the radio may hold at once, counting the one not
/// yet on air.
pub const C_MAX_QUEUED_WAKEUP_FRAMES: u8 = 4;

/// The MAC scheduler: sole owner of the radio.
///
/// It arbitrates the radio between scans, beacons, wake-up frames and data
/// transmissions, runs CSMA/CA and retries, applies frame security and
/// reports every completion to exactly the sender or receiver involved.
///
/// The scheduler is driven by its owner: every call takes the current time,
/// and `tick` must be called at or after `next_deadline()`.
pub struct MacScheduler<R, G, K, C = AesCcmCipher> {
    pub(super) radio: R,
    pub(super) rng: G,
    pub(super) keys: K,
    pub(super) cipher: C,
    pub(super) config: MacConfig,
    pub(super) caps: RadioCaps,

    // --- Addressing and radio settings ---
    pub(super) ext_address: ExtAddress,
    pub(super) short_address: ShortAddress,
    pub(super) pan_id: PanId,
    pub(super) channel: Channel,
    pub(super) enabled: bool,
    pub(super) rx_on_when_idle: bool,
    pub(super) promiscuous: bool,
    pub(super) beacon_enabled: bool,
    pub(super) beacon_payload: BeaconPayload,

    // --- Scheduling state ---
    pub(super) operation: Operation,
    pub(super) pending: PendingOperations,
    pub(super) senders: SenderQueue,
    pub(super) receivers: ReceiverRegistry,
    pub(super) tx: Option<TxContext>,
    /// Wake-up frames handed to the radio and not yet reported done.
    pub(super) wakeup_frames_in_radio: u8,
    pub(super) scan: Option<ScanState>,
    pub(super) data_sequence: u8,
    pub(super) beacon_sequence: u8,

    // --- Timers ---
    pub(super) backoff_timer: Deadline,
    pub(super) ack_timer: Deadline,
    pub(super) data_poll_timer: Deadline,

    // --- Diagnostics ---
    pub(super) counters: MacCounters,
    pub(super) cca_tracker: SuccessRateTracker,
}

impl<R, G, K, C> MacScheduler<R, G, K, C>
where
    R: RadioDriver,
    G: RngCore,
    K: KeyProvider,
    C: FrameCipher,
{
    /// Creates a disabled scheduler. Call `start` to enable it.
    pub fn new(radio: R, mut rng: G, keys: K, cipher: C, config: MacConfig) -> Self {
        let caps = radio.capabilities();
        let ext_address = radio.ext_address();
        let data_sequence = rng.next_u32() as u8;
        let beacon_sequence = rng.next_u32() as u8;
        let cca_tracker = SuccessRateTracker::new(config.cca_averaging_window);
        info!(
            "[MAC] Created scheduler for {} (caps={:#04x})",
            ext_address, caps.0
        );
        Self {
            radio,
            rng,
            keys,
            cipher,
            config,
            caps,
            ext_address,
            short_address: ShortAddress::NONE,
            pan_id: PanId::BROADCAST,
            channel: C_DEFAULT_CHANNEL,
            enabled: false,
            rx_on_when_idle: false,
            promiscuous: false,
            beacon_enabled: false,
            beacon_payload: BeaconPayload::default(),
            operation: Operation::Idle,
            pending: PendingOperations::empty(),
            senders: SenderQueue::new(),
            receivers: ReceiverRegistry::new(),
            tx: None,
            wakeup_frames_in_radio: 0,
            scan: None,
            data_sequence,
            beacon_sequence,
            backoff_timer: Deadline::new(),
            ack_timer: Deadline::new(),
            data_poll_timer: Deadline::new(),
            counters: MacCounters::default(),
            cca_tracker,
        }
    }

    /// Enables the scheduler. Queued work resumes at the next `tick`.
    pub fn start(&mut self) {
        if self.enabled {
            return;
        }
        info!("[MAC] Enabled on channel {}", self.channel.0);
        self.enabled = true;
        if self.operation == Operation::Idle {
            self.update_idle_radio();
        }
    }

    /// Disables the scheduler. An operation in progress runs to completion;
    /// queued work waits until the next `start`.
    pub fn stop(&mut self) {
        if !self.enabled {
            return;
        }
        info!("[MAC] Disabled");
        self.enabled = false;
        self.data_poll_timer.stop();
        if self.operation == Operation::Idle {
            self.update_idle_radio();
        }
    }

    // --- Settings ---

    pub fn set_pan_id(&mut self, pan_id: PanId) {
        self.pan_id = pan_id;
    }

    pub fn set_short_address(&mut self, short_address: ShortAddress) {
        self.short_address = short_address;
    }

    pub fn set_ext_address(&mut self, ext_address: ExtAddress) {
        self.ext_address = ext_address;
    }

    pub fn set_channel(&mut self, channel: Channel) {
        if self.channel == channel {
            return;
        }
        debug!("[MAC] Channel {} -> {}", self.channel.0, channel.0);
        self.channel = channel;
        if self.operation == Operation::Idle {
            self.update_idle_radio();
        }
    }

    pub fn set_rx_on_when_idle(&mut self, rx_on_when_idle: bool) {
        self.rx_on_when_idle = rx_on_when_idle;
        if self.operation == Operation::Idle {
            self.update_idle_radio();
        }
    }

    /// In promiscuous mode every received frame is delivered regardless of
    /// its destination.
    pub fn set_promiscuous(&mut self, promiscuous: bool) {
        self.promiscuous = promiscuous;
    }

    /// Answer beacon requests with beacons.
    pub fn set_beacon_enabled(&mut self, enabled: bool) {
        self.beacon_enabled = enabled;
    }

    pub fn set_beacon_payload(&mut self, payload: BeaconPayload) {
        self.beacon_payload = payload;
    }

    // --- Registration ---

    pub fn register_receiver(&mut self, receiver: ReceiverId) -> Result<(), MacError> {
        self.receivers.register(receiver)
    }

    pub fn unregister_receiver(&mut self, receiver: ReceiverId) -> bool {
        self.receivers.unregister(receiver)
    }

    /// Queues `sender` for the radio. If the radio is idle the sender is asked
    /// for its frame right away.
    pub fn send_frame_request(
        &mut self,
        current_time_us: u64,
        sender: SenderId,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) -> Result<(), MacError> {
        if !self.enabled {
            return Err(MacError::InvalidState);
        }
        if self.is_sender_in_flight(sender) {
            return Err(MacError::Already);
        }
        self.senders.push_back(sender)?;
        trace!("[MAC] {} queued ({} pending)", sender, self.senders.len());
        self.pending.insert(PendingOperations::TRANSMIT_DATA);
        self.start_next_operation(current_time_us, client, neighbors);
        Ok(())
    }

    /// Withdraws a frame request.
    ///
    /// Fails with `Already` once the frame has been handed to the radio, or if
    /// the sender has no request.
    pub fn purge_frame_request(&mut self, sender: SenderId) -> Result<PurgeOutcome, MacError> {
        if self.senders.remove(sender) {
            if self.senders.is_empty() {
                self.pending.remove(PendingOperations::TRANSMIT_DATA);
            }
            debug!("[MAC] Purged queued {}", sender);
            return Ok(PurgeOutcome::Removed);
        }
        let in_backoff = self
            .tx
            .as_ref()
            .is_some_and(|tx| tx.sender() == Some(sender) && tx.phase == TxPhase::Backoff);
        if in_backoff {
            debug!("[MAC] Aborted {} during backoff", sender);
            self.backoff_timer.stop();
            if let Some(tx) = self.tx.take() {
                self.update_tx_counters(&tx.frame, &Err(MacError::Abort));
            }
            self.finish_operation();
            return Ok(PurgeOutcome::Aborted);
        }
        Err(MacError::Already)
    }

    fn is_sender_in_flight(&self, sender: SenderId) -> bool {
        self.tx.as_ref().is_some_and(|tx| tx.sender() == Some(sender))
    }

    // --- Queries ---

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn pending_operations(&self) -> PendingOperations {
        self.pending
    }

    pub fn is_in_transmit_state(&self) -> bool {
        matches!(
            self.operation,
            Operation::TransmitBeacon | Operation::TransmitData | Operation::TransmitWakeup
        )
    }

    /// True while an active scan runs or waits for the radio.
    pub fn is_active_scan_in_progress(&self) -> bool {
        self.scan.as_ref().is_some_and(|s| s.kind == ScanKind::Active)
    }

    pub fn is_energy_scan_in_progress(&self) -> bool {
        self.scan.as_ref().is_some_and(|s| s.kind == ScanKind::Energy)
    }

    pub fn queued_sender_count(&self) -> usize {
        self.senders.len()
    }

    pub fn counters(&self) -> &MacCounters {
        &self.counters
    }

    pub fn reset_counters(&mut self) {
        self.counters = MacCounters::default();
    }

    /// CCA failure rate, `0xffff` meaning every assessment failed.
    pub fn cca_failure_rate(&self) -> u16 {
        self.cca_tracker.failure_rate()
    }

    pub fn ext_address(&self) -> ExtAddress {
        self.ext_address
    }

    pub fn short_address(&self) -> ShortAddress {
        self.short_address
    }

    pub fn pan_id(&self) -> PanId {
        self.pan_id
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn rx_on_when_idle(&self) -> bool {
        self.rx_on_when_idle
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn keys(&self) -> &K {
        &self.keys
    }

    pub fn keys_mut(&mut self) -> &mut K {
        &mut self.keys
    }

    /// Earliest time `tick` has work to do. A value in the past (0) means
    /// queued work is waiting for an idle radio.
    pub fn next_deadline(&self) -> Option<u64> {
        let has_pending_work = !self.pending.is_empty() || !self.senders.is_empty();
        if self.enabled && self.operation == Operation::Idle && has_pending_work {
            return Some(0);
        }
        let scan = self.scan.as_ref();
        earliest(&[
            self.backoff_timer.deadline(),
            self.ack_timer.deadline(),
            self.data_poll_timer.deadline(),
            scan.and_then(|s| s.dwell.deadline()),
            scan.and_then(|s| s.sample.deadline()),
        ])
    }

    // --- Internal helpers ---

    pub(super) fn next_data_sequence(&mut self) -> u8 {
        let sequence = self.data_sequence;
        self.data_sequence = self.data_sequence.wrapping_add(1);
        sequence
    }

    pub(super) fn next_beacon_sequence(&mut self) -> u8 {
        let sequence = self.beacon_sequence;
        self.beacon_sequence = self.beacon_sequence.wrapping_add(1);
        sequence
    }

    /// Returns the radio to its idle state: receiving when rx-on-when-idle or
    /// while waiting for polled data, asleep otherwise.
    pub(super) fn update_idle_radio(&mut self) {
        let listen = self.enabled && (self.rx_on_when_idle || self.data_poll_timer.is_running());
        let result = if listen {
            self.radio.receive(self.channel)
        } else {
            self.radio.sleep()
        };
        if let Err(e) = result {
            warn!("[MAC] Failed to set idle radio state: {}", e);
        }
    }

    pub(super) fn finish_operation(&mut self) {
        trace!("[MAC] {} -> Idle", self.operation);
        self.operation = Operation::Idle;
        self.tx = None;
        self.wakeup_frames_in_radio = 0;
    }
}
