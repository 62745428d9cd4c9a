// crates/thread-mac-rs/src/mac/tx.rs
//! Transmit path: operation dispatch, CSMA/CA, retries and completion.

use super::client::{MacClient, SendDisposition, WakeupFrameSink};
use super::csma::{backoff_delay_us, backoff_exponent};
use super::main::{C_MAX_QUEUED_WAKEUP_FRAMES, MacScheduler};
use super::operation::{Operation, PendingOperations};
use super::registry::SenderId;
use crate::frame::{CommandId, Frame, FrameType, FrameVersion};
use crate::hal::{MacError, RadioCaps, RadioDriver, TxDone, TxRequest};
use crate::neighbor::NeighborTable;
use crate::security::{FrameCipher, KeyProvider, secure_outgoing};
use crate::types::{Channel, MacAddress};
use alloc::vec::Vec;
use log::{debug, trace, warn};
use rand_core::RngCore;

/// What the frame in flight is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TxKind {
    Data(SenderId),
    Beacon,
    /// Sent at the start of each active scan channel.
    BeaconRequest,
    Wakeup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TxPhase {
    /// Waiting for the CSMA backoff timer.
    Backoff,
    /// Handed to the radio, waiting for the transmit-done report.
    InRadio,
    /// Transmitted, waiting for the ack frame.
    AwaitingAck,
}

/// The frame currently owned by the transmit path.
#[derive(Debug)]
pub(super) struct TxContext {
    pub(super) kind: TxKind,
    pub(super) frame: Frame,
    /// The secured, serialized frame. Retries resend it unchanged.
    pub(super) psdu: Vec<u8>,
    pub(super) channel: Channel,
    pub(super) phase: TxPhase,
    pub(super) max_tx_attempts: u8,
}

impl TxContext {
    pub(super) fn sender(&self) -> Option<SenderId> {
        match self.kind {
            TxKind::Data(sender) => Some(sender),
            _ => None,
        }
    }
}

/// Outcome of a frame: `Ok(frame_pending)` carries the frame-pending bit of
/// the ack, if one was requested.
type TxOutcome = Result<bool, MacError>;

impl<R, G, K, C> MacScheduler<R, G, K, C>
where
    R: RadioDriver,
    G: RngCore,
    K: KeyProvider,
    C: FrameCipher,
{
    /// Starts pending operations in priority order while the radio is idle.
    pub(super) fn start_next_operation(
        &mut self,
        current_time_us: u64,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) {
        if !self.enabled {
            return;
        }
        while self.operation == Operation::Idle {
            if !self.senders.is_empty() {
                self.pending.insert(PendingOperations::TRANSMIT_DATA);
            }
            match self.pending.take_next() {
                Some(Operation::ActiveScan) | Some(Operation::EnergyScan) => {
                    self.start_scan(current_time_us, client, neighbors)
                }
                Some(Operation::TransmitBeacon) => {
                    self.start_beacon(current_time_us, client, neighbors)
                }
                Some(Operation::TransmitData) => {
                    self.start_data(current_time_us, client, neighbors)
                }
                Some(_) => {}
                None => {
                    self.update_idle_radio();
                    return;
                }
            }
        }
    }

    /// Asks the next sender for a frame and starts transmitting it.
    pub(super) fn start_data(
        &mut self,
        current_time_us: u64,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) {
        let Some(sender) = self.senders.pop_front() else {
            return;
        };
        self.operation = Operation::TransmitData;

        let mut frame = Frame::default();
        if let Err(e) = client.handle_frame_request(sender, &mut frame, neighbors) {
            debug!("[MAC] {} has no frame to send: {}", sender, e);
            self.finish_operation();
            return;
        }
        if !frame.is_retransmission {
            frame.sequence = self.next_data_sequence();
        }
        frame.csma_attempts = 0;
        frame.tx_attempts = 0;

        let retries = if frame.indirect {
            self.config.max_frame_retries_indirect
        } else {
            self.config.max_frame_retries_direct
        };
        let channel = self.channel;
        self.begin_frame(current_time_us, TxKind::Data(sender), frame, channel, retries + 1, client, neighbors);
    }

    pub(super) fn start_beacon(
        &mut self,
        current_time_us: u64,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) {
        self.operation = Operation::TransmitBeacon;
        let frame = Frame {
            frame_type: FrameType::Beacon,
            version: FrameVersion::V2003,
            sequence: self.next_beacon_sequence(),
            src_pan_id: Some(self.pan_id),
            src: MacAddress::Extended(self.ext_address),
            payload: self.beacon_payload.to_frame_payload(),
            ..Frame::default()
        };
        let channel = self.channel;
        self.begin_frame(current_time_us, TxKind::Beacon, frame, channel, 1, client, neighbors);
    }

    /// Secures and serializes `frame`, then starts channel access.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn begin_frame(
        &mut self,
        current_time_us: u64,
        kind: TxKind,
        mut frame: Frame,
        channel: Channel,
        max_tx_attempts: u8,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) {
        let prepared = secure_outgoing(&mut frame, &self.ext_address, &mut self.keys, &mut self.cipher)
            .and_then(|_| frame.to_psdu());
        let (psdu, error) = match prepared {
            Ok(psdu) => (psdu, None),
            Err(e) => (Vec::new(), Some(e)),
        };
        self.tx = Some(TxContext {
            kind,
            frame,
            psdu,
            channel,
            phase: TxPhase::Backoff,
            max_tx_attempts,
        });
        match error {
            Some(e) => {
                warn!("[MAC] Failed to prepare {:?} frame: {}", kind, e);
                self.complete(current_time_us, Err(e), client, neighbors);
            }
            None => self.begin_channel_access(current_time_us, client, neighbors),
        }
    }

    /// Waits a random backoff before the next attempt, unless the radio does
    /// CSMA itself.
    pub(super) fn begin_channel_access(
        &mut self,
        current_time_us: u64,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) {
        let Some(tx) = self.tx.as_mut() else {
            return;
        };
        tx.phase = TxPhase::Backoff;
        if self.caps.contains(RadioCaps::CSMA_BACKOFF) {
            self.transmit_attempt(current_time_us, client, neighbors);
            return;
        }
        let be = backoff_exponent(self.config.min_be, self.config.max_be, tx.frame.csma_attempts);
        let delay = backoff_delay_us(&mut self.rng, be);
        trace!(
            "[MAC] Backoff BE={} delay={}us (csma attempt {})",
            be, delay, tx.frame.csma_attempts
        );
        if delay == 0 {
            self.transmit_attempt(current_time_us, client, neighbors);
        } else {
            self.backoff_timer.start(current_time_us, delay);
        }
    }

    /// Hands the frame in flight to the radio.
    pub(super) fn transmit_attempt(
        &mut self,
        current_time_us: u64,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) {
        let Some(tx) = self.tx.as_mut() else {
            return;
        };
        tx.phase = TxPhase::InRadio;
        let request = TxRequest {
            psdu: &tx.psdu,
            channel: tx.channel,
            cca: true,
            ack_request: tx.frame.ack_request,
            tx_at_us: None,
        };
        if let Err(e) = self.radio.transmit(&request) {
            debug!("[MAC] Radio rejected transmission: {}", e);
            self.process_tx_result(current_time_us, Err(e), client, neighbors);
        }
    }

    /// Reports the end of a transmission started by the scheduler.
    pub fn handle_transmit_done(
        &mut self,
        current_time_us: u64,
        result: Result<TxDone, MacError>,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) {
        let Some(tx) = self.tx.as_ref() else {
            warn!("[MAC] Transmit done without a frame in flight");
            return;
        };
        if tx.phase != TxPhase::InRadio {
            warn!("[MAC] Unexpected transmit done in phase {:?}", tx.phase);
            return;
        }
        if tx.kind == TxKind::Wakeup {
            match result {
                Ok(_) => self.counters.tx_wakeup += 1,
                Err(e) => debug!("[MAC] Wake-up frame failed: {}", e),
            }
            self.counters.tx_total += 1;
            self.wakeup_frames_in_radio = self.wakeup_frames_in_radio.saturating_sub(1);
            if self.wakeup_frames_in_radio > 0 {
                // Later frames of the burst are still queued in the radio.
                return;
            }
            self.finish_operation();
        } else {
            self.process_tx_result(current_time_us, result, client, neighbors);
        }
        self.start_next_operation(current_time_us, client, neighbors);
    }

    fn process_tx_result(
        &mut self,
        current_time_us: u64,
        result: Result<TxDone, MacError>,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) {
        let Some(tx) = self.tx.as_mut() else {
            return;
        };
        match result {
            Ok(done) => {
                self.cca_tracker.add_sample(true);
                if tx.frame.ack_request && !self.caps.contains(RadioCaps::ACK_TIMEOUT) {
                    tx.phase = TxPhase::AwaitingAck;
                    self.ack_timer.start(current_time_us, self.config.ack_timeout_us);
                    if let Err(e) = self.radio.receive(tx.channel) {
                        warn!("[MAC] Failed to listen for ack: {}", e);
                    }
                } else {
                    let frame_pending = tx.frame.ack_request && done.ack_frame_pending;
                    self.complete(current_time_us, Ok(frame_pending), client, neighbors);
                }
            }
            Err(MacError::ChannelAccessFailure) => {
                self.cca_tracker.add_sample(false);
                self.counters.tx_err_busy_channel += 1;
                tx.frame.csma_attempts += 1;
                let exhausted = self.caps.contains(RadioCaps::CSMA_BACKOFF)
                    || tx.frame.csma_attempts > self.config.max_csma_backoffs;
                if exhausted {
                    self.complete(current_time_us, Err(MacError::ChannelAccessFailure), client, neighbors);
                } else {
                    self.begin_channel_access(current_time_us, client, neighbors);
                }
            }
            Err(MacError::NoAck) => {
                self.cca_tracker.add_sample(true);
                self.handle_no_ack(current_time_us, client, neighbors);
            }
            Err(e) => {
                debug!("[MAC] Transmission aborted: {}", e);
                self.complete(current_time_us, Err(MacError::Abort), client, neighbors);
            }
        }
    }

    /// Retries an unacknowledged frame while the attempt budget lasts.
    pub(super) fn handle_no_ack(
        &mut self,
        current_time_us: u64,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) {
        let Some(tx) = self.tx.as_mut() else {
            return;
        };
        tx.frame.tx_attempts += 1;
        let exhausted = self.caps.contains(RadioCaps::RETRANSMIT)
            || tx.frame.tx_attempts >= tx.max_tx_attempts;
        if exhausted {
            self.complete(current_time_us, Err(MacError::NoAck), client, neighbors);
            return;
        }
        debug!(
            "[MAC] No ack for seq {}, retry {}/{}",
            tx.frame.sequence,
            tx.frame.tx_attempts,
            tx.max_tx_attempts - 1
        );
        self.counters.tx_retry += 1;
        tx.frame.csma_attempts = 0;
        self.begin_channel_access(current_time_us, client, neighbors);
    }

    /// Ends the frame in flight and notifies its owner.
    pub(super) fn complete(
        &mut self,
        current_time_us: u64,
        outcome: TxOutcome,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        self.backoff_timer.stop();
        self.ack_timer.stop();
        self.update_tx_counters(&tx.frame, &outcome);

        match tx.kind {
            TxKind::Data(sender) => {
                if tx.frame.ack_request {
                    if let Some(neighbor) = neighbors.find_mut(&tx.frame.dst) {
                        match outcome {
                            Ok(_) => neighbor.link_failures = 0,
                            Err(MacError::NoAck) => {
                                neighbor.link_failures = neighbor.link_failures.saturating_add(1)
                            }
                            Err(_) => {}
                        }
                    }
                }
                if outcome == Ok(true) {
                    trace!("[MAC] Ack announced pending data, waiting for it");
                    self.data_poll_timer.start(current_time_us, self.config.data_poll_timeout_us);
                }
                let result = outcome.map(|_| ());
                let disposition = client.handle_sent_frame(sender, &tx.frame, result, neighbors);
                if disposition == SendDisposition::SendMore {
                    // Follow-on frame goes out before anything else is scheduled.
                    self.tx = None;
                    if self.senders.push_front(sender).is_ok() {
                        self.start_data(current_time_us, client, neighbors);
                        return;
                    }
                    warn!("[MAC] Dropping follow-on request of {}", sender);
                }
                self.finish_operation();
            }
            TxKind::BeaconRequest => {
                // The scan dwell starts once the request is out.
                self.start_scan_dwell(current_time_us, tx.channel);
            }
            TxKind::Beacon | TxKind::Wakeup => self.finish_operation(),
        }
    }

    pub(super) fn update_tx_counters(&mut self, frame: &Frame, outcome: &TxOutcome) {
        let counters = &mut self.counters;
        counters.tx_total += 1;
        if frame.dst.is_broadcast() || frame.dst.is_none() {
            counters.tx_broadcast += 1;
        } else {
            counters.tx_unicast += 1;
        }
        if frame.ack_request {
            counters.tx_ack_requested += 1;
            if outcome.is_ok() {
                counters.tx_acked += 1;
            }
        } else {
            counters.tx_no_ack_requested += 1;
        }
        match (frame.frame_type, frame.command_id()) {
            (FrameType::Data, _) => counters.tx_data += 1,
            (FrameType::Beacon, _) => counters.tx_beacon += 1,
            (FrameType::Command, Some(CommandId::DataRequest)) => counters.tx_data_poll += 1,
            (FrameType::Command, Some(CommandId::BeaconRequest)) => counters.tx_beacon_request += 1,
            _ => counters.tx_other += 1,
        }
        match outcome {
            Err(MacError::ChannelAccessFailure) => counters.tx_err_cca += 1,
            Err(MacError::Abort) => counters.tx_err_abort += 1,
            _ => {}
        }
    }
}

impl<R, G, K, C> WakeupFrameSink for MacScheduler<R, G, K, C>
where
    R: RadioDriver,
    G: RngCore,
    K: KeyProvider,
    C: FrameCipher,
{
    fn transmit_wakeup_frame(
        &mut self,
        _current_time_us: u64,
        frame: &Frame,
        tx_time_us: u64,
    ) -> Result<(), MacError> {
        if !self.enabled {
            return Err(MacError::InvalidState);
        }
        let scan_pending = self
            .pending
            .contains(PendingOperations::ACTIVE_SCAN)
            || self.pending.contains(PendingOperations::ENERGY_SCAN);
        let queued = match self.operation {
            Operation::Idle => 0,
            Operation::TransmitWakeup => self.wakeup_frames_in_radio,
            _ => return Err(MacError::Busy),
        };
        if scan_pending || queued >= C_MAX_QUEUED_WAKEUP_FRAMES {
            return Err(MacError::Busy);
        }
        let psdu = frame.to_psdu()?;
        let channel = self.channel;
        let request = TxRequest {
            psdu: &psdu,
            channel,
            cca: false,
            ack_request: false,
            tx_at_us: Some(tx_time_us),
        };
        self.radio.transmit(&request)?;
        trace!("[MAC] Wake-up frame scheduled at {}us", tx_time_us);
        self.wakeup_frames_in_radio = queued + 1;
        if queued > 0 {
            return Ok(());
        }
        self.operation = Operation::TransmitWakeup;
        self.tx = Some(TxContext {
            kind: TxKind::Wakeup,
            frame: frame.clone(),
            psdu,
            channel,
            phase: TxPhase::InRadio,
            max_tx_attempts: 1,
        });
        Ok(())
    }
}
