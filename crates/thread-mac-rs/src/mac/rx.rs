// crates/thread-mac-rs/src/mac/rx.rs
//! Receive path: parse, ack matching, filtering, security and dispatch.

use super::client::MacClient;
use super::main::MacScheduler;
use super::operation::{Operation, PendingOperations};
use super::tx::TxPhase;
use crate::frame::{CommandId, Frame, FrameType, KeyId, deserialize_frame};
use crate::hal::{MacError, RadioDriver, RxFrame};
use crate::neighbor::{Neighbor, NeighborTable};
use crate::security::{FrameCipher, KeyProvider, verify_incoming};
use crate::types::{MacAddress, PanId};
use log::{debug, trace};
use rand_core::RngCore;

impl<R, G, K, C> MacScheduler<R, G, K, C>
where
    R: RadioDriver,
    G: RngCore,
    K: KeyProvider,
    C: FrameCipher,
{
    /// Reports a frame received by the radio.
    pub fn handle_receive_done(
        &mut self,
        current_time_us: u64,
        result: Result<RxFrame<'_>, MacError>,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) {
        self.process_receive(current_time_us, result, client, neighbors);
        self.start_next_operation(current_time_us, client, neighbors);
    }

    fn process_receive(
        &mut self,
        current_time_us: u64,
        result: Result<RxFrame<'_>, MacError>,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) {
        // --- 1. Radio errors and parsing ---
        let rx = match result {
            Ok(rx) => rx,
            Err(MacError::FcsError) => {
                self.counters.rx_err_fcs += 1;
                return;
            }
            Err(e) => {
                trace!("[MAC] Receive failed: {}", e);
                self.counters.rx_err_no_frame += 1;
                return;
            }
        };
        if !self.enabled {
            return;
        }
        let mut frame = match deserialize_frame(rx.psdu) {
            Ok(frame) => frame,
            Err(MacError::FcsError) => {
                self.counters.rx_err_fcs += 1;
                return;
            }
            Err(e) => {
                debug!("[MAC] Dropping unparsable frame: {}", e);
                self.counters.rx_err_other += 1;
                return;
            }
        };
        self.counters.rx_total += 1;

        // --- 2. Ack matching ---
        if frame.frame_type == FrameType::Ack {
            self.handle_ack(current_time_us, &frame, client, neighbors);
            return;
        }

        // --- 3. Active scan only processes beacons ---
        if self.operation == Operation::ActiveScan {
            if frame.frame_type == FrameType::Beacon {
                self.counters.rx_beacon += 1;
                self.handle_scan_beacon(&frame, rx.rssi);
            }
            return;
        }
        if self.operation == Operation::EnergyScan {
            return;
        }

        // --- 4. Destination filtering ---
        if !self.promiscuous && !self.accepts_destination(&frame) {
            self.counters.rx_dest_addr_filtered += 1;
            return;
        }

        // --- 5. Source resolution ---
        match frame.src {
            MacAddress::None if frame.frame_type == FrameType::Data => {
                self.counters.rx_err_invalid_src_addr += 1;
                return;
            }
            MacAddress::Extended(ext) if ext == self.ext_address => {
                self.counters.rx_address_filtered += 1;
                return;
            }
            MacAddress::Short(short) if short.is_valid() && short == self.short_address => {
                self.counters.rx_address_filtered += 1;
                return;
            }
            _ => {}
        }

        // --- 6. Security and neighbor update ---
        {
            let mut neighbor = neighbors.find_mut(&frame.src);
            if let Err(e) = self.verify_frame(&mut frame, neighbor.as_deref_mut()) {
                match e {
                    MacError::Replay => self.counters.rx_err_replay += 1,
                    _ if neighbor.is_none() && matches!(frame.security.map(|s| s.key_id), Some(KeyId::Mode1 { .. })) => {
                        self.counters.rx_err_unknown_neighbor += 1
                    }
                    _ => self.counters.rx_err_sec += 1,
                }
                debug!("[MAC] Dropping frame from {}: {}", frame.src, e);
                return;
            }
            if let Some(neighbor) = neighbor {
                neighbor.link_info.add_rss(self.config.noise_floor_dbm, rx.rssi);
                neighbor.last_heard_us = current_time_us;
            }
        }

        // --- 7. Polled data ends the data poll wait ---
        if frame.frame_type == FrameType::Data && self.data_poll_timer.is_running() {
            if frame.frame_pending {
                self.data_poll_timer.start(current_time_us, self.config.data_poll_timeout_us);
            } else {
                self.data_poll_timer.stop();
            }
        }

        if frame.dst.is_broadcast() {
            self.counters.rx_broadcast += 1;
        } else {
            self.counters.rx_unicast += 1;
        }

        // --- 8. MAC commands handled by the link layer ---
        match frame.command_id() {
            Some(CommandId::BeaconRequest) => {
                self.counters.rx_beacon_request += 1;
                if self.beacon_enabled {
                    debug!("[MAC] Beacon request received, scheduling beacon");
                    self.pending.insert(PendingOperations::TRANSMIT_BEACON);
                }
                return;
            }
            Some(CommandId::DataRequest) => {
                self.counters.rx_data_poll += 1;
                client.handle_data_request(&frame.src, neighbors);
                return;
            }
            None => {}
        }
        match frame.frame_type {
            FrameType::Data => self.counters.rx_data += 1,
            FrameType::Beacon => self.counters.rx_beacon += 1,
            _ => self.counters.rx_other += 1,
        }

        // --- 9. Dispatch to the first accepting receiver ---
        let accepted = self
            .receivers
            .iter()
            .any(|receiver| client.handle_received_frame(receiver, &frame, neighbors));
        if !accepted {
            trace!("[MAC] No receiver accepted frame seq={}", frame.sequence);
        }
    }

    fn handle_ack(
        &mut self,
        current_time_us: u64,
        ack: &Frame,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) {
        let matches = self
            .tx
            .as_ref()
            .is_some_and(|tx| tx.phase == TxPhase::AwaitingAck && tx.frame.sequence == ack.sequence);
        if !matches {
            trace!("[MAC] Ignoring ack seq={}", ack.sequence);
            return;
        }
        self.ack_timer.stop();
        self.complete(current_time_us, Ok(ack.frame_pending), client, neighbors);
    }

    fn accepts_destination(&self, frame: &Frame) -> bool {
        if let Some(pan_id) = frame.dst_pan_id {
            if pan_id != self.pan_id && pan_id != PanId::BROADCAST {
                return false;
            }
        }
        match frame.dst {
            MacAddress::None => frame.frame_type == FrameType::Beacon,
            MacAddress::Short(short) => short.is_broadcast() || short == self.short_address,
            MacAddress::Extended(ext) => ext == self.ext_address,
        }
    }

    fn verify_frame(
        &mut self,
        frame: &mut Frame,
        neighbor: Option<&mut Neighbor>,
    ) -> Result<(), MacError> {
        let src_ext_address = match frame.src {
            MacAddress::Extended(ext) => Some(ext),
            _ => neighbor.as_ref().map(|n| n.ext_address),
        };
        verify_incoming(frame, src_ext_address, neighbor, &mut self.keys, &mut self.cipher)
    }
}
