// crates/thread-mac-rs/src/mac/scan.rs
//! Active and energy scans.

use super::client::MacClient;
use super::main::MacScheduler;
use super::operation::{Operation, PendingOperations};
use super::tx::TxKind;
use crate::common::Deadline;
use crate::frame::{BeaconPayload, Frame};
use crate::hal::{MacError, RadioCaps, RadioDriver};
use crate::neighbor::NeighborTable;
use crate::security::{FrameCipher, KeyProvider};
use crate::types::{Channel, ChannelMask, ExtAddress, MacAddress, PanId};
use alloc::boxed::Box;
use core::fmt;
use log::{debug, info, trace, warn};
use rand_core::RngCore;

/// Reported when a channel produced no RSSI sample.
pub const C_RSSI_INVALID: i8 = 127;

/// A beacon heard during an active scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveScanResult {
    pub channel: Channel,
    pub rssi: i8,
    pub pan_id: PanId,
    pub ext_address: ExtAddress,
    /// Thread beacon contents, absent for foreign beacons.
    pub beacon: Option<BeaconPayload>,
}

/// Maximum RSSI observed on one channel during an energy scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergyScanResult {
    pub channel: Channel,
    pub max_rssi: i8,
}

/// Callback receiving scan results; called a final time with `None`.
pub enum ScanHandler {
    Active(Box<dyn FnMut(Option<&ActiveScanResult>)>),
    Energy(Box<dyn FnMut(Option<&EnergyScanResult>)>),
    None,
}

impl fmt::Debug for ScanHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanHandler::Active(_) => f.write_str("ScanHandler::Active"),
            ScanHandler::Energy(_) => f.write_str("ScanHandler::Energy"),
            ScanHandler::None => f.write_str("ScanHandler::None"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ScanKind {
    Active,
    Energy,
}

/// The one scan in progress or waiting for the radio.
#[derive(Debug)]
pub(super) struct ScanState {
    pub(super) kind: ScanKind,
    pub(super) mask: ChannelMask,
    pub(super) duration_ms: u16,
    pub(super) handler: ScanHandler,
    pub(super) current: Option<Channel>,
    pub(super) max_rssi: Option<i8>,
    /// Time left on the current channel.
    pub(super) dwell: Deadline,
    /// Next software RSSI sample.
    pub(super) sample: Deadline,
    /// Waiting for `handle_energy_scan_done` from the radio.
    pub(super) hardware: bool,
}

impl ScanState {
    fn report_active(&mut self, result: Option<&ActiveScanResult>) {
        if let ScanHandler::Active(handler) = &mut self.handler {
            handler(result);
        }
    }

    fn report_energy(&mut self, result: Option<&EnergyScanResult>) {
        if let ScanHandler::Energy(handler) = &mut self.handler {
            handler(result);
        }
    }
}

impl<R, G, K, C> MacScheduler<R, G, K, C>
where
    R: RadioDriver,
    G: RngCore,
    K: KeyProvider,
    C: FrameCipher,
{
    /// Scans the channels of `mask` for beacons, sending a beacon request on
    /// each and listening for `duration_ms`.
    ///
    /// A zero mask scans all 2.4 GHz channels; a zero duration uses the
    /// configured default.
    pub fn active_scan(
        &mut self,
        current_time_us: u64,
        mask: ChannelMask,
        duration_ms: u16,
        handler: ScanHandler,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) -> Result<(), MacError> {
        if matches!(handler, ScanHandler::Energy(_)) {
            return Err(MacError::InvalidArgs);
        }
        self.request_scan(ScanKind::Active, mask, duration_ms, handler)?;
        self.start_next_operation(current_time_us, client, neighbors);
        Ok(())
    }

    /// Measures the maximum RSSI on each channel of `mask` over `duration_ms`.
    pub fn energy_scan(
        &mut self,
        current_time_us: u64,
        mask: ChannelMask,
        duration_ms: u16,
        handler: ScanHandler,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) -> Result<(), MacError> {
        if matches!(handler, ScanHandler::Active(_)) {
            return Err(MacError::InvalidArgs);
        }
        self.request_scan(ScanKind::Energy, mask, duration_ms, handler)?;
        self.start_next_operation(current_time_us, client, neighbors);
        Ok(())
    }

    fn request_scan(
        &mut self,
        kind: ScanKind,
        mask: ChannelMask,
        duration_ms: u16,
        handler: ScanHandler,
    ) -> Result<(), MacError> {
        if !self.enabled {
            return Err(MacError::InvalidState);
        }
        if self.scan.is_some() {
            return Err(MacError::Busy);
        }
        let mask = if mask.is_empty() { ChannelMask::ALL_2_4_GHZ } else { mask };
        let duration_ms = if duration_ms == 0 {
            self.config.scan_duration_default_ms
        } else {
            duration_ms
        };
        info!(
            "[MAC] {:?} scan requested: mask={:#010x} duration={}ms",
            kind, mask.0, duration_ms
        );
        self.scan = Some(ScanState {
            kind,
            mask,
            duration_ms,
            handler,
            current: None,
            max_rssi: None,
            dwell: Deadline::new(),
            sample: Deadline::new(),
            hardware: false,
        });
        self.pending.insert(match kind {
            ScanKind::Active => PendingOperations::ACTIVE_SCAN,
            ScanKind::Energy => PendingOperations::ENERGY_SCAN,
        });
        Ok(())
    }

    pub(super) fn start_scan(
        &mut self,
        current_time_us: u64,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) {
        let Some(scan) = self.scan.as_ref() else {
            return;
        };
        self.operation = match scan.kind {
            ScanKind::Active => Operation::ActiveScan,
            ScanKind::Energy => Operation::EnergyScan,
        };
        self.scan_next_channel(current_time_us, client, neighbors);
    }

    /// Moves to the next channel of the mask, or finishes the scan.
    pub(super) fn scan_next_channel(
        &mut self,
        current_time_us: u64,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) {
        let Some(scan) = self.scan.as_mut() else {
            return;
        };
        let Some(channel) = scan.mask.next_channel(scan.current) else {
            self.finish_scan();
            return;
        };
        scan.current = Some(channel);
        scan.max_rssi = None;
        let kind = scan.kind;
        trace!("[MAC] {:?} scan on channel {}", kind, channel.0);

        match kind {
            ScanKind::Active => {
                if let Err(e) = self.radio.receive(channel) {
                    warn!("[MAC] Failed to switch to channel {}: {}", channel.0, e);
                }
                let frame = Frame::new_beacon_request(self.next_data_sequence());
                self.begin_frame(current_time_us, TxKind::BeaconRequest, frame, channel, 1, client, neighbors);
            }
            ScanKind::Energy => {
                if self.caps.contains(RadioCaps::ENERGY_SCAN) {
                    match self.radio.energy_scan(channel, scan.duration_ms) {
                        Ok(()) => {
                            scan.hardware = true;
                            return;
                        }
                        Err(e) => debug!("[MAC] Hardware energy scan failed ({}), sampling instead", e),
                    }
                }
                scan.hardware = false;
                if let Err(e) = self.radio.receive(channel) {
                    warn!("[MAC] Failed to switch to channel {}: {}", channel.0, e);
                }
                scan.dwell.start(current_time_us, scan.duration_ms as u64 * 1_000);
                self.sample_energy(current_time_us);
            }
        }
    }

    /// Starts listening on an active scan channel once its beacon request is out.
    pub(super) fn start_scan_dwell(&mut self, current_time_us: u64, channel: Channel) {
        let Some(scan) = self.scan.as_mut() else {
            return;
        };
        if let Err(e) = self.radio.receive(channel) {
            warn!("[MAC] Failed to listen on channel {}: {}", channel.0, e);
        }
        scan.dwell.start(current_time_us, scan.duration_ms as u64 * 1_000);
    }

    /// Takes one software RSSI sample and schedules the next.
    pub(super) fn sample_energy(&mut self, current_time_us: u64) {
        let Some(scan) = self.scan.as_mut() else {
            return;
        };
        if let Some(rssi) = self.radio.rssi() {
            scan.max_rssi = Some(scan.max_rssi.map_or(rssi, |max| max.max(rssi)));
        }
        scan.sample
            .start(current_time_us, self.config.energy_scan_sample_interval_us);
    }

    /// Reports the current energy scan channel and moves on.
    pub(super) fn complete_energy_channel(
        &mut self,
        current_time_us: u64,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) {
        let Some(scan) = self.scan.as_mut() else {
            return;
        };
        scan.sample.stop();
        scan.dwell.stop();
        scan.hardware = false;
        if let Some(channel) = scan.current {
            let result = EnergyScanResult {
                channel,
                max_rssi: scan.max_rssi.unwrap_or(C_RSSI_INVALID),
            };
            scan.report_energy(Some(&result));
        }
        self.scan_next_channel(current_time_us, client, neighbors);
    }

    /// Reports the result of a hardware energy scan started on the radio.
    pub fn handle_energy_scan_done(
        &mut self,
        current_time_us: u64,
        max_rssi: i8,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) {
        let waiting = self
            .scan
            .as_ref()
            .is_some_and(|s| s.kind == ScanKind::Energy && s.hardware);
        if self.operation != Operation::EnergyScan || !waiting {
            warn!("[MAC] Unexpected energy scan result");
            return;
        }
        if let Some(scan) = self.scan.as_mut() {
            scan.max_rssi = Some(max_rssi);
        }
        self.complete_energy_channel(current_time_us, client, neighbors);
        self.start_next_operation(current_time_us, client, neighbors);
    }

    /// Delivers a beacon heard during an active scan.
    pub(super) fn handle_scan_beacon(&mut self, frame: &Frame, rssi: i8) {
        let Some(scan) = self.scan.as_mut() else {
            return;
        };
        let Some(channel) = scan.current else {
            return;
        };
        let MacAddress::Extended(ext_address) = frame.src else {
            debug!("[MAC] Ignoring beacon without extended source");
            return;
        };
        let beacon = match BeaconPayload::from_frame_payload(&frame.payload) {
            Ok(beacon) => beacon,
            Err(e) => {
                debug!("[MAC] Malformed beacon from {}: {}", ext_address, e);
                return;
            }
        };
        let result = ActiveScanResult {
            channel,
            rssi,
            pan_id: frame.src_pan_id.unwrap_or(PanId::BROADCAST),
            ext_address,
            beacon,
        };
        scan.report_active(Some(&result));
    }

    /// Ends the scan: final `None` report, then back to the idle radio state.
    pub(super) fn finish_scan(&mut self) {
        if let Some(mut scan) = self.scan.take() {
            info!("[MAC] {:?} scan done", scan.kind);
            match scan.kind {
                ScanKind::Active => scan.report_active(None),
                ScanKind::Energy => scan.report_energy(None),
            }
        }
        self.finish_operation();
        self.update_idle_radio();
    }
}
