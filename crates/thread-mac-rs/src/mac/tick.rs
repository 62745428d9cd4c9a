// crates/thread-mac-rs/src/mac/tick.rs
//! Handles time-based events of the MAC scheduler.

use super::client::MacClient;
use super::main::MacScheduler;
use super::operation::Operation;
use super::scan::ScanKind;
use super::tx::TxPhase;
use crate::hal::RadioDriver;
use crate::neighbor::NeighborTable;
use crate::security::{FrameCipher, KeyProvider};
use log::{debug, trace};
use rand_core::RngCore;

impl<R, G, K, C> MacScheduler<R, G, K, C>
where
    R: RadioDriver,
    G: RngCore,
    K: KeyProvider,
    C: FrameCipher,
{
    /// Runs every timer that has expired and starts pending operations.
    pub fn tick(
        &mut self,
        current_time_us: u64,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) {
        // --- 1. CSMA backoff elapsed ---
        if self.backoff_timer.fire(current_time_us) {
            let in_backoff = self.tx.as_ref().is_some_and(|tx| tx.phase == TxPhase::Backoff);
            if in_backoff {
                self.transmit_attempt(current_time_us, client, neighbors);
            }
        }

        // --- 2. Ack timeout ---
        if self.ack_timer.fire(current_time_us) {
            let awaiting = self.tx.as_ref().is_some_and(|tx| tx.phase == TxPhase::AwaitingAck);
            if awaiting {
                trace!("[MAC] Ack timeout");
                self.handle_no_ack(current_time_us, client, neighbors);
            }
        }

        // --- 3. Data poll timeout ---
        if self.data_poll_timer.fire(current_time_us) {
            debug!("[MAC] Data poll timeout");
            for receiver in self.receivers.iter() {
                client.handle_data_poll_timeout(receiver);
            }
            if self.operation == Operation::Idle {
                self.update_idle_radio();
            }
        }

        // --- 4. Scan timers ---
        self.tick_scan(current_time_us, client, neighbors);

        // --- 5. Pending operations ---
        self.start_next_operation(current_time_us, client, neighbors);
    }

    fn tick_scan(
        &mut self,
        current_time_us: u64,
        client: &mut dyn MacClient,
        neighbors: &mut dyn NeighborTable,
    ) {
        let Some(scan) = self.scan.as_mut() else {
            return;
        };
        let kind = scan.kind;
        let dwell_done = scan.dwell.fire(current_time_us);
        let sample_due = !dwell_done && scan.sample.fire(current_time_us);
        match kind {
            ScanKind::Active if dwell_done => self.scan_next_channel(current_time_us, client, neighbors),
            ScanKind::Energy if dwell_done => {
                self.complete_energy_channel(current_time_us, client, neighbors)
            }
            ScanKind::Energy if sample_due => self.sample_energy(current_time_us),
            _ => {}
        }
    }
}
