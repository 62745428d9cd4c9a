// crates/thread-mac-rs/src/mac/counters.rs

/// Full scale of a rate tracked by `SuccessRateTracker`.
pub const C_MAX_RATE: u16 = 0xffff;

/// MAC layer counters, mirroring the Thread diagnostic MAC counter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MacCounters {
    // --- Transmit ---
    pub tx_total: u32,
    pub tx_unicast: u32,
    pub tx_broadcast: u32,
    pub tx_ack_requested: u32,
    pub tx_acked: u32,
    pub tx_no_ack_requested: u32,
    pub tx_data: u32,
    pub tx_data_poll: u32,
    pub tx_beacon: u32,
    pub tx_beacon_request: u32,
    pub tx_wakeup: u32,
    pub tx_other: u32,
    pub tx_retry: u32,
    pub tx_err_cca: u32,
    pub tx_err_abort: u32,
    pub tx_err_busy_channel: u32,

    // --- Receive ---
    pub rx_total: u32,
    pub rx_unicast: u32,
    pub rx_broadcast: u32,
    pub rx_data: u32,
    pub rx_data_poll: u32,
    pub rx_beacon: u32,
    pub rx_beacon_request: u32,
    pub rx_other: u32,
    /// Frames from our own address, or without a required source address.
    pub rx_address_filtered: u32,
    pub rx_dest_addr_filtered: u32,
    pub rx_err_no_frame: u32,
    pub rx_err_unknown_neighbor: u32,
    pub rx_err_invalid_src_addr: u32,
    pub rx_err_sec: u32,
    pub rx_err_replay: u32,
    pub rx_err_fcs: u32,
    pub rx_err_other: u32,
}

/// Tracks a failure rate as an exponential moving average over a window.
///
/// The rate is scaled so that `C_MAX_RATE` means every sample failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessRateTracker {
    failure_rate: u16,
    sample_count: u16,
    window: u16,
}

impl SuccessRateTracker {
    pub fn new(window: u16) -> Self {
        Self {
            failure_rate: 0,
            sample_count: 0,
            window: window.max(1),
        }
    }

    pub fn add_sample(&mut self, success: bool) {
        if self.sample_count < self.window {
            self.sample_count += 1;
        }
        let n = self.sample_count as u32;
        let old = self.failure_rate as u32;
        let new = if success { 0 } else { C_MAX_RATE as u32 };
        self.failure_rate = ((old * (n - 1) + new + n / 2) / n) as u16;
    }

    pub fn failure_rate(&self) -> u16 {
        self.failure_rate
    }

    pub fn success_rate(&self) -> u16 {
        C_MAX_RATE - self.failure_rate
    }

    pub fn reset(&mut self) {
        self.failure_rate = 0;
        self.sample_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_samples_dominate_until_window_fills() {
        let mut tracker = SuccessRateTracker::new(512);
        tracker.add_sample(false);
        assert_eq!(tracker.failure_rate(), C_MAX_RATE);
        tracker.add_sample(true);
        // (0xffff * 1 + 0 + 1) / 2
        assert_eq!(tracker.failure_rate(), 0x8000);
    }

    #[test]
    fn test_window_limits_the_weight_of_new_samples() {
        let mut tracker = SuccessRateTracker::new(4);
        for _ in 0..4 {
            tracker.add_sample(true);
        }
        tracker.add_sample(false);
        // One failure in a window of four.
        assert_eq!(tracker.failure_rate(), 0x4000);
        assert_eq!(tracker.success_rate(), C_MAX_RATE - 0x4000);
    }
}
