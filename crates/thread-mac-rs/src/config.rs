// crates/thread-mac-rs/src/config.rs
use crate::types::{
    C_ACK_TIMEOUT_US, C_DATA_POLL_TIMEOUT_US, C_MAC_MAX_BE, C_MAC_MIN_BE, C_MAX_CSMA_BACKOFFS,
    C_MAX_FRAME_RETRIES, C_SCAN_DURATION_DEFAULT_MS,
};

/// Tunables of the MAC scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacConfig {
    pub min_be: u8,
    pub max_be: u8,
    pub max_csma_backoffs: u8,
    /// Retransmissions after the first attempt of a direct frame.
    pub max_frame_retries_direct: u8,
    /// Retransmissions after the first attempt of an indirect frame. Every
    /// further attempt is triggered by the next poll from the child instead.
    pub max_frame_retries_indirect: u8,
    pub ack_timeout_us: u64,
    pub data_poll_timeout_us: u64,
    pub scan_duration_default_ms: u16,
    /// RSSI sampling period during a software energy scan.
    pub energy_scan_sample_interval_us: u64,
    /// Number of samples the CCA failure rate is averaged over.
    pub cca_averaging_window: u16,
    /// Noise floor used to turn received signal strength into link margin.
    pub noise_floor_dbm: i8,
}

impl Default for MacConfig {
    fn default() -> Self {
        Self {
            min_be: C_MAC_MIN_BE,
            max_be: C_MAC_MAX_BE,
            max_csma_backoffs: C_MAX_CSMA_BACKOFFS,
            max_frame_retries_direct: C_MAX_FRAME_RETRIES,
            max_frame_retries_indirect: 0,
            ack_timeout_us: C_ACK_TIMEOUT_US,
            data_poll_timeout_us: C_DATA_POLL_TIMEOUT_US,
            scan_duration_default_ms: C_SCAN_DURATION_DEFAULT_MS,
            energy_scan_sample_interval_us: 1_000,
            cca_averaging_window: 512,
            noise_floor_dbm: -100,
        }
    }
}

/// Tunables of the indirect transmission manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndirectConfig {
    /// Dedicated send slots for sleepy children.
    pub sed_slots: usize,
    /// Shared send resources claimed per message by children without a slot.
    pub floating_senders: usize,
    pub queue_capacity: usize,
    pub max_poll_triggered_tx_attempts: u8,
    pub reassembly_timeout_us: u64,
    /// Maximum number of datagrams reassembled concurrently.
    pub reassembly_capacity: usize,
}

impl Default for IndirectConfig {
    fn default() -> Self {
        Self {
            sed_slots: 4,
            floating_senders: 2,
            queue_capacity: 32,
            max_poll_triggered_tx_attempts: 4,
            reassembly_timeout_us: 5_000_000,
            reassembly_capacity: 4,
        }
    }
}

/// Platform timing used to schedule wake-up frames ahead of their air time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeupConfig {
    /// Fixed lead time for the radio to accept a timed transmission.
    pub csl_request_ahead_us: u64,
    /// Host-to-radio bus speed in bits per second. Zero for an on-chip radio.
    pub bus_speed_hz: u32,
    pub bus_latency_us: u64,
}

impl Default for WakeupConfig {
    fn default() -> Self {
        Self {
            csl_request_ahead_us: 2_000,
            bus_speed_hz: 0,
            bus_latency_us: 0,
        }
    }
}

/// Complete configuration of a link node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkConfig {
    pub mac: MacConfig,
    pub indirect: IndirectConfig,
    pub wakeup: WakeupConfig,
}
