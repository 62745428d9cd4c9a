// crates/thread-mac-rs/src/mac/mod.rs
//! The MAC scheduler and the interfaces of its senders and receivers.

pub mod client;
pub mod counters;
pub mod csma;
mod main;
pub mod operation;
pub mod registry;
mod rx;
pub mod scan;
mod tick;
mod tx;

pub use client::{MacClient, MacRequest, PurgeOutcome, SendDisposition, WakeupFrameSink};
pub use counters::{MacCounters, SuccessRateTracker};
pub use main::{C_DEFAULT_CHANNEL, C_MAX_QUEUED_WAKEUP_FRAMES, MacScheduler};
pub use operation::{Operation, PendingOperations};
pub use registry::{ReceiverId, SenderId};
pub use scan::{ActiveScanResult, C_RSSI_INVALID, EnergyScanResult, ScanHandler};

#[cfg(test)]
mod tests;
