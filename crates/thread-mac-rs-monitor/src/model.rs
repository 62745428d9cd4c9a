//! Serializable snapshots of a link node.
//!
//! Captured on the node's thread, carried to the monitor thread and sent as
//! JSON to the web frontend.

use serde::Serialize;
use thread_mac_rs::hal::RadioDriver;
use thread_mac_rs::indirect::IndirectCounters;
use thread_mac_rs::mac::MacCounters;
use thread_mac_rs::node::link::LinkNode;
use thread_mac_rs::security::{FrameCipher, KeyProvider};

/// State of one child as seen by its parent.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChildInfo {
    pub index: u8,
    pub short_address: String,
    pub ext_address: String,
    pub sleepy: bool,
    /// Messages queued until the child polls.
    pub queued_messages: u16,
    pub data_request_pending: bool,
    pub link_quality: u8,
    pub last_rssi: Option<i8>,
    pub last_heard_us: u64,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct WakeupInfo {
    pub running: bool,
    pub sent_frames: u32,
    pub skipped_frames: u32,
    pub tx_end_time_us: u64,
}

/// The packet sent from the node loop to the monitor.
#[derive(Serialize, Clone, Debug)]
pub struct LinkSnapshot {
    pub timestamp_us: u64,
    pub ext_address: String,
    pub short_address: String,
    pub pan_id: String,
    pub channel: u8,
    /// The MAC operation in progress.
    pub mac_operation: String,
    /// Share of failed clear channel assessments, 0xffff being 100%.
    pub cca_failure_rate: u16,
    pub queued_messages: usize,
    pub sed_slots_remaining: usize,
    pub children: Vec<ChildInfo>,
    pub wakeup: WakeupInfo,
    pub mac_counters: MacCounters,
    pub indirect_counters: IndirectCounters,
}

impl LinkSnapshot {
    pub fn capture<R, G, K, C>(node: &LinkNode<R, G, K, C>, current_time_us: u64) -> Self
    where
        R: RadioDriver,
        G: rand_core::RngCore,
        K: KeyProvider,
        C: FrameCipher,
    {
        let mac = node.mac();
        let children = node
            .neighbors()
            .children()
            .map(|(index, child)| ChildInfo {
                index: index.0,
                short_address: child.short_address.to_string(),
                ext_address: child.ext_address.to_string(),
                sleepy: child.is_sleepy_child(),
                queued_messages: child.indirect.message_count,
                data_request_pending: child.indirect.data_request_pending,
                link_quality: child.link_info.link_quality(),
                last_rssi: child.link_info.last_rssi(),
                last_heard_us: child.last_heard_us,
            })
            .collect();
        let wakeup = node.wakeup();

        Self {
            timestamp_us: current_time_us,
            ext_address: mac.ext_address().to_string(),
            short_address: mac.short_address().to_string(),
            pan_id: format!("{:#06x}", mac.pan_id().0),
            channel: mac.channel().0,
            mac_operation: mac.operation().to_string(),
            cca_failure_rate: mac.cca_failure_rate(),
            queued_messages: node.indirect().queue_len(),
            sed_slots_remaining: node.indirect().remaining_sed_slot_count(),
            children,
            wakeup: WakeupInfo {
                running: wakeup.is_running(),
                sent_frames: wakeup.sent_frames(),
                skipped_frames: wakeup.skipped_frames(),
                tx_end_time_us: wakeup.tx_end_time_us(),
            },
            mac_counters: *mac.counters(),
            indirect_counters: *node.indirect().counters(),
        }
    }
}
