// crates/thread-mac-rs/src/node/link/state.rs
use super::events::LinkEvent;
use crate::indirect::{IndirectTxManager, Reassembler};
use crate::log::LogContext;
use crate::types::{ExtAddress, MacAddress, PanId, ShortAddress};
use alloc::collections::VecDeque;

/// The parts of a link node the MAC scheduler calls back into.
///
/// Implements `MacClient`, so it must stay a separate borrow from the
/// scheduler and the neighbor table.
pub struct LinkContext {
    pub(super) indirect: IndirectTxManager,
    pub(super) reassembler: Reassembler,
    pub(super) events: VecDeque<LinkEvent>,
    pub(super) pan_id: PanId,
    /// Mesh frames are delivered only when addressed to this address.
    pub(super) short_address: ShortAddress,
    pub(super) ext_address: ExtAddress,
    /// Destination of the data poll waiting for the radio.
    pub(super) poll_parent: Option<MacAddress>,
    /// Time of the driving call in progress.
    pub(super) now_us: u64,
}

impl LinkContext {
    pub(super) fn new(indirect: IndirectTxManager, reassembler: Reassembler) -> Self {
        Self {
            indirect,
            reassembler,
            events: VecDeque::new(),
            pan_id: PanId::BROADCAST,
            short_address: ShortAddress::NONE,
            ext_address: ExtAddress::default(),
            poll_parent: None,
            now_us: 0,
        }
    }

    pub(super) fn log_context(&self, component: &'static str) -> LogContext {
        LogContext {
            layer: "link",
            component,
            id: self.short_address.0 as u32,
        }
    }

    pub fn indirect(&self) -> &IndirectTxManager {
        &self.indirect
    }

    pub fn reassembler(&self) -> &Reassembler {
        &self.reassembler
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}
